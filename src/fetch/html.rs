//! HTML extraction: title, meta tags, visible text and links.

use std::collections::HashSet;

use scraper::{ElementRef, Html, Selector};
use serde_json::{Map, Value};
use url::Url;

use super::FetchedPage;

/// Elements whose text never counts as page content.
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "head"];

/// Extracts a [`FetchedPage`] from an HTML document.
///
/// Relative links are resolved against `base`. Links are split into internal
/// (same host as `base`) and external, with fragments removed and duplicates
/// dropped per list.
#[must_use]
pub fn extract_page(html: &str, base: &Url) -> FetchedPage {
    let document = Html::parse_document(html);
    let (internal_links, external_links) = extract_links(&document, base);

    FetchedPage {
        content: extract_text(&document),
        internal_links,
        external_links,
        title: extract_title(&document),
        raw_metadata: extract_meta(&document),
    }
}

/// Wraps a plain-text body as a page without links.
#[must_use]
pub fn plain_text_page(body: &str) -> FetchedPage {
    FetchedPage {
        content: body.trim().to_string(),
        ..FetchedPage::default()
    }
}

fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;
    let title = document
        .select(&title_selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty());
    if title.is_some() {
        return title;
    }

    let og_selector = Selector::parse("meta[property='og:title'][content]").ok()?;
    document
        .select(&og_selector)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

fn extract_meta(document: &Html) -> Map<String, Value> {
    let mut meta = Map::new();
    let Ok(selector) = Selector::parse("meta[content]") else {
        return meta;
    };
    for element in document.select(&selector) {
        let attrs = element.value();
        let Some(name) = attrs.attr("name").or_else(|| attrs.attr("property")) else {
            continue;
        };
        if let Some(content) = attrs.attr("content") {
            meta.insert(name.to_string(), Value::String(content.to_string()));
        }
    }
    meta
}

fn extract_text(document: &Html) -> String {
    let root = Selector::parse("body")
        .ok()
        .and_then(|body| document.select(&body).next())
        .unwrap_or_else(|| document.root_element());

    let mut lines = Vec::new();
    for node in root.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ElementRef::wrap(ancestor).is_some_and(|el| HIDDEN_ELEMENTS.contains(&el.value().name()))
        });
        if hidden {
            continue;
        }
        let line = text.split_whitespace().collect::<Vec<_>>().join(" ");
        if !line.is_empty() {
            lines.push(line);
        }
    }
    lines.join("\n")
}

fn extract_links(document: &Html, base: &Url) -> (Vec<String>, Vec<String>) {
    let mut internal = Vec::new();
    let mut external = Vec::new();
    let Ok(selector) = Selector::parse("a[href]") else {
        return (internal, external);
    };

    let mut seen = HashSet::new();
    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        let Some(link) = resolve_link(base, href) else {
            continue;
        };
        if !seen.insert(link.to_string()) {
            continue;
        }
        if link.host_str() == base.host_str() {
            internal.push(link.into());
        } else {
            external.push(link.into());
        }
    }
    (internal, external)
}

/// Resolves `href` against `base`, keeping only http(s) targets.
fn resolve_link(base: &Url, href: &str) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let mut url = base.join(href).ok()?;
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.set_fragment(None);
    Some(url)
}
