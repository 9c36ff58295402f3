//! Parsing of the model's `{"score": ...}` reply.

use serde::Deserialize;

use crate::batch::ItemError;
use crate::document::QualityScore;

#[derive(Deserialize)]
struct ScoreReply {
    score: f64,
}

/// Parses a completion into a quality score.
///
/// Accepts the JSON object bare or inside a Markdown code fence.
///
/// # Errors
///
/// - [`ItemError::EmptyResult`] for missing or blank text
/// - [`ItemError::Parse`] for anything that is not `{"score": <0..=1>}`
pub fn parse_score(text: Option<&str>) -> Result<QualityScore, ItemError> {
    let text = text.map(str::trim).unwrap_or_default();
    if text.is_empty() {
        return Err(ItemError::empty("model returned no text"));
    }

    let body = strip_code_fence(text);
    let reply: ScoreReply = serde_json::from_str(body)
        .map_err(|e| ItemError::parse(format!("unreadable score reply: {e}")))?;

    QualityScore::new(reply.score)
        .ok_or_else(|| ItemError::parse(format!("score {} outside [0.0, 1.0]", reply.score)))
}

fn strip_code_fence(text: &str) -> &str {
    let Some(rest) = text.strip_prefix("```") else {
        return text;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
