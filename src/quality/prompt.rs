//! Judge prompt and token budget.

use thiserror::Error;
use tracing::warn;

/// Default prompt budget in tokens.
pub const DEFAULT_MAX_PROMPT_TOKENS: usize = 8192;

/// Characters per token used for estimates.
pub const CHARS_PER_TOKEN: usize = 4;

const JUDGE_HEADER: &str = "You are an expert reviewer grading the quality of a DOCUMENT.

Guidelines:
1. Judge the DOCUMENT against generally accepted facts and reliable information.
2. The DOCUMENT must contain relevant information, not only links or error messages.
3. The DOCUMENT must not oversimplify information in a way that changes its meaning.

Assign a quality score between 0 and 1:
- 0.0: irrelevant, only noise such as links or error messages
- 0.1 - 0.7: partially relevant, meets some of the guidelines
- 0.8 - 1.0: fully relevant, meets all of the guidelines

Reply with the score only, as JSON:
{\"score\": <number between 0.0 and 1.0>}

DOCUMENT:
";

/// The fixed part of the prompt does not fit the budget.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("prompt template needs {template_tokens} tokens but the budget is {max_tokens}")]
pub struct ClipError {
    /// Estimated template size.
    pub template_tokens: usize,
    /// Configured budget.
    pub max_tokens: usize,
}

/// Estimates token count as `ceil(chars / 4)`.
#[must_use]
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

/// Builds judge prompts that fit a token budget.
#[derive(Debug, Clone, Copy)]
pub struct PromptBuilder {
    max_tokens: usize,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PROMPT_TOKENS)
    }
}

impl PromptBuilder {
    /// Creates a builder with a budget of `max_tokens`.
    #[must_use]
    pub fn new(max_tokens: usize) -> Self {
        Self { max_tokens }
    }

    /// Renders the prompt with `content` truncated to fit the budget.
    ///
    /// # Errors
    ///
    /// Returns [`ClipError`] when the template alone exceeds the budget.
    pub fn clipped(&self, content: &str) -> Result<String, ClipError> {
        let template_tokens = estimate_tokens(JUDGE_HEADER);
        if template_tokens > self.max_tokens {
            return Err(ClipError {
                template_tokens,
                max_tokens: self.max_tokens,
            });
        }

        let header_chars = JUDGE_HEADER.chars().count();
        let max_chars = self.max_tokens.saturating_mul(CHARS_PER_TOKEN);
        let room = max_chars.saturating_sub(header_chars);
        let clipped: String = content.chars().take(room).collect();
        Ok(render(&clipped))
    }

    /// Renders the prompt for one document.
    ///
    /// If clipping fails the failure is logged and the full content is used.
    #[must_use]
    pub fn build(&self, document_id: &str, content: &str) -> String {
        match self.clipped(content) {
            Ok(prompt) => prompt,
            Err(e) => {
                warn!(document_id, error = %e, "token clipping failed, submitting unclipped prompt");
                render(content)
            }
        }
    }
}

fn render(content: &str) -> String {
    let mut prompt = String::with_capacity(JUDGE_HEADER.len() + content.len() + 1);
    prompt.push_str(JUDGE_HEADER);
    prompt.push_str(content);
    prompt.push('\n');
    prompt
}
