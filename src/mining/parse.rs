//! Defensive decoding of provider answers.
//!
//! Providers are asked for bare JSON but frequently wrap it in a Markdown code fence. The parser
//! strips an optional fence, attempts a strict decode, and otherwise returns a failure marker
//! holding the start of the raw answer. It never returns an error.

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

use super::types::{AnalysisResult, FailureMarker};

/// Sample length kept from undecodable per-block answers.
pub const BLOCK_SAMPLE_CHARS: usize = 800;
/// Sample length kept from an undecodable fusion answer.
pub const FUSION_SAMPLE_CHARS: usize = 1000;

static FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^```(?:json)?\s*|\s*```$").expect("code fence pattern is valid")
});

/// Decode `payload` into an [`AnalysisResult`].
///
/// On failure the marker carries the first `sample_chars` characters of the original,
/// unstripped payload.
pub fn parse_payload(payload: &str, sample_chars: usize) -> AnalysisResult {
    let stripped = strip_code_fences(payload);
    match serde_json::from_str::<Value>(&stripped) {
        Ok(value) => AnalysisResult::Decoded(value),
        Err(error) => {
            tracing::debug!(error = %error, "Provider answer is not valid JSON");
            AnalysisResult::Failed(FailureMarker::Parse {
                sample: truncate_chars(payload, sample_chars),
            })
        }
    }
}

/// Remove a leading ```` ``` ```` / ```` ```json ```` line and a trailing fence line.
pub(crate) fn strip_code_fences(payload: &str) -> String {
    let trimmed = payload.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }
    FENCE.replace_all(trimmed, "").into_owned()
}

/// Keep at most `max_chars` characters of `text`.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((offset, _)) => text[..offset].to_string(),
        None => text.to_string(),
    }
}
