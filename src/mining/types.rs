//! Core data types and error definitions for the mining pipeline.

use crate::metrics::MetricsSnapshot;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value, json};
use std::path::PathBuf;
use thiserror::Error;

pub(crate) const PARSE_ERROR_FLAG: &str = "_parse_error";
pub(crate) const RESPONSE_SAMPLE: &str = "_response_sample";
pub(crate) const INVOCATION_ERROR_FLAG: &str = "_invocation_error";
pub(crate) const FUSION_ERROR_FLAG: &str = "_fusion_error";
pub(crate) const FORMAT_ERROR_FLAG: &str = "_format_error";
pub(crate) const MESSAGE: &str = "_message";
pub(crate) const SAMPLE: &str = "_sample";

/// Provenance key holding the artifact version tag.
pub const VERSION_KEY: &str = "version";
/// Provenance key holding the RFC 3339 generation timestamp.
pub const GENERATED_AT_KEY: &str = "generated_at";
/// Provenance key identifying how the artifact was produced.
pub const SOURCE_KEY: &str = "_source";

/// Errors that terminate a mining run.
#[derive(Debug, Error)]
pub enum MiningError {
    /// Segmentation was asked for an impossible character budget.
    #[error("block size must be greater than zero")]
    InvalidBlockSize,
    /// No text was found in the input directory.
    #[error(
        "no text found in {}; put your cleaned transcripts (.txt) in that folder",
        .directory.display()
    )]
    EmptyCorpus {
        /// Directory that was scanned.
        directory: PathBuf,
    },
    /// Reading or writing a file failed.
    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        /// File or directory involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// A record could not be serialized.
    #[error("failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl MiningError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// A contiguous run of corpus lines sent for one analysis call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// 1-based position in corpus order.
    pub index: usize,
    /// Lines joined with `\n`.
    pub text: String,
    /// Characters of line content, newlines excluded.
    pub char_count: usize,
}

/// Why an analysis produced no usable record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureMarker {
    /// The provider answered but the text was not decodable JSON.
    Parse {
        /// Leading slice of the raw answer.
        sample: String,
    },
    /// The per-block provider call itself failed.
    Invocation {
        /// Error description.
        message: String,
    },
    /// The fusion provider call itself failed.
    Fusion {
        /// Error description.
        message: String,
    },
}

impl FailureMarker {
    /// Render the marker as the JSON record persisted on disk.
    pub fn to_record(&self) -> Map<String, Value> {
        let value = match self {
            Self::Parse { sample } => json!({ PARSE_ERROR_FLAG: true, RESPONSE_SAMPLE: sample }),
            Self::Invocation { message } => {
                json!({ INVOCATION_ERROR_FLAG: true, MESSAGE: message })
            }
            Self::Fusion { message } => json!({ FUSION_ERROR_FLAG: true, MESSAGE: message }),
        };
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }
}

/// Outcome of analyzing one block, or of decoding the fusion answer.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisResult {
    /// Successfully decoded payload, carried as-is.
    Decoded(Value),
    /// Structured failure marker.
    Failed(FailureMarker),
}

impl AnalysisResult {
    /// True when the payload decoded into a JSON object.
    pub fn is_record(&self) -> bool {
        matches!(self, Self::Decoded(Value::Object(_)))
    }

    /// The failure marker, if any.
    pub fn failure(&self) -> Option<&FailureMarker> {
        match self {
            Self::Failed(marker) => Some(marker),
            Self::Decoded(_) => None,
        }
    }

    /// JSON representation used for persistence and for the fusion payload.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Decoded(value) => value.clone(),
            Self::Failed(marker) => Value::Object(marker.to_record()),
        }
    }
}

impl Serialize for AnalysisResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Decoded(value) => value.serialize(serializer),
            Self::Failed(marker) => marker.to_record().serialize(serializer),
        }
    }
}

/// The consolidated stylebook: always a JSON object carrying provenance fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct AggregateArtifact(Map<String, Value>);

impl AggregateArtifact {
    pub(crate) fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Borrow the underlying record.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Consume the artifact, returning the record.
    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    /// Look up a top-level field.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Version tag.
    pub fn version(&self) -> Option<&str> {
        self.get(VERSION_KEY).and_then(Value::as_str)
    }

    /// Generation timestamp.
    pub fn generated_at(&self) -> Option<&str> {
        self.get(GENERATED_AT_KEY).and_then(Value::as_str)
    }

    /// Source tag.
    pub fn source(&self) -> Option<&str> {
        self.get(SOURCE_KEY).and_then(Value::as_str)
    }

    /// True when the artifact is a fallback or failure record.
    pub fn is_failure(&self) -> bool {
        [PARSE_ERROR_FLAG, FUSION_ERROR_FLAG, FORMAT_ERROR_FLAG]
            .iter()
            .any(|flag| self.get(flag).and_then(Value::as_bool).unwrap_or(false))
    }
}

/// Lifecycle of a single mining run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Nothing has happened yet.
    Idle,
    /// Transcripts were read and joined.
    CorpusLoaded,
    /// The corpus was split into blocks.
    Segmented,
    /// Every block has a result.
    BlocksAnalyzed,
    /// Results were consolidated.
    Aggregated,
    /// The stylebook was written.
    Persisted,
    /// The run stopped on a fatal error.
    Failed,
}

/// Summary of a completed run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Where the stylebook was written.
    pub artifact_path: PathBuf,
    /// Transcripts contributing to the corpus.
    pub document_count: usize,
    /// Corpus length in characters.
    pub corpus_chars: usize,
    /// SHA-256 of the corpus text, hex encoded.
    pub corpus_sha256: String,
    /// Blocks produced by segmentation.
    pub block_count: usize,
    /// Whether the stylebook is a failure record.
    pub artifact_failed: bool,
    /// Last state reached.
    pub final_state: RunState,
    /// Per-block counters.
    pub metrics: MetricsSnapshot,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_markers_serialize_with_flags() {
        let parse = AnalysisResult::Failed(FailureMarker::Parse {
            sample: "oops".into(),
        });
        assert_eq!(
            serde_json::to_value(&parse).expect("json"),
            json!({"_parse_error": true, "_response_sample": "oops"})
        );

        let invocation = AnalysisResult::Failed(FailureMarker::Invocation {
            message: "timeout".into(),
        });
        assert_eq!(
            invocation.to_value(),
            json!({"_invocation_error": true, "_message": "timeout"})
        );
        assert!(!invocation.is_record());
    }

    #[test]
    fn decoded_values_serialize_unchanged() {
        let result = AnalysisResult::Decoded(json!({"tone": "wry", "humor": null}));
        assert!(result.is_record());
        assert!(result.failure().is_none());
        assert_eq!(
            serde_json::to_string(&result).expect("json"),
            r#"{"humor":null,"tone":"wry"}"#
        );

        let list = AnalysisResult::Decoded(json!([1, 2]));
        assert!(!list.is_record());
    }

    #[test]
    fn empty_corpus_error_names_directory() {
        let error = MiningError::EmptyCorpus {
            directory: PathBuf::from("/data/cleaned"),
        };
        assert!(error.to_string().contains("/data/cleaned"));
    }
}
