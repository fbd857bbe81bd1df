//! Fusion of per-block results into the final stylebook.
//!
//! The ordered result list is serialized into a single prompt and consolidated by one provider
//! call. Whatever comes back, the output is a JSON object stamped with provenance fields.

use serde_json::{Map, Value};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::generation::{AnalysisCapability, PromptVariables, TemplateKey};

use super::analyze::AnalysisParams;
use super::parse::{FUSION_SAMPLE_CHARS, parse_payload, truncate_chars};
use super::types::{
    AggregateArtifact, AnalysisResult, FORMAT_ERROR_FLAG, FailureMarker, GENERATED_AT_KEY,
    MiningError, SAMPLE, SOURCE_KEY, VERSION_KEY,
};

/// Version tag stamped when the provider did not supply one.
pub const ARTIFACT_VERSION: &str = "2.0-blocks";
/// Source tag identifying block-fusion output.
pub const ARTIFACT_SOURCE: &str = "block_fusion";
/// Lower bound on list length requested from the fusion prompt.
const MIN_FUSION_ITEMS: usize = 15;
/// Sample length kept when the fusion answer decodes to something other than an object.
const FORMAT_SAMPLE_CHARS: usize = 800;

/// Consolidates block results through the analysis capability.
pub struct Aggregator<'a> {
    capability: &'a dyn AnalysisCapability,
    params: AnalysisParams,
}

impl<'a> Aggregator<'a> {
    /// Build an aggregator sharing the run parameters used for block analysis.
    pub fn new(capability: &'a dyn AnalysisCapability, params: AnalysisParams) -> Self {
        Self { capability, params }
    }

    /// Fold `results`, in block order, into one artifact.
    pub async fn aggregate(
        &self,
        results: &[AnalysisResult],
    ) -> Result<AggregateArtifact, MiningError> {
        tracing::info!(results = results.len(), "Fusing partial analyses");
        let analyses = serde_json::to_string_pretty(results)?;

        let mut variables = PromptVariables::new();
        variables.insert("analyses".into(), analyses);
        variables.insert("language".into(), self.params.language.clone());
        variables.insert(
            "max_items".into(),
            self.params.max_items.max(MIN_FUSION_ITEMS).to_string(),
        );

        let answer = self.capability.invoke(TemplateKey::Fusion, &variables);
        let fused = match answer.await {
            Ok(answer) => parse_payload(&answer, FUSION_SAMPLE_CHARS),
            Err(error) => {
                tracing::warn!(error = %error, "Fusion call failed");
                AnalysisResult::Failed(FailureMarker::Fusion {
                    message: error.to_string(),
                })
            }
        };

        Ok(finalize(fused, now_rfc3339()))
    }
}

/// Turn a fusion result into an artifact stamped with provenance.
///
/// Objects keep an upstream `version` and `_source`; `generated_at` is always replaced. Anything
/// that is not an object is swapped for a format-error record.
pub(crate) fn finalize(fused: AnalysisResult, generated_at: String) -> AggregateArtifact {
    let mut record = match fused {
        AnalysisResult::Decoded(Value::Object(map)) => map,
        AnalysisResult::Failed(marker) => marker.to_record(),
        AnalysisResult::Decoded(other) => {
            tracing::warn!("Fusion answer is not a JSON object; substituting fallback record");
            let mut fallback = Map::new();
            fallback.insert(FORMAT_ERROR_FLAG.into(), Value::Bool(true));
            fallback.insert(
                SAMPLE.into(),
                Value::String(truncate_chars(&value_as_text(&other), FORMAT_SAMPLE_CHARS)),
            );
            fallback
        }
    };

    record
        .entry(VERSION_KEY)
        .or_insert_with(|| Value::String(ARTIFACT_VERSION.into()));
    record.insert(GENERATED_AT_KEY.into(), Value::String(generated_at));
    record
        .entry(SOURCE_KEY)
        .or_insert_with(|| Value::String(ARTIFACT_SOURCE.into()));

    AggregateArtifact::from_map(record)
}

fn value_as_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| OffsetDateTime::now_utc().unix_timestamp().to_string())
}
