//! Per-block analysis.
//!
//! Every block yields exactly one [`AnalysisResult`]. Provider failures and undecodable answers
//! become failure markers; nothing raised by the provider escapes this module. Calls may run
//! concurrently, but results always come back in block order.

use futures_util::{StreamExt, stream};

use crate::generation::{AnalysisCapability, PromptVariables, TemplateKey};
use crate::metrics::MiningMetrics;

use super::parse::{BLOCK_SAMPLE_CHARS, parse_payload};
use super::persist::PartialStore;
use super::types::{AnalysisResult, Block, FailureMarker};

/// Run-scoped parameters embedded into every block prompt.
#[derive(Debug, Clone)]
pub struct AnalysisParams {
    /// Output-language tag.
    pub language: String,
    /// Maximum items per list requested from the provider.
    pub max_items: usize,
}

impl AnalysisParams {
    fn variables(&self, excerpt: &str) -> PromptVariables {
        let mut variables = PromptVariables::new();
        variables.insert("excerpt".into(), excerpt.to_string());
        variables.insert("language".into(), self.language.clone());
        variables.insert("max_items".into(), self.max_items.to_string());
        variables
    }
}

/// Dispatches blocks to the analysis capability and records one result per block.
pub struct BlockAnalyzer<'a> {
    capability: &'a dyn AnalysisCapability,
    params: AnalysisParams,
    partials: Option<PartialStore>,
    concurrency: usize,
    metrics: &'a MiningMetrics,
}

impl<'a> BlockAnalyzer<'a> {
    /// Analyze sequentially without persisting partials.
    pub fn new(
        capability: &'a dyn AnalysisCapability,
        params: AnalysisParams,
        metrics: &'a MiningMetrics,
    ) -> Self {
        Self {
            capability,
            params,
            partials: None,
            concurrency: 1,
            metrics,
        }
    }

    /// Persist each result into `store` as soon as it is produced.
    pub fn with_partials(mut self, store: PartialStore) -> Self {
        self.partials = Some(store);
        self
    }

    /// Allow up to `limit` provider calls in flight. Values below one mean one.
    pub fn with_concurrency(mut self, limit: usize) -> Self {
        self.concurrency = limit.max(1);
        self
    }

    /// Analyze `blocks`, returning results in the same order.
    pub async fn analyze(&self, blocks: &[Block]) -> Vec<AnalysisResult> {
        let total = blocks.len();
        let total_chars: usize = blocks.iter().map(|block| block.char_count).sum();
        tracing::info!(
            blocks = total,
            chars = total_chars,
            concurrency = self.concurrency,
            "Analyzing blocks"
        );

        stream::iter(blocks)
            .map(|block| self.analyze_block(block, total))
            .buffered(self.concurrency)
            .collect()
            .await
    }

    async fn analyze_block(&self, block: &Block, total: usize) -> AnalysisResult {
        tracing::info!(
            block = block.index,
            total,
            chars = block.char_count,
            "Analyzing block"
        );

        let variables = self.params.variables(&block.text);
        let result = match self
            .capability
            .invoke(TemplateKey::BlockAnalysis, &variables)
            .await
        {
            Ok(answer) => parse_payload(&answer, BLOCK_SAMPLE_CHARS),
            Err(error) => {
                tracing::warn!(block = block.index, error = %error, "Block analysis call failed");
                self.metrics.record_invocation_failure();
                AnalysisResult::Failed(FailureMarker::Invocation {
                    message: error.to_string(),
                })
            }
        };

        if let Some(FailureMarker::Parse { .. }) = result.failure() {
            tracing::warn!(block = block.index, "Block analysis answer is not valid JSON");
            self.metrics.record_parse_failure();
        }
        self.metrics.record_block();

        if let Some(store) = &self.partials {
            match store.write(block.index, &result) {
                Ok(path) => {
                    self.metrics.record_partial_written();
                    tracing::info!(block = block.index, path = %path.display(), "Partial saved");
                }
                Err(error) => {
                    tracing::warn!(block = block.index, error = %error, "Failed to save partial");
                }
            }
        }

        result
    }
}
