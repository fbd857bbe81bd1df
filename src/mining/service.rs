//! Mining service coordinating corpus loading, block analysis, fusion, and persistence.

use std::sync::{Mutex, PoisonError};

use sha2::{Digest, Sha256};

use crate::config::Config;
use crate::generation::AnalysisCapability;
use crate::metrics::MiningMetrics;

use super::aggregate::Aggregator;
use super::analyze::{AnalysisParams, BlockAnalyzer};
use super::corpus::load_corpus;
use super::persist::{PartialStore, write_json};
use super::segment::segment;
use super::types::{MiningError, RunOutcome, RunState};

/// Runs the full pipeline: corpus → blocks → per-block analyses → fusion → stylebook.
///
/// Each call to [`StyleMiner::run`] is a fresh, complete pass; nothing is resumed from earlier
/// partials. Only an empty corpus or an I/O failure on the corpus or the final stylebook stops a
/// run. Provider and decoding failures end up inside the records.
pub struct StyleMiner<'a> {
    config: &'a Config,
    capability: &'a dyn AnalysisCapability,
    state: Mutex<RunState>,
}

impl<'a> StyleMiner<'a> {
    /// Bind the miner to its configuration and analysis capability.
    pub fn new(config: &'a Config, capability: &'a dyn AnalysisCapability) -> Self {
        Self {
            config,
            capability,
            state: Mutex::new(RunState::Idle),
        }
    }

    /// State reached by the latest run, [`RunState::Failed`] if it stopped on an error.
    pub fn state(&self) -> RunState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Execute one run and return where the stylebook landed, with run statistics.
    pub async fn run(&self) -> Result<RunOutcome, MiningError> {
        self.advance(RunState::Idle);
        match self.execute().await {
            Ok(outcome) => Ok(outcome),
            Err(error) => {
                self.advance(RunState::Failed);
                tracing::error!(error = %error, "Aborting run");
                Err(error)
            }
        }
    }

    async fn execute(&self) -> Result<RunOutcome, MiningError> {
        let config = self.config;
        let paths = &config.paths;

        let corpus = load_corpus(&paths.cleaned_dir, config.clean_first)?;
        let corpus_chars = corpus.char_count();
        let corpus_sha256 = hex::encode(Sha256::digest(corpus.text.as_bytes()));
        tracing::info!(
            documents = corpus.documents.len(),
            chars = corpus_chars,
            directory = %paths.cleaned_dir.display(),
            "Corpus loaded"
        );
        self.advance(RunState::CorpusLoaded);

        let blocks = segment(&corpus.text, config.block_max_chars)?;
        tracing::info!(
            blocks = blocks.len(),
            max_chars = config.block_max_chars,
            "Corpus segmented"
        );
        self.advance(RunState::Segmented);

        let params = AnalysisParams {
            language: config.output_language.clone(),
            max_items: config.max_list_items,
        };
        let metrics = MiningMetrics::new();
        let mut analyzer = BlockAnalyzer::new(self.capability, params.clone(), &metrics)
            .with_concurrency(config.block_concurrency);
        if config.save_partials {
            analyzer = analyzer.with_partials(PartialStore::new(&paths.partials_dir));
        }
        let results = analyzer.analyze(&blocks).await;
        debug_assert_eq!(results.len(), blocks.len());
        self.advance(RunState::BlocksAnalyzed);

        let artifact = Aggregator::new(self.capability, params)
            .aggregate(&results)
            .await?;
        self.advance(RunState::Aggregated);

        write_json(&paths.stylebook_path, &artifact)?;
        self.advance(RunState::Persisted);

        let metrics = metrics.snapshot();
        tracing::info!(
            path = %paths.stylebook_path.display(),
            blocks = blocks.len(),
            succeeded = metrics.succeeded(),
            invocation_failures = metrics.invocation_failures,
            parse_failures = metrics.parse_failures,
            fallback = artifact.is_failure(),
            "Stylebook saved"
        );

        Ok(RunOutcome {
            artifact_path: paths.stylebook_path.clone(),
            document_count: corpus.documents.len(),
            corpus_chars,
            corpus_sha256,
            block_count: blocks.len(),
            artifact_failed: artifact.is_failure(),
            final_state: self.state(),
            metrics,
        })
    }

    fn advance(&self, next: RunState) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        tracing::debug!(from = ?*state, to = ?next, "Run state transition");
        *state = next;
    }
}
