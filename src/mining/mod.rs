//! Style mining pipeline: segmentation, per-block analysis, fusion, and persistence.

pub mod aggregate;
pub mod analyze;
pub mod corpus;
pub mod parse;
pub mod persist;
pub mod segment;
mod service;
pub mod types;

pub use aggregate::Aggregator;
pub use analyze::{AnalysisParams, BlockAnalyzer};
pub use corpus::{Corpus, clean_transcript, load_corpus};
pub use parse::parse_payload;
pub use persist::PartialStore;
pub use segment::segment;
pub use service::StyleMiner;
pub use types::{
    AggregateArtifact, AnalysisResult, Block, FailureMarker, MiningError, RunOutcome, RunState,
};
