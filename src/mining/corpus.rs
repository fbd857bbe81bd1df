//! Corpus loading and transcript cleanup.

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use walkdir::WalkDir;

use super::types::MiningError;

const DOCUMENT_SEPARATOR: &str = "\n\n";

static TIMECODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\d{1,2}:\d{2}(?::\d{2})?\b").expect("timecode pattern is valid")
});
static STAGE_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\[(?:aplausos|música|risos|music|applause|laughs|inaudível).*?\]")
        .expect("stage tag pattern is valid")
});
static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

/// The concatenated text under analysis for one run.
#[derive(Debug, Clone)]
pub struct Corpus {
    /// Joined, trimmed text.
    pub text: String,
    /// Transcripts read, in load order.
    pub documents: Vec<PathBuf>,
}

impl Corpus {
    /// Corpus length in characters.
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

/// Read every `.txt` file directly inside `directory`, sorted by file name, and join them.
///
/// A missing directory reads as empty. Fails with [`MiningError::EmptyCorpus`] when the joined
/// text is blank after trimming.
pub fn load_corpus(directory: &Path, clean_first: bool) -> Result<Corpus, MiningError> {
    let documents = list_transcripts(directory)?;

    let mut texts = Vec::with_capacity(documents.len());
    for path in &documents {
        let bytes = std::fs::read(path).map_err(|source| MiningError::io(path, source))?;
        let text = decode_dropping_invalid(&bytes);
        texts.push(if clean_first {
            clean_transcript(&text)
        } else {
            text
        });
    }

    let text = texts.join(DOCUMENT_SEPARATOR).trim().to_string();
    if text.is_empty() {
        return Err(MiningError::EmptyCorpus {
            directory: directory.to_path_buf(),
        });
    }

    Ok(Corpus { text, documents })
}

/// Decode UTF-8, silently skipping byte sequences that are not valid.
fn decode_dropping_invalid(bytes: &[u8]) -> String {
    bytes.utf8_chunks().map(|chunk| chunk.valid()).collect()
}

fn list_transcripts(directory: &Path) -> Result<Vec<PathBuf>, MiningError> {
    if !directory.is_dir() {
        tracing::warn!(directory = %directory.display(), "Transcript directory does not exist");
        return Ok(Vec::new());
    }

    let mut documents = Vec::new();
    for entry in WalkDir::new(directory)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|error| {
            let path = error
                .path()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| directory.to_path_buf());
            MiningError::io(path, std::io::Error::other(error.to_string()))
        })?;
        let is_transcript = entry.file_type().is_file()
            && entry.path().extension().and_then(|ext| ext.to_str()) == Some("txt");
        if is_transcript {
            documents.push(entry.into_path());
        }
    }
    Ok(documents)
}

/// Strip timecodes and stage tags, then collapse all whitespace to single spaces.
pub fn clean_transcript(text: &str) -> String {
    let text = TIMECODE.replace_all(text, "");
    let text = STAGE_TAG.replace_all(&text, "");
    WHITESPACE.replace_all(&text, " ").trim().to_string()
}
