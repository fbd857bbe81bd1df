//! Compact style context derived from a stylebook.
//!
//! Generation prompts do not need the whole stylebook, only the tone descriptors and the short
//! lists of recognisable devices. Entries that are not objects, or lack the expected key, are
//! skipped.

use serde::Serialize;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

use crate::config::MiningPaths;
use crate::mining::MiningError;
use crate::mining::persist::write_json;

/// Style signals extracted from a stylebook for use in generation prompts.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StyleContext {
    /// Overall tone.
    pub tone: Option<Value>,
    /// Humor description.
    pub humor: Option<Value>,
    /// Speech rhythm.
    pub rhythm: Option<Value>,
    /// Comic rhythm label.
    pub comic_rhythm: Option<Value>,
    /// Phrase templates usable as joke moulds.
    pub joke_templates: Vec<String>,
    /// Joke structure formats.
    pub joke_structures: Vec<String>,
    /// Comic trigger types.
    pub comic_triggers: Vec<String>,
    /// Discourse markers.
    pub markers: Vec<String>,
    /// Catchphrases.
    pub catchphrases: Vec<String>,
    /// Interjections.
    pub interjections: Vec<String>,
    /// Level of elongated pauses.
    pub pauses: Option<Value>,
}

impl StyleContext {
    /// Project a stylebook record into a context.
    pub fn from_stylebook(stylebook: &Map<String, Value>) -> Self {
        let scalar = |key: &str| stylebook.get(key).cloned();
        let names = |list: &str, field: &str| collect_names(stylebook.get(list), field);

        Self {
            tone: scalar("tone"),
            humor: scalar("humor"),
            rhythm: scalar("rhythm"),
            comic_rhythm: scalar("comic_rhythm"),
            joke_templates: names("phrase_templates", "template"),
            joke_structures: names("joke_structures", "format"),
            comic_triggers: names("comic_triggers", "type"),
            markers: names("discourse_markers", "text"),
            catchphrases: names("catchphrases", "text"),
            interjections: names("interjections", "text"),
            pauses: stylebook
                .get("emphasis")
                .and_then(|emphasis| emphasis.get("elongated_pauses"))
                .cloned(),
        }
    }

    /// Write the context next to the stylebook and return where it landed.
    pub fn save(&self, paths: &MiningPaths) -> Result<PathBuf, MiningError> {
        let destination = paths.style_context_path();
        write_json(&destination, self)?;
        Ok(destination)
    }
}

/// Derive the context from `stylebook` when given, otherwise from the configured stylebook.
pub fn load_context(
    paths: &MiningPaths,
    stylebook: Option<&Path>,
) -> Result<StyleContext, MiningError> {
    let source = stylebook.unwrap_or(&paths.stylebook_path);
    let stylebook = load_stylebook(source)?;
    Ok(StyleContext::from_stylebook(&stylebook))
}

/// Load a stylebook, treating a missing file as an empty record.
pub fn load_stylebook(path: &Path) -> Result<Map<String, Value>, MiningError> {
    if !path.exists() {
        tracing::warn!(path = %path.display(), "Stylebook not found; using empty record");
        return Ok(Map::new());
    }
    let body = std::fs::read_to_string(path).map_err(|source| MiningError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    match serde_json::from_str::<Value>(&body)? {
        Value::Object(map) => Ok(map),
        _ => {
            tracing::warn!(path = %path.display(), "Stylebook is not a JSON object; ignoring");
            Ok(Map::new())
        }
    }
}

fn collect_names(list: Option<&Value>, field: &str) -> Vec<String> {
    list.and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_object()?.get(field)?.as_str())
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}
