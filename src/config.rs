use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};
use thiserror::Error;

const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_LANGUAGE: &str = "pt-BR";
const DEFAULT_BLOCK_MAX_CHARS: usize = 4000;
const DEFAULT_MAX_LIST_ITEMS: usize = 25;
const DEFAULT_OPENAI_URL: &str = "https://api.openai.com";
const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for a mining run.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Backend used for both block analysis and fusion calls.
    pub generation_provider: GenerationProvider,
    /// Model identifier passed to the provider.
    pub generation_model: String,
    /// API key for OpenAI-compatible providers.
    pub openai_api_key: Option<String>,
    /// Base URL of the OpenAI-compatible endpoint.
    pub openai_base_url: String,
    /// Base URL of the Ollama runtime.
    pub ollama_url: String,
    /// Character budget per block (newlines excluded).
    pub block_max_chars: usize,
    /// Output-language tag requested from the provider.
    pub output_language: String,
    /// Upper bound on list lengths requested in prompts.
    pub max_list_items: usize,
    /// Whether each block result is written to the partials directory.
    pub save_partials: bool,
    /// Whether transcripts are cleaned before segmentation.
    pub clean_first: bool,
    /// Number of block analyses allowed in flight at once.
    pub block_concurrency: usize,
    /// Input and output locations.
    pub paths: MiningPaths,
}

/// Filesystem locations used by the mining pipeline.
#[derive(Debug, Clone, Deserialize)]
pub struct MiningPaths {
    /// Root of the agent layout; other defaults hang off `<base>/data`.
    pub base_dir: PathBuf,
    /// Directory holding cleaned `.txt` transcripts.
    pub cleaned_dir: PathBuf,
    /// Directory receiving per-block records.
    pub partials_dir: PathBuf,
    /// Location of the consolidated stylebook.
    pub stylebook_path: PathBuf,
}

impl MiningPaths {
    /// Derive the default layout under `base_dir`.
    pub fn under(base_dir: impl Into<PathBuf>) -> Self {
        let base_dir = base_dir.into();
        let data = base_dir.join("data");
        Self {
            cleaned_dir: data.join("cleaned"),
            partials_dir: data.join("partials"),
            stylebook_path: data.join("stylebook.json"),
            base_dir,
        }
    }

    /// Resolve locations from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Resolve locations from an arbitrary key lookup, falling back to the default layout.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .map(PathBuf::from)
        };
        let defaults = Self::under(get("STYLEMINE_BASE_DIR").unwrap_or_else(|| ".".into()));
        Self {
            cleaned_dir: get("CLEANED_DIR").unwrap_or(defaults.cleaned_dir),
            partials_dir: get("PARTIALS_DIR").unwrap_or(defaults.partials_dir),
            stylebook_path: get("STYLEBOOK_PATH").unwrap_or(defaults.stylebook_path),
            base_dir: defaults.base_dir,
        }
    }

    /// Location of the derived style context file.
    pub fn style_context_path(&self) -> PathBuf {
        self.base_dir.join("data").join("style_context.json")
    }
}

/// Supported generation backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationProvider {
    /// Hosted OpenAI-compatible chat completions API.
    OpenAI,
    /// Local Ollama runtime.
    Ollama,
}

/// Values supplied on the command line that take precedence over the environment.
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    /// Override for [`Config::block_max_chars`].
    pub block_max_chars: Option<usize>,
    /// Override for [`Config::generation_model`].
    pub generation_model: Option<String>,
    /// Override for [`Config::output_language`].
    pub output_language: Option<String>,
    /// Override for [`Config::max_list_items`].
    pub max_list_items: Option<usize>,
    /// Force transcript cleanup on.
    pub clean_first: bool,
    /// Disable per-block records.
    pub no_partials: bool,
    /// Override for [`Config::block_concurrency`].
    pub block_concurrency: Option<usize>,
    /// Replace the base directory and every default derived from it.
    pub base_dir: Option<PathBuf>,
    /// Override for [`MiningPaths::cleaned_dir`].
    pub cleaned_dir: Option<PathBuf>,
    /// Override for [`MiningPaths::partials_dir`].
    pub partials_dir: Option<PathBuf>,
    /// Override for [`MiningPaths::stylebook_path`].
    pub stylebook_path: Option<PathBuf>,
}

impl Config {
    /// Load `.env` (if present) and build configuration from the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let config = Self::from_env()?;
        tracing::debug!(
            provider = ?config.generation_provider,
            model = %config.generation_model,
            block_max_chars = config.block_max_chars,
            cleaned_dir = %config.paths.cleaned_dir.display(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let generation_provider = match get("GENERATION_PROVIDER") {
            Some(value) => value
                .parse()
                .map_err(|()| ConfigError::InvalidValue("GENERATION_PROVIDER".to_string()))?,
            None => GenerationProvider::OpenAI,
        };
        let openai_api_key = get("OPENAI_API_KEY");
        if generation_provider == GenerationProvider::OpenAI && openai_api_key.is_none() {
            return Err(ConfigError::MissingVariable("OPENAI_API_KEY".to_string()));
        }

        let paths = MiningPaths::from_lookup(&lookup);

        let config = Self {
            generation_provider,
            generation_model: get("GENERATION_MODEL").unwrap_or_else(|| DEFAULT_MODEL.into()),
            openai_api_key,
            openai_base_url: get("OPENAI_BASE_URL").unwrap_or_else(|| DEFAULT_OPENAI_URL.into()),
            ollama_url: get("OLLAMA_URL").unwrap_or_else(|| DEFAULT_OLLAMA_URL.into()),
            block_max_chars: parse_optional(get("BLOCK_MAX_CHARS"), "BLOCK_MAX_CHARS")?
                .unwrap_or(DEFAULT_BLOCK_MAX_CHARS),
            output_language: get("OUTPUT_LANGUAGE").unwrap_or_else(|| DEFAULT_LANGUAGE.into()),
            max_list_items: parse_optional(get("MAX_LIST_ITEMS"), "MAX_LIST_ITEMS")?
                .unwrap_or(DEFAULT_MAX_LIST_ITEMS),
            save_partials: parse_flag(get("SAVE_PARTIALS"), "SAVE_PARTIALS")?.unwrap_or(true),
            clean_first: parse_flag(get("CLEAN_FIRST"), "CLEAN_FIRST")?.unwrap_or(false),
            block_concurrency: parse_optional(get("BLOCK_CONCURRENCY"), "BLOCK_CONCURRENCY")?
                .unwrap_or(1),
            paths,
        };
        config.validate()?;
        Ok(config)
    }

    /// Merge command-line overrides into the configuration and re-validate.
    pub fn apply_overrides(&mut self, overrides: RunOverrides) -> Result<(), ConfigError> {
        let RunOverrides {
            block_max_chars,
            generation_model,
            output_language,
            max_list_items,
            clean_first,
            no_partials,
            block_concurrency,
            base_dir,
            cleaned_dir,
            partials_dir,
            stylebook_path,
        } = overrides;

        if let Some(value) = block_max_chars {
            self.block_max_chars = value;
        }
        if let Some(value) = generation_model {
            self.generation_model = value;
        }
        if let Some(value) = output_language {
            self.output_language = value;
        }
        if let Some(value) = max_list_items {
            self.max_list_items = value;
        }
        if let Some(value) = block_concurrency {
            self.block_concurrency = value;
        }
        self.clean_first |= clean_first;
        if no_partials {
            self.save_partials = false;
        }
        if let Some(base_dir) = base_dir {
            self.paths = MiningPaths::under(base_dir);
        }
        if let Some(dir) = cleaned_dir {
            self.paths.cleaned_dir = dir;
        }
        if let Some(dir) = partials_dir {
            self.paths.partials_dir = dir;
        }
        if let Some(path) = stylebook_path {
            self.paths.stylebook_path = path;
        }
        self.validate()
    }

    fn validate(&self) -> Result<(), ConfigError> {
        ensure_positive(self.block_max_chars, "BLOCK_MAX_CHARS")?;
        ensure_positive(self.max_list_items, "MAX_LIST_ITEMS")?;
        ensure_positive(self.block_concurrency, "BLOCK_CONCURRENCY")
    }

    /// Directory holding the stylebook, used for log lines.
    pub fn output_dir(&self) -> &Path {
        self.paths
            .stylebook_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
    }
}

fn ensure_positive(value: usize, key: &str) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidValue(key.to_string()));
    }
    Ok(())
}

fn parse_optional(value: Option<String>, key: &str) -> Result<Option<usize>, ConfigError> {
    value
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
}

fn parse_flag(value: Option<String>, key: &str) -> Result<Option<bool>, ConfigError> {
    value
        .map(|raw| match raw.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidValue(key.to_string())),
        })
        .transpose()
}

impl std::str::FromStr for GenerationProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "ollama" => Ok(Self::Ollama),
            _ => Err(()),
        }
    }
}
