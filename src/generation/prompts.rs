//! Prompt templates for block analysis and fusion.
//!
//! Templates use `{{name}}` and `{{name|default}}` placeholders. The JSON schemas embedded in the
//! prompts describe the shape we ask for; the mining engine never relies on it.

use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::sync::LazyLock;

/// Named substitutions interpolated into a template.
pub type PromptVariables = BTreeMap<String, String>;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{(\w+)(?:\|([^}]+))?\}\}").expect("placeholder pattern is valid")
});

/// Identifies one of the prompt templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateKey {
    /// Analyze a single block of transcript text.
    BlockAnalysis,
    /// Consolidate the ordered list of block analyses.
    Fusion,
}

impl TemplateKey {
    /// Stable identifier used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BlockAnalysis => "mine_style_block",
            Self::Fusion => "mine_style_fusion",
        }
    }

    /// Raw template text.
    pub fn template(&self) -> &'static str {
        match self {
            Self::BlockAnalysis => BLOCK_ANALYSIS_TEMPLATE,
            Self::Fusion => FUSION_TEMPLATE,
        }
    }
}

/// Substitute placeholders in `template`.
///
/// A missing variable falls back to its inline default, or to the empty string.
pub fn render_template(template: &str, variables: &PromptVariables) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            let key = &caps[1];
            variables
                .get(key)
                .cloned()
                .or_else(|| caps.get(2).map(|default| default.as_str().to_string()))
                .unwrap_or_default()
        })
        .into_owned()
}

const BLOCK_ANALYSIS_TEMPLATE: &str = r#"
You are a style analyst. Analyze ONLY the excerpt below and answer with **valid** JSON (no markdown, no explanations).
Output language: {{language|pt-BR}}.

Goal: extract the author's style signals.

RULES:
- Answer ONLY with JSON; no extra text.
- Without evidence, use null or [].
- Limit every list to at most {{max_items|10}} items, ordered by relevance.
- Do not invent; rely on the excerpt only.
- Prefer detecting joke structure (setup -> incongruity -> punch) and point at punch candidates in "joke_structures.example".
- When you detect a "rule of three" or a "callback", reflect it in "comic_rhythm" and "joke_structures.format".

RESPONSE SCHEMA (copy the structure exactly):
{
  "tone": "string | null",
  "humor": "string | null",
  "rhythm": "string | null",
  "comic_rhythm": "short_setup_fast_punch|late_punch|rule_of_three|escalation|improv|mixed|null",
  "joke_structures": [
    {"format": "setup_punch|dry_irony|hyperbole|absurd_comparison|callback|anti_humor|sarcasm|observational",
     "example": "string",
     "lexical_markers": ["string", "string"]}
  ],
  "comic_triggers": [
    {"type": "incongruity|taboo|insult|self_deprecation|scatological|political|absurd",
     "intensity": "low|medium|high",
     "example": "string"}
  ],
  "phrase_templates": [
    {"template": "You know what's worse? ...", "use": "transition_to_punch|open_setup|close_with_mockery"}
  ],
  "verbal_tics": [{"text": "string", "example": "string"}],
  "discourse_markers": [{"text": "string", "estimated_frequency": "low|medium|high"}],
  "catchphrases": [{"text": "string", "example": "string"}],
  "interjections": [{"text": "string"}],
  "recurring_themes": [{"theme": "string"}],
  "emphasis": {
    "all_caps": "low|medium|high|null",
    "elongated_pauses": "low|medium|high|null"
  },
  "representative_examples": ["string"],
  "overall_confidence": 0.0
}

EXCERPT:
{{excerpt}}
"#;

const FUSION_TEMPLATE: &str = r#"
You are a style consolidator. You will receive several partial analyses (JSON) of the same author.
Output: a SINGLE **valid** JSON (no markdown), language {{language|pt-BR}}.

TASK:
- Unify fields consistently; deduplicate items (case-insensitive, trimmed).
- Aggregate relevance: prefer what recurs most across analyses.
- Do not invent new items; use only what is in the inputs.
- Limit every list to at most {{max_items|15}} items, ordered by relevance.
- Provide "overall_confidence" (0-1) reflecting agreement between partials.
- On conflict pick the consensus; without one, keep both views with a short note in "notes".
- Merge "joke_structures", "comic_triggers" and "phrase_templates" by summing recurrence; deduplicate by form and synonyms.

FINAL SCHEMA (copy the structure exactly):
{
  "tone": "string | null",
  "humor": "string | null",
  "rhythm": "string | null",
  "comic_rhythm": "short_setup_fast_punch|late_punch|rule_of_three|escalation|improv|mixed|null",
  "joke_structures": [{"format": "string", "example": "string", "lexical_markers": ["string"], "weight": 0.0}],
  "comic_triggers": [{"type": "string", "intensity": "low|medium|high", "example": "string", "weight": 0.0}],
  "phrase_templates": [{"template": "string", "use": "string", "weight": 0.0}],
  "verbal_tics": [{"text": "string", "example": "string"}],
  "discourse_markers": [{"text": "string", "weight": 0.0}],
  "catchphrases": [{"text": "string", "example": "string", "weight": 0.0}],
  "interjections": [{"text": "string", "weight": 0.0}],
  "recurring_themes": [{"theme": "string", "weight": 0.0}],
  "emphasis": {
    "all_caps": "low|medium|high|null",
    "elongated_pauses": "low|medium|high|null"
  },
  "representative_examples": ["string"],
  "notes": "string | null",
  "overall_confidence": 0.0
}

INPUTS (list of partial JSON analyses):
{{analyses}}
"#;
