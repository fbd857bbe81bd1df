use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use httpmock::{Method::POST, MockServer};
use serde_json::{Value, json};
use stylemine::{
    config::Config,
    generation::{
        AnalysisCapability, GenerationClientError, OllamaGenerationClient, PromptEngine,
        PromptVariables, TemplateKey,
    },
    mining::{MiningError, RunState, StyleMiner},
};
use tempfile::TempDir;

/// Fake provider: block excerpts starting with `FAIL` raise, fusion answers with a fixed payload.
struct FakeCapability {
    fusion_reply: String,
    calls: Mutex<Vec<(TemplateKey, PromptVariables)>>,
}

impl FakeCapability {
    fn new(fusion_reply: impl Into<String>) -> Self {
        Self {
            fusion_reply: fusion_reply.into(),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<(TemplateKey, PromptVariables)> {
        self.calls.lock().expect("lock").clone()
    }

    fn block_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|(template, _)| *template == TemplateKey::BlockAnalysis)
            .count()
    }
}

#[async_trait]
impl AnalysisCapability for FakeCapability {
    async fn invoke(
        &self,
        template: TemplateKey,
        variables: &PromptVariables,
    ) -> Result<String, GenerationClientError> {
        self.calls
            .lock()
            .expect("lock")
            .push((template, variables.clone()));
        match template {
            TemplateKey::BlockAnalysis => {
                let excerpt = variables.get("excerpt").cloned().unwrap_or_default();
                if excerpt.starts_with("FAIL") {
                    return Err(GenerationClientError::GenerationFailed(
                        "HTTP 503 upstream overloaded".into(),
                    ));
                }
                let head: String = excerpt.chars().take(8).collect();
                Ok(json!({ "tone": head, "catchphrases": [{"text": "right?"}] }).to_string())
            }
            TemplateKey::Fusion => Ok(self.fusion_reply.clone()),
        }
    }
}

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir_all(dir.path().join("data").join("cleaned")).expect("cleaned dir");
        Self { dir }
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn add_transcript(&self, name: &str, body: &str) {
        std::fs::write(self.root().join("data").join("cleaned").join(name), body)
            .expect("write transcript");
    }

    fn config(&self, extra: &[(&str, &str)]) -> Config {
        let root = self.root().display().to_string();
        let mut pairs = vec![
            ("GENERATION_PROVIDER".to_string(), "ollama".to_string()),
            ("STYLEMINE_BASE_DIR".to_string(), root),
            ("OUTPUT_LANGUAGE".to_string(), "en-US".to_string()),
        ];
        pairs.extend(
            extra
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string())),
        );
        Config::from_lookup(move |key| {
            pairs
                .iter()
                .find(|(candidate, _)| candidate == key)
                .map(|(_, value)| value.clone())
        })
        .expect("config")
    }

    fn read_json(&self, relative: &str) -> Value {
        let body = std::fs::read_to_string(self.root().join(relative)).expect("read json");
        serde_json::from_str(&body).expect("valid json")
    }
}

fn line(fill: char, len: usize) -> String {
    std::iter::repeat_n(fill, len).collect()
}

#[tokio::test]
async fn long_lines_each_become_a_block() {
    let workspace = Workspace::new();
    let body = [line('a', 2000), line('b', 2000), line('c', 2000)].join("\n");
    workspace.add_transcript("show.txt", &body);
    let config = workspace.config(&[("BLOCK_MAX_CHARS", "3000")]);
    let capability = FakeCapability::new(r#"{"tone": "dry"}"#);

    let outcome = StyleMiner::new(&config, &capability)
        .run()
        .await
        .expect("run");

    assert_eq!(outcome.block_count, 3);
    assert_eq!(outcome.document_count, 1);
    assert_eq!(outcome.corpus_chars, 6002);
    assert_eq!(outcome.corpus_sha256.len(), 64);
    assert_eq!(outcome.final_state, RunState::Persisted);
    assert_eq!(outcome.metrics.blocks_analyzed, 3);
    assert_eq!(outcome.metrics.succeeded(), 3);
    assert!(!outcome.artifact_failed);
    assert_eq!(capability.block_calls(), 3);

    let stylebook = workspace.read_json("data/stylebook.json");
    assert_eq!(stylebook["tone"], json!("dry"));
    assert_eq!(stylebook["version"], json!("2.0-blocks"));
    assert_eq!(stylebook["_source"], json!("block_fusion"));
    assert!(stylebook["generated_at"].is_string());
}

#[tokio::test]
async fn empty_corpus_aborts_before_any_call() {
    let workspace = Workspace::new();
    workspace.add_transcript("blank.txt", "   \n\n  ");
    workspace.add_transcript("notes.md", "ignored because it is not a transcript");
    let config = workspace.config(&[]);
    let capability = FakeCapability::new("{}");

    let miner = StyleMiner::new(&config, &capability);
    let error = miner.run().await.expect_err("empty corpus must abort");

    assert!(matches!(error, MiningError::EmptyCorpus { .. }));
    assert_eq!(miner.state(), RunState::Failed);
    assert!(capability.calls().is_empty());
    let stylebook = workspace.root().join("data").join("stylebook.json");
    assert!(!stylebook.exists());
}

#[tokio::test]
async fn failed_block_is_recorded_in_place() {
    let workspace = Workspace::new();
    workspace.add_transcript(
        "show.txt",
        "first block line\nFAIL second line\nthird block line",
    );
    let config = workspace.config(&[("BLOCK_MAX_CHARS", "20")]);
    let capability = FakeCapability::new(r#"{"tone": "mixed"}"#);

    let outcome = StyleMiner::new(&config, &capability)
        .run()
        .await
        .expect("run");

    assert_eq!(outcome.block_count, 3);
    assert_eq!(outcome.metrics.invocation_failures, 1);
    assert_eq!(outcome.metrics.succeeded(), 2);
    assert_eq!(outcome.final_state, RunState::Persisted);

    let calls = capability.calls();
    let (template, variables) = calls.last().expect("fusion call");
    assert_eq!(*template, TemplateKey::Fusion);
    let analyses: Vec<Value> =
        serde_json::from_str(variables.get("analyses").expect("analyses")).expect("json list");
    assert_eq!(analyses.len(), 3);
    assert_eq!(analyses[0]["tone"], json!("first bl"));
    assert_eq!(analyses[1]["_invocation_error"], json!(true));
    assert!(
        analyses[1]["_message"]
            .as_str()
            .expect("message")
            .contains("HTTP 503")
    );
    assert_eq!(analyses[2]["tone"], json!("third bl"));
    assert_eq!(variables.get("max_items").map(String::as_str), Some("25"));

    let partial = workspace.read_json("data/partials/stylebook_partial_02.json");
    assert_eq!(partial["_invocation_error"], json!(true));
    assert!(
        workspace
            .root()
            .join("data/partials/stylebook_partial_03.json")
            .exists()
    );
}

#[tokio::test]
async fn undecodable_fusion_falls_back_with_provenance() {
    let workspace = Workspace::new();
    workspace.add_transcript("show.txt", "a short line\nanother line");
    let config = workspace.config(&[]);
    let capability = FakeCapability::new("not json");

    let outcome = StyleMiner::new(&config, &capability)
        .run()
        .await
        .expect("run");

    assert!(outcome.artifact_failed);
    let stylebook = workspace.read_json("data/stylebook.json");
    assert_eq!(stylebook["_parse_error"], json!(true));
    assert_eq!(stylebook["_response_sample"], json!("not json"));
    assert_eq!(stylebook["version"], json!("2.0-blocks"));
    assert_eq!(stylebook["_source"], json!("block_fusion"));
    assert!(stylebook["generated_at"].is_string());
}

#[tokio::test]
async fn partials_can_be_disabled_and_reruns_overwrite() {
    let workspace = Workspace::new();
    workspace.add_transcript("show.txt", "only line");
    let config = workspace.config(&[("SAVE_PARTIALS", "false")]);

    let first = FakeCapability::new(r#"{"tone": "first"}"#);
    StyleMiner::new(&config, &first)
        .run()
        .await
        .expect("first run");
    let second = FakeCapability::new(r#"{"tone": "second"}"#);
    let outcome = StyleMiner::new(&config, &second)
        .run()
        .await
        .expect("second run");

    assert_eq!(outcome.metrics.partials_written, 0);
    assert!(!workspace.root().join("data").join("partials").exists());
    let stylebook = workspace.read_json("data/stylebook.json");
    assert_eq!(stylebook["tone"], json!("second"));
}

#[tokio::test]
async fn cleanup_runs_before_segmentation_when_enabled() {
    let workspace = Workspace::new();
    workspace.add_transcript("show.txt", "00:01:02 [applause] hello    there");
    let config = workspace.config(&[("CLEAN_FIRST", "true")]);
    let capability = FakeCapability::new("{}");

    StyleMiner::new(&config, &capability)
        .run()
        .await
        .expect("run");

    let calls = capability.calls();
    let (_, variables) = calls.first().expect("block call");
    assert_eq!(
        variables.get("excerpt").map(String::as_str),
        Some("hello there")
    );
}

#[tokio::test]
async fn full_run_against_mock_ollama() {
    let server = MockServer::start_async().await;
    let block_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/generate")
                .body_contains("Analyze ONLY the excerpt");
            then.status(200).json_body(json!({
                "model": "llama3",
                "response": "{\"tone\": \"playful\"}",
                "done": true
            }));
        })
        .await;
    let fusion_mock = server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/generate")
                .body_contains("You are a style consolidator");
            then.status(200).json_body(json!({
                "model": "llama3",
                "response": "```json\n{\"tone\": \"playful overall\"}\n```",
                "done": true
            }));
        })
        .await;

    let workspace = Workspace::new();
    workspace.add_transcript("show.txt", "one\ntwo\nthree");
    let config = workspace.config(&[("BLOCK_MAX_CHARS", "3"), ("GENERATION_MODEL", "llama3")]);
    let engine = PromptEngine::new(
        Box::new(OllamaGenerationClient::new(server.base_url())),
        config.generation_model.clone(),
    );

    let outcome = StyleMiner::new(&config, &engine).run().await.expect("run");

    block_mock.assert_hits_async(3).await;
    fusion_mock.assert_hits_async(1).await;
    assert_eq!(outcome.block_count, 3);
    assert_eq!(outcome.metrics.succeeded(), 3);
    let stylebook = workspace.read_json("data/stylebook.json");
    assert_eq!(stylebook["tone"], json!("playful overall"));
    let partial = workspace.read_json("data/partials/stylebook_partial_01.json");
    assert_eq!(partial["tone"], json!("playful"));
}
