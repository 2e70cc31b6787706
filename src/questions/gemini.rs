//! Generative question source backed by the Gemini `generateContent` API.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::{build_binary_question_prompt, non_empty, QuestionError, QuestionSource};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_MODEL: &str = "gemini-1.5-flash";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Per-concept learning material stored as `<dir>/<concept>.txt`.
#[derive(Debug, Clone)]
pub struct MaterialLibrary {
    root: PathBuf,
}

impl MaterialLibrary {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Learning material for `concept`, or `None` if there is no file for it.
    pub async fn material_for(&self, concept: &str) -> Result<Option<String>, QuestionError> {
        // Concept names become file names; refuse anything that could leave the root.
        if concept.is_empty()
            || concept.contains(['/', '\\'])
            || concept.starts_with('.')
        {
            return Ok(None);
        }

        let path = self.root.join(format!("{}.txt", concept));
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(non_empty(&text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

pub struct GeminiQuestions {
    api_key: String,
    model: String,
    base_url: String,
    materials: MaterialLibrary,
    client: reqwest::Client,
}

impl GeminiQuestions {
    pub fn new(
        api_key: impl Into<String>,
        model: Option<String>,
        base_url: Option<String>,
        materials: MaterialLibrary,
    ) -> Result<Self, QuestionError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| QuestionError::Network(e.to_string()))?;

        Ok(Self {
            api_key: api_key.into(),
            model: model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            materials,
            client,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: String) -> Result<String, QuestionError> {
        let body = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(format!(
                "{}/v1beta/models/{}:generateContent",
                self.base_url, self.model
            ))
            .query(&[("key", &self.api_key)])
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    QuestionError::Timeout(DEFAULT_TIMEOUT_SECS)
                } else {
                    QuestionError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        if status >= 400 {
            let message = response.text().await.unwrap_or_default();
            return Err(QuestionError::Api { status, message });
        }

        let parsed: GenerateResponse = response.json().await.map_err(|e| QuestionError::Api {
            status: 0,
            message: format!("failed to parse response: {e}"),
        })?;

        Ok(parsed
            .candidates
            .into_iter()
            .next()
            .map(|c| {
                c.content
                    .parts
                    .into_iter()
                    .map(|p| p.text)
                    .collect::<String>()
            })
            .unwrap_or_default())
    }
}

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Serialize, Deserialize, Default)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Content,
}

#[async_trait]
impl QuestionSource for GeminiQuestions {
    fn name(&self) -> &str {
        "gemini"
    }

    #[instrument(skip(self), fields(model = %self.model))]
    async fn binary_question(&self, concept: &str) -> Result<Option<String>, QuestionError> {
        let Some(material) = self.materials.material_for(concept).await? else {
            tracing::debug!("No learning material for concept");
            return Ok(None);
        };

        let prompt = build_binary_question_prompt(concept, &material);
        let text = self.generate(prompt).await?;
        Ok(non_empty(&text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn library_with(concept: &str, text: &str) -> (tempfile::TempDir, MaterialLibrary) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(format!("{}.txt", concept)), text).unwrap();
        let library = MaterialLibrary::new(dir.path());
        (dir, library)
    }

    fn candidate(text: &str) -> serde_json::Value {
        serde_json::json!({
            "candidates": [{ "content": { "parts": [{ "text": text }], "role": "model" } }]
        })
    }

    #[tokio::test]
    async fn generates_question_from_material() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-1.5-flash:generateContent"))
            .and(query_param("key", "test-key"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(candidate("  Can a stack implement recursion?\n")),
            )
            .expect(1)
            .mount(&server)
            .await;

        let (_dir, library) = library_with("Stacks", "Stacks are last-in first-out.");
        let source = GeminiQuestions::new("test-key", None, Some(server.uri()), library).unwrap();

        let question = source.binary_question("Stacks").await.unwrap();
        assert_eq!(question.as_deref(), Some("Can a stack implement recursion?"));
    }

    #[tokio::test]
    async fn configured_model_selects_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.0-pro:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(candidate("Is a queue FIFO?")))
            .expect(1)
            .mount(&server)
            .await;

        let (_dir, library) = library_with("Queues", "Queues are first-in first-out.");
        let source = GeminiQuestions::new(
            "k",
            Some("gemini-2.0-pro".to_string()),
            Some(server.uri()),
            library,
        )
        .unwrap();

        assert_eq!(source.model(), "gemini-2.0-pro");
        let question = source.binary_question("Queues").await.unwrap();
        assert_eq!(question.as_deref(), Some("Is a queue FIFO?"));
    }

    #[test]
    fn defaults_to_flash_model() {
        let source =
            GeminiQuestions::new("k", None, None, MaterialLibrary::new("materials")).unwrap();
        assert_eq!(source.model(), DEFAULT_MODEL);
    }

    #[tokio::test]
    async fn missing_material_skips_the_model() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(candidate("unused")))
            .expect(0)
            .mount(&server)
            .await;

        let (_dir, library) = library_with("Stacks", "Stacks are LIFO.");
        let source = GeminiQuestions::new("k", None, Some(server.uri()), library).unwrap();

        assert!(source.binary_question("Queues").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn empty_generation_is_no_question() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(candidate("   ")))
            .mount(&server)
            .await;

        let (_dir, library) = library_with("Heaps", "A heap is a tree.");
        let source = GeminiQuestions::new("k", None, Some(server.uri()), library).unwrap();

        assert!(source.binary_question("Heaps").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn api_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("quota exceeded"))
            .mount(&server)
            .await;

        let (_dir, library) = library_with("Tries", "A trie stores prefixes.");
        let source = GeminiQuestions::new("k", None, Some(server.uri()), library).unwrap();

        let err = source.binary_question("Tries").await.unwrap_err();
        assert!(matches!(err, QuestionError::Api { status: 500, .. }));
    }

    #[tokio::test]
    async fn material_lookup_rejects_path_like_concepts() {
        let (_dir, library) = library_with("Graphs", "Nodes and edges.");

        assert!(library.material_for("../Graphs").await.unwrap().is_none());
        assert!(library.material_for("a/b").await.unwrap().is_none());
        assert_eq!(
            library.material_for("Graphs").await.unwrap().as_deref(),
            Some("Nodes and edges.")
        );
    }
}
