//! OpenAI-compatible embedding provider and chat model.
//!
//! Available with the `openai` feature. Both types speak the REST API with
//! `reqwest`, so any server exposing `/embeddings` and `/chat/completions`
//! under the same base URL (a local inference server, a proxy) can stand in
//! for the hosted API.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::generation::GenerativeModel;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
/// Output size of `text-embedding-3-small`.
const DEFAULT_EMBEDDING_DIMENSIONS: usize = 1536;
const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";
/// Inputs per embeddings request; the API accepts up to 2048.
const EMBEDDING_BATCH_SIZE: usize = 256;

const API_KEY_VAR: &str = "OPENAI_API_KEY";

/// Connection shared by both API types.
#[derive(Clone)]
struct ApiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl ApiClient {
    fn new(api_key: String) -> std::result::Result<Self, String> {
        if api_key.trim().is_empty() {
            return Err("API key must not be empty".to_string());
        }
        Ok(Self { http: reqwest::Client::new(), api_key, base_url: DEFAULT_BASE_URL.to_string() })
    }

    fn from_env() -> std::result::Result<Self, String> {
        let key = std::env::var(API_KEY_VAR).map_err(|_| format!("{API_KEY_VAR} is not set"))?;
        Self::new(key)
    }

    fn set_base_url(&mut self, base_url: String) {
        self.base_url = base_url.trim_end_matches('/').to_string();
    }

    /// POST `body` to `path` and decode the JSON reply. Errors are plain
    /// messages; callers wrap them in their own [`RagError`] variant.
    async fn post<B, R>(&self, path: &str, body: &B) -> std::result::Result<R, String>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let url = format!("{}/{path}", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| format!("request to {url} failed: {e}"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ApiErrorBody>(&body)
                .map(|b| b.error.message)
                .unwrap_or(body);
            return Err(format!("{path} returned {status}: {detail}"));
        }

        response.json().await.map_err(|e| format!("unreadable {path} response: {e}"))
    }
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// [`EmbeddingProvider`] backed by the embeddings endpoint.
///
/// Defaults to `text-embedding-3-small` (1536 dimensions). Use
/// [`with_dimensions`](Self::with_dimensions) to request shorter vectors.
///
/// ```rust,ignore
/// let provider = OpenAIEmbeddingProvider::from_env()?.with_dimensions(512);
/// ```
pub struct OpenAIEmbeddingProvider {
    api: ApiClient,
    model: String,
    dimensions: usize,
    truncate_to: Option<usize>,
}

impl OpenAIEmbeddingProvider {
    /// Create a provider authenticated with `api_key`.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        ApiClient::new(api_key.into()).map(Self::with_client).map_err(Self::setup_error)
    }

    /// Create a provider authenticated from `OPENAI_API_KEY`.
    pub fn from_env() -> Result<Self> {
        ApiClient::from_env().map(Self::with_client).map_err(Self::setup_error)
    }

    fn with_client(api: ApiClient) -> Self {
        Self {
            api,
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
            truncate_to: None,
        }
    }

    fn setup_error(message: String) -> RagError {
        RagError::EmbeddingError { provider: "OpenAI".to_string(), message }
    }

    /// Use another embedding model.
    ///
    /// Call [`with_dimensions`](Self::with_dimensions) as well when the
    /// model's native size is not 1536.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Send requests to another OpenAI-compatible server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.api.set_base_url(base_url.into());
        self
    }

    /// Ask the server for `dims`-long vectors and report that size from
    /// [`dimensions`](EmbeddingProvider::dimensions).
    pub fn with_dimensions(mut self, dims: usize) -> Self {
        self.dimensions = dims;
        self.truncate_to = Some(dims);
        self
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text]).await?.pop().ok_or_else(|| RagError::EmbeddingError {
            provider: "OpenAI".to_string(),
            message: "embeddings response was empty".to_string(),
        })
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(model = %self.model, batch_size = texts.len(), "requesting embeddings");

        let request =
            EmbeddingRequest { model: &self.model, input: texts, dimensions: self.truncate_to };
        let mut response: EmbeddingResponse =
            self.api.post("embeddings", &request).await.map_err(|message| {
                error!(model = %self.model, error = %message, "embeddings request failed");
                RagError::EmbeddingError { provider: "OpenAI".to_string(), message }
            })?;

        // The API may answer out of input order.
        response.data.sort_by_key(|item| item.index);
        Ok(response.data.into_iter().map(|item| item.embedding).collect())
    }

    fn max_batch_size(&self) -> usize {
        EMBEDDING_BATCH_SIZE
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "OpenAI"
    }
}

/// [`GenerativeModel`] backed by the chat completions endpoint.
///
/// The prompt goes out as a single user message at temperature 0, so asking
/// the same question twice yields the same answer in practice.
pub struct OpenAIChatModel {
    api: ApiClient,
    model: String,
}

impl OpenAIChatModel {
    /// Create a client authenticated with `api_key`.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        ApiClient::new(api_key.into()).map(Self::with_client).map_err(Self::setup_error)
    }

    /// Create a client authenticated from `OPENAI_API_KEY`.
    pub fn from_env() -> Result<Self> {
        ApiClient::from_env().map(Self::with_client).map_err(Self::setup_error)
    }

    fn with_client(api: ApiClient) -> Self {
        Self { api, model: DEFAULT_CHAT_MODEL.to_string() }
    }

    fn setup_error(message: String) -> RagError {
        RagError::GenerationError { model: DEFAULT_CHAT_MODEL.to_string(), message }
    }

    /// Use another chat model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Send requests to another OpenAI-compatible server.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.api.set_base_url(base_url.into());
        self
    }
}

#[async_trait]
impl GenerativeModel for OpenAIChatModel {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        debug!(model = %self.model, prompt_chars = prompt.chars().count(), "requesting completion");

        let request = ChatRequest {
            model: &self.model,
            messages: [ChatMessage { role: "user", content: prompt }],
            temperature: 0.0,
        };
        let failure = |message: String| {
            error!(model = %self.model, error = %message, "chat request failed");
            RagError::GenerationError { model: self.model.clone(), message }
        };

        let response: ChatResponse =
            self.api.post("chat/completions", &request).await.map_err(failure)?;
        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| failure("completion had no message content".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_api_keys_are_rejected() {
        assert!(matches!(OpenAIEmbeddingProvider::new(" "), Err(RagError::EmbeddingError { .. })));
        assert!(matches!(OpenAIChatModel::new(""), Err(RagError::GenerationError { .. })));
    }

    #[test]
    fn overrides_apply() {
        let provider = OpenAIEmbeddingProvider::new("sk-test")
            .unwrap()
            .with_base_url("http://localhost:8080/v1/")
            .with_dimensions(768);
        assert_eq!(provider.dimensions(), 768);
        assert_eq!(provider.api.base_url, "http://localhost:8080/v1");

        let model = OpenAIChatModel::new("sk-test").unwrap().with_model("gpt-4o");
        assert_eq!(model.name(), "gpt-4o");
    }

    #[test]
    fn embedding_request_omits_unset_dimensions() {
        let input = ["SEC. 4. GRANTS."];
        let request = EmbeddingRequest { model: "m", input: &input, dimensions: None };
        let json = serde_json::to_value(&request).unwrap();
        assert!(json.get("dimensions").is_none());
        assert_eq!(json["input"][0], "SEC. 4. GRANTS.");
    }

    #[test]
    fn chat_request_is_one_user_message_at_temperature_zero() {
        let request = ChatRequest {
            model: "gpt-4o-mini",
            messages: [ChatMessage { role: "user", content: "hi" }],
            temperature: 0.0,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["messages"].as_array().map(Vec::len), Some(1));
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["temperature"], 0.0);
    }
}
