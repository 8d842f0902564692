//! HTTP client for the OpenAI embeddings and chat completion endpoints

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{EmbedError, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_CHAT_MODEL: &str = "gpt-3.5-turbo";

/// Embedding models and their limits
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum EmbeddingModel {
  #[default]
  #[serde(rename = "text-embedding-ada-002")]
  #[value(name = "text-embedding-ada-002")]
  Ada002,
  #[serde(rename = "text-embedding-3-small")]
  #[value(name = "text-embedding-3-small")]
  Small3,
  #[serde(rename = "text-embedding-3-large")]
  #[value(name = "text-embedding-3-large")]
  Large3,
}

impl EmbeddingModel {
  pub fn as_str(&self) -> &'static str {
    match self {
      EmbeddingModel::Ada002 => "text-embedding-ada-002",
      EmbeddingModel::Small3 => "text-embedding-3-small",
      EmbeddingModel::Large3 => "text-embedding-3-large",
    }
  }

  pub fn dimensions(&self) -> usize {
    match self {
      EmbeddingModel::Ada002 | EmbeddingModel::Small3 => 1536,
      EmbeddingModel::Large3 => 3072,
    }
  }

  pub fn max_tokens(&self) -> usize {
    8191
  }
}

impl std::fmt::Display for EmbeddingModel {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Remote calls the batch jobs depend on
#[async_trait]
pub trait EmbeddingService: Send + Sync {
  /// Embedding vector of one text
  async fn embed(&self, text: &str) -> Result<Vec<f32>>;

  /// Raw chat completion response for a system/user prompt pair
  async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<serde_json::Value>;
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
  pub base_url: String,
  pub api_key: String,
  pub embedding_model: EmbeddingModel,
  pub chat_model: String,
}

impl ClientConfig {
  pub fn new(api_key: impl Into<String>) -> Self {
    Self {
      base_url: DEFAULT_BASE_URL.to_string(),
      api_key: api_key.into(),
      embedding_model: EmbeddingModel::default(),
      chat_model: DEFAULT_CHAT_MODEL.to_string(),
    }
  }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
  input: &'a str,
  model: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
  data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
  embedding: Vec<f32>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
  model: &'a str,
  messages: [ChatMessage<'a>; 2],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
  role: &'static str,
  content: &'a str,
}

pub struct OpenAiClient {
  client: Client,
  config: ClientConfig,
}

impl OpenAiClient {
  pub fn new(config: ClientConfig) -> Result<Self> {
    // Per-call deadlines are applied by the caller; this only guards against hung sockets
    let client = Client::builder()
      .connect_timeout(Duration::from_secs(30))
      .build()
      .map_err(|e| EmbedError::http(format!("failed to create HTTP client: {e}")))?;
    Ok(Self { client, config })
  }

  fn url(&self, endpoint: &str) -> String {
    format!("{}/{endpoint}", self.config.base_url.trim_end_matches('/'))
  }

  async fn send<T: Serialize + ?Sized>(&self, endpoint: &str, body: &T) -> Result<(StatusCode, String)> {
    let response = self
      .client
      .post(self.url(endpoint))
      .bearer_auth(&self.config.api_key)
      .json(body)
      .send()
      .await?;

    let status = response.status();
    let text = response.text().await?;
    Ok((status, text))
  }

  async fn post<T: Serialize + ?Sized>(&self, endpoint: &str, body: &T) -> Result<String> {
    let (status, text) = self.send(endpoint, body).await?;
    if !status.is_success() {
      return Err(EmbedError::api_status(status.as_u16(), text));
    }
    Ok(text)
  }
}

#[async_trait]
impl EmbeddingService for OpenAiClient {
  async fn embed(&self, text: &str) -> Result<Vec<f32>> {
    let request = EmbeddingRequest { input: text, model: self.config.embedding_model.as_str() };
    let body = self.post("embeddings", &request).await?;

    let response: EmbeddingResponse = serde_json::from_str(&body)
      .map_err(|e| EmbedError::malformed_response(format!("embeddings: {e}")))?;
    response
      .data
      .into_iter()
      .next()
      .map(|data| data.embedding)
      .ok_or_else(|| EmbedError::malformed_response("embeddings: empty data array"))
  }

  /// Error statuses with a JSON body (rate limits, server errors) come back as that
  /// prompt's response instead of failing the whole run.
  async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<serde_json::Value> {
    let request = ChatRequest {
      model: &self.config.chat_model,
      messages: [
        ChatMessage { role: "system", content: system_prompt },
        ChatMessage { role: "user", content: user_prompt },
      ],
    };
    let (status, body) = self.send("chat/completions", &request).await?;

    match serde_json::from_str::<serde_json::Value>(&body) {
      Ok(response) => {
        if !status.is_success() {
          tracing::warn!("chat completion returned {status}: {body}");
        }
        Ok(response)
      }
      Err(_) if !status.is_success() => Err(EmbedError::api_status(status.as_u16(), body)),
      Err(e) => Err(EmbedError::malformed_response(format!("chat completion: {e}"))),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use mockito::{Matcher, Server};

  fn client_for(server: &Server) -> OpenAiClient {
    let config = ClientConfig { base_url: server.url(), ..ClientConfig::new("sk-test") };
    OpenAiClient::new(config).unwrap()
  }

  #[test]
  fn test_model_limits() {
    assert_eq!(EmbeddingModel::Ada002.dimensions(), 1536);
    assert_eq!(EmbeddingModel::Small3.dimensions(), 1536);
    assert_eq!(EmbeddingModel::Large3.dimensions(), 3072);
    assert_eq!(EmbeddingModel::Large3.max_tokens(), 8191);
    assert_eq!(EmbeddingModel::default().to_string(), "text-embedding-ada-002");
  }

  #[test]
  fn test_model_serializes_to_api_name() {
    let json = serde_json::to_string(&EmbeddingModel::Small3).unwrap();
    assert_eq!(json, "\"text-embedding-3-small\"");
    let parsed: EmbeddingModel = serde_json::from_str("\"text-embedding-3-large\"").unwrap();
    assert_eq!(parsed, EmbeddingModel::Large3);
  }

  #[tokio::test]
  async fn test_embed_success() {
    let mut server = Server::new_async().await;
    let mock = server
      .mock("POST", "/embeddings")
      .match_header("authorization", "Bearer sk-test")
      .match_body(Matcher::Json(serde_json::json!({
        "input": "a rotary valve",
        "model": "text-embedding-ada-002"
      })))
      .with_status(200)
      .with_header("content-type", "application/json")
      .with_body(r#"{"object":"list","data":[{"object":"embedding","index":0,"embedding":[0.25,-0.5,1.0]}],"model":"text-embedding-ada-002"}"#)
      .create_async()
      .await;

    let embedding = client_for(&server).embed("a rotary valve").await.unwrap();
    assert_eq!(embedding, vec![0.25, -0.5, 1.0]);
    mock.assert_async().await;
  }

  #[tokio::test]
  async fn test_embed_error_status() {
    let mut server = Server::new_async().await;
    let _mock = server
      .mock("POST", "/embeddings")
      .with_status(429)
      .with_body(r#"{"error":{"message":"Rate limit reached"}}"#)
      .create_async()
      .await;

    let error = client_for(&server).embed("text").await.unwrap_err();
    match error {
      EmbedError::ApiStatus { status, body } => {
        assert_eq!(status, 429);
        assert!(body.contains("Rate limit"));
      }
      other => panic!("Expected ApiStatus error, got: {other:?}"),
    }
  }

  #[tokio::test]
  async fn test_embed_malformed_and_empty_responses() {
    let mut server = Server::new_async().await;
    let _bad = server
      .mock("POST", "/embeddings")
      .match_body(Matcher::PartialJson(serde_json::json!({"input": "bad"})))
      .with_status(200)
      .with_body("invalid json")
      .create_async()
      .await;
    let _empty = server
      .mock("POST", "/embeddings")
      .match_body(Matcher::PartialJson(serde_json::json!({"input": "empty"})))
      .with_status(200)
      .with_body(r#"{"data":[]}"#)
      .create_async()
      .await;

    let client = client_for(&server);
    assert!(matches!(client.embed("bad").await, Err(EmbedError::MalformedResponse { .. })));
    assert!(matches!(client.embed("empty").await, Err(EmbedError::MalformedResponse { .. })));
  }

  #[tokio::test]
  async fn test_complete_sends_system_and_user_messages() {
    let mut server = Server::new_async().await;
    let mock = server
      .mock("POST", "/chat/completions")
      .match_body(Matcher::Json(serde_json::json!({
        "model": "gpt-3.5-turbo",
        "messages": [
          {"role": "system", "content": "You are a patent examiner."},
          {"role": "user", "content": "Summarize claim 1."}
        ]
      })))
      .with_status(200)
      .with_body(r#"{"id":"chatcmpl-1","choices":[{"index":0,"message":{"role":"assistant","content":"A valve."}}]}"#)
      .create_async()
      .await;

    let response = client_for(&server)
      .complete("You are a patent examiner.", "Summarize claim 1.")
      .await
      .unwrap();
    assert_eq!(response["choices"][0]["message"]["content"], "A valve.");
    mock.assert_async().await;
  }

  #[tokio::test]
  async fn test_chat_error_status_kept_as_response() {
    let mut server = Server::new_async().await;
    let _ok = server
      .mock("POST", "/chat/completions")
      .match_body(Matcher::Regex("first".to_string()))
      .with_status(200)
      .with_body(r#"{"choices":[{"message":{"role":"assistant","content":"done"}}]}"#)
      .create_async()
      .await;
    let _limited = server
      .mock("POST", "/chat/completions")
      .match_body(Matcher::Regex("second".to_string()))
      .with_status(429)
      .with_body(r#"{"error":{"message":"Rate limit reached","type":"requests"}}"#)
      .create_async()
      .await;

    let client = client_for(&server);
    let prompts = vec!["first".to_string(), "second".to_string()];
    let responses = crate::parallel::complete_all(&client, "sys", &prompts, 1, Duration::ZERO)
      .await
      .unwrap();

    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0]["choices"][0]["message"]["content"], "done");
    assert_eq!(responses[1]["error"]["message"], "Rate limit reached");
  }

  #[tokio::test]
  async fn test_chat_error_without_json_body_aborts() {
    let mut server = Server::new_async().await;
    let _mock = server
      .mock("POST", "/chat/completions")
      .with_status(502)
      .with_body("Bad Gateway")
      .create_async()
      .await;

    let error = client_for(&server).complete("sys", "user").await.unwrap_err();
    assert!(matches!(error, EmbedError::ApiStatus { status: 502, .. }));
  }

  #[test]
  fn test_url_joins_without_double_slash() {
    let config = ClientConfig { base_url: "http://localhost:9/v1/".to_string(), ..ClientConfig::new("k") };
    let client = OpenAiClient::new(config).unwrap();
    assert_eq!(client.url("embeddings"), "http://localhost:9/v1/embeddings");
  }
}
