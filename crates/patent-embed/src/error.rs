use std::path::{Path, PathBuf};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, EmbedError>;

#[derive(Error, Debug)]
pub enum EmbedError {
  #[error("I/O error on {path}: {source}")]
  Io {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("Malformed record on line {line} of {path}: {message}")]
  MalformedRecord { path: PathBuf, line: usize, message: String },

  #[error("Invalid configuration: {message}")]
  InvalidConfig { message: String },

  #[error("No API key found: pass --api-key, set OPENAI_API_KEY or write the key to {path}")]
  MissingApiKey { path: PathBuf },

  #[error("Tokenizer error: {message}")]
  Tokenizer { message: String },

  #[error("HTTP request failed: {message}")]
  Http { message: String },

  #[error("API returned {status}: {body}")]
  ApiStatus { status: u16, body: String },

  #[error("Malformed API response: {message}")]
  MalformedResponse { message: String },

  #[error("Task failed: {message}")]
  Task { message: String },
}

impl EmbedError {
  pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
    Self::Io { path: path.as_ref().to_path_buf(), source }
  }

  pub fn malformed_record(path: impl AsRef<Path>, line: usize, message: impl Into<String>) -> Self {
    Self::MalformedRecord { path: path.as_ref().to_path_buf(), line, message: message.into() }
  }

  pub fn invalid_config(message: impl Into<String>) -> Self {
    Self::InvalidConfig { message: message.into() }
  }

  pub fn missing_api_key(path: impl AsRef<Path>) -> Self {
    Self::MissingApiKey { path: path.as_ref().to_path_buf() }
  }

  pub fn tokenizer(message: impl Into<String>) -> Self {
    Self::Tokenizer { message: message.into() }
  }

  pub fn http(message: impl Into<String>) -> Self {
    Self::Http { message: message.into() }
  }

  pub fn api_status(status: u16, body: impl Into<String>) -> Self {
    Self::ApiStatus { status, body: body.into() }
  }

  pub fn malformed_response(message: impl Into<String>) -> Self {
    Self::MalformedResponse { message: message.into() }
  }

  pub fn task(message: impl Into<String>) -> Self {
    Self::Task { message: message.into() }
  }
}

impl From<reqwest::Error> for EmbedError {
  fn from(error: reqwest::Error) -> Self {
    Self::http(error.to_string())
  }
}
