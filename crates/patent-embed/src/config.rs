//! Run configuration
//!
//! Read from a JSON file; every field has a default so an empty object (or no
//! file at all) is a valid configuration.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::batching::{BatchLimits, RateWindow};
use crate::client::{ClientConfig, EmbeddingModel, DEFAULT_BASE_URL, DEFAULT_CHAT_MODEL};
use crate::error::{EmbedError, Result};
use crate::parallel::{DEFAULT_CALL_TIMEOUT, DEFAULT_PACING};
use crate::pipeline::PipelineSettings;
use crate::records::TextColumn;
use crate::tokens::DEFAULT_TOKENIZER_REPO;

/// Looked up in this order relative to the working directory
pub const CONFIG_FILES: [&str; 3] =
  ["patent-embed.json", ".patent-embed.json", ".patent-embed/config.json"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiConfig {
  #[serde(default = "default_base_url")]
  pub base_url: String,
  #[serde(default)]
  pub embedding_model: EmbeddingModel,
  #[serde(default = "default_chat_model")]
  pub chat_model: String,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
  #[serde(default = "default_api_key_path")]
  pub api_key_path: PathBuf,
}

fn default_base_url() -> String {
  DEFAULT_BASE_URL.to_string()
}
fn default_chat_model() -> String {
  DEFAULT_CHAT_MODEL.to_string()
}
fn default_timeout_secs() -> u64 {
  DEFAULT_CALL_TIMEOUT.as_secs()
}
fn default_api_key_path() -> PathBuf {
  PathBuf::from("data/openAI_key.txt")
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      base_url: default_base_url(),
      embedding_model: EmbeddingModel::default(),
      chat_model: default_chat_model(),
      timeout_secs: default_timeout_secs(),
      api_key_path: default_api_key_path(),
    }
  }
}

/// Where the vocabulary comes from: a local `tokenizer.json` wins over the hub repo
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenizerConfig {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub path: Option<PathBuf>,
  #[serde(default = "default_tokenizer_repo")]
  pub repo: String,
}

fn default_tokenizer_repo() -> String {
  DEFAULT_TOKENIZER_REPO.to_string()
}

impl Default for TokenizerConfig {
  fn default() -> Self {
    Self { path: None, repo: default_tokenizer_repo() }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub limits: BatchLimits,
  #[serde(default)]
  pub api: ApiConfig,
  #[serde(default = "default_max_parallel_calls")]
  pub max_parallel_calls: usize,
  #[serde(default = "default_window_secs")]
  pub window_secs: u64,
  #[serde(default = "default_pacing_ms")]
  pub pacing_ms: u64,
  #[serde(default)]
  pub tokenizer: TokenizerConfig,
  #[serde(default = "default_columns")]
  pub columns: Vec<TextColumn>,
}

fn default_max_parallel_calls() -> usize {
  400
}
fn default_window_secs() -> u64 {
  60
}
fn default_pacing_ms() -> u64 {
  DEFAULT_PACING.as_millis() as u64
}
fn default_columns() -> Vec<TextColumn> {
  TextColumn::ALL.to_vec()
}

impl Default for Config {
  fn default() -> Self {
    Self {
      limits: BatchLimits::default(),
      api: ApiConfig::default(),
      max_parallel_calls: default_max_parallel_calls(),
      window_secs: default_window_secs(),
      pacing_ms: default_pacing_ms(),
      tokenizer: TokenizerConfig::default(),
      columns: default_columns(),
    }
  }
}

impl Config {
  pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| EmbedError::io(path, e))?;
    let config: Config = serde_json::from_str(&content)
      .map_err(|e| EmbedError::invalid_config(format!("{}: {e}", path.display())))?;
    config.validate()?;
    Ok(config)
  }

  pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
      fs::create_dir_all(parent).map_err(|e| EmbedError::io(parent, e))?;
    }
    let content = serde_json::to_string_pretty(self)
      .map_err(|e| EmbedError::invalid_config(e.to_string()))?;
    fs::write(path, content).map_err(|e| EmbedError::io(path, e))
  }

  /// First config file found under `dir`, if any
  pub fn discover(dir: &Path) -> Option<PathBuf> {
    CONFIG_FILES.iter().map(|name| dir.join(name)).find(|path| path.is_file())
  }

  /// Load the explicit file, or the first one discovered under `dir`, or defaults
  pub fn load(explicit: Option<&Path>, dir: &Path) -> Result<Self> {
    match explicit {
      Some(path) => Self::load_from_file(path),
      None => match Self::discover(dir) {
        Some(path) => {
          tracing::debug!("using config {}", path.display());
          Self::load_from_file(path)
        }
        None => Ok(Self::default()),
      },
    }
  }

  pub fn validate(&self) -> Result<()> {
    self.limits.validate()?;
    let model_limit = self.api.embedding_model.max_tokens();
    if self.limits.max_tokens_per_request > model_limit {
      return Err(EmbedError::invalid_config(format!(
        "max_tokens_per_request ({}) exceeds the {} limit of {model_limit}",
        self.limits.max_tokens_per_request, self.api.embedding_model
      )));
    }
    if self.max_parallel_calls == 0 {
      return Err(EmbedError::invalid_config("max_parallel_calls must be positive"));
    }
    if self.columns.is_empty() {
      return Err(EmbedError::invalid_config("at least one column is required"));
    }
    if self.api.timeout_secs == 0 {
      return Err(EmbedError::invalid_config("api.timeout_secs must be positive"));
    }
    Ok(())
  }

  pub fn pipeline_settings(&self) -> PipelineSettings {
    PipelineSettings {
      limits: self.limits,
      max_parallel: self.max_parallel_calls,
      call_timeout: Duration::from_secs(self.api.timeout_secs),
    }
  }

  pub fn rate_window(&self) -> RateWindow {
    RateWindow::new(Duration::from_secs(self.window_secs))
  }

  pub fn pacing(&self) -> Duration {
    Duration::from_millis(self.pacing_ms)
  }

  pub fn client_config(&self, api_key: impl Into<String>) -> ClientConfig {
    ClientConfig {
      base_url: self.api.base_url.clone(),
      api_key: api_key.into(),
      embedding_model: self.api.embedding_model,
      chat_model: self.api.chat_model.clone(),
    }
  }
}
