pub mod complete;
pub mod count;
pub mod embed;
pub mod segments;

use anyhow::{Context, Result};

use crate::config::Config;
use crate::tokens::HfTokenizer;

/// Tokenizer named by the config: local file when given, hub repo otherwise
pub async fn load_tokenizer(config: &Config) -> Result<HfTokenizer> {
  match &config.tokenizer.path {
    Some(path) => HfTokenizer::from_file(path)
      .with_context(|| format!("Failed to load tokenizer from {}", path.display())),
    None => {
      crier::info(&format!("Fetching tokenizer from {}", config.tokenizer.repo));
      HfTokenizer::from_hub(&config.tokenizer.repo)
        .await
        .with_context(|| format!("Failed to fetch tokenizer {}", config.tokenizer.repo))
    }
  }
}
