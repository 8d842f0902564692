use anyhow::{Context, Result};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::client::OpenAiClient;
use crate::config::Config;
use crate::credentials::resolve_api_key;
use crate::parallel::complete_all;

/// One chat completion per non-empty line of `prompts`, written as JSON Lines
pub async fn execute(
  config: &Config,
  system_prompt: &str,
  prompts: &Path,
  output: &Path,
  api_key: Option<&str>,
) -> Result<()> {
  let content = fs::read_to_string(prompts)
    .with_context(|| format!("Failed to read prompts from {}", prompts.display()))?;
  let prompts: Vec<String> =
    content.lines().filter(|l| !l.trim().is_empty()).map(str::to_string).collect();

  let api_key = resolve_api_key(api_key, &config.api.api_key_path)?;
  let client = OpenAiClient::new(config.client_config(api_key))?;

  crier::info(&format!("Sending {} prompts to {}", prompts.len(), config.api.chat_model));
  let responses =
    complete_all(&client, system_prompt, &prompts, config.max_parallel_calls, config.pacing())
      .await
      .context("Chat completion run aborted")?;

  if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
    fs::create_dir_all(parent)
      .with_context(|| format!("Failed to create directory {}", parent.display()))?;
  }
  let file = fs::File::create(output)
    .with_context(|| format!("Failed to create {}", output.display()))?;
  let mut writer = BufWriter::new(file);
  for response in &responses {
    writeln!(writer, "{}", serde_json::to_string(response)?)?;
  }
  writer.flush()?;

  crier::success(&format!("Wrote {} responses to {}", responses.len(), output.display()));
  Ok(())
}
