use anyhow::{Context, Result};
use std::path::Path;

use super::load_tokenizer;
use crate::client::{EmbeddingModel, OpenAiClient};
use crate::config::Config;
use crate::credentials::resolve_api_key;
use crate::pipeline::{embed_records, fill_stats};
use crate::records::{load_records, save_records, TextColumn};

pub struct EmbedOptions<'a> {
  pub input: &'a Path,
  pub output: &'a Path,
  /// Overrides the configured columns when not empty
  pub columns: &'a [TextColumn],
  pub model: Option<EmbeddingModel>,
  pub api_key: Option<&'a str>,
  pub verbose: bool,
}

pub async fn execute(config: &Config, options: EmbedOptions<'_>) -> Result<()> {
  let columns: Vec<TextColumn> =
    if options.columns.is_empty() { config.columns.clone() } else { options.columns.to_vec() };

  let mut records = load_records(options.input)
    .with_context(|| format!("Failed to read records from {}", options.input.display()))?;

  let api_key = resolve_api_key(options.api_key, &config.api.api_key_path)?;
  let mut client_config = config.client_config(api_key);
  if let Some(model) = options.model {
    client_config.embedding_model = model;
  }
  let model = client_config.embedding_model;
  let client = OpenAiClient::new(client_config)?;

  let tokenizer = load_tokenizer(config).await?;
  // Stored counts may come from another tokenizer; keep them consistent with the segments sent
  let counted = fill_stats(&mut records, &columns, &tokenizer)?;
  if options.verbose {
    crier::verbose(&format!("Counted tokens of {counted} texts"));
  }

  let column_names: Vec<&str> = columns.iter().map(TextColumn::as_str).collect();
  crier::announce(&format!(
    "Embedding {} records with {model} ({} dimensions)\ncolumns: {}",
    records.len(),
    model.dimensions(),
    column_names.join(", ")
  ));

  let mut window = config.rate_window();
  let summary = embed_records(
    &mut records,
    &columns,
    &tokenizer,
    &client,
    &config.pipeline_settings(),
    &mut window,
  )
  .await
  .context("Embedding run aborted")?;

  save_records(options.output, &records)
    .with_context(|| format!("Failed to write records to {}", options.output.display()))?;
  crier::event_info(&format!("Saved {} records", records.len()));

  if summary.nulls > 0 {
    crier::event_warn(&format!("{} requests timed out and were stored as null", summary.nulls));
  }
  crier::flourish(&format!(
    "{} requests in {} batches\nwrote {}",
    summary.requests,
    summary.batches,
    options.output.display()
  ));
  Ok(())
}
