use anyhow::{Context, Result};
use colored::*;
use std::path::Path;

use super::load_tokenizer;
use crate::batching::plan_batches;
use crate::config::Config;
use crate::records::{load_records, TextColumn};
use crate::tokens::{count_tokens, segment_count};

/// Segment counts of one column plus the batch plan of its first pass. No API calls.
pub async fn execute(config: &Config, input: &Path, column: TextColumn) -> Result<()> {
  let records = load_records(input)
    .with_context(|| format!("Failed to read records from {}", input.display()))?;
  let tokenizer = load_tokenizer(config).await?;
  let max_tokens = config.limits.max_tokens_per_request;

  let mut first_pass = Vec::new();
  let mut total_segments = 0;
  for record in &records {
    let tokens = match record.token_count(column) {
      Some(tokens) => tokens,
      None => count_tokens(&tokenizer, record.text(column))?,
    };
    let segments = segment_count(tokens, max_tokens);
    total_segments += segments;
    if segments > 0 {
      first_pass.push(tokens.min(max_tokens));
    }
    println!("{}\t{tokens} tokens\t{segments} segments", record.publication_number.bold());
  }

  let batches = plan_batches(&first_pass, &config.limits);
  println!(
    "{column}: {} records, {total_segments} segments, first pass in {} batches",
    records.len(),
    batches.len()
  );
  for (number, range) in batches.iter().enumerate() {
    let tokens: usize = first_pass[range.clone()].iter().sum();
    println!("  batch {}: {} requests, {tokens} tokens", number + 1, range.len());
  }
  Ok(())
}
