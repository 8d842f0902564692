use anyhow::{Context, Result};
use std::path::Path;

use super::load_tokenizer;
use crate::config::Config;
use crate::pipeline::fill_stats;
use crate::records::{load_records, save_records};

/// Fill character and token counts for every configured column
pub async fn execute(config: &Config, input: &Path, output: &Path, verbose: bool) -> Result<()> {
  let mut records = load_records(input)
    .with_context(|| format!("Failed to read records from {}", input.display()))?;
  crier::info(&format!("Loaded {} records from {}", records.len(), input.display()));

  let tokenizer = load_tokenizer(config).await?;
  let filled = fill_stats(&mut records, &config.columns, &tokenizer)?;

  if verbose {
    for column in &config.columns {
      let total: usize = records.iter().filter_map(|r| r.token_count(*column)).sum();
      crier::verbose(&format!("{column}: {total} tokens"));
    }
  }

  save_records(output, &records)
    .with_context(|| format!("Failed to write records to {}", output.display()))?;
  crier::success(&format!("Counted {filled} texts, wrote {}", output.display()));
  Ok(())
}
