//! Segment-by-segment embedding of record text columns
//!
//! For each column the records are walked in passes: pass `k` sends segment
//! `k` of every text that still has one. Each pass is split into rate-limited
//! batches and every result is appended to the record's embedding list for
//! that column, so after the run that list holds one entry per segment.

use std::time::Duration;

use crate::batching::{plan_batches, BatchLimits, RateWindow};
use crate::client::EmbeddingService;
use crate::error::Result;
use crate::parallel::{embed_all, DEFAULT_CALL_TIMEOUT};
use crate::records::{PatentRecord, TextColumn};
use crate::tokens::{segment, text_stats, Segment, TextTokenizer};

#[derive(Debug, Clone)]
pub struct PipelineSettings {
  pub limits: BatchLimits,
  pub max_parallel: usize,
  pub call_timeout: Duration,
}

impl Default for PipelineSettings {
  fn default() -> Self {
    let limits = BatchLimits::default();
    Self { max_parallel: limits.requests_per_minute, limits, call_timeout: DEFAULT_CALL_TIMEOUT }
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
  pub requests: usize,
  pub nulls: usize,
  pub batches: usize,
  pub passes: usize,
}

impl RunSummary {
  fn absorb(&mut self, other: RunSummary) {
    self.requests += other.requests;
    self.nulls += other.nulls;
    self.batches += other.batches;
    self.passes += other.passes;
  }
}

/// Compute character and token counts of the listed columns, replacing any stored ones
pub fn fill_stats(
  records: &mut [PatentRecord],
  columns: &[TextColumn],
  tokenizer: &dyn TextTokenizer,
) -> Result<usize> {
  let mut filled = 0;
  for record in records.iter_mut() {
    for &column in columns {
      let stats = text_stats(tokenizer, record.text(column))?;
      record.stats.insert(column, stats);
      filled += 1;
    }
  }
  Ok(filled)
}

/// Embed every listed column of every record.
///
/// Existing embeddings of those columns are replaced. Records with an empty
/// text end up with an empty embedding list for that column.
pub async fn embed_records(
  records: &mut [PatentRecord],
  columns: &[TextColumn],
  tokenizer: &dyn TextTokenizer,
  service: &dyn EmbeddingService,
  settings: &PipelineSettings,
  window: &mut RateWindow,
) -> Result<RunSummary> {
  settings.limits.validate()?;

  let mut summary = RunSummary::default();
  for &column in columns {
    tracing::info!("embedding column {column} for {} records", records.len());
    let column_summary = embed_column(records, column, tokenizer, service, settings, window).await?;
    tracing::info!(
      "column {column}: {} requests in {} batches over {} passes, {} timed out",
      column_summary.requests,
      column_summary.batches,
      column_summary.passes,
      column_summary.nulls
    );
    summary.absorb(column_summary);
  }

  Ok(summary)
}

async fn embed_column(
  records: &mut [PatentRecord],
  column: TextColumn,
  tokenizer: &dyn TextTokenizer,
  service: &dyn EmbeddingService,
  settings: &PipelineSettings,
  window: &mut RateWindow,
) -> Result<RunSummary> {
  let max_tokens = settings.limits.max_tokens_per_request;
  let segments = records
    .iter()
    .map(|record| segment(tokenizer, record.text(column), max_tokens))
    .collect::<Result<Vec<Vec<Segment>>>>()?;

  for record in records.iter_mut() {
    record.embeddings.insert(column, Vec::new());
  }

  let mut summary = RunSummary::default();
  for pass in 0.. {
    let selected: Vec<usize> = (0..records.len()).filter(|&i| segments[i].len() > pass).collect();
    if selected.is_empty() {
      break;
    }
    tracing::debug!("column {column}, segment {pass}: {} texts", selected.len());

    let token_counts: Vec<usize> = selected.iter().map(|&i| segments[i][pass].tokens).collect();
    for range in plan_batches(&token_counts, &settings.limits) {
      let members = &selected[range];
      let texts: Vec<String> = members.iter().map(|&i| segments[i][pass].text.clone()).collect();

      window.wait().await;
      let results = embed_all(service, &texts, settings.max_parallel, settings.call_timeout).await?;
      window.mark();

      summary.batches += 1;
      summary.requests += results.len();
      summary.nulls += results.iter().filter(|r| r.is_none()).count();

      for (&record_index, embedding) in members.iter().zip(results) {
        records[record_index].embeddings.entry(column).or_default().push(embedding);
      }
    }
    summary.passes += 1;
  }

  Ok(summary)
}
