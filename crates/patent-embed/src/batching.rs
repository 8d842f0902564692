//! Batch planning and the per-minute rate window
//!
//! Requests are grouped into batches whose running token total and request
//! count stay strictly under the per-minute thresholds. Each batch is sent in
//! one go; between two batches the window enforces a minimum interval.

use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::time::Duration;
use tokio::time::{sleep, Instant};

use crate::error::{EmbedError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchLimits {
  /// Token budget of one batch (TPM)
  #[serde(default = "default_tokens_per_minute")]
  pub tokens_per_minute: usize,
  /// Request budget of one batch (RPM)
  #[serde(default = "default_requests_per_minute")]
  pub requests_per_minute: usize,
  /// Largest segment sent in a single request
  #[serde(default = "default_max_tokens_per_request")]
  pub max_tokens_per_request: usize,
}

fn default_tokens_per_minute() -> usize {
  1_000_000
}
// 500 is the documented tier limit; 400 is what stays reliable in practice
fn default_requests_per_minute() -> usize {
  400
}
fn default_max_tokens_per_request() -> usize {
  8191
}

impl Default for BatchLimits {
  fn default() -> Self {
    Self {
      tokens_per_minute: default_tokens_per_minute(),
      requests_per_minute: default_requests_per_minute(),
      max_tokens_per_request: default_max_tokens_per_request(),
    }
  }
}

impl BatchLimits {
  pub fn validate(&self) -> Result<()> {
    if self.tokens_per_minute == 0 || self.max_tokens_per_request == 0 {
      return Err(EmbedError::invalid_config("token limits must be positive"));
    }
    if self.requests_per_minute < 2 {
      return Err(EmbedError::invalid_config("requests_per_minute must be at least 2"));
    }
    if self.max_tokens_per_request >= self.tokens_per_minute {
      return Err(EmbedError::invalid_config(format!(
        "max_tokens_per_request ({}) must be below tokens_per_minute ({})",
        self.max_tokens_per_request, self.tokens_per_minute
      )));
    }
    Ok(())
  }
}

/// Running totals of the batch being filled
#[derive(Debug, Default)]
struct Accumulator {
  start: usize,
  tokens: usize,
  requests: usize,
}

impl Accumulator {
  fn admits(&self, tokens: usize, limits: &BatchLimits) -> bool {
    self.tokens + tokens < limits.tokens_per_minute
      && self.requests + 1 < limits.requests_per_minute
  }
}

/// Split items (given by their token counts) into contiguous batches.
///
/// Batches are never empty and cover every item once, in order. An item that
/// alone reaches the token threshold still gets a batch of its own.
pub fn plan_batches(token_counts: &[usize], limits: &BatchLimits) -> Vec<Range<usize>> {
  let mut batches = Vec::new();
  let mut current = Accumulator::default();

  for (index, &tokens) in token_counts.iter().enumerate() {
    if current.requests > 0 && !current.admits(tokens, limits) {
      batches.push(current.start..index);
      current = Accumulator { start: index, ..Default::default() };
    }
    current.tokens += tokens;
    current.requests += 1;
  }

  if current.requests > 0 {
    batches.push(current.start..token_counts.len());
  }

  batches
}

/// Minimum spacing between batch flushes.
///
/// Measured from the end of the previous flush. The first batch of a run
/// goes out immediately.
#[derive(Debug)]
pub struct RateWindow {
  interval: Duration,
  last_flush: Option<Instant>,
}

impl RateWindow {
  pub fn new(interval: Duration) -> Self {
    Self { interval, last_flush: None }
  }

  /// One flush per minute
  pub fn per_minute() -> Self {
    Self::new(Duration::from_secs(60))
  }

  pub fn interval(&self) -> Duration {
    self.interval
  }

  /// Time left before the next flush may start
  pub fn remaining(&self) -> Duration {
    match self.last_flush {
      Some(at) => self.interval.saturating_sub(at.elapsed()),
      None => Duration::ZERO,
    }
  }

  /// Sleep out the rest of the window; returns how long it slept
  pub async fn wait(&self) -> Duration {
    let remaining = self.remaining();
    if !remaining.is_zero() {
      tracing::info!("rate window: sleeping {:.1}s before next batch", remaining.as_secs_f64());
      sleep(remaining).await;
    }
    remaining
  }

  /// Record that a flush just finished
  pub fn mark(&mut self) {
    self.last_flush = Some(Instant::now());
  }
}
