//! Bounded-concurrency fan-out of independent API calls
//!
//! Every text gets its own request; a semaphore caps how many are in flight.
//! Results come back in input order.

use crier::Progress;
use futures::future::try_join_all;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::{sleep, timeout};

use crate::client::EmbeddingService;
use crate::error::{EmbedError, Result};
use crate::records::SegmentEmbedding;

pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_PACING: Duration = Duration::from_secs(1);

fn gate(max_parallel: usize) -> Semaphore {
  Semaphore::new(max_parallel.max(1))
}

fn report(progress: &Progress) {
  let done = progress.increment();
  if done == progress.total() {
    tracing::info!("{progress}");
  } else {
    tracing::debug!("{progress}");
  }
}

/// Embed every text, at most `max_parallel` requests at a time.
///
/// A request that does not answer within `call_timeout` becomes `None`;
/// any other failure aborts the whole call.
pub async fn embed_all(
  service: &dyn EmbeddingService,
  texts: &[String],
  max_parallel: usize,
  call_timeout: Duration,
) -> Result<Vec<SegmentEmbedding>> {
  let semaphore = gate(max_parallel);
  let progress = Progress::new(texts.len());

  let calls = texts.iter().enumerate().map(|(index, text)| {
    let semaphore = &semaphore;
    let progress = &progress;
    async move {
      let _permit = semaphore.acquire().await.map_err(|e| EmbedError::task(e.to_string()))?;
      let embedding = match timeout(call_timeout, service.embed(text)).await {
        Ok(result) => Some(result?),
        Err(_) => {
          tracing::warn!("embedding request {index} timed out after {call_timeout:?}");
          None
        }
      };
      report(progress);
      Ok::<_, EmbedError>(embedding)
    }
  });

  try_join_all(calls).await
}

/// Chat completion for every prompt under the same concurrency gate.
///
/// Each call holds its permit for `pacing` before sending, which spreads
/// request starts out over time.
pub async fn complete_all(
  service: &dyn EmbeddingService,
  system_prompt: &str,
  prompts: &[String],
  max_parallel: usize,
  pacing: Duration,
) -> Result<Vec<serde_json::Value>> {
  let semaphore = gate(max_parallel);
  let progress = Progress::new(prompts.len());

  let calls = prompts.iter().map(|prompt| {
    let semaphore = &semaphore;
    let progress = &progress;
    async move {
      let _permit = semaphore.acquire().await.map_err(|e| EmbedError::task(e.to_string()))?;
      sleep(pacing).await;
      let response = service.complete(system_prompt, prompt).await?;
      report(progress);
      Ok::<_, EmbedError>(response)
    }
  });

  try_join_all(calls).await
}
