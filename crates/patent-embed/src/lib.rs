//! patent-embed - rate-limited embedding of USPTO patent records
//!
//! Counts tokens per text column, cuts long texts into segments that fit one
//! embedding request, and sends the segments in batches that stay under the
//! per-minute token and request limits of the embedding API.

pub mod batching;
pub mod client;
pub mod commands;
pub mod config;
pub mod credentials;
pub mod error;
pub mod parallel;
pub mod pipeline;
pub mod records;
pub mod tokens;

pub use batching::{plan_batches, BatchLimits, RateWindow};
pub use client::{ClientConfig, EmbeddingModel, EmbeddingService, OpenAiClient};
pub use config::Config;
pub use error::{EmbedError, Result};
pub use pipeline::{embed_records, fill_stats, PipelineSettings, RunSummary};
pub use records::{load_records, save_records, PatentRecord, TextColumn, TextStats};
pub use tokens::{HfTokenizer, Segment, TextTokenizer};
