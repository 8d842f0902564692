//! Patent records and their JSON Lines storage
//!
//! One record per publication. Only the text columns, their statistics and
//! their embeddings are typed; every other field (inventors, classifications,
//! dates...) is carried through untouched in `extra`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{EmbedError, Result};

/// Text fields that get counted and embedded
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum TextColumn {
  Abstract,
  Claims,
  Description,
  Title,
}

impl TextColumn {
  /// Processing order
  pub const ALL: [TextColumn; 4] =
    [TextColumn::Abstract, TextColumn::Claims, TextColumn::Description, TextColumn::Title];

  pub fn as_str(&self) -> &'static str {
    match self {
      TextColumn::Abstract => "abstract",
      TextColumn::Claims => "claims",
      TextColumn::Description => "description",
      TextColumn::Title => "title",
    }
  }
}

impl std::fmt::Display for TextColumn {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Character and token counts of one text column
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextStats {
  pub characters: usize,
  pub tokens: usize,
}

/// Embedding of one segment; `None` when the request timed out
pub type SegmentEmbedding = Option<Vec<f32>>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatentRecord {
  #[serde(default)]
  pub publication_number: String,

  #[serde(default)]
  pub title: String,

  #[serde(default, rename = "abstract")]
  pub abstract_text: String,

  #[serde(default)]
  pub claims: String,

  #[serde(default)]
  pub description: String,

  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub stats: BTreeMap<TextColumn, TextStats>,

  /// Per-column list of segment embeddings, in segment order
  #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
  pub embeddings: BTreeMap<TextColumn, Vec<SegmentEmbedding>>,

  #[serde(flatten)]
  pub extra: serde_json::Map<String, serde_json::Value>,
}

impl PatentRecord {
  pub fn new(publication_number: impl Into<String>) -> Self {
    Self { publication_number: publication_number.into(), ..Default::default() }
  }

  /// Builder-style setter used mostly by tests and fixtures
  pub fn with_text(mut self, column: TextColumn, text: impl Into<String>) -> Self {
    *self.text_mut(column) = text.into();
    self
  }

  pub fn text(&self, column: TextColumn) -> &str {
    match column {
      TextColumn::Abstract => &self.abstract_text,
      TextColumn::Claims => &self.claims,
      TextColumn::Description => &self.description,
      TextColumn::Title => &self.title,
    }
  }

  pub fn text_mut(&mut self, column: TextColumn) -> &mut String {
    match column {
      TextColumn::Abstract => &mut self.abstract_text,
      TextColumn::Claims => &mut self.claims,
      TextColumn::Description => &mut self.description,
      TextColumn::Title => &mut self.title,
    }
  }

  /// Token count recorded by the `count` step, if any
  pub fn token_count(&self, column: TextColumn) -> Option<usize> {
    self.stats.get(&column).map(|stats| stats.tokens)
  }

  pub fn segment_embeddings(&self, column: TextColumn) -> &[SegmentEmbedding] {
    self.embeddings.get(&column).map(Vec::as_slice).unwrap_or(&[])
  }
}

/// Read records from a JSON Lines file. Blank lines are skipped.
pub fn load_records(path: impl AsRef<Path>) -> Result<Vec<PatentRecord>> {
  let path = path.as_ref();
  let content = fs::read_to_string(path).map_err(|e| EmbedError::io(path, e))?;

  let mut records = Vec::new();
  for (index, line) in content.lines().enumerate() {
    if line.trim().is_empty() {
      continue;
    }
    let record = serde_json::from_str(line)
      .map_err(|e| EmbedError::malformed_record(path, index + 1, e.to_string()))?;
    records.push(record);
  }

  Ok(records)
}

/// Write records as JSON Lines, creating parent directories as needed
pub fn save_records(path: impl AsRef<Path>, records: &[PatentRecord]) -> Result<()> {
  let path = path.as_ref();
  if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
    fs::create_dir_all(parent).map_err(|e| EmbedError::io(parent, e))?;
  }

  let file = fs::File::create(path).map_err(|e| EmbedError::io(path, e))?;
  let mut writer = BufWriter::new(file);
  for record in records {
    let line = serde_json::to_string(record)
      .map_err(|e| EmbedError::malformed_record(path, 0, e.to_string()))?;
    writeln!(writer, "{line}").map_err(|e| EmbedError::io(path, e))?;
  }
  writer.flush().map_err(|e| EmbedError::io(path, e))?;

  Ok(())
}
