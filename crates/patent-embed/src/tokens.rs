//! Token counting and segmentation
//!
//! Texts longer than the per-request limit are cut into segments on token
//! boundaries. Segment `k` covers tokens `[k * max, (k + 1) * max)` and its text
//! is the slice of the original text those tokens were read from, cut so that
//! consecutive segments never share a character.

use std::path::Path;
use std::str::FromStr;
use tokenizers::Tokenizer;

use crate::error::{EmbedError, Result};
use crate::records::TextStats;

/// Hugging Face repo carrying the cl100k vocabulary used by the OpenAI embedding models
pub const DEFAULT_TOKENIZER_REPO: &str = "Xenova/text-embedding-ada-002";
const TOKENIZER_FILE: &str = "tokenizer.json";

/// Tokenization seam so segmentation can be tested without downloading a vocabulary
pub trait TextTokenizer: Send + Sync {
  /// Byte offsets `(start, end)` of every token in `text`
  fn token_offsets(&self, text: &str) -> Result<Vec<(usize, usize)>>;
}

pub struct HfTokenizer {
  inner: Tokenizer,
}

impl HfTokenizer {
  pub fn new(inner: Tokenizer) -> Self {
    Self { inner }
  }

  /// Load a `tokenizer.json` from disk
  pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    let inner = Tokenizer::from_file(path)
      .map_err(|e| EmbedError::tokenizer(format!("failed to load {}: {e}", path.display())))?;
    Ok(Self::new(inner))
  }

  /// Fetch `tokenizer.json` from a Hugging Face repo (cached by hf-hub)
  pub async fn from_hub(repo: &str) -> Result<Self> {
    let api = hf_hub::api::tokio::Api::new()
      .map_err(|e| EmbedError::tokenizer(format!("failed to start hub client: {e}")))?;
    let file = api
      .model(repo.to_string())
      .get(TOKENIZER_FILE)
      .await
      .map_err(|e| EmbedError::tokenizer(format!("failed to fetch {repo}/{TOKENIZER_FILE}: {e}")))?;
    Self::from_file(file)
  }
}

impl FromStr for HfTokenizer {
  type Err = EmbedError;

  /// Parse a serialized `tokenizer.json`
  fn from_str(json: &str) -> Result<Self> {
    let inner = Tokenizer::from_str(json).map_err(|e| EmbedError::tokenizer(e.to_string()))?;
    Ok(Self::new(inner))
  }
}

impl TextTokenizer for HfTokenizer {
  fn token_offsets(&self, text: &str) -> Result<Vec<(usize, usize)>> {
    let encoding = self
      .inner
      .encode(text, false)
      .map_err(|e| EmbedError::tokenizer(format!("tokenization failed: {e}")))?;
    Ok(encoding.get_offsets().to_vec())
  }
}

/// A fixed-size chunk of a text's token stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
  pub index: usize,
  pub text: String,
  pub tokens: usize,
}

pub fn count_tokens(tokenizer: &dyn TextTokenizer, text: &str) -> Result<usize> {
  Ok(tokenizer.token_offsets(text)?.len())
}

pub fn text_stats(tokenizer: &dyn TextTokenizer, text: &str) -> Result<TextStats> {
  Ok(TextStats { characters: text.chars().count(), tokens: count_tokens(tokenizer, text)? })
}

/// Number of segments a text of `tokens` tokens splits into
pub fn segment_count(tokens: usize, max_tokens: usize) -> usize {
  tokens.div_ceil(max_tokens)
}

/// Split `text` into segments of at most `max_tokens` tokens
pub fn segment(tokenizer: &dyn TextTokenizer, text: &str, max_tokens: usize) -> Result<Vec<Segment>> {
  if max_tokens == 0 {
    return Err(EmbedError::invalid_config("max tokens per request must be positive"));
  }

  let offsets = tokenizer.token_offsets(text)?;
  let chunks: Vec<&[(usize, usize)]> = offsets.chunks(max_tokens).collect();
  let starts: Vec<usize> =
    chunks.iter().map(|chunk| floor_boundary(text, chunk.first().map_or(0, |(start, _)| *start))).collect();

  // Byte-level tokens of one multi-byte char share its offsets; ending each
  // segment where the next one starts keeps segments from overlapping.
  let segments = chunks
    .iter()
    .enumerate()
    .map(|(index, chunk)| {
      let start = starts[index];
      let mut end = ceil_boundary(text, chunk.last().map_or(start, |(_, end)| *end));
      if let Some(&next) = starts.get(index + 1) {
        end = end.min(next);
      }
      let end = end.max(start);
      Segment { index, text: text[start..end].to_string(), tokens: chunk.len() }
    })
    .collect();

  Ok(segments)
}

fn floor_boundary(text: &str, index: usize) -> usize {
  let mut index = index.min(text.len());
  while !text.is_char_boundary(index) {
    index -= 1;
  }
  index
}

fn ceil_boundary(text: &str, index: usize) -> usize {
  let mut index = index.min(text.len());
  while !text.is_char_boundary(index) {
    index += 1;
  }
  index
}

#[cfg(test)]
pub(crate) mod testing {
  use super::*;

  /// Word-level tokenizer splitting on whitespace and punctuation; every word is one token
  pub(crate) const WORD_TOKENIZER: &str = r#"{
    "version": "1.0",
    "truncation": null,
    "padding": null,
    "added_tokens": [],
    "normalizer": null,
    "pre_tokenizer": { "type": "Whitespace" },
    "post_processor": null,
    "decoder": null,
    "model": { "type": "WordLevel", "vocab": { "[UNK]": 0 }, "unk_token": "[UNK]" }
  }"#;

  pub(crate) fn word_tokenizer() -> HfTokenizer {
    HfTokenizer::from_str(WORD_TOKENIZER).expect("word tokenizer parses")
  }

  /// Byte-level BPE without merges: one token per UTF-8 byte, like cl100k on unseen text
  pub(crate) const BYTE_TOKENIZER: &str = r#"{
    "version": "1.0",
    "truncation": null,
    "padding": null,
    "added_tokens": [],
    "normalizer": null,
    "pre_tokenizer": { "type": "ByteLevel", "add_prefix_space": false, "trim_offsets": true, "use_regex": true },
    "post_processor": null,
    "decoder": null,
    "model": {
      "type": "BPE",
      "dropout": null,
      "unk_token": null,
      "continuing_subword_prefix": null,
      "end_of_word_suffix": null,
      "fuse_unk": false,
      "byte_fallback": false,
      "vocab": { "a": 0, "b": 1, "Ã": 2, "©": 3, "Ġ": 4 },
      "merges": []
    }
  }"#;

  pub(crate) fn byte_tokenizer() -> HfTokenizer {
    HfTokenizer::from_str(BYTE_TOKENIZER).expect("byte tokenizer parses")
  }
}
