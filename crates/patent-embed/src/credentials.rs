use std::fs;
use std::path::Path;

use crate::error::{EmbedError, Result};

pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Resolve the API key: explicit value, then `OPENAI_API_KEY`, then the key file.
///
/// Surrounding whitespace is trimmed everywhere; a blank value counts as missing.
pub fn resolve_api_key(explicit: Option<&str>, key_path: &Path) -> Result<String> {
  if let Some(key) = explicit.map(str::trim).filter(|k| !k.is_empty()) {
    return Ok(key.to_string());
  }

  if let Some(key) = std::env::var(API_KEY_ENV).ok().filter(|k| !k.trim().is_empty()) {
    return Ok(key.trim().to_string());
  }

  match fs::read_to_string(key_path) {
    Ok(content) if !content.trim().is_empty() => Ok(content.trim().to_string()),
    Ok(_) => Err(EmbedError::missing_api_key(key_path)),
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(EmbedError::missing_api_key(key_path)),
    Err(e) => Err(EmbedError::io(key_path, e)),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  #[test]
  fn test_explicit_key_wins() {
    temp_env::with_var(API_KEY_ENV, Some("sk-env"), || {
      let key = resolve_api_key(Some("  sk-flag \n"), Path::new("/nonexistent/key.txt")).unwrap();
      assert_eq!(key, "sk-flag");
    });
  }

  #[test]
  fn test_env_before_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("key.txt");
    fs::write(&path, "sk-file").unwrap();

    temp_env::with_var(API_KEY_ENV, Some("sk-env"), || {
      assert_eq!(resolve_api_key(None, &path).unwrap(), "sk-env");
    });
  }

  #[test]
  fn test_key_file_is_trimmed() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("openAI_key.txt");
    fs::write(&path, "sk-file\n").unwrap();

    temp_env::with_var_unset(API_KEY_ENV, || {
      assert_eq!(resolve_api_key(Some(""), &path).unwrap(), "sk-file");
    });
  }

  #[test]
  fn test_missing_or_blank_key_names_the_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("openAI_key.txt");

    temp_env::with_var(API_KEY_ENV, Some("   "), || {
      let error = resolve_api_key(None, &path).unwrap_err();
      assert!(matches!(error, EmbedError::MissingApiKey { .. }));
      assert!(error.to_string().contains("openAI_key.txt"));

      fs::write(&path, "  \n").unwrap();
      assert!(matches!(resolve_api_key(None, &path), Err(EmbedError::MissingApiKey { .. })));
    });
  }
}
