//! ## Crier
//!
//! Status output for long-running batch jobs.
//!
//! - Prefixed, colored status lines on stderr (`[info]`, `[warn]`, `[error]`, `[sccs]`, `[verb]`)
//! - Timestamped event lines for things that happen mid-run (batch flushes, rate waits)
//! - Banners for the start and end of a job
//! - `init_tracing()` wires `tracing` diagnostics from the library crates to stderr
//! - `Progress` counts completed calls across concurrent tasks
//!
//! Everything goes to stderr so stdout stays free for command output.

use chrono::Local;
use colored::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

/// Kind of status line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
  Info,
  Warn,
  Error,
  Success,
  Verbose,
}

impl Tone {
  fn label(self) -> &'static str {
    match self {
      Tone::Info => "info",
      Tone::Warn => "warn",
      Tone::Error => "error",
      Tone::Success => "sccs",
      Tone::Verbose => "verb",
    }
  }

  fn color(self) -> Color {
    match self {
      Tone::Info => Color::Blue,
      Tone::Warn => Color::Yellow,
      Tone::Error => Color::Red,
      Tone::Success => Color::Green,
      Tone::Verbose => Color::Cyan,
    }
  }
}

/// Write raw lines to stderr
pub fn log(message: &str) {
  for line in message.lines() {
    eprintln!("{line}");
  }
}

/// Build the padded `[label]` prefix for a tone
pub fn prefix(tone: Tone) -> String {
  let label = tone.label();
  let pad = 7usize.saturating_sub(label.len() + 2);
  format!("[{}]{:<pad$}", label.color(tone.color()).bold(), "")
}

/// Prefix every line of `message` and write it out
pub fn emit(tone: Tone, message: &str) {
  let prefix = prefix(tone);
  for line in message.lines() {
    log(&format!("{prefix} {line}"));
  }
}

pub fn info(message: &str) {
  emit(Tone::Info, message);
}

pub fn warn(message: &str) {
  emit(Tone::Warn, message);
}

pub fn error(message: &str) {
  emit(Tone::Error, message);
}

/// Something finished
pub fn success(message: &str) {
  emit(Tone::Success, message);
}

pub fn verbose(message: &str) {
  emit(Tone::Verbose, message);
}

/// Timestamped event line, e.g. `[event] [14:02:11] flushed batch 3`
pub fn event(tone: Tone, message: &str) {
  let timestamp = Local::now().format("%H:%M:%S").to_string();
  let prefix = format!("[{}] [{}]", "event".color(tone.color()).bold(), timestamp.cyan());
  for line in message.lines() {
    log(&format!("{prefix} {line}"));
  }
}

pub fn event_info(message: &str) {
  event(Tone::Info, message);
}

pub fn event_warn(message: &str) {
  event(Tone::Warn, message);
}

/// Repeat `fill` `width` times
pub fn rule(width: usize, fill: char) -> String {
  fill.to_string().repeat(width)
}

/// Frame a message between two rules
pub fn banner(message: &str, width: usize, fill: char) -> Vec<String> {
  let border = rule(width, fill);
  let mut lines = Vec::with_capacity(message.lines().count() + 2);
  lines.push(border.clone());
  lines.extend(message.lines().map(str::to_string));
  lines.push(border);
  lines
}

/// Job start banner
pub fn announce(message: &str) {
  for line in banner(message, 50, '-') {
    log(&line.blue().bold().to_string());
  }
}

/// Job completion banner
pub fn flourish(message: &str) {
  for line in banner(message, 45, '~') {
    log(&line.green().bold().to_string());
  }
}

/// Install the global tracing subscriber.
///
/// `crates` are the targets that log at `info` (or `debug` when verbose);
/// everything else, including reqwest and hyper, stays at `warn`.
/// `RUST_LOG` wins when set.
pub fn init_tracing(crates: &[&str], verbose: bool) {
  let filter =
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives(crates, verbose)));

  // try_init: tests and repeated calls must not panic on an existing subscriber
  let _ = tracing_subscriber::registry()
    .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
    .with(filter)
    .try_init();
}

fn directives(crates: &[&str], verbose: bool) -> String {
  let level = if verbose { "debug" } else { "info" };
  let mut filter = String::from("warn");
  for name in crates {
    filter.push_str(&format!(",{}={level}", name.replace('-', "_")));
  }
  filter
}

/// Counter of finished calls, shared by reference between concurrent tasks
#[derive(Debug)]
pub struct Progress {
  total: usize,
  done: AtomicUsize,
}

impl Progress {
  pub fn new(total: usize) -> Self {
    Self { total, done: AtomicUsize::new(0) }
  }

  /// Record one finished call and return the new count
  pub fn increment(&self) -> usize {
    self.done.fetch_add(1, Ordering::Relaxed) + 1
  }

  pub fn completed(&self) -> usize {
    self.done.load(Ordering::Relaxed)
  }

  pub fn total(&self) -> usize {
    self.total
  }

  pub fn is_finished(&self) -> bool {
    self.completed() >= self.total
  }
}

impl std::fmt::Display for Progress {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "Completed {}/{} calls", self.completed(), self.total)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_prefix_pads_short_labels() {
    colored::control::set_override(false);
    assert_eq!(prefix(Tone::Info), "[info] ");
    assert_eq!(prefix(Tone::Error), "[error]");
    assert_eq!(prefix(Tone::Success), "[sccs] ");
  }

  #[test]
  fn test_banner_frames_every_line() {
    let lines = banner("first\nsecond", 5, '=');
    assert_eq!(lines, vec!["=====", "first", "second", "====="]);
  }

  #[test]
  fn test_directives_follow_verbosity() {
    assert_eq!(directives(&["patent-embed"], false), "warn,patent_embed=info");
    assert_eq!(directives(&["patent-embed", "crier"], true), "warn,patent_embed=debug,crier=debug");
  }

  #[test]
  fn test_progress_display() {
    let progress = Progress::new(3);
    progress.increment();
    assert_eq!(progress.to_string(), "Completed 1/3 calls");
    assert!(!progress.is_finished());
    progress.increment();
    assert_eq!(progress.increment(), 3);
    assert!(progress.is_finished());
  }
}
