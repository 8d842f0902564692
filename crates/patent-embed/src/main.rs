use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;

use patent_embed::client::EmbeddingModel;
use patent_embed::commands;
use patent_embed::commands::embed::EmbedOptions;
use patent_embed::config::Config;
use patent_embed::records::TextColumn;

#[derive(Parser)]
#[command(name = "patent-embed")]
#[command(about = "Token accounting and rate-limited embedding of USPTO patent records")]
#[command(version)]
struct Cli {
  /// Config file (defaults to patent-embed.json, .patent-embed.json or .patent-embed/config.json)
  #[arg(long, global = true, env = "PATENT_EMBED_CONFIG")]
  config: Option<PathBuf>,

  /// Debug-level logging
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Count characters and tokens of every text column
  Count {
    /// Records in JSON Lines format
    #[arg(short, long)]
    input: PathBuf,
    #[arg(short, long)]
    output: PathBuf,
  },
  /// Embed text columns segment by segment under the rate limits
  Embed {
    #[arg(short, long)]
    input: PathBuf,
    #[arg(short, long)]
    output: PathBuf,
    /// Columns to embed (defaults to the configured columns)
    #[arg(long, value_enum, value_delimiter = ',')]
    columns: Vec<TextColumn>,
    /// Embedding model (overrides the config)
    #[arg(long, value_enum)]
    model: Option<EmbeddingModel>,
    /// API key (otherwise OPENAI_API_KEY or the configured key file)
    #[arg(long)]
    api_key: Option<String>,
  },
  /// Run one chat completion per line of a prompts file
  Complete {
    /// System prompt sent with every request
    #[arg(short, long)]
    system: String,
    /// File with one user prompt per line
    #[arg(short, long)]
    prompts: PathBuf,
    #[arg(short, long)]
    output: PathBuf,
    #[arg(long)]
    api_key: Option<String>,
  },
  /// Show segment counts and the first batch plan for a column, without calling the API
  Segments {
    #[arg(short, long)]
    input: PathBuf,
    #[arg(short, long, value_enum, default_value = "abstract")]
    column: TextColumn,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  let cli = Cli::parse();
  crier::init_tracing(&["patent-embed"], cli.verbose);

  if let Err(err) = run(cli).await {
    crier::error(&format!("{err:#}"));
    process::exit(1);
  }
  Ok(())
}

async fn run(cli: Cli) -> Result<()> {
  let cwd = std::env::current_dir().context("Failed to read the working directory")?;
  let config = Config::load(cli.config.as_deref(), &cwd).context("Failed to load configuration")?;
  let config = &config;
  let verbose = cli.verbose;

  match cli.command {
    Commands::Count { input, output } => {
      commands::count::execute(config, &input, &output, verbose).await
    }
    Commands::Embed { input, output, columns, model, api_key } => {
      let options = EmbedOptions {
        input: &input,
        output: &output,
        columns: &columns,
        model,
        api_key: api_key.as_deref(),
        verbose,
      };
      commands::embed::execute(config, options).await
    }
    Commands::Complete { system, prompts, output, api_key } => {
      commands::complete::execute(config, &system, &prompts, &output, api_key.as_deref()).await
    }
    Commands::Segments { input, column } => commands::segments::execute(config, &input, column).await,
  }
}
