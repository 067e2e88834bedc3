//! # docqa CLI
//!
//! ## Usage
//!
//! ```bash
//! docqa --config ./config/docqa.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docqa ingest` | Ingest new library files and update the index |
//! | `docqa ingest --dry-run` | Report what would be ingested, write nothing |
//! | `docqa chat` | Ask questions interactively |
//! | `docqa serve` | Start the HTTP server (`POST /ask`) |

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use docqa::app::{self, App, Components};
use docqa::{cli, config, logging, server};

/// docqa — ask questions about a folder of documents.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/docqa.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "docqa",
    about = "docqa — incremental document ingestion and conversational question answering",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docqa.toml")]
    config: PathBuf,

    /// More log output (-v debug, -vv trace). `RUST_LOG` takes precedence.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest new files from the library and add their chunks to the index.
    ///
    /// Files already named in the ingestion record are skipped. Files that
    /// fail to extract are logged and retried on the next run.
    Ingest {
        /// Extract and chunk, print counts, but write neither the record nor the index.
        #[arg(long)]
        dry_run: bool,
    },

    /// Ask questions interactively. Type `exit` to quit.
    Chat,

    /// Start the HTTP server on `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;
    let interactive = matches!(cli.command, Commands::Chat);
    let _guard = logging::init(
        &cfg.logging,
        logging::default_filter(cli.verbose, cli.quiet),
        logging::stderr_filter(cli.verbose, cli.quiet, interactive),
    )?;

    match cli.command {
        Commands::Ingest { dry_run } => {
            let components = Components::from_config(&cfg)?;
            let (outcome, _) = app::sync_library(&cfg, &components, dry_run).await?;
            let report = &outcome.report;
            println!("Ingest {}:", if dry_run { "(dry run)" } else { "complete" });
            println!("  files processed: {}", report.processed.len());
            println!("  files skipped:   {}", report.skipped);
            println!("  files failed:    {}", report.failed.len());
            println!("  chunks:          {}", report.chunks.len());
            if let Some(len) = outcome.index_len {
                println!("  chunks indexed:  {}", outcome.indexed);
                println!("  index size:      {}", len);
            }
        }
        Commands::Chat => {
            let app = App::start(cfg).await?;
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            cli::run_repl(&app.chain(), stdin, tokio::io::stdout()).await?;
        }
        Commands::Serve => {
            let app = App::start(cfg).await?;
            let bind = app.config().server.bind.clone();
            server::run_server(app.chain(), &bind).await?;
        }
    }

    Ok(())
}
