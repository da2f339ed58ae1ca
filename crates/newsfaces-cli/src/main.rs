//! NewsFaces ingest: entry point.

use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use newsfaces::{IngestError, MappingLedger, Pipeline, RunSummary};
use newsfaces_cli::config::{resolve_output_dir, IngestArgs};
use newsfaces_cli::report;

#[derive(Parser)]
#[command(
    name = "newsfaces",
    about = "NewsFaces ingest: extract pages and images from web archives",
    version
)]
struct Cli {
    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    /// Print results as JSON.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download archive objects listed in the manifest and process them.
    Run {
        /// Number of archive objects to retrieve.
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,

        #[command(flatten)]
        ingest: IngestArgs,
    },

    /// Process archive files already on disk.
    Process {
        /// Archive files (.warc or .warc.gz).
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        #[command(flatten)]
        ingest: IngestArgs,
    },

    /// Print statistics of an existing mappings ledger.
    Stats {
        /// Output directory holding mappings.json.
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   newsfaces completions bash > ~/.local/share/bash-completion/completions/newsfaces
    ///   newsfaces completions zsh > ~/.zfunc/_newsfaces
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run { count, ingest } => {
            let config = ingest.into_config();
            tracing::info!("NewsFaces ingest: {count} archive object(s)");
            tracing::info!("Manifest: {}", config.manifest);
            tracing::info!("Output: {}", config.output_dir.display());
            let mut pipeline = Pipeline::new(config)?;

            match pipeline.run(count).await {
                Ok(summary) => finish(&pipeline, &summary, cli.json)?,
                Err(e @ IngestError::ManifestUnavailable(_)) => {
                    eprintln!("Error: {e}");
                    std::process::exit(1);
                }
                Err(e) => return Err(e.into()),
            }
        }

        Commands::Process { paths, ingest } => {
            let config = ingest.into_config();
            tracing::info!("NewsFaces ingest: {} local archive(s)", paths.len());
            tracing::info!("Output: {}", config.output_dir.display());
            let mut pipeline = Pipeline::new(config)?;
            let summary = pipeline.run_local(&paths).await?;
            finish(&pipeline, &summary, cli.json)?;
        }

        Commands::Stats { output } => {
            let root = resolve_output_dir(output.as_deref());
            let ledger_path = root.join(newsfaces::config::LEDGER_FILE_NAME);
            match MappingLedger::load(&ledger_path) {
                Ok(ledger) => {
                    if cli.json {
                        println!("{}", serde_json::to_string_pretty(&ledger.statistics())?);
                    } else {
                        println!("{}", report::render(&ledger, &root));
                    }
                }
                Err(e) => {
                    eprintln!("Cannot read ledger {}: {e}", ledger_path.display());
                    std::process::exit(1);
                }
            }
        }

        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "newsfaces", &mut std::io::stdout());
        }
    }

    Ok(())
}

/// Print the outcome and exit non-zero when no archive object was parsed.
fn finish(pipeline: &Pipeline, summary: &RunSummary, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
    } else {
        println!("{}", report::render(pipeline.ledger(), pipeline.store().root()));
    }

    if summary.archives_processed == 0 {
        eprintln!(
            "Error: none of {} archive objects could be retrieved and parsed",
            summary.archives_attempted
        );
        std::process::exit(1);
    }

    Ok(())
}
