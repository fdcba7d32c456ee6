//! Refgraph CLI entry point

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "refgraph")]
#[command(about = "Stable reference ids and binary metadata for model graphs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file (defaults are used when it does not exist)
    #[arg(short, long, default_value = refgraph_core::config::CONFIG_FILE)]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the reference id of every addressable node
    Ids {
        /// JSON model document
        model: PathBuf,

        /// Only ids owned by this element path
        #[arg(short, long)]
        element: Option<String>,
    },
    /// Resolve reference ids against a model
    Resolve {
        /// JSON model document
        model: PathBuf,

        /// Reference ids to resolve
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Write distributed binary metadata for a model
    Serialize {
        /// JSON model document
        model: PathBuf,

        /// Output directory
        out: PathBuf,

        /// Metadata name (overrides the config)
        #[arg(short, long)]
        name: Option<String>,

        /// Only serialize nodes from sources under /<REPOSITORY>/
        #[arg(short, long)]
        repository: Option<String>,
    },
    /// List classifiers and instance counts in serialized metadata
    Inspect {
        /// Directory holding a metadata/ tree
        dir: PathBuf,

        /// Metadata name to read
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Show version
    Version,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!(
            "refgraph={log_level},refgraph_core={log_level},refgraph_reference={log_level},refgraph_serialization={log_level}"
        )))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = refgraph_core::Config::load(&cli.config)?;

    match cli.command {
        Commands::Ids { model, element } => commands::ids(&config, &model, element.as_deref()),
        Commands::Resolve { model, ids } => commands::resolve(&model, &ids),
        Commands::Serialize {
            model,
            out,
            name,
            repository,
        } => commands::serialize(&config, &model, &out, name, repository.as_deref()),
        Commands::Inspect { dir, name } => commands::inspect(&dir, name.as_deref()),
        Commands::Version => {
            println!("refgraph v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
