//! bandscore CLI, the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "bandscore", version, about = "IELTS Speaking answer evaluator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score a single answer file
    Score {
        /// Path to a JSON answer file
        #[arg(long)]
        answer: PathBuf,

        /// Criteria to score (comma-separated, default: all four)
        #[arg(long)]
        criteria: Option<String>,

        /// Grammar backend (overrides the config)
        #[arg(long)]
        backend: Option<String>,

        /// Model passed to the grammar backend
        #[arg(long)]
        model: Option<String>,

        /// Output format: json, html, markdown, all (comma-separated)
        #[arg(long, default_value = "json")]
        format: String,

        /// Output directory (default: the config's output_dir)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Seed for feedback template selection
        #[arg(long)]
        seed: Option<u64>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Score every answer of a session manifest
    Session {
        /// Path to a .toml session manifest
        #[arg(long)]
        manifest: PathBuf,

        /// Max answers scored concurrently (default: the config's parallelism)
        #[arg(long)]
        parallelism: Option<usize>,

        /// Criteria to score (comma-separated, default: all four)
        #[arg(long)]
        criteria: Option<String>,

        /// Grammar backend (overrides the config)
        #[arg(long)]
        backend: Option<String>,

        /// Model passed to the grammar backend
        #[arg(long)]
        model: Option<String>,

        /// Output format: json, html, markdown, all (comma-separated)
        #[arg(long, default_value = "json")]
        format: String,

        /// Output directory (default: the config's output_dir)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Seed for feedback template selection
        #[arg(long)]
        seed: Option<u64>,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Compare two session reports
    Compare {
        /// Baseline report JSON
        #[arg(long)]
        baseline: PathBuf,

        /// Current report JSON
        #[arg(long)]
        current: PathBuf,

        /// Minimum band movement that counts as a change
        #[arg(long, default_value = "0.5")]
        threshold: f64,

        /// Exit code 1 if any band regressed
        #[arg(long)]
        fail_on_regression: bool,

        /// Output format: text, json, markdown
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Validate answer files or a session manifest
    Validate {
        /// Answer file, directory of answers, or .toml session manifest
        #[arg(long)]
        answer: PathBuf,
    },

    /// List configured grammar backends
    Backends {
        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Create a starter config and an example answer
    Init,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("bandscore=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Score {
            answer,
            criteria,
            backend,
            model,
            format,
            output,
            seed,
            config,
        } => {
            let options = commands::RunOptions {
                criteria,
                backend,
                model,
                format,
                output,
                seed,
                config,
            };
            commands::score::execute(answer, options).await
        }
        Commands::Session {
            manifest,
            parallelism,
            criteria,
            backend,
            model,
            format,
            output,
            seed,
            config,
        } => {
            let options = commands::RunOptions {
                criteria,
                backend,
                model,
                format,
                output,
                seed,
                config,
            };
            commands::session::execute(manifest, parallelism, options).await
        }
        Commands::Compare {
            baseline,
            current,
            threshold,
            fail_on_regression,
            format,
        } => commands::compare::execute(baseline, current, threshold, fail_on_regression, format),
        Commands::Validate { answer } => commands::validate::execute(answer),
        Commands::Backends { config } => commands::backends::execute(config),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
