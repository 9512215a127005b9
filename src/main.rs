//! # Originscan CLI (`oscan`)
//!
//! The `oscan` binary is the primary interface for Originscan. It analyzes a
//! code submission for plagiarism and AI authorship, and reports collaborator
//! health.
//!
//! ## Usage
//!
//! ```bash
//! oscan --config ./config/oscan.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `oscan analyze <kind> <input>` | Analyze a submission (`paste`, `archive`, or `url`) |
//! | `oscan services` | List collaborators and their credential status |
//!
//! ## Examples
//!
//! ```bash
//! # Analyze a pasted snippet
//! oscan analyze paste "def add(a, b): return a + b"
//!
//! # Analyze an uploaded archive
//! oscan analyze archive ./submission.zip
//!
//! # Analyze a remote repository
//! oscan analyze url https://github.com/acme/widget.git
//!
//! # Machine-readable report
//! oscan analyze paste "print(1)" --json
//! ```
//!
//! Credentials are taken from the environment: `GITHUB_TOKEN` for the
//! code-hosting search, `STACKEXCHANGE_KEY` (optional) for the Q&A search,
//! and `GPTZERO_API_KEY` for the AI classifier.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use originscan::analyze::Analyzer;
use originscan::config;
use originscan::models::SubmissionKind;
use originscan::services;

/// Originscan CLI — a plagiarism and AI-authorship detection orchestrator
/// for code submissions.
#[derive(Parser)]
#[command(
    name = "oscan",
    about = "Originscan — plagiarism and AI-authorship detection for code submissions",
    version,
    long_about = "Originscan materializes a code submission (archive, pasted snippet, or \
    repository URL), runs a local similarity detector and remote code-search services over it, \
    asks an AI-authorship classifier for a verdict, and aggregates everything into one scored \
    report."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/oscan.toml`; built-in defaults apply when the
    /// file does not exist.
    #[arg(long, global = true, default_value = "./config/oscan.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Analyze a submission.
    ///
    /// Materializes the submission, runs the configured collaborators, and
    /// prints the aggregated report. Collaborator failures degrade the
    /// report rather than failing the command; only an unreadable submission
    /// is fatal.
    Analyze {
        /// Submission kind: `paste`, `archive`, or `url`.
        kind: String,

        /// The submission itself: literal code text for `paste`, a `.zip`
        /// path for `archive`, a git URL for `url`.
        input: String,

        /// Print the full report as JSON instead of the summary.
        #[arg(long)]
        json: bool,

        /// Override how many leading files are probed by the remote
        /// collaborators.
        #[arg(long)]
        probe_files: Option<usize>,
    },

    /// List collaborators and their status.
    ///
    /// Shows which collaborators are enabled and whether their environment
    /// credentials are present. Useful for verifying configuration before
    /// running an analysis.
    Services,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut cfg = if cli.config.exists() {
        config::load_config(&cli.config)?
    } else {
        config::Config::minimal()
    };

    match cli.command {
        Commands::Analyze {
            kind,
            input,
            json,
            probe_files,
        } => {
            let kind = SubmissionKind::parse(&kind)?;
            if let Some(n) = probe_files {
                anyhow::ensure!(n >= 1, "--probe-files must be >= 1");
                cfg.workspace.probe_files = n;
            }

            let analyzer = Analyzer::from_config(&cfg)?;
            let report = analyzer.analyze(kind, &input).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!("analysis {}", report.id);
                println!("  kind: {}", report.kind.as_str());
                println!("  matches: {}", report.matches.len());
                println!("  similarity score: {}", report.similarity_score);
                for (i, m) in report.matches.iter().enumerate() {
                    println!(
                        "  [{}] {:.2}  {}  {}",
                        i + 1,
                        m.score,
                        m.source_location,
                        m.label
                    );
                }
                match &report.ai_detection {
                    Some(verdict) => println!("  ai detection: {}", verdict),
                    None => println!("  ai detection: absent"),
                }
                println!("ok");
            }
        }
        Commands::Services => {
            services::list_services(&cfg)?;
        }
    }

    Ok(())
}
