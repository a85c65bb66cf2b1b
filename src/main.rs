//! fixlens - turn model diagnoses into records you can check off
//!
//! Reads raw generative-model output, pulls out the JSON diagnosis,
//! validates it, and merges later verification verdicts into it.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use fixlens::config::Config;
use fixlens::diagnosis::{self, DiagnosisFailure, FixStatus, Judgment};
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Environment variable holding a tracing filter, e.g. `fixlens=debug`
const LOG_ENV_VAR: &str = "FIXLENS_LOG";

#[derive(Parser, Debug)]
#[command(
    name = "fixlens",
    about = "Validate model-written diagnoses and track whether fixes worked",
    version
)]
struct Args {
    /// Use this config file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the JSON object found in raw model output
    Extract {
        /// File with the raw response (reads stdin when omitted)
        file: Option<PathBuf>,
    },
    /// Validate raw model output and print the canonical diagnosis
    Normalize {
        /// File with the raw response (reads stdin when omitted)
        file: Option<PathBuf>,
    },
    /// Merge a verification verdict into an earlier diagnosis
    Verify {
        /// File with the earlier diagnosis
        #[arg(long)]
        prior: PathBuf,

        /// Verdict reached from the new evidence
        #[arg(long, value_enum)]
        status: StatusArg,

        /// Why the fix worked (kept only when resolved)
        #[arg(long)]
        rationale: Option<String>,
    },
    /// Show the effective configuration
    Config {
        /// Save this model as the default before showing
        #[arg(long)]
        set_model: Option<String>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum StatusArg {
    Pending,
    Resolved,
}

impl From<StatusArg> for FixStatus {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Pending => FixStatus::Pending,
            StatusArg::Resolved => FixStatus::Resolved,
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    init_logging(&config);

    match args.command {
        Command::Extract { file } => {
            let raw = read_input(file.as_deref())?;
            let json = diagnosis::extract(&raw)?;
            println!("{}", json);
        }
        Command::Normalize { file } => {
            let raw = read_input(file.as_deref())?;
            let result = diagnosis::parse_diagnosis(&raw).map_err(report_failure)?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Command::Verify {
            prior,
            status,
            rationale,
        } => {
            let raw = read_input(Some(&prior))?;
            let prior = diagnosis::parse_diagnosis(&raw)
                .map_err(report_failure)
                .with_context(|| {
                    format!("Earlier diagnosis in {} is not usable", prior.display())
                })?;
            let judgment = Judgment {
                status: status.into(),
                rationale,
            };
            let next = diagnosis::merge(&prior, &judgment);
            println!("{}", serde_json::to_string_pretty(&next)?);
        }
        Command::Config { set_model } => {
            if let Some(model) = set_model {
                config.default_model = model.trim().to_string();
                match &args.config {
                    Some(path) => config.save_to(path),
                    None => config.save(),
                }
                .map_err(|e| anyhow::anyhow!(e))?;
                eprintln!("  Default model set to {}", config.default_model);
            }
            let location = match &args.config {
                Some(path) => path.display().to_string(),
                None => Config::config_location(),
            };
            eprintln!("  Config file: {}", location);
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR)
        .unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn read_input(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read stdin")?;
            Ok(buf)
        }
    }
}

/// List every validation problem on stderr before failing.
fn report_failure(failure: DiagnosisFailure) -> anyhow::Error {
    if let DiagnosisFailure::Validation(errors) = &failure {
        eprintln!("  {} problem(s) found:", errors.len());
        for message in errors.messages() {
            eprintln!("    - {}", message);
        }
        return anyhow::anyhow!("Diagnosis failed validation");
    }
    anyhow::Error::new(failure)
}
