//! `turnstile` - print lines from `P` threads in strict round-robin order.

use std::fs;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

use turnstile::{FaultPlan, Rendezvous, RendezvousConfig, RendezvousError, RunReport};

/// Exit status when a spawned participant failed but the initiator did not.
const PARTICIPANT_FAILURE: u8 = 3;

#[derive(Parser, Debug)]
#[command(name = "turnstile", version)]
#[command(about = "Round-robin turn taking between threads", long_about = None)]
struct Cli {
    /// Number of participants, the initiator included
    #[arg(short, long)]
    participants: Option<usize>,

    /// Turns each participant takes
    #[arg(short, long)]
    rounds: Option<usize>,

    /// Line emitted by each participant, in id order (repeat once per participant)
    #[arg(short = 't', long = "text", value_name = "TEXT")]
    texts: Vec<String>,

    /// JSON configuration file; flags override its values
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level for diagnostics on stderr (RUST_LOG directives are honoured too)
    #[arg(long, default_value_t = LevelFilter::WARN)]
    log_level: LevelFilter,

    /// Make a synchronization operation fail: ID:ROUND[:lock|wait|notify]
    #[arg(long, value_name = "ID:ROUND[:OP]")]
    inject_fault: Option<FaultPlan>,
}

impl Cli {
    fn load_config(&self) -> Result<RendezvousConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config {}", path.display()))?;
                serde_json::from_str(&text)
                    .with_context(|| format!("Failed to parse config {}", path.display()))?
            }
            None => RendezvousConfig::default(),
        };

        if let Some(participants) = self.participants {
            config.participants = participants;
        }
        if let Some(rounds) = self.rounds {
            config.rounds = rounds;
        }
        if !self.texts.is_empty() {
            config.labels.clone_from(&self.texts);
        }
        if self.inject_fault.is_some() {
            config.fault = self.inject_fault;
        }
        Ok(config)
    }
}

fn setup_logging(level: LevelFilter) {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_target(false)
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .init();
}

fn run(cli: &Cli) -> Result<RunReport> {
    let config = cli.load_config()?;
    let mut rendezvous = Rendezvous::new(config, io::stdout()).context("Invalid configuration")?;
    let report = rendezvous.run()?;
    Ok(report)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_logging(cli.log_level);

    match run(&cli) {
        Ok(report) if report.is_success() => ExitCode::SUCCESS,
        Ok(report) => {
            for failed in report.failures() {
                eprintln!("participant {} : {}", failed.id, failed.status);
            }
            ExitCode::from(PARTICIPANT_FAILURE)
        }
        Err(err) => {
            match err.downcast_ref::<RendezvousError>() {
                Some(RendezvousError::Initiator(cause)) => eprintln!("main : {cause}"),
                _ => eprintln!("turnstile : {err:#}"),
            }
            ExitCode::FAILURE
        }
    }
}
