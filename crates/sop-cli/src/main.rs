//! sop - Stateless OpenPGP command line over an external backend
//!
//! Usage:
//!   sop [--backend BIN] encrypt --with-password @ENV:PASS < msg > msg.asc
//!   sop decrypt --with-password @ENV:PASS --session-key-out sk.txt < msg.asc
//!   sop version --extended
//!
//! Keys, certificates, passwords and session keys are named with indirect
//! designators: a file path, `@ENV:NAME` or `@FD:N`. Data is read from
//! stdin and written to stdout; diagnostics go to stderr.

mod commands;
mod indirect;

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::Context;
use clap::error::ErrorKind as ClapErrorKind;
use clap::{Args, Parser};
use sop_core::{ErrorKind, SopError};
use sop_external::{ExternalConfig, ExternalSop, TempDirLocation};
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::commands::Command;
use crate::indirect::Resolver;

#[derive(Parser, Debug)]
#[command(name = "sop")]
#[command(author, version, about = "Stateless OpenPGP through an external backend")]
#[command(
    long_about = "sop - Stateless OpenPGP.\n\n\
    Every operation is delegated to an external sop implementation. Secrets reach \
    the backend through its environment, never through its arguments."
)]
struct Cli {
    #[command(flatten)]
    backend: BackendArgs,

    /// Log backend invocations to stderr
    #[arg(long)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug)]
struct BackendArgs {
    /// Backend sop executable
    #[arg(long = "backend", env = "SOP_BACKEND", default_value = "sop", value_name = "BIN")]
    binary: PathBuf,

    /// Kill the backend after this many seconds
    #[arg(long = "backend-timeout", env = "SOP_BACKEND_TIMEOUT", value_name = "SECONDS")]
    timeout: Option<u64>,

    /// Extra environment variable for the backend
    #[arg(long = "backend-env", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    env: Vec<(String, String)>,

    /// Directory for side-channel scratch files
    #[arg(long = "temp-dir", env = "SOP_TEMP_DIR", value_name = "DIR")]
    temp_dir: Option<PathBuf>,
}

impl BackendArgs {
    fn config(&self) -> ExternalConfig {
        let mut config = ExternalConfig::new(&self.binary);
        for (key, value) in &self.env {
            config = config.with_env(key, value);
        }
        if let Some(secs) = self.timeout {
            config = config.with_timeout(Duration::from_secs(secs));
        }
        if let Some(dir) = &self.temp_dir {
            config = config.with_temp_dir(TempDirLocation::In(dir.clone()));
        }
        config
    }
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", s)),
    }
}

/// Exit status for a rejected command line.
fn usage_exit_code(kind: ClapErrorKind) -> u8 {
    let kind = match kind {
        ClapErrorKind::DisplayHelp | ClapErrorKind::DisplayVersion => return 0,
        ClapErrorKind::InvalidSubcommand => ErrorKind::UnsupportedSubcommand,
        ClapErrorKind::MissingRequiredArgument
        | ClapErrorKind::MissingSubcommand
        | ClapErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
        | ClapErrorKind::TooFewValues => ErrorKind::MissingArg,
        ClapErrorKind::ArgumentConflict => ErrorKind::IncompatibleOptions,
        _ => ErrorKind::UnsupportedOption,
    };
    kind.exit_code() as u8
}

/// Exit status of the first taxonomy error in the chain, 1 otherwise.
fn exit_code(error: &anyhow::Error) -> u8 {
    error
        .chain()
        .find_map(|cause| cause.downcast_ref::<SopError>())
        .map_or(1, |e| e.exit_code() as u8)
}

fn report(error: &anyhow::Error) {
    eprintln!("Error: {}", error);
    for cause in error.chain().skip(1) {
        eprintln!("  caused by: {}", cause);
    }
}

fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = cli.backend.config();
    debug!(
        backend = %config.binary().display(),
        timeout = ?config.timeout,
        temp_dir = ?config.temp_dir,
        "backend configured"
    );
    let sop = ExternalSop::new(config);
    let resolver = Resolver::from_process().context("Cannot determine the working directory")?;
    commands::execute(cli.command, &sop, &resolver).await
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return ExitCode::from(usage_exit_code(e.kind()));
        }
    };

    init_tracing(cli.debug);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report(&e);
            ExitCode::from(exit_code(&e))
        }
    }
}
