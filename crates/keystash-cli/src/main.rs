mod cli;
mod config;
mod storage;

use std::process::ExitCode;

use clap::Parser;
use cli::{Command, ConfigCommand, StorageCommand};
use color_eyre::Result;
use keystash_core::storage::Storage;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const HEALTH_CHECK_KEY: &str = "keystash/health-check";

#[tokio::main]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;
    init_tracing();

    let cli = cli::Cli::parse();
    let config = config::Config::load()?;
    match cli.command {
        Command::Version => {
            print_version();
            Ok(ExitCode::SUCCESS)
        }
        Command::Config(ConfigCommand::Init) => {
            init_config(&config)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Health => {
            let store = storage::store_from_config(&config, cli.store)?;
            run_store_health(&store).await?;
            println!("Storage ({}): ok", store.kind());
            Ok(ExitCode::SUCCESS)
        }
        Command::Storage(cmd) => {
            let store = storage::store_from_config(&config, cli.store)?;
            let outcome = run_storage_command(&store, cmd).await?;
            if let Some(line) = &outcome.output {
                println!("{line}");
            }
            Ok(outcome.exit_code())
        }
    }
}

fn init_tracing() {
    // Respect user-provided filters; stderr keeps stdout free for values.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

fn print_version() {
    println!("keystash {}", env!("CARGO_PKG_VERSION"));
}

fn init_config(config: &config::Config) -> Result<()> {
    let path = config::write_default_if_missing(config)?;
    println!("Config initialized at {}", path.display());
    Ok(())
}

/// Result of a storage command: what to print and whether a lookup hit.
#[derive(Debug, PartialEq, Eq)]
struct Outcome {
    output: Option<String>,
    found: bool,
}

impl Outcome {
    fn done() -> Self {
        Self {
            output: None,
            found: true,
        }
    }

    fn exit_code(&self) -> ExitCode {
        if self.found {
            ExitCode::SUCCESS
        } else {
            ExitCode::from(1)
        }
    }
}

async fn run_storage_command<S: Storage>(store: &S, cmd: StorageCommand) -> Result<Outcome> {
    match cmd {
        StorageCommand::Find { key } => {
            let value = store.find(&key).await?;
            Ok(Outcome {
                found: value.is_some(),
                output: value,
            })
        }
        StorageCommand::Save { key, value } => {
            store.save(&key, &value).await?;
            info!(%key, "saved");
            Ok(Outcome::done())
        }
        StorageCommand::Remove { key } => {
            store.remove(&key).await?;
            info!(%key, "removed");
            Ok(Outcome::done())
        }
    }
}

/// Round-trips a marker value through the store and cleans it up.
async fn run_store_health<S: Storage>(store: &S) -> Result<()> {
    let payload = "ok";
    store.save(HEALTH_CHECK_KEY, payload).await?;
    let round_trip = store.find(HEALTH_CHECK_KEY).await?;
    store.remove(HEALTH_CHECK_KEY).await?;

    if round_trip.as_deref() != Some(payload) {
        color_eyre::eyre::bail!("storage round-trip failed");
    }
    if store.find(HEALTH_CHECK_KEY).await?.is_some() {
        color_eyre::eyre::bail!("health check entry was not removed");
    }
    Ok(())
}
