mod accounts;
mod auth;
mod clients;
mod connect;
mod core;
mod display;
mod init;
mod ledger;
mod model;
mod poller;
mod prompt;
mod secrets;
mod session;
mod settings;
mod shutdown;
mod sync;
mod upstream;

#[cfg(test)]
mod testing;

use anyhow::{anyhow, Context, Result};
use clap::{arg, Command};
use tracing_subscriber::{
    filter::LevelFilter, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

use crate::secrets::KeyringStore;
use crate::settings::Settings;

static CLIENT_NAME: &str = "monzo-bridge";

fn app() -> Command<'static> {
    Command::new(CLIENT_NAME)
        .about("Forwards new Monzo transactions into a Monetr budget as they happen.")
        .version("0.1.0")
        .subcommand_required(true)
        .allow_external_subcommands(false)
        .arg(arg!(CONFIG: -c --config [FILE] "Sets a custom config file"))
        .arg(arg!(verbose: -v --verbose "Logs progress to stderr"))
        .subcommand(Command::new("init").about("Collects Monetr and Monzo credentials and stores them in the system keyring."))
        .subcommand(Command::new("connect").about("Authorizes access to a Monzo account and selects the account to sync."))
        .subcommand(Command::new("accounts").about("Prints Monzo and Monetr accounts."))
        .subcommand(Command::new("sync")
            .about("Polls Monzo for new transactions and forwards them to Monetr until stopped.")
            .arg(arg!(once: --once "Runs a single pass and exits"))
            .arg(arg!(since: --since [TIMESTAMP] "RFC 3339 timestamp to start from when no sync position is stored yet, defaults to now.")))
        .subcommand(Command::new("logout").about("Forgets the stored Monzo tokens."))
        .subcommand(Command::new("reset")
            .about("Deletes all stored credentials, configuration and sync progress.")
            .arg(arg!(yes: -y --yes "Skips the confirmation prompt")))
}

fn open_store(settings: &Settings) -> Result<KeyringStore> {
    KeyringStore::open(&settings.keyring_service).map_err(|e| match e {
        secrets::Error::StoreUnavailable(_) => anyhow!("{}\n\n{}", e, secrets::platform_help()),
        e => e.into(),
    })
}

async fn run() -> Result<()> {
    let matches = app().get_matches();

    if matches.is_present("verbose") {
        tracing_subscriber::registry()
            .with(
                EnvFilter::builder()
                    .with_default_directive(LevelFilter::INFO.into())
                    .from_env_lossy(),
            )
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    let settings = Settings::new(matches.value_of("CONFIG")).context("reading settings")?;
    let store = open_store(&settings)?;

    match matches.subcommand() {
        Some(("init", _)) => init::run(&settings, &store).await?,
        Some(("connect", _)) => connect::run(&settings, store).await?,
        Some(("accounts", _)) => accounts::run(&settings, store).await?,
        Some(("sync", sync_matches)) => sync::run(sync_matches, &settings, store).await?,
        Some(("logout", _)) => session::logout(&settings, store)?,
        Some(("reset", reset_matches)) => session::reset(&store, reset_matches.is_present("yes"))?,
        None => unreachable!("subcommand is required"),
        _ => unreachable!(),
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        println!("{:#}", err);
        std::process::exit(1);
    }
}
