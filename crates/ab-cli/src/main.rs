//! addressbook: contact store command line tool
//!
//! Usage:
//!   addressbook              - Print every contact as JSON
//!   addressbook --count      - Print the contact count
//!   addressbook --me         - Print the owner's card
//!   addressbook --index N    - Print one contact
//!   addressbook --help       - Show help

mod cli;

use std::sync::Arc;
use std::time::Duration;

use ab_contacts::{AddressBook, Config, ContactStore, InMemoryStore, StoreBackend};
use ab_macos::ContactsAppStore;
use anyhow::Context;
use cli::{Args, RunMode};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

#[derive(Serialize)]
struct CountOutput {
    count: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse(std::env::args().skip(1))?;

    match args.mode {
        RunMode::Help => {
            cli::print_help();
            return Ok(());
        }
        RunMode::Version => {
            println!("addressbook {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        _ => {}
    }

    dotenvy::dotenv().ok();

    // Logs go to stderr; stdout carries the JSON result
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let mut config = Config::load(args.config_path.as_deref())
        .map_err(|e| anyhow::anyhow!("Config error: {}", e))?;

    if let Some(path) = args.fixture_path.clone() {
        config.store.backend = StoreBackend::Fixture;
        config.store.fixture_path = Some(path);
    }

    let store = open_store(&config)?;
    tracing::info!("Using contact store: {}", store.name());

    let book = AddressBook::new(store).with_options(config.enumeration_options());

    match args.mode {
        RunMode::Count => {
            let count = book.get_contacts_count().await?;
            print_json(&CountOutput { count })
        }
        RunMode::Me => print_json(&book.get_me().await?),
        RunMode::Index(index) => print_json(&book.get_contact(index).await?),
        RunMode::All => run_enumeration(&book, &config).await,
        RunMode::Help | RunMode::Version => Ok(()),
    }
}

/// Build the configured store backend
fn open_store(config: &Config) -> anyhow::Result<Arc<dyn ContactStore>> {
    match config.store.backend {
        StoreBackend::ContactsApp => Ok(Arc::new(ContactsAppStore::new(Duration::from_secs(
            config.store.script_timeout_secs,
        )))),
        StoreBackend::Fixture => {
            let path = config
                .store
                .fixture_path
                .as_ref()
                .context("fixture backend selected without a fixture path")?;
            let store = InMemoryStore::from_json_file(path)
                .with_context(|| format!("Failed to load fixture {}", path.display()))?;
            Ok(Arc::new(store))
        }
    }
}

/// Enumerate everything under the configured time bound
async fn run_enumeration(book: &AddressBook, config: &Config) -> anyhow::Result<()> {
    let timeout = Duration::from_secs(config.enumeration.timeout_secs);
    let mut result = None;

    tokio::time::timeout(
        timeout,
        book.get_contacts(
            Some(|percent: u8| tracing::info!("Progress: {}%", percent)),
            |contacts| result = Some(contacts),
        ),
    )
    .await
    .with_context(|| format!("Enumeration did not finish within {:?}", timeout))??;

    let contacts = result.context("enumeration finished without delivering contacts")?;
    print_json(&contacts)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}
