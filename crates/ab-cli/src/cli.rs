//! Command line parsing

use std::path::PathBuf;

use anyhow::{Context, bail};

/// What the binary was asked to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    /// Enumerate every contact
    All,
    /// Print the number of contacts
    Count,
    /// Print the "me" card
    Me,
    /// Print the contact at an index
    Index(usize),
    /// Show help
    Help,
    /// Show version
    Version,
}

/// Parsed command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Args {
    pub mode: RunMode,
    pub config_path: Option<PathBuf>,
    pub fixture_path: Option<PathBuf>,
}

impl Args {
    /// Parse arguments, excluding the program name
    pub fn parse<I, S>(args: I) -> anyhow::Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut parsed = Self {
            mode: RunMode::All,
            config_path: None,
            fixture_path: None,
        };
        let mut args = args.into_iter().map(Into::into);

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--all" | "-a" => parsed.mode = RunMode::All,
                "--count" | "-n" => parsed.mode = RunMode::Count,
                "--me" | "-m" => parsed.mode = RunMode::Me,
                "--index" | "-i" => {
                    let value = args.next().context("--index requires a value")?;
                    let index = value
                        .parse()
                        .with_context(|| format!("invalid index: {}", value))?;
                    parsed.mode = RunMode::Index(index);
                }
                "--config" | "-c" => {
                    let value = args.next().context("--config requires a path")?;
                    parsed.config_path = Some(PathBuf::from(value));
                }
                "--fixture" | "-f" => {
                    let value = args.next().context("--fixture requires a path")?;
                    parsed.fixture_path = Some(PathBuf::from(value));
                }
                "--help" | "-h" => return Ok(Self { mode: RunMode::Help, ..parsed }),
                "--version" | "-v" => return Ok(Self { mode: RunMode::Version, ..parsed }),
                other => bail!("unknown argument: {} (see --help)", other),
            }
        }

        Ok(parsed)
    }
}

/// Print help message
pub fn print_help() {
    println!("addressbook - read and normalize the system contact store");
    println!();
    println!("Usage:");
    println!("  addressbook                 Print every contact as JSON (with progress on stderr)");
    println!("  addressbook --count         Print the number of contacts");
    println!("  addressbook --me            Print the owner's own contact");
    println!("  addressbook --index N       Print the contact at index N");
    println!("  addressbook --config PATH   Read settings from PATH (default: addressbook.toml)");
    println!("  addressbook --fixture PATH  Read contacts from a JSON fixture instead of Contacts.app");
    println!("  addressbook --help          Show this help message");
    println!("  addressbook --version       Show version");
    println!();
    println!("Environment Variables:");
    println!("  ADDRESSBOOK_BACKEND              contacts-app or fixture (default: contacts-app)");
    println!("  ADDRESSBOOK_FIXTURE              Fixture file for the fixture backend");
    println!("  ADDRESSBOOK_PAGE_SIZE            Contacts fetched per store call (default: 50)");
    println!("  ADDRESSBOOK_SCRIPT_TIMEOUT_SECS  Bound on one store call (default: 30)");
    println!("  ADDRESSBOOK_PROGRESS_STEP        Minimum percent between progress lines (default: 1)");
    println!("  ADDRESSBOOK_EXCLUSIVE            Reject concurrent enumerations (default: false)");
    println!("  ADDRESSBOOK_TIMEOUT_SECS         Bound on a full enumeration (default: 300)");
    println!("  RUST_LOG                         Log filter (default: info)");
}
