//! Configuration management
//!
//! Settings are resolved in this order (later wins):
//! 1. defaults
//! 2. `addressbook.toml` (or an explicit path)
//! 3. environment variables
//!
//! `${VAR_NAME}` inside a TOML string value is replaced with the variable's
//! value.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{ContactsError, Result};
use crate::stream::EnumerationOptions;

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "addressbook.toml";

/// Which contact store to read from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case", try_from = "String")]
pub enum StoreBackend {
    /// Contacts.app through osascript
    #[default]
    ContactsApp,
    /// JSON fixture file held in memory
    Fixture,
}

impl StoreBackend {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "contacts-app" | "contacts" | "macos" => Some(Self::ContactsApp),
            "fixture" | "memory" | "json" => Some(Self::Fixture),
            _ => None,
        }
    }
}

impl TryFrom<String> for StoreBackend {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        Self::parse(&value).ok_or_else(|| format!("unknown store backend: {}", value))
    }
}

/// Store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Path to the fixture file (fixture backend only)
    #[serde(default)]
    pub fixture_path: Option<PathBuf>,

    /// Records fetched per native round-trip
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Upper bound for a single store script
    #[serde(default = "default_script_timeout_secs")]
    pub script_timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            fixture_path: None,
            page_size: default_page_size(),
            script_timeout_secs: default_script_timeout_secs(),
        }
    }
}

/// Bulk enumeration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnumerationConfig {
    /// Minimum percent advance between progress events
    #[serde(default = "default_progress_step")]
    pub progress_step: u8,

    /// Reject concurrent enumerations with a busy error
    #[serde(default)]
    pub exclusive: bool,

    /// Caller-side bound on a full enumeration
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EnumerationConfig {
    fn default() -> Self {
        Self {
            progress_step: default_progress_step(),
            exclusive: false,
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_page_size() -> usize {
    50
}

fn default_script_timeout_secs() -> u64 {
    30
}

fn default_progress_step() -> u8 {
    1
}

fn default_timeout_secs() -> u64 {
    300
}

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub enumeration: EnumerationConfig,
}

impl Config {
    /// Replace `${VAR_NAME}` with the looked-up value; unknown names expand
    /// to an empty string.
    fn expand_env_vars<F>(value: &str, lookup: F) -> String
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut result = String::new();
        let mut chars = value.chars().peekable();

        while let Some(c) = chars.next() {
            if c == '$' && chars.peek() == Some(&'{') {
                chars.next();

                let mut var_name = String::new();
                for c in chars.by_ref() {
                    if c == '}' {
                        break;
                    }
                    var_name.push(c);
                }

                if let Some(env_value) = lookup(&var_name) {
                    result.push_str(&env_value);
                }
            } else {
                result.push(c);
            }
        }

        result
    }

    /// Expand `${VAR}` in every string value, leaving keys and other
    /// value types alone
    fn expand_string_value<F>(value: toml::Value, lookup: &F) -> toml::Value
    where
        F: Fn(&str) -> Option<String>,
    {
        match value {
            toml::Value::String(s) => toml::Value::String(Self::expand_env_vars(&s, lookup)),
            toml::Value::Array(items) => toml::Value::Array(
                items
                    .into_iter()
                    .map(|item| Self::expand_string_value(item, lookup))
                    .collect(),
            ),
            toml::Value::Table(table) => toml::Value::Table(
                table
                    .into_iter()
                    .map(|(key, item)| (key, Self::expand_string_value(item, lookup)))
                    .collect(),
            ),
            other => other,
        }
    }

    /// Parse TOML text, expanding `${VAR}` references from the environment
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Self::from_toml_str_with(content, |name| std::env::var(name).ok())
    }

    fn from_toml_str_with<F>(content: &str, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let parsed: toml::Value = toml::from_str(content)
            .map_err(|e| ContactsError::Configuration(format!("Failed to parse TOML: {}", e)))?;

        let config: Self = Self::expand_string_value(parsed, &lookup)
            .try_into()
            .map_err(|e| ContactsError::Configuration(format!("Invalid configuration: {}", e)))?;
        Ok(config)
    }

    /// Load from a TOML file, then apply environment overrides
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_toml_file_with(path, |name| std::env::var(name).ok())
    }

    fn from_toml_file_with<P, F>(path: P, lookup: F) -> Result<Self>
    where
        P: AsRef<Path>,
        F: Fn(&str) -> Option<String>,
    {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            ContactsError::Configuration(format!("Failed to read config file {}: {}", path.display(), e))
        })?;

        let mut config = Self::from_toml_str_with(&content, &lookup)?;
        config.apply_overrides(&lookup)?;
        config.validate()?;

        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Load from `path`, or from `addressbook.toml` if present, or from the
    /// environment alone.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::from_toml_file(path);
        }

        if Path::new(DEFAULT_CONFIG_FILE).exists() {
            return Self::from_toml_file(DEFAULT_CONFIG_FILE);
        }

        Self::from_env()
    }

    /// Defaults plus environment overrides
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(backend) = get("ADDRESSBOOK_BACKEND") {
            self.store.backend = StoreBackend::parse(&backend).ok_or_else(|| {
                ContactsError::Configuration(format!("Unknown store backend: {}", backend))
            })?;
        }
        if let Some(path) = get("ADDRESSBOOK_FIXTURE") {
            self.store.fixture_path = Some(PathBuf::from(path));
        }
        if let Some(size) = get("ADDRESSBOOK_PAGE_SIZE") {
            self.store.page_size = parse_number("ADDRESSBOOK_PAGE_SIZE", &size)?;
        }
        if let Some(secs) = get("ADDRESSBOOK_SCRIPT_TIMEOUT_SECS") {
            self.store.script_timeout_secs = parse_number("ADDRESSBOOK_SCRIPT_TIMEOUT_SECS", &secs)?;
        }
        if let Some(step) = get("ADDRESSBOOK_PROGRESS_STEP") {
            self.enumeration.progress_step = parse_number("ADDRESSBOOK_PROGRESS_STEP", &step)?;
        }
        if let Some(exclusive) = get("ADDRESSBOOK_EXCLUSIVE") {
            self.enumeration.exclusive = parse_flag("ADDRESSBOOK_EXCLUSIVE", &exclusive)?;
        }
        if let Some(secs) = get("ADDRESSBOOK_TIMEOUT_SECS") {
            self.enumeration.timeout_secs = parse_number("ADDRESSBOOK_TIMEOUT_SECS", &secs)?;
        }

        debug!("Configuration after overrides: {:?}", self);
        Ok(())
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<()> {
        if self.store.page_size == 0 {
            return Err(ContactsError::Configuration(
                "store.page_size must be at least 1".to_string(),
            ));
        }
        if !(1..=100).contains(&self.enumeration.progress_step) {
            return Err(ContactsError::Configuration(
                "enumeration.progress_step must be between 1 and 100".to_string(),
            ));
        }
        if self.store.backend == StoreBackend::Fixture && self.store.fixture_path.is_none() {
            return Err(ContactsError::Configuration(
                "store.fixture_path is required for the fixture backend".to_string(),
            ));
        }
        Ok(())
    }

    /// Options handed to the enumeration controller
    pub fn enumeration_options(&self) -> EnumerationOptions {
        EnumerationOptions {
            page_size: self.store.page_size,
            progress_step: self.enumeration.progress_step,
            exclusive: self.enumeration.exclusive,
        }
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ContactsError::Configuration(format!("{} is not a valid number: {}", name, value)))
}

fn parse_flag(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ContactsError::Configuration(format!(
            "{} is not a valid flag: {}",
            name, value
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.store.backend, StoreBackend::ContactsApp);
        assert_eq!(config.store.page_size, 50);
        assert_eq!(config.enumeration.progress_step, 1);
        assert!(!config.enumeration.exclusive);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_expand_env_vars() {
        let env = vars(&[("HOME_DIR", "/home/ada")]);
        let expanded = Config::expand_env_vars("path = \"${HOME_DIR}/c.json\" ${MISSING}x", |k| {
            env.get(k).cloned()
        });
        assert_eq!(expanded, "path = \"/home/ada/c.json\" x");
    }

    #[test]
    fn test_expand_keeps_plain_dollar() {
        assert_eq!(Config::expand_env_vars("cost $5", |_| None), "cost $5");
    }

    #[test]
    fn test_expanded_value_with_backslash_and_quote() {
        let env = vars(&[("WIN_DIR", r"C:\Users\ada"), ("ODD_DIR", r#"/tmp/a"b"#)]);
        let toml = r#"
            [store]
            backend = "fixture"
            fixture_path = "${WIN_DIR}\\c.json"
        "#;
        let config = Config::from_toml_str_with(toml, |k| env.get(k).cloned()).unwrap();
        assert_eq!(config.store.fixture_path, Some(PathBuf::from(r"C:\Users\ada\c.json")));

        let toml = "[store]\nfixture_path = \"${ODD_DIR}/c.json\"";
        let config = Config::from_toml_str_with(toml, |k| env.get(k).cloned()).unwrap();
        assert_eq!(config.store.fixture_path, Some(PathBuf::from(r#"/tmp/a"b/c.json"#)));
    }

    #[test]
    fn test_expansion_ignores_comments() {
        let env = vars(&[("STEP", "oops")]);
        let toml = "# step is ${STEP}\n[enumeration]\nprogress_step = 4";
        let config = Config::from_toml_str_with(toml, |k| env.get(k).cloned()).unwrap();
        assert_eq!(config.enumeration.progress_step, 4);
    }

    #[test]
    fn test_parse_toml_sections() {
        let env = vars(&[("FIXTURES", "/data")]);
        let toml = r#"
            [store]
            backend = "fixture"
            fixture_path = "${FIXTURES}/book.json"
            page_size = 10

            [enumeration]
            progress_step = 5
            exclusive = true
        "#;
        let config = Config::from_toml_str_with(toml, |k| env.get(k).cloned()).unwrap();
        assert_eq!(config.store.backend, StoreBackend::Fixture);
        assert_eq!(config.store.fixture_path, Some(PathBuf::from("/data/book.json")));
        assert_eq!(config.store.script_timeout_secs, 30);
        assert_eq!(config.enumeration.timeout_secs, 300);

        let options = config.enumeration_options();
        assert_eq!(options.page_size, 10);
        assert_eq!(options.progress_step, 5);
        assert!(options.exclusive);
    }

    #[test]
    fn test_parse_toml_error() {
        let result = Config::from_toml_str_with("[store\nbackend=", |_| None);
        assert!(matches!(result, Err(ContactsError::Configuration(_))));
    }

    #[test]
    fn test_unknown_backend_in_toml() {
        let result = Config::from_toml_str_with("[store]\nbackend = \"ldap\"", |_| None);
        assert!(matches!(result, Err(ContactsError::Configuration(_))));
    }

    #[test]
    fn test_backend_aliases_match_between_toml_and_env() {
        for (name, expected) in [
            ("contacts-app", StoreBackend::ContactsApp),
            ("contacts", StoreBackend::ContactsApp),
            ("macos", StoreBackend::ContactsApp),
            ("fixture", StoreBackend::Fixture),
            ("memory", StoreBackend::Fixture),
            ("JSON", StoreBackend::Fixture),
        ] {
            let toml = format!("[store]\nbackend = \"{}\"", name);
            let from_toml = Config::from_toml_str_with(&toml, |_| None).unwrap();
            assert_eq!(from_toml.store.backend, expected, "toml {}", name);

            let env = vars(&[("ADDRESSBOOK_BACKEND", name)]);
            let mut from_env = Config::default();
            from_env.apply_overrides(|k| env.get(k).cloned()).unwrap();
            assert_eq!(from_env.store.backend, expected, "env {}", name);
        }
    }

    #[test]
    fn test_backend_serializes_canonical_name() {
        let json = serde_json::to_string(&StoreBackend::ContactsApp).unwrap();
        assert_eq!(json, "\"contacts-app\"");
    }

    #[test]
    fn test_env_overrides() {
        let env = vars(&[
            ("ADDRESSBOOK_BACKEND", "fixture"),
            ("ADDRESSBOOK_FIXTURE", "contacts.json"),
            ("ADDRESSBOOK_PAGE_SIZE", "25"),
            ("ADDRESSBOOK_PROGRESS_STEP", "10"),
            ("ADDRESSBOOK_EXCLUSIVE", "true"),
            ("ADDRESSBOOK_TIMEOUT_SECS", "60"),
            ("ADDRESSBOOK_SCRIPT_TIMEOUT_SECS", ""),
        ]);
        let mut config = Config::default();
        config.apply_overrides(|k| env.get(k).cloned()).unwrap();

        assert_eq!(config.store.backend, StoreBackend::Fixture);
        assert_eq!(config.store.fixture_path, Some(PathBuf::from("contacts.json")));
        assert_eq!(config.store.page_size, 25);
        assert_eq!(config.store.script_timeout_secs, 30);
        assert_eq!(config.enumeration.progress_step, 10);
        assert!(config.enumeration.exclusive);
        assert_eq!(config.enumeration.timeout_secs, 60);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_override_rejects_bad_number() {
        let env = vars(&[("ADDRESSBOOK_PAGE_SIZE", "lots")]);
        let mut config = Config::default();
        let result = config.apply_overrides(|k| env.get(k).cloned());
        assert!(matches!(result, Err(ContactsError::Configuration(_))));
    }

    #[test]
    fn test_exclusive_flag_values() {
        for (value, expected) in [
            ("true", true),
            ("1", true),
            ("yes", true),
            ("ON", true),
            ("false", false),
            ("0", false),
            ("no", false),
            ("off", false),
        ] {
            let env = vars(&[("ADDRESSBOOK_EXCLUSIVE", value)]);
            let mut config = Config::default();
            config.enumeration.exclusive = !expected;
            config.apply_overrides(|k| env.get(k).cloned()).unwrap();
            assert_eq!(config.enumeration.exclusive, expected, "{}", value);
        }
    }

    #[test]
    fn test_exclusive_flag_rejects_garbage() {
        let env = vars(&[("ADDRESSBOOK_EXCLUSIVE", "maybe")]);
        let mut config = Config::default();
        let result = config.apply_overrides(|k| env.get(k).cloned());
        assert!(matches!(result, Err(ContactsError::Configuration(_))));
        assert!(!config.enumeration.exclusive);
    }

    #[test]
    fn test_validate_ranges() {
        let mut config = Config::default();
        config.store.page_size = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.enumeration.progress_step = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.store.backend = StoreBackend::Fixture;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[enumeration]\nprogress_step = 20").unwrap();

        let config = Config::from_toml_file_with(file.path(), |_| None).unwrap();
        assert_eq!(config.enumeration.progress_step, 20);
        assert_eq!(config.store.backend, StoreBackend::ContactsApp);
    }

    #[test]
    fn test_from_toml_file_missing() {
        let result = Config::from_toml_file_with("/nonexistent/addressbook.toml", |_| None);
        assert!(matches!(result, Err(ContactsError::Configuration(_))));
    }
}
