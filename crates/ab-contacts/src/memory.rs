//! In-memory contact store
//!
//! Backs the `fixture` backend (records loaded from a JSON file) and the
//! test suites.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};

use crate::error::{ContactsError, Result};
use crate::models::{AuthorizationStatus, RawContactRecord};
use crate::store::ContactStore;

/// Fixture file layout: a bare array, or an object naming the "me" card
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Fixture {
    Contacts(Vec<RawContactRecord>),
    Book {
        #[serde(default)]
        me: Option<usize>,
        contacts: Vec<RawContactRecord>,
    },
}

/// Contact store held in memory
#[derive(Debug)]
pub struct InMemoryStore {
    name: String,
    records: Vec<RawContactRecord>,
    me: Option<usize>,
    authorization: AuthorizationStatus,
    access_response: AuthorizationStatus,
    fail_at: Option<usize>,
    prompts: AtomicUsize,
}

impl InMemoryStore {
    /// Create a store whose first access prompt is granted
    pub fn new(records: Vec<RawContactRecord>) -> Self {
        Self {
            name: "memory".to_string(),
            records,
            me: None,
            authorization: AuthorizationStatus::NotDetermined,
            access_response: AuthorizationStatus::Granted,
            fail_at: None,
            prompts: AtomicUsize::new(0),
        }
    }

    /// Load records from a JSON fixture file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let mut store = Self::from_json_str(&content)?;
        store.name = format!("fixture:{}", path.display());
        info!("Loaded {} contacts from {}", store.records.len(), path.display());
        Ok(store)
    }

    /// Parse records from fixture JSON
    pub fn from_json_str(json: &str) -> Result<Self> {
        let store = match serde_json::from_str::<Fixture>(json)? {
            Fixture::Contacts(contacts) => Self::new(contacts),
            Fixture::Book { me, contacts } => {
                if let Some(index) = me {
                    if index >= contacts.len() {
                        return Err(ContactsError::Parse(format!(
                            "me index {} out of range for {} contacts",
                            index,
                            contacts.len()
                        )));
                    }
                }
                Self {
                    me,
                    ..Self::new(contacts)
                }
            }
        };
        // Fixture data is local; there is nobody to prompt.
        Ok(store.with_authorization(AuthorizationStatus::Granted))
    }

    /// Designate the record at `index` as the "me" card
    pub fn with_me(mut self, index: usize) -> Self {
        self.me = Some(index);
        self
    }

    /// Set the status reported before any prompt
    pub fn with_authorization(mut self, status: AuthorizationStatus) -> Self {
        self.authorization = status;
        self
    }

    /// Set the answer given when access is requested
    pub fn with_access_response(mut self, status: AuthorizationStatus) -> Self {
        self.access_response = status;
        self
    }

    /// Make reads of `index` fail as if the platform store went away
    pub fn with_failure_at(mut self, index: usize) -> Self {
        self.fail_at = Some(index);
        self
    }

    /// Number of times access was requested
    pub fn prompt_count(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContactStore for InMemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    async fn authorization_status(&self) -> Result<AuthorizationStatus> {
        Ok(self.authorization)
    }

    async fn request_access(&self) -> Result<AuthorizationStatus> {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        Ok(self.access_response)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.records.len())
    }

    async fn contact_at(&self, index: usize) -> Result<RawContactRecord> {
        if self.fail_at == Some(index) {
            debug!("Injected failure reading contact {}", index);
            return Err(ContactsError::StoreUnavailable(format!(
                "read of contact {} failed",
                index
            )));
        }

        self.records.get(index).cloned().ok_or_else(|| {
            ContactsError::NotFound(format!(
                "index {} out of range (store holds {})",
                index,
                self.records.len()
            ))
        })
    }

    async fn me(&self) -> Result<RawContactRecord> {
        self.me
            .and_then(|index| self.records.get(index).cloned())
            .ok_or_else(|| ContactsError::NotFound("no me card configured".to_string()))
    }
}
