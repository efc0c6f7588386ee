//! Store access layer
//!
//! `ContactStore` is the seam to the platform contact store. Backends only
//! implement raw access; `StoreAccessor` adds authorization and is the only
//! thing the rest of the crate talks to.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tracing::debug;

use crate::auth::Authorization;
use crate::error::{ContactsError, Result};
use crate::models::{AuthorizationStatus, RawContactRecord};
use crate::stream::{Enumeration, EnumerationOptions};

/// Platform contact store binding
///
/// Indices are zero-based and refer to the store's native enumeration order.
#[async_trait]
pub trait ContactStore: Send + Sync {
    /// Backend name used in logs
    fn name(&self) -> &str;

    /// Current authorization state, without prompting
    async fn authorization_status(&self) -> Result<AuthorizationStatus>;

    /// Ask the platform for access; may show an OS prompt
    async fn request_access(&self) -> Result<AuthorizationStatus>;

    /// Total number of contacts
    async fn count(&self) -> Result<usize>;

    /// Contact at `index`, `NotFound` when out of bounds
    async fn contact_at(&self, index: usize) -> Result<RawContactRecord>;

    /// The "me" card, `NotFound` when none is configured
    async fn me(&self) -> Result<RawContactRecord>;

    /// Up to `len` contacts starting at `start`
    ///
    /// Backends that can fetch several records per native round-trip should
    /// override this.
    async fn page(&self, start: usize, len: usize) -> Result<Vec<RawContactRecord>> {
        let mut records = Vec::with_capacity(len);
        for index in start..start + len {
            records.push(self.contact_at(index).await?);
        }
        Ok(records)
    }
}

/// Authorized access to a contact store
#[derive(Clone)]
pub struct StoreAccessor {
    store: Arc<dyn ContactStore>,
    authorization: Arc<Authorization>,
    options: EnumerationOptions,
    enumerating: Arc<AtomicBool>,
}

impl StoreAccessor {
    /// Wrap `store`, resolving authorization through the process-wide guard
    pub fn new(store: Arc<dyn ContactStore>) -> Self {
        Self::with_authorization(store, Authorization::process())
    }

    /// Wrap `store` with an explicit authorization guard
    pub fn with_authorization(store: Arc<dyn ContactStore>, authorization: Arc<Authorization>) -> Self {
        Self {
            store,
            authorization,
            options: EnumerationOptions::default(),
            enumerating: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Set options used by bulk enumeration
    pub fn with_options(mut self, options: EnumerationOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &EnumerationOptions {
        &self.options
    }

    /// Contact at `index`
    pub async fn contact_by_index(&self, index: usize) -> Result<RawContactRecord> {
        self.authorization.ensure(self.store.as_ref()).await?;
        debug!("Fetching contact {} from {}", index, self.store.name());
        self.store.contact_at(index).await
    }

    /// The store owner's own card
    pub async fn self_contact(&self) -> Result<RawContactRecord> {
        self.authorization.ensure(self.store.as_ref()).await?;
        debug!("Fetching self contact from {}", self.store.name());
        self.store.me().await
    }

    /// Number of contacts in the store
    pub async fn count(&self) -> Result<usize> {
        self.authorization.ensure(self.store.as_ref()).await?;
        self.store.count().await
    }

    /// Start a bulk traversal of the store.
    ///
    /// Authorization is resolved before the traversal task exists, so a
    /// denial surfaces here and never as a stream event.
    pub async fn enumerate(&self) -> Result<Enumeration> {
        self.authorization.ensure(self.store.as_ref()).await?;

        let slot = if self.options.exclusive {
            Some(EnumerationSlot::acquire(&self.enumerating)?)
        } else {
            None
        };

        Ok(Enumeration::start(
            Arc::clone(&self.store),
            self.options.clone(),
            slot,
        ))
    }
}

/// Held by an exclusive traversal; frees the slot on drop
#[derive(Debug)]
pub(crate) struct EnumerationSlot {
    flag: Arc<AtomicBool>,
}

impl EnumerationSlot {
    fn acquire(flag: &Arc<AtomicBool>) -> Result<Self> {
        if flag.swap(true, Ordering::SeqCst) {
            return Err(ContactsError::Busy);
        }
        Ok(Self {
            flag: Arc::clone(flag),
        })
    }
}

impl Drop for EnumerationSlot {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}
