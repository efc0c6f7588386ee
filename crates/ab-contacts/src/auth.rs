//! Process-scoped authorization guard
//!
//! The platform may show a permission prompt the first time the store is
//! touched. The decision is resolved once per `Authorization` and then
//! reused; concurrent first callers wait on the same initialization.

use std::sync::{Arc, LazyLock};

use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::error::{ContactsError, Result};
use crate::models::AuthorizationStatus;
use crate::store::ContactStore;

static PROCESS: LazyLock<Arc<Authorization>> = LazyLock::new(|| Arc::new(Authorization::new()));

/// Memoized authorization decision
#[derive(Debug, Default)]
pub struct Authorization {
    status: OnceCell<AuthorizationStatus>,
}

impl Authorization {
    /// Create a fresh, unresolved guard
    pub fn new() -> Self {
        Self::default()
    }

    /// The guard shared by the whole process
    pub fn process() -> Arc<Self> {
        Arc::clone(&PROCESS)
    }

    /// Decision already taken, if any
    pub fn status(&self) -> Option<AuthorizationStatus> {
        self.status.get().copied()
    }

    /// Resolve authorization against `store`, prompting at most once.
    ///
    /// A failure to query the store is returned without being memoized, so a
    /// later call can try again.
    pub async fn resolve(&self, store: &dyn ContactStore) -> Result<AuthorizationStatus> {
        let status = self
            .status
            .get_or_try_init(|| async {
                let current = store.authorization_status().await?;
                debug!("Contact store {} reports {:?}", store.name(), current);

                let decided = match current {
                    AuthorizationStatus::NotDetermined => {
                        info!("Requesting contact store access from {}", store.name());
                        store.request_access().await?
                    }
                    other => other,
                };

                if !decided.is_granted() {
                    warn!("Contact store access not granted: {:?}", decided);
                }
                Ok::<_, ContactsError>(decided)
            })
            .await?;

        Ok(*status)
    }

    /// Resolve authorization and fail with `AccessDenied` unless granted
    pub async fn ensure(&self, store: &dyn ContactStore) -> Result<()> {
        if self.resolve(store).await?.is_granted() {
            Ok(())
        } else {
            Err(ContactsError::AccessDenied)
        }
    }
}
