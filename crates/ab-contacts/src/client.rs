//! Caller-facing address book API

use std::sync::Arc;

use tracing::{debug, info};

use crate::auth::Authorization;
use crate::error::Result;
use crate::models::NormalizedContact;
use crate::normalize::normalize;
use crate::store::{ContactStore, StoreAccessor};
use crate::stream::{Enumeration, EnumerationOptions};

/// Read-only view over a contact store returning normalized contacts
#[derive(Clone)]
pub struct AddressBook {
    accessor: StoreAccessor,
}

impl AddressBook {
    /// Create an address book over `store` using the process-wide
    /// authorization guard
    pub fn new(store: Arc<dyn ContactStore>) -> Self {
        Self {
            accessor: StoreAccessor::new(store),
        }
    }

    /// Create an address book with its own authorization guard
    pub fn with_authorization(store: Arc<dyn ContactStore>, authorization: Arc<Authorization>) -> Self {
        Self {
            accessor: StoreAccessor::with_authorization(store, authorization),
        }
    }

    /// Set bulk enumeration options
    pub fn with_options(mut self, options: EnumerationOptions) -> Self {
        self.accessor = self.accessor.with_options(options);
        self
    }

    /// Contact at `index` in store order
    pub async fn get_contact(&self, index: usize) -> Result<NormalizedContact> {
        let raw = self.accessor.contact_by_index(index).await?;
        Ok(normalize(raw))
    }

    /// The store owner's own contact
    pub async fn get_me(&self) -> Result<NormalizedContact> {
        let raw = self.accessor.self_contact().await?;
        Ok(normalize(raw))
    }

    /// Number of contacts in the store
    pub async fn get_contacts_count(&self) -> Result<usize> {
        self.accessor.count().await
    }

    /// Start a full enumeration and consume it as a stream of events
    pub async fn contacts(&self) -> Result<Enumeration> {
        self.accessor.enumerate().await
    }

    /// Enumerate every contact, reporting progress as an integer percent.
    ///
    /// `on_complete` runs exactly once on success and never on failure; no
    /// progress is reported after it.
    pub async fn get_contacts<P, C>(&self, on_progress: Option<P>, on_complete: C) -> Result<()>
    where
        P: FnMut(u8),
        C: FnOnce(Vec<NormalizedContact>),
    {
        let mut on_progress = on_progress;
        let enumeration = self.accessor.enumerate().await?;

        let contacts = enumeration
            .collect_with(|percent| {
                debug!("Enumeration progress: {}%", percent);
                if let Some(callback) = on_progress.as_mut() {
                    callback(percent);
                }
            })
            .await?;

        info!("Fetched {} contacts", contacts.len());
        on_complete(contacts);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ContactsError;
    use crate::memory::InMemoryStore;
    use crate::models::{AuthorizationStatus, LabeledValue, RawContactRecord};
    use std::cell::RefCell;
    use tokio_test::assert_ok;

    fn book(store: InMemoryStore) -> AddressBook {
        AddressBook::with_authorization(Arc::new(store), Arc::new(Authorization::new()))
            .with_options(EnumerationOptions {
                page_size: 2,
                ..Default::default()
            })
    }

    fn sample() -> Vec<RawContactRecord> {
        vec![
            RawContactRecord::new("1", "Ada").with_email("_$!<Work>!$_", "a@b.com"),
            RawContactRecord::default(),
            RawContactRecord::new("3", "Grace").with_phone("_$!<Mobile>!$_", "+1555"),
        ]
    }

    #[tokio::test]
    async fn test_get_contact_normalizes() {
        let book = book(InMemoryStore::new(sample()));
        let contact = assert_ok!(book.get_contact(0).await);
        assert_eq!(
            contact.emails,
            vec![LabeledValue {
                kind: "work".to_string(),
                value: Some("a@b.com".to_string()),
            }]
        );

        let empty = assert_ok!(book.get_contact(1).await);
        assert_eq!(empty, NormalizedContact::default());
    }

    #[tokio::test]
    async fn test_get_contact_not_found() {
        let book = book(InMemoryStore::new(sample()));
        assert!(matches!(book.get_contact(3).await, Err(ContactsError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_get_me() {
        let book = book(InMemoryStore::new(sample()).with_me(2));
        let me = assert_ok!(book.get_me().await);
        assert_eq!(me.name.as_deref(), Some("Grace"));
        assert_eq!(me.phone_numbers[0].kind, "mobile");
    }

    #[tokio::test]
    async fn test_get_contacts_count() {
        let book = book(InMemoryStore::new(sample()));
        assert_eq!(assert_ok!(book.get_contacts_count().await), 3);
    }

    #[tokio::test]
    async fn test_get_contacts_callbacks() {
        let book = book(InMemoryStore::new(sample()));
        let events = RefCell::new(Vec::new());

        assert_ok!(
            book.get_contacts(
                Some(|p: u8| events.borrow_mut().push(format!("progress {p}"))),
                |contacts: Vec<NormalizedContact>| {
                    events.borrow_mut().push(format!("complete {}", contacts.len()))
                },
            )
            .await
        );

        assert_eq!(
            events.into_inner(),
            vec!["progress 67", "progress 100", "complete 3"]
        );
    }

    #[tokio::test]
    async fn test_get_contacts_without_progress() {
        let book = book(InMemoryStore::new(sample()));
        let mut received = None;

        assert_ok!(
            book.get_contacts(None::<fn(u8)>, |contacts| received = Some(contacts))
                .await
        );

        let contacts = received.unwrap();
        assert_eq!(contacts.len(), 3);
        assert_eq!(contacts[2].unique_id.as_deref(), Some("3"));
    }

    #[tokio::test]
    async fn test_get_contacts_failure_skips_completion() {
        let book = book(InMemoryStore::new(sample()).with_failure_at(2));
        let mut completed = false;
        let mut progress = Vec::new();

        let result = book
            .get_contacts(Some(|p: u8| progress.push(p)), |_| completed = true)
            .await;

        assert!(matches!(result, Err(ContactsError::StoreUnavailable(_))));
        assert!(!completed);
        assert_eq!(progress, vec![67]);
    }

    #[tokio::test]
    async fn test_get_contacts_denied_before_progress() {
        let store = InMemoryStore::new(sample()).with_access_response(AuthorizationStatus::Denied);
        let book = book(store);
        let mut progress_calls = 0;
        let mut completed = false;

        let result = book
            .get_contacts(Some(|_: u8| progress_calls += 1), |_| completed = true)
            .await;

        assert!(matches!(result, Err(ContactsError::AccessDenied)));
        assert_eq!(progress_calls, 0);
        assert!(!completed);
    }
}
