//! ab-contacts: contact store enumeration and normalization
//!
//! This crate reads a platform contact store and returns contacts in one
//! consistent shape.
//!
//! ## Features
//!
//! - Label decoding (`_$!<Home>!$_` -> `home`)
//! - Normalization of raw platform records into [`NormalizedContact`]
//! - Authorization resolved once per process
//! - Streaming bulk enumeration with progress events
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use ab_contacts::{AddressBook, InMemoryStore};
//!
//! let store = InMemoryStore::from_json_file("contacts.json")?;
//! let book = AddressBook::new(Arc::new(store));
//!
//! // Single contact
//! let first = book.get_contact(0).await?;
//!
//! // Everything, with progress
//! book.get_contacts(
//!     Some(|percent| println!("{percent}%")),
//!     |contacts| println!("{} contacts", contacts.len()),
//! ).await?;
//! ```

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod label;
pub mod memory;
pub mod models;
pub mod normalize;
pub mod store;
pub mod stream;

pub use auth::Authorization;
pub use client::AddressBook;
pub use config::{Config, StoreBackend};
pub use error::{ContactsError, Result};
pub use label::decode_label;
pub use memory::InMemoryStore;
pub use models::{
    AuthorizationStatus, LabeledEntry, LabeledValue, NormalizedContact, PostalAddress, RawContactRecord,
};
pub use normalize::normalize;
pub use store::{ContactStore, StoreAccessor};
pub use stream::{Enumeration, EnumerationEvent, EnumerationOptions, EnumerationState};

/// Re-export the common types for easy use
pub mod prelude {
    pub use super::{AddressBook, ContactStore, Enumeration, EnumerationEvent, NormalizedContact};
}
