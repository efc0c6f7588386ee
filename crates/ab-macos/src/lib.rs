//! ab-macos: Contacts.app binding
//!
//! Implements `ContactStore` over macOS Contacts.app, driven through AppleScript.
//! On other platforms every call fails with `StoreUnavailable`.

pub mod script;
pub mod store;

pub use script::AppleScript;
pub use store::ContactsAppStore;
