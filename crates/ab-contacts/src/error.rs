//! Error types for ab-contacts

use thiserror::Error;

/// ab-contacts error type
#[derive(Error, Debug)]
pub enum ContactsError {
    #[error("Access to the contact store was denied")]
    AccessDenied,

    #[error("Contact not found: {0}")]
    NotFound(String),

    #[error("Contact store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Another enumeration is already in progress")]
    Busy,

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Store script failed: {0}")]
    Script(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ContactsError {
    /// Convert a failure seen during bulk traversal into `StoreUnavailable`.
    ///
    /// Errors that already carry that kind pass through untouched.
    pub fn into_unavailable(self) -> Self {
        match self {
            Self::StoreUnavailable(_) => self,
            other => Self::StoreUnavailable(other.to_string()),
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, ContactsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_unavailable_wraps_other_kinds() {
        let err = ContactsError::NotFound("index 3".to_string()).into_unavailable();
        match err {
            ContactsError::StoreUnavailable(msg) => assert!(msg.contains("index 3")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_into_unavailable_keeps_message() {
        let err = ContactsError::StoreUnavailable("gone".to_string()).into_unavailable();
        assert_eq!(err.to_string(), "Contact store unavailable: gone");
    }
}
