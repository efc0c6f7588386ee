//! Apple Script execution
//!
//! Runs scripts through `osascript` and maps its failures onto the contact
//! store error kinds.

use std::time::Duration;

use ab_contacts::{ContactsError, Result};
use tokio::process::Command;
use tracing::{debug, error};

/// "Not authorized to send Apple events"
const ERR_NOT_AUTHORIZED: &str = "-1743";
/// "Can't get ..." (object does not exist)
const ERR_NO_SUCH_OBJECT: &str = "-1728";

/// Apple Script executor with a per-script time bound
#[derive(Debug, Clone)]
pub struct AppleScript {
    timeout: Duration,
}

impl AppleScript {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Execute a script and return its output with the trailing newline
    /// removed.
    pub async fn execute(&self, script: &str) -> Result<String> {
        if !cfg!(target_os = "macos") {
            return Err(ContactsError::StoreUnavailable(
                "Contacts.app is only available on macOS".to_string(),
            ));
        }

        debug!(
            "Executing Apple Script: {}",
            script.lines().find(|l| !l.trim().is_empty()).unwrap_or("").trim()
        );

        let output = tokio::time::timeout(
            self.timeout,
            Command::new("osascript")
                .arg("-e")
                .arg(script)
                .kill_on_drop(true)
                .output(),
        )
        .await
        .map_err(|_| {
            ContactsError::StoreUnavailable(format!("store script timed out after {:?}", self.timeout))
        })??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            error!("Apple Script failed: {}", stderr.trim());
            return Err(classify_failure(&stderr));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        // Only strip line endings: the record separators are Unicode
        // whitespace and must survive.
        Ok(stdout.trim_end_matches(['\n', '\r']).to_string())
    }
}

/// Map `osascript` error output onto a store error
pub fn classify_failure(stderr: &str) -> ContactsError {
    let message = stderr.trim().to_string();

    if message.contains(ERR_NOT_AUTHORIZED) || message.contains("Not authorized") {
        ContactsError::AccessDenied
    } else if message.contains(ERR_NO_SUCH_OBJECT) {
        ContactsError::NotFound(message)
    } else {
        ContactsError::Script(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_not_authorized() {
        let stderr = "execution error: Not authorized to send Apple events to Contacts. (-1743)\n";
        assert!(matches!(classify_failure(stderr), ContactsError::AccessDenied));
    }

    #[test]
    fn test_classify_missing_object() {
        let stderr = "execution error: Contacts got an error: Can’t get person 900. Invalid index. (-1728)";
        match classify_failure(stderr) {
            ContactsError::NotFound(msg) => assert!(msg.contains("person 900")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_classify_other() {
        assert!(matches!(
            classify_failure("syntax error: Expected end of line (-2741)"),
            ContactsError::Script(_)
        ));
    }

    #[cfg(not(target_os = "macos"))]
    #[tokio::test]
    async fn test_execute_unavailable_off_macos() {
        let script = AppleScript::new(Duration::from_secs(1));
        let result = script.execute("return 1").await;
        assert!(matches!(result, Err(ContactsError::StoreUnavailable(_))));
    }
}
