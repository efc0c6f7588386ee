//! Contacts.app backed contact store
//!
//! Each call runs one Apple Script. Records come back as a single text
//! value framed with ASCII separator characters:
//!
//! - record separator (`\u{1e}`) between people
//! - unit separator (`\u{1f}`) between the fields of one person
//! - group separator (`\u{1d}`) between items of a list field
//! - file separator (`\u{1c}`) between label and value of a labeled item,
//!   and between the parts of a structured address

use std::time::Duration;

use ab_contacts::{
    AuthorizationStatus, ContactStore, ContactsError, LabeledEntry, PostalAddress, RawContactRecord,
    Result,
};
use async_trait::async_trait;
use tracing::{debug, info};

use crate::script::AppleScript;

const RECORD_SEP: char = '\u{1e}';
const FIELD_SEP: char = '\u{1f}';
const ITEM_SEP: char = '\u{1d}';
const LABEL_SEP: char = '\u{1c}';

/// id, name, organizations, addresses, emails, phones, note, nickname,
/// job title, first name, last name, postal addresses
const FIELD_COUNT: usize = 12;

/// label, street, city, state, zip, country
const POSTAL_PART_COUNT: usize = 6;

/// Handlers shared by every record-returning script
const ENCODER: &str = r#"
on textOf(v)
    if v is missing value then return ""
    return v as text
end textOf

on joinList(xs, sep)
    set saved to AppleScript's text item delimiters
    set AppleScript's text item delimiters to sep
    set s to xs as text
    set AppleScript's text item delimiters to saved
    return s
end joinList

on labeledItems(xs)
    set out to {}
    tell application "Contacts"
        repeat with e in xs
            set end of out to my textOf(label of e) & (character id 28) & my textOf(value of e)
        end repeat
    end tell
    return my joinList(out, character id 29)
end labeledItems

on encodePerson(p)
    tell application "Contacts"
        set orgs to {}
        set org to organization of p
        if org is not missing value then set end of orgs to org
        set addrs to {}
        set postal to {}
        repeat with a in (addresses of p)
            set end of addrs to my textOf(formatted address of a)
            set parts to {my textOf(label of a), my textOf(street of a), my textOf(city of a), my textOf(state of a), my textOf(zip of a), my textOf(country of a)}
            set end of postal to my joinList(parts, character id 28)
        end repeat
        set fields to {my textOf(id of p), my textOf(name of p), my joinList(orgs, character id 29), my joinList(addrs, character id 29), my labeledItems(emails of p), my labeledItems(phones of p), my textOf(note of p), my textOf(nickname of p), my textOf(job title of p), my textOf(first name of p), my textOf(last name of p), my joinList(postal, character id 29)}
    end tell
    return my joinList(fields, character id 31)
end encodePerson
"#;

/// Contact store reading Contacts.app via `osascript`
#[derive(Debug, Clone)]
pub struct ContactsAppStore {
    script: AppleScript,
}

impl ContactsAppStore {
    /// Create a store whose scripts are bounded by `timeout`
    pub fn new(timeout: Duration) -> Self {
        info!("Contacts.app store initialized (script timeout {:?})", timeout);
        Self {
            script: AppleScript::new(timeout),
        }
    }

    async fn run_count(&self) -> Result<usize> {
        let output = self
            .script
            .execute(r#"tell application "Contacts" to return count of people"#)
            .await?;

        output
            .trim()
            .parse()
            .map_err(|e| ContactsError::Parse(format!("Failed to parse contact count {:?}: {}", output, e)))
    }
}

impl Default for ContactsAppStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

#[async_trait]
impl ContactStore for ContactsAppStore {
    fn name(&self) -> &str {
        "contacts-app"
    }

    async fn authorization_status(&self) -> Result<AuthorizationStatus> {
        // osascript cannot ask without also triggering the prompt.
        Ok(AuthorizationStatus::NotDetermined)
    }

    async fn request_access(&self) -> Result<AuthorizationStatus> {
        match self.run_count().await {
            Ok(_) => Ok(AuthorizationStatus::Granted),
            Err(ContactsError::AccessDenied) => Ok(AuthorizationStatus::Denied),
            Err(e) => Err(e),
        }
    }

    async fn count(&self) -> Result<usize> {
        self.run_count().await
    }

    async fn contact_at(&self, index: usize) -> Result<RawContactRecord> {
        self.page(index, 1)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ContactsError::NotFound(format!("no contact at index {}", index)))
    }

    async fn me(&self) -> Result<RawContactRecord> {
        let output = self.script.execute(&me_script()).await?;
        parse_records(&output)?
            .into_iter()
            .next()
            .ok_or_else(|| ContactsError::NotFound("no me card configured in Contacts".to_string()))
    }

    async fn page(&self, start: usize, len: usize) -> Result<Vec<RawContactRecord>> {
        if len == 0 {
            return Ok(Vec::new());
        }

        let output = self.script.execute(&page_script(start, len)).await?;
        let records = parse_records(&output)?;
        debug!("Fetched {} contacts at offset {}", records.len(), start);
        Ok(records)
    }
}

/// Script returning people `start..start + len` (zero-based), clamped to the
/// store size
fn page_script(start: usize, len: usize) -> String {
    format!(
        r#"{encoder}
tell application "Contacts"
    set total to count of people
    set lastIndex to {last}
    if lastIndex > total then set lastIndex to total
    set out to {{}}
    repeat with i from {first} to lastIndex
        set end of out to my encodePerson(person i)
    end repeat
end tell
return my joinList(out, character id 30)
"#,
        encoder = ENCODER,
        first = start + 1,
        last = start + len,
    )
}

fn me_script() -> String {
    format!(
        r#"{encoder}
tell application "Contacts"
    set mine to my card
    if mine is missing value then return ""
    return my encodePerson(mine)
end tell
"#,
        encoder = ENCODER,
    )
}

/// Parse framed script output into raw records
pub fn parse_records(output: &str) -> Result<Vec<RawContactRecord>> {
    if output.is_empty() {
        return Ok(Vec::new());
    }
    output.split(RECORD_SEP).map(parse_record).collect()
}

fn parse_record(encoded: &str) -> Result<RawContactRecord> {
    let fields: Vec<&str> = encoded.split(FIELD_SEP).collect();
    if fields.len() != FIELD_COUNT {
        return Err(ContactsError::Parse(format!(
            "expected {} fields per contact, got {}",
            FIELD_COUNT,
            fields.len()
        )));
    }

    Ok(RawContactRecord {
        unique_id: text(fields[0]),
        name: text(fields[1]),
        given_name: text(fields[9]),
        family_name: text(fields[10]),
        organizations: Some(list(fields[2])),
        addresses: Some(list(fields[3])),
        postal_addresses: Some(postal(fields[11])?),
        emails: Some(labeled(fields[4])?),
        phone_numbers: Some(labeled(fields[5])?),
        note: text(fields[6]),
        nickname: text(fields[7]),
        job_title: text(fields[8]),
        image: None,
    })
}

fn text(field: &str) -> Option<String> {
    if field.is_empty() {
        None
    } else {
        Some(field.to_string())
    }
}

fn list(field: &str) -> Vec<String> {
    if field.is_empty() {
        return Vec::new();
    }
    field.split(ITEM_SEP).map(str::to_string).collect()
}

fn labeled(field: &str) -> Result<Vec<LabeledEntry>> {
    if field.is_empty() {
        return Ok(Vec::new());
    }

    field
        .split(ITEM_SEP)
        .map(|item| {
            let (label, value) = item.split_once(LABEL_SEP).ok_or_else(|| {
                ContactsError::Parse(format!("labeled item without separator: {:?}", item))
            })?;
            Ok(LabeledEntry {
                label: label.to_string(),
                value: text(value),
            })
        })
        .collect()
}

fn postal(field: &str) -> Result<Vec<PostalAddress>> {
    if field.is_empty() {
        return Ok(Vec::new());
    }

    field
        .split(ITEM_SEP)
        .map(|item| {
            let parts: Vec<&str> = item.split(LABEL_SEP).collect();
            if parts.len() != POSTAL_PART_COUNT {
                return Err(ContactsError::Parse(format!(
                    "expected {} address parts, got {}: {:?}",
                    POSTAL_PART_COUNT,
                    parts.len(),
                    item
                )));
            }
            Ok(PostalAddress {
                label: parts[0].to_string(),
                street_address: text(parts[1]),
                locality: text(parts[2]),
                region: text(parts[3]),
                postal_code: text(parts[4]),
                country: text(parts[5]),
            })
        })
        .collect()
}
