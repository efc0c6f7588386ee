//! Data models for the contact store
//!
//! `RawContactRecord` is what a store backend hands back; every field is
//! optional so that "absent" stays distinguishable from "empty".
//! `NormalizedContact` is the canonical, always fully-populated output.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

/// Authorization state of the platform contact store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationStatus {
    /// The user has not been asked yet
    #[default]
    NotDetermined,
    /// Access granted
    Granted,
    /// Access refused by the user
    Denied,
    /// Access blocked by policy (parental controls, MDM, ...)
    Restricted,
}

impl AuthorizationStatus {
    pub fn is_granted(self) -> bool {
        matches!(self, Self::Granted)
    }
}

/// A (label, value) pair as reported by the platform
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct LabeledEntry {
    /// Platform label, possibly in encoded form (e.g. `_$!<Home>!$_`)
    #[serde(rename = "type", default)]
    pub label: String,
    #[serde(default)]
    pub value: Option<String>,
}

impl LabeledEntry {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: Some(value.into()),
        }
    }
}

/// Postal address broken into its parts
///
/// Used both raw (label possibly encoded) and normalized (label decoded).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PostalAddress {
    #[serde(rename = "type", default)]
    pub label: String,
    #[serde(default)]
    pub street_address: Option<String>,
    /// City
    #[serde(default)]
    pub locality: Option<String>,
    /// State or province
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

/// Contact record in the platform-native shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct RawContactRecord {
    #[serde(default)]
    pub unique_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub family_name: Option<String>,
    #[serde(default)]
    pub organizations: Option<Vec<String>>,
    /// Formatted addresses, one string each
    #[serde(default)]
    pub addresses: Option<Vec<String>>,
    #[serde(default)]
    pub postal_addresses: Option<Vec<PostalAddress>>,
    #[serde(default)]
    pub emails: Option<Vec<LabeledEntry>>,
    #[serde(default)]
    pub phone_numbers: Option<Vec<LabeledEntry>>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub nickname: Option<String>,
    #[serde(default)]
    pub job_title: Option<String>,
    /// Raw photo bytes, base64 in serialized form
    #[serde(default, with = "image_base64")]
    pub image: Option<Vec<u8>>,
}

impl RawContactRecord {
    /// Create a record with an identifier and display name
    pub fn new(unique_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            unique_id: Some(unique_id.into()),
            name: Some(name.into()),
            ..Default::default()
        }
    }

    /// Add an email entry
    pub fn with_email(mut self, label: impl Into<String>, value: impl Into<String>) -> Self {
        self.emails
            .get_or_insert_with(Vec::new)
            .push(LabeledEntry::new(label, value));
        self
    }

    /// Add a phone entry
    pub fn with_phone(mut self, label: impl Into<String>, value: impl Into<String>) -> Self {
        self.phone_numbers
            .get_or_insert_with(Vec::new)
            .push(LabeledEntry::new(label, value));
        self
    }

    /// Add an organization
    pub fn with_organization(mut self, org: impl Into<String>) -> Self {
        self.organizations
            .get_or_insert_with(Vec::new)
            .push(org.into());
        self
    }

    /// Add a formatted postal address
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.addresses.get_or_insert_with(Vec::new).push(address.into());
        self
    }

    /// Set the structured name parts
    pub fn with_name_parts(mut self, given: impl Into<String>, family: impl Into<String>) -> Self {
        self.given_name = Some(given.into());
        self.family_name = Some(family.into());
        self
    }

    /// Add a structured postal address
    pub fn with_postal_address(mut self, address: PostalAddress) -> Self {
        self.postal_addresses
            .get_or_insert_with(Vec::new)
            .push(address);
        self
    }

    /// Set note
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Labeled value in normalized form; `kind` is always lowercase
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabeledValue {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: Option<String>,
}

/// Canonical contact representation
///
/// Every field is always present; absent scalars serialize as `null` and
/// absent lists as `[]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedContact {
    pub unique_id: Option<String>,
    pub name: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub organizations: Vec<String>,
    pub addresses: Vec<String>,
    pub postal_addresses: Vec<PostalAddress>,
    pub emails: Vec<LabeledValue>,
    pub phone_numbers: Vec<LabeledValue>,
    pub note: Option<String>,
    pub nickname: Option<String>,
    pub job_title: Option<String>,
    /// Base64 (standard alphabet) encoded photo
    pub image: Option<String>,
}

impl From<NormalizedContact> for RawContactRecord {
    fn from(contact: NormalizedContact) -> Self {
        let labeled = |values: Vec<LabeledValue>| {
            values
                .into_iter()
                .map(|v| LabeledEntry {
                    label: v.kind,
                    value: v.value,
                })
                .collect::<Vec<_>>()
        };

        Self {
            unique_id: contact.unique_id,
            name: contact.name,
            given_name: contact.given_name,
            family_name: contact.family_name,
            organizations: Some(contact.organizations),
            addresses: Some(contact.addresses),
            postal_addresses: Some(contact.postal_addresses),
            emails: Some(labeled(contact.emails)),
            phone_numbers: Some(labeled(contact.phone_numbers)),
            note: contact.note,
            nickname: contact.nickname,
            job_title: contact.job_title,
            image: contact.image.and_then(|s| STANDARD.decode(s).ok()),
        }
    }
}

mod image_base64 {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match bytes {
            Some(b) => serializer.serialize_some(&STANDARD.encode(b)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded: Option<String> = Option::deserialize(deserializer)?;
        encoded
            .map(|s| STANDARD.decode(s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_record_absent_fields_deserialize_as_none() {
        let raw: RawContactRecord = serde_json::from_str(r#"{"name": "Ada"}"#).unwrap();
        assert_eq!(raw.name.as_deref(), Some("Ada"));
        assert!(raw.organizations.is_none());
        assert!(raw.emails.is_none());
        assert!(raw.image.is_none());
    }

    #[test]
    fn test_raw_record_reads_native_field_names() {
        let json = r#"{
            "uniqueId": "abc:ABPerson",
            "phoneNumbers": [{"type": "_$!<Mobile>!$_", "value": "+15550100"}],
            "emails": [{"type": "work"}],
            "jobTitle": "Engineer",
            "image": "AQID"
        }"#;
        let raw: RawContactRecord = serde_json::from_str(json).unwrap();
        assert_eq!(raw.unique_id.as_deref(), Some("abc:ABPerson"));
        let phones = raw.phone_numbers.unwrap();
        assert_eq!(phones[0].label, "_$!<Mobile>!$_");
        assert_eq!(raw.emails.unwrap()[0].value, None);
        assert_eq!(raw.job_title.as_deref(), Some("Engineer"));
        assert_eq!(raw.image, Some(vec![1, 2, 3]));
    }

    #[test]
    fn test_raw_record_rejects_bad_image_encoding() {
        let result = serde_json::from_str::<RawContactRecord>(r#"{"image": "!!not base64!!"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_normalized_contact_serializes_nulls_and_empty_lists() {
        let json = serde_json::to_value(NormalizedContact::default()).unwrap();
        assert!(json["uniqueId"].is_null());
        assert!(json["name"].is_null());
        assert!(json["note"].is_null());
        assert_eq!(json["organizations"], serde_json::json!([]));
        assert_eq!(json["phoneNumbers"], serde_json::json!([]));
        assert!(json["givenName"].is_null());
        assert_eq!(json["postalAddresses"], serde_json::json!([]));
    }

    #[test]
    fn test_postal_address_field_names() {
        let json = r#"{
            "givenName": "Ada",
            "familyName": "Lovelace",
            "postalAddresses": [{
                "type": "_$!<Home>!$_",
                "streetAddress": "12 St James's Square",
                "locality": "London",
                "postalCode": "SW1Y 4JH",
                "country": "UK"
            }]
        }"#;
        let raw: RawContactRecord = serde_json::from_str(json).unwrap();
        assert_eq!(raw.given_name.as_deref(), Some("Ada"));
        assert_eq!(raw.family_name.as_deref(), Some("Lovelace"));

        let postal = &raw.postal_addresses.unwrap()[0];
        assert_eq!(postal.label, "_$!<Home>!$_");
        assert_eq!(postal.locality.as_deref(), Some("London"));
        assert_eq!(postal.region, None);
        assert_eq!(postal.postal_code.as_deref(), Some("SW1Y 4JH"));
    }

    #[test]
    fn test_labeled_value_uses_type_key() {
        let value = LabeledValue {
            kind: "home".to_string(),
            value: Some("a@b.com".to_string()),
        };
        let json = serde_json::to_value(&value).unwrap();
        assert_eq!(json, serde_json::json!({"type": "home", "value": "a@b.com"}));
    }

    #[test]
    fn test_builder_helpers_create_lists() {
        let raw = RawContactRecord::new("1", "Ada")
            .with_email("home", "ada@example.com")
            .with_phone("mobile", "+15550100")
            .with_organization("Analytical Engines")
            .with_address("1 Main St")
            .with_note("hi");
        assert_eq!(raw.emails.as_ref().map(Vec::len), Some(1));
        assert_eq!(raw.phone_numbers.as_ref().map(Vec::len), Some(1));
        assert_eq!(raw.organizations, Some(vec!["Analytical Engines".to_string()]));
        assert_eq!(raw.addresses, Some(vec!["1 Main St".to_string()]));
        assert_eq!(raw.note.as_deref(), Some("hi"));
    }
}
