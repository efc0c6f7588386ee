//! Raw record to canonical contact mapping

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::label::decode_label;
use crate::models::{LabeledEntry, LabeledValue, NormalizedContact, PostalAddress, RawContactRecord};

/// Map a raw platform record onto the canonical schema.
///
/// Total over every input shape: an all-absent record yields an all-default
/// contact.
pub fn normalize(raw: RawContactRecord) -> NormalizedContact {
    NormalizedContact {
        unique_id: non_empty(raw.unique_id),
        name: non_empty(raw.name),
        given_name: non_empty(raw.given_name),
        family_name: non_empty(raw.family_name),
        organizations: raw.organizations.unwrap_or_default(),
        addresses: raw.addresses.unwrap_or_default(),
        postal_addresses: raw
            .postal_addresses
            .unwrap_or_default()
            .into_iter()
            .map(normalize_postal)
            .collect(),
        emails: decode_labeled(raw.emails),
        phone_numbers: decode_labeled(raw.phone_numbers),
        note: non_empty(raw.note),
        nickname: non_empty(raw.nickname),
        job_title: non_empty(raw.job_title),
        image: raw
            .image
            .filter(|bytes| !bytes.is_empty())
            .map(|bytes| STANDARD.encode(bytes)),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

fn decode_labeled(entries: Option<Vec<LabeledEntry>>) -> Vec<LabeledValue> {
    entries
        .unwrap_or_default()
        .into_iter()
        .map(|entry| LabeledValue {
            kind: decode_label(&entry.label),
            value: non_empty(entry.value),
        })
        .collect()
}

fn normalize_postal(address: PostalAddress) -> PostalAddress {
    PostalAddress {
        label: decode_label(&address.label),
        street_address: non_empty(address.street_address),
        locality: non_empty(address.locality),
        region: non_empty(address.region),
        postal_code: non_empty(address.postal_code),
        country: non_empty(address.country),
    }
}
