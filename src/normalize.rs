use crate::types::{Contact, LicenseClass, RawRow};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use tracing::{debug, instrument};

// US amateur callsigns: one or two letter prefix, a digit, up to three letter
// suffix. Also what keeps re-embedded header rows out of the batch.
static CALLSIGN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Z]{1,2}\d[A-Z]{1,3}$").unwrap());

/// Turns raw imported rows into validated contacts. Pure: the same rows and
/// filter always produce the same contacts.
pub struct Normalizer {
    local_zips: HashSet<String>,
}

impl Normalizer {
    /// An empty zip list disables the geographic filter.
    pub fn new(local_zips: &[String]) -> Self {
        Self {
            local_zips: local_zips.iter().cloned().collect(),
        }
    }

    fn is_local(&self, region: Option<&str>) -> bool {
        if self.local_zips.is_empty() {
            return true;
        }
        match region {
            // Zip+4 values compare on the 5-digit prefix
            Some(zip) => {
                let prefix: String = zip.chars().take(5).collect();
                self.local_zips.contains(&prefix)
            }
            None => false,
        }
    }

    /// Validate and normalize one row. `None` means the row was dropped.
    fn normalize_row(&self, row: &RawRow) -> Option<Contact> {
        let callsign = row.callsign.as_deref()?.trim().to_uppercase();
        if !CALLSIGN_RE.is_match(&callsign) {
            debug!("Dropping row with invalid callsign {:?}", row.callsign);
            return None;
        }
        if !self.is_local(row.region.as_deref()) {
            debug!("Dropping out-of-region callsign {}", callsign);
            return None;
        }

        Some(Contact {
            callsign,
            name: title_case(row.name.as_deref().unwrap_or("")),
            license_class: LicenseClass::from_code(row.class_code.as_deref().unwrap_or("")),
            email: row
                .email
                .as_deref()
                .map(|e| e.trim().to_lowercase())
                .filter(|e| !e.is_empty()),
            region: row.region.clone(),
        })
    }

    /// Normalize a whole batch. Malformed rows are skipped, not fatal, and a
    /// later duplicate of a callsign loses to the first occurrence.
    #[instrument(skip_all, fields(rows = raw_rows.len()))]
    pub fn normalize(&self, raw_rows: &[RawRow]) -> Vec<Contact> {
        let mut seen = HashSet::new();
        let mut contacts = Vec::new();
        for row in raw_rows {
            if let Some(contact) = self.normalize_row(row) {
                if seen.insert(contact.callsign.clone()) {
                    contacts.push(contact);
                }
            }
        }
        contacts
    }
}

fn title_case(name: &str) -> String {
    name.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
