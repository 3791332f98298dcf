use crate::error::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// License classes as they appear on US amateur licenses issued today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LicenseClass {
    Technician,
    General,
    AmateurExtra,
    Unknown,
}

impl LicenseClass {
    /// Map the single-letter class code used by the licensing export.
    /// Anything unrecognized becomes `Unknown` rather than an error.
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "T" | "Technician" => LicenseClass::Technician,
            "G" | "General" => LicenseClass::General,
            "E" | "Amateur Extra" => LicenseClass::AmateurExtra,
            _ => LicenseClass::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LicenseClass::Technician => "Technician",
            LicenseClass::General => "General",
            LicenseClass::AmateurExtra => "Amateur Extra",
            LicenseClass::Unknown => "Unknown",
        }
    }
}

/// One newly licensed operator in a batch. The callsign is the sole identity:
/// two contacts with the same callsign are the same person across runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub callsign: String,
    pub name: String,
    pub license_class: LicenseClass,
    pub email: Option<String>,
    pub region: Option<String>,
}

impl Contact {
    /// Fill the email only if we don't already have one. A known address is
    /// never replaced, and never cleared once set.
    pub fn fill_email(&mut self, email: &str) {
        if self.email.is_none() && !email.trim().is_empty() {
            self.email = Some(email.trim().to_lowercase());
        }
    }
}

/// One row of notification history, keyed by callsign. Presence of
/// `notified_on` is permanent: a callsign is never un-notified.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub callsign: String,
    pub notified_on: NaiveDate,
}

/// Per-run dispatch state for a single contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DispatchState {
    Pending,
    HasEmail,
    NoContact,
    Sent,
    SendFailed,
}

/// A contact paired with its dispatch state for one run. In-memory only;
/// nothing persists a work item.
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub contact: Contact,
    pub state: DispatchState,
}

impl WorkItem {
    pub fn new(contact: Contact) -> Self {
        Self {
            contact,
            state: DispatchState::Pending,
        }
    }
}

/// Canonical row handed to the normalizer by the import adapter. The adapter
/// owns the source file layout; these fields are the whole contract.
#[derive(Debug, Clone, Default)]
pub struct RawRow {
    pub callsign: Option<String>,
    pub name: Option<String>,
    pub class_code: Option<String>,
    pub email: Option<String>,
    pub region: Option<String>,
}

/// An authenticated lookup session, held for the duration of one run and
/// dropped when the run ends.
#[async_trait::async_trait]
pub trait EnrichmentSession: Send + Sync {
    /// Look up an email address by callsign. `Ok(None)` means the provider has
    /// no address on file; an error means the lookup itself failed. Both are
    /// non-fatal to the batch.
    async fn lookup(&self, callsign: &str) -> Result<Option<String>>;
}

/// External contact-lookup provider (QRZ in production).
#[async_trait::async_trait]
pub trait EnrichmentProvider: Send + Sync {
    /// Establish the one authenticated session used for the whole run.
    /// Failure here is fatal: no send should be risked on bad credentials.
    async fn authenticate(&self) -> Result<Box<dyn EnrichmentSession>>;
}

/// Delivery acknowledgment from the notification transport.
#[derive(Debug, Clone, Copy)]
pub struct Delivery {
    pub delivered: bool,
}

/// Outbound notification transport (SendGrid in production). Anything other
/// than a positive acknowledgment is treated as a failed send.
#[async_trait::async_trait]
pub trait NotificationTransport: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<Delivery>;
}

/// The run's single human-in-the-loop gate.
pub trait ConfirmationGate: Send + Sync {
    fn confirm(&self, prompt: &str) -> Result<bool>;
}
