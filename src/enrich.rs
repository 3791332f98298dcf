use crate::error::Result;
use crate::types::{Contact, EnrichmentProvider};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Counts from one enrichment pass.
#[derive(Debug, Default, Clone)]
pub struct EnrichmentReport {
    pub attempted: usize,
    pub resolved: usize,
    pub unresolved: usize,
}

/// Fills missing emails via the external lookup provider: one authenticated
/// session per run, one attempt per contact, failures isolated per contact.
pub struct EnrichmentResolver {
    provider: Arc<dyn EnrichmentProvider>,
}

impl EnrichmentResolver {
    pub fn new(provider: Arc<dyn EnrichmentProvider>) -> Self {
        Self { provider }
    }

    /// Give every contact missing an email exactly one lookup attempt.
    ///
    /// If nothing is missing, the provider is never contacted. Session
    /// authentication failure is fatal and aborts the run before any send is
    /// risked; an individual lookup failure only leaves that contact without
    /// an email. Contacts that already have an address are never sent to the
    /// provider and never modified. The session is dropped when this returns.
    #[instrument(skip_all, fields(contacts = work_list.len()))]
    pub async fn resolve(
        &self,
        mut work_list: Vec<Contact>,
    ) -> Result<(Vec<Contact>, EnrichmentReport)> {
        let mut report = EnrichmentReport::default();

        let missing = work_list.iter().filter(|c| c.email.is_none()).count();
        if missing == 0 {
            info!("All contacts already have emails; skipping lookup session");
            return Ok((work_list, report));
        }

        info!("Looking up {} missing emails", missing);
        let session = self.provider.authenticate().await?;

        // The provider rate-limits and the session is single-threaded, so
        // lookups run one at a time.
        for contact in work_list.iter_mut().filter(|c| c.email.is_none()) {
            report.attempted += 1;
            match session.lookup(&contact.callsign).await {
                Ok(Some(email)) => {
                    contact.fill_email(&email);
                    if contact.email.is_some() {
                        report.resolved += 1;
                    } else {
                        report.unresolved += 1;
                    }
                }
                Ok(None) => {
                    info!("No email on file for {}", contact.callsign);
                    report.unresolved += 1;
                }
                Err(e) => {
                    warn!("Lookup failed for {}: {}", contact.callsign, e);
                    report.unresolved += 1;
                }
            }
        }

        info!(
            "Enrichment finished: {} resolved, {} unresolved",
            report.resolved, report.unresolved
        );
        Ok((work_list, report))
    }
}
