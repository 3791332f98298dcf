use crate::dispatch::Dispatcher;
use crate::enrich::EnrichmentResolver;
use crate::error::Result;
use crate::ledger::{work_list, Ledger};
use crate::normalize::Normalizer;
use crate::types::{ConfirmationGate, RawRow};
use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

/// Result of a complete pipeline run.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub batch_rows: usize,
    pub contacts: usize,
    pub already_notified: usize,
    pub work_list: usize,
    pub enriched: usize,
    pub sent: usize,
    pub failed: usize,
    pub no_contact: usize,
}

/// How the run ended. `Aborted` means the operator declined the confirmation
/// gate: nothing was sent and the ledger was not touched.
#[derive(Debug)]
pub enum RunOutcome {
    Completed(RunSummary),
    Aborted,
}

/// Sequences the whole run: normalize, dedup against the ledger, enrich,
/// confirm with the operator, dispatch, commit.
pub struct Pipeline {
    pub normalizer: Normalizer,
    pub resolver: EnrichmentResolver,
    pub dispatcher: Dispatcher,
}

impl Pipeline {
    #[instrument(skip_all, fields(rows = raw_rows.len()))]
    pub async fn run(
        &self,
        raw_rows: &[RawRow],
        ledger: &mut Ledger,
        gate: &dyn ConfirmationGate,
    ) -> Result<RunOutcome> {
        let run_id = Uuid::new_v4();
        info!("Starting welcome run {}", run_id);

        let contacts = self.normalizer.normalize(raw_rows);
        info!("Normalized {} contacts from {} rows", contacts.len(), raw_rows.len());

        let history = ledger.load()?;
        let contact_count = contacts.len();
        let pending = work_list(contacts, &history);
        let already_notified = contact_count - pending.len();
        info!(
            "{} of {} contacts already welcomed; {} to go",
            already_notified,
            contact_count,
            pending.len()
        );
        println!(
            "📋 Work list: {} new contacts ({} already welcomed)",
            pending.len(),
            already_notified
        );

        let (resolved, enrichment) = self.resolver.resolve(pending).await?;
        let contactable = resolved.iter().filter(|c| c.email.is_some()).count();
        println!(
            "🔎 Enrichment: {} looked up, {} resolved; {} of {} contactable",
            enrichment.attempted,
            enrichment.resolved,
            contactable,
            resolved.len()
        );

        // The run's one human gate. Declining leaves no trace: no sends, no
        // ledger writes.
        let prompt = format!(
            "About to email {} of {} new contacts. Enter 'yes' to continue.",
            contactable,
            resolved.len()
        );
        if !gate.confirm(&prompt)? {
            info!("Operator declined; aborting with no side effects");
            println!("🚫 Aborted. Nothing was sent.");
            return Ok(RunOutcome::Aborted);
        }

        let report = self.dispatcher.dispatch(ledger, resolved).await?;

        let summary = RunSummary {
            run_id,
            batch_rows: raw_rows.len(),
            contacts: contact_count,
            already_notified,
            work_list: contact_count - already_notified,
            enriched: enrichment.resolved,
            sent: report.sent.len(),
            failed: report.failed.len(),
            no_contact: report.no_contact.len(),
        };
        info!(
            "Run {} complete: {} sent, {} failed, {} without contact info",
            run_id, summary.sent, summary.failed, summary.no_contact
        );
        Ok(RunOutcome::Completed(summary))
    }
}
