use crate::error::Result;
use crate::ledger::Ledger;
use crate::types::{Contact, DispatchState, NotificationTransport, WorkItem};
use chrono::{Local, NaiveDate};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, instrument, warn};

/// Final per-contact outcomes for one run.
#[derive(Debug, Default)]
pub struct DispatchReport {
    pub sent: Vec<String>,
    pub failed: Vec<String>,
    pub no_contact: Vec<String>,
}

impl DispatchReport {
    pub fn attempted(&self) -> usize {
        self.sent.len() + self.failed.len()
    }
}

/// Sends one notification per resolved contact and commits the successes back
/// into the ledger. The dispatcher is the only component that writes the
/// ledger.
pub struct Dispatcher {
    transport: Arc<dyn NotificationTransport>,
    subject: String,
    template: String,
    concurrency: usize,
}

impl Dispatcher {
    pub fn new(
        transport: Arc<dyn NotificationTransport>,
        subject: String,
        template: String,
        concurrency: usize,
    ) -> Self {
        Self {
            transport,
            subject,
            template,
            concurrency: concurrency.max(1),
        }
    }

    fn render(&self, contact: &Contact) -> String {
        self.template
            .replace("{name}", &contact.name)
            .replace("{call}", &contact.callsign)
            .replace("{class}", contact.license_class.as_str())
    }

    /// Attempt each work item once, under a bounded worker pool, then merge
    /// the successes into the ledger in a single commit. Items without an
    /// email never reach the transport and stay out of the ledger, so the
    /// next run picks them up again.
    #[instrument(skip_all, fields(items = work_list.len()))]
    pub async fn dispatch(
        &self,
        ledger: &mut Ledger,
        work_list: Vec<Contact>,
    ) -> Result<DispatchReport> {
        let today = Local::now().date_naive();
        let mut report = DispatchReport::default();
        let mut items: Vec<WorkItem> = work_list.into_iter().map(WorkItem::new).collect();

        // PENDING -> HAS_EMAIL | NO_CONTACT
        for item in &mut items {
            item.state = if item.contact.email.is_some() {
                DispatchState::HasEmail
            } else {
                DispatchState::NoContact
            };
        }

        // One send attempt per recipient, a few in flight at a time. External
        // mail services rate-limit, so the pool stays small.
        let limiter = Arc::new(Semaphore::new(self.concurrency));
        let mut in_flight: JoinSet<(String, DispatchState)> = JoinSet::new();

        for item in &items {
            if item.state != DispatchState::HasEmail {
                continue;
            }
            let transport = self.transport.clone();
            let limiter = limiter.clone();
            let callsign = item.contact.callsign.clone();
            let to = item.contact.email.clone().unwrap_or_default();
            let subject = self.subject.clone();
            let body = self.render(&item.contact);

            in_flight.spawn(async move {
                let _permit = limiter.acquire_owned().await.expect("semaphore closed");
                match transport.send(&to, &subject, &body).await {
                    Ok(ack) if ack.delivered => (callsign, DispatchState::Sent),
                    Ok(_) => {
                        warn!("Transport declined delivery for {}", callsign);
                        (callsign, DispatchState::SendFailed)
                    }
                    Err(e) => {
                        warn!("Send failed for {}: {}", callsign, e);
                        (callsign, DispatchState::SendFailed)
                    }
                }
            });
        }

        let mut newly_notified: Vec<(String, NaiveDate)> = Vec::new();
        while let Some(joined) = in_flight.join_next().await {
            let (callsign, state) = match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!("Dispatch worker panicked: {}", e);
                    continue;
                }
            };
            if let Some(item) = items.iter_mut().find(|i| i.contact.callsign == callsign) {
                item.state = state;
            }
            if state == DispatchState::Sent {
                newly_notified.push((callsign, today));
            }
        }

        for item in &items {
            match item.state {
                DispatchState::Sent => report.sent.push(item.contact.callsign.clone()),
                DispatchState::SendFailed => report.failed.push(item.contact.callsign.clone()),
                DispatchState::NoContact => {
                    report.no_contact.push(item.contact.callsign.clone())
                }
                _ => {}
            }
        }

        // Single commit, after every outcome is known. Failures and
        // no-contact items stay out so the next run retries them.
        ledger.commit(&newly_notified)?;

        info!(
            "Dispatch finished: {} sent, {} failed, {} without contact info",
            report.sent.len(),
            report.failed.len(),
            report.no_contact.len()
        );
        Ok(report)
    }
}
