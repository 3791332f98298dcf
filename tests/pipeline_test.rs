use anyhow::Result;
use chrono::Local;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use ham_welcome::dispatch::Dispatcher;
use ham_welcome::enrich::EnrichmentResolver;
use ham_welcome::error::WelcomeError;
use ham_welcome::ledger::Ledger;
use ham_welcome::normalize::Normalizer;
use ham_welcome::pipeline::{Pipeline, RunOutcome, RunSummary};
use ham_welcome::types::{
    ConfirmationGate, Delivery, EnrichmentProvider, EnrichmentSession, NotificationTransport,
    RawRow,
};

fn raw_row(callsign: &str, email: Option<&str>) -> RawRow {
    RawRow {
        callsign: Some(callsign.to_string()),
        name: Some("test op".to_string()),
        class_code: Some("T".to_string()),
        email: email.map(str::to_string),
        region: Some("98101".to_string()),
    }
}

/// Provider whose directory scripts every lookup outcome.
struct ScriptedProvider {
    directory: HashMap<String, Option<String>>,
    auth_calls: Arc<AtomicUsize>,
}

struct ScriptedSession {
    directory: HashMap<String, Option<String>>,
}

#[async_trait::async_trait]
impl EnrichmentProvider for ScriptedProvider {
    async fn authenticate(&self) -> ham_welcome::error::Result<Box<dyn EnrichmentSession>> {
        self.auth_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedSession {
            directory: self.directory.clone(),
        }))
    }
}

#[async_trait::async_trait]
impl EnrichmentSession for ScriptedSession {
    async fn lookup(&self, callsign: &str) -> ham_welcome::error::Result<Option<String>> {
        Ok(self.directory.get(callsign).cloned().flatten())
    }
}

/// Transport that records every send and refuses the addresses it is told to.
#[derive(Default)]
struct RecordingTransport {
    refuse: HashSet<String>,
    sends: Mutex<Vec<String>>,
}

#[async_trait::async_trait]
impl NotificationTransport for RecordingTransport {
    async fn send(
        &self,
        to: &str,
        _subject: &str,
        _body: &str,
    ) -> ham_welcome::error::Result<Delivery> {
        self.sends.lock().unwrap().push(to.to_string());
        Ok(Delivery {
            delivered: !self.refuse.contains(to),
        })
    }
}

struct FixedGate(bool);

impl ConfirmationGate for FixedGate {
    fn confirm(&self, _prompt: &str) -> ham_welcome::error::Result<bool> {
        Ok(self.0)
    }
}

struct Harness {
    pipeline: Pipeline,
    transport: Arc<RecordingTransport>,
    auth_calls: Arc<AtomicUsize>,
}

fn harness(
    directory: HashMap<String, Option<String>>,
    refuse: HashSet<String>,
) -> Harness {
    let auth_calls = Arc::new(AtomicUsize::new(0));
    let provider = ScriptedProvider {
        directory,
        auth_calls: auth_calls.clone(),
    };
    let transport = Arc::new(RecordingTransport {
        refuse,
        sends: Mutex::new(Vec::new()),
    });
    let pipeline = Pipeline {
        normalizer: Normalizer::new(&[]),
        resolver: EnrichmentResolver::new(Arc::new(provider)),
        dispatcher: Dispatcher::new(
            transport.clone(),
            "Congrats on your amateur radio license!".to_string(),
            "Welcome {name} ({call}), {class}.".to_string(),
            2,
        ),
    };
    Harness {
        pipeline,
        transport,
        auth_calls,
    }
}

async fn run_to_summary(
    harness: &Harness,
    rows: &[RawRow],
    ledger: &mut Ledger,
) -> Result<RunSummary> {
    match harness.pipeline.run(rows, ledger, &FixedGate(true)).await? {
        RunOutcome::Completed(summary) => Ok(summary),
        RunOutcome::Aborted => anyhow::bail!("run unexpectedly aborted"),
    }
}

#[tokio::test]
async fn full_run_enriches_sends_and_commits_both() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut ledger = Ledger::open(dir.path().join("ledger.db"))?;

    let mut directory = HashMap::new();
    directory.insert("K7AAA".to_string(), Some("a@psrg.org".to_string()));
    let harness = harness(directory, HashSet::new());

    let rows = vec![raw_row("K7AAA", None), raw_row("K7BBB", Some("x@y.com"))];
    let summary = run_to_summary(&harness, &rows, &mut ledger).await?;

    assert_eq!(summary.sent, 2);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.enriched, 1);

    let entries = ledger.load()?;
    let today = Local::now().date_naive();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries["K7AAA"].notified_on, today);
    assert_eq!(entries["K7BBB"].notified_on, today);
    Ok(())
}

#[tokio::test]
async fn second_identical_run_sends_nothing_and_skips_the_provider() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut ledger = Ledger::open(dir.path().join("ledger.db"))?;

    let mut directory = HashMap::new();
    directory.insert("K7AAA".to_string(), Some("a@psrg.org".to_string()));
    let harness = harness(directory, HashSet::new());

    let rows = vec![raw_row("K7AAA", None), raw_row("K7BBB", Some("x@y.com"))];
    run_to_summary(&harness, &rows, &mut ledger).await?;
    assert_eq!(harness.auth_calls.load(Ordering::SeqCst), 1);

    let summary = run_to_summary(&harness, &rows, &mut ledger).await?;

    assert_eq!(summary.work_list, 0);
    assert_eq!(summary.sent, 0);
    // Empty work list means the lookup session is never opened again
    assert_eq!(harness.auth_calls.load(Ordering::SeqCst), 1);
    assert_eq!(harness.transport.sends.lock().unwrap().len(), 2);
    Ok(())
}

#[tokio::test]
async fn unresolved_lookup_is_reported_and_retried_next_run() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut ledger = Ledger::open(dir.path().join("ledger.db"))?;

    // Provider has nothing for K7AAA this time
    let harness = harness(HashMap::new(), HashSet::new());
    let rows = vec![raw_row("K7AAA", None), raw_row("K7BBB", Some("x@y.com"))];

    let summary = run_to_summary(&harness, &rows, &mut ledger).await?;
    assert_eq!(summary.no_contact, 1);
    assert_eq!(summary.sent, 1);
    assert!(!ledger.load()?.contains_key("K7AAA"));

    // Next run: K7AAA is back on the work list, and this time resolvable
    let mut directory = HashMap::new();
    directory.insert("K7AAA".to_string(), Some("a@psrg.org".to_string()));
    let harness = self::harness(directory, HashSet::new());

    let summary = run_to_summary(&harness, &rows, &mut ledger).await?;
    assert_eq!(summary.work_list, 1);
    assert_eq!(summary.sent, 1);
    assert!(ledger.load()?.contains_key("K7AAA"));
    Ok(())
}

#[tokio::test]
async fn failed_send_does_not_commit_but_neighbors_still_do() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut ledger = Ledger::open(dir.path().join("ledger.db"))?;

    let mut directory = HashMap::new();
    directory.insert("K7AAA".to_string(), Some("a@psrg.org".to_string()));
    let mut refuse = HashSet::new();
    refuse.insert("x@y.com".to_string());
    let harness = harness(directory.clone(), refuse);

    let rows = vec![raw_row("K7AAA", None), raw_row("K7BBB", Some("x@y.com"))];
    let summary = run_to_summary(&harness, &rows, &mut ledger).await?;

    assert_eq!(summary.sent, 1);
    assert_eq!(summary.failed, 1);
    let entries = ledger.load()?;
    assert!(entries.contains_key("K7AAA"));
    assert!(!entries.contains_key("K7BBB"));

    // K7BBB reappears on the next run's work list and succeeds
    let harness = self::harness(directory, HashSet::new());
    let summary = run_to_summary(&harness, &rows, &mut ledger).await?;
    assert_eq!(summary.work_list, 1);
    assert_eq!(summary.sent, 1);
    assert!(ledger.load()?.contains_key("K7BBB"));
    Ok(())
}

#[tokio::test]
async fn declined_gate_aborts_with_zero_side_effects() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut ledger = Ledger::open(dir.path().join("ledger.db"))?;

    let harness = harness(HashMap::new(), HashSet::new());
    let rows = vec![raw_row("K7AAA", Some("a@psrg.org"))];

    let outcome = harness
        .pipeline
        .run(&rows, &mut ledger, &FixedGate(false))
        .await?;

    assert!(matches!(outcome, RunOutcome::Aborted));
    assert!(harness.transport.sends.lock().unwrap().is_empty());
    assert!(ledger.load()?.is_empty());
    Ok(())
}

#[tokio::test]
async fn overlapping_batches_never_renotify() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut ledger = Ledger::open(dir.path().join("ledger.db"))?;
    let harness = harness(HashMap::new(), HashSet::new());

    let first = vec![raw_row("K7AAA", Some("a@psrg.org"))];
    run_to_summary(&harness, &first, &mut ledger).await?;

    // Second batch overlaps the first
    let second = vec![
        raw_row("K7AAA", Some("a@psrg.org")),
        raw_row("K7CCC", Some("c@psrg.org")),
    ];
    let summary = run_to_summary(&harness, &second, &mut ledger).await?;

    assert_eq!(summary.already_notified, 1);
    assert_eq!(summary.sent, 1);

    let sends = harness.transport.sends.lock().unwrap();
    assert_eq!(
        sends.iter().filter(|to| to.as_str() == "a@psrg.org").count(),
        1
    );
    Ok(())
}

#[tokio::test]
async fn duplicate_rows_in_one_batch_get_one_send() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let mut ledger = Ledger::open(dir.path().join("ledger.db"))?;
    let harness = harness(HashMap::new(), HashSet::new());

    let rows = vec![
        raw_row("K7AAA", Some("a@psrg.org")),
        raw_row("k7aaa", Some("a@psrg.org")),
    ];
    let summary = run_to_summary(&harness, &rows, &mut ledger).await?;

    assert_eq!(summary.contacts, 1);
    assert_eq!(summary.sent, 1);
    assert_eq!(harness.transport.sends.lock().unwrap().len(), 1);
    Ok(())
}

#[tokio::test]
async fn corrupt_ledger_is_fatal() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("ledger.db");
    std::fs::write(&path, b"this is not a sqlite database, not even close")?;

    match Ledger::open(&path) {
        Err(WelcomeError::Ledger(_)) => Ok(()),
        other => anyhow::bail!("expected a ledger error, got {:?}", other.map(|_| ())),
    }
}
