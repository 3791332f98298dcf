use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

use ham_welcome::config::{Config, Credentials};
use ham_welcome::dispatch::Dispatcher;
use ham_welcome::enrich::EnrichmentResolver;
use ham_welcome::error::{Result, WelcomeError};
use ham_welcome::import;
use ham_welcome::ledger::Ledger;
use ham_welcome::logging;
use ham_welcome::normalize::Normalizer;
use ham_welcome::pipeline::{Pipeline, RunOutcome};
use ham_welcome::providers::qrz::QrzProvider;
use ham_welcome::transport::sendgrid::SendGridTransport;
use ham_welcome::types::ConfirmationGate;

#[derive(Parser)]
#[command(name = "ham_welcome")]
#[command(about = "Welcome-email pipeline for newly licensed amateur radio operators")]
#[command(version = "0.1.0")]
struct Cli {
    /// CSV export of newly licensed operators
    #[arg(long)]
    batch: Option<PathBuf>,

    /// Ledger of callsigns already welcomed
    #[arg(long, default_value = "welcome_ledger.db")]
    ledger: PathBuf,

    /// Pipeline configuration file
    #[arg(long, default_value = "config.toml")]
    config: PathBuf,

    /// Run against a synthetic batch rather than real data
    #[arg(long)]
    test: bool,

    /// Skip the interactive confirmation prompt
    #[arg(long)]
    yes: bool,
}

/// Interactive gate: asks on stdout, accepts only an explicit "yes".
struct StdinGate;

impl ConfirmationGate for StdinGate {
    fn confirm(&self, prompt: &str) -> Result<bool> {
        println!("{prompt}");
        print!("> ");
        std::io::stdout().flush()?;
        let mut answer = String::new();
        std::io::stdin().read_line(&mut answer)?;
        Ok(answer.trim() == "yes")
    }
}

/// Non-interactive gate for `--yes` runs.
struct AssumeYesGate;

impl ConfirmationGate for AssumeYesGate {
    fn confirm(&self, _prompt: &str) -> Result<bool> {
        Ok(true)
    }
}

async fn run(cli: Cli) -> Result<RunOutcome> {
    let config = Config::load(&cli.config)?;
    let template = config.load_template()?;
    let credentials = Credentials::from_env()?;

    let raw_rows = if cli.test {
        println!("🧪 Using synthetic test batch");
        import::fake_batch()
    } else {
        let batch_path = cli.batch.ok_or_else(|| {
            WelcomeError::Config("You need to provide a --batch CSV file.".into())
        })?;
        import::read_batch(batch_path)?
    };

    let mut ledger = Ledger::open(&cli.ledger)?;

    let provider = QrzProvider::new(
        config.qrz.clone(),
        credentials.qrz_username,
        credentials.qrz_password,
    );
    let transport = SendGridTransport::new(credentials.sendgrid_api_key, config.mail.from.clone());

    let pipeline = Pipeline {
        normalizer: Normalizer::new(&config.region.zip_codes),
        resolver: EnrichmentResolver::new(Arc::new(provider)),
        dispatcher: Dispatcher::new(
            Arc::new(transport),
            config.mail.subject.clone(),
            template,
            config.dispatch.concurrency,
        ),
    };

    let gate: Box<dyn ConfirmationGate> = if cli.yes {
        Box::new(AssumeYesGate)
    } else {
        Box::new(StdinGate)
    };

    pipeline.run(&raw_rows, &mut ledger, gate.as_ref()).await
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    logging::init_logging();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(RunOutcome::Completed(summary)) => {
            println!("\n📊 Run summary:");
            println!("   Batch rows: {}", summary.batch_rows);
            println!("   Contacts: {}", summary.contacts);
            println!("   Already welcomed: {}", summary.already_notified);
            println!("   Work list: {}", summary.work_list);
            println!("   Emails found via lookup: {}", summary.enriched);
            println!("   Sent: {}", summary.sent);
            println!("   Failed: {}", summary.failed);
            println!("   No contact info: {}", summary.no_contact);
            info!("Run completed");
            ExitCode::SUCCESS
        }
        Ok(RunOutcome::Aborted) => {
            info!("Run aborted at the confirmation gate");
            ExitCode::from(2)
        }
        Err(e) => {
            error!("Run failed: {}", e);
            eprintln!("❌ Run failed: {e}");
            ExitCode::FAILURE
        }
    }
}
