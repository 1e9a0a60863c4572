//! `lead-intake` - operator CLI for the submission ledger and session expiry.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use thiserror::Error;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lead_intake::adapters::{
    postgres, HttpLeadSink, HttpLeadSinkConfig, PostgresOutcomeLedger, PostgresSessionRepository,
};
use lead_intake::application::{
    ExpireSessionsHandler, IntakeError, ReconciliationError, ReconciliationService, SessionJanitor,
    SessionLocks,
};
use lead_intake::config::{AppConfig, ConfigError, CrmConfig, RuntimeConfig};
use lead_intake::domain::foundation::{Channel, DomainError, OutcomeId, Timestamp};
use lead_intake::domain::submission::{OutcomeFilter, SubmissionOutcome};
use lead_intake::ports::{LeadSink, OutcomeLedger, SubmissionError};

#[derive(Parser)]
#[command(name = "lead-intake", version, about = "Lead intake operator tools")]
struct Cli {
    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List failed submissions awaiting retry
    List,
    /// Show one submission outcome
    Show {
        /// Outcome id
        id: OutcomeId,
    },
    /// Retry one failed submission
    Retry {
        /// Outcome id
        id: OutcomeId,
    },
    /// Retry every failed submission
    RetryAll,
    /// List successful submissions
    Succeeded {
        /// Only outcomes resolved within this window (e.g. 30m, 24h, 7d, 2w)
        #[arg(long, value_parser = parse_window)]
        since: Option<Duration>,
        /// Only this channel (text or voice)
        #[arg(long)]
        channel: Option<Channel>,
    },
    /// Close sessions idle longer than the configured TTL
    ExpireSessions,
    /// Keep expiring idle sessions on an interval until interrupted
    Janitor,
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Storage(#[from] DomainError),

    #[error(transparent)]
    Reconciliation(#[from] ReconciliationError),

    #[error(transparent)]
    Intake(#[from] IntakeError),

    #[error("CRM sink could not be created: {0}")]
    Sink(#[from] SubmissionError),

    #[error("CRM is not configured; set LEAD_INTAKE__CRM__BASE_URL and LEAD_INTAKE__CRM__API_TOKEN")]
    CrmNotConfigured,

    #[error("failed to encode output: {0}")]
    Output(#[from] serde_json::Error),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::from(2);
        }
    };
    init_tracing(&config.runtime);

    match run(cli, config).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(runtime: &RuntimeConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| runtime.log_level.clone().into());
    let registry = tracing_subscriber::registry().with(filter);

    // Logs go to stderr so command output stays pipeable.
    if runtime.json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn run(cli: Cli, config: AppConfig) -> Result<ExitCode, CliError> {
    let pool = postgres::connect(&config.database).await?;
    if config.database.run_migrations {
        postgres::run_migrations(&pool).await?;
    }
    tracing::debug!(database = %config.database.redacted_url(), "Connected");

    let ledger: Arc<dyn OutcomeLedger> = Arc::new(PostgresOutcomeLedger::new(pool.clone()));

    match cli.command {
        Commands::List => {
            let failed = reconciliation(&config, ledger, None).list().await?;
            print_outcomes(&failed, cli.json)?;
        }
        Commands::Show { id } => {
            let outcome = reconciliation(&config, ledger, None).show(&id).await?;
            print_outcomes(std::slice::from_ref(&outcome), cli.json)?;
        }
        Commands::Retry { id } => {
            let outcome = reconciliation(&config, ledger, Some(crm_sink(&config.crm)?))
                .retry(&id)
                .await?;
            print_outcomes(std::slice::from_ref(&outcome), cli.json)?;
            if !outcome.is_resolved() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::RetryAll => {
            let summary = reconciliation(&config, ledger, Some(crm_sink(&config.crm)?))
                .retry_all()
                .await?;
            if cli.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&serde_json::json!({
                        "attempted": summary.attempted,
                        "succeeded": summary.succeeded,
                        "failed": summary.failed,
                        "errors": summary.errors.iter()
                            .map(|(id, e)| serde_json::json!({"id": id, "error": e}))
                            .collect::<Vec<_>>(),
                    }))?
                );
            } else {
                println!(
                    "attempted {}, succeeded {}, still failing {}, errors {}",
                    summary.attempted,
                    summary.succeeded,
                    summary.failed,
                    summary.errors.len()
                );
                for (id, error) in &summary.errors {
                    println!("  {}: {}", id, error);
                }
            }
            if !summary.all_resolved() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Succeeded { since, channel } => {
            let filter = OutcomeFilter {
                since: since.map(|window| Timestamp::now().minus(window)),
                channel,
            };
            let succeeded = reconciliation(&config, ledger, None)
                .list_succeeded(&filter)
                .await?;
            print_outcomes(&succeeded, cli.json)?;
        }
        Commands::ExpireSessions => {
            let result = expirer(&config, pool).handle(Timestamp::now()).await?;
            println!(
                "expired {} session(s), skipped {}",
                result.expired.len(),
                result.skipped
            );
        }
        Commands::Janitor => {
            let janitor = SessionJanitor::new(Arc::new(expirer(&config, pool)))
                .with_interval(config.intake.janitor_interval());
            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("Shutdown requested");
                    let _ = shutdown_tx.send(true);
                }
            });
            janitor.run(shutdown_rx).await;
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn expirer(config: &AppConfig, pool: sqlx::PgPool) -> ExpireSessionsHandler {
    ExpireSessionsHandler::new(
        Arc::new(PostgresSessionRepository::new(pool)),
        SessionLocks::new(),
        config.intake.session_ttl(),
    )
}

/// Read-only commands never reach the CRM, so they get a sink that refuses.
fn reconciliation(
    config: &AppConfig,
    ledger: Arc<dyn OutcomeLedger>,
    sink: Option<Arc<dyn LeadSink>>,
) -> ReconciliationService {
    let sink = match sink {
        Some(sink) => sink,
        None => Arc::new(UnconfiguredSink),
    };
    ReconciliationService::new(ledger, sink)
        .with_timeout(config.crm.timeout())
        .with_concurrency(config.intake.retry_concurrency)
}

fn crm_sink(crm: &CrmConfig) -> Result<Arc<dyn LeadSink>, CliError> {
    if !crm.is_configured() {
        return Err(CliError::CrmNotConfigured);
    }
    let (Some(base_url), Some(token)) = (crm.base_url.clone(), crm.api_token.clone()) else {
        return Err(CliError::CrmNotConfigured);
    };
    let sink = HttpLeadSink::new(HttpLeadSinkConfig::new(base_url, token).with_timeout(crm.timeout()))?;
    Ok(Arc::new(sink))
}

struct UnconfiguredSink;

#[async_trait::async_trait]
impl LeadSink for UnconfiguredSink {
    async fn submit(
        &self,
        _lead: &lead_intake::ports::LeadSubmission,
    ) -> Result<serde_json::Value, SubmissionError> {
        Err(SubmissionError::Network("CRM is not configured".to_string()))
    }
}

fn print_outcomes(outcomes: &[SubmissionOutcome], json: bool) -> Result<(), CliError> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcomes)?);
        return Ok(());
    }
    if outcomes.is_empty() {
        println!("no outcomes");
        return Ok(());
    }
    for outcome in outcomes {
        println!(
            "{}  {:<9} {:<5} retries={} created={} session={}",
            outcome.id(),
            outcome.status(),
            outcome.channel(),
            outcome.retry_count(),
            outcome.created_at().as_datetime().format("%Y-%m-%d %H:%M:%S"),
            outcome.session_id(),
        );
        if let Some(error) = outcome.error_message() {
            println!("    error: {}", error);
        }
        let lead: Vec<String> = outcome
            .lead_data()
            .iter()
            .map(|(field, value)| format!("{}={}", field, value))
            .collect();
        println!("    lead: {}", lead.join(", "));
    }
    Ok(())
}

/// Parses windows like `30m`, `24h`, `7d`, `2w`.
fn parse_window(raw: &str) -> Result<Duration, String> {
    let raw = raw.trim();
    let split = raw
        .find(|c: char| !c.is_ascii_digit())
        .ok_or_else(|| format!("missing unit in '{}' (use m, h, d or w)", raw))?;
    let (amount, unit) = raw.split_at(split);
    let amount: u64 = amount
        .parse()
        .map_err(|_| format!("invalid amount in '{}'", raw))?;
    let seconds = match unit {
        "m" => 60,
        "h" => 60 * 60,
        "d" => 24 * 60 * 60,
        "w" => 7 * 24 * 60 * 60,
        other => return Err(format!("unknown unit '{}' (use m, h, d or w)", other)),
    };
    amount
        .checked_mul(seconds)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("window '{}' is too large", raw))
}
