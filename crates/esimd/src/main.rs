// # esimd - eSIM gateway runner
//
// This binary is a THIN integration layer over `esim-core`:
// 1. Reading configuration from environment variables
// 2. Initializing tracing
// 3. Registering the provider adapters
// 4. Running one gateway operation, or replaying webhook deliveries through
//    the fulfillment engine against an in-memory store
//
// Results are printed to stdout as JSON; logs go to stderr.
//
// ## Configuration
//
// ### Feature flag and provider
// - `ESIM_ENABLED`: `true`/`1`/`yes`/`on` enables eSIM operations
// - `ESIM_PROVIDER`: `telna` (default) or `emnify`
//
// ### Telna
// - `TELNA_API_BASE`, `TELNA_API_KEY`
//
// ### emnify
// - `EMNIFY_API_BASE`, `EMNIFY_APP_TOKEN_ID`, `EMNIFY_APP_TOKEN_SECRET`
//
// ### HTTP
// - `ESIM_HTTP_TIMEOUT_MS`: Per-attempt timeout
// - `ESIM_RETRY_BASE_MS`, `ESIM_RETRY_JITTER_MS`: Backoff between attempts
//
// ### Logging
// - `ESIM_LOG_LEVEL`: trace, debug, info (default), warn, error
//
// ## Example
//
// ```bash
// export ESIM_ENABLED=true
// export ESIM_PROVIDER=telna
// export TELNA_API_BASE=https://api.telna.com/v1
// export TELNA_API_KEY=your_key
//
// esimd usage prof-123
// esimd replay-webhook --catalog catalog.json --users users.json events.json
// ```

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use esim_core::config::{EsimConfig, FulfillmentConfig, PriceCatalog};
use esim_core::fulfillment::engine::DEFAULT_EVENT_CHANNEL_CAPACITY;
use esim_core::fulfillment::{BillingEvent, Fulfiller, FulfillmentEngine};
use esim_core::models::{ActivateRequest, LineRequest, ProvisionRequest, ReserveRequest};
use esim_core::traits::UserAccount;
use esim_core::{EsimGateway, FulfillmentStore, MemoryFulfillmentStore, ProviderRegistry};
use serde_json::{Value, json};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

/// Exit codes for different termination scenarios
///
/// - 0: Operation succeeded
/// - 1: Configuration or startup error
/// - 2: Runtime error (operation failed)
#[derive(Debug, Clone, Copy)]
enum EsimdExitCode {
    /// Operation succeeded
    Success = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error
    RuntimeError = 2,
}

impl From<EsimdExitCode> for ExitCode {
    fn from(code: EsimdExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Run eSIM gateway operations against the configured provider
#[derive(Parser)]
#[command(name = "esimd", version)]
struct Cli {
    /// Pretty-print JSON output
    #[arg(long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Reserve an eSIM profile in a region
    Reserve {
        #[arg(long)]
        region: String,
        #[arg(long)]
        user_id: Option<String>,
    },

    /// Activate a reserved profile
    Activate {
        #[command(flatten)]
        target: Target,
        #[arg(long)]
        activation_code: Option<String>,
    },

    /// Suspend a line
    Suspend {
        #[command(flatten)]
        target: Target,
    },

    /// Resume a suspended line
    Resume {
        #[command(flatten)]
        target: Target,
    },

    /// Provision a data pack onto a profile
    Provision {
        #[arg(long)]
        user_id: String,
        #[arg(long)]
        profile_id: String,
        #[arg(long)]
        addon_kind: String,
        #[arg(long)]
        plan_code: Option<String>,
    },

    /// Fetch data usage of a profile
    Usage { profile_id: String },

    /// Replay webhook deliveries from a JSON file through fulfillment
    ReplayWebhook(ReplayArgs),
}

/// Profile or line identifier
#[derive(Args)]
struct Target {
    #[arg(long)]
    profile_id: Option<String>,
    #[arg(long)]
    iccid: Option<String>,
}

impl Target {
    fn into_line_request(self) -> LineRequest {
        LineRequest {
            provider_profile_id: self.profile_id,
            iccid: self.iccid,
        }
    }
}

#[derive(Args)]
struct ReplayArgs {
    /// File with one billing event or an array of events
    file: PathBuf,

    /// Price catalog (JSON object of price id → product)
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Users to seed the in-memory store with (JSON array)
    #[arg(long)]
    users: Option<PathBuf>,

    /// Region for profiles reserved during fulfillment
    #[arg(long, default_value = "EU")]
    region: String,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Load configuration from environment
    let config = match EsimConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return EsimdExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return EsimdExitCode::ConfigError.into();
    }

    // Initialize tracing
    let log_level = std::env::var("ESIM_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let log_level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        other => {
            eprintln!(
                "ESIM_LOG_LEVEL '{}' is not valid. Valid levels: trace, debug, info, warn, error",
                other
            );
            return EsimdExitCode::ConfigError.into();
        }
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return EsimdExitCode::ConfigError.into();
    }

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return EsimdExitCode::RuntimeError.into();
        }
    };

    rt.block_on(run(cli, config)).into()
}

async fn run(cli: Cli, config: EsimConfig) -> EsimdExitCode {
    let registry = ProviderRegistry::new();

    #[cfg(feature = "telna")]
    esim_provider_telna::register(&registry);

    #[cfg(feature = "emnify")]
    esim_provider_emnify::register(&registry);

    let gateway = match EsimGateway::from_registry(&registry, &config) {
        Ok(gateway) => Arc::new(gateway),
        Err(e) => {
            error!(code = %e.code(), "Failed to create gateway: {}", e);
            print_json(&error_json(&e), cli.pretty);
            return EsimdExitCode::ConfigError;
        }
    };

    info!(
        provider = %gateway.provider_kind(),
        enabled = gateway.is_enabled(),
        "eSIM gateway ready"
    );

    match cli.command {
        Command::ReplayWebhook(args) => match replay_webhooks(gateway, args).await {
            Ok(report) => {
                print_json(&report, cli.pretty);
                EsimdExitCode::Success
            }
            Err(e) => {
                error!("Replay failed: {:#}", e);
                EsimdExitCode::RuntimeError
            }
        },
        command => match run_operation(&gateway, command).await {
            Ok(value) => {
                print_json(&value, cli.pretty);
                EsimdExitCode::Success
            }
            Err(e) => {
                error!(code = %e.code(), "Operation failed: {}", e);
                print_json(&error_json(&e), cli.pretty);
                EsimdExitCode::RuntimeError
            }
        },
    }
}

/// Run one gateway operation and return its result as JSON
async fn run_operation(gateway: &EsimGateway, command: Command) -> esim_core::Result<Value> {
    let value = match command {
        Command::Reserve { region, user_id } => {
            let mut request = ReserveRequest::new(region);
            request.user_id = user_id;
            serde_json::to_value(gateway.reserve_esim_profile(&request).await?)?
        }
        Command::Activate {
            target,
            activation_code,
        } => {
            let request = ActivateRequest {
                provider_profile_id: target.profile_id,
                iccid: target.iccid,
                activation_code,
            };
            serde_json::to_value(gateway.activate_profile(&request).await?)?
        }
        Command::Suspend { target } => {
            serde_json::to_value(gateway.suspend_line(&target.into_line_request()).await?)?
        }
        Command::Resume { target } => {
            serde_json::to_value(gateway.resume_line(&target.into_line_request()).await?)?
        }
        Command::Provision {
            user_id,
            profile_id,
            addon_kind,
            plan_code,
        } => {
            let request = ProvisionRequest {
                user_id,
                provider_profile_id: profile_id,
                addon_kind,
                plan_code,
            };
            serde_json::to_value(gateway.provision_esim_pack(&request).await?)?
        }
        Command::Usage { profile_id } => {
            serde_json::to_value(gateway.fetch_esim_usage(&profile_id).await?)?
        }
        Command::ReplayWebhook(_) => {
            return Err(esim_core::Error::Other(
                "replay-webhook is not a gateway operation".to_string(),
            ));
        }
    };
    Ok(value)
}

/// Feed deliveries from a file through the fulfillment engine
async fn replay_webhooks(gateway: Arc<EsimGateway>, args: ReplayArgs) -> Result<Value> {
    let deliveries = read_events(&args.file)?;

    let catalog: PriceCatalog = match &args.catalog {
        Some(path) => read_json(path)?,
        None => PriceCatalog::default(),
    };
    if catalog.is_empty() {
        warn!("Price catalog is empty, every line item will be skipped");
    }

    let store = MemoryFulfillmentStore::new();
    if let Some(path) = &args.users {
        let users: Vec<UserAccount> = read_json(path)?;
        info!("Seeding store with {} user(s)", users.len());
        for user in users {
            store.insert_user(user).await;
        }
    }

    let fulfiller = Fulfiller::new(
        gateway,
        Arc::new(store.clone()),
        FulfillmentConfig {
            default_region: args.region,
            catalog,
        },
    );
    let (engine, mut event_rx) = FulfillmentEngine::new(fulfiller, DEFAULT_EVENT_CHANNEL_CAPACITY);

    let collector = tokio::spawn(async move {
        let mut events = Vec::new();
        while let Some(event) = event_rx.recv().await {
            events.push(event);
        }
        events
    });

    info!("Replaying {} delivery(ies)", deliveries.len());
    let summary = engine.run(tokio_stream::iter(deliveries)).await?;
    drop(engine);

    let events = collector.await.context("Event collector task failed")?;
    let reconciliation = store.needs_reconciliation().await?;

    Ok(json!({
        "summary": summary,
        "events": events,
        "needsReconciliation": reconciliation,
        "familyGroups": store.family_groups().await,
    }))
}

/// Read one event or an array of events
fn read_events(path: &Path) -> Result<Vec<BillingEvent>> {
    let value: Value = read_json(path)?;
    let events = match value {
        Value::Array(_) => serde_json::from_value(value),
        single => serde_json::from_value(single).map(|event| vec![event]),
    };
    events.with_context(|| format!("{} does not contain billing events", path.display()))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid JSON in {}", path.display()))
}

fn error_json(error: &esim_core::Error) -> Value {
    json!({
        "error": {
            "code": error.code(),
            "message": error.to_string(),
            "status": error.status(),
            "provider": error.provider_name(),
            "providerMeta": error.provider_meta(),
        }
    })
}

fn print_json(value: &Value, pretty: bool) {
    let rendered = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    };
    match rendered {
        Ok(text) => println!("{}", text),
        Err(e) => error!("Failed to render output: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_subcommands_parse() {
        let cli = Cli::try_parse_from(["esimd", "suspend", "--iccid", "8944"]).unwrap();
        match cli.command {
            Command::Suspend { target } => {
                let request = target.into_line_request();
                assert_eq!(request.iccid.as_deref(), Some("8944"));
                assert_eq!(request.provider_profile_id, None);
            }
            _ => panic!("expected suspend"),
        }

        let cli = Cli::try_parse_from([
            "esimd",
            "replay-webhook",
            "events.json",
            "--catalog",
            "catalog.json",
            "--pretty",
        ])
        .unwrap();
        assert!(cli.pretty);
        assert!(matches!(cli.command, Command::ReplayWebhook(ref args) if args.region == "EU"));
    }

    #[test]
    fn test_read_events_accepts_single_and_array() {
        let event = json!({
            "id": "evt_1",
            "type": "checkout.session.completed",
            "data": { "object": { "id": "cs_1" } }
        });

        let mut single = tempfile::NamedTempFile::new().unwrap();
        write!(single, "{}", event).unwrap();
        assert_eq!(read_events(single.path()).unwrap().len(), 1);

        let mut many = tempfile::NamedTempFile::new().unwrap();
        write!(many, "{}", json!([event.clone(), event])).unwrap();
        assert_eq!(read_events(many.path()).unwrap().len(), 2);
    }

    #[test]
    fn test_error_json_carries_code() {
        let value = error_json(&esim_core::Error::Disabled);
        assert_eq!(value["error"]["code"], "ESIM_DISABLED");
        assert_eq!(value["error"]["status"], Value::Null);
    }
}
