//! NextGCore SEPP (Security Edge Protection Proxy)
//!
//! Loads the SBI and SEPP configuration, registers the configured peer
//! SEPPs, queues the N32c capability exchange towards each of them and runs
//! the SBI timer loop until interrupted.

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use nextgcore_seppd::{SeppConf, SeppContext, SeppNodeId};
use ogs_sbi::{NfType, SbiConfig, SbiContext, SbiServiceType, SbiTimerEvent, XactId};

/// NextGCore SEPP - Security Edge Protection Proxy
#[derive(Parser, Debug)]
#[command(name = "nextgcore-seppd")]
#[command(author = "NextGCore")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "5G Core Security Edge Protection Proxy", long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short = 'c', long, default_value = "/etc/nextgcore/sepp.yaml")]
    config: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'e', long, default_value = "info")]
    log_level: String,

    /// Disable color output
    #[arg(short = 'm', long)]
    no_color: bool,
}

/// Daemon configuration file
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SeppConfig {
    sbi: SbiConfig,
    sepp: SeppConf,
}

impl SeppConfig {
    fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: SeppConfig = serde_yaml::from_str(yaml).context("Invalid SEPP configuration")?;
        config.sbi.validate().context("Invalid sbi section")?;
        config.sepp.validate().context("Invalid sepp section")?;
        Ok(config)
    }
}

/// Longest sleep between two timer checks
const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args)?;

    log::info!("NextGCore SEPP v{} starting...", env!("CARGO_PKG_VERSION"));

    let content = std::fs::read_to_string(&args.config)
        .with_context(|| format!("Failed to read configuration file {}", args.config))?;
    let config = SeppConfig::from_yaml_str(&content)?;
    log::info!("Configuration loaded from {}", args.config);

    let shutdown = Arc::new(AtomicBool::new(false));
    setup_signal_handlers(shutdown.clone())?;

    let mut sbi = SbiContext::new(NfType::Sepp, config.sbi.clone())
        .context("Failed to initialize SBI context")?;
    build_self_instance(&mut sbi)?;

    let mut sepp = SeppContext::new(&config.sepp, &config.sbi)
        .context("Failed to initialize SEPP context")?;
    let peers = sepp
        .add_peers(&config.sepp.peer)
        .context("Failed to add peer SEPP nodes")?;
    start_handshakes(&mut sbi, &mut sepp, &peers)?;

    log::info!("NextGCore SEPP ready");

    run_event_loop_async(&mut sbi, shutdown).await?;

    log::info!("Shutting down...");

    sepp.node_remove_all();
    sbi.finalize().context("Failed to finalize SBI context")?;
    log::info!("SBI context finalized");

    log::info!("NextGCore SEPP stopped");
    Ok(())
}

/// Initialize logging based on command line arguments
fn init_logging(args: &Args) -> Result<()> {
    let mut builder = env_logger::Builder::new();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => log::LevelFilter::Trace,
        "debug" => log::LevelFilter::Debug,
        "info" => log::LevelFilter::Info,
        "warn" => log::LevelFilter::Warn,
        "error" => log::LevelFilter::Error,
        _ => log::LevelFilter::Info,
    };
    builder.filter_level(level);
    builder.format_timestamp_millis();

    if args.no_color {
        builder.write_style(env_logger::WriteStyle::Never);
    }

    builder.init();

    Ok(())
}

/// Set up signal handlers for graceful shutdown
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) -> Result<()> {
    ctrlc::set_handler(move || {
        log::info!("Received shutdown signal");
        shutdown.store(true, Ordering::SeqCst);
    })
    .context("Failed to set Ctrl+C handler")?;

    Ok(())
}

/// Publish our own profile with the N32c handshake service
fn build_self_instance(sbi: &mut SbiContext) -> Result<()> {
    let id = sbi
        .self_instance_id()
        .context("No self NF instance")?;
    sbi.nf_instance_build_default(id)
        .context("Failed to build self NF instance")?;

    let name = SbiServiceType::N32cHandshake.to_name();
    if sbi.nf_service_is_available(name) {
        sbi.nf_service_build_default(id, name)
            .context("Failed to build N32c handshake service")?;
    }
    Ok(())
}

/// Queue the capability exchange towards each peer
///
/// One SBI object and transaction per peer, addressed at the peer's
/// apiRoot. The transaction goes away on answer or client-wait expiry.
fn start_handshakes(
    sbi: &mut SbiContext,
    sepp: &mut SeppContext,
    peers: &[SeppNodeId],
) -> Result<Vec<XactId>> {
    let scheme = sbi.config().client.scheme;
    let mut xacts = Vec::with_capacity(peers.len());
    for &id in peers {
        let receiver = sepp
            .node(id)
            .map(|node| node.receiver.clone())
            .context("Unknown peer SEPP node")?;
        let request = sepp
            .build_security_capability_request(id, false)
            .context("Failed to build security capability request")?;

        let object = sbi.object_add().context("No SBI object for handshake")?;
        let xact = match sbi.xact_add(object, SbiServiceType::N32cHandshake, None, || {
            Some(request)
        }) {
            Ok(xact) => xact,
            Err(e) => {
                if let Err(e) = sbi.object_free(object) {
                    log::error!("[{}] {}", receiver, e);
                }
                return Err(e).context("Failed to start security capability exchange");
            }
        };
        sbi.xact_set_target_apiroot(xact, &format!("{}://{}", scheme, receiver))?;

        log::info!("[{}] Security capability exchange started ({})", receiver, xact);
        xacts.push(xact);
    }
    Ok(xacts)
}

/// Sleep until the next timer is due, at most `POLL_INTERVAL`
fn poll_interval(sbi: &SbiContext) -> Duration {
    sbi.next_timeout(Instant::now())
        .map_or(POLL_INTERVAL, |timeout| timeout.min(POLL_INTERVAL))
}

/// Act on one expired SBI timer
fn dispatch_timer_event(sbi: &mut SbiContext, event: SbiTimerEvent) {
    match event {
        SbiTimerEvent::ClientWaitExpire(xact) => {
            log::warn!("[{}] Cannot receive SBI message", xact);
            let object = sbi.xact_find(xact).map(|x| x.object);
            if let Err(e) = sbi.xact_remove(xact) {
                log::error!("[{}] {}", xact, e);
            }
            // Handshake objects carry a single transaction
            if let Some(object) = object {
                if sbi.object(object).is_some_and(|o| o.xact_list.is_empty()) {
                    if let Err(e) = sbi.object_free(object) {
                        log::error!("[{}] {}", object, e);
                    }
                }
            }
        }
        SbiTimerEvent::SubscriptionValidity(data) => {
            log::info!("[{}] Subscription validity expired", data);
            if let Err(e) = sbi.subscription_data_remove(data) {
                log::error!("[{}] {}", data, e);
            }
        }
        SbiTimerEvent::SubscriptionPatch(data) => {
            log::info!("[{}] Subscription needs update", data);
        }
    }
}

/// Async main event loop with timer integration
async fn run_event_loop_async(sbi: &mut SbiContext, shutdown: Arc<AtomicBool>) -> Result<()> {
    log::debug!("Entering async main event loop");

    while !shutdown.load(Ordering::SeqCst) {
        tokio::time::sleep(poll_interval(sbi)).await;

        for event in sbi.process_timers() {
            log::debug!("SBI timer expired: {:?}", event);
            dispatch_timer_event(sbi, event);
        }
    }

    log::debug!("Exiting async main event loop");
    Ok(())
}
