//! NEWSWATCH: economic-calendar release watcher.
//!
//! Entry point. Loads configuration, initialises structured logging,
//! wires the browser bridge and storage, restores a persisted watch and
//! runs the watch loop until Ctrl+C.
//!
//! Usage: `newswatch [config.toml] [--fresh]`. `--fresh` deletes the
//! state file before starting.

use anyhow::{Context, Result};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use newswatch::auth::{AuthClient, SessionManager};
use newswatch::browser::{BrowserBridge, HttpBridge};
use newswatch::calendar::TabCalendarSource;
use newswatch::config::AppConfig;
use newswatch::dashboard::{self, DashboardState};
use newswatch::engine::executor::ActionExecutor;
use newswatch::engine::{WatchController, WatchRunner};
use newswatch::notify::{LogNotifier, Notifier, WebhookNotifier};
use newswatch::storage::{self, JsonFileStore, WatchStore};

const BANNER: &str = r#"
 _   _ _______        ______  __        ___  _____ ____ _   _
| \ | | ____\ \      / / ___| \ \      / / \|_   _/ ___| | | |
|  \| |  _|  \ \ /\ / /\___ \  \ \ /\ / / _ \ | || |   | |_| |
| |\  | |___  \ V  V /  ___) |  \ V  V / ___ \| || |___|  _  |
|_| \_|_____|  \_/\_/  |____/    \_/\_/_/   \_\_| \____|_| |_|

  Economic calendar watcher, one trade per arming
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let fresh = args.iter().any(|a| a == "--fresh");
    let config_path = args
        .iter()
        .find(|a| !a.starts_with("--"))
        .map(String::as_str)
        .unwrap_or("config.toml");

    let cfg = AppConfig::load(config_path)?;
    init_logging();

    println!("{BANNER}");
    info!(
        config = config_path,
        bridge = %cfg.bridge.base_url,
        calendar = %cfg.calendar.url,
        max_duration_hours = cfg.watch.max_duration_hours,
        "NEWSWATCH starting up"
    );

    // -- Storage ---------------------------------------------------------

    if fresh {
        storage::delete_state(&cfg.storage.path)?;
        info!(path = %cfg.storage.path, "State file removed");
    }
    let kv = JsonFileStore::open(&cfg.storage.path)?;
    let store = WatchStore::new(Arc::new(kv));

    // -- Ports -----------------------------------------------------------

    let bridge: Arc<dyn BrowserBridge> =
        Arc::new(HttpBridge::new(&cfg.bridge.base_url, cfg.bridge.timeout_secs)?);
    let calendar = Arc::new(TabCalendarSource::new(bridge.clone(), &cfg.calendar));
    let notifier = build_notifier(&cfg);

    let executor = ActionExecutor::new(
        bridge.clone(),
        &cfg.broker,
        store.clone(),
        notifier.clone(),
        cfg.watch.auto_disarm_delay(),
    );
    let mut controller = WatchController::new(
        calendar,
        executor,
        store.clone(),
        notifier,
        cfg.watch.max_duration(),
    );

    if controller.restore(Utc::now()) {
        let status = controller.status();
        info!(
            release = ?status.focus,
            pair = %status.pair,
            expires_at = ?status.expires_at,
            "Resumed armed watch"
        );
    } else {
        info!("Fresh start, watch disarmed");
    }

    let (mut runner, handle) = WatchRunner::new(controller, &cfg.watch);

    let session = if cfg.auth.enabled {
        let api = AuthClient::new(&cfg.auth.base_url)?;
        let session = Arc::new(SessionManager::new(
            Arc::new(api),
            bridge,
            &cfg.broker,
            &cfg.auth,
            store,
        ));
        runner = runner.with_session(
            session.clone(),
            cfg.auth.require_session_to_arm,
            Duration::from_secs(cfg.auth.verify_interval_secs),
        );
        Some(session)
    } else {
        warn!("Auth disabled, arming is not gated on a session");
        None
    };

    // -- Control API -----------------------------------------------------

    if cfg.dashboard.enabled {
        let state = Arc::new(DashboardState::new(handle.clone(), session));
        dashboard::spawn_dashboard(state, cfg.dashboard.port)
            .await
            .context("Failed to start control API")?;
    }

    // -- Main loop -------------------------------------------------------

    info!(
        tick_ms = cfg.watch.tick_interval_ms,
        "Entering watch loop. Press Ctrl+C to stop."
    );
    runner
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        })
        .await;

    drop(handle);
    info!("NEWSWATCH shut down cleanly.");
    Ok(())
}

fn build_notifier(cfg: &AppConfig) -> Arc<dyn Notifier> {
    let Some(env) = cfg.alerts.webhook_url_env.as_deref() else {
        return Arc::new(LogNotifier);
    };
    match AppConfig::resolve_env(env) {
        Ok(url) if !url.is_empty() => {
            info!(env, "Webhook notifications enabled");
            Arc::new(WebhookNotifier::new(url))
        }
        _ => {
            warn!(env, "Webhook URL not set, notifications go to the log only");
            Arc::new(LogNotifier)
        }
    }
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("newswatch=info"));

    if std::env::var("NEWSWATCH_LOG_JSON").is_ok() {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
