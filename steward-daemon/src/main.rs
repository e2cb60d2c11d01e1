use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use steward_daemon::config::{DaemonArgs, format_duration};
use steward_daemon::live;
use steward_daemon::manager::{Scope, Systemctl};
use steward_daemon::notifier::{Notifier, TelegramApi};
use steward_daemon::persistence::RegistryStore;
use steward_daemon::pipeline;
use steward_daemon::registry::Registry;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, warn};

/// How long to wait for the pipeline to drain on shutdown
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    let args = DaemonArgs::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(args.log_level().into()),
        )
        .init();

    info!("Starting steward daemon");

    let store = RegistryStore::new(&args.config_file);
    let persisted = store
        .load_or_init()
        .with_context(|| format!("Failed to load {}", args.config_file.display()))?;
    let scope = Scope::from_global(persisted.global);
    info!("Managing {:?} units", scope);

    let registry = Registry::with_state(
        Systemctl::new(scope),
        store,
        persisted,
        args.registry_options(),
    );
    let raw = registry
        .events()
        .context("registry event stream already taken")?;

    // Pipeline: reconcile -> dedup -> hook -> tee(log, sinks)
    let settings = args.pipeline_settings();
    info!(
        "Polling service status every {}",
        format_duration(&settings.check_interval)
    );
    if let Some(hook) = &settings.hook {
        info!("Running hook for every event: {}", hook);
    }
    let events = pipeline::build(raw, registry.clone(), &settings);
    let (to_log, to_sinks) = pipeline::tee(events, settings.capacity);
    let logger = pipeline::spawn_logger(to_log);

    let (to_live, to_chat) = if args.telegram.enable {
        let (live, chat) = pipeline::tee(to_sinks, settings.capacity);
        (live, Some(chat))
    } else {
        (to_sinks, None)
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let (hub, hub_task) = live::spawn_hub(to_live);
    let listener = TcpListener::bind(&args.bind)
        .await
        .with_context(|| format!("Failed to bind {}", args.bind))?;
    let server = tokio::spawn(live::serve(
        listener,
        hub,
        registry.clone(),
        wait_for_shutdown(shutdown_rx.clone()),
    ));

    let notifier = match to_chat {
        Some(events) => {
            let api = TelegramApi::new(args.telegram.token()?)?;
            let notifier = Notifier::new(api, registry.clone(), args.telegram.settings());
            info!("Telegram notifier enabled");
            Some(tokio::spawn(
                notifier.run(events, wait_for_shutdown(shutdown_rx.clone())),
            ))
        }
        None => None,
    };

    shutdown_signal().await;
    info!("Shutting down");

    let _ = shutdown_tx.send(true);
    match server.await {
        Ok(Err(e)) => warn!("Live feed error: {}", e),
        Err(e) => warn!("Live feed task failed: {}", e),
        Ok(Ok(())) => {}
    }
    if let Some(task) = notifier
        && let Err(e) = task.await
    {
        warn!("Notifier task failed: {}", e);
    }

    registry.close();
    drop(registry);

    let drained = tokio::time::timeout(DRAIN_TIMEOUT, async {
        let _ = logger.await;
        let _ = hub_task.await;
    })
    .await;
    if drained.is_err() {
        warn!("Event pipeline did not drain within {:?}", DRAIN_TIMEOUT);
    }

    info!("Steward daemon stopped");
    Ok(())
}

async fn wait_for_shutdown(mut rx: watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
