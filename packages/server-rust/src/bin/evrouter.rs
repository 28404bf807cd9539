//! `evrouter` binary: connect, bootstrap, load routes, and listen until the
//! bus closes or the process is interrupted.
//!
//! On Unix, `SIGHUP` requests a routing-table reconcile and `SIGUSR1` a
//! compaction.

use anyhow::Context;
use clap::Parser;
use evrouter_server::{EventRouter, LogFormat, MaintenanceHandle, MaintenanceTask, RouterConfig};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

#[cfg(unix)]
async fn forward_signals(maintenance: MaintenanceHandle) {
    use tokio::signal::unix::{signal, SignalKind};

    let signals = (
        signal(SignalKind::hangup()),
        signal(SignalKind::user_defined1()),
    );
    let (mut hangup, mut user1) = match signals {
        (Ok(hangup), Ok(user1)) => (hangup, user1),
        (Err(e), _) | (_, Err(e)) => {
            warn!(error = %e, "maintenance signals unavailable");
            return std::future::pending().await;
        }
    };

    loop {
        let task = tokio::select! {
            _ = hangup.recv() => MaintenanceTask::Reconcile,
            _ = user1.recv() => MaintenanceTask::Compact,
        };
        info!(?task, "maintenance requested by signal");
        if let Err(e) = maintenance.submit(task).await {
            warn!(error = %e, "maintenance request dropped");
        }
    }
}

#[cfg(not(unix))]
async fn forward_signals(_maintenance: MaintenanceHandle) {
    std::future::pending().await
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = RouterConfig::parse();
    init_tracing(config.log_format);

    let router = EventRouter::connect(config)
        .await
        .context("router failed to connect")?;
    let report = router.start().await.context("router failed to start")?;
    info!(
        routes = report.loaded,
        skipped = report.skipped,
        "initial routing table ready"
    );

    tokio::select! {
        result = router.serve() => {
            if let Err(e) = result {
                error!(error = %e, "listener terminated");
                return Err(e).context("listener terminated");
            }
            info!("listener finished");
        }
        _ = tokio::signal::ctrl_c() => {
            // In-flight dispatches are not drained.
            info!(
                in_flight = router.lifecycle().in_flight_count(),
                "interrupted, exiting"
            );
        }
        () = forward_signals(router.maintenance()) => {}
    }

    Ok(())
}
