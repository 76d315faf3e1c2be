mod error;
mod referrals;
mod router;
mod telemetry;
#[cfg(test)]
mod testing;

use std::sync::Arc;

use tracing::{error, info, warn};

use referral_mail::SmtpNotifier;
use referral_util::{load_env_file, AppConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    load_env_file();
    let config = AppConfig::from_env()?;

    telemetry::init_tracing(&config)?;
    let metrics = telemetry::init_metrics()?;

    let store = referral_storage::connect(&config.database_url).await?;
    let probe = store.clone();
    tokio::spawn(async move {
        match probe.ping().await {
            Ok(()) => info!(stage = "storage", backend = probe.backend(), "database connected"),
            Err(err) => {
                error!(stage = "storage", backend = probe.backend(), error = %err, "database connection error")
            }
        }
    });

    let notifier = SmtpNotifier::new(
        &config.mail.relay_host,
        config.mail.credentials(),
        config.mail.from.as_deref(),
    )?;
    if notifier.is_configured() {
        info!(stage = "notify", relay = notifier.relay_host(), "mail relay configured");
    } else {
        warn!(
            stage = "notify",
            relay = notifier.relay_host(),
            "GMAIL_USER/GMAIL_PASS not set; referral emails will fail"
        );
    }

    let state = router::AppState::new(metrics, store.clone(), Arc::new(notifier));

    let addr = config.bind_addr;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(stage = "app", %addr, env = %config.environment.as_str(), "server is running on port {}", addr.port());
    info!(stage = "app", base_url = %config.base_url, "base URL: {}", config.base_url);

    axum::serve(listener, router::app_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    store.close().await;
    info!(stage = "app", "shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(stage = "app", error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!(stage = "app", error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!(stage = "app", "received SIGINT, shutting down"),
        _ = terminate => info!(stage = "app", "received SIGTERM, shutting down"),
    }
}
