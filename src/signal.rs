use {super::*, tokio::signal::ctrl_c};

/// Cancelled once on SIGINT or SIGTERM; every long-running task selects on
/// it and unwinds cleanly.
pub(crate) fn shutdown_token() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();

    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};

            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c() => info!("Received shutdown signal (Ctrl-C / SIGINT)"),
                        _ = sigterm.recv() => info!("Received shutdown signal (SIGTERM)"),
                    }
                }
                Err(err) => {
                    error!("Failed to install SIGTERM handler: {err}");
                    ctrl_c().await.ok();
                    info!("Received shutdown signal (Ctrl-C)");
                }
            }
        }

        #[cfg(not(unix))]
        {
            ctrl_c().await.ok();
            info!("Received shutdown signal (Ctrl-C)");
        }

        trigger.cancel();
    });

    cancel
}
