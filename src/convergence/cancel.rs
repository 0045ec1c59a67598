//! Process-wide, single-shot cancellation.
//!
//! [`CancellationToken`] is tokio-util's token. Clones share one state, the
//! signal listener arms it once, and every poll loop checks
//! `is_cancelled()` without blocking, so any number of concurrent waiters
//! observe the same armed state. It is never reset.

use std::future::{Future, pending};
use std::io;

use tracing::{error, info, warn};

pub use tokio_util::sync::CancellationToken;

/// Spawns a task that arms `token` on the first Ctrl-C (or SIGTERM on unix).
///
/// If no signal can be registered the task parks forever instead of arming
/// the token.
pub fn listen_for_shutdown(token: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let signal = wait_for_signal().await;
        eprintln!();
        info!(signal, "received shutdown signal, aborting pending waits");
        if token.is_cancelled() {
            warn!("cancellation token was already armed");
        }
        token.cancel();
    })
}

/// Resolves to `name` once `signal` fires. A registration error parks
/// forever so the token stays unarmed.
async fn on_signal(
    name: &'static str,
    signal: impl Future<Output = io::Result<()>>,
) -> &'static str {
    match signal.await {
        Ok(()) => name,
        Err(err) => {
            error!(
                signal = name,
                error = %err,
                "cannot listen for signal, waits can only end by deadline"
            );
            pending().await
        }
    }
}

async fn ctrl_c() -> &'static str {
    on_signal("SIGINT", tokio::signal::ctrl_c()).await
}

#[cfg(unix)]
async fn wait_for_signal() -> &'static str {
    use tokio::signal::unix::{SignalKind, signal};

    let mut term = match signal(SignalKind::terminate()) {
        Ok(term) => term,
        Err(err) => {
            warn!(error = %err, "cannot listen for SIGTERM, falling back to Ctrl-C only");
            return ctrl_c().await;
        }
    };
    tokio::select! {
        signal = ctrl_c() => signal,
        _ = term.recv() => "SIGTERM",
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> &'static str {
    ctrl_c().await
}
