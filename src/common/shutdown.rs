//! Ctrl+C cancellation for a run
//!
//! The binary creates one broadcast channel and hands the receiver to the
//! loader. On signal the loader stops reading and drops its event sender;
//! the consumer then drains what is buffered and the run ends normally.

use tokio::signal;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Unit signal: "stop loading now"
pub type ShutdownSignal = ();

pub type ShutdownSender = broadcast::Sender<ShutdownSignal>;

pub type ShutdownReceiver = broadcast::Receiver<ShutdownSignal>;

/// Spawn a Ctrl+C listener and return the channel it signals on
///
/// The sender is returned so callers can add their own triggers (a
/// timeout, a test) or `subscribe` further receivers.
///
/// # Example
/// ```ignore
/// let (_shutdown_tx, shutdown_rx) = setup_shutdown();
/// pipeline.run(shutdown_rx).await?;
/// ```
pub fn setup_shutdown() -> (ShutdownSender, ShutdownReceiver) {
    let (tx, rx) = broadcast::channel::<ShutdownSignal>(1);

    let trigger = tx.clone();
    tokio::spawn(async move {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C; run cannot be cancelled");
            return;
        }
        info!("Ctrl+C received, stopping loader");
        let _ = trigger.send(());
    });

    (tx, rx)
}
