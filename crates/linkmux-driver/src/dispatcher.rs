//! Per-channel receive dispatcher.
//!
//! Exactly one dispatch loop runs per channel, spawned when the first
//! receive instance opens it. The loop owns the link: it polls for frames,
//! files each one into the registry under its identifier, and transparently
//! re-establishes the link when it drops. Receivers never touch the link
//! directly; they read the registry.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use linkmux_transport::FrameReader;
use tracing::{debug, error, trace, warn};

use crate::error::{DriverError, Result};
use crate::lifecycle::{CancelToken, ConnectRetry};
use crate::registry::Registry;

/// Control handle for one channel's dispatch loop.
#[derive(Debug)]
pub(crate) struct DispatchHandle {
    cancel: CancelToken,
    thread: Option<JoinHandle<()>>,
}

impl DispatchHandle {
    /// Cancel the loop and wait for the thread to exit.
    pub(crate) fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Spawn the dispatch loop for `channel`, taking ownership of its link.
/// The link must already be connected.
pub(crate) fn spawn<L>(
    registry: Arc<Registry>,
    channel: String,
    link: L,
    retry: ConnectRetry,
) -> Result<DispatchHandle>
where
    L: FrameReader + Send + 'static,
{
    let cancel = CancelToken::new();
    let loop_cancel = cancel.clone();
    let thread = thread::Builder::new()
        .name(format!("dispatch-{channel}"))
        .spawn(move || run(registry, channel, link, retry, loop_cancel))
        .map_err(DriverError::Spawn)?;
    Ok(DispatchHandle {
        cancel,
        thread: Some(thread),
    })
}

fn run<L: FrameReader>(
    registry: Arc<Registry>,
    channel: String,
    mut link: L,
    retry: ConnectRetry,
    cancel: CancelToken,
) {
    debug!(%channel, "dispatch loop started");
    while !cancel.is_cancelled() {
        if !link.is_connected() {
            // Anything buffered predates the failure; a reader must not see
            // it as fresh.
            registry.clear_channel(&channel);
            match retry.establish_with(&mut link, &cancel) {
                Ok(_) => continue,
                Err(DriverError::Cancelled) => break,
                Err(e) => {
                    error!(%channel, error = %e, "could not re-establish link, dispatch stopping");
                    break;
                }
            }
        }
        match link.read_frame() {
            Ok(Some(frame)) => {
                let id = frame.id;
                let len = frame.payload.len();
                if registry.record_received(&channel, id, frame.payload) {
                    trace!(%channel, ?id, len, "frame dispatched");
                } else {
                    trace!(%channel, ?id, len, "frame dropped, identifier not claimed");
                }
            }
            Ok(None) => {}
            Err(e) if e.is_framing() => {
                warn!(%channel, error = %e, "malformed frame dropped");
            }
            Err(e) => {
                warn!(%channel, error = %e, "link read failed");
                registry.clear_channel(&channel);
                link.disconnect();
            }
        }
    }
    link.disconnect();
    registry.clear_channel(&channel);
    debug!(%channel, "dispatch loop stopped");
}
