//! Widget communication link.
//!
//! Widgets live in the front end and talk to the kernel over a link the
//! front end installs on request. The kernel only needs to know whether the
//! link is alive, which it checks with a bounded heartbeat.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::oneshot;

use crate::error::{Error, Result};
use crate::frontend::{Frontend, HeartbeatAck};

/// Result of a heartbeat probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeResult {
    /// The other side acknowledged in time.
    Pong,
    /// No acknowledgement within the timeout.
    NoResponse,
}

impl ProbeResult {
    /// Message shown to the user.
    pub fn message(self) -> &'static str {
        match self {
            ProbeResult::Pong => "pong received",
            ProbeResult::NoResponse => "no response",
        }
    }
}

#[derive(Default)]
struct LinkState {
    installed: bool,
    /// Completes the probe currently waiting for an acknowledgement.
    pending: Option<oneshot::Sender<()>>,
}

/// Handle to the widget link. Clones share the same state.
#[derive(Clone, Default)]
pub struct WidgetLink {
    state: Arc<Mutex<LinkState>>,
}

impl std::fmt::Debug for WidgetLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WidgetLink")
            .field("installed", &self.is_installed())
            .finish()
    }
}

impl WidgetLink {
    /// Create an uninstalled link.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the front end to install the link.
    pub fn install(&self, frontend: &dyn Frontend) -> Result<()> {
        frontend
            .install_widget_link()
            .map_err(|e| Error::Directive(format!("failed to install widget link: {e}")))?;
        if let Ok(mut state) = self.state.lock() {
            state.installed = true;
        }
        tracing::debug!("widget link installed");
        Ok(())
    }

    /// Whether [`WidgetLink::install`] succeeded.
    pub fn is_installed(&self) -> bool {
        self.state.lock().map(|s| s.installed).unwrap_or(false)
    }

    /// Send a heartbeat and wait at most `timeout` for its acknowledgement.
    pub async fn probe(&self, frontend: &dyn Frontend, timeout: Duration) -> ProbeResult {
        let (tx, rx) = oneshot::channel();
        if let Ok(mut state) = self.state.lock() {
            state.pending = Some(tx);
        }

        if let Err(e) = frontend.send_heartbeat(HeartbeatAck { ack: false }) {
            tracing::debug!("heartbeat not sent: {e}");
            self.clear_pending();
            return ProbeResult::NoResponse;
        }

        let result = match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(())) => ProbeResult::Pong,
            _ => ProbeResult::NoResponse,
        };
        self.clear_pending();
        tracing::debug!(?result, "widget heartbeat");
        result
    }

    /// Acknowledge the pending probe. Returns whether one was waiting.
    pub fn acknowledge(&self) -> bool {
        let pending = self.state.lock().ok().and_then(|mut s| s.pending.take());
        match pending {
            Some(tx) => tx.send(()).is_ok(),
            None => false,
        }
    }

    fn clear_pending(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.pending = None;
        }
    }
}
