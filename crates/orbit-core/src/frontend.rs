//! The caller side of the kernel: where output goes and input comes from.

use std::io;

/// Standard stream a chunk of child output came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl StreamKind {
    /// `stdout` / `stderr`.
    pub fn name(self) -> &'static str {
        match self {
            StreamKind::Stdout => "stdout",
            StreamKind::Stderr => "stderr",
        }
    }
}

/// A rich display update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayData {
    /// MIME type, e.g. `text/html`.
    pub mime_type: String,
    /// Content; binary types are base64.
    pub payload: String,
}

impl DisplayData {
    /// Create a display update.
    pub fn new(mime_type: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            payload: payload.into(),
        }
    }

    /// `text/markdown` content.
    pub fn markdown(payload: impl Into<String>) -> Self {
        Self::new("text/markdown", payload)
    }

    /// `text/html` content.
    pub fn html(payload: impl Into<String>) -> Self {
        Self::new("text/html", payload)
    }
}

/// Heartbeat sent to the widget link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatAck {
    /// Whether this heartbeat answers one received from the front end.
    pub ack: bool,
}

/// Message-bus collaborator: publishes output and supplies input.
///
/// Calls arrive from several tasks at once (stdout, stderr and sideband
/// readers), so implementations must be `Send + Sync`. `request_input`
/// blocks and is always called from a blocking-capable thread.
pub trait Frontend: Send + Sync {
    /// Publish a chunk of stream output.
    fn publish_stream(&self, stream: StreamKind, text: &str);

    /// Publish a rich display update.
    fn publish_display(&self, data: DisplayData);

    /// Ask the user for a line of input; `masked` input is not echoed.
    fn request_input(&self, prompt: &str, masked: bool) -> io::Result<String>;

    /// Install the widget communication link.
    fn install_widget_link(&self) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "front end has no widget support",
        ))
    }

    /// Send a heartbeat over the widget link.
    fn send_heartbeat(&self, _heartbeat: HeartbeatAck) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "front end has no widget support",
        ))
    }
}

/// Publish a line on stderr.
pub(crate) fn report(frontend: &dyn Frontend, message: &str) {
    let mut text = message.to_string();
    if !text.ends_with('\n') {
        text.push('\n');
    }
    frontend.publish_stream(StreamKind::Stderr, &text);
}

/// Publish a line on stdout.
pub(crate) fn say(frontend: &dyn Frontend, message: &str) {
    let mut text = message.to_string();
    if !text.ends_with('\n') {
        text.push('\n');
    }
    frontend.publish_stream(StreamKind::Stdout, &text);
}
