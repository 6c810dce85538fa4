//! Kernel side of the display sideband.
//!
//! The cell program connects to a Unix socket whose path it finds in
//! `ORBIT_SIDEBAND`. One reader task drains its frames while stdout and
//! stderr are drained elsewhere; a bad frame ends this reader only.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::UnixListener;
use tokio::net::unix::OwnedWriteHalf;
use tokio::sync::{Mutex, oneshot};

use crate::error::{Error, Result};
use crate::frontend::{DisplayData, Frontend, report};
use crate::widgets::WidgetLink;

use super::protocol::{Frame, read_frame, write_frame};

/// Shared handle on the child's stdin; `None` once closed.
pub type StdinSlot = Arc<Mutex<Option<Box<dyn AsyncWrite + Send + Unpin>>>>;

/// What the sideband reader needs from the session.
#[derive(Clone)]
pub struct SidebandContext {
    /// Where displays go and input comes from.
    pub frontend: Arc<dyn Frontend>,
    /// The child's stdin, for unmasked input replies.
    pub stdin: StdinSlot,
    /// Whether the submission may prompt the user.
    pub allow_input: bool,
    /// Widget link acknowledged by child heartbeats.
    pub widgets: WidgetLink,
}

/// Listening end of the sideband.
#[derive(Debug)]
pub struct Sideband {
    listener: UnixListener,
    path: PathBuf,
}

impl Sideband {
    /// Bind a listener at `path`, replacing a stale socket file.
    pub fn bind(path: &Path) -> Result<Self> {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        let listener = UnixListener::bind(path).map_err(|e| {
            Error::Sideband(format!("failed to bind {}: {e}", path.display()))
        })?;
        Ok(Self {
            listener,
            path: path.to_path_buf(),
        })
    }

    /// Socket path handed to the child.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serve the child's connection until it closes.
    ///
    /// Returns immediately if `exited` fires before the child connects.
    pub async fn serve(self, ctx: SidebandContext, exited: oneshot::Receiver<()>) -> Result<()> {
        let stream = tokio::select! {
            biased;
            accepted = self.listener.accept() => accepted
                .map_err(|e| Error::Sideband(format!("accept failed: {e}")))?
                .0,
            _ = exited => {
                tracing::debug!("child exited without opening the sideband");
                return Ok(());
            }
        };
        tracing::debug!("sideband connected");

        let (mut reader, mut writer) = stream.into_split();
        while let Some(frame) = read_frame(&mut reader).await? {
            handle_frame(frame, &ctx, &mut writer).await?;
        }
        tracing::debug!("sideband closed");
        Ok(())
    }
}

impl Drop for Sideband {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

async fn handle_frame(
    frame: Frame,
    ctx: &SidebandContext,
    writer: &mut OwnedWriteHalf,
) -> Result<()> {
    match frame {
        Frame::Display { mime_type, payload } => {
            tracing::debug!(%mime_type, bytes = payload.len(), "display frame");
            ctx.frontend.publish_display(DisplayData { mime_type, payload });
        }
        Frame::InputRequest { prompt, masked } => {
            let reply = if ctx.allow_input {
                let frontend = ctx.frontend.clone();
                let asked = prompt.clone();
                tokio::task::spawn_blocking(move || frontend.request_input(&asked, masked))
                    .await
                    .map_err(|e| Error::Sideband(format!("input task failed: {e}")))?
                    .map_err(|e| {
                        report(ctx.frontend.as_ref(), &format!("input failed: {e}"));
                    })
                    .ok()
            } else {
                report(
                    ctx.frontend.as_ref(),
                    &format!("program requested input ({prompt:?}) but this submission does not allow input"),
                );
                None
            };
            answer_input(ctx, writer, masked, reply).await?;
        }
        Frame::Heartbeat { ack: false } => {
            write_frame(writer, &Frame::Heartbeat { ack: true }).await?;
        }
        Frame::Heartbeat { ack: true } => {
            let waiting = ctx.widgets.acknowledge();
            tracing::debug!(waiting, "heartbeat acknowledged by child");
        }
        Frame::InputReply { .. } => {
            tracing::warn!("ignoring input-reply frame sent by the child");
        }
    }
    Ok(())
}

/// Deliver an input reply: masked replies as a frame, others on stdin.
///
/// A refused unmasked request closes stdin so the child sees end of input.
async fn answer_input(
    ctx: &SidebandContext,
    writer: &mut OwnedWriteHalf,
    masked: bool,
    reply: Option<String>,
) -> Result<()> {
    if masked {
        return write_frame(writer, &Frame::InputReply { payload: reply }).await;
    }

    let mut slot = ctx.stdin.lock().await;
    match reply {
        Some(mut line) => {
            line.push('\n');
            if let Some(stdin) = slot.as_mut() {
                let written = async {
                    stdin.write_all(line.as_bytes()).await?;
                    stdin.flush().await
                };
                if let Err(e) = written.await {
                    tracing::warn!("failed to write input to child: {e}");
                }
            }
        }
        None => {
            // Dropping the handle closes the pipe.
            slot.take();
        }
    }
    Ok(())
}
