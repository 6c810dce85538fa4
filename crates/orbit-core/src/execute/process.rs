//! Child process runner.
//!
//! A child runs in its own process group with stdout, stderr and (for cell
//! programs) the sideband drained by three concurrent readers. The runner
//! returns only after all of them have finished.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::process::Command;
use tokio::sync::{Mutex, oneshot};

use crate::config::ENV_SIDEBAND;
use crate::error::{Error, Result};
use crate::frontend::{Frontend, StreamKind, report};
use crate::ipc::{Sideband, SidebandContext, StdinSlot};
use crate::widgets::WidgetLink;

use super::context::InterruptHandle;

const CHUNK_SIZE: usize = 8 * 1024;

/// A process to spawn.
#[derive(Debug, Clone)]
pub struct ChildCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub work_dir: PathBuf,
    pub env: Vec<(String, String)>,
}

impl ChildCommand {
    /// Run `program` in `work_dir` with no arguments.
    pub fn new(program: impl Into<PathBuf>, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            work_dir: work_dir.into(),
            env: Vec::new(),
        }
    }

    /// Append arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Add environment variables.
    pub fn envs(mut self, env: Vec<(String, String)>) -> Self {
        self.env.extend(env);
        self
    }
}

/// Input prompt shown once the child has had time to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartupPrompt {
    pub masked: bool,
    pub delay: Duration,
}

/// How a child ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildExit {
    /// The child exited on its own (or was killed by something else).
    Exited(ExitStatus),
    /// The child was killed through the [`InterruptHandle`].
    Cancelled,
}

/// Everything a running child talks to.
#[derive(Clone)]
pub struct ChildIo {
    pub frontend: Arc<dyn Frontend>,
    pub interrupt: InterruptHandle,
    pub widgets: WidgetLink,
    /// Whether the child may ask for input.
    pub allow_input: bool,
}

/// Spawn `command` and stream its output until it exits.
///
/// With a `sideband`, its socket path is exported in `ORBIT_SIDEBAND` and
/// frames are served while the child runs. Without input (no sideband
/// input allowed and no `prompt`), stdin is closed right away.
pub async fn run_child(
    command: &ChildCommand,
    io: &ChildIo,
    sideband: Option<Sideband>,
    prompt: Option<StartupPrompt>,
) -> Result<ChildExit> {
    let mut cmd = Command::new(&command.program);
    cmd.args(&command.args)
        .current_dir(&command.work_dir)
        .envs(command.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .process_group(0)
        .kill_on_drop(true);
    if let Some(sideband) = &sideband {
        cmd.env(ENV_SIDEBAND, sideband.path());
    }

    tracing::debug!(program = %command.program.display(), args = ?command.args, "spawning child");
    let mut child = cmd.spawn().map_err(|e| {
        Error::Execution(format!("failed to start {}: {e}", command.program.display()))
    })?;
    let _guard = io.interrupt.attach(child.id());

    let wants_input = prompt.is_some() || (sideband.is_some() && io.allow_input);
    let stdin = child
        .stdin
        .take()
        .filter(|_| wants_input)
        .map(|s| Box::new(s) as Box<dyn AsyncWrite + Send + Unpin>);
    let stdin: StdinSlot = Arc::new(Mutex::new(stdin));

    let stdout = pump(child.stdout.take(), StreamKind::Stdout, io.frontend.as_ref());
    let stderr = pump(child.stderr.take(), StreamKind::Stderr, io.frontend.as_ref());

    let (exited_tx, exited_rx) = oneshot::channel();
    let side = async {
        let Some(sideband) = sideband else {
            return Ok(());
        };
        let ctx = SidebandContext {
            frontend: io.frontend.clone(),
            stdin: stdin.clone(),
            allow_input: io.allow_input,
            widgets: io.widgets.clone(),
        };
        sideband.serve(ctx, exited_rx).await
    };

    let waiter = async {
        let status = match prompt {
            Some(prompt) => {
                let scripted = prompt_on_start(prompt, io.frontend.clone(), stdin.clone());
                tokio::select! {
                    status = child.wait() => status,
                    () = scripted => child.wait().await,
                }
            }
            None => child.wait().await,
        };
        let _ = exited_tx.send(());
        status
    };

    let (status, out, err, side) = tokio::join!(waiter, stdout, stderr, side);
    if let Err(e) = out.and(err) {
        tracing::warn!("failed to read child output: {e}");
    }
    if let Err(e) = side {
        tracing::error!("sideband reader stopped: {e}");
        report(io.frontend.as_ref(), &format!("display channel closed: {e}"));
    }
    let status = status?;

    if io.interrupt.is_interrupted() {
        tracing::debug!("child cancelled");
        return Ok(ChildExit::Cancelled);
    }
    tracing::debug!(%status, "child exited");
    Ok(ChildExit::Exited(status))
}

/// Forward a stream to the front end chunk by chunk.
async fn pump<R: AsyncRead + Unpin>(
    reader: Option<R>,
    kind: StreamKind,
    frontend: &dyn Frontend,
) -> Result<()> {
    let Some(mut reader) = reader else {
        return Ok(());
    };
    let mut buf = vec![0u8; CHUNK_SIZE];
    let mut decoder = Utf8Carry::default();
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        let text = decoder.push(&buf[..n]);
        if !text.is_empty() {
            frontend.publish_stream(kind, &text);
        }
    }
    let rest = decoder.finish();
    if !rest.is_empty() {
        frontend.publish_stream(kind, &rest);
    }
    tracing::debug!(stream = kind.name(), "child stream closed");
    Ok(())
}

/// Wait for the child to start, ask for one line and feed it to stdin.
async fn prompt_on_start(prompt: StartupPrompt, frontend: Arc<dyn Frontend>, stdin: StdinSlot) {
    tokio::time::sleep(prompt.delay).await;

    let asked = frontend.clone();
    let masked = prompt.masked;
    let reply = match tokio::task::spawn_blocking(move || asked.request_input("", masked)).await {
        Ok(Ok(line)) => Some(line),
        Ok(Err(e)) => {
            report(frontend.as_ref(), &format!("input failed: {e}"));
            None
        }
        Err(e) => {
            tracing::warn!("input task failed: {e}");
            None
        }
    };

    let mut slot = stdin.lock().await;
    if let (Some(mut line), Some(writer)) = (reply, slot.as_mut()) {
        line.push('\n');
        let written = async {
            writer.write_all(line.as_bytes()).await?;
            writer.flush().await
        };
        if let Err(e) = written.await {
            tracing::warn!("failed to write input to child: {e}");
        }
    }
    slot.take();
}

/// Decodes UTF-8 across chunk boundaries.
///
/// An incomplete trailing sequence is held back until the next chunk;
/// invalid bytes become U+FFFD.
#[derive(Debug, Default)]
struct Utf8Carry {
    pending: Vec<u8>,
}

impl Utf8Carry {
    fn push(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut out = String::new();
        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(text) => {
                    out.push_str(text);
                    self.pending.clear();
                    break;
                }
                Err(e) => {
                    let valid = e.valid_up_to();
                    out.push_str(std::str::from_utf8(&self.pending[..valid]).unwrap_or_default());
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid + len);
                        }
                        None => {
                            self.pending.drain(..valid);
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    fn finish(&mut self) -> String {
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        rest
    }
}
