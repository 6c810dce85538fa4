//! Shell escapes (`!cmd`, `!*cmd`).

use std::path::Path;

use crate::config::KernelConfig;
use crate::error::Result;
use crate::frontend::report;

use super::process::{ChildCommand, ChildExit, ChildIo, StartupPrompt, run_child};

/// Run `command` with the configured shell in `dir`.
///
/// A non-zero exit is reported on stderr; it does not stop the submission.
pub async fn run_shell(
    config: &KernelConfig,
    dir: &Path,
    command: &str,
    io: &ChildIo,
    prompt: Option<StartupPrompt>,
) -> Result<ChildExit> {
    tracing::debug!(%command, dir = %dir.display(), "shell escape");
    let child = ChildCommand::new(&config.shell, dir)
        .args(["-c", command])
        .envs(config.child_env());
    let exit = run_child(&child, io, None, prompt).await?;
    if let ChildExit::Exited(status) = exit
        && !status.success()
    {
        report(io.frontend.as_ref(), &format!("shell command failed: {status}"));
    }
    Ok(exit)
}
