//! Cargo invocation for the scratch crate.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use serde::Deserialize;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

use crate::error::{Error, Result};
use crate::execute::InterruptHandle;

use super::errors::RustcDiagnostic;
use super::synthesizer::BuildMode;

/// Target triple used by wasm mode.
pub const WASM_TARGET: &str = "wasm32-unknown-unknown";

/// Outcome of a `cargo build` / `cargo test --no-run`.
#[derive(Debug, Clone, Default)]
pub struct BuildOutput {
    /// Whether cargo reported success.
    pub success: bool,
    /// Compiler diagnostics, in emission order.
    pub diagnostics: Vec<RustcDiagnostic>,
    /// Executable (or `.wasm` module) produced for the scratch crate.
    pub artifact: Option<PathBuf>,
    /// Cargo's own stderr (progress and non-compiler errors).
    pub log: String,
}

/// Outcome of an auxiliary cargo command such as `cargo add`.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Whether the command exited with status 0.
    pub success: bool,
    /// Captured stdout.
    pub stdout: String,
    /// Captured stderr.
    pub stderr: String,
}

/// Locates and drives `cargo`.
#[derive(Debug, Clone)]
pub struct Toolchain {
    /// Path to cargo.
    cargo: PathBuf,
}

impl Toolchain {
    /// Find cargo through `$CARGO`, then `PATH`.
    pub fn locate() -> Result<Self> {
        if let Some(cargo) = std::env::var_os("CARGO").map(PathBuf::from)
            && cargo.is_file()
        {
            return Ok(Self::with_cargo(cargo));
        }
        which::which("cargo")
            .map(Self::with_cargo)
            .map_err(|_| Error::Toolchain("cargo not found in PATH".to_string()))
    }

    /// Use a specific cargo binary.
    pub fn with_cargo(cargo: PathBuf) -> Self {
        tracing::debug!(cargo = %cargo.display(), "using toolchain");
        Self { cargo }
    }

    /// Get the cargo path.
    pub fn cargo_path(&self) -> &Path {
        &self.cargo
    }

    /// Cargo arguments for a build in `mode` with extra `flags`.
    pub fn build_args(mode: BuildMode, flags: &[String]) -> Vec<String> {
        let mut args: Vec<String> = match mode {
            BuildMode::Run => vec!["build".into()],
            BuildMode::Test => vec!["test".into(), "--no-run".into()],
            BuildMode::Wasm => vec!["build".into(), "--target".into(), WASM_TARGET.into()],
        };
        args.push("--message-format=json".into());
        args.extend(flags.iter().cloned());
        args
    }

    /// Build the crate in `crate_dir`.
    ///
    /// A failed build is a successful call with `success == false`; errors
    /// are reserved for spawning problems and interruption.
    pub async fn build(
        &self,
        crate_dir: &Path,
        mode: BuildMode,
        flags: &[String],
        interrupt: &InterruptHandle,
    ) -> Result<BuildOutput> {
        let args = Self::build_args(mode, flags);
        tracing::debug!(?args, dir = %crate_dir.display(), "cargo build");
        let output = self.run(crate_dir, &args, interrupt).await?;

        let mut build = parse_cargo_output(&output.stdout, mode);
        build.success &= output.success;
        build.log = output.stderr;
        tracing::debug!(
            success = build.success,
            diagnostics = build.diagnostics.len(),
            artifact = ?build.artifact,
            "cargo build finished"
        );
        Ok(build)
    }

    /// Run `cargo add <crates...>` in `crate_dir`.
    pub async fn add(
        &self,
        crate_dir: &Path,
        crates: &[String],
        interrupt: &InterruptHandle,
    ) -> Result<CommandOutput> {
        let mut args = vec!["add".to_string()];
        args.extend(crates.iter().cloned());
        tracing::debug!(?crates, "cargo add");
        self.run(crate_dir, &args, interrupt).await
    }

    /// Run cargo with `args`, capturing its output.
    async fn run(
        &self,
        crate_dir: &Path,
        args: &[String],
        interrupt: &InterruptHandle,
    ) -> Result<CommandOutput> {
        let mut child = Command::new(&self.cargo)
            .args(args)
            .current_dir(crate_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::Toolchain(format!("failed to run {}: {e}", self.cargo.display()))
            })?;
        let _guard = interrupt.attach(child.id());

        let mut stdout = child.stdout.take();
        let mut stderr = child.stderr.take();
        let (out, err) = tokio::join!(read_all(stdout.as_mut()), read_all(stderr.as_mut()));
        let status = child.wait().await?;

        if interrupt.is_interrupted() {
            return Err(Error::Aborted);
        }
        Ok(CommandOutput {
            success: status.success(),
            stdout: out?,
            stderr: err?,
        })
    }
}

async fn read_all<R: tokio::io::AsyncRead + Unpin>(reader: Option<&mut R>) -> Result<String> {
    let mut bytes = Vec::new();
    if let Some(reader) = reader {
        reader.read_to_end(&mut bytes).await?;
    }
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// One line of `cargo --message-format=json` output.
#[derive(Debug, Deserialize)]
#[serde(tag = "reason", rename_all = "kebab-case")]
enum CargoMessage {
    CompilerMessage { message: RustcDiagnostic },
    CompilerArtifact(Artifact),
    BuildFinished { success: bool },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct Artifact {
    target: ArtifactTarget,
    profile: ArtifactProfile,
    #[serde(default)]
    filenames: Vec<PathBuf>,
    executable: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct ArtifactTarget {
    kind: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ArtifactProfile {
    test: bool,
}

/// Collect diagnostics, the artifact and the final status from cargo's JSON stream.
pub fn parse_cargo_output(stdout: &str, mode: BuildMode) -> BuildOutput {
    let mut output = BuildOutput::default();
    for line in stdout.lines().filter(|l| l.starts_with('{')) {
        let message = match serde_json::from_str::<CargoMessage>(line) {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!("skipping cargo message: {e}");
                continue;
            }
        };
        match message {
            CargoMessage::CompilerMessage { message } => output.diagnostics.push(message),
            CargoMessage::CompilerArtifact(artifact) => {
                if !artifact.target.kind.iter().any(|k| k == "bin") {
                    continue;
                }
                let found = match mode {
                    BuildMode::Run => artifact.executable,
                    BuildMode::Test => artifact.executable.filter(|_| artifact.profile.test),
                    BuildMode::Wasm => artifact
                        .filenames
                        .into_iter()
                        .find(|f| f.extension().is_some_and(|e| e == "wasm")),
                };
                if found.is_some() {
                    output.artifact = found;
                }
            }
            CargoMessage::BuildFinished { success } => output.success = success,
            CargoMessage::Other => {}
        }
    }
    output
}
