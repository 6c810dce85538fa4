//! The kernel: one session of accumulated declarations and its scratch crate.
//!
//! # Pipeline
//!
//! ```text
//! Submission
//!     │
//!     ├── preprocess ──► directives / shell escapes (applied in order)
//!     │
//!     └── residual code
//!             │
//!             ├── CellParser ──► declarations + bare statements
//!             ├── Synthesizer ──► src/main.rs + line map
//!             ├── Toolchain::build (one `cargo add` retry for missing crates)
//!             ├── run_child ──► stdout / stderr / sideband
//!             └── DeclarationStore::merge on normal exit
//! ```

mod directives;
mod outcome;

pub use outcome::{ExecutionOutcome, ExecutionReport};

use std::path::Path;
use std::sync::Arc;

use rustc_hash::FxHashSet;

use crate::cell::{CellParser, ParsedCell, Submission};
use crate::compile::{
    BuildMode, BuildOutput, CompileError, ErrorMapper, Manifest, ManifestConfig,
    SynthesizedProgram, Synthesizer, Toolchain, missing_crates,
};
use crate::config::KernelConfig;
use crate::directive::{Command, DirectiveRegistry, preprocess};
use crate::error::{Error, Result};
use crate::execute::{
    ChildCommand, ChildExit, ChildIo, InterruptHandle, Session, SessionState, run_child,
    stage_wasm,
};
use crate::frontend::{Frontend, report};
use crate::ipc::Sideband;
use crate::paths::ScratchDir;
use crate::store::DeclarationStore;
use crate::tracked::TrackedPaths;
use crate::widgets::WidgetLink;

/// Settings that apply to the current submission only.
#[derive(Debug, Clone, Default)]
pub(crate) struct SubmissionOptions {
    pub run_args: Vec<String>,
    pub mode: BuildMode,
    pub test_args: Vec<String>,
    /// Input flag for the next shell escape; `Some(true)` is masked.
    pub shell_input: Option<bool>,
}

/// Incremental compile-and-run engine.
///
/// Owns the declaration store, tracked paths and scratch crate of one
/// session. `execute` takes `&mut self`, so submissions are serialized.
pub struct Kernel {
    config: KernelConfig,
    store: DeclarationStore,
    tracked: TrackedPaths,
    registry: DirectiveRegistry,
    synthesizer: Synthesizer,
    toolchain: Toolchain,
    manifest: Manifest,
    interrupt: InterruptHandle,
    widgets: WidgetLink,
    session: Session,
    // Dropped last: removes the scratch directory.
    scratch: ScratchDir,
}

impl std::fmt::Debug for Kernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Kernel")
            .field("scratch", &self.scratch.root())
            .field("declarations", &self.store.len())
            .field("state", &self.session.state())
            .finish()
    }
}

impl Kernel {
    /// Create a kernel, locating cargo on the way.
    ///
    /// # Errors
    /// Fatal [`Error::Toolchain`] or [`Error::Workspace`] errors.
    pub fn new(config: KernelConfig) -> Result<Self> {
        Self::with_toolchain(config, Toolchain::locate()?)
    }

    /// Create a kernel driving a specific toolchain.
    pub fn with_toolchain(config: KernelConfig, toolchain: Toolchain) -> Result<Self> {
        let scratch = ScratchDir::create(&config.scratch_root, config.keep_scratch)?;
        let name = scratch.package_name();
        let manifest = Manifest::create(
            scratch.root(),
            &ManifestConfig {
                name: &name,
                ..Default::default()
            },
        )?;
        tracing::info!(scratch = %scratch.root().display(), "kernel started");

        Ok(Self {
            config,
            store: DeclarationStore::new(),
            tracked: TrackedPaths::new(),
            registry: DirectiveRegistry::new(),
            synthesizer: Synthesizer::new(),
            toolchain,
            manifest,
            interrupt: InterruptHandle::new(),
            widgets: WidgetLink::new(),
            session: Session::new(),
            scratch,
        })
    }

    /// Current configuration, including directive changes.
    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// Accumulated declarations.
    pub fn store(&self) -> &DeclarationStore {
        &self.store
    }

    /// Paths registered for rust-analyzer.
    pub fn tracked_paths(&self) -> &TrackedPaths {
        &self.tracked
    }

    /// The scratch crate.
    pub fn scratch(&self) -> &ScratchDir {
        &self.scratch
    }

    /// Directive registry, for registering extra directives.
    pub fn registry_mut(&mut self) -> &mut DirectiveRegistry {
        &mut self.registry
    }

    /// State of the current session.
    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    /// Handle that interrupts the running submission from anywhere.
    pub fn interrupt_handle(&self) -> InterruptHandle {
        self.interrupt.clone()
    }

    /// The widget link of this kernel.
    pub fn widget_link(&self) -> &WidgetLink {
        &self.widgets
    }

    /// Run one submission.
    ///
    /// Directives and shell escapes run first, in order; then the residual
    /// code is built and run. Output goes to `frontend` as it is produced.
    ///
    /// # Errors
    /// Only engine failures; compile errors, conflicts, runtime failures and
    /// cancellation are [`ExecutionOutcome`]s.
    pub async fn execute(
        &mut self,
        submission: &Submission,
        frontend: Arc<dyn Frontend>,
    ) -> Result<ExecutionReport> {
        self.interrupt.reset();
        let result = self.run_submission(submission, &frontend).await;
        match &result {
            Ok(report) => tracing::debug!(
                count = submission.execution_count,
                status = report.outcome.status(),
                "submission finished"
            ),
            Err(e) => tracing::warn!(count = submission.execution_count, "submission failed: {e}"),
        }
        self.session.finish();
        result
    }

    async fn run_submission(
        &mut self,
        submission: &Submission,
        frontend: &Arc<dyn Frontend>,
    ) -> Result<ExecutionReport> {
        let count = submission.execution_count;
        let mut options = SubmissionOptions::default();
        self.session.advance(SessionState::Preparing);

        let preprocessed = preprocess(&submission.lines);
        for command in &preprocessed.commands {
            if self.interrupt.is_interrupted() {
                self.session.advance(SessionState::Cancelled);
                return Ok(ExecutionReport::new(count, options.mode, ExecutionOutcome::Cancelled));
            }
            let applied = match command {
                Command::Directive { name, args, .. } => {
                    self.apply_directive(name, args, submission, &mut options, frontend)
                        .await
                }
                Command::Shell {
                    command,
                    in_scratch,
                    ..
                } => {
                    self.shell_escape(command, *in_scratch, submission, &mut options, frontend)
                        .await
                }
                Command::WriteFile { args, body, .. } => self.write_file(args, body, frontend),
            };
            match applied {
                Ok(()) => {}
                Err(Error::Aborted) => {
                    self.session.advance(SessionState::Cancelled);
                    return Ok(ExecutionReport::new(count, options.mode, ExecutionOutcome::Cancelled));
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    tracing::debug!(line = command.line(), "command failed: {e}");
                    report(frontend.as_ref(), &e.with_hint());
                }
            }
        }

        let mode = options.mode;
        let cell = match CellParser::new(&preprocessed.code, count).parse() {
            Ok(cell) => cell,
            Err(Error::Parse { line, message }) => {
                let error = CompileError::at_line(message, count, line);
                report(frontend.as_ref(), &error.format_terminal());
                self.session.advance(SessionState::CompileFailed);
                return Ok(ExecutionReport::new(
                    count,
                    mode,
                    ExecutionOutcome::CompileFailed {
                        errors: vec![error],
                    },
                ));
            }
            Err(e) => return Err(e),
        };
        if !cell.has_code() && mode != BuildMode::Test {
            return Ok(ExecutionReport::new(count, mode, ExecutionOutcome::NothingToRun));
        }

        let program = match self.synthesizer.synthesize(&self.store, &cell, count, mode) {
            Ok(program) => program,
            Err(e @ Error::Conflict { .. }) => {
                report(frontend.as_ref(), &e.with_hint());
                return Ok(ExecutionReport::new(
                    count,
                    mode,
                    ExecutionOutcome::Rejected {
                        message: e.to_string(),
                    },
                ));
            }
            Err(e) => return Err(e),
        };
        self.scratch.write_program(&program.source)?;
        self.auto_track();

        self.session.advance(SessionState::Compiling);
        let build = match self.compile(&program, &cell, frontend).await {
            Ok(build) => build,
            Err(Error::Aborted) => {
                self.session.advance(SessionState::Cancelled);
                return Ok(ExecutionReport::new(count, mode, ExecutionOutcome::Cancelled));
            }
            Err(e) => return Err(e),
        };
        if !build.success {
            let errors = compile_errors(&program, &build);
            for error in &errors {
                report(frontend.as_ref(), &error.format_terminal());
            }
            self.session.advance(SessionState::CompileFailed);
            return Ok(ExecutionReport::new(
                count,
                mode,
                ExecutionOutcome::CompileFailed { errors },
            ));
        }
        self.session.advance(SessionState::Compiled);
        let artifact = build.artifact.ok_or_else(|| {
            Error::Compilation("cargo reported success but produced no artifact".to_string())
        })?;

        if mode == BuildMode::Wasm {
            let staged = stage_wasm(&artifact, &self.config.work_dir)?;
            frontend.publish_display(staged.display());
            let mut result = ExecutionReport::new(count, mode, ExecutionOutcome::Completed);
            result.committed = Some(self.store.merge(cell.declarations)?);
            self.session.advance(SessionState::Completed);
            return Ok(result);
        }

        let args = program_args(&options, &program);
        let exit = self.spawn(&artifact, args, submission, frontend).await?;
        let status = match exit {
            ChildExit::Cancelled => {
                self.session.advance(SessionState::Cancelled);
                return Ok(ExecutionReport::new(count, mode, ExecutionOutcome::Cancelled));
            }
            ChildExit::Exited(status) => status,
        };

        // The program compiled and ran: its declarations are committed even
        // when it exits unsuccessfully.
        let committed = self.store.merge(cell.declarations)?;
        let outcome = if status.success() {
            self.session.advance(SessionState::Completed);
            ExecutionOutcome::Completed
        } else {
            self.session.advance(SessionState::Failed);
            ExecutionOutcome::RuntimeFailed {
                code: status.code(),
            }
        };
        let mut result = ExecutionReport::new(count, mode, outcome);
        result.committed = Some(committed);
        Ok(result)
    }

    /// Build the scratch crate, fetching missing crates once when enabled.
    async fn compile(
        &mut self,
        program: &SynthesizedProgram,
        cell: &ParsedCell,
        frontend: &Arc<dyn Frontend>,
    ) -> Result<BuildOutput> {
        let root = self.scratch.root().to_path_buf();
        let build = self
            .toolchain
            .build(&root, program.mode, &self.config.build_flags, &self.interrupt)
            .await?;
        if build.success || !self.config.auto_fetch {
            return Ok(build);
        }

        let local = self.local_names(cell);
        let crates = missing_crates(&build.diagnostics, &local);
        if crates.is_empty() {
            return Ok(build);
        }
        report(
            frontend.as_ref(),
            &format!("Fetching missing crates: {}", crates.join(", ")),
        );
        let added = self.toolchain.add(&root, &crates, &self.interrupt).await?;
        if !added.success {
            report(frontend.as_ref(), added.stderr.trim_end());
            return Ok(build);
        }
        self.auto_track();
        self.toolchain
            .build(&root, program.mode, &self.config.build_flags, &self.interrupt)
            .await
    }

    /// Names declared locally, which can never be missing crates.
    fn local_names(&self, cell: &ParsedCell) -> FxHashSet<String> {
        self.store
            .snapshot()
            .iter()
            .chain(cell.declarations.iter())
            .filter_map(|d| d.id.clone())
            .collect()
    }

    async fn spawn(
        &mut self,
        artifact: &Path,
        args: Vec<String>,
        submission: &Submission,
        frontend: &Arc<dyn Frontend>,
    ) -> Result<ChildExit> {
        self.session.advance(SessionState::Spawning);
        let sideband = Sideband::bind(&self.scratch.socket_path())?;
        let command = ChildCommand::new(artifact, &self.config.work_dir)
            .args(args)
            .envs(self.config.child_env());
        let io = self.child_io(submission, frontend);

        self.session.advance(SessionState::Running);
        run_child(&command, &io, Some(sideband), None).await
    }

    fn child_io(&self, submission: &Submission, frontend: &Arc<dyn Frontend>) -> ChildIo {
        ChildIo {
            frontend: frontend.clone(),
            interrupt: self.interrupt.clone(),
            widgets: self.widgets.clone(),
            allow_input: submission.allow_input,
        }
    }

    /// Track the path dependencies of a changed manifest.
    fn auto_track(&mut self) {
        match self.manifest.poll_path_dependencies() {
            Ok(Some(paths)) => {
                for path in paths {
                    self.tracked.insert(path);
                }
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("failed to scan manifest: {e}"),
        }
    }
}

/// Arguments of the program: run args, then test selection in test mode.
fn program_args(options: &SubmissionOptions, program: &SynthesizedProgram) -> Vec<String> {
    let mut args = options.run_args.clone();
    if program.mode == BuildMode::Test {
        args.extend(options.test_args.iter().cloned());
        if !program.tests.is_empty() {
            args.push("--exact".to_string());
            args.extend(program.tests.iter().cloned());
        }
    }
    args
}

/// Errors of a failed build, on submission lines.
fn compile_errors(program: &SynthesizedProgram, build: &BuildOutput) -> Vec<CompileError> {
    let mapper = ErrorMapper::new(program.line_map.clone());
    let errors: Vec<CompileError> = build
        .diagnostics
        .iter()
        .filter_map(|d| mapper.map_diagnostic(d))
        .filter(|e| e.is_error() && !e.message.starts_with("aborting due to"))
        .collect();
    if !errors.is_empty() {
        return errors;
    }
    // Failures outside rustc (bad flags, network) only show up in cargo's log.
    let log = build
        .log
        .lines()
        .filter(|l| l.trim_start().starts_with("error"))
        .collect::<Vec<_>>()
        .join("\n");
    let message = if log.is_empty() {
        "build failed".to_string()
    } else {
        log
    };
    vec![CompileError::simple(message)]
}
