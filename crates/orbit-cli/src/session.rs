//! Kernel setup shared by `orbit run` and `orbit repl`.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use orbit_core::{ExecutionOutcome, ExecutionReport, Frontend, Kernel, KernelConfig, Submission};

use crate::colors;
use crate::console::Console;

/// Options common to every subcommand that starts a kernel.
#[derive(Debug, Clone, Default)]
pub struct KernelOptions {
    pub work_dir: Option<PathBuf>,
    pub keep_scratch: bool,
    pub no_autofetch: bool,
    pub no_input: bool,
}

impl KernelOptions {
    fn config(&self) -> anyhow::Result<KernelConfig> {
        let mut config = KernelConfig::from_env();
        if let Some(dir) = &self.work_dir {
            let dir = dir
                .canonicalize()
                .with_context(|| format!("Working directory not found: {}", dir.display()))?;
            config = config.with_work_dir(dir);
        }
        if self.keep_scratch {
            config = config.with_keep_scratch(true);
        }
        if self.no_autofetch {
            config = config.with_auto_fetch(false);
        }
        Ok(config)
    }
}

/// A kernel wired to the terminal.
pub struct ConsoleSession {
    kernel: Kernel,
    frontend: Arc<dyn Frontend>,
    allow_input: bool,
    count: u32,
}

impl ConsoleSession {
    /// Start a kernel and forward Ctrl-C to its interrupt handle.
    pub fn start(options: &KernelOptions) -> anyhow::Result<Self> {
        let kernel = Kernel::new(options.config()?)?;
        if options.keep_scratch {
            eprintln!(
                "{}Scratch workspace: {}{}",
                colors::DIM,
                kernel.scratch().root().display(),
                colors::RESET
            );
        }

        let handle = kernel.interrupt_handle();
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                tracing::debug!("interrupt requested");
                handle.interrupt();
            }
        });

        Ok(Self {
            kernel,
            frontend: Arc::new(Console::new()),
            allow_input: !options.no_input,
            count: 0,
        })
    }

    /// Execution count the next cell will get.
    pub fn next_count(&self) -> u32 {
        self.count + 1
    }

    /// Execute one cell.
    ///
    /// Fatal kernel errors are returned; everything else is in the report.
    pub async fn execute(&mut self, code: &str) -> orbit_core::Result<ExecutionReport> {
        self.count += 1;
        let submission = Submission::new(code, self.count).with_input(self.allow_input);
        self.kernel
            .execute(&submission, Arc::clone(&self.frontend))
            .await
    }
}

/// One-line summary of a failed outcome.
pub fn describe_failure(outcome: &ExecutionOutcome) -> Option<String> {
    let text = match outcome {
        ExecutionOutcome::Completed | ExecutionOutcome::NothingToRun => return None,
        ExecutionOutcome::Rejected { message } => format!("rejected: {message}"),
        ExecutionOutcome::CompileFailed { errors } => {
            let count = errors.iter().filter(|e| e.is_error()).count().max(1);
            let plural = if count == 1 { "" } else { "s" };
            format!("could not compile due to {count} error{plural}")
        }
        ExecutionOutcome::RuntimeFailed { code: Some(code) } => {
            format!("program exited with status {code}")
        }
        ExecutionOutcome::RuntimeFailed { code: None } => {
            "program was killed by a signal".to_string()
        }
        ExecutionOutcome::Cancelled => "interrupted".to_string(),
    };
    Some(text)
}
