//! Results of one submission.

use crate::compile::{BuildMode, CompileError};
use crate::store::MergeReport;

/// How a submission ended.
///
/// Every variant is a normal result; [`crate::Error`] is reserved for
/// failures of the engine itself.
#[derive(Debug, Clone)]
pub enum ExecutionOutcome {
    /// The program ran and exited with status 0.
    Completed,
    /// The submission held only directives and shell escapes.
    NothingToRun,
    /// A declaration conflicts with the store; nothing was built.
    Rejected { message: String },
    /// The program did not compile. Diagnostics use submission lines.
    CompileFailed { errors: Vec<CompileError> },
    /// The program compiled and ran but exited unsuccessfully.
    /// `code` is `None` when it was killed by a signal.
    RuntimeFailed { code: Option<i32> },
    /// Interrupted through the kernel's interrupt handle.
    Cancelled,
}

impl ExecutionOutcome {
    /// Whether the submission succeeded.
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            ExecutionOutcome::Completed | ExecutionOutcome::NothingToRun
        )
    }

    /// Short status word for logs and front ends.
    pub fn status(&self) -> &'static str {
        match self {
            ExecutionOutcome::Completed => "ok",
            ExecutionOutcome::NothingToRun => "ok",
            ExecutionOutcome::Rejected { .. } => "rejected",
            ExecutionOutcome::CompileFailed { .. } => "compile-error",
            ExecutionOutcome::RuntimeFailed { .. } => "runtime-error",
            ExecutionOutcome::Cancelled => "cancelled",
        }
    }
}

/// Report of one [`crate::Kernel::execute`] call.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    /// Execution counter of the submission.
    pub execution_count: u32,
    /// Build mode the submission ran in.
    pub mode: BuildMode,
    /// How it ended.
    pub outcome: ExecutionOutcome,
    /// Declarations committed to the store, if the program ran.
    pub committed: Option<MergeReport>,
}

impl ExecutionReport {
    pub(crate) fn new(execution_count: u32, mode: BuildMode, outcome: ExecutionOutcome) -> Self {
        Self {
            execution_count,
            mode,
            outcome,
            committed: None,
        }
    }
}
