//! Submission model and parsing.
//!
//! A submission (one notebook cell) arrives as text lines. The directive
//! preprocessor blanks out the lines it consumes, and what remains is parsed
//! here into declarations (kept across submissions) and bare statements
//! (wrapped into the synthetic entry point).

mod parser;

pub use parser::{CELL_MAIN_FN, CellParser, CodeFragment, ParsedCell};

/// One unit of user code submitted for execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    /// Source lines, without trailing newlines.
    pub lines: Vec<String>,
    /// Execution counter assigned by the front end.
    pub execution_count: u32,
    /// Whether the front end can prompt the user for input during this submission.
    pub allow_input: bool,
}

impl Submission {
    /// Create a submission from cell text.
    pub fn new(code: &str, execution_count: u32) -> Self {
        Self {
            lines: code.lines().map(str::to_string).collect(),
            execution_count,
            allow_input: false,
        }
    }

    /// Allow or forbid interactive input for this submission.
    pub fn with_input(mut self, allow: bool) -> Self {
        self.allow_input = allow;
        self
    }
}
