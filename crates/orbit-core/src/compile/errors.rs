//! Compiler diagnostics and their mapping back to submissions.

use std::path::PathBuf;

use rustc_hash::FxHashSet;
use serde::Deserialize;

use super::synthesizer::LineMap;

/// File the synthesized program is written to, relative to the scratch crate.
pub const PROGRAM_FILE: &str = "src/main.rs";

/// Error codes that can mean "this crate is not a dependency yet".
const MISSING_CRATE_CODES: [&str; 3] = ["E0432", "E0433", "E0463"];

/// Phrases rustc uses when a path names a crate it cannot find.
const MISSING_CRATE_PHRASES: [&str; 6] = [
    "undeclared crate",
    "unlinked crate",
    "can't find crate",
    "missing crate",
    "no external crate",
    "unresolved module",
];

/// Path roots that never name an external crate.
const BUILTIN_ROOTS: [&str; 8] = [
    "std", "core", "alloc", "crate", "self", "super", "orbit", "proc_macro",
];

/// A compilation error with source location information.
#[derive(Debug, Clone)]
pub struct CompileError {
    /// Error message
    pub message: String,

    /// Error code (e.g., "E0308")
    pub code: Option<String>,

    /// Severity level
    pub level: ErrorLevel,

    /// Primary source location
    pub location: Option<SourceLocation>,

    /// Additional spans (e.g., "help: consider...")
    pub spans: Vec<ErrorSpan>,

    /// Rendered error message (for display)
    pub rendered: Option<String>,
}

/// Severity level of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorLevel {
    Error,
    Warning,
    Note,
    Help,
}

/// A location in source code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    /// Submission the line belongs to; `None` for generated code and other files.
    pub cell: Option<u32>,

    /// File the compiler reported, relative to the scratch crate.
    pub file: PathBuf,

    /// Line number (1-indexed), submission-relative when `cell` is set.
    pub line: usize,

    /// Column number (1-indexed)
    pub column: usize,
}

/// An error span with label.
#[derive(Debug, Clone)]
pub struct ErrorSpan {
    /// Location of this span
    pub location: SourceLocation,

    /// Label for this span
    pub label: Option<String>,

    /// Whether this is the primary span
    pub is_primary: bool,
}

/// Rustc JSON diagnostic format.
#[derive(Debug, Clone, Deserialize)]
pub struct RustcDiagnostic {
    pub message: String,
    pub code: Option<RustcCode>,
    pub level: String,
    pub spans: Vec<RustcSpan>,
    #[serde(default)]
    pub children: Vec<RustcDiagnostic>,
    pub rendered: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RustcCode {
    pub code: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RustcSpan {
    pub file_name: String,
    pub line_start: usize,
    pub line_end: usize,
    pub column_start: usize,
    pub column_end: usize,
    pub is_primary: bool,
    pub label: Option<String>,
}

/// Maps rustc diagnostics on the synthesized program to submission lines.
pub struct ErrorMapper {
    /// Synthesized line -> submission position.
    line_map: LineMap,
}

impl ErrorMapper {
    /// Create a mapper for a synthesized program.
    pub fn new(line_map: LineMap) -> Self {
        Self { line_map }
    }

    /// Map a rustc diagnostic to a CompileError with corrected locations.
    pub fn map_diagnostic(&self, diagnostic: &RustcDiagnostic) -> Option<CompileError> {
        let level = match diagnostic.level.as_str() {
            "error" => ErrorLevel::Error,
            "warning" => ErrorLevel::Warning,
            "note" => ErrorLevel::Note,
            "help" => ErrorLevel::Help,
            _ => return None,
        };

        let location = diagnostic
            .spans
            .iter()
            .find(|s| s.is_primary)
            .map(|span| self.map_location(span));

        let spans = diagnostic
            .spans
            .iter()
            .map(|span| ErrorSpan {
                location: self.map_location(span),
                label: span.label.clone(),
                is_primary: span.is_primary,
            })
            .collect();

        Some(CompileError {
            message: diagnostic.message.clone(),
            code: diagnostic.code.as_ref().map(|c| c.code.clone()),
            level,
            location,
            spans,
            rendered: diagnostic.rendered.clone(),
        })
    }

    /// Map a rustc span to a source location.
    fn map_location(&self, span: &RustcSpan) -> SourceLocation {
        let file = PathBuf::from(&span.file_name);
        let position = (span.file_name == PROGRAM_FILE)
            .then(|| self.line_map.lookup(span.line_start))
            .flatten();
        match position {
            Some(position) => SourceLocation {
                cell: Some(position.origin),
                file,
                line: position.line,
                column: span.column_start,
            },
            None => SourceLocation {
                cell: None,
                file,
                line: span.line_start,
                column: span.column_start,
            },
        }
    }
}

impl CompileError {
    /// Create a simple error with just a message.
    pub fn simple(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
            level: ErrorLevel::Error,
            location: None,
            spans: Vec::new(),
            rendered: None,
        }
    }

    /// Create an error located at a submission line.
    pub fn at_line(message: impl Into<String>, cell: u32, line: usize) -> Self {
        Self {
            location: Some(SourceLocation {
                cell: Some(cell),
                file: PathBuf::from(PROGRAM_FILE),
                line,
                column: 1,
            }),
            ..Self::simple(message)
        }
    }

    /// Whether this is an error (not a warning or note).
    pub fn is_error(&self) -> bool {
        self.level == ErrorLevel::Error
    }

    /// Format the error for terminal display.
    pub fn format_terminal(&self) -> String {
        let mut output = String::new();

        let level_str = match self.level {
            ErrorLevel::Error => "\x1b[1;31merror\x1b[0m",
            ErrorLevel::Warning => "\x1b[1;33mwarning\x1b[0m",
            ErrorLevel::Note => "\x1b[1;36mnote\x1b[0m",
            ErrorLevel::Help => "\x1b[1;32mhelp\x1b[0m",
        };

        if let Some(code) = &self.code {
            output.push_str(&format!("{level_str}[{code}]: {}\n", self.message));
        } else {
            output.push_str(&format!("{level_str}: {}\n", self.message));
        }

        if let Some(loc) = &self.location {
            output.push_str(&format!("  \x1b[1;34m-->\x1b[0m {}\n", loc.describe()));
        }
        for span in &self.spans {
            if let Some(label) = &span.label
                && !label.is_empty()
            {
                output.push_str(&format!("   {}: {label}\n", span.location.describe()));
            }
        }

        output
    }
}

impl SourceLocation {
    /// `cell[N]:line:column` for submission code, `file:line:column` otherwise.
    pub fn describe(&self) -> String {
        match self.cell {
            Some(cell) => format!("cell[{cell}]:{}:{}", self.line, self.column),
            None => format!("{}:{}:{}", self.file.display(), self.line, self.column),
        }
    }
}

/// Crates the diagnostics report as missing dependencies.
///
/// Only E0432/E0433/E0463 errors whose text names an undeclared or unlinked
/// crate count. Builtin roots and identifiers in `local` are skipped.
pub fn missing_crates(
    diagnostics: &[RustcDiagnostic],
    local: &FxHashSet<String>,
) -> Vec<String> {
    let mut crates = Vec::new();
    for diagnostic in diagnostics {
        if diagnostic.level != "error" {
            continue;
        }
        let Some(code) = diagnostic.code.as_ref().map(|c| c.code.as_str()) else {
            continue;
        };
        if !MISSING_CRATE_CODES.contains(&code) {
            continue;
        }

        let mut text = diagnostic.message.clone();
        for span in &diagnostic.spans {
            if let Some(label) = &span.label {
                text.push('\n');
                text.push_str(label);
            }
        }
        for child in &diagnostic.children {
            text.push('\n');
            text.push_str(&child.message);
        }
        if code != "E0463" && !MISSING_CRATE_PHRASES.iter().any(|p| text.contains(p)) {
            continue;
        }

        let Some(name) = first_quoted_root(&diagnostic.message) else {
            continue;
        };
        if BUILTIN_ROOTS.contains(&name.as_str())
            || local.contains(&name)
            || crates.contains(&name)
        {
            continue;
        }
        crates.push(name);
    }
    crates
}

/// First path root quoted in backticks: "unresolved import `rand::Rng`" -> `rand`.
fn first_quoted_root(message: &str) -> Option<String> {
    let start = message.find('`')? + 1;
    let len = message[start..].find('`')?;
    let path = message[start..start + len].trim_start_matches("::");
    let root = path.split("::").next()?.trim();
    let valid = !root.is_empty()
        && root
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        && !root.starts_with(|c: char| c.is_ascii_digit());
    valid.then(|| root.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::{CellParser, ParsedCell};
    use crate::compile::{BuildMode, Synthesizer};
    use crate::store::DeclarationStore;

    fn diagnostic(json: &str) -> RustcDiagnostic {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_parse_rustc_json() {
        let json = r#"{"message":"expected type, found `42`","code":{"code":"E0573"},"level":"error","spans":[{"file_name":"src/orbit.rs","line_start":5,"line_end":5,"column_start":10,"column_end":12,"is_primary":true,"label":"expected type"}],"rendered":"error[E0573]: expected type, found `42`"}"#;

        let mapper = ErrorMapper::new(LineMap::default());
        let error = mapper.map_diagnostic(&diagnostic(json)).unwrap();

        assert_eq!(error.code, Some("E0573".to_string()));
        assert_eq!(error.level, ErrorLevel::Error);
        let location = error.location.as_ref().unwrap();
        assert_eq!(location.cell, None);
        assert_eq!(location.line, 5);
    }

    #[test]
    fn test_error_maps_to_submission_line() {
        let mut store = DeclarationStore::new();
        let first = CellParser::new("fn incr(x: i64) -> i64 {\n    x + 1\n}", 1)
            .parse()
            .unwrap();
        store.merge(first.declarations).unwrap();
        let cell: ParsedCell = CellParser::new("let a = 1;\n\nlet b: String = incr(a);", 2)
            .parse()
            .unwrap();
        let program = Synthesizer::new()
            .synthesize(&store, &cell, 2, BuildMode::Run)
            .unwrap();
        let generated = program
            .source
            .lines()
            .position(|l| l.starts_with("let b"))
            .unwrap()
            + 1;

        let json = format!(
            r#"{{"message":"mismatched types","code":{{"code":"E0308"}},"level":"error","spans":[{{"file_name":"src/main.rs","line_start":{generated},"line_end":{generated},"column_start":17,"column_end":24,"is_primary":true,"label":"expected `String`, found `i64`"}}],"rendered":null}}"#
        );
        let error = ErrorMapper::new(program.line_map)
            .map_diagnostic(&diagnostic(&json))
            .unwrap();
        let location = error.location.as_ref().unwrap();
        assert_eq!(location.cell, Some(2));
        assert_eq!(location.line, 3);
        assert_eq!(location.column, 17);
        assert!(error.format_terminal().contains("cell[2]:3:17"));
    }

    #[test]
    fn test_error_format() {
        let error = CompileError::at_line("test error", 4, 10);
        let formatted = error.format_terminal();
        assert!(formatted.contains("error"));
        assert!(formatted.contains("cell[4]:10:1"));
        assert_eq!(error.location.as_ref().unwrap().cell, Some(4));
    }

    #[test]
    fn test_missing_crates_classifier() {
        let local: FxHashSet<String> = ["mymod".to_string()].into_iter().collect();
        let diagnostics = vec![
            diagnostic(
                r#"{"message":"unresolved import `rand`","code":{"code":"E0432"},"level":"error","spans":[{"file_name":"src/main.rs","line_start":3,"line_end":3,"column_start":5,"column_end":9,"is_primary":true,"label":"use of unresolved module or unlinked crate `rand`"}],"rendered":null}"#,
            ),
            diagnostic(
                r#"{"message":"failed to resolve: use of undeclared crate or module `serde_json`","code":{"code":"E0433"},"level":"error","spans":[],"rendered":null}"#,
            ),
            diagnostic(
                r#"{"message":"failed to resolve: use of undeclared crate or module `mymod`","code":{"code":"E0433"},"level":"error","spans":[],"rendered":null}"#,
            ),
            diagnostic(
                r#"{"message":"unresolved import `std::nope`","code":{"code":"E0432"},"level":"error","spans":[{"file_name":"src/main.rs","line_start":3,"line_end":3,"column_start":5,"column_end":9,"is_primary":true,"label":"could not find `nope` in `std`"}],"rendered":null}"#,
            ),
            diagnostic(
                r#"{"message":"can't find crate for `regex`","code":{"code":"E0463"},"level":"error","spans":[],"rendered":null}"#,
            ),
            diagnostic(
                r#"{"message":"mismatched types","code":{"code":"E0308"},"level":"error","spans":[],"rendered":null}"#,
            ),
        ];
        assert_eq!(
            missing_crates(&diagnostics, &local),
            vec!["rand", "serde_json", "regex"]
        );
    }

    #[test]
    fn test_unresolved_item_in_existing_crate_is_not_missing() {
        let diagnostics = vec![diagnostic(
            r#"{"message":"unresolved import `serde::Nope`","code":{"code":"E0432"},"level":"error","spans":[{"file_name":"src/main.rs","line_start":3,"line_end":3,"column_start":5,"column_end":9,"is_primary":true,"label":"no `Nope` in the root"}],"rendered":null}"#,
        )];
        assert!(missing_crates(&diagnostics, &FxHashSet::default()).is_empty());
    }
}
