//! Builds one compilable program from the store and the current submission.
//!
//! Layout of `src/main.rs`:
//!
//! ```text
//! #![allow(...)]
//! mod orbit;
//! imports, types, vars/consts, functions     (store order, new ones merged in)
//! fn main() { init blocks; statements; cell main }   (or a #[test] in test mode)
//! the submission's own `fn main`, renamed
//! init block definitions                      (insertion order)
//! ```
//!
//! Statements are not re-indented, so multi-line string literals keep their
//! content and every emitted line maps back to exactly one source line.

use crate::cell::{CELL_MAIN_FN, CodeFragment, ParsedCell};
use crate::error::Result;
use crate::store::{DeclKind, Declaration, DeclarationStore, Snapshot};

/// Name of the test wrapping the submission's statements in test mode.
pub const CELL_TEST_FN: &str = "__orbit_cell_test";

/// Lints silenced for the whole synthesized crate.
const CRATE_ATTRIBUTES: &str =
    "#![allow(unused, non_snake_case, non_camel_case_types, non_upper_case_globals)]";

/// What the scratch crate is built as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildMode {
    /// Native binary with a generated `fn main`.
    #[default]
    Run,
    /// Test harness; the statements become a `#[test]`.
    Test,
    /// `wasm32-unknown-unknown` module.
    Wasm,
}

/// A submission position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourcePosition {
    /// Execution counter of the submission.
    pub origin: u32,
    /// 1-indexed line within that submission.
    pub line: usize,
}

/// Synthesized line -> submission position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineMap {
    /// Index `i` describes synthesized line `i + 1`.
    lines: Vec<Option<SourcePosition>>,
}

impl LineMap {
    /// Position of a 1-indexed synthesized line; `None` for generated lines.
    pub fn lookup(&self, line: usize) -> Option<SourcePosition> {
        line.checked_sub(1)
            .and_then(|index| self.lines.get(index))
            .copied()
            .flatten()
    }

    /// Number of synthesized lines.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether the program is empty.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// A generated program with its line map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedProgram {
    /// Content of `src/main.rs`.
    pub source: String,
    /// Diagnostic line map.
    pub line_map: LineMap,
    /// Build mode the program was generated for.
    pub mode: BuildMode,
    /// Tests to run in test mode; empty runs every test.
    pub tests: Vec<String>,
}

/// Accumulates source text and its line map.
#[derive(Default)]
struct Emitter {
    source: String,
    map: LineMap,
}

impl Emitter {
    /// A generated line.
    fn line(&mut self, text: &str) {
        self.source.push_str(text);
        self.source.push('\n');
        self.map.lines.push(None);
    }

    /// Submission text starting at `first` of submission `origin`.
    fn block(&mut self, text: &str, origin: u32, first: usize) {
        for (offset, line) in text.split('\n').enumerate() {
            self.source.push_str(line);
            self.source.push('\n');
            self.map.lines.push(Some(SourcePosition {
                origin,
                line: first + offset,
            }));
        }
    }

    fn declaration(&mut self, decl: &Declaration) {
        self.block(&decl.source, decl.origin, decl.line);
    }

    fn fragment(&mut self, fragment: &CodeFragment, origin: u32) {
        self.block(&fragment.text, origin, fragment.line);
    }
}

/// Generates programs for one session.
#[derive(Debug, Clone, Copy, Default)]
pub struct Synthesizer;

impl Synthesizer {
    /// Create a synthesizer.
    pub fn new() -> Self {
        Self
    }

    /// Synthesize the program for `cell` (submission `origin`) on top of `store`.
    ///
    /// The store is not modified; a kind conflict is an error.
    pub fn synthesize(
        &self,
        store: &DeclarationStore,
        cell: &ParsedCell,
        origin: u32,
        mode: BuildMode,
    ) -> Result<SynthesizedProgram> {
        let snapshot = store.preview(&cell.declarations)?;
        Ok(self.emit(&snapshot, cell, origin, mode))
    }

    /// Emit the program for a merged snapshot.
    pub fn emit(
        &self,
        snapshot: &Snapshot,
        cell: &ParsedCell,
        origin: u32,
        mode: BuildMode,
    ) -> SynthesizedProgram {
        let mut out = Emitter::default();
        out.line(CRATE_ATTRIBUTES);
        out.line("");
        out.line("mod orbit;");

        for kind in [
            DeclKind::Import,
            DeclKind::Type,
            DeclKind::VarOrConst,
            DeclKind::Function,
        ] {
            let decls = snapshot.of_kind(kind);
            if decls.is_empty() {
                continue;
            }
            out.line("");
            for decl in decls {
                out.declaration(decl);
            }
        }

        let init_calls: Vec<String> = snapshot
            .init_blocks
            .iter()
            .filter_map(Declaration::init_fn_name)
            .collect();

        out.line("");
        match mode {
            BuildMode::Run | BuildMode::Wasm => out.line("fn main() {"),
            BuildMode::Test => {
                out.line("#[cfg(not(test))]");
                out.line("fn main() {}");
                out.line("");
                out.line("#[test]");
                out.line(&format!("fn {CELL_TEST_FN}() {{"));
            }
        }
        for name in &init_calls {
            out.line(&format!("{name}();"));
        }
        for statement in &cell.statements {
            out.fragment(statement, origin);
        }
        if cell.main_fn.is_some() {
            out.line(&format!("{CELL_MAIN_FN}();"));
        }
        out.line("}");

        if let Some(main_fn) = &cell.main_fn {
            out.line("");
            out.fragment(main_fn, origin);
        }

        if !snapshot.init_blocks.is_empty() {
            out.line("");
            for decl in &snapshot.init_blocks {
                out.declaration(decl);
            }
        }

        let tests = if mode == BuildMode::Test {
            select_tests(snapshot, cell)
        } else {
            Vec::new()
        };

        tracing::debug!(
            origin,
            ?mode,
            lines = out.map.len(),
            tests = tests.len(),
            "synthesized program"
        );

        SynthesizedProgram {
            source: out.source,
            line_map: out.map,
            mode,
            tests,
        }
    }
}

/// Tests run by a test-mode submission.
///
/// The submission's own tests, stored tests it names, and the wrapper test
/// when it has statements. An empty selection means every test runs.
fn select_tests(snapshot: &Snapshot, cell: &ParsedCell) -> Vec<String> {
    let mut tests: Vec<String> = cell.test_names().into_iter().map(str::to_string).collect();
    for name in snapshot.test_names() {
        if cell.identifiers.contains(name) && !tests.iter().any(|t| t == name) {
            tests.push(name.to_string());
        }
    }
    if !cell.statements.is_empty() || cell.main_fn.is_some() {
        tests.push(CELL_TEST_FN.to_string());
    }
    tests
}
