//! Declaration types shared by the parser, the store and the synthesizer.

use std::fmt;

/// Kind of a top-level declaration.
///
/// The order of the variants is the order in which kinds appear in a
/// synthesized program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DeclKind {
    /// `use` / `extern crate`.
    Import,
    /// struct, enum, union, trait, type alias, mod, impl block.
    Type,
    /// `const` / `static`.
    VarOrConst,
    /// `fn` and `macro_rules!`.
    Function,
    /// `fn init()` / `fn init_<name>()`, run before the entry point body.
    InitBlock,
}

impl DeclKind {
    /// All kinds, in synthesis order.
    pub const ALL: [DeclKind; 5] = [
        DeclKind::Import,
        DeclKind::Type,
        DeclKind::VarOrConst,
        DeclKind::Function,
        DeclKind::InitBlock,
    ];

    /// Human-readable label, used in listings and conflict messages.
    pub fn label(self) -> &'static str {
        match self {
            DeclKind::Import => "import",
            DeclKind::Type => "type",
            DeclKind::VarOrConst => "var/const",
            DeclKind::Function => "function",
            DeclKind::InitBlock => "init block",
        }
    }
}

impl fmt::Display for DeclKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A top-level declaration retained across submissions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    /// Identifier; `None` only for anonymous init blocks.
    pub id: Option<String>,
    /// Declaration kind.
    pub kind: DeclKind,
    /// Source text, exactly as it will be emitted.
    pub source: String,
    /// Execution counter of the submission that introduced this text.
    pub origin: u32,
    /// 1-indexed line of the first source line within its submission.
    pub line: usize,
    /// Whether this is a `#[test]` function.
    pub is_test: bool,
}

impl Declaration {
    /// Create a named declaration.
    pub fn new(
        id: impl Into<String>,
        kind: DeclKind,
        source: impl Into<String>,
        origin: u32,
        line: usize,
    ) -> Self {
        Self {
            id: Some(id.into()),
            kind,
            source: source.into(),
            origin,
            line,
            is_test: false,
        }
    }

    /// Create an anonymous init block.
    pub fn anonymous_init(source: impl Into<String>, origin: u32, line: usize) -> Self {
        Self {
            id: None,
            kind: DeclKind::InitBlock,
            source: source.into(),
            origin,
            line,
            is_test: false,
        }
    }

    /// Mark the declaration as a `#[test]` function.
    pub fn with_test(mut self, is_test: bool) -> Self {
        self.is_test = is_test;
        self
    }

    /// Identifier, or a placeholder for anonymous init blocks.
    pub fn display_name(&self) -> &str {
        self.id.as_deref().unwrap_or("<anonymous init>")
    }

    /// Generated function name an init block is emitted under.
    pub fn init_fn_name(&self) -> Option<String> {
        if self.kind != DeclKind::InitBlock {
            return None;
        }
        Some(
            self.id
                .clone()
                .unwrap_or_else(|| anonymous_init_name(self.origin, self.line)),
        )
    }
}

/// Stable name for an anonymous init block defined at `line` of submission `origin`.
pub fn anonymous_init_name(origin: u32, line: usize) -> String {
    format!("__orbit_init_{origin}_{line}")
}

/// Ordered, owned view of the store, in synthesis order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    /// Imports, in first-insertion order.
    pub imports: Vec<Declaration>,
    /// Types, in first-insertion order.
    pub types: Vec<Declaration>,
    /// Vars and consts, in first-insertion order.
    pub vars: Vec<Declaration>,
    /// Functions, in first-insertion order.
    pub functions: Vec<Declaration>,
    /// Init blocks, in insertion order.
    pub init_blocks: Vec<Declaration>,
}

impl Snapshot {
    /// Declarations of the given kind.
    pub fn of_kind(&self, kind: DeclKind) -> &[Declaration] {
        match kind {
            DeclKind::Import => &self.imports,
            DeclKind::Type => &self.types,
            DeclKind::VarOrConst => &self.vars,
            DeclKind::Function => &self.functions,
            DeclKind::InitBlock => &self.init_blocks,
        }
    }

    /// Iterate over every declaration in synthesis order.
    pub fn iter(&self) -> impl Iterator<Item = &Declaration> {
        DeclKind::ALL
            .into_iter()
            .flat_map(move |kind| self.of_kind(kind).iter())
    }

    /// Total number of declarations.
    pub fn len(&self) -> usize {
        self.imports.len()
            + self.types.len()
            + self.vars.len()
            + self.functions.len()
            + self.init_blocks.len()
    }

    /// Whether the snapshot holds nothing.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Names of all stored `#[test]` functions.
    pub fn test_names(&self) -> Vec<&str> {
        self.functions
            .iter()
            .filter(|d| d.is_test)
            .filter_map(|d| d.id.as_deref())
            .collect()
    }
}

/// Outcome of a `remove` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoveReport {
    /// Removed entries as (kind, identifier).
    pub removed: Vec<(DeclKind, String)>,
    /// Identifiers that matched nothing.
    pub unknown: Vec<String>,
}

/// What a reset clears.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetScope {
    /// Declarations, tracked paths and manifest.
    Full,
    /// Only the dependency manifest.
    ManifestOnly,
}
