//! Submission parser using syn to separate declarations from bare statements.

use proc_macro2::{LineColumn, Span, TokenStream, TokenTree};
use quote::ToTokens;
use rustc_hash::FxHashSet;
use syn::spanned::Spanned;
use syn::{Attribute, Expr, Item, Stmt};

use crate::error::{Error, Result};
use crate::store::{DeclKind, Declaration, anonymous_init_name};

/// Name a submission-level `fn main` is emitted under.
pub const CELL_MAIN_FN: &str = "__orbit_cell_main";

/// A slice of submission source that is not a declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeFragment {
    /// Source text.
    pub text: String,
    /// 1-indexed submission line the text starts on.
    pub line: usize,
}

/// A parsed submission.
#[derive(Debug, Clone, Default)]
pub struct ParsedCell {
    /// Top-level declarations, in source order.
    pub declarations: Vec<Declaration>,
    /// Bare statements, in source order.
    pub statements: Vec<CodeFragment>,
    /// The submission's own `fn main`, renamed to [`CELL_MAIN_FN`].
    pub main_fn: Option<CodeFragment>,
    /// Every identifier token in the submission.
    pub identifiers: FxHashSet<String>,
}

impl ParsedCell {
    /// Whether the submission has anything to execute.
    pub fn has_code(&self) -> bool {
        !self.declarations.is_empty() || !self.statements.is_empty() || self.main_fn.is_some()
    }

    /// Names of the `#[test]` functions this submission declares.
    pub fn test_names(&self) -> Vec<&str> {
        self.declarations
            .iter()
            .filter(|d| d.is_test)
            .filter_map(|d| d.id.as_deref())
            .collect()
    }
}

/// Parser for a single submission.
pub struct CellParser<'a> {
    /// Source lines (directive lines already blanked).
    lines: Vec<&'a str>,
    /// Execution counter of the submission.
    origin: u32,
}

impl<'a> CellParser<'a> {
    /// Create a parser for `source`, the residual code of submission `origin`.
    pub fn new(source: &'a str, origin: u32) -> Self {
        Self {
            lines: source.split('\n').collect(),
            origin,
        }
    }

    /// Parse the submission.
    pub fn parse(&self) -> Result<ParsedCell> {
        let source = self.lines.join("\n");
        let mut cell = ParsedCell::default();
        if source.trim().is_empty() {
            return Ok(cell);
        }

        let stmts = syn::parse::Parser::parse_str(syn::Block::parse_within, &source).map_err(
            |e| Error::Parse {
                line: e.span().start().line.max(1),
                message: e.to_string(),
            },
        )?;

        if let Ok(tokens) = source.parse::<TokenStream>() {
            collect_identifiers(tokens, &mut cell.identifiers);
        }

        let last = stmts.len().saturating_sub(1);
        for (index, stmt) in stmts.iter().enumerate() {
            match stmt {
                Stmt::Item(item) => self.classify_item(item, &mut cell),
                Stmt::Expr(expr, None) if index == last && is_block_like(expr) => {
                    let mut fragment = self.fragment(stmt.span(), None);
                    fragment.text.push(';');
                    cell.statements.push(fragment);
                }
                Stmt::Expr(_, None) if index == last => {
                    // Tail expression: show its value.
                    let fragment = self.fragment(stmt.span(), None);
                    cell.statements.push(CodeFragment {
                        text: format!("orbit::show(&({}));", fragment.text),
                        line: fragment.line,
                    });
                }
                Stmt::Macro(mac) if mac.semi_token.is_none() && index == last => {
                    let fragment = self.fragment(stmt.span(), None);
                    cell.statements.push(CodeFragment {
                        text: format!("orbit::show(&({}));", fragment.text),
                        line: fragment.line,
                    });
                }
                _ => cell.statements.push(self.fragment(stmt.span(), None)),
            }
        }

        tracing::debug!(
            origin = self.origin,
            declarations = cell.declarations.len(),
            statements = cell.statements.len(),
            "parsed submission"
        );
        Ok(cell)
    }

    /// Classify a top-level item as a declaration, the cell's main, or a statement.
    fn classify_item(&self, item: &Item, cell: &mut ParsedCell) {
        let span = item.span();
        let named = |id: String, kind: DeclKind| {
            let fragment = self.fragment(span, None);
            Declaration::new(id, kind, fragment.text, self.origin, fragment.line)
        };

        let decl = match item {
            Item::Use(item) => {
                let mut tree = item.tree.to_token_stream().to_string();
                if item.leading_colon.is_some() {
                    tree = format!("::{tree}");
                }
                named(normalize_tokens(&tree), DeclKind::Import)
            }
            Item::ExternCrate(item) => {
                let mut id = format!("extern crate {}", item.ident);
                if let Some((_, rename)) = &item.rename {
                    id.push_str(&format!(" as {rename}"));
                }
                named(id, DeclKind::Import)
            }
            Item::Struct(item) => named(item.ident.to_string(), DeclKind::Type),
            Item::Enum(item) => named(item.ident.to_string(), DeclKind::Type),
            Item::Union(item) => named(item.ident.to_string(), DeclKind::Type),
            Item::Trait(item) => named(item.ident.to_string(), DeclKind::Type),
            Item::TraitAlias(item) => named(item.ident.to_string(), DeclKind::Type),
            Item::Type(item) => named(item.ident.to_string(), DeclKind::Type),
            Item::Mod(item) => named(item.ident.to_string(), DeclKind::Type),
            Item::Impl(item) => named(impl_identifier(item), DeclKind::Type),
            Item::Const(item) => named(item.ident.to_string(), DeclKind::VarOrConst),
            Item::Static(item) => named(item.ident.to_string(), DeclKind::VarOrConst),
            Item::Macro(item) if item.ident.is_some() => {
                let ident = item.ident.as_ref().map(|i| i.to_string()).unwrap_or_default();
                named(format!("{ident}!"), DeclKind::Function)
            }
            Item::Fn(func) => {
                let name = func.sig.ident.to_string();
                let parameterless = func.sig.inputs.is_empty();
                if name == "main" {
                    let rename = (func.sig.ident.span().start(), name.len(), CELL_MAIN_FN);
                    cell.main_fn = Some(self.fragment(span, Some(rename)));
                    return;
                }
                if name == "init" && parameterless {
                    let line = span.start().line.max(1);
                    let generated = anonymous_init_name(self.origin, line);
                    let rename = (func.sig.ident.span().start(), name.len(), generated.as_str());
                    let fragment = self.fragment(span, Some(rename));
                    Declaration::anonymous_init(fragment.text, self.origin, fragment.line)
                } else if name.starts_with("init_") && parameterless {
                    named(name, DeclKind::InitBlock)
                } else {
                    named(name, DeclKind::Function).with_test(has_test_attribute(&func.attrs))
                }
            }
            _ => {
                // Extern blocks and verbatim items run in place but are not kept.
                cell.statements.push(self.fragment(span, None));
                return;
            }
        };
        cell.declarations.push(decl);
    }

    /// Extract the source covered by `span`, optionally renaming one identifier.
    ///
    /// `rename` is (identifier start, identifier length in chars, new name).
    fn fragment(&self, span: Span, rename: Option<(LineColumn, usize, &str)>) -> CodeFragment {
        let start = span.start();
        let mut end = span.end();
        let first = start.line.max(1);
        let last = end.line.max(first).min(self.lines.len());

        let mut lines: Vec<String> = self.lines[first - 1..last]
            .iter()
            .map(|l| l.to_string())
            .collect();

        if let Some((at, old_len, new_name)) = rename
            && at.line >= first
            && at.line <= last
        {
            let line = &mut lines[at.line - first];
            let from = char_to_byte(line, at.column);
            let to = char_to_byte(line, at.column + old_len);
            line.replace_range(from..to, new_name);
            if at.line == end.line && at.column < end.column {
                end.column = end.column + new_name.chars().count() - old_len;
            }
        }

        let count = lines.len();
        if let Some(last_line) = lines.last_mut()
            && end.line == last
        {
            let to = char_to_byte(last_line, end.column);
            last_line.truncate(to);
        }
        if let Some(first_line) = lines.first_mut() {
            let from = char_to_byte(first_line, start.column);
            first_line.replace_range(..from, "");
        }
        debug_assert!(count >= 1);

        CodeFragment {
            text: lines.join("\n"),
            line: first,
        }
    }
}

/// Byte index of the `column`-th char of `line` (clamped to the line length).
fn char_to_byte(line: &str, column: usize) -> usize {
    line.char_indices()
        .nth(column)
        .map(|(i, _)| i)
        .unwrap_or(line.len())
}

/// Whether the attributes mark a test function (`#[test]`, `#[tokio::test]`, ...).
/// `if`, `match`, loops and blocks are statements, not displayed values.
fn is_block_like(expr: &Expr) -> bool {
    matches!(
        expr,
        Expr::If(_)
            | Expr::Match(_)
            | Expr::Loop(_)
            | Expr::While(_)
            | Expr::ForLoop(_)
            | Expr::Block(_)
            | Expr::Unsafe(_)
            | Expr::TryBlock(_)
            | Expr::Const(_)
    )
}

fn has_test_attribute(attrs: &[Attribute]) -> bool {
    attrs.iter().any(|attr| {
        attr.path()
            .segments
            .last()
            .is_some_and(|segment| segment.ident == "test")
    })
}

/// Identifier of an impl block: `impl[<generics>] [Trait for] SelfTy`.
fn impl_identifier(item: &syn::ItemImpl) -> String {
    let mut id = String::from("impl");
    if !item.generics.params.is_empty() {
        id.push_str(&item.generics.to_token_stream().to_string());
    }
    id.push(' ');
    if let Some((bang, path, _)) = &item.trait_ {
        if bang.is_some() {
            id.push('!');
        }
        id.push_str(&path.to_token_stream().to_string());
        id.push_str(" for ");
    }
    id.push_str(&item.self_ty.to_token_stream().to_string());
    normalize_tokens(&id)
}

/// Collapse token-stream spacing so identifiers read like source.
fn normalize_tokens(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
        .replace(" :: ", "::")
        .replace(":: ", "::")
        .replace(" ::", "::")
        .replace(" ,", ",")
        .replace("< ", "<")
        .replace(" <", "<")
        .replace(" >", ">")
        .replace(" & ", " &")
}

/// Gather every identifier in a token stream, descending into groups.
fn collect_identifiers(tokens: TokenStream, out: &mut FxHashSet<String>) {
    for token in tokens {
        match token {
            TokenTree::Ident(ident) => {
                out.insert(ident.to_string());
            }
            TokenTree::Group(group) => collect_identifiers(group.stream(), out),
            _ => {}
        }
    }
}
