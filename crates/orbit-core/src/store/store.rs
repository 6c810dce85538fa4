//! Persistent memory of top-level declarations across submissions.

use rustc_hash::FxHashMap;

use crate::error::{Error, Result};

use super::types::{DeclKind, Declaration, RemoveReport, ResetScope, Snapshot};

/// Accumulated declarations of the session.
///
/// Named entries keep their first-insertion position when redefined; a
/// redefinition with a different kind is a conflict and the whole merge is
/// rejected.
#[derive(Debug, Clone, Default)]
pub struct DeclarationStore {
    /// Named imports, types, vars/consts and functions, in first-insertion order.
    named: Vec<Declaration>,
    /// Init blocks (named and anonymous), in insertion order.
    init_blocks: Vec<Declaration>,
    /// Identifier -> kind, covering both lists.
    kinds: FxHashMap<String, DeclKind>,
}

/// What a successful merge changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Identifiers stored for the first time.
    pub added: Vec<String>,
    /// Identifiers whose text was replaced.
    pub replaced: Vec<String>,
    /// Number of anonymous init blocks appended.
    pub anonymous_inits: usize,
}

impl MergeReport {
    /// Whether the merge changed nothing.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.replaced.is_empty() && self.anonymous_inits == 0
    }
}

impl DeclarationStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored declarations.
    pub fn len(&self) -> usize {
        self.named.len() + self.init_blocks.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up a named declaration.
    pub fn get(&self, id: &str) -> Option<&Declaration> {
        self.named
            .iter()
            .chain(self.init_blocks.iter())
            .find(|d| d.id.as_deref() == Some(id))
    }

    /// Check that `decls` can be merged without a kind conflict.
    ///
    /// Conflicts are detected both against the store and within `decls`.
    pub fn check(&self, decls: &[Declaration]) -> Result<()> {
        let mut pending: FxHashMap<&str, DeclKind> = FxHashMap::default();
        for decl in decls {
            let Some(id) = decl.id.as_deref() else {
                continue;
            };
            let existing = pending
                .get(id)
                .copied()
                .or_else(|| self.kinds.get(id).copied());
            if let Some(existing) = existing
                && existing != decl.kind
            {
                return Err(Error::Conflict {
                    identifier: id.to_string(),
                    existing: existing.to_string(),
                    requested: decl.kind.to_string(),
                });
            }
            pending.insert(id, decl.kind);
        }
        Ok(())
    }

    /// Merge new declarations, replacing same-identifier same-kind entries.
    ///
    /// Either every declaration is applied or none is.
    pub fn merge(&mut self, decls: Vec<Declaration>) -> Result<MergeReport> {
        self.check(&decls)?;

        let mut report = MergeReport::default();
        for decl in decls {
            let Some(id) = decl.id.clone() else {
                self.init_blocks.push(decl);
                report.anonymous_inits += 1;
                continue;
            };

            let list = if decl.kind == DeclKind::InitBlock {
                &mut self.init_blocks
            } else {
                &mut self.named
            };
            match list.iter_mut().find(|d| d.id.as_deref() == Some(id.as_str())) {
                Some(slot) => {
                    *slot = decl;
                    if !report.replaced.contains(&id) && !report.added.contains(&id) {
                        report.replaced.push(id);
                    }
                }
                None => {
                    self.kinds.insert(id.clone(), decl.kind);
                    list.push(decl);
                    report.added.push(id);
                }
            }
        }

        tracing::debug!(
            added = report.added.len(),
            replaced = report.replaced.len(),
            anonymous_inits = report.anonymous_inits,
            "merged declarations"
        );
        Ok(report)
    }

    /// Snapshot of the store as it would look after merging `decls`.
    ///
    /// The store itself is not modified.
    pub fn preview(&self, decls: &[Declaration]) -> Result<Snapshot> {
        let mut preview = self.clone();
        preview.merge(decls.to_vec())?;
        Ok(preview.snapshot())
    }

    /// Remove named declarations (including named init blocks).
    ///
    /// Unknown identifiers are reported, not treated as errors.
    pub fn remove<S: AsRef<str>>(&mut self, ids: &[S]) -> RemoveReport {
        let mut report = RemoveReport::default();
        for id in ids {
            let id = id.as_ref();
            match self.kinds.remove(id) {
                Some(kind) => {
                    self.named.retain(|d| d.id.as_deref() != Some(id));
                    self.init_blocks.retain(|d| d.id.as_deref() != Some(id));
                    report.removed.push((kind, id.to_string()));
                }
                None => report.unknown.push(id.to_string()),
            }
        }
        report
    }

    /// Clear declarations. A manifest-only reset leaves them untouched.
    pub fn reset(&mut self, scope: ResetScope) {
        if scope == ResetScope::Full {
            self.named.clear();
            self.init_blocks.clear();
            self.kinds.clear();
        }
    }

    /// Owned copy of the store in synthesis order.
    pub fn snapshot(&self) -> Snapshot {
        let mut snapshot = Snapshot::default();
        for decl in &self.named {
            let bucket = match decl.kind {
                DeclKind::Import => &mut snapshot.imports,
                DeclKind::Type => &mut snapshot.types,
                DeclKind::VarOrConst => &mut snapshot.vars,
                DeclKind::Function | DeclKind::InitBlock => &mut snapshot.functions,
            };
            bucket.push(decl.clone());
        }
        snapshot.init_blocks = self.init_blocks.clone();
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn func(name: &str, body: &str, origin: u32) -> Declaration {
        Declaration::new(name, DeclKind::Function, format!("fn {name}() {{ {body} }}"), origin, 1)
    }

    #[test]
    fn test_redefinition_keeps_single_latest_entry() {
        let mut store = DeclarationStore::new();
        store.merge(vec![func("incr", "1", 1)]).unwrap();
        let report = store.merge(vec![func("incr", "2", 2)]).unwrap();

        assert_eq!(report.replaced, vec!["incr".to_string()]);
        assert_eq!(store.len(), 1);
        let stored = store.get("incr").unwrap();
        assert!(stored.source.contains("2"));
        assert_eq!(stored.origin, 2);
    }

    #[test]
    fn test_kind_conflict_leaves_store_unchanged() {
        let mut store = DeclarationStore::new();
        store
            .merge(vec![Declaration::new("Point", DeclKind::Type, "struct Point;", 1, 1)])
            .unwrap();
        let before = store.snapshot();

        let err = store
            .merge(vec![func("helper", "", 2), func("Point", "", 2)])
            .unwrap_err();
        assert!(matches!(err, Error::Conflict { ref identifier, .. } if identifier == "Point"));

        // Atomic: `helper` must not have been applied either.
        assert_eq!(store.snapshot(), before);
        assert!(store.get("helper").is_none());
    }

    #[test]
    fn test_conflict_within_one_batch() {
        let store = DeclarationStore::new();
        let batch = vec![
            Declaration::new("X", DeclKind::VarOrConst, "const X: u8 = 1;", 1, 1),
            Declaration::new("X", DeclKind::Type, "struct X;", 1, 2),
        ];
        assert!(store.check(&batch).is_err());
    }

    #[test]
    fn test_replacement_keeps_first_insertion_position() {
        let mut store = DeclarationStore::new();
        store
            .merge(vec![func("a", "", 1), func("b", "", 1), func("c", "", 1)])
            .unwrap();
        store.merge(vec![func("a", "changed", 2)]).unwrap();

        let names: Vec<_> = store
            .snapshot()
            .functions
            .iter()
            .map(|d| d.display_name().to_string())
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_snapshot_groups_by_kind() {
        let mut store = DeclarationStore::new();
        store
            .merge(vec![
                func("f", "", 1),
                Declaration::new("N", DeclKind::VarOrConst, "const N: u32 = 3;", 1, 2),
                Declaration::new("std::fmt", DeclKind::Import, "use std::fmt;", 1, 3),
                Declaration::new("S", DeclKind::Type, "struct S;", 1, 4),
                Declaration::anonymous_init("fn init() {}", 1, 5),
            ])
            .unwrap();

        let kinds: Vec<_> = store.snapshot().iter().map(|d| d.kind).collect();
        assert_eq!(
            kinds,
            vec![
                DeclKind::Import,
                DeclKind::Type,
                DeclKind::VarOrConst,
                DeclKind::Function,
                DeclKind::InitBlock
            ]
        );
    }

    #[test]
    fn test_imports_dedup_by_path() {
        let mut store = DeclarationStore::new();
        let import = |origin| {
            Declaration::new(
                "std::collections::HashMap",
                DeclKind::Import,
                "use std::collections::HashMap;",
                origin,
                1,
            )
        };
        store.merge(vec![import(1)]).unwrap();
        store.merge(vec![import(2)]).unwrap();
        assert_eq!(store.snapshot().imports.len(), 1);
    }

    #[test]
    fn test_anonymous_init_blocks_accumulate() {
        let mut store = DeclarationStore::new();
        store
            .merge(vec![Declaration::anonymous_init("fn init() {}", 1, 1)])
            .unwrap();
        store
            .merge(vec![Declaration::anonymous_init("fn init() {}", 2, 1)])
            .unwrap();
        assert_eq!(store.snapshot().init_blocks.len(), 2);

        // Anonymous blocks can't be targeted by name.
        let report = store.remove(&["init"]);
        assert_eq!(report.unknown, vec!["init".to_string()]);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_named_init_block_removal() {
        let mut store = DeclarationStore::new();
        store
            .merge(vec![
                Declaration::new("init_a", DeclKind::InitBlock, "fn init_a() {}", 1, 1),
                Declaration::new("init_b", DeclKind::InitBlock, "fn init_b() {}", 1, 2),
            ])
            .unwrap();
        let report = store.remove(&["init_a", "missing"]);
        assert_eq!(report.removed, vec![(DeclKind::InitBlock, "init_a".to_string())]);
        assert_eq!(report.unknown, vec!["missing".to_string()]);
        assert_eq!(store.snapshot().init_blocks.len(), 1);
    }

    #[test]
    fn test_reset_scopes() {
        let mut store = DeclarationStore::new();
        store.merge(vec![func("f", "", 1)]).unwrap();

        store.reset(ResetScope::ManifestOnly);
        assert_eq!(store.len(), 1);

        store.reset(ResetScope::Full);
        assert!(store.is_empty());
        // Identifiers are free again after a reset.
        store
            .merge(vec![Declaration::new("f", DeclKind::Type, "struct f;", 2, 1)])
            .unwrap();
    }

    #[test]
    fn test_preview_does_not_mutate() {
        let store = DeclarationStore::new();
        let snapshot = store.preview(&[func("g", "", 1)]).unwrap();
        assert_eq!(snapshot.functions.len(), 1);
        assert!(store.is_empty());
    }
}
