//! Declaration store: what survives from one submission to the next.

#[allow(clippy::module_inception)]
mod store;
mod types;

pub use store::{DeclarationStore, MergeReport};
pub use types::{
    DeclKind, Declaration, RemoveReport, ResetScope, Snapshot, anonymous_init_name,
};
