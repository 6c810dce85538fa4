//! Command preprocessing: directives, shell escapes and file-writing.
//!
//! A submission is scanned line by line by [`preprocess`]; the commands it
//! extracts are resolved through a [`DirectiveRegistry`] and applied by the
//! kernel before the residual code is parsed.

mod preprocess;
mod registry;
mod tokenizer;

pub use preprocess::{Command, Preprocessed, preprocess};
pub use registry::{ConfigChange, DirectiveAction, DirectiveRegistry, Handler, SideEffect};
pub use tokenizer::split_directive;

/// Help text published by `%help`.
pub const HELP: &str = include_str!("help.md");
