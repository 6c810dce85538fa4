//! Core engine of the Orbit Rust notebook kernel.
//!
//! Orbit gives REPL semantics to Rust: every submission (cell) is merged
//! with the declarations of earlier submissions into one program, built
//! with cargo and run as a child process whose output is streamed back.
//!
//! This crate provides:
//! - Declaration store with redefinition semantics
//! - Directive and shell-escape preprocessing
//! - Program synthesis with diagnostic line mapping
//! - Build & run pipeline with interruption
//! - Display sideband for rich output and interactive input

pub mod cell;
pub mod compile;
pub mod config;
pub mod directive;
pub mod error;
pub mod execute;
pub mod frontend;
pub mod ipc;
pub mod kernel;
pub mod paths;
pub mod store;
pub mod tracked;
pub mod widgets;

pub use cell::Submission;
pub use compile::{BuildMode, CompileError};
pub use config::KernelConfig;
pub use error::{Error, Result};
pub use execute::{InterruptHandle, SessionState};
pub use frontend::{DisplayData, Frontend, HeartbeatAck, StreamKind};
pub use kernel::{ExecutionOutcome, ExecutionReport, Kernel};
pub use store::{DeclKind, Declaration, DeclarationStore};
pub use tracked::TrackedPaths;
pub use widgets::{ProbeResult, WidgetLink};
