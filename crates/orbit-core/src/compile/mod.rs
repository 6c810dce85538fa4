//! Program synthesis and the cargo toolchain.
//!
//! ```text
//! DeclarationStore + ParsedCell ──► Synthesizer ──► src/main.rs + LineMap
//!                                                        │
//!                                   Toolchain (cargo) ◄──┘
//!                                        │
//!                 diagnostics ──► ErrorMapper ──► submission lines
//! ```

mod errors;
mod manifest;
mod runtime;
mod synthesizer;
mod toolchain;

pub use errors::{
    CompileError, ErrorLevel, ErrorMapper, ErrorSpan, PROGRAM_FILE, RustcDiagnostic,
    SourceLocation, missing_crates,
};
pub use manifest::{Manifest, ManifestConfig};
pub use runtime::{RUNTIME_FILE, RUNTIME_SOURCE, wasm_display, wasm_loader};
pub use synthesizer::{BuildMode, LineMap, SourcePosition, SynthesizedProgram, Synthesizer};
pub use toolchain::{BuildOutput, CommandOutput, Toolchain, parse_cargo_output};
