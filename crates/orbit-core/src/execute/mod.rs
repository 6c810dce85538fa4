//! Running synthesized programs and shell escapes.
//!
//! Every child runs in its own process group so an interrupt can kill the
//! whole tree at once:
//!
//! ```text
//! Kernel
//!     │
//!     ├── run_child (cell program)
//!     │       ├── stdout reader ──► Frontend::publish_stream
//!     │       ├── stderr reader ──► Frontend::publish_stream
//!     │       └── sideband      ──► Frontend::publish_display / request_input
//!     │
//!     ├── run_shell (`!cmd`)
//!     │
//!     └── InterruptHandle ── killpg(SIGKILL)
//! ```

mod context;
mod process;
mod session;
mod shell;
mod wasm;

pub use context::InterruptHandle;
pub use process::{ChildCommand, ChildExit, ChildIo, StartupPrompt, run_child};
pub use session::{Session, SessionState};
pub use shell::run_shell;
pub use wasm::{STAGING_DIR, StagedWasm, stage_wasm};
