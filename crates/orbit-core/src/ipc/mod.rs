//! Display sideband between the kernel and the cell program.
//!
//! Frames travel over a Unix socket, separate from stdout and stderr, so
//! rich displays and input requests never mix with plain program output.

pub mod protocol;
mod sideband;

pub use protocol::{Frame, MAX_FRAME_LEN, read_frame, write_frame};
pub use sideband::{Sideband, SidebandContext, StdinSlot};
