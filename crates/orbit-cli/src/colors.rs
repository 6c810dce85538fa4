//! Terminal color constants and utilities for CLI output.
//!
//! Prompts, banners and summaries go to stderr; stdout carries only what
//! cells print.

use std::io::{self, Write};

pub const RESET: &str = "\x1b[0m";
pub const BOLD: &str = "\x1b[1m";
pub const DIM: &str = "\x1b[2m";
pub const GREEN: &str = "\x1b[32m";
pub const YELLOW: &str = "\x1b[33m";
pub const RED: &str = "\x1b[31m";

/// Flush stderr after writing a prompt that has no trailing newline.
#[inline]
pub fn flush_stderr() {
    io::stderr().flush().ok();
}
