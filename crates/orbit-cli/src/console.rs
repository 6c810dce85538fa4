//! Terminal implementation of the kernel's [`Frontend`].
//!
//! Stream output goes straight to the matching standard stream. Rich
//! displays are printed as text when they are text, and summarized
//! otherwise. Input is read line by line from stdin, with echo turned off
//! for masked prompts when stdin is a terminal.

use std::io::{self, BufRead, Write};

use orbit_core::{DisplayData, Frontend, StreamKind};

use crate::colors;

/// Front end that talks to the controlling terminal.
#[derive(Debug, Default)]
pub struct Console;

impl Console {
    pub fn new() -> Self {
        Self
    }
}

impl Frontend for Console {
    fn publish_stream(&self, stream: StreamKind, text: &str) {
        match stream {
            StreamKind::Stdout => {
                let mut out = io::stdout().lock();
                out.write_all(text.as_bytes()).ok();
                out.flush().ok();
            }
            StreamKind::Stderr => {
                let mut err = io::stderr().lock();
                err.write_all(text.as_bytes()).ok();
                err.flush().ok();
            }
        }
    }

    fn publish_display(&self, data: DisplayData) {
        let rendered = render_display(&data);
        self.publish_stream(StreamKind::Stdout, &rendered);
    }

    fn request_input(&self, prompt: &str, masked: bool) -> io::Result<String> {
        eprint!("{prompt}");
        colors::flush_stderr();

        let _echo = masked.then(EchoGuard::disable);
        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line)? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "stdin closed",
            ));
        }
        if masked {
            eprintln!();
        }
        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}

/// Text shown for a display update on a plain terminal.
fn render_display(data: &DisplayData) -> String {
    if !data.mime_type.starts_with("text/") {
        return format!(
            "{}[{}: {} bytes]{}\n",
            colors::DIM,
            data.mime_type,
            data.payload.len(),
            colors::RESET
        );
    }
    let mut text = data.payload.clone();
    if !text.ends_with('\n') {
        text.push('\n');
    }
    text
}

/// Turns terminal echo off until dropped.
struct EchoGuard {
    original: Option<libc::termios>,
}

impl EchoGuard {
    fn disable() -> Self {
        let fd = libc::STDIN_FILENO;
        // SAFETY: termios is plain data, and both calls only read or write
        // the struct we pass for a descriptor owned by this process.
        unsafe {
            if libc::isatty(fd) != 1 {
                return Self { original: None };
            }
            let mut term: libc::termios = std::mem::zeroed();
            if libc::tcgetattr(fd, &mut term) != 0 {
                return Self { original: None };
            }
            let original = term;
            term.c_lflag &= !libc::ECHO;
            if libc::tcsetattr(fd, libc::TCSANOW, &term) != 0 {
                return Self { original: None };
            }
            Self {
                original: Some(original),
            }
        }
    }
}

impl Drop for EchoGuard {
    fn drop(&mut self) {
        if let Some(original) = &self.original {
            // SAFETY: restores the settings read in `disable`.
            unsafe {
                libc::tcsetattr(libc::STDIN_FILENO, libc::TCSANOW, original);
            }
        }
    }
}
