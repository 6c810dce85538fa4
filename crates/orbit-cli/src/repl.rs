//! Interactive read-execute loop.
//!
//! Lines are collected until an empty line, then submitted as one cell.
//! Ctrl-C interrupts the running cell; Ctrl-D leaves the loop.

use std::io::{self, BufRead};

use crate::colors;
use crate::session::{ConsoleSession, KernelOptions, describe_failure};

/// Run the loop until stdin is closed.
pub async fn execute(options: &KernelOptions) -> anyhow::Result<()> {
    let mut session = ConsoleSession::start(options)?;
    eprintln!(
        "{}orbit {}{} {}(empty line runs the cell, %help lists directives, Ctrl-D exits){}",
        colors::BOLD,
        env!("CARGO_PKG_VERSION"),
        colors::RESET,
        colors::DIM,
        colors::RESET
    );

    loop {
        let count = session.next_count();
        let cell = tokio::task::spawn_blocking(move || read_cell(count)).await??;
        let Some(cell) = cell else {
            eprintln!();
            return Ok(());
        };

        match session.execute(&cell).await {
            Ok(report) => {
                if let Some(failure) = describe_failure(&report.outcome) {
                    eprintln!("{}{failure}{}", colors::RED, colors::RESET);
                }
            }
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => eprintln!("{}{}{}", colors::RED, e.with_hint(), colors::RESET),
        }
    }
}

/// Read one cell from stdin; `None` at end of input.
fn read_cell(count: u32) -> io::Result<Option<String>> {
    let stdin = io::stdin();
    let mut lines: Vec<String> = Vec::new();

    loop {
        if lines.is_empty() {
            eprint!("{}In [{count}]:{} ", colors::GREEN, colors::RESET);
        } else {
            eprint!("{}   ...:{} ", colors::DIM, colors::RESET);
        }
        colors::flush_stderr();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            return Ok((!lines.is_empty()).then(|| lines.join("\n")));
        }
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            if lines.is_empty() {
                continue;
            }
            return Ok(Some(lines.join("\n")));
        }
        lines.push(line.to_string());
    }
}
