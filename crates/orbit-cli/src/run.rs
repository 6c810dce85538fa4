//! Run command implementation for Orbit CLI.
//!
//! Executes every cell of a notebook file in order, stopping at the first
//! cell that fails.

use std::path::Path;
use std::time::Instant;

use anyhow::Context;

use crate::colors;
use crate::notebook::split_cells;
use crate::session::{ConsoleSession, KernelOptions, describe_failure};

/// Execute a notebook.
pub async fn execute(notebook_path: &str, options: &KernelOptions) -> anyhow::Result<()> {
    let start = Instant::now();
    let path = Path::new(notebook_path);
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("Notebook not found: {}", path.display()))?;

    let cells = split_cells(&source);
    if cells.is_empty() {
        eprintln!("{}No cells found in notebook.{}", colors::YELLOW, colors::RESET);
        eprintln!("Cells are separated by lines reading `// ---`");
        return Ok(());
    }

    let mut session = ConsoleSession::start(options)?;
    for cell in &cells {
        let count = session.next_count();
        tracing::debug!(count, "executing cell");
        let report = session.execute(cell).await?;
        if let Some(failure) = describe_failure(&report.outcome) {
            anyhow::bail!("cell {count} failed: {failure}");
        }
    }

    eprintln!(
        "{}Completed{} {} cells in {:.2}s",
        colors::GREEN,
        colors::RESET,
        cells.len(),
        start.elapsed().as_secs_f64()
    );
    Ok(())
}
