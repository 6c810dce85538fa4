//! Splitting a notebook file into cells.
//!
//! A notebook is a plain text file of submissions separated by lines that
//! read `// ---`. Blank cells are dropped.

/// Line that separates two cells.
pub const CELL_SEPARATOR: &str = "// ---";

/// Split notebook source into cell submissions.
pub fn split_cells(source: &str) -> Vec<String> {
    let mut cells = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in source.lines() {
        if line.trim() == CELL_SEPARATOR {
            push_cell(&mut cells, &current);
            current.clear();
        } else {
            current.push(line);
        }
    }
    push_cell(&mut cells, &current);
    cells
}

fn push_cell(cells: &mut Vec<String>, lines: &[&str]) {
    if lines.iter().all(|l| l.trim().is_empty()) {
        return;
    }
    cells.push(lines.join("\n"));
}
