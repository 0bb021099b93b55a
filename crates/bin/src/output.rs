//! Output formatting helpers for human-readable and JSON output.

use docbranch::{BranchReport, Doc, Field, doc::BRANCH_OF};

/// Output format selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
}

/// Print a table with aligned columns in human-readable format.
///
/// `headers` and each row in `rows` must have the same length.
pub fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    if rows.is_empty() {
        return;
    }

    let col_count = headers.len();
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate().take(col_count) {
            widths[i] = widths[i].max(cell.len());
        }
    }

    let header_line: Vec<String> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| format!("{:<width$}", h, width = widths[i]))
        .collect();
    println!("{}", header_line.join("  "));

    for row in rows {
        let line: Vec<String> = row
            .iter()
            .enumerate()
            .take(col_count)
            .map(|(i, cell)| format!("{:<width$}", cell, width = widths[i]))
            .collect();
        println!("{}", line.join("  "));
    }
}

/// One-line rendering of a field for tables.
pub fn describe_field(field: &Field) -> String {
    match field {
        Field::Value(value) => value.to_string(),
        Field::List(list) => format!("list[{}]", list.len()),
        Field::Doc(doc) => format!("-> {}", doc.id()),
        Field::Dangling(id) => format!("-> {id} (not loaded)"),
    }
}

/// The `branchOf` id of `doc`, or an empty string.
pub fn origin_of(doc: &Doc) -> String {
    doc.reference(BRANCH_OF)
        .map(|p| p.id().to_string())
        .unwrap_or_default()
}

/// Print the counts of a branch task.
pub fn print_report(report: &BranchReport, format: OutputFormat) -> serde_json::Result<()> {
    match format {
        OutputFormat::Human => {
            println!("Synced:    {}", report.synced);
            println!("Cloned:    {}", report.cloned);
            println!("Promoted:  {}", report.promoted);
            println!("Removed:   {}", report.removed);
        }
        OutputFormat::Json => println!("{}", serde_json::to_string(report)?),
    }
    Ok(())
}
