//! Source loading: one primary table and the optional in-process table.

use std::collections::HashSet;
use std::path::Path;

use altas_recon::config::InProcessConfig;
use altas_recon::RawTable;
use tracing::{debug, info, warn};

use crate::error::SourceError;
use crate::xlsx::{is_workbook, WorkbookSource};

/// Stack tables under the union of their headers (first-seen order).
pub fn concat(name: &str, tables: &[RawTable]) -> RawTable {
    let mut headers: Vec<String> = Vec::new();
    for t in tables {
        for h in &t.headers {
            if !h.is_empty() && !headers.contains(h) {
                headers.push(h.clone());
            }
        }
    }

    let mut out = RawTable::new(name, headers);
    for t in tables {
        let positions: Vec<Option<usize>> = out
            .headers
            .iter()
            .map(|h| t.headers.iter().position(|th| th == h))
            .collect();
        for row in &t.rows {
            let aligned = positions
                .iter()
                .map(|p| p.and_then(|i| row.get(i).cloned()).unwrap_or_default())
                .collect();
            out.push_row(aligned);
        }
    }
    out
}

/// Drop rows identical cell for cell to an earlier row. Returns the count.
pub fn drop_exact_duplicates(table: &mut RawTable) -> usize {
    let before = table.rows.len();
    let mut seen: HashSet<Vec<String>> = HashSet::with_capacity(before);
    table.rows.retain(|row| seen.insert(row.clone()));
    before - table.rows.len()
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("input")
        .to_string()
}

/// Load the primary table. A CSV file is read as-is; a workbook reads the
/// named sheets (or the first sheet when none is named) and stacks them.
pub fn load_primary(path: &Path, sheets: &[String]) -> Result<RawTable, SourceError> {
    let mut table = if is_workbook(path) {
        let mut workbook = WorkbookSource::open(path)?;
        let names = if sheets.is_empty() {
            workbook.sheet_names().into_iter().take(1).collect()
        } else {
            sheets.to_vec()
        };
        let tables = names
            .iter()
            .map(|s| workbook.read_sheet(s))
            .collect::<Result<Vec<_>, _>>()?;
        concat(&names.join("+"), &tables)
    } else {
        crate::csv::import(path, &file_stem(path))?
    };

    let dropped = drop_exact_duplicates(&mut table);
    if dropped > 0 {
        debug!(table = %table.name, dropped, "dropped exact duplicate rows");
    }
    info!(table = %table.name, rows = table.rows.len(), "loaded primary source");
    Ok(table)
}

/// Load the in-process table: the anchor sheet plus the sheets that follow
/// it in workbook order. A workbook without the anchor yields an empty
/// table, since the in-process source is optional.
pub fn load_in_process(path: &Path, config: &InProcessConfig) -> Result<RawTable, SourceError> {
    if !is_workbook(path) {
        let table = crate::csv::import(path, &file_stem(path))?;
        info!(table = %table.name, rows = table.rows.len(), "loaded in-process source");
        return Ok(table);
    }

    let mut workbook = WorkbookSource::open(path)?;
    let names = workbook.sheet_names();
    let Some(anchor) = names.iter().position(|s| *s == config.sheet) else {
        warn!(
            path = %path.display(),
            sheet = %config.sheet,
            "in-process sheet not found; continuing without in-process rows"
        );
        return Ok(RawTable::new(config.sheet.clone(), Vec::new()));
    };

    let selected: Vec<String> = names
        .iter()
        .skip(anchor)
        .take(config.following_sheets + 1)
        .cloned()
        .collect();
    debug!(sheets = ?selected, "in-process sheets");

    let tables = selected
        .iter()
        .map(|s| workbook.read_sheet(s))
        .collect::<Result<Vec<_>, _>>()?;
    let table = concat(&config.sheet, &tables);
    info!(table = %table.name, rows = table.rows.len(), "loaded in-process source");
    Ok(table)
}
