//! Plain-data export of a reconciliation result.
//!
//! One CSV per report table plus a JSON envelope. No styling.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use altas_recon::report::{detail_table, matrix_table, records_table, summary_table};
use altas_recon::{RawTable, ReconResult};
use tracing::{debug, info};

use crate::error::SourceError;

pub const DETAIL_DIR: &str = "detalle";
pub const RESULT_JSON: &str = "resumen.json";

/// Longest name a workbook sheet accepts; file names follow the same limit.
const MAX_NAME_CHARS: usize = 31;

/// Replace characters not allowed in sheet or file names and truncate.
pub fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '\\' | '/' | '?' | '*' | '[' | ']' | ':' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .take(MAX_NAME_CHARS)
        .collect();
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}

/// Write every output table under `dir`. Returns the files written.
pub fn write_outputs(dir: &Path, result: &ReconResult) -> Result<Vec<PathBuf>, SourceError> {
    std::fs::create_dir_all(dir).map_err(|e| SourceError::io(dir, e))?;
    let mut written = Vec::new();

    let mut write = |table: &RawTable, path: PathBuf| -> Result<(), SourceError> {
        crate::csv::export(table, &path)?;
        debug!(path = %path.display(), rows = table.rows.len(), "wrote table");
        written.push(path);
        Ok(())
    };

    let matrix = matrix_table(&result.matrix);
    write(&matrix, dir.join(format!("{}.csv", matrix.name)))?;

    let summary = summary_table(&result.summary);
    write(&summary, dir.join(format!("{}.csv", summary.name)))?;

    for (name, rows) in result.duplicates.tables() {
        if rows.is_empty() {
            continue;
        }
        let table = records_table(name, rows);
        write(&table, dir.join(format!("duplicados_{name}.csv")))?;
    }

    if !result.details.is_empty() {
        let detail_dir = dir.join(DETAIL_DIR);
        std::fs::create_dir_all(&detail_dir).map_err(|e| SourceError::io(&detail_dir, e))?;
        for detail in &result.details {
            let table = detail_table(detail);
            write(&table, detail_dir.join(format!("{}.csv", sanitize_name(&detail.collaborator))))?;
        }
    }

    let json_path = dir.join(RESULT_JSON);
    let file = File::create(&json_path).map_err(|e| SourceError::io(&json_path, e))?;
    serde_json::to_writer_pretty(BufWriter::new(file), result)?;
    written.push(json_path);

    info!(dir = %dir.display(), files = written.len(), "wrote outputs");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize() {
        assert_eq!(sanitize_name("ANA/LUIS"), "ANA_LUIS");
        assert_eq!(sanitize_name("[X]*?"), "_X___");
        assert_eq!(sanitize_name("  "), "_");
        assert_eq!(sanitize_name(&"A".repeat(40)).len(), 31);
        assert_eq!(sanitize_name("PEÑA"), "PEÑA");
    }
}
