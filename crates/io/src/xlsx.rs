// Excel / ODS import (xlsx, xlsm, xls, xlsb, ods)

use std::path::Path;

use altas_recon::dates::excel_serial_to_date;
use altas_recon::RawTable;
use calamine::{open_workbook_auto, Data, Reader, Sheets};
use tracing::debug;

use crate::error::SourceError;

pub const WORKBOOK_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

pub fn is_workbook(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| WORKBOOK_EXTENSIONS.iter().any(|w| w.eq_ignore_ascii_case(e)))
}

/// An open workbook plus the path it came from, for error messages.
pub struct WorkbookSource {
    path: std::path::PathBuf,
    workbook: Sheets<std::io::BufReader<std::fs::File>>,
}

impl WorkbookSource {
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let workbook = open_workbook_auto(path).map_err(|e| SourceError::Workbook {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            workbook,
        })
    }

    /// Sheet names in workbook order.
    pub fn sheet_names(&self) -> Vec<String> {
        self.workbook.sheet_names().to_vec()
    }

    /// Read one sheet. The first non-empty row of the used range is the
    /// header; fully blank rows are skipped.
    pub fn read_sheet(&mut self, name: &str) -> Result<RawTable, SourceError> {
        let available = self.sheet_names();
        if !available.iter().any(|s| s == name) {
            return Err(SourceError::SheetNotFound {
                path: self.path.clone(),
                sheet: name.to_string(),
                available,
            });
        }

        let range = self
            .workbook
            .worksheet_range(name)
            .map_err(|e| SourceError::Workbook {
                path: self.path.clone(),
                message: format!("sheet '{name}': {e}"),
            })?;

        let mut rows = range
            .rows()
            .map(|row| row.iter().map(cell_text).collect::<Vec<String>>())
            .filter(|row| row.iter().any(|c| !c.trim().is_empty()));

        let headers = match rows.next() {
            Some(h) => h.into_iter().map(|c| c.trim().to_string()).collect(),
            None => Vec::new(),
        };
        let mut table = RawTable::new(name, headers);
        for row in rows {
            table.push_row(row);
        }

        debug!(sheet = name, rows = table.rows.len(), "read worksheet");
        Ok(table)
    }
}

/// Cell as engine text. Dates become ISO `yyyy-mm-dd` so the engine sees
/// one representation whatever the sheet's number format.
pub fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(n) => {
            // Format nicely: integers without decimals
            if n.fract() == 0.0 && n.abs() < 1e15 {
                format!("{}", *n as i64)
            } else {
                format!("{}", n)
            }
        }
        Data::Int(n) => format!("{}", n),
        Data::Bool(b) => (if *b { "TRUE" } else { "FALSE" }).to_string(),
        Data::Error(e) => format!("#{:?}", e),
        Data::DateTime(dt) => {
            let serial = dt.as_f64();
            excel_serial_to_date(serial)
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| format!("{}", serial))
        }
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
    }
}
