// CSV import/export

use std::io::Read;
use std::path::Path;

use altas_recon::RawTable;

use crate::error::SourceError;

/// Import a delimited file; the delimiter is sniffed from the content.
pub fn import(path: &Path, name: &str) -> Result<RawTable, SourceError> {
    let content = read_file_as_utf8(path)?;
    let delimiter = sniff_delimiter(&content);
    import_from_string(path, name, &content, delimiter)
}

pub fn import_with_delimiter(path: &Path, name: &str, delimiter: u8) -> Result<RawTable, SourceError> {
    let content = read_file_as_utf8(path)?;
    import_from_string(path, name, &content, delimiter)
}

/// Candidates in tie-break order. Spanish spreadsheet exports use `;`
/// because `,` is the decimal separator inside plan codes like `2,0 TD_1`.
const DELIMITERS: [u8; 4] = [b';', b'\t', b'|', b','];

/// Fields in one line under `delimiter`, honouring quotes.
fn field_count(line: &str, delimiter: u8) -> usize {
    csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(line.as_bytes())
        .records()
        .next()
        .and_then(Result::ok)
        .map_or(1, |r| r.len())
}

/// Pick the delimiter from the header and the first data lines.
///
/// A candidate must split the header into at least two fields. Among those,
/// the one whose data lines agree with the header width most often wins;
/// then the wider header; then the order of `DELIMITERS`.
pub(crate) fn sniff_delimiter(content: &str) -> u8 {
    let mut lines = content.lines().filter(|l| !l.trim().is_empty()).take(10);
    let Some(header) = lines.next() else {
        return b',';
    };
    let sample: Vec<&str> = lines.collect();

    DELIMITERS
        .iter()
        .enumerate()
        .filter_map(|(rank, &delim)| {
            let width = field_count(header, delim);
            if width < 2 {
                return None;
            }
            let agreeing = sample.iter().filter(|l| field_count(l, delim) == width).count();
            Some(((agreeing, width, usize::MAX - rank), delim))
        })
        .max_by_key(|(score, _)| *score)
        .map_or(b',', |(_, delim)| delim)
}

/// Read file and convert to UTF-8 if needed (handles Windows-1252, Latin-1, etc.)
pub fn read_file_as_utf8(path: &Path) -> Result<String, SourceError> {
    let mut file = std::fs::File::open(path).map_err(|e| SourceError::io(path, e))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).map_err(|e| SourceError::io(path, e))?;

    // Try UTF-8 first; on failure, recover the buffer from the error
    match String::from_utf8(bytes) {
        Ok(s) => Ok(s.strip_prefix('\u{feff}').map(str::to_string).unwrap_or(s)),
        Err(e) => {
            let bytes = e.into_bytes();
            // Spreadsheet exports on Windows
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            Ok(decoded.into_owned())
        }
    }
}

fn import_from_string(path: &Path, name: &str, content: &str, delimiter: u8) -> Result<RawTable, SourceError> {
    RawTable::from_csv(name, content, delimiter).map_err(|e| SourceError::Csv {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Write a table as comma-separated CSV with a header row.
pub fn export(table: &RawTable, path: &Path) -> Result<(), SourceError> {
    let csv_err = |e: csv::Error| SourceError::Csv {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    let mut writer = csv::WriterBuilder::new()
        .delimiter(b',')
        .from_path(path)
        .map_err(csv_err)?;

    writer.write_record(&table.headers).map_err(csv_err)?;
    for row in &table.rows {
        writer.write_record(row).map_err(csv_err)?;
    }

    writer.flush().map_err(|e| SourceError::io(path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_sniff_semicolon_delimiter() {
        let content = "COLABORADOR;PLAN;CUPS\nANA;GAS;ES1\nLUIS;GAS;ES2\n";
        assert_eq!(sniff_delimiter(content), b';');
    }

    #[test]
    fn test_sniff_comma_delimiter() {
        let content = "COLABORADOR,PLAN,CUPS\nANA,GAS,ES1\nLUIS,GAS,ES2\n";
        assert_eq!(sniff_delimiter(content), b',');
    }

    #[test]
    fn test_sniff_tab_delimiter() {
        let content = "COLABORADOR\tPLAN\tCUPS\nANA\tGAS\tES1\n";
        assert_eq!(sniff_delimiter(content), b'\t');
    }

    #[test]
    fn test_sniff_pipe_delimiter() {
        let content = "COLABORADOR|PLAN|CUPS\nANA|GAS|ES1\n";
        assert_eq!(sniff_delimiter(content), b'|');
    }

    #[test]
    fn test_sniff_prefers_semicolon_on_ties() {
        // Two fields either way; the decimal comma must not win.
        let content = "PLAN;CUOTA,EUR\n2,0;3\n";
        assert_eq!(sniff_delimiter(content), b';');
    }

    #[test]
    fn test_sniff_single_column_falls_back_to_comma() {
        assert_eq!(sniff_delimiter("COLABORADOR\nANA\n"), b',');
        assert_eq!(sniff_delimiter(""), b',');
    }

    #[test]
    fn test_sniff_semicolon_with_commas_in_values() {
        // Plan codes carry decimal commas.
        let content = "COLABORADOR;PLAN;CUPS\nANA;2,0 TD_1;ES1\nLUIS;3,0 TD;ES2\n";
        assert_eq!(sniff_delimiter(content), b';');
    }

    #[test]
    fn test_semicolon_csv_import() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("abril.csv");
        fs::write(&path, "COLABORADOR;PLAN;CUPS\nANA;2,0 TD_1;ES1\nLUIS;GAS\n").unwrap();

        let table = import(&path, "ABRIL").unwrap();
        assert_eq!(table.name, "ABRIL");
        assert_eq!(table.headers, vec!["COLABORADOR", "PLAN", "CUPS"]);
        assert_eq!(table.rows[0], vec!["ANA", "2,0 TD_1", "ES1"]);
        assert_eq!(table.rows[1], vec!["LUIS", "GAS", ""]);
    }

    #[test]
    fn test_windows_1252_fallback() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("latin.csv");
        // "PEÑA" with Ñ as 0xD1
        fs::write(&path, b"COLABORADOR;PLAN\nPE\xD1A;GAS\n").unwrap();

        let table = import(&path, "ABRIL").unwrap();
        assert_eq!(table.rows[0][0], "PEÑA");
    }

    #[test]
    fn test_bom_is_stripped() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bom.csv");
        fs::write(&path, "\u{feff}COLABORADOR,PLAN\nANA,GAS\n").unwrap();

        let table = import(&path, "ABRIL").unwrap();
        assert_eq!(table.headers[0], "COLABORADOR");
    }

    #[test]
    fn test_export_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");

        let mut table = RawTable::new("T", vec!["TIPO".into(), "ALTAS".into()]);
        table.push_row(vec!["2,0 TD_1".into(), "3".into()]);
        table.push_row(vec!["TOTAL".into(), String::new()]);
        export(&table, &path).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("TIPO,ALTAS\n\"2,0 TD_1\",3\n"));

        let back = import_with_delimiter(&path, "T", b',').unwrap();
        assert_eq!(back, table);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = import(Path::new("/nonexistent/abril.csv"), "ABRIL").unwrap_err();
        assert!(matches!(err, SourceError::Io { .. }));
    }
}
