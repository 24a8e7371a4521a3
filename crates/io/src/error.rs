use std::path::PathBuf;

use altas_recon::ReconError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}: {message}", path.display())]
    Csv { path: PathBuf, message: String },

    #[error("{}: cannot read workbook: {message}", path.display())]
    Workbook { path: PathBuf, message: String },

    #[error("{}: no sheet named '{sheet}' (available: {})", path.display(), available.join(", "))]
    SheetNotFound {
        path: PathBuf,
        sheet: String,
        available: Vec<String>,
    },

    #[error(transparent)]
    Recon(#[from] ReconError),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}

impl SourceError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}
