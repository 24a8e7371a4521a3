//! Table sources and exporters around the `altas-recon` engine.
//!
//! Every filesystem touch of the workspace lives here: reading CSV and
//! workbook sources into `RawTable`s, and writing engine results back out
//! as plain CSV plus a JSON envelope.

pub mod csv;
pub mod error;
pub mod export;
pub mod source;
pub mod xlsx;

pub use error::SourceError;
