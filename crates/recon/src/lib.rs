//! `altas-recon`: Contract-lifecycle classification and reconciliation engine.
//!
//! Pure engine crate: receives pre-loaded tables, returns classified results.
//! No CLI or file IO dependencies.

pub mod aggregate;
pub mod classify;
pub mod config;
pub mod dates;
pub mod dedup;
pub mod detail;
pub mod engine;
pub mod error;
pub mod evidence;
pub mod matcher;
pub mod model;
pub mod normalize;
pub mod report;

pub use classify::Window;
pub use config::ReconConfig;
pub use engine::run;
pub use error::ReconError;
pub use model::{RawTable, ReconInput, ReconResult, Record};
