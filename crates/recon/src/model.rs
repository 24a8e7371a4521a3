use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::classify::Window;
use crate::error::ReconError;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Plain ordered-column table of text cells. An empty cell is absent.
///
/// Sources hand one of these to the engine and the engine hands them back
/// to exporters, so no formatting lives here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RawTable {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(name: impl Into<String>, headers: Vec<String>) -> Self {
        Self {
            name: name.into(),
            headers,
            rows: Vec::new(),
        }
    }

    /// Parse CSV text with a header row. Short rows are padded with absent
    /// cells so every row has one cell per header.
    pub fn from_csv(name: &str, csv_data: &str, delimiter: u8) -> Result<Self, ReconError> {
        let csv_err = |e: csv::Error| ReconError::Csv {
            table: name.into(),
            message: e.to_string(),
        };

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .from_reader(csv_data.as_bytes());

        let headers: Vec<String> = reader
            .headers()
            .map_err(csv_err)?
            .iter()
            .map(|h| h.to_string())
            .collect();

        let mut table = RawTable::new(name, headers);
        for record in reader.records() {
            let record = record.map_err(csv_err)?;
            let row = record.iter().map(|v| v.to_string()).collect();
            table.push_row(row);
        }
        Ok(table)
    }

    /// Append a row, padding or truncating it to the header width.
    pub fn push_row(&mut self, mut row: Vec<String>) {
        row.resize(self.headers.len(), String::new());
        self.rows.push(row);
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Everything one engine invocation consumes.
#[derive(Debug, Clone)]
pub struct ReconInput {
    pub primary: RawTable,
    /// Drops not yet reflected in the primary source.
    pub in_process: Option<RawTable>,
    pub window: Window,
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordSource {
    Primary,
    InProcess,
}

/// One normalized source row. Immutable once the normalizer produces it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    /// Position in the merged input; dedup keeps the lowest.
    pub row: usize,
    pub source: RecordSource,
    pub collaborator: String,
    pub plan: String,
    pub services: Option<String>,
    pub community: Option<String>,
    pub commercial_code: Option<String>,
    pub identifier: Option<String>,
    pub alt_identifier: Option<String>,
    pub signing_date: Option<NaiveDate>,
    pub activation_date: Option<NaiveDate>,
    /// Original activation cell text, kept to tell empty from malformed.
    pub activation_raw: Option<String>,
    pub plan_drop_date: Option<NaiveDate>,
    pub service_drop_date: Option<NaiveDate>,
    /// Columns the engine does not interpret, keyed by normalized header.
    pub extra: BTreeMap<String, String>,
}

/// Which column identifies a contract in the dedup key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityColumn {
    Identifier,
    AltIdentifier,
    /// Neither identity column exists; key is collaborator + plan only.
    None,
}

/// Output of the normalizer.
#[derive(Debug, Clone)]
pub struct NormalizedSet {
    pub records: Vec<Record>,
    pub identity: IdentityColumn,
    /// Whether the community column exists in the merged headers.
    pub has_community: bool,
    pub stats: NormalizeStats,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NormalizeStats {
    pub primary_rows: usize,
    pub in_process_rows: usize,
    pub in_process_drop_rows: usize,
    pub header_artifacts: usize,
    pub blank_collaborator: usize,
    pub exact_duplicates: usize,
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    Alta,
    Incidencia,
    BajaPlan,
    BajaService,
    LateDrop,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Alta => write!(f, "ALTA"),
            Self::Incidencia => write!(f, "INCIDENCIA"),
            Self::BajaPlan => write!(f, "BAJA_PLAN"),
            Self::BajaService => write!(f, "BAJA_SERVICE"),
            Self::LateDrop => write!(f, "LATE_DROP"),
        }
    }
}

/// Independently computed category flags for one record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tags {
    pub alta: bool,
    pub incidencia: bool,
    pub baja_plan: bool,
    pub baja_service: bool,
    pub late_drop: bool,
}

impl Tags {
    /// Member of the combined BAJA set.
    pub fn baja(&self) -> bool {
        self.baja_plan || self.baja_service
    }

    pub fn is_empty(&self) -> bool {
        self.categories().is_empty()
    }

    pub fn contains(&self, category: Category) -> bool {
        match category {
            Category::Alta => self.alta,
            Category::Incidencia => self.incidencia,
            Category::BajaPlan => self.baja_plan,
            Category::BajaService => self.baja_service,
            Category::LateDrop => self.late_drop,
        }
    }

    pub fn categories(&self) -> Vec<Category> {
        [
            Category::Alta,
            Category::Incidencia,
            Category::BajaPlan,
            Category::BajaService,
            Category::LateDrop,
        ]
        .into_iter()
        .filter(|c| self.contains(*c))
        .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedRecord {
    pub record: Record,
    pub tags: Tags,
}

/// The deduplicated per-category tables the aggregator and report read.
#[derive(Debug, Clone, Default)]
pub struct DerivedTables {
    pub altas: Vec<ClassifiedRecord>,
    /// Combined plan + service drops.
    pub bajas: Vec<ClassifiedRecord>,
    pub bajas_plan: Vec<ClassifiedRecord>,
    pub bajas_service: Vec<ClassifiedRecord>,
    pub incid: Vec<ClassifiedRecord>,
}

/// Rows set aside by the deduplicator, per derived table.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DuplicateAudit {
    pub altas: Vec<ClassifiedRecord>,
    pub bajas: Vec<ClassifiedRecord>,
    pub incid: Vec<ClassifiedRecord>,
}

impl DuplicateAudit {
    pub fn is_empty(&self) -> bool {
        self.altas.is_empty() && self.bajas.is_empty() && self.incid.is_empty()
    }

    pub fn total(&self) -> usize {
        self.altas.len() + self.bajas.len() + self.incid.len()
    }

    /// Audit tables in export order with their names.
    pub fn tables(&self) -> [(&'static str, &[ClassifiedRecord]); 3] {
        [
            ("ALTAS", self.altas.as_slice()),
            ("BAJAS", self.bajas.as_slice()),
            ("INCID", self.incid.as_slice()),
        ]
    }
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RowKind {
    Plan,
    Total,
    ServiceGroup,
    Incidence,
}

/// Per-location figures. On the TOTAL row `altas` carries the location's
/// net and `bajas` is absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocationFigures {
    pub location: String,
    pub altas: i64,
    pub bajas: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryRow {
    pub category: String,
    pub kind: RowKind,
    pub altas: i64,
    pub bajas: i64,
    pub late_drops: i64,
    pub out_of_region: i64,
    pub totales: i64,
    pub locations: Vec<LocationFigures>,
}

impl SummaryRow {
    pub fn location(&self, name: &str) -> Option<&LocationFigures> {
        self.locations.iter().find(|l| l.location == name)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SummaryTable {
    /// Used to label the out-of-region column.
    pub target_region: String,
    pub rows: Vec<SummaryRow>,
}

impl SummaryTable {
    pub fn row(&self, category: &str) -> Option<&SummaryRow> {
        self.rows.iter().find(|r| r.category == category)
    }
}

// ---------------------------------------------------------------------------
// Collaborator matrix
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndicatorRow {
    pub indicator: String,
    /// One count per collaborator, aligned with `IndicatorMatrix::collaborators`.
    pub counts: Vec<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndicatorMatrix {
    pub collaborators: Vec<String>,
    pub rows: Vec<IndicatorRow>,
}

impl IndicatorMatrix {
    pub fn get(&self, indicator: &str, collaborator: &str) -> Option<u64> {
        let col = self.collaborators.iter().position(|c| c == collaborator)?;
        self.rows
            .iter()
            .find(|r| r.indicator == indicator)
            .map(|r| r.counts[col])
    }
}

// ---------------------------------------------------------------------------
// Collaborator detail
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DetailStatus {
    Incidencia,
    Alta,
    CaidaFechaPasada,
    Baja,
}

impl std::fmt::Display for DetailStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Incidencia => write!(f, "INCIDENCIA"),
            Self::Alta => write!(f, "ALTA"),
            Self::CaidaFechaPasada => write!(f, "CAIDA_FECHA_PASADA"),
            Self::Baja => write!(f, "BAJA"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailEntry {
    pub index: usize,
    pub status: DetailStatus,
    pub record: Record,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollaboratorDetail {
    pub collaborator: String,
    pub entries: Vec<DetailEntry>,
}

// ---------------------------------------------------------------------------
// Stats + Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TableCounts {
    pub kept: usize,
    pub duplicates: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconStats {
    pub normalize: NormalizeStats,
    pub records: usize,
    pub invalid: usize,
    pub tag_counts: BTreeMap<String, usize>,
    pub altas: TableCounts,
    pub bajas: TableCounts,
    pub incid: TableCounts,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconMeta {
    pub config_name: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub today: NaiveDate,
    pub identity: IdentityColumn,
    pub engine_version: String,
    pub run_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconResult {
    pub meta: ReconMeta,
    pub stats: ReconStats,
    pub summary: SummaryTable,
    pub matrix: IndicatorMatrix,
    pub duplicates: DuplicateAudit,
    pub details: Vec<CollaboratorDetail>,
}
