//! Report assembly: the collaborator × indicator matrix and the conversion
//! of every engine output into plain ordered-column tables.
//!
//! Tables produced here carry no formatting; exporters only serialize them.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;

use crate::matcher::Matchers;
use crate::model::{
    ClassifiedRecord, CollaboratorDetail, DerivedTables, IndicatorMatrix, IndicatorRow, RawTable,
    Record, RecordSource, SummaryTable,
};

/// Indicator name prefixes the matrix may contain.
pub const INDICATOR_PREFIXES: &[&str] = &["PLAN_", "SERVICIO_"];

pub const MATRIX_TABLE: &str = "POR_COLABORADOR";
pub const SUMMARY_TABLE: &str = "TOTAL_GLOBAL";

// ---------------------------------------------------------------------------
// Matrix
// ---------------------------------------------------------------------------

fn indicator_row<'a>(
    indicator: String,
    collaborators: &[String],
    rows: impl Iterator<Item = &'a ClassifiedRecord>,
) -> IndicatorRow {
    let mut per_collab: BTreeMap<&str, u64> = BTreeMap::new();
    for r in rows {
        *per_collab.entry(r.record.collaborator.as_str()).or_insert(0) += 1;
    }
    IndicatorRow {
        indicator,
        counts: collaborators
            .iter()
            .map(|c| per_collab.get(c.as_str()).copied().unwrap_or(0))
            .collect(),
    }
}

/// Pivot the derived tables into one row per indicator and one column per
/// collaborator (sorted). Plan indicators use the exact plan code.
pub fn build_matrix(tables: &DerivedTables, matchers: &Matchers) -> IndicatorMatrix {
    let collaborators: Vec<String> = tables
        .altas
        .iter()
        .chain(&tables.bajas_plan)
        .chain(&tables.bajas_service)
        .map(|r| r.record.collaborator.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut rows = Vec::new();
    for plan in &matchers.plans {
        rows.push(indicator_row(
            format!("PLAN_{plan}_ALTA"),
            &collaborators,
            tables.altas.iter().filter(|r| r.record.plan == *plan),
        ));
    }
    for plan in &matchers.plans {
        rows.push(indicator_row(
            format!("PLAN_{plan}_CAIDA"),
            &collaborators,
            tables.bajas_plan.iter().filter(|r| r.record.plan == *plan),
        ));
    }
    for group in &matchers.service_groups {
        rows.push(indicator_row(
            format!("SERVICIO_{}_ALTA", group.name),
            &collaborators,
            tables.altas.iter().filter(|r| matchers.in_group(group, &r.record)),
        ));
    }
    for group in &matchers.service_groups {
        rows.push(indicator_row(
            format!("SERVICIO_{}_CAIDA", group.name),
            &collaborators,
            tables
                .bajas_service
                .iter()
                .filter(|r| matchers.in_group(group, &r.record)),
        ));
    }

    rows.retain(|r| INDICATOR_PREFIXES.iter().any(|p| r.indicator.starts_with(p)));

    IndicatorMatrix {
        collaborators,
        rows,
    }
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

pub fn matrix_table(matrix: &IndicatorMatrix) -> RawTable {
    let mut headers = vec!["INDICADOR".to_string()];
    headers.extend(matrix.collaborators.iter().cloned());

    let mut table = RawTable::new(MATRIX_TABLE, headers);
    for row in &matrix.rows {
        let mut cells = vec![row.indicator.clone()];
        cells.extend(row.counts.iter().map(|c| c.to_string()));
        table.push_row(cells);
    }
    table
}

/// Summary columns: the fixed figures then an altas/bajas pair per location.
/// The TOTAL row has no location bajas; those cells stay empty.
pub fn summary_table(summary: &SummaryTable) -> RawTable {
    let mut headers: Vec<String> = [
        "TIPO",
        "ALTAS",
        "BAJAS",
        "CAIDAS_FECHA_PASADA",
    ]
    .iter()
    .map(|h| h.to_string())
    .collect();
    headers.push(format!("NO_{}", summary.target_region));
    headers.push("TOTALES".to_string());

    let locations: Vec<&str> = summary
        .rows
        .first()
        .map(|r| r.locations.iter().map(|l| l.location.as_str()).collect())
        .unwrap_or_default();
    for loc in &locations {
        headers.push(format!("ALTAS_{loc}"));
        headers.push(format!("BAJAS_{loc}"));
    }

    let mut table = RawTable::new(SUMMARY_TABLE, headers);
    for row in &summary.rows {
        let mut cells = vec![
            row.category.clone(),
            row.altas.to_string(),
            row.bajas.to_string(),
            row.late_drops.to_string(),
            row.out_of_region.to_string(),
            row.totales.to_string(),
        ];
        for loc in &row.locations {
            cells.push(loc.altas.to_string());
            cells.push(loc.bajas.map(|b| b.to_string()).unwrap_or_default());
        }
        table.push_row(cells);
    }
    table
}

const RECORD_HEADERS: &[&str] = &[
    "COLABORADOR",
    "PLAN",
    "SERVICIOS",
    "COMUNIDAD",
    "CODIGO COMERCIAL",
    "IDENTIFICADOR",
    "IDENTIFICADOR ALTERNATIVO",
    "FECHA FIRMA",
    "FECHA ALTA",
    "CAIDA PLAN",
    "CAIDA SERVICIO",
    "ORIGEN",
];

fn fmt_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format("%d-%m-%Y").to_string()).unwrap_or_default()
}

fn record_cells(record: &Record) -> Vec<String> {
    let text = |v: &Option<String>| v.clone().unwrap_or_default();
    vec![
        record.collaborator.clone(),
        record.plan.clone(),
        text(&record.services),
        text(&record.community),
        text(&record.commercial_code),
        text(&record.identifier),
        text(&record.alt_identifier),
        fmt_date(record.signing_date),
        // Unparsed activation text is what marks an incidence.
        match record.activation_date {
            Some(_) => fmt_date(record.activation_date),
            None => text(&record.activation_raw),
        },
        fmt_date(record.plan_drop_date),
        fmt_date(record.service_drop_date),
        match record.source {
            RecordSource::Primary => "PRINCIPAL".to_string(),
            RecordSource::InProcess => "TRAMITACION".to_string(),
        },
    ]
}

/// Passthrough column names across a set of records, sorted.
fn extra_headers<'a>(records: impl Iterator<Item = &'a Record>) -> Vec<String> {
    records
        .flat_map(|r| r.extra.keys().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn extend_with_extras(cells: &mut Vec<String>, record: &Record, extras: &[String]) {
    cells.extend(
        extras
            .iter()
            .map(|h| record.extra.get(h).cloned().unwrap_or_default()),
    );
}

/// Rows of one derived or audit table, with their tags.
pub fn records_table(name: &str, rows: &[ClassifiedRecord]) -> RawTable {
    let extras = extra_headers(rows.iter().map(|r| &r.record));
    let mut headers: Vec<String> = RECORD_HEADERS.iter().map(|h| h.to_string()).collect();
    headers.push("ETIQUETAS".to_string());
    headers.extend(extras.iter().cloned());

    let mut table = RawTable::new(name, headers);
    for row in rows {
        let mut cells = record_cells(&row.record);
        cells.push(
            row.tags
                .categories()
                .iter()
                .map(|c| c.to_string())
                .collect::<Vec<_>>()
                .join(" "),
        );
        extend_with_extras(&mut cells, &row.record, &extras);
        table.push_row(cells);
    }
    table
}

/// Numbered status listing for one collaborator.
pub fn detail_table(detail: &CollaboratorDetail) -> RawTable {
    let extras = extra_headers(detail.entries.iter().map(|e| &e.record));
    let mut headers = vec!["N".to_string(), "ESTADO".to_string()];
    headers.extend(RECORD_HEADERS.iter().map(|h| h.to_string()));
    headers.extend(extras.iter().cloned());

    let mut table = RawTable::new(detail.collaborator.clone(), headers);
    for entry in &detail.entries {
        let mut cells = vec![entry.index.to_string(), entry.status.to_string()];
        cells.extend(record_cells(&entry.record));
        extend_with_extras(&mut cells, &entry.record, &extras);
        table.push_row(cells);
    }
    table
}
