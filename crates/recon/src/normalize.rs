//! Normalizer: canonical text, tolerant dates, and the in-process merge.
//!
//! Turns the primary table plus the optional in-process table into one
//! `Record` set. Nothing here fails on bad data; only a missing required
//! column is an error.

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::{debug, warn};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::config::{ReconConfig, SchemaConfig};
use crate::dates::parse_date;
use crate::error::ReconError;
use crate::model::{IdentityColumn, NormalizeStats, NormalizedSet, RawTable, Record, RecordSource};

// ---------------------------------------------------------------------------
// Text
// ---------------------------------------------------------------------------

/// Strip diacritics, uppercase, trim and collapse whitespace runs.
pub fn normalize_text(value: &str) -> String {
    let stripped: String = value.nfkd().filter(|c| !is_combining_mark(*c)).collect();
    stripped
        .to_uppercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Uppercase and drop every whitespace character.
pub fn normalize_identifier(value: &str) -> String {
    value
        .to_uppercase()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect()
}

/// Trimmed cell text, `None` when the column is missing or the cell blank.
fn cell(row: &[String], i: Option<usize>) -> Option<String> {
    let value = row.get(i?)?.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

// ---------------------------------------------------------------------------
// Columns
// ---------------------------------------------------------------------------

/// Config column names resolved to their normalized header spelling.
struct Columns {
    collaborator: String,
    plan: String,
    services: String,
    community: String,
    commercial_code: String,
    identifier: String,
    alt_identifier: String,
    signing_date: String,
    activation_date: String,
    plan_drop: String,
    service_drop: String,
    text_columns: Vec<String>,
}

impl Columns {
    fn from_schema(schema: &SchemaConfig) -> Self {
        Self {
            collaborator: normalize_text(&schema.collaborator),
            plan: normalize_text(&schema.plan),
            services: normalize_text(&schema.services),
            community: normalize_text(&schema.community),
            commercial_code: normalize_text(&schema.commercial_code),
            identifier: normalize_text(&schema.identifier),
            alt_identifier: normalize_text(&schema.alt_identifier),
            signing_date: normalize_text(&schema.signing_date),
            activation_date: normalize_text(&schema.activation_date),
            plan_drop: normalize_text(schema.drops.plan_column()),
            service_drop: normalize_text(schema.drops.service_column()),
            text_columns: schema.text_columns.iter().map(|c| normalize_text(c)).collect(),
        }
    }

    fn is_text(&self, header: &str) -> bool {
        [
            &self.collaborator,
            &self.plan,
            &self.services,
            &self.community,
            &self.commercial_code,
        ]
        .iter()
        .any(|c| c.as_str() == header)
            || self.text_columns.iter().any(|c| c == header)
    }

    fn is_identity(&self, header: &str) -> bool {
        header == self.identifier || header == self.alt_identifier
    }

    fn is_mapped(&self, header: &str) -> bool {
        self.is_text(header)
            || self.is_identity(header)
            || [
                &self.signing_date,
                &self.activation_date,
                &self.plan_drop,
                &self.service_drop,
            ]
            .iter()
            .any(|c| c.as_str() == header)
    }
}

/// Normalize header spelling and resolve aliases.
fn canonical_headers(headers: &[String], aliases: &BTreeMap<String, String>) -> Vec<String> {
    let aliases: HashMap<String, String> = aliases
        .iter()
        .map(|(from, to)| (normalize_text(from), normalize_text(to)))
        .collect();

    headers
        .iter()
        .map(|h| {
            let h = normalize_text(h);
            aliases.get(&h).cloned().unwrap_or(h)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub fn normalize(
    config: &ReconConfig,
    primary: &RawTable,
    in_process: Option<&RawTable>,
) -> Result<NormalizedSet, ReconError> {
    let cols = Columns::from_schema(&config.schema);
    let mut stats = NormalizeStats {
        primary_rows: primary.rows.len(),
        ..NormalizeStats::default()
    };

    let primary_headers = canonical_headers(&primary.headers, &config.schema.aliases);
    for required in [&cols.collaborator, &cols.plan, &cols.signing_date] {
        if !primary_headers.contains(required) {
            return Err(ReconError::MissingColumn {
                table: primary.name.clone(),
                column: required.clone(),
            });
        }
    }

    // Merged column order: primary first, then anything only the
    // in-process table has.
    let mut headers = primary_headers.clone();
    let mut merged: Vec<(RecordSource, Vec<String>)> = primary
        .rows
        .iter()
        .map(|row| (RecordSource::Primary, row.clone()))
        .collect();

    if let Some(secondary) = in_process {
        stats.in_process_rows = secondary.rows.len();
        let secondary_headers = canonical_headers(&secondary.headers, &config.schema.aliases);
        for h in &secondary_headers {
            if !headers.contains(h) {
                headers.push(h.clone());
            }
        }

        let drop_idx: Vec<usize> = [&cols.plan_drop, &cols.service_drop]
            .iter()
            .filter_map(|c| secondary_headers.iter().position(|h| h == *c))
            .collect();
        if drop_idx.is_empty() {
            warn!(
                table = %secondary.name,
                "in-process table has no drop-date column; it contributes no rows"
            );
        }

        for row in &secondary.rows {
            let is_drop = drop_idx
                .iter()
                .any(|&i| row.get(i).and_then(|v| parse_date(v)).is_some());
            if !is_drop {
                continue;
            }
            let by_header: HashMap<&str, &str> = secondary_headers
                .iter()
                .map(|h| h.as_str())
                .zip(row.iter().map(|v| v.as_str()))
                .collect();
            let aligned = headers
                .iter()
                .map(|h| by_header.get(h.as_str()).map(|v| v.to_string()).unwrap_or_default())
                .collect();
            merged.push((RecordSource::InProcess, aligned));
            stats.in_process_drop_rows += 1;
        }
    }

    // Primary rows are narrower than the merged header list.
    for (_, row) in merged.iter_mut() {
        row.resize(headers.len(), String::new());
    }

    for (_, row) in merged.iter_mut() {
        for (i, h) in headers.iter().enumerate() {
            if cols.is_text(h) {
                row[i] = normalize_text(&row[i]);
            } else if cols.is_identity(h) {
                row[i] = normalize_identifier(&row[i]);
            }
        }
    }

    let header_like: HashSet<String> = headers
        .iter()
        .cloned()
        .chain(config.header_artifacts.iter().map(|h| normalize_text(h)))
        .collect();
    let collab_idx = headers
        .iter()
        .position(|h| *h == cols.collaborator)
        .ok_or_else(|| ReconError::MissingColumn {
            table: primary.name.clone(),
            column: cols.collaborator.clone(),
        })?;

    let mut seen: HashSet<Vec<String>> = HashSet::new();
    let mut kept: Vec<(RecordSource, Vec<String>)> = Vec::with_capacity(merged.len());
    for (source, row) in merged {
        let collaborator = &row[collab_idx];
        if collaborator.is_empty() {
            stats.blank_collaborator += 1;
            continue;
        }
        if header_like.contains(collaborator) {
            stats.header_artifacts += 1;
            continue;
        }
        if !seen.insert(row.clone()) {
            stats.exact_duplicates += 1;
            continue;
        }
        kept.push((source, row));
    }

    debug!(
        header_artifacts = stats.header_artifacts,
        blank_collaborator = stats.blank_collaborator,
        exact_duplicates = stats.exact_duplicates,
        in_process_drop_rows = stats.in_process_drop_rows,
        "normalized source rows"
    );

    let identity = if headers.contains(&cols.identifier) {
        IdentityColumn::Identifier
    } else if headers.contains(&cols.alt_identifier) {
        warn!(column = %cols.alt_identifier, "identifier column missing; dedup falls back to alternate identifier");
        IdentityColumn::AltIdentifier
    } else {
        warn!("no identity column; dedup key degrades to collaborator + plan");
        IdentityColumn::None
    };

    let has_community = headers.contains(&cols.community);
    if !has_community {
        warn!(column = %cols.community, "community column missing; no alta counts as out of region");
    }
    let mut optional = vec![&cols.services, &cols.activation_date, &cols.plan_drop, &cols.service_drop];
    // Unified drop model maps both levels to one column.
    optional.dedup();
    for optional in optional {
        if !headers.contains(optional) {
            warn!(column = %optional, "configured column missing from source; its predicates stay false");
        }
    }

    let idx = |name: &str| headers.iter().position(|h| h == name);

    let i_plan = idx(&cols.plan);
    let i_services = idx(&cols.services);
    let i_community = idx(&cols.community);
    let i_code = idx(&cols.commercial_code);
    let i_ident = idx(&cols.identifier);
    let i_alt = idx(&cols.alt_identifier);
    let i_sign = idx(&cols.signing_date);
    let i_act = idx(&cols.activation_date);
    let i_plan_drop = idx(&cols.plan_drop);
    let i_service_drop = idx(&cols.service_drop);

    let records = kept
        .into_iter()
        .enumerate()
        .map(|(pos, (source, row))| {
            let date = |i: Option<usize>| cell(&row, i).and_then(|v| parse_date(&v));
            let extra = headers
                .iter()
                .zip(row.iter())
                .filter(|(h, v)| !cols.is_mapped(h) && !v.trim().is_empty())
                .map(|(h, v)| (h.clone(), v.trim().to_string()))
                .collect();

            Record {
                row: pos,
                source,
                collaborator: row[collab_idx].clone(),
                plan: cell(&row, i_plan).unwrap_or_default(),
                services: cell(&row, i_services),
                community: cell(&row, i_community),
                commercial_code: cell(&row, i_code),
                identifier: cell(&row, i_ident),
                alt_identifier: cell(&row, i_alt),
                signing_date: date(i_sign),
                activation_date: date(i_act),
                activation_raw: cell(&row, i_act),
                plan_drop_date: date(i_plan_drop),
                service_drop_date: date(i_service_drop),
                extra,
            }
        })
        .collect();

    Ok(NormalizedSet {
        records,
        identity,
        has_community,
        stats,
    })
}
