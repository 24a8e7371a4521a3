use std::collections::BTreeMap;

use crate::model::{ClassifiedRecord, CollaboratorDetail, DerivedTables, DetailEntry, DetailStatus};

fn status_of(row: &ClassifiedRecord) -> Option<DetailStatus> {
    let tags = &row.tags;
    if tags.incidencia {
        Some(DetailStatus::Incidencia)
    } else if tags.alta {
        Some(DetailStatus::Alta)
    } else if tags.late_drop {
        Some(DetailStatus::CaidaFechaPasada)
    } else if tags.baja() {
        Some(DetailStatus::Baja)
    } else {
        None
    }
}

/// Per-collaborator listing of every tagged record in the deduplicated
/// tables, numbered from 1 in input order. Collaborators are sorted.
pub fn build_details(tables: &DerivedTables) -> Vec<CollaboratorDetail> {
    let mut by_collab: BTreeMap<&str, Vec<&ClassifiedRecord>> = BTreeMap::new();
    for row in tables.incid.iter().chain(&tables.altas).chain(&tables.bajas) {
        by_collab
            .entry(row.record.collaborator.as_str())
            .or_default()
            .push(row);
    }

    by_collab
        .into_iter()
        .map(|(collaborator, mut rows)| {
            rows.sort_by_key(|r| r.record.row);
            let entries = rows
                .into_iter()
                .filter_map(|r| status_of(r).map(|status| (status, r)))
                .enumerate()
                .map(|(i, (status, r))| DetailEntry {
                    index: i + 1,
                    status,
                    record: r.record.clone(),
                })
                .collect();
            CollaboratorDetail {
                collaborator: collaborator.to_string(),
                entries,
            }
        })
        .collect()
}
