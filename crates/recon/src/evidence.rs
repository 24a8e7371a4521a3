use std::collections::BTreeMap;

use crate::model::{ClassifiedRecord, DerivedTables, DuplicateAudit, NormalizeStats, ReconStats, TableCounts};

/// Compute run statistics from the classified records and derived tables.
pub fn compute_stats(
    normalize: &NormalizeStats,
    classified: &[ClassifiedRecord],
    invalid: usize,
    tables: &DerivedTables,
    duplicates: &DuplicateAudit,
) -> ReconStats {
    let mut tag_counts: BTreeMap<String, usize> = BTreeMap::new();
    for r in classified {
        for category in r.tags.categories() {
            *tag_counts.entry(category.to_string()).or_insert(0) += 1;
        }
    }

    ReconStats {
        normalize: normalize.clone(),
        records: classified.len(),
        invalid,
        tag_counts,
        altas: TableCounts {
            kept: tables.altas.len(),
            duplicates: duplicates.altas.len(),
        },
        bajas: TableCounts {
            kept: tables.bajas.len(),
            duplicates: duplicates.bajas.len(),
        },
        incid: TableCounts {
            kept: tables.incid.len(),
            duplicates: duplicates.incid.len(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Record, RecordSource, Tags};

    fn result(tags: Tags) -> ClassifiedRecord {
        ClassifiedRecord {
            record: Record {
                row: 0,
                source: RecordSource::Primary,
                collaborator: "ANA".into(),
                plan: "GAS".into(),
                services: None,
                community: None,
                commercial_code: None,
                identifier: None,
                alt_identifier: None,
                signing_date: None,
                activation_date: None,
                activation_raw: None,
                plan_drop_date: None,
                service_drop_date: None,
                extra: Default::default(),
            },
            tags,
        }
    }

    #[test]
    fn stats_counts() {
        let late = Tags {
            baja_plan: true,
            late_drop: true,
            ..Tags::default()
        };
        let alta = Tags {
            alta: true,
            ..Tags::default()
        };
        let classified = vec![result(alta), result(alta), result(late), result(Tags::default())];
        let tables = DerivedTables {
            altas: vec![result(alta)],
            bajas: vec![result(late)],
            ..DerivedTables::default()
        };
        let duplicates = DuplicateAudit {
            altas: vec![result(alta)],
            ..DuplicateAudit::default()
        };

        let stats = compute_stats(&NormalizeStats::default(), &classified, 1, &tables, &duplicates);
        assert_eq!(stats.records, 4);
        assert_eq!(stats.invalid, 1);
        assert_eq!(stats.tag_counts.get("ALTA"), Some(&2));
        assert_eq!(stats.tag_counts.get("BAJA_PLAN"), Some(&1));
        assert_eq!(stats.tag_counts.get("LATE_DROP"), Some(&1));
        assert_eq!(stats.tag_counts.get("INCIDENCIA"), None);
        assert_eq!(stats.altas, TableCounts { kept: 1, duplicates: 1 });
        assert_eq!(stats.bajas, TableCounts { kept: 1, duplicates: 0 });
    }
}
