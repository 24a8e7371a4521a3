use tracing::{debug, info};

use crate::aggregate::build_summary;
use crate::classify::classify;
use crate::config::ReconConfig;
use crate::dedup::{dedup, Discriminator};
use crate::detail::build_details;
use crate::error::ReconError;
use crate::evidence::compute_stats;
use crate::matcher::Matchers;
use crate::model::{
    ClassifiedRecord, DerivedTables, DuplicateAudit, ReconInput, ReconMeta, ReconResult,
};
use crate::normalize::normalize;
use crate::report::build_matrix;

/// Run one reconciliation: normalize, classify, dedup per derived table,
/// aggregate and assemble the report.
pub fn run(config: &ReconConfig, input: &ReconInput) -> Result<ReconResult, ReconError> {
    let window = input.window;

    let set = normalize(config, &input.primary, input.in_process.as_ref())?;
    let mut matchers = Matchers::from_config(config);
    matchers.region_column = set.has_community;
    info!(
        records = set.records.len(),
        in_process_drop_rows = set.stats.in_process_drop_rows,
        window = %window.label(),
        "loaded records"
    );

    let classified = classify(&set.records, &window, &matchers);
    let invalid = set.records.iter().filter(|r| !matchers.is_valid(r)).count();

    let select = |pred: fn(&ClassifiedRecord) -> bool| -> Vec<ClassifiedRecord> {
        classified.iter().filter(|r| pred(r)).cloned().collect()
    };

    let altas = dedup(select(|r| r.tags.alta), set.identity, Discriminator::SigningDate);
    let incid = dedup(select(|r| r.tags.incidencia), set.identity, Discriminator::SigningDate);
    let bajas = dedup(select(|r| r.tags.baja()), set.identity, Discriminator::DropDates);

    let tables = DerivedTables {
        bajas_plan: bajas.kept.iter().filter(|r| r.tags.baja_plan).cloned().collect(),
        bajas_service: bajas.kept.iter().filter(|r| r.tags.baja_service).cloned().collect(),
        altas: altas.kept,
        bajas: bajas.kept,
        incid: incid.kept,
    };
    let duplicates = DuplicateAudit {
        altas: altas.duplicates,
        bajas: bajas.duplicates,
        incid: incid.duplicates,
    };

    debug!(
        invalid,
        altas = tables.altas.len(),
        bajas_plan = tables.bajas_plan.len(),
        bajas_service = tables.bajas_service.len(),
        incid = tables.incid.len(),
        "derived tables"
    );
    if !duplicates.is_empty() {
        info!(
            altas = duplicates.altas.len(),
            bajas = duplicates.bajas.len(),
            incid = duplicates.incid.len(),
            "duplicates set aside"
        );
    }

    let summary = build_summary(&tables, &matchers);
    let matrix = build_matrix(&tables, &matchers);
    let details = build_details(&tables);
    let stats = compute_stats(&set.stats, &classified, invalid, &tables, &duplicates);

    Ok(ReconResult {
        meta: ReconMeta {
            config_name: config.name.clone(),
            start: window.start,
            end: window.end,
            today: window.today,
            identity: set.identity,
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
        },
        stats,
        summary,
        matrix,
        duplicates,
        details,
    })
}
