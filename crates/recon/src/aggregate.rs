use crate::matcher::Matchers;
use crate::model::{ClassifiedRecord, DerivedTables, LocationFigures, RowKind, SummaryRow, SummaryTable};

pub const TOTAL_ROW: &str = "TOTAL";
pub const INCIDENCE_ROW: &str = "ALTAS CON INCIDENCIA";

/// Net figure shared by every summary row.
pub fn totales(altas: i64, bajas: i64, late_drops: i64, out_of_region: i64) -> i64 {
    altas - bajas - late_drops - out_of_region
}

fn count<'a>(rows: impl IntoIterator<Item = &'a ClassifiedRecord>) -> i64 {
    rows.into_iter().count() as i64
}

/// One category's row from its alta and baja subsets.
fn category_row(
    category: &str,
    kind: RowKind,
    altas: &[&ClassifiedRecord],
    bajas: &[&ClassifiedRecord],
    matchers: &Matchers,
) -> SummaryRow {
    let (late, normal): (Vec<&ClassifiedRecord>, Vec<&ClassifiedRecord>) =
        bajas.iter().copied().partition(|r| r.tags.late_drop);

    let n_altas = altas.len() as i64;
    let n_bajas = normal.len() as i64;
    let n_late = late.len() as i64;
    let n_out = count(altas.iter().copied().filter(|r| matchers.out_of_region(&r.record)));

    let locations = matchers
        .locations
        .iter()
        .map(|loc| LocationFigures {
            location: loc.name.clone(),
            altas: count(altas.iter().copied().filter(|r| loc.contains(&r.record))),
            bajas: Some(count(normal.iter().copied().filter(|r| loc.contains(&r.record)))),
        })
        .collect();

    SummaryRow {
        category: category.to_string(),
        kind,
        altas: n_altas,
        bajas: n_bajas,
        late_drops: n_late,
        out_of_region: n_out,
        totales: totales(n_altas, n_bajas, n_late, n_out),
        locations,
    }
}

fn total_row(plan_rows: &[SummaryRow], incid: &[ClassifiedRecord], matchers: &Matchers) -> SummaryRow {
    let altas: i64 = plan_rows.iter().map(|r| r.altas).sum();
    let bajas: i64 = plan_rows.iter().map(|r| r.bajas).sum();
    let late_drops: i64 = plan_rows.iter().map(|r| r.late_drops).sum();
    let out_of_region: i64 = plan_rows.iter().map(|r| r.out_of_region).sum();

    let locations = matchers
        .locations
        .iter()
        .map(|loc| {
            let (loc_altas, loc_bajas) = plan_rows
                .iter()
                .filter_map(|r| r.location(&loc.name))
                .fold((0, 0), |(a, b), f| (a + f.altas, b + f.bajas.unwrap_or(0)));
            let loc_incid = count(incid.iter().filter(|r| loc.contains(&r.record)));
            LocationFigures {
                location: loc.name.clone(),
                altas: loc_altas + loc_incid - loc_bajas,
                bajas: None,
            }
        })
        .collect();

    SummaryRow {
        category: TOTAL_ROW.to_string(),
        kind: RowKind::Total,
        altas,
        bajas,
        late_drops,
        out_of_region,
        totales: totales(altas, bajas, late_drops, out_of_region),
        locations,
    }
}

/// The incidence count goes under both the altas and bajas columns.
fn incidence_row(incid: &[ClassifiedRecord], matchers: &Matchers) -> SummaryRow {
    let n = incid.len() as i64;
    let locations = matchers
        .locations
        .iter()
        .map(|loc| {
            let in_loc = count(incid.iter().filter(|r| loc.contains(&r.record)));
            LocationFigures {
                location: loc.name.clone(),
                altas: in_loc,
                bajas: Some(in_loc),
            }
        })
        .collect();

    SummaryRow {
        category: INCIDENCE_ROW.to_string(),
        kind: RowKind::Incidence,
        altas: n,
        bajas: n,
        late_drops: 0,
        out_of_region: 0,
        totales: totales(n, n, 0, 0),
        locations,
    }
}

/// Build the category summary in presentation order: plans, TOTAL, service
/// groups, incidences.
pub fn build_summary(tables: &DerivedTables, matchers: &Matchers) -> SummaryTable {
    let plan_rows: Vec<SummaryRow> = matchers
        .plans
        .iter()
        .map(|plan| {
            let altas: Vec<&ClassifiedRecord> = tables
                .altas
                .iter()
                .filter(|r| matchers.plan_matches(plan, &r.record))
                .collect();
            let bajas: Vec<&ClassifiedRecord> = tables
                .bajas
                .iter()
                .filter(|r| matchers.plan_matches(plan, &r.record))
                .collect();
            category_row(plan, RowKind::Plan, &altas, &bajas, matchers)
        })
        .collect();

    let total = total_row(&plan_rows, &tables.incid, matchers);

    let service_rows: Vec<SummaryRow> = matchers
        .service_groups
        .iter()
        .map(|group| {
            let altas: Vec<&ClassifiedRecord> = tables
                .altas
                .iter()
                .filter(|r| matchers.in_group(group, &r.record))
                .collect();
            let bajas: Vec<&ClassifiedRecord> = tables
                .bajas_service
                .iter()
                .filter(|r| matchers.in_group(group, &r.record))
                .collect();
            category_row(&group.name, RowKind::ServiceGroup, &altas, &bajas, matchers)
        })
        .collect();

    let mut rows = plan_rows;
    rows.push(total);
    rows.extend(service_rows);
    rows.push(incidence_row(&tables.incid, matchers));

    SummaryTable {
        target_region: matchers.target_region.clone(),
        rows,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReconConfig;
    use crate::model::{Record, RecordSource, Tags};
    use chrono::NaiveDate;

    fn matchers() -> Matchers {
        let config = ReconConfig::from_toml(
            r#"
name = "t"
target_region = "ASTURIAS"
plans = ["2,0 TD_1", "3,0 TD", "GAS"]

[[service_groups]]
name = "PIH"
tokens = ["PIH"]

[[service_groups]]
name = "PTG"
tokens = ["PTG"]

[[locations]]
name = "LENA"
codes = ["YB3"]

[[locations]]
name = "PYMES"
codes = ["YA8"]
plans = ["3,0 TD"]

[schema]
collaborator = "COLABORADOR"
plan = "PLAN"
signing_date = "FECHA FIRMA"
"#,
        )
        .unwrap();
        Matchers::from_config(&config)
    }

    struct B {
        record: Record,
        tags: Tags,
    }

    impl B {
        fn new(plan: &str) -> Self {
            Self {
                record: Record {
                    row: 0,
                    source: RecordSource::Primary,
                    collaborator: "ANA".into(),
                    plan: plan.into(),
                    services: None,
                    community: Some("ASTURIAS".into()),
                    commercial_code: None,
                    identifier: None,
                    alt_identifier: None,
                    signing_date: NaiveDate::from_ymd_opt(2025, 4, 10),
                    activation_date: None,
                    activation_raw: None,
                    plan_drop_date: None,
                    service_drop_date: None,
                    extra: Default::default(),
                },
                tags: Tags::default(),
            }
        }
        fn services(mut self, s: &str) -> Self {
            self.record.services = Some(s.into());
            self
        }
        fn community(mut self, c: Option<&str>) -> Self {
            self.record.community = c.map(String::from);
            self
        }
        fn code(mut self, c: &str) -> Self {
            self.record.commercial_code = Some(c.into());
            self
        }
        fn late(mut self) -> Self {
            self.tags.late_drop = true;
            self
        }
        fn build(self) -> ClassifiedRecord {
            ClassifiedRecord {
                record: self.record,
                tags: self.tags,
            }
        }
    }

    fn sample() -> DerivedTables {
        let altas = vec![
            B::new("2,0 TD_1").services("PIH").code("YB3").build(),
            B::new("2,0 TD_1").community(Some("CANTABRIA")).build(),
            B::new("3,0 TD").services("PIH, PTG").code("YA8").build(),
            B::new("GAS").community(None).code("YA8").build(),
        ];
        let bajas = vec![
            B::new("2,0 TD_1").code("YB3").build(),
            B::new("2,0 TD_1").code("YB3").late().build(),
            B::new("GAS").services("PTG").build(),
        ];
        let bajas_service = vec![B::new("GAS").services("PTG").build()];
        let incid = vec![
            B::new("3,0 TD").code("YB3").build(),
            B::new("GAS").build(),
        ];
        DerivedTables {
            altas,
            bajas_plan: bajas.clone(),
            bajas,
            bajas_service,
            incid,
        }
    }

    #[test]
    fn rows_in_presentation_order() {
        let table = build_summary(&sample(), &matchers());
        let order: Vec<&str> = table.rows.iter().map(|r| r.category.as_str()).collect();
        assert_eq!(
            order,
            vec!["2,0 TD_1", "3,0 TD", "GAS", "TOTAL", "PIH", "PTG", "ALTAS CON INCIDENCIA"]
        );
    }

    #[test]
    fn plan_rows() {
        let table = build_summary(&sample(), &matchers());
        let td1 = table.row("2,0 TD_1").unwrap();
        assert_eq!((td1.altas, td1.bajas, td1.late_drops, td1.out_of_region), (2, 1, 1, 1));
        assert_eq!(td1.totales, -1);
        let lena = td1.location("LENA").unwrap();
        assert_eq!((lena.altas, lena.bajas), (1, Some(1)));

        let gas = table.row("GAS").unwrap();
        // Absent community counts as out of region.
        assert_eq!((gas.altas, gas.bajas, gas.out_of_region), (1, 1, 1));
        // PYMES only counts its own plans.
        assert_eq!(gas.location("PYMES").unwrap().altas, 0);
        assert_eq!(table.row("3,0 TD").unwrap().location("PYMES").unwrap().altas, 1);
    }

    #[test]
    fn total_sums_plan_rows_only() {
        let table = build_summary(&sample(), &matchers());
        let total = table.row(TOTAL_ROW).unwrap();
        assert_eq!(total.kind, RowKind::Total);
        assert_eq!((total.altas, total.bajas, total.late_drops, total.out_of_region), (4, 2, 1, 2));
        assert_eq!(total.totales, -1);

        // LENA: 1 alta + 1 incidence - 1 baja.
        let lena = total.location("LENA").unwrap();
        assert_eq!((lena.altas, lena.bajas), (1, None));
        // PYMES: 1 alta (3,0 TD), the GAS alta is outside its plans.
        assert_eq!(total.location("PYMES").unwrap().altas, 1);
    }

    #[test]
    fn service_rows_use_service_drops() {
        let table = build_summary(&sample(), &matchers());
        let pih = table.row("PIH").unwrap();
        assert_eq!((pih.altas, pih.bajas), (2, 0));
        let ptg = table.row("PTG").unwrap();
        assert_eq!((ptg.altas, ptg.bajas), (1, 1));
    }

    #[test]
    fn incidence_row_repeats_count() {
        let table = build_summary(&sample(), &matchers());
        let row = table.row(INCIDENCE_ROW).unwrap();
        assert_eq!((row.altas, row.bajas, row.late_drops, row.out_of_region, row.totales), (2, 2, 0, 0, 0));
        assert_eq!(row.location("LENA").unwrap().bajas, Some(1));
    }

    #[test]
    fn empty_tables_give_zero_rows() {
        let table = build_summary(&DerivedTables::default(), &matchers());
        assert_eq!(table.rows.len(), 7);
        assert!(table.rows.iter().all(|r| r.altas == 0 && r.totales == 0));
        assert_eq!(table.target_region, "ASTURIAS");
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        fn arb_record() -> impl Strategy<Value = ClassifiedRecord> {
            (0usize..4, 0usize..3, any::<bool>(), 0usize..3, any::<bool>()).prop_map(
                |(plan, services, asturias, code, late)| {
                    let plan = ["2,0 TD_1", "3,0 TD", "GAS", "2,0 TD_1 PROMO"][plan];
                    let mut b = B::new(plan)
                        .services(["PIH", "PTG PIH", "NADA"][services])
                        .code(["YB3", "YA8", "ZZ"][code]);
                    if !asturias {
                        b = b.community(Some("GALICIA"));
                    }
                    if late {
                        b = b.late();
                    }
                    b.build()
                },
            )
        }

        proptest! {
            #[test]
            fn totales_identity_and_total_row(
                altas in prop::collection::vec(arb_record(), 0..20),
                bajas in prop::collection::vec(arb_record(), 0..20),
                incid in prop::collection::vec(arb_record(), 0..5),
            ) {
                let tables = DerivedTables {
                    altas,
                    bajas_plan: bajas.clone(),
                    bajas_service: bajas.clone(),
                    bajas,
                    incid,
                };
                let table = build_summary(&tables, &matchers());
                for row in &table.rows {
                    prop_assert_eq!(
                        row.totales,
                        row.altas - row.bajas - row.late_drops - row.out_of_region
                    );
                }
                let plan_altas: i64 = table
                    .rows
                    .iter()
                    .filter(|r| r.kind == RowKind::Plan)
                    .map(|r| r.altas)
                    .sum();
                prop_assert_eq!(table.row(TOTAL_ROW).unwrap().altas, plan_altas);
            }
        }
    }
}
