//! Category membership tests compiled from config.
//!
//! Plans match by prefix, service groups by whole-token occurrence,
//! locations by commercial code (optionally restricted to some plans).
//! Config values are normalized once here so every comparison is between
//! normalized strings.

use std::collections::HashSet;

use crate::config::ReconConfig;
use crate::model::Record;
use crate::normalize::normalize_text;

// ---------------------------------------------------------------------------
// Service tokens
// ---------------------------------------------------------------------------

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
}

/// True when `token` occurs in `text` with no letter or digit directly on
/// either side. Symbols inside the token are literal, so `PEH+` matches in
/// `PIH PEH+` and `PEH+,PTG`, and `PIH` matches in `PIH+PTG`.
pub fn contains_whole_token(text: &str, token: &str) -> bool {
    if token.is_empty() {
        return false;
    }
    text.match_indices(token).any(|(at, _)| {
        let before = text[..at].chars().next_back();
        let after = text[at + token.len()..].chars().next();
        !before.is_some_and(is_word_char) && !after.is_some_and(is_word_char)
    })
}

#[derive(Debug, Clone)]
pub struct ServiceGroup {
    pub name: String,
    tokens: HashSet<String>,
}

impl ServiceGroup {
    /// True when any of the group's tokens appears as a whole token.
    pub fn matches(&self, services: &str) -> bool {
        self.tokens.iter().any(|t| contains_whole_token(services, t))
    }
}

// ---------------------------------------------------------------------------
// Locations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Location {
    pub name: String,
    codes: HashSet<String>,
    plans: Option<HashSet<String>>,
}

impl Location {
    pub fn contains(&self, record: &Record) -> bool {
        let code_ok = record
            .commercial_code
            .as_ref()
            .is_some_and(|c| self.codes.contains(c));
        let plan_ok = self
            .plans
            .as_ref()
            .map_or(true, |plans| plans.contains(&record.plan));
        code_ok && plan_ok
    }
}

// ---------------------------------------------------------------------------
// All matchers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Matchers {
    /// Plan codes in canonical order.
    pub plans: Vec<String>,
    pub service_groups: Vec<ServiceGroup>,
    pub locations: Vec<Location>,
    pub target_region: String,
    /// False when the source has no community column; nothing is then
    /// counted as out of region.
    pub region_column: bool,
    invalid_plans: HashSet<String>,
}

impl Matchers {
    pub fn from_config(config: &ReconConfig) -> Self {
        let norm_set = |values: &[String]| -> HashSet<String> {
            values
                .iter()
                .map(|v| normalize_text(v))
                .filter(|v| !v.is_empty())
                .collect()
        };

        let service_groups: Vec<ServiceGroup> = config
            .service_groups
            .iter()
            .map(|g| ServiceGroup {
                name: g.name.clone(),
                tokens: norm_set(&g.tokens),
            })
            .collect();

        Self {
            plans: config.plans.iter().map(|p| normalize_text(p)).collect(),
            locations: config
                .locations
                .iter()
                .map(|l| Location {
                    name: l.name.clone(),
                    codes: norm_set(&l.codes),
                    plans: l.plans.as_deref().map(|p| norm_set(p)),
                })
                .collect(),
            service_groups,
            target_region: normalize_text(&config.target_region),
            region_column: true,
            invalid_plans: norm_set(&config.invalid_plans),
        }
    }

    /// A record is valid unless its plan is a placeholder plan without a
    /// real service attached.
    pub fn is_valid(&self, record: &Record) -> bool {
        if !self.invalid_plans.contains(&record.plan) {
            return true;
        }
        record.services.as_deref().is_some_and(|s| s != "NO")
    }

    pub fn plan_matches(&self, plan: &str, record: &Record) -> bool {
        record.plan.starts_with(plan)
    }

    pub fn in_group(&self, group: &ServiceGroup, record: &Record) -> bool {
        record.services.as_deref().is_some_and(|s| group.matches(s))
    }

    /// A blank community is out of region, unless the column is missing
    /// from the source altogether.
    pub fn out_of_region(&self, record: &Record) -> bool {
        self.region_column && record.community.as_deref() != Some(self.target_region.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ReconConfig {
        ReconConfig::from_toml(
            r#"
name = "t"
target_region = "Asturias"
plans = ["2,0 TD_1", "2,0 TD_3", "3,0 TD", "GAS"]

[[service_groups]]
name = "PIH"
tokens = ["PIH"]

[[service_groups]]
name = "PEH+"
tokens = ["PEH+"]

[[service_groups]]
name = "UUEEn/UUEE"
tokens = ["UUEEN", "UUEE"]

[[locations]]
name = "LENA"
codes = ["YB33990-ELI-3189791"]

[[locations]]
name = "PYMES"
codes = ["ya8541- gerar- 3184474"]
plans = ["2,0 TD_3", "3,0 TD"]

[schema]
collaborator = "COLABORADOR"
plan = "PLAN"
signing_date = "FECHA FIRMA"
"#,
        )
        .unwrap()
    }

    fn record(plan: &str, services: Option<&str>) -> Record {
        Record {
            row: 0,
            source: crate::model::RecordSource::Primary,
            collaborator: "ANA".into(),
            plan: plan.into(),
            services: services.map(String::from),
            community: Some("ASTURIAS".into()),
            commercial_code: None,
            identifier: None,
            alt_identifier: None,
            signing_date: None,
            activation_date: None,
            activation_raw: None,
            plan_drop_date: None,
            service_drop_date: None,
            extra: Default::default(),
        }
    }

    #[test]
    fn whole_tokens_not_substrings() {
        let m = Matchers::from_config(&config());
        let pih = &m.service_groups[0];
        let uuee = &m.service_groups[2];

        assert!(m.in_group(pih, &record("GAS", Some("PIH"))));
        assert!(m.in_group(pih, &record("GAS", Some("PTG, PIH"))));
        assert!(m.in_group(pih, &record("GAS", Some("PTG/PIH"))));
        assert!(!m.in_group(pih, &record("GAS", Some("PIHX"))));
        assert!(!m.in_group(pih, &record("GAS", Some("APIH"))));
        assert!(m.in_group(uuee, &record("GAS", Some("UUEEN"))));
        assert!(m.in_group(uuee, &record("GAS", Some("UUEE 2"))));
        assert!(!m.in_group(uuee, &record("GAS", Some("UUEENN"))));
        assert!(!m.in_group(pih, &record("GAS", None)));
    }

    #[test]
    fn symbol_tokens_keep_their_symbols() {
        let m = Matchers::from_config(&config());
        let peh = &m.service_groups[1];
        assert!(m.in_group(peh, &record("GAS", Some("PIH PEH+"))));
        assert!(m.in_group(peh, &record("GAS", Some("PEH+,PTG"))));
        assert!(m.in_group(peh, &record("GAS", Some("PIH+PEH+"))));
        assert!(!m.in_group(peh, &record("GAS", Some("PEH"))));
        assert!(!m.in_group(peh, &record("GAS", Some("PEH+X"))));
    }

    #[test]
    fn plus_joined_services_match_each_group() {
        // A `+` in a configured token must not glue neighbouring tokens.
        let m = Matchers::from_config(&config());
        let pih = &m.service_groups[0];
        let peh = &m.service_groups[1];
        let r = record("GAS", Some("PIH+PTG"));
        assert!(m.in_group(pih, &r));
        assert!(!m.in_group(peh, &r));

        let r = record("GAS", Some("PEH++PIH"));
        assert!(m.in_group(pih, &r));
        assert!(m.in_group(peh, &r));
    }

    #[test]
    fn whole_token_boundaries() {
        assert!(contains_whole_token("PTG PIH", "PIH"));
        assert!(contains_whole_token("PIHX PIH", "PIH"));
        assert!(!contains_whole_token("PIH2", "PIH"));
        assert!(!contains_whole_token("2PIH", "PIH"));
        assert!(contains_whole_token("UUEE/UUEEN", "UUEEN"));
        assert!(!contains_whole_token("PIH", ""));
    }

    #[test]
    fn validity() {
        let m = Matchers::from_config(&config());
        assert!(m.is_valid(&record("GAS", None)));
        assert!(m.is_valid(&record("BJ", Some("PIH"))));
        assert!(!m.is_valid(&record("BJ", Some("NO"))));
        assert!(!m.is_valid(&record("OTROS", None)));
    }

    #[test]
    fn plan_prefix() {
        let m = Matchers::from_config(&config());
        assert!(m.plan_matches("2,0 TD_1", &record("2,0 TD_1", None)));
        assert!(m.plan_matches("2,0 TD_1", &record("2,0 TD_1 PROMO", None)));
        assert!(!m.plan_matches("2,0 TD_1", &record("2,0 TD_3", None)));
    }

    #[test]
    fn locations_by_code_and_plan() {
        let m = Matchers::from_config(&config());
        let lena = &m.locations[0];
        let pymes = &m.locations[1];

        let mut r = record("GAS", None);
        r.commercial_code = Some("YB33990-ELI-3189791".into());
        assert!(lena.contains(&r));
        assert!(!pymes.contains(&r));

        r.commercial_code = Some("YA8541- GERAR- 3184474".into());
        assert!(!pymes.contains(&r), "GAS is outside the PYMES plans");
        r.plan = "3,0 TD".into();
        assert!(pymes.contains(&r));
    }

    #[test]
    fn region_is_normalized() {
        let m = Matchers::from_config(&config());
        let mut r = record("GAS", None);
        assert!(!m.out_of_region(&r));
        r.community = Some("CANTABRIA".into());
        assert!(m.out_of_region(&r));
        r.community = None;
        assert!(m.out_of_region(&r));
    }

    #[test]
    fn no_region_column_means_nothing_out_of_region() {
        let mut m = Matchers::from_config(&config());
        m.region_column = false;
        let mut r = record("GAS", None);
        r.community = None;
        assert!(!m.out_of_region(&r));
        r.community = Some("CANTABRIA".into());
        assert!(!m.out_of_region(&r));
    }
}
