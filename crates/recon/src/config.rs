use std::collections::{BTreeMap, HashSet};

use serde::Deserialize;

use crate::error::ReconError;
use crate::normalize::normalize_text;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ReconConfig {
    pub name: String,
    /// Community that counts as in-region; altas elsewhere are netted out.
    pub target_region: String,
    /// Plan codes in canonical order. Matched as prefixes in the summary.
    pub plans: Vec<String>,
    #[serde(default = "default_invalid_plans")]
    pub invalid_plans: Vec<String>,
    #[serde(default)]
    pub service_groups: Vec<ServiceGroupConfig>,
    #[serde(default)]
    pub locations: Vec<LocationConfig>,
    /// Collaborator values that mark pasted header rows, on top of the
    /// table's own header names.
    #[serde(default)]
    pub header_artifacts: Vec<String>,
    pub schema: SchemaConfig,
    #[serde(default)]
    pub in_process: InProcessConfig,
}

fn default_invalid_plans() -> Vec<String> {
    vec!["BJ".into(), "OTROS".into()]
}

// ---------------------------------------------------------------------------
// Categories
// ---------------------------------------------------------------------------

/// A named service group; a record belongs to it when its services text
/// contains any of the tokens as a whole token.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceGroupConfig {
    pub name: String,
    pub tokens: Vec<String>,
}

/// A physical location identified by the commercial codes selling for it.
#[derive(Debug, Clone, Deserialize)]
pub struct LocationConfig {
    pub name: String,
    pub codes: Vec<String>,
    /// When set, only records on one of these plans belong to the location.
    #[serde(default)]
    pub plans: Option<Vec<String>>,
}

// ---------------------------------------------------------------------------
// Column mapping
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct SchemaConfig {
    pub collaborator: String,
    pub plan: String,
    pub signing_date: String,
    #[serde(default = "default_services")]
    pub services: String,
    #[serde(default = "default_community")]
    pub community: String,
    #[serde(default = "default_commercial_code")]
    pub commercial_code: String,
    #[serde(default = "default_identifier")]
    pub identifier: String,
    #[serde(default = "default_alt_identifier")]
    pub alt_identifier: String,
    #[serde(default = "default_activation_date")]
    pub activation_date: String,
    /// Passthrough columns that get the same text normalization as the
    /// mapped fields.
    #[serde(default)]
    pub text_columns: Vec<String>,
    #[serde(default)]
    pub drops: DropColumns,
    /// Misspelt header -> canonical header.
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
}

fn default_services() -> String {
    "SERVICIOS".into()
}

fn default_community() -> String {
    "COMUNIDAD".into()
}

fn default_commercial_code() -> String {
    "CODIGO COMERCIAL".into()
}

fn default_identifier() -> String {
    "CUPS".into()
}

fn default_alt_identifier() -> String {
    "DNI/CIF".into()
}

fn default_activation_date() -> String {
    "FECHA ALTA".into()
}

/// Where cancellation timestamps live in the source.
///
/// `Split` keeps contract-level and service-level drops in two columns.
/// `Unified` has one column; a drop there counts at both levels.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum DropColumns {
    Split { plan: String, service: String },
    Unified { column: String },
}

impl Default for DropColumns {
    fn default() -> Self {
        Self::Split {
            plan: "CAIDAS_E_Y_G".into(),
            service: "CAIDAS_P&S".into(),
        }
    }
}

impl DropColumns {
    pub fn plan_column(&self) -> &str {
        match self {
            Self::Split { plan, .. } => plan,
            Self::Unified { column } => column,
        }
    }

    pub fn service_column(&self) -> &str {
        match self {
            Self::Split { service, .. } => service,
            Self::Unified { column } => column,
        }
    }
}

// ---------------------------------------------------------------------------
// Secondary source
// ---------------------------------------------------------------------------

/// Location of the in-process sheets inside a workbook source.
#[derive(Debug, Clone, Deserialize)]
pub struct InProcessConfig {
    #[serde(default = "default_in_process_sheet")]
    pub sheet: String,
    #[serde(default = "default_following_sheets")]
    pub following_sheets: usize,
}

fn default_in_process_sheet() -> String {
    "TRAMITACION".into()
}

fn default_following_sheets() -> usize {
    2
}

impl Default for InProcessConfig {
    fn default() -> Self {
        Self {
            sheet: default_in_process_sheet(),
            following_sheets: default_following_sheets(),
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ReconConfig {
    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config: ReconConfig =
            toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if normalize_text(&self.target_region).is_empty() {
            return Err(ReconError::ConfigValidation(
                "target_region must not be empty".into(),
            ));
        }

        if self.plans.is_empty() {
            return Err(ReconError::ConfigValidation(
                "at least one plan code is required".into(),
            ));
        }

        let mut plans = HashSet::new();
        for plan in &self.plans {
            if !plans.insert(normalize_text(plan)) {
                return Err(ReconError::ConfigValidation(format!(
                    "plan '{plan}' is listed twice"
                )));
            }
        }

        let mut groups = HashSet::new();
        for group in &self.service_groups {
            if !groups.insert(group.name.as_str()) {
                return Err(ReconError::ConfigValidation(format!(
                    "service group '{}' is defined twice",
                    group.name
                )));
            }
            if group.tokens.iter().all(|t| normalize_text(t).is_empty()) {
                return Err(ReconError::ConfigValidation(format!(
                    "service group '{}' has no tokens",
                    group.name
                )));
            }
        }

        let mut locations = HashSet::new();
        for location in &self.locations {
            if !locations.insert(location.name.as_str()) {
                return Err(ReconError::ConfigValidation(format!(
                    "location '{}' is defined twice",
                    location.name
                )));
            }
            if location.codes.is_empty() {
                return Err(ReconError::ConfigValidation(format!(
                    "location '{}' has no commercial codes",
                    location.name
                )));
            }
            for plan in location.plans.iter().flatten() {
                if !plans.contains(&normalize_text(plan)) {
                    return Err(ReconError::ConfigValidation(format!(
                        "location '{}': plan '{plan}' is not in plans",
                        location.name
                    )));
                }
            }
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"
name = "Asturias"
target_region = "ASTURIAS"
plans = ["2,0 TD_1", "2,0 TD_2", "2,0 TD_3", "3,0 TD", "GAS"]

[[service_groups]]
name = "PIH"
tokens = ["PIH"]

[[service_groups]]
name = "UUEEn/UUEE"
tokens = ["UUEEN", "UUEE"]

[[locations]]
name = "MIERES"
codes = ["YB19010-ANA-3188168", "YB99670-ADRIAN-155292"]

[[locations]]
name = "PYMES"
codes = ["YA8541- GERAR- 3184474"]
plans = ["2,0 TD_3", "3,0 TD"]

[schema]
collaborator = "COLABORADOR"
plan = "PLAN"
signing_date = "FECHA FIRMA"

[schema.aliases]
"CODICO COMERCIAL" = "CODIGO COMERCIAL"
"#;

    #[test]
    fn parse_valid() {
        let config = ReconConfig::from_toml(VALID).unwrap();
        assert_eq!(config.name, "Asturias");
        assert_eq!(config.plans.len(), 5);
        assert_eq!(config.invalid_plans, vec!["BJ", "OTROS"]);
        assert_eq!(config.service_groups.len(), 2);
        assert_eq!(config.service_groups[1].tokens, vec!["UUEEN", "UUEE"]);
        assert_eq!(config.locations[1].plans.as_ref().unwrap().len(), 2);
        assert!(config.locations[0].plans.is_none());
        assert_eq!(config.schema.services, "SERVICIOS");
        assert_eq!(config.schema.identifier, "CUPS");
        assert_eq!(config.schema.aliases["CODICO COMERCIAL"], "CODIGO COMERCIAL");
        assert_eq!(config.in_process.sheet, "TRAMITACION");
        assert_eq!(config.in_process.following_sheets, 2);
    }

    #[test]
    fn drops_default_to_split() {
        let config = ReconConfig::from_toml(VALID).unwrap();
        assert_eq!(config.schema.drops.plan_column(), "CAIDAS_E_Y_G");
        assert_eq!(config.schema.drops.service_column(), "CAIDAS_P&S");
    }

    #[test]
    fn parse_unified_drops() {
        let input = format!(
            r#"{VALID}
[schema.drops]
model = "unified"
column = "CAIDAS"
"#
        );
        let config = ReconConfig::from_toml(&input).unwrap();
        assert_eq!(
            config.schema.drops,
            DropColumns::Unified { column: "CAIDAS".into() }
        );
        assert_eq!(config.schema.drops.plan_column(), "CAIDAS");
        assert_eq!(config.schema.drops.service_column(), "CAIDAS");
    }

    #[test]
    fn reject_unknown_drop_model() {
        let input = format!(
            r#"{VALID}
[schema.drops]
model = "merged"
column = "CAIDAS"
"#
        );
        let err = ReconConfig::from_toml(&input).unwrap_err();
        assert!(matches!(err, ReconError::ConfigParse(_)));
    }

    #[test]
    fn reject_empty_plans() {
        let input = VALID.replace(
            r#"plans = ["2,0 TD_1", "2,0 TD_2", "2,0 TD_3", "3,0 TD", "GAS"]"#,
            "plans = []",
        );
        let err = ReconConfig::from_toml(&input).unwrap_err();
        assert!(err.to_string().contains("at least one plan"));
    }

    #[test]
    fn reject_duplicate_plan_after_normalization() {
        let input = VALID.replace(r#""GAS"]"#, r#""GAS", "gas "]"#);
        let err = ReconConfig::from_toml(&input).unwrap_err();
        assert!(err.to_string().contains("listed twice"));
    }

    #[test]
    fn reject_location_plan_outside_plans() {
        let input = VALID.replace(r#"plans = ["2,0 TD_3", "3,0 TD"]"#, r#"plans = ["6,1 TD"]"#);
        let err = ReconConfig::from_toml(&input).unwrap_err();
        assert!(err.to_string().contains("'6,1 TD'"));
    }

    #[test]
    fn reject_service_group_without_tokens() {
        let input = VALID.replace(r#"tokens = ["PIH"]"#, r#"tokens = ["  "]"#);
        let err = ReconConfig::from_toml(&input).unwrap_err();
        assert!(err.to_string().contains("has no tokens"));
    }

    #[test]
    fn reject_missing_required_schema_column() {
        let input = VALID.replace("plan = \"PLAN\"\n", "");
        let err = ReconConfig::from_toml(&input).unwrap_err();
        assert!(matches!(err, ReconError::ConfigParse(_)));
    }
}
