use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::error::ReconError;
use crate::matcher::Matchers;
use crate::model::{ClassifiedRecord, Record, Tags};

// ---------------------------------------------------------------------------
// Window
// ---------------------------------------------------------------------------

/// Reporting window `[start, end]` plus the reference "today" that bounds
/// drop dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Window {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub today: NaiveDate,
}

impl Window {
    pub fn new(start: NaiveDate, end: NaiveDate, today: NaiveDate) -> Result<Self, ReconError> {
        if start > end {
            return Err(ReconError::InvalidWindow { start, end });
        }
        Ok(Self { start, end, today })
    }

    /// Whole calendar month.
    pub fn month(year: i32, month: u32, today: NaiveDate) -> Result<Self, ReconError> {
        let invalid = || ReconError::ConfigValidation(format!("no such month: {year}-{month:02}"));
        let start = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(invalid)?;
        let next = if month == 12 {
            NaiveDate::from_ymd_opt(year + 1, 1, 1)
        } else {
            NaiveDate::from_ymd_opt(year, month + 1, 1)
        }
        .ok_or_else(invalid)?;
        let end = next.pred_opt().ok_or_else(invalid)?;
        Self::new(start, end, today)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Drops count from the window start up to today, not to the window end.
    pub fn drop_in_range(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.today
    }

    pub fn label(&self) -> String {
        format!(
            "{:02}-{:02}-{} → {:02}-{:02}-{}",
            self.start.day(),
            self.start.month(),
            self.start.year(),
            self.end.day(),
            self.end.month(),
            self.end.year()
        )
    }
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Compute the category tags of one record.
pub fn classify_record(record: &Record, window: &Window, matchers: &Matchers) -> Tags {
    if !matchers.is_valid(record) {
        return Tags::default();
    }

    let signed_in_window = record.signing_date.is_some_and(|d| window.contains(d));
    let no_drops = record.plan_drop_date.is_none() && record.service_drop_date.is_none();
    // Activation text present but not a date: a data-entry problem.
    let activation_malformed = record.activation_date.is_none() && record.activation_raw.is_some();

    let fresh = signed_in_window && no_drops;
    let baja_plan = record.plan_drop_date.is_some_and(|d| window.drop_in_range(d));
    let baja_service = record.service_drop_date.is_some_and(|d| window.drop_in_range(d));
    let late_drop =
        (baja_plan || baja_service) && record.signing_date.is_some_and(|d| d < window.start);

    Tags {
        alta: fresh && !activation_malformed,
        incidencia: fresh && activation_malformed,
        baja_plan,
        baja_service,
        late_drop,
    }
}

pub fn classify(records: &[Record], window: &Window, matchers: &Matchers) -> Vec<ClassifiedRecord> {
    records
        .iter()
        .map(|r| ClassifiedRecord {
            record: r.clone(),
            tags: classify_record(r, window, matchers),
        })
        .collect()
}
