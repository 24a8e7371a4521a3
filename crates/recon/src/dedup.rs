use std::collections::HashSet;

use chrono::NaiveDate;

use crate::model::{ClassifiedRecord, IdentityColumn, Record};

/// Extra key component that keeps distinct events on one contract apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discriminator {
    /// ALTAS and INCID tables.
    SigningDate,
    /// BAJAS table: the pair of drop dates.
    DropDates,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    collaborator: String,
    plan: String,
    identity: Option<String>,
    discriminator: [Option<NaiveDate>; 2],
}

impl DedupKey {
    pub fn of(record: &Record, identity: IdentityColumn, discriminator: Discriminator) -> Self {
        let identity = match identity {
            IdentityColumn::Identifier => record.identifier.clone(),
            IdentityColumn::AltIdentifier => record.alt_identifier.clone(),
            IdentityColumn::None => None,
        };
        let discriminator = match discriminator {
            Discriminator::SigningDate => [record.signing_date, None],
            Discriminator::DropDates => [record.plan_drop_date, record.service_drop_date],
        };
        Self {
            collaborator: record.collaborator.clone(),
            plan: record.plan.clone(),
            identity,
            discriminator,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DedupOutcome {
    pub kept: Vec<ClassifiedRecord>,
    /// Every row that lost to an earlier row with the same key.
    pub duplicates: Vec<ClassifiedRecord>,
}

/// Collapse rows sharing a key. The row with the lowest input position wins
/// regardless of the order the rows are handed in; output keeps input order.
pub fn dedup(
    rows: Vec<ClassifiedRecord>,
    identity: IdentityColumn,
    discriminator: Discriminator,
) -> DedupOutcome {
    let mut ordered = rows;
    ordered.sort_by_key(|r| r.record.row);

    let mut seen: HashSet<DedupKey> = HashSet::with_capacity(ordered.len());
    let mut outcome = DedupOutcome::default();
    for row in ordered {
        if seen.insert(DedupKey::of(&row.record, identity, discriminator)) {
            outcome.kept.push(row);
        } else {
            outcome.duplicates.push(row);
        }
    }
    outcome
}
