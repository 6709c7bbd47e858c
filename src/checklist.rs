//! Per-team action lists: row subsets of the cleansed table selected by one
//! predicate each. Only non-empty checklists exist on disk.

use std::path::{Path, PathBuf};

use chrono::{NaiveDate, TimeDelta};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::artifact;
use crate::catalog::StatusCategory;
use crate::error::ReportError;
use crate::model::{ColumnMap, FormationRecord, FormationTable};
use crate::schema::{artifact::CSV_EXT, formation};
use crate::text::canonical_key;

/// A named checklist definition; `name` is the artifact file stem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChecklistSpec {
    pub name: String,
    pub rule: ChecklistRule,
}

impl ChecklistSpec {
    pub fn file_name(&self) -> String {
        format!("{}.{CSV_EXT}", self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChecklistRule {
    /// Detail column of `category` equals `value`
    DetailEquals {
        category: StatusCategory,
        value: String,
    },
    /// `Prochaine facturation` strictly before today
    InvoiceOverdue,
    /// Réel detail equals `value` and training started before the lookback window
    TreasuryOverdue { value: String },
}

/// Run-level inputs to date predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChecklistContext {
    pub today: NaiveDate,
    /// `today` minus the treasury lookback window
    pub treasury_cutoff: NaiveDate,
}

impl ChecklistContext {
    /// Fails when the lookback window leaves the representable date range.
    pub fn new(today: NaiveDate, treasury_lookback_days: i64) -> Result<Self, ReportError> {
        let treasury_cutoff = TimeDelta::try_days(treasury_lookback_days)
            .and_then(|window| today.checked_sub_signed(window))
            .ok_or_else(|| {
                ReportError::Config(format!(
                    "treasury_lookback_days = {treasury_lookback_days} is out of range for {today}"
                ))
            })?;
        Ok(Self {
            today,
            treasury_cutoff,
        })
    }
}

impl ChecklistRule {
    /// The logical column the rule cannot be evaluated without, if absent.
    pub fn missing_column(&self, columns: &ColumnMap) -> Option<String> {
        match self {
            ChecklistRule::DetailEquals { category, .. } => columns
                .detail(*category)
                .is_none()
                .then(|| category.label().to_string()),
            ChecklistRule::InvoiceOverdue => columns
                .next_invoice
                .is_none()
                .then(|| formation::PROCHAINE_FACTURATION.to_string()),
            ChecklistRule::TreasuryOverdue { .. } => {
                if columns.detail(StatusCategory::Reel).is_none() {
                    Some(StatusCategory::Reel.label().to_string())
                } else if columns.training_start.is_none() {
                    Some(formation::DATE_DEBUT_FORMATION.to_string())
                } else {
                    None
                }
            }
        }
    }

    pub fn matches(&self, record: &FormationRecord, ctx: &ChecklistContext) -> bool {
        match self {
            ChecklistRule::DetailEquals { category, value } => {
                detail_equals(record, *category, value)
            }
            ChecklistRule::InvoiceOverdue => {
                record.next_invoice.is_some_and(|d| d < ctx.today)
            }
            ChecklistRule::TreasuryOverdue { value } => {
                detail_equals(record, StatusCategory::Reel, value)
                    && record
                        .training_start
                        .is_some_and(|d| d < ctx.treasury_cutoff)
            }
        }
    }
}

fn detail_equals(record: &FormationRecord, category: StatusCategory, value: &str) -> bool {
    record
        .detail(category)
        .is_some_and(|d| canonical_key(d) == canonical_key(value))
}

/// Matching rows with every original column.
#[derive(Debug, Clone)]
pub struct Checklist {
    pub name: String,
    pub frame: DataFrame,
}

impl Checklist {
    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }
}

/// Evaluate one checklist. `None` when a required column is absent.
pub fn extract(
    table: &FormationTable,
    records: &[FormationRecord],
    spec: &ChecklistSpec,
    ctx: &ChecklistContext,
) -> Result<Option<Checklist>, ReportError> {
    if let Some(column) = spec.rule.missing_column(table.columns()) {
        warn!(checklist = %spec.name, column = %column, "column missing, checklist skipped");
        return Ok(None);
    }
    let mask: Vec<bool> = records.iter().map(|r| spec.rule.matches(r, ctx)).collect();
    let frame = table.select_rows(&mask)?;
    Ok(Some(Checklist {
        name: spec.name.clone(),
        frame,
    }))
}

/// Outcome of one checklist for the run report.
#[derive(Debug, Clone, PartialEq)]
pub struct ChecklistOutcome {
    pub name: String,
    /// `None` when the checklist was skipped
    pub rows: Option<usize>,
    /// Set only when a file was written
    pub path: Option<PathBuf>,
}

/// Evaluate every checklist and sync `dir`: non-empty checklists are written,
/// empty or skipped ones leave no file behind.
pub fn write_checklists(
    table: &FormationTable,
    records: &[FormationRecord],
    specs: &[ChecklistSpec],
    ctx: &ChecklistContext,
    dir: &Path,
) -> Result<Vec<ChecklistOutcome>, ReportError> {
    let mut outcomes = Vec::with_capacity(specs.len());
    for spec in specs {
        let path = dir.join(spec.file_name());
        let checklist = extract(table, records, spec, ctx)?;

        let outcome = match checklist {
            Some(mut checklist) if !checklist.is_empty() => {
                artifact::write_csv(&mut checklist.frame, &path)?;
                info!(checklist = %spec.name, rows = checklist.frame.height(), "checklist written");
                ChecklistOutcome {
                    name: spec.name.clone(),
                    rows: Some(checklist.frame.height()),
                    path: Some(path),
                }
            }
            other => {
                if other.is_some() {
                    info!(checklist = %spec.name, "no matching rows, no file");
                }
                if artifact::remove_stale(&path)? {
                    info!(path = %path.display(), "removed stale checklist");
                }
                ChecklistOutcome {
                    name: spec.name.clone(),
                    rows: other.map(|c| c.frame.height()),
                    path: None,
                }
            }
        };
        outcomes.push(outcome);
    }
    Ok(outcomes)
}
