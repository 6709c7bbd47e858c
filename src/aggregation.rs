use polars::prelude::*;
use tracing::{info, warn};

use crate::catalog::{CatalogIndex, Status, StatusCatalog, StatusCategory};
use crate::error::ReportError;
use crate::model::{ColumnMap, FormationRecord};
use crate::partition::{group_by_cycle, group_ordered};
use crate::schema::{formation, summary};

/// Parameters of the summary computation.
#[derive(Debug, Clone)]
pub struct AggregationSettings {
    /// Estimated revenue per Prévisionnel / Potentiel formation
    pub revenue_per_unit: f64,
    pub catalog: StatusCatalog,
}

/// One (cycle, status) combination.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow {
    pub vague: String,
    pub status: Status,
    pub count: u32,
    /// Aligned with `SummaryTable::payment_columns`
    pub payment_totals: Vec<f64>,
    pub total_all_payments: f64,
    /// Aligned with `SummaryTable::sub_statuses`
    pub sub_status_counts: Vec<u32>,
    /// Detail values outside the catalog for this row's category
    pub unrecognized: u32,
    pub ca_reel: f64,
    pub ca_previsionnel: f64,
    pub ca_potentiel: f64,
}

#[derive(Debug, Clone)]
pub struct SummaryTable {
    pub payment_columns: Vec<String>,
    pub sub_statuses: Vec<String>,
    pub rows: Vec<SummaryRow>,
}

/// Totals of the derived revenue fields over the whole summary.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RevenueOverview {
    pub ca_reel: f64,
    pub ca_previsionnel: f64,
    pub ca_potentiel: f64,
}

impl RevenueOverview {
    pub fn global(&self) -> f64 {
        self.ca_reel + self.ca_previsionnel + self.ca_potentiel
    }
}

/// Réel-only formation count for one (cycle, promo).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromoCount {
    pub vague: String,
    pub promo: String,
    pub count: u32,
}

// ── Summary ─────────────────────────────────────────────────────────────────

/// Build one summary row per (cycle, status) combination present in the data.
///
/// Cycles and statuses keep their order of first appearance.
pub fn summarize(
    records: &[FormationRecord],
    columns: &ColumnMap,
    settings: &AggregationSettings,
) -> SummaryTable {
    let index = settings.catalog.index();
    let payment_columns: Vec<String> = columns.payments.iter().map(|(p, _)| p.clone()).collect();
    let sub_statuses: Vec<String> = settings
        .catalog
        .labels()
        .into_iter()
        .map(str::to_string)
        .collect();

    let mut rows = Vec::new();
    for (vague, in_cycle) in group_by_cycle(records) {
        let by_status = group_ordered(
            in_cycle
                .into_iter()
                .filter_map(|r| r.status.as_ref().map(|s| (s, r))),
        );
        for (status, subset) in by_status {
            let row = summarize_subset(
                vague,
                status,
                &subset,
                payment_columns.len(),
                columns,
                &index,
                settings.revenue_per_unit,
            );
            if row.unrecognized > 0 {
                warn!(
                    vague = %vague,
                    status = status.label(),
                    count = row.unrecognized,
                    "detail values outside the status catalog"
                );
            }
            rows.push(row);
        }
    }

    info!(rows = rows.len(), "summary computed");
    SummaryTable {
        payment_columns,
        sub_statuses,
        rows,
    }
}

fn summarize_subset(
    vague: &str,
    status: &Status,
    subset: &[&FormationRecord],
    n_payments: usize,
    columns: &ColumnMap,
    index: &CatalogIndex,
    revenue_per_unit: f64,
) -> SummaryRow {
    let count = subset.len() as u32;

    let payment_totals: Vec<f64> = (0..n_payments)
        .map(|j| {
            subset
                .iter()
                .map(|r| r.payments.get(j).copied().flatten().unwrap_or(0.0))
                .sum()
        })
        .collect();
    let total_all_payments: f64 = payment_totals.iter().sum();

    let mut sub_status_counts = vec![0u32; index.len()];
    let mut unrecognized = 0u32;
    if let Some(category) = status.category() {
        if columns.detail(category).is_some() {
            for value in subset.iter().filter_map(|r| r.detail(category)) {
                match index.position(category, value) {
                    Some(slot) => sub_status_counts[slot] += 1,
                    None => unrecognized += 1,
                }
            }
        }
    }

    let (ca_reel, ca_previsionnel, ca_potentiel) = match status.category() {
        Some(StatusCategory::Reel) => (total_all_payments, 0.0, 0.0),
        Some(StatusCategory::Previsionnel) => (0.0, count as f64 * revenue_per_unit, 0.0),
        Some(StatusCategory::Potentiel) => (0.0, 0.0, count as f64 * revenue_per_unit),
        None => (0.0, 0.0, 0.0),
    };

    SummaryRow {
        vague: vague.to_string(),
        status: status.clone(),
        count,
        payment_totals,
        total_all_payments,
        sub_status_counts,
        unrecognized,
        ca_reel,
        ca_previsionnel,
        ca_potentiel,
    }
}

impl SummaryTable {
    /// `Données_Transformées` layout.
    pub fn to_frame(&self) -> Result<DataFrame, ReportError> {
        let rows = &self.rows;
        let mut columns: Vec<Column> = vec![
            Column::new(
                formation::VAGUE.into(),
                rows.iter().map(|r| r.vague.clone()).collect::<Vec<_>>(),
            ),
            Column::new(
                formation::ETAT.into(),
                rows.iter()
                    .map(|r| r.status.label().to_string())
                    .collect::<Vec<_>>(),
            ),
            Column::new(
                summary::COUNT.into(),
                rows.iter().map(|r| r.count).collect::<Vec<_>>(),
            ),
        ];

        for (j, name) in self.payment_columns.iter().enumerate() {
            columns.push(Column::new(
                format!("{}{name}", summary::TOTAL_PREFIX).into(),
                rows.iter().map(|r| r.payment_totals[j]).collect::<Vec<_>>(),
            ));
        }
        columns.push(Column::new(
            summary::TOTAL_ALL_PAYMENTS.into(),
            rows.iter().map(|r| r.total_all_payments).collect::<Vec<_>>(),
        ));

        for (k, label) in self.sub_statuses.iter().enumerate() {
            columns.push(Column::new(
                label.as_str().into(),
                rows.iter().map(|r| r.sub_status_counts[k]).collect::<Vec<_>>(),
            ));
        }
        columns.push(Column::new(
            summary::UNRECOGNIZED.into(),
            rows.iter().map(|r| r.unrecognized).collect::<Vec<_>>(),
        ));

        columns.push(Column::new(
            summary::CA_REEL.into(),
            rows.iter().map(|r| r.ca_reel).collect::<Vec<_>>(),
        ));
        columns.push(Column::new(
            summary::CA_PREVISIONNEL.into(),
            rows.iter().map(|r| r.ca_previsionnel).collect::<Vec<_>>(),
        ));
        columns.push(Column::new(
            summary::CA_POTENTIEL.into(),
            rows.iter().map(|r| r.ca_potentiel).collect::<Vec<_>>(),
        ));

        Ok(DataFrame::new(columns)?)
    }

    /// `Statuts_Intermédiaires` layout: cycle, status, count and sub-status
    /// columns, keeping rows where at least one sub-status count is positive.
    pub fn intermediary_frame(&self) -> Result<DataFrame, ReportError> {
        let mut selection = vec![
            col(formation::VAGUE),
            col(formation::ETAT),
            col(summary::COUNT),
        ];
        selection.extend(self.sub_statuses.iter().map(|s| col(s.as_str())));

        let any_positive = self
            .sub_statuses
            .iter()
            .map(|s| col(s.as_str()).gt(lit(0)))
            .reduce(|acc, e| acc.or(e))
            .unwrap_or_else(|| lit(false));

        let df = self
            .to_frame()?
            .lazy()
            .select(selection)
            .filter(any_positive)
            .collect()?;
        Ok(df)
    }

    pub fn revenue_overview(&self) -> RevenueOverview {
        self.rows
            .iter()
            .fold(RevenueOverview::default(), |acc, r| RevenueOverview {
                ca_reel: acc.ca_reel + r.ca_reel,
                ca_previsionnel: acc.ca_previsionnel + r.ca_previsionnel,
                ca_potentiel: acc.ca_potentiel + r.ca_potentiel,
            })
    }

    /// Payments recorded against Prévisionnel / Potentiel rows (expected 0).
    pub fn payment_anomalies(&self) -> Vec<(StatusCategory, f64)> {
        [StatusCategory::Previsionnel, StatusCategory::Potentiel]
            .into_iter()
            .filter_map(|cat| {
                let total: f64 = self
                    .rows
                    .iter()
                    .filter(|r| r.status.category() == Some(cat))
                    .map(|r| r.total_all_payments)
                    .sum();
                (total > 0.0).then_some((cat, total))
            })
            .collect()
    }

    pub fn unrecognized_total(&self) -> u32 {
        self.rows.iter().map(|r| r.unrecognized).sum()
    }
}

// ── Promo breakdown ─────────────────────────────────────────────────────────

/// Trimmed, upper-cased promo; blank and `NAN` are dropped.
pub fn normalize_promo(raw: &str) -> Option<String> {
    let promo = raw.trim().to_uppercase();
    if promo.is_empty() || promo == "NAN" {
        None
    } else {
        Some(promo)
    }
}

/// Count Réel formations per (cycle, promo), most frequent first within a cycle.
pub fn promo_breakdown(records: &[FormationRecord]) -> Vec<PromoCount> {
    let mut out = Vec::new();
    for (vague, in_cycle) in group_by_cycle(records) {
        let promos = in_cycle
            .into_iter()
            .filter(|r| {
                r.status.as_ref().and_then(Status::category) == Some(StatusCategory::Reel)
            })
            .filter_map(|r| r.promo.as_deref().and_then(normalize_promo))
            .map(|promo| (promo, ()));
        let mut counts: Vec<(String, u32)> = group_ordered(promos)
            .into_iter()
            .map(|(promo, hits)| (promo, hits.len() as u32))
            .collect();
        // stable: ties keep first appearance
        counts.sort_by(|a, b| b.1.cmp(&a.1));
        out.extend(counts.into_iter().map(|(promo, count)| PromoCount {
            vague: vague.to_string(),
            promo,
            count,
        }));
    }
    out
}

pub fn promo_frame(promos: &[PromoCount]) -> Result<DataFrame, ReportError> {
    Ok(DataFrame::new(vec![
        Column::new(
            formation::VAGUE.into(),
            promos.iter().map(|p| p.vague.clone()).collect::<Vec<_>>(),
        ),
        Column::new(
            formation::PROMO.into(),
            promos.iter().map(|p| p.promo.clone()).collect::<Vec<_>>(),
        ),
        Column::new(
            summary::COUNT.into(),
            promos.iter().map(|p| p.count).collect::<Vec<_>>(),
        ),
    ])?)
}
