use std::collections::HashMap;
use std::path::Path;

use chrono::NaiveDate;
use polars::prelude::*;
use tracing::{debug, info, warn};

use crate::catalog::{Status, StatusCategory};
use crate::cleanse;
use crate::error::ReportError;
use crate::schema::formation;
use crate::text::{canonical_key, nfc, parse_amount, parse_date};
use crate::workbook::{self, WORKBOOK_EXTENSIONS};

// ── Column resolution ───────────────────────────────────────────────────────

/// Actual header names for the logical columns the pipeline reads.
///
/// Headers are matched by canonical key so `ETAT`, `État` and `ÉTAT` all
/// resolve to the same logical column.
#[derive(Debug, Clone)]
pub struct ColumnMap {
    pub vague: String,
    pub etat: String,
    pub details: HashMap<StatusCategory, String>,
    /// (configured name, header) for each payment column present
    pub payments: Vec<(String, String)>,
    pub next_invoice: Option<String>,
    pub training_start: Option<String>,
    pub promo: Option<String>,
}

impl ColumnMap {
    pub fn resolve(df: &DataFrame, payment_columns: &[String]) -> Result<Self, ReportError> {
        let headers: Vec<String> = df
            .get_column_names_str()
            .iter()
            .map(|s| s.to_string())
            .collect();
        let find = |logical: &str| -> Option<String> {
            let key = canonical_key(logical);
            headers.iter().find(|h| canonical_key(h) == key).cloned()
        };

        let vague = find(formation::VAGUE)
            .ok_or_else(|| ReportError::MissingColumn(formation::VAGUE.to_string()))?;
        let etat = find(formation::ETAT)
            .ok_or_else(|| ReportError::MissingColumn(formation::ETAT.to_string()))?;

        let details: HashMap<StatusCategory, String> = StatusCategory::ALL
            .iter()
            .filter_map(|cat| find(cat.label()).map(|h| (*cat, h)))
            .collect();
        for cat in StatusCategory::ALL {
            if !details.contains_key(&cat) {
                warn!(column = cat.label(), "detail column not found");
            }
        }

        let payments: Vec<(String, String)> = payment_columns
            .iter()
            .filter_map(|p| find(p).map(|h| (p.clone(), h)))
            .collect();
        if payments.is_empty() {
            warn!("no payment columns found; payment totals will be 0");
        }

        Ok(Self {
            vague,
            etat,
            details,
            payments,
            next_invoice: find(formation::PROCHAINE_FACTURATION),
            training_start: find(formation::DATE_DEBUT_FORMATION),
            promo: find(formation::PROMO),
        })
    }

    pub fn detail(&self, category: StatusCategory) -> Option<&str> {
        self.details.get(&category).map(String::as_str)
    }
}

// ── Typed row view ──────────────────────────────────────────────────────────

/// Typed view over one row. Invalid numbers and dates are `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormationRecord {
    pub vague: Option<String>,
    pub status: Option<Status>,
    pub details: HashMap<StatusCategory, String>,
    /// Aligned with `ColumnMap::payments`
    pub payments: Vec<Option<f64>>,
    pub next_invoice: Option<NaiveDate>,
    pub training_start: Option<NaiveDate>,
    pub promo: Option<String>,
}

impl FormationRecord {
    pub fn detail(&self, category: StatusCategory) -> Option<&str> {
        self.details.get(&category).map(String::as_str)
    }
}

// ── Table ───────────────────────────────────────────────────────────────────

/// The loaded sheet: all original columns as strings plus resolved logical columns.
#[derive(Debug, Clone)]
pub struct FormationTable {
    frame: DataFrame,
    columns: ColumnMap,
}

impl FormationTable {
    /// Load a workbook sheet or a `;` CSV export.
    pub fn load(path: &Path, sheet: &str, payment_columns: &[String]) -> Result<Self, ReportError> {
        if !path.is_file() {
            return Err(ReportError::InputNotFound(path.to_path_buf()));
        }
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        let frame = if WORKBOOK_EXTENSIONS.contains(&ext.as_str()) {
            workbook::read_sheet(path, sheet)?
        } else {
            normalize_text(read_csv_as_strings(path)?)?
        };
        info!(
            path = %path.display(),
            rows = frame.height(),
            columns = frame.width(),
            "loaded input table"
        );
        Self::from_frame(frame, payment_columns)
    }

    /// Wrap an all-string frame, resolving the logical columns.
    pub fn from_frame(frame: DataFrame, payment_columns: &[String]) -> Result<Self, ReportError> {
        for column in frame.get_columns() {
            if column.dtype() != &DataType::String {
                return Err(ReportError::InvalidData(format!(
                    "column '{}' must hold strings, found {}",
                    column.name(),
                    column.dtype()
                )));
            }
        }
        let columns = ColumnMap::resolve(&frame, payment_columns)?;
        debug!(?columns, "resolved columns");
        Ok(Self { frame, columns })
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn columns(&self) -> &ColumnMap {
        &self.columns
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    /// Null out spreadsheet error tokens and ASCII-fold punctuation.
    pub fn cleanse(self) -> Result<Self, ReportError> {
        let frame = cleanse::cleanse_frame(self.frame)?;
        Ok(Self {
            frame,
            columns: self.columns,
        })
    }

    /// Row subset as a plain frame, keeping every original column.
    pub fn select_rows(&self, mask: &[bool]) -> Result<DataFrame, ReportError> {
        let mask = BooleanChunked::from_slice("mask".into(), mask);
        Ok(self.frame.filter(&mask)?)
    }

    /// Rows at the given positions, in that order.
    pub fn take_rows(&self, rows: &[usize]) -> Result<DataFrame, ReportError> {
        let idx = IdxCa::from_vec("rows".into(), rows.iter().map(|&i| i as IdxSize).collect());
        Ok(self.frame.take(&idx)?)
    }

    /// Typed records, one per row, in table order.
    pub fn records(&self) -> Result<Vec<FormationRecord>, ReportError> {
        let cols = &self.columns;
        let vague = self.frame.column(&cols.vague)?.str()?;
        let etat = self.frame.column(&cols.etat)?.str()?;

        let mut details: Vec<(StatusCategory, &StringChunked)> = Vec::new();
        for (cat, name) in &cols.details {
            details.push((*cat, self.frame.column(name)?.str()?));
        }
        let mut payments: Vec<&StringChunked> = Vec::new();
        for (_, name) in &cols.payments {
            payments.push(self.frame.column(name)?.str()?);
        }
        let next_invoice = optional_column(&self.frame, cols.next_invoice.as_deref())?;
        let training_start = optional_column(&self.frame, cols.training_start.as_deref())?;
        let promo = optional_column(&self.frame, cols.promo.as_deref())?;

        let mut records = Vec::with_capacity(self.frame.height());
        for i in 0..self.frame.height() {
            records.push(FormationRecord {
                vague: non_blank(vague.get(i)),
                status: etat.get(i).and_then(Status::parse),
                details: details
                    .iter()
                    .filter_map(|(cat, ca)| non_blank(ca.get(i)).map(|v| (*cat, v)))
                    .collect(),
                payments: payments.iter().map(|ca| ca.get(i).and_then(parse_amount)).collect(),
                next_invoice: next_invoice.and_then(|ca| ca.get(i)).and_then(parse_date),
                training_start: training_start.and_then(|ca| ca.get(i)).and_then(parse_date),
                promo: promo.and_then(|ca| non_blank(ca.get(i))),
            });
        }
        Ok(records)
    }
}

fn optional_column<'a>(
    df: &'a DataFrame,
    name: Option<&str>,
) -> Result<Option<&'a StringChunked>, ReportError> {
    match name {
        Some(n) => Ok(Some(df.column(n)?.str()?)),
        None => Ok(None),
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

// ── Private helpers ─────────────────────────────────────────────────────────

/// Read a `;` CSV file with all columns as String dtype.
pub(crate) fn read_csv_as_strings(path: &Path) -> Result<DataFrame, ReportError> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0)) // all columns as String
        .map_parse_options(|opts| opts.with_separator(b';'))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;
    Ok(df)
}

/// Trim/NFC/dedupe headers and NFC every text cell.
fn normalize_text(mut df: DataFrame) -> Result<DataFrame, ReportError> {
    let names: Vec<String> = workbook::dedupe_headers(
        df.get_column_names_str()
            .iter()
            .map(|s| s.to_string())
            .collect(),
    );
    df.set_column_names(names.as_slice())?;

    let mut columns = Vec::with_capacity(df.width());
    for column in df.get_columns() {
        let ca = column.str()?;
        let normalized: StringChunked = ca
            .into_iter()
            .map(|v| v.filter(|s| !s.is_empty()).map(nfc))
            .collect();
        columns.push(Column::from(
            normalized.with_name(column.name().clone()).into_series(),
        ));
    }
    Ok(DataFrame::new(columns)?)
}
