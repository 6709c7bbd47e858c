//! Workbook ingestion through calamine.
//!
//! Every cell is rendered as text so the resulting frame has only `String`
//! columns, the same shape the CSV reader produces.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use chrono::{NaiveDate, NaiveTime, TimeDelta};
use polars::prelude::*;
use tracing::debug;

use crate::error::ReportError;
use crate::text::nfc;

/// Workbook extensions handled by calamine.
pub const WORKBOOK_EXTENSIONS: [&str; 5] = ["xlsx", "xlsm", "xlsb", "xls", "ods"];

/// Read one sheet into a DataFrame; the first row is the header.
/// Rows where every cell is empty are skipped.
pub fn read_sheet(path: &Path, sheet: &str) -> Result<DataFrame, ReportError> {
    let mut workbook = open_workbook_auto(path)?;

    let names = workbook.sheet_names();
    if !names.iter().any(|n| n == sheet) {
        return Err(ReportError::SheetNotFound {
            sheet: sheet.to_string(),
            available: names.join(", "),
        });
    }

    let range = workbook.worksheet_range(sheet)?;
    let mut rows = range.rows();

    let Some(header_row) = rows.next() else {
        return Err(ReportError::InvalidData(format!(
            "sheet '{sheet}' is empty"
        )));
    };
    let headers = header_names(header_row);
    let width = headers.len();

    let mut values: Vec<Vec<Option<String>>> = vec![Vec::new(); width];
    let mut skipped = 0usize;
    for row in rows {
        let cells: Vec<Option<String>> = (0..width)
            .map(|i| row.get(i).and_then(cell_to_string))
            .collect();
        if cells.iter().all(Option::is_none) {
            skipped += 1;
            continue;
        }
        for (i, cell) in cells.into_iter().enumerate() {
            values[i].push(cell);
        }
    }
    debug!(sheet, skipped, "skipped blank rows");

    let columns: Vec<Column> = headers
        .iter()
        .zip(values.iter())
        .map(|(name, vals)| Column::new(name.as_str().into(), vals.as_slice()))
        .collect();

    Ok(DataFrame::new(columns)?)
}

/// Header texts, with blank names replaced and duplicates suffixed.
pub fn header_names(row: &[Data]) -> Vec<String> {
    let raw: Vec<String> = row
        .iter()
        .map(|c| cell_to_string(c).unwrap_or_default())
        .collect();
    dedupe_headers(raw)
}

/// Trim/NFC names, name blanks `Column_<n>` and suffix repeats with `_<n>`.
pub fn dedupe_headers(raw: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(raw.len());
    for (i, name) in raw.into_iter().enumerate() {
        let name = nfc(name.trim_start_matches('\u{feff}').trim());
        let base = if name.is_empty() {
            format!("Column_{}", i + 1)
        } else {
            name
        };
        let mut candidate = base.clone();
        let mut n = 2;
        while out.contains(&candidate) {
            candidate = format!("{base}_{n}");
            n += 1;
        }
        out.push(candidate);
    }
    out
}

/// Render a cell as text. Empty cells and empty strings are `None`.
pub fn cell_to_string(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty => None,
        Data::String(s) => {
            if s.is_empty() {
                None
            } else {
                Some(nfc(s))
            }
        }
        Data::Float(n) => Some(format_number(*n)),
        Data::Int(n) => Some(n.to_string()),
        Data::Bool(b) => Some(if *b { "TRUE" } else { "FALSE" }.to_string()),
        Data::Error(e) => Some(e.to_string()),
        Data::DateTime(dt) => Some(format_excel_serial(dt.as_f64())),
        Data::DateTimeIso(s) => Some(s.clone()),
        Data::DurationIso(s) => Some(s.clone()),
    }
}

/// Integers without decimals, everything else in shortest form.
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Excel serial (1900 system) to `YYYY-MM-DD`, with time when present.
/// Serials outside chrono's date range are kept as plain numbers.
pub fn format_excel_serial(serial: f64) -> String {
    let Some(epoch) = NaiveDate::from_ymd_opt(1899, 12, 30) else {
        return format_number(serial);
    };
    if !serial.is_finite() {
        return format_number(serial);
    }
    let days = serial.floor();
    let secs = ((serial - days) * 86_400.0).round() as i64;
    let Some(date) = TimeDelta::try_days(days as i64).and_then(|d| epoch.checked_add_signed(d))
    else {
        return format_number(serial);
    };
    if secs == 0 {
        return date.format("%Y-%m-%d").to_string();
    }
    let dt = TimeDelta::try_seconds(secs)
        .and_then(|offset| date.and_time(NaiveTime::MIN).checked_add_signed(offset));
    match dt {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => date.format("%Y-%m-%d").to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::CellErrorType;

    #[test]
    fn cells_render_as_text() {
        assert_eq!(cell_to_string(&Data::Empty), None);
        assert_eq!(cell_to_string(&Data::String(String::new())), None);
        assert_eq!(cell_to_string(&Data::Float(1000.0)).as_deref(), Some("1000"));
        assert_eq!(cell_to_string(&Data::Float(12.5)).as_deref(), Some("12.5"));
        assert_eq!(cell_to_string(&Data::Int(3)).as_deref(), Some("3"));
        assert_eq!(cell_to_string(&Data::Bool(true)).as_deref(), Some("TRUE"));
        assert_eq!(
            cell_to_string(&Data::Error(CellErrorType::Div0)).as_deref(),
            Some("#DIV/0!")
        );
    }

    #[test]
    fn excel_serials() {
        assert_eq!(format_excel_serial(45717.0), "2025-03-01");
        assert_eq!(format_excel_serial(45717.5), "2025-03-01 12:00:00");
    }

    #[test]
    fn unrepresentable_serials_stay_numeric() {
        assert_eq!(format_excel_serial(1e12), "1000000000000");
        assert_eq!(format_excel_serial(-1e12), "-1000000000000");
        assert_eq!(format_excel_serial(1e9), "1000000000");
        assert_eq!(format_excel_serial(f64::NAN), "NaN");
        assert_eq!(
            cell_to_string(&Data::Float(-1e12)).as_deref(),
            Some("-1000000000000")
        );
    }

    #[test]
    fn headers_are_unique() {
        let headers = dedupe_headers(vec![
            "\u{feff}Vague".into(),
            " ÉTAT ".into(),
            "".into(),
            "PROMO".into(),
            "PROMO".into(),
        ]);
        assert_eq!(headers, vec!["Vague", "ÉTAT", "Column_3", "PROMO", "PROMO_2"]);
    }
}
