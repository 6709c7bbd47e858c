//! Cell cleansing: spreadsheet error tokens become null and typographic
//! punctuation is folded to ASCII. Shape is preserved.

use polars::prelude::*;
use tracing::{debug, info};

use crate::error::ReportError;
use crate::schema::tokens::SPREADSHEET_ERRORS;
use crate::text::replace_unsupported_punctuation;

pub fn is_error_token(value: &str) -> bool {
    SPREADSHEET_ERRORS.contains(&value.trim())
}

/// Cleanse one cell; `None` for error tokens.
pub fn cleanse_cell(value: &str) -> Option<String> {
    if is_error_token(value) {
        None
    } else {
        Some(replace_unsupported_punctuation(value))
    }
}

/// Cleanse every String column. Non-string columns are left untouched.
pub fn cleanse_frame(df: DataFrame) -> Result<DataFrame, ReportError> {
    let height = df.height();
    let mut nulled = 0usize;
    let mut columns = Vec::with_capacity(df.width());

    for column in df.get_columns() {
        if column.dtype() != &DataType::String {
            columns.push(column.clone());
            continue;
        }
        let ca = column.str()?;
        let cleaned: StringChunked = ca
            .into_iter()
            .map(|v| {
                v.and_then(|s| {
                    let out = cleanse_cell(s);
                    if out.is_none() {
                        nulled += 1;
                    }
                    out
                })
            })
            .collect();
        columns.push(Column::from(
            cleaned.with_name(column.name().clone()).into_series(),
        ));
    }

    let out = DataFrame::new(columns)?;
    debug_assert_eq!(out.height(), height);
    if nulled > 0 {
        info!(cells = nulled, "spreadsheet error tokens replaced by null");
    } else {
        debug!("no spreadsheet error tokens found");
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_tokens_become_null() {
        for token in SPREADSHEET_ERRORS {
            assert_eq!(cleanse_cell(token), None, "{token}");
        }
        assert_eq!(cleanse_cell("Dépôt – brouillon…").as_deref(), Some("Dépôt - brouillon..."));
    }

    #[test]
    fn frame_shape_is_preserved() {
        let df = DataFrame::new(vec![
            Column::new("Vague".into(), &[Some("1"), Some("#N/A"), None]),
            Column::new("PAIEMENT 1".into(), &[Some("#DIV/0!"), Some("10"), Some("x — y")]),
            Column::new("n".into(), &[1i64, 2, 3]),
        ])
        .unwrap();

        let out = cleanse_frame(df).unwrap();
        assert_eq!(out.shape(), (3, 3));
        assert_eq!(
            out.get_column_names_str(),
            vec!["Vague", "PAIEMENT 1", "n"]
        );

        let vague = out.column("Vague").unwrap().str().unwrap();
        assert_eq!(vague.get(0), Some("1"));
        assert_eq!(vague.get(1), None);
        assert_eq!(vague.get(2), None);

        let pay = out.column("PAIEMENT 1").unwrap().str().unwrap();
        assert_eq!(pay.get(0), None);
        assert_eq!(pay.get(2), Some("x - y"));

        assert_eq!(out.column("n").unwrap().dtype(), &DataType::Int64);
    }
}
