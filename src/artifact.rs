use std::fs::{self, File};
use std::path::Path;

use polars::prelude::*;
use tracing::debug;

use crate::error::ReportError;

/// Write `df` as a `;`-separated UTF-8 CSV with BOM and a header row,
/// creating the parent directory when needed. Overwrites.
pub fn write_csv(df: &mut DataFrame, path: &Path) -> Result<(), ReportError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file)
        .include_bom(true)
        .include_header(true)
        .with_separator(b';')
        .finish(df)?;
    debug!(path = %path.display(), rows = df.height(), "wrote artifact");
    Ok(())
}

/// Remove a file left by a previous run. Missing files are fine.
pub fn remove_stale(path: &Path) -> Result<bool, ReportError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_bom_and_semicolons() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.csv");
        let mut df = DataFrame::new(vec![
            Column::new("Vague".into(), &["1", "2"]),
            Column::new("ÉTAT".into(), &["Réel", "Potentiel"]),
        ])
        .unwrap();

        write_csv(&mut df, &path).unwrap();
        let bytes = fs::read(&path).unwrap();
        assert!(bytes.starts_with(&[0xEF, 0xBB, 0xBF]));
        let text = String::from_utf8(bytes[3..].to_vec()).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("Vague;ÉTAT"));
        assert_eq!(lines.next(), Some("1;Réel"));
    }

    #[test]
    fn stale_removal_tolerates_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.csv");
        assert!(!remove_stale(&path).unwrap());
        fs::write(&path, "x").unwrap();
        assert!(remove_stale(&path).unwrap());
        assert!(!path.exists());
    }
}
