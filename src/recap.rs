use std::fs;
use std::path::{Path, PathBuf};

use polars::prelude::*;
use tracing::{info, warn};

use crate::artifact;
use crate::error::ReportError;
use crate::model::read_csv_as_strings;
use crate::schema::{artifact as names, recap};
use crate::text::canonical_key;

/// One checklist artifact and its data-row count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecapEntry {
    pub file: String,
    pub rows: usize,
}

#[derive(Debug, Clone)]
pub struct Recap {
    /// Sorted by row count descending, then file name
    pub entries: Vec<RecapEntry>,
    pub path: PathBuf,
}

impl Recap {
    pub fn total(&self) -> usize {
        self.entries.iter().map(|e| e.rows).sum()
    }

    /// Rows for the checklist whose file stem is `stem`, if present.
    pub fn rows_for(&self, stem: &str) -> Option<usize> {
        let key = canonical_key(stem);
        self.entries
            .iter()
            .find(|e| {
                let entry_stem = Path::new(&e.file)
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or_default();
                canonical_key(entry_stem) == key
            })
            .map(|e| e.rows)
    }

    /// Attachment set: every checklist file then the recap itself.
    pub fn files(&self) -> Vec<PathBuf> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new(""));
        self.entries
            .iter()
            .map(|e| dir.join(&e.file))
            .chain(std::iter::once(self.path.clone()))
            .collect()
    }

    pub fn to_frame(&self) -> Result<DataFrame, ReportError> {
        let mut files: Vec<String> = self.entries.iter().map(|e| e.file.clone()).collect();
        let mut rows: Vec<u64> = self.entries.iter().map(|e| e.rows as u64).collect();
        files.push(recap::TOTAL.to_string());
        rows.push(self.total() as u64);
        Ok(DataFrame::new(vec![
            Column::new(recap::FICHIER.into(), files),
            Column::new(recap::NOMBRE_DE_LIGNES.into(), rows),
        ])?)
    }
}

/// Count rows of every `*.csv` in `dir` except a previous recap.
/// Unreadable files are skipped with a warning.
pub fn collect_entries(dir: &Path) -> Result<Vec<RecapEntry>, ReportError> {
    if !dir.is_dir() {
        warn!(dir = %dir.display(), "checklist directory not found");
        return Ok(Vec::new());
    }

    let mut entries = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_csv = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(names::CSV_EXT));
        let Some(file) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
            continue;
        };
        if !path.is_file() || !is_csv || file == names::RECAP {
            continue;
        }
        match read_csv_as_strings(&path) {
            Ok(df) => entries.push(RecapEntry {
                file,
                rows: df.height(),
            }),
            Err(e) => warn!(file = %file, error = %e, "cannot read checklist, skipped"),
        }
    }

    entries.sort_by(|a, b| b.rows.cmp(&a.rows).then_with(|| a.file.cmp(&b.file)));
    Ok(entries)
}

/// Build and write `checklist_recap.csv` in `dir`.
pub fn write_recap(dir: &Path) -> Result<Recap, ReportError> {
    let recap = Recap {
        entries: collect_entries(dir)?,
        path: dir.join(names::RECAP),
    };
    artifact::write_csv(&mut recap.to_frame()?, &recap.path)?;

    info!(checklists = recap.entries.len(), total = recap.total(), "recap written");
    for entry in &recap.entries {
        info!(file = %entry.file, rows = entry.rows, "recap");
    }
    Ok(recap)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, name: &str, rows: usize) {
        let mut text = String::from("\u{feff}Vague;ÉTAT\n");
        for i in 0..rows {
            text.push_str(&format!("{i};Réel\n"));
        }
        fs::write(dir.join(name), text).unwrap();
    }

    #[test]
    fn sorted_with_total() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "b.csv", 2);
        write(dir.path(), "a.csv", 2);
        write(dir.path(), "c.csv", 5);
        write(dir.path(), "checklist_recap.csv", 99);
        fs::write(dir.path().join("notes.txt"), "x").unwrap();

        let recap = write_recap(dir.path()).unwrap();
        let files: Vec<&str> = recap.entries.iter().map(|e| e.file.as_str()).collect();
        assert_eq!(files, vec!["c.csv", "a.csv", "b.csv"]);
        assert_eq!(recap.total(), 9);

        let df = recap.to_frame().unwrap();
        assert_eq!(df.height(), 4);
        let fichier = df.column("Fichier").unwrap().str().unwrap();
        assert_eq!(fichier.get(3), Some("TOTAL"));
        assert_eq!(recap.rows_for("C"), Some(5));
        assert_eq!(recap.files().len(), 4);

        // rerun ignores its own output
        let again = write_recap(dir.path()).unwrap();
        assert_eq!(again.entries, recap.entries);
    }

    #[test]
    fn unreadable_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "ok.csv", 1);
        fs::write(dir.path().join("empty.csv"), "").unwrap();

        let entries = collect_entries(dir.path()).unwrap();
        assert_eq!(
            entries,
            vec![RecapEntry {
                file: "ok.csv".into(),
                rows: 1
            }]
        );
    }

    #[test]
    fn missing_directory_yields_empty_recap() {
        let dir = tempfile::tempdir().unwrap();
        let entries = collect_entries(&dir.path().join("absent")).unwrap();
        assert!(entries.is_empty());
    }
}
