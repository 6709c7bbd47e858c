use std::collections::HashMap;
use std::hash::Hash;

use polars::prelude::*;
use tracing::info;

use crate::error::ReportError;
use crate::model::{FormationRecord, FormationTable};
use crate::text::path_safe;

/// Rows of one cycle, original order preserved.
#[derive(Debug, Clone)]
pub struct CyclePartition {
    pub vague: String,
    pub frame: DataFrame,
}

impl CyclePartition {
    /// `<stem>_Vague_<cycle>.csv` with path separators replaced.
    pub fn file_name(&self, stem: &str) -> String {
        format!("{stem}_Vague_{}.csv", path_safe(&self.vague))
    }
}

/// Group values by key; groups and the values inside them keep their order
/// of first appearance.
pub fn group_ordered<K, V, I>(items: I) -> Vec<(K, Vec<V>)>
where
    K: Eq + Hash + Clone,
    I: IntoIterator<Item = (K, V)>,
{
    let mut slots: HashMap<K, usize> = HashMap::new();
    let mut groups: Vec<(K, Vec<V>)> = Vec::new();
    for (key, value) in items {
        match slots.get(&key) {
            Some(&slot) => groups[slot].1.push(value),
            None => {
                slots.insert(key.clone(), groups.len());
                groups.push((key, vec![value]));
            }
        }
    }
    groups
}

/// Records grouped by non-blank cycle, in order of first appearance.
pub fn group_by_cycle(records: &[FormationRecord]) -> Vec<(&str, Vec<&FormationRecord>)> {
    group_ordered(
        records
            .iter()
            .filter_map(|r| r.vague.as_deref().map(|v| (v, r))),
    )
}

/// Split the table per cycle. Rows without a cycle belong to no partition.
pub fn partition_by_cycle(
    table: &FormationTable,
    records: &[FormationRecord],
) -> Result<Vec<CyclePartition>, ReportError> {
    let groups = group_ordered(
        records
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.vague.as_deref().map(|v| (v, i))),
    );
    let mut partitions = Vec::with_capacity(groups.len());

    for (vague, rows) in groups {
        let frame = table.take_rows(&rows)?;
        info!(vague = %vague, rows = frame.height(), "partition");
        partitions.push(CyclePartition {
            vague: vague.to_string(),
            frame,
        });
    }

    let orphans = records.iter().filter(|r| r.vague.is_none()).count();
    if orphans > 0 {
        info!(rows = orphans, "rows without a cycle left out of partitions");
    }
    Ok(partitions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::formation;

    fn table() -> FormationTable {
        let df = DataFrame::new(vec![
            Column::new(
                "Vague".into(),
                &[Some("2"), Some("1"), None, Some("2"), Some("2024/1")],
            ),
            Column::new("ÉTAT".into(), &[Some("Réel"), Some("Potentiel"), Some("Réel"), None, None]),
            Column::new("id".into(), &[Some("a"), Some("b"), Some("c"), Some("d"), Some("e")]),
        ])
        .unwrap();
        let payments: Vec<String> = formation::PAYMENTS.iter().map(|s| s.to_string()).collect();
        FormationTable::from_frame(df, &payments).unwrap()
    }

    #[test]
    fn partitions_are_disjoint_and_ordered() {
        let table = table();
        let records = table.records().unwrap();
        let parts = partition_by_cycle(&table, &records).unwrap();

        let names: Vec<&str> = parts.iter().map(|p| p.vague.as_str()).collect();
        assert_eq!(names, vec!["2", "1", "2024/1"]);

        let ids = |p: &CyclePartition| -> Vec<String> {
            p.frame
                .column("id")
                .unwrap()
                .str()
                .unwrap()
                .into_iter()
                .map(|v| v.unwrap().to_string())
                .collect()
        };
        assert_eq!(ids(&parts[0]), vec!["a", "d"]);
        assert_eq!(ids(&parts[1]), vec!["b"]);
        assert_eq!(ids(&parts[2]), vec!["e"]);

        let total: usize = parts.iter().map(|p| p.frame.height()).sum();
        assert_eq!(total, 4); // row "c" has no cycle
        assert_eq!(parts[0].frame.width(), 3);
    }

    #[test]
    fn file_names_are_path_safe() {
        let table = table();
        let records = table.records().unwrap();
        let parts = partition_by_cycle(&table, &records).unwrap();
        assert_eq!(parts[2].file_name("FAC"), "FAC_Vague_2024_1.csv");
    }

    #[test]
    fn grouping_keeps_first_appearance() {
        let groups = group_ordered([("b", 1), ("a", 2), ("b", 3), ("c", 4), ("a", 5)]);
        assert_eq!(
            groups,
            vec![("b", vec![1, 3]), ("a", vec![2, 5]), ("c", vec![4])]
        );
    }

    #[test]
    fn many_cycles_partition_in_one_pass() {
        let n = 20_000;
        let vagues: Vec<String> = (0..n).map(|i| format!("{}", i % 5_000)).collect();
        let ids: Vec<String> = (0..n).map(|i| i.to_string()).collect();
        let df = DataFrame::new(vec![
            Column::new("Vague".into(), vagues),
            Column::new("ÉTAT".into(), vec!["Réel"; n]),
            Column::new("id".into(), ids),
        ])
        .unwrap();
        let payments: Vec<String> = formation::PAYMENTS.iter().map(|s| s.to_string()).collect();
        let table = FormationTable::from_frame(df, &payments).unwrap();
        let records = table.records().unwrap();

        let parts = partition_by_cycle(&table, &records).unwrap();
        assert_eq!(parts.len(), 5_000);
        assert_eq!(parts[4_999].vague, "4999");
        let last = parts[4_999].frame.column("id").unwrap().str().unwrap();
        let ids: Vec<&str> = last.into_iter().flatten().collect();
        assert_eq!(ids, vec!["4999", "9999", "14999", "19999"]);
        assert_eq!(group_by_cycle(&records).len(), 5_000);
    }
}
