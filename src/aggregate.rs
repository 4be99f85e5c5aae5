//! Incremental Aggregation
//!
//! [`ResultTable`] holds the running totals of a query. Each filtered batch is
//! grouped and summed on its own, and only those batch-local sums are folded
//! into the running table. Earlier batches are never revisited, so the cost of
//! a merge depends on the batch, not on how much input has been seen.
//!
//! ## Batch invariance
//!
//! Totals are [`Hours`] in integer hundredths. Integer addition is associative
//! and commutative, which makes the final table independent of how the input
//! was split into batches: merging batches `A` then `B` yields exactly the
//! table a single merge of `A ++ B` yields.
//!
//! ## Ordering
//!
//! Rows are keyed by [`AggregateKey`] in a `BTreeMap`, so they come out sorted
//! by calendar date (not by the `DD-MM-YYYY` string) and then by name.

use crate::models::{AggregateKey, Hours, NormalizedEntry, ResultRow};
use chrono::NaiveDate;
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultTable {
    include_names: bool,
    totals: BTreeMap<AggregateKey, Hours>,
}

impl ResultTable {
    pub fn new(include_names: bool) -> Self {
        Self {
            include_names,
            totals: BTreeMap::new(),
        }
    }

    pub fn include_names(&self) -> bool {
        self.include_names
    }

    pub fn len(&self) -> usize {
        self.totals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }

    /// Fold a filtered batch into the running totals.
    pub fn merge(&mut self, entries: &[NormalizedEntry]) {
        for (key, hours) in group_batch(entries, self.include_names) {
            *self.totals.entry(key).or_insert(Hours::ZERO) += hours;
        }
    }

    /// Total for one key. `full_name` is ignored when names are not included.
    pub fn get(&self, date: NaiveDate, full_name: Option<&str>) -> Option<Hours> {
        let key = AggregateKey {
            date,
            full_name: if self.include_names {
                full_name.map(str::to_string)
            } else {
                None
            },
        };
        self.totals.get(&key).copied()
    }

    /// Sum of every row.
    pub fn total(&self) -> Hours {
        self.totals.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AggregateKey, Hours)> + '_ {
        self.totals.iter().map(|(key, hours)| (key, *hours))
    }

    /// Rows in output order.
    pub fn rows(&self) -> Vec<ResultRow> {
        self.iter()
            .map(|(key, total_hours)| ResultRow {
                date: key.date,
                full_name: key.full_name.clone(),
                total_hours,
            })
            .collect()
    }
}

impl Serialize for ResultTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.rows())
    }
}

/// Functional form of [`ResultTable::merge`].
pub fn merge(mut table: ResultTable, entries: &[NormalizedEntry]) -> ResultTable {
    table.merge(entries);
    table
}

/// Group one batch by key and sum its hours.
fn group_batch(entries: &[NormalizedEntry], include_names: bool) -> HashMap<AggregateKey, Hours> {
    let mut sums: HashMap<AggregateKey, Hours> = HashMap::new();
    for entry in entries {
        *sums
            .entry(AggregateKey::for_entry(entry, include_names))
            .or_insert(Hours::ZERO) += entry.hours;
    }
    sums
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32, m: u32, y: i32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn entry(name: &str, day: NaiveDate, hundredths: i64) -> NormalizedEntry {
        NormalizedEntry {
            full_name: name.to_string(),
            date: day,
            hours: Hours::from_hundredths(hundredths),
        }
    }

    fn sample() -> Vec<NormalizedEntry> {
        vec![
            entry("h.simpson", date(2, 1, 2000), 1000),
            entry("d.vader", date(12, 9, 2000), 525),
            entry("h.simpson", date(30, 7, 2009), 133),
            entry("d.vader", date(2, 1, 2000), 250),
            entry("h.simpson", date(2, 1, 2000), 75),
        ]
    }

    #[test]
    fn test_without_names_sums_across_people() {
        let table = merge(ResultTable::new(false), &sample());
        assert_eq!(table.len(), 3);
        assert_eq!(table.get(date(2, 1, 2000), None), Some(Hours::from_hundredths(1325)));
    }

    #[test]
    fn test_with_names_keeps_people_apart() {
        let table = merge(ResultTable::new(true), &sample());
        assert_eq!(table.len(), 4);
        assert_eq!(
            table.get(date(2, 1, 2000), Some("h.simpson")),
            Some(Hours::from_hundredths(1075))
        );
        assert_eq!(
            table.get(date(2, 1, 2000), Some("d.vader")),
            Some(Hours::from_hundredths(250))
        );
    }

    #[test]
    fn test_rows_sorted_by_calendar_date_then_name() {
        let table = merge(ResultTable::new(true), &sample());
        let order: Vec<(String, Option<String>)> = table
            .rows()
            .into_iter()
            .map(|row| (row.date_string(), row.full_name))
            .collect();
        assert_eq!(
            order,
            vec![
                ("02-01-2000".to_string(), Some("d.vader".to_string())),
                ("02-01-2000".to_string(), Some("h.simpson".to_string())),
                ("12-09-2000".to_string(), Some("d.vader".to_string())),
                ("30-07-2009".to_string(), Some("h.simpson".to_string())),
            ]
        );
    }

    #[test]
    fn test_merge_is_batch_invariant() {
        let entries = sample();
        let whole = merge(ResultTable::new(true), &entries);
        for split in 0..=entries.len() {
            let (left, right) = entries.split_at(split);
            let pieces = merge(merge(ResultTable::new(true), left), right);
            assert_eq!(pieces, whole, "split at {}", split);
        }
        let mut one_by_one = ResultTable::new(true);
        for e in entries.iter().rev() {
            one_by_one.merge(std::slice::from_ref(e));
        }
        assert_eq!(one_by_one, whole);
    }

    #[test]
    fn test_empty_batch_is_identity() {
        let table = merge(ResultTable::new(false), &sample());
        let after = merge(table.clone(), &[]);
        assert_eq!(after, table);
        assert!(merge(ResultTable::new(false), &[]).is_empty());
    }

    #[test]
    fn test_total() {
        let table = merge(ResultTable::new(false), &sample());
        assert_eq!(table.total(), Hours::from_hundredths(1983));
    }

    #[test]
    fn test_serializes_as_rows() {
        let table = merge(
            ResultTable::new(false),
            &[entry("a", date(4, 1, 2020), 600)],
        );
        let json = serde_json::to_string(&table).unwrap();
        assert_eq!(json, r#"[{"date":"04-01-2020","total_hours":6.0}]"#);
    }
}
