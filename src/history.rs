use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};

/// Wide table of recorded values: one row per entry date, one column per
/// parameter key that has at least one recorded value. Unrecorded cells are
/// zero-filled.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryTable {
    dates: Vec<NaiveDate>,
    columns: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl HistoryTable {
    pub fn from_records<I>(dates: impl IntoIterator<Item = NaiveDate>, records: I) -> Self
    where
        I: IntoIterator<Item = (NaiveDate, String, f64)>,
    {
        let mut all_dates: BTreeSet<NaiveDate> = dates.into_iter().collect();
        let mut by_date: BTreeMap<NaiveDate, BTreeMap<String, f64>> = BTreeMap::new();
        let mut keys = BTreeSet::new();

        for (date, key, value) in records {
            all_dates.insert(date);
            keys.insert(key.clone());
            by_date.entry(date).or_default().insert(key, value);
        }

        let columns: Vec<String> = keys.into_iter().collect();
        let dates: Vec<NaiveDate> = all_dates.into_iter().collect();
        let rows = dates
            .iter()
            .map(|date| {
                let recorded = by_date.get(date);
                columns
                    .iter()
                    .map(|key| {
                        recorded
                            .and_then(|values| values.get(key))
                            .copied()
                            .unwrap_or(0.0)
                    })
                    .collect()
            })
            .collect();

        Self {
            dates,
            columns,
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_index(&self, key: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == key)
    }

    pub fn value(&self, row: usize, column: usize) -> f64 {
        self.rows[row][column]
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    /// Keeps only rows dated strictly before `cutoff`.
    pub fn retain_before(&mut self, cutoff: NaiveDate) {
        let keep = self.dates.partition_point(|date| *date < cutoff);
        self.dates.truncate(keep);
        self.rows.truncate(keep);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn zero_fills_unrecorded_cells() {
        let table = HistoryTable::from_records(
            [day(1), day(2), day(3)],
            [
                (day(1), "sleep".to_string(), 4.0),
                (day(2), "mood".to_string(), 2.0),
            ],
        );

        assert_eq!(table.len(), 3);
        assert_eq!(table.columns(), ["mood".to_string(), "sleep".to_string()]);
        let sleep = table.column_index("sleep").unwrap();
        let mood = table.column_index("mood").unwrap();
        assert_eq!(table.value(0, sleep), 4.0);
        assert_eq!(table.value(0, mood), 0.0);
        assert_eq!(table.value(2, sleep), 0.0);
    }

    #[test]
    fn dates_without_values_still_become_rows() {
        let table = HistoryTable::from_records([day(5)], Vec::new());
        assert_eq!(table.len(), 1);
        assert!(table.columns().is_empty());
        assert_eq!(table.first_date(), Some(day(5)));
    }

    #[test]
    fn retain_before_drops_cutoff_and_later() {
        let mut table = HistoryTable::from_records(
            [day(1), day(2), day(3)],
            [(day(3), "sleep".to_string(), 1.0)],
        );
        table.retain_before(day(2));
        assert_eq!(table.len(), 1);
        assert_eq!(table.last_date(), Some(day(1)));
        assert_eq!(table.columns(), ["sleep".to_string()]);
    }
}
