//! Snapshot horizon and the named time series that are defined over it.

use crate::error::{Error, Result};
use chrono::{NaiveDateTime, TimeDelta};
use std::collections::BTreeMap;
use std::fs::File;
use std::io;
use std::path::Path;

/// Timestamp format used by snapshot columns in tabular inputs and outputs
pub const SNAPSHOT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Name of the first column of a series table
pub const SNAPSHOT_COLUMN: &str = "snapshot";

/// The ordered sequence of periods shared by every time-varying attribute
/// and decision variable of a network.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshots {
    timestamps: Vec<NaiveDateTime>,
    weightings: Vec<f64>,
}

impl Snapshots {
    /// Builds the snapshot sequence from strictly increasing timestamps.
    /// Each snapshot weighs the number of hours until the next one, the
    /// last one reusing the weighting of its predecessor.
    pub fn new(timestamps: Vec<NaiveDateTime>) -> Result<Self> {
        if timestamps.is_empty() {
            return Err(Error::validation("snapshot sequence is empty"));
        }
        let mut weightings = Vec::with_capacity(timestamps.len());
        for pair in timestamps.windows(2) {
            let hours = (pair[1] - pair[0]).num_seconds() as f64 / 3600.0;
            if hours <= 0.0 {
                return Err(Error::validation(format!(
                    "snapshots must be strictly increasing ({} >= {})",
                    pair[0], pair[1]
                )));
            }
            weightings.push(hours);
        }
        let last = weightings.last().copied().unwrap_or(1.0);
        weightings.push(last);
        Ok(Self {
            timestamps,
            weightings,
        })
    }

    /// Builds `count` hourly snapshots beginning at `start`
    ///
    /// ## Example
    ///
    /// ```
    /// use chrono::NaiveDate;
    ///
    /// let start = NaiveDate::from_ymd_opt(2016, 1, 1)
    ///     .unwrap()
    ///     .and_hms_opt(0, 0, 0)
    ///     .unwrap();
    /// let snapshots = evflow_rs::series::Snapshots::hourly(start, 24).unwrap();
    /// assert_eq!(snapshots.len(), 24);
    /// assert_eq!(snapshots.weighting(23), 1.0);
    /// ```
    pub fn hourly(start: NaiveDateTime, count: usize) -> Result<Self> {
        let timestamps = (0..count)
            .map(|hour| start + TimeDelta::hours(hour as i64))
            .collect();
        Self::new(timestamps)
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    /// Duration of every snapshot, in hours
    pub fn weightings(&self) -> &[f64] {
        &self.weightings
    }

    /// Duration of snapshot `t`, in hours
    ///
    /// # Panics
    ///
    /// Panics if `t` is not below [Snapshots::len].
    pub fn weighting(&self, t: usize) -> f64 {
        self.weightings[t]
    }

    /// Timestamp of snapshot `t` formatted as in the series table
    ///
    /// # Panics
    ///
    /// Panics if `t` is not below [Snapshots::len].
    pub fn label(&self, t: usize) -> String {
        self.timestamps[t].format(SNAPSHOT_FORMAT).to_string()
    }
}

/// A per-snapshot attribute: either the same value at every snapshot or
/// one value per snapshot.
#[derive(Debug, Clone, PartialEq)]
pub enum Profile {
    Static(f64),
    Series(Vec<f64>),
}

impl Profile {
    /// Value at snapshot `t`
    ///
    /// # Panics
    ///
    /// Panics if `t` is out of range of a `Series` profile.
    pub fn at(&self, t: usize) -> f64 {
        match self {
            Profile::Static(value) => *value,
            Profile::Series(values) => values[t],
        }
    }

    /// Checks that the profile matches the horizon and only holds finite,
    /// non-negative values
    pub(crate) fn validate(&self, horizon: usize, what: &str) -> Result<()> {
        let values: &[f64] = match self {
            Profile::Static(value) => std::slice::from_ref(value),
            Profile::Series(values) => {
                if values.len() != horizon {
                    return Err(Error::validation(format!(
                        "{} has {} values but the horizon has {} snapshots",
                        what,
                        values.len(),
                        horizon
                    )));
                }
                values
            }
        };
        if let Some(v) = values.iter().find(|v| !v.is_finite() || **v < 0.0) {
            return Err(Error::validation(format!(
                "{} must be finite and non-negative, got {}",
                what, v
            )));
        }
        Ok(())
    }
}

impl From<f64> for Profile {
    fn from(value: f64) -> Self {
        Profile::Static(value)
    }
}

impl From<Vec<f64>> for Profile {
    fn from(values: Vec<f64>) -> Self {
        Profile::Series(values)
    }
}

/// Named input series, all sharing the same snapshot horizon
#[derive(Debug, Clone)]
pub struct SeriesStore {
    snapshots: Snapshots,
    series: BTreeMap<String, Vec<f64>>,
}

impl SeriesStore {
    pub fn new(snapshots: Snapshots) -> Self {
        Self {
            snapshots,
            series: BTreeMap::new(),
        }
    }

    pub fn snapshots(&self) -> &Snapshots {
        &self.snapshots
    }

    pub fn horizon(&self) -> usize {
        self.snapshots.len()
    }

    pub fn insert(
        &mut self,
        name: impl Into<String>,
        values: Vec<f64>,
    ) -> Result<()> {
        let name = name.into();
        if name.is_empty() {
            return Err(Error::validation("series name is empty"));
        }
        if self.series.contains_key(&name) {
            return Err(Error::validation(format!(
                "series '{}' is already defined",
                name
            )));
        }
        if values.len() != self.horizon() {
            return Err(Error::validation(format!(
                "series '{}' has {} values but the horizon has {} snapshots",
                name,
                values.len(),
                self.horizon()
            )));
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(Error::validation(format!(
                "series '{}' holds non-finite values",
                name
            )));
        }
        self.series.insert(name, values);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&[f64]> {
        self.series.get(name).map(|values| values.as_slice())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(|name| name.as_str())
    }

    /// Parses a table whose first column holds the snapshot timestamps and
    /// whose remaining columns are named series
    pub fn from_csv_reader<R: io::Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::Reader::from_reader(reader);
        let headers = rdr.headers()?.clone();
        match headers.get(0) {
            Some(SNAPSHOT_COLUMN) => {}
            _ => {
                return Err(Error::validation(format!(
                    "first series column must be '{}'",
                    SNAPSHOT_COLUMN
                )))
            }
        }

        let mut timestamps = vec![];
        let mut columns: Vec<Vec<f64>> = vec![vec![]; headers.len() - 1];
        for (row, record) in rdr.records().enumerate() {
            let record = record?;
            let stamp = NaiveDateTime::parse_from_str(&record[0], SNAPSHOT_FORMAT)
                .map_err(|e| {
                    Error::validation(format!(
                        "invalid snapshot '{}' at row {}: {}",
                        &record[0], row, e
                    ))
                })?;
            timestamps.push(stamp);
            for (index, column) in columns.iter_mut().enumerate() {
                let field = &record[index + 1];
                let value = field.trim().parse::<f64>().map_err(|_| {
                    Error::validation(format!(
                        "invalid value '{}' for series '{}' at row {}",
                        field,
                        &headers[index + 1],
                        row
                    ))
                })?;
                column.push(value);
            }
        }

        let mut store = Self::new(Snapshots::new(timestamps)?);
        for (index, values) in columns.into_iter().enumerate() {
            store.insert(&headers[index + 1], values)?;
        }
        Ok(store)
    }

    pub fn read_csv(path: &Path) -> Result<Self> {
        Self::from_csv_reader(File::open(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use chrono::NaiveDate;

    fn midnight() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2016, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_hourly_snapshots() {
        let snapshots = Snapshots::hourly(midnight(), 24).unwrap();
        assert_eq!(snapshots.len(), 24);
        assert_eq!(snapshots.label(13), "2016-01-01 13:00:00");
        assert!(snapshots.weightings().iter().all(|w| *w == 1.0));
    }

    #[test]
    #[should_panic]
    fn test_label_out_of_horizon() {
        let snapshots = Snapshots::hourly(midnight(), 24).unwrap();
        snapshots.label(24);
    }

    #[test]
    fn test_weightings_follow_snapshot_spacing() {
        let start = midnight();
        let snapshots = Snapshots::new(vec![
            start,
            start + TimeDelta::minutes(30),
            start + TimeDelta::hours(2),
        ])
        .unwrap();
        assert_abs_diff_eq!(snapshots.weighting(0), 0.5);
        assert_abs_diff_eq!(snapshots.weighting(1), 1.5);
        assert_abs_diff_eq!(snapshots.weighting(2), 1.5);
    }

    #[test]
    fn test_single_snapshot_weighs_one_hour() {
        let snapshots = Snapshots::new(vec![midnight()]).unwrap();
        assert_eq!(snapshots.weightings(), &[1.0]);
    }

    #[test]
    fn test_reject_empty_or_unordered_snapshots() {
        assert!(matches!(
            Snapshots::new(vec![]),
            Err(Error::Validation(_))
        ));
        let start = midnight();
        assert!(matches!(
            Snapshots::new(vec![start, start]),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_insert_series_with_wrong_length() {
        let mut store = SeriesStore::new(Snapshots::hourly(midnight(), 24).unwrap());
        let r = store.insert("solar", vec![0.0; 23]);
        assert!(matches!(r, Err(Error::Validation(_))));
        store.insert("solar", vec![0.0; 24]).unwrap();
        assert_eq!(store.get("solar").unwrap().len(), 24);
        assert!(store.get("wind").is_none());
    }

    #[test]
    fn test_insert_duplicated_series() {
        let mut store = SeriesStore::new(Snapshots::hourly(midnight(), 2).unwrap());
        store.insert("load", vec![1.0, 2.0]).unwrap();
        let r = store.insert("load", vec![1.0, 2.0]);
        assert!(matches!(r, Err(Error::Validation(_))));
    }

    #[test]
    fn test_read_series_table() {
        let table = "snapshot,load,solar\n\
                     2016-01-01 00:00:00,0,0.0\n\
                     2016-01-01 01:00:00,9,0.5\n\
                     2016-01-01 02:00:00,0,0.9\n";
        let store = SeriesStore::from_csv_reader(table.as_bytes()).unwrap();
        assert_eq!(store.horizon(), 3);
        assert_eq!(store.get("load").unwrap(), &[0.0, 9.0, 0.0]);
        assert_eq!(store.get("solar").unwrap(), &[0.0, 0.5, 0.9]);
        assert_eq!(store.names().collect::<Vec<_>>(), vec!["load", "solar"]);
    }

    #[test]
    fn test_read_series_table_without_snapshot_column() {
        let table = "time,load\n2016-01-01 00:00:00,0\n";
        let r = SeriesStore::from_csv_reader(table.as_bytes());
        assert!(matches!(r, Err(Error::Validation(_))));
    }

    #[test]
    fn test_read_series_table_with_invalid_value() {
        let table = "snapshot,load\n2016-01-01 00:00:00,abc\n";
        let r = SeriesStore::from_csv_reader(table.as_bytes());
        assert!(matches!(r, Err(Error::Validation(_))));
    }

    #[test]
    fn test_profile_validation() {
        assert!(Profile::Static(0.5).validate(24, "p_max_pu").is_ok());
        assert!(Profile::Static(-0.5).validate(24, "p_max_pu").is_err());
        assert!(Profile::Series(vec![1.0; 23]).validate(24, "p_set").is_err());
        assert_eq!(Profile::Series(vec![0.0, 2.0]).at(1), 2.0);
        assert_eq!(Profile::from(3.0).at(7), 3.0);
    }
}
