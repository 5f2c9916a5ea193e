use crate::station::series::StationSeries;
use crate::types::hours::hourly_range;
use chrono::{NaiveDate, NaiveDateTime, Timelike};
use std::collections::BTreeMap;

/// Hours missing from a station series, in chronological order.
///
/// Always derived from a [`StationSeries`]: every hour in the closed range
/// between its first and last row that has no row of its own.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GapList(Vec<NaiveDateTime>);

impl GapList {
    pub fn find(series: &StationSeries) -> Self {
        let present = series.hours();
        let mut next_present = 0;
        let mut missing = Vec::new();
        for hour in hourly_range(series.start(), series.end()) {
            if present.get(next_present) == Some(&hour) {
                next_present += 1;
            } else {
                missing.push(hour);
            }
        }
        Self(missing)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NaiveDateTime> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[NaiveDateTime] {
        &self.0
    }

    pub fn contains(&self, hour: &NaiveDateTime) -> bool {
        self.0.binary_search(hour).is_ok()
    }

    /// Missing hours-of-day grouped by calendar date.
    pub fn by_day(&self) -> BTreeMap<NaiveDate, Vec<u32>> {
        let mut days: BTreeMap<NaiveDate, Vec<u32>> = BTreeMap::new();
        for hour in &self.0 {
            days.entry(hour.date()).or_default().push(hour.hour());
        }
        days
    }
}

impl<'a> IntoIterator for &'a GapList {
    type Item = &'a NaiveDateTime;
    type IntoIter = std::slice::Iter<'a, NaiveDateTime>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::station::series::tests::{hour, series_at};

    #[test]
    fn test_no_gaps() {
        let series = series_at(&[hour(1, 0), hour(1, 1), hour(1, 2)]);
        assert!(GapList::find(&series).is_empty());
    }

    #[test]
    fn test_gaps_across_midnight() {
        let series = series_at(&[hour(1, 22), hour(2, 1), hour(2, 2), hour(2, 4)]);
        let gaps = GapList::find(&series);
        assert_eq!(gaps.as_slice(), &[hour(1, 23), hour(2, 0), hour(2, 3)]);
        assert!(gaps.contains(&hour(2, 0)));
        assert!(!gaps.contains(&hour(2, 1)));

        let days = gaps.by_day();
        assert_eq!(days.len(), 2);
        assert_eq!(days[&hour(1, 0).date()], vec![23]);
        assert_eq!(days[&hour(2, 0).date()], vec![0, 3]);
    }

    #[test]
    fn test_single_row_has_no_gaps() {
        assert!(GapList::find(&series_at(&[hour(3, 5)])).is_empty());
    }
}
