//! Grouping of needed hours into as few provider requests as possible.

use crate::acquisition::request::AcquisitionRequest;
use crate::station::gaps::GapList;
use crate::types::period::{Month, Year};
use std::collections::{BTreeMap, BTreeSet};

/// Requests covering every month with station data.
///
/// Years with at least `year_request_min_months` months of data are fetched
/// whole; the months of sparser years are fetched one by one. Requests come
/// out in chronological order.
pub fn plan_full_period(
    months: &BTreeSet<Month>,
    year_request_min_months: usize,
) -> Vec<AcquisitionRequest> {
    let mut by_year: BTreeMap<i32, Vec<Month>> = BTreeMap::new();
    for month in months {
        by_year.entry(month.year()).or_default().push(*month);
    }

    let mut requests = Vec::new();
    for (year, months) in by_year {
        if months.len() >= year_request_min_months {
            requests.push(AcquisitionRequest::Year(Year(year)));
        } else {
            requests.extend(months.into_iter().map(AcquisitionRequest::Month));
        }
    }
    requests
}

/// One request per calendar day with gaps, carrying that day's missing hours.
pub fn plan_gap_only(gaps: &GapList) -> Vec<AcquisitionRequest> {
    gaps.by_day()
        .into_iter()
        .map(|(date, hours)| AcquisitionRequest::Hours { date, hours })
        .collect()
}
