use crate::types::period::{Month, Year};
use chrono::NaiveDate;
use std::fmt;
use std::fmt::{Display, Formatter};

/// One call to the reanalysis provider, at the coarsest granularity that
/// covers what is needed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AcquisitionRequest {
    /// Selected hours (0-23) of a single day.
    Hours { date: NaiveDate, hours: Vec<u32> },
    Month(Month),
    Year(Year),
}

impl AcquisitionRequest {
    /// File name (without extension) the request's download is stored under.
    pub fn file_stem(&self) -> String {
        match self {
            AcquisitionRequest::Hours { date, .. } => format!("hours_{}", date.format("%Y%m%d")),
            AcquisitionRequest::Month(month) => {
                format!("month_{:04}{:02}", month.year(), month.month())
            }
            AcquisitionRequest::Year(year) => format!("year_{}", year),
        }
    }
}

impl Display for AcquisitionRequest {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            AcquisitionRequest::Hours { date, hours } => {
                write!(f, "{} hours {:?}", date, hours)
            }
            AcquisitionRequest::Month(month) => write!(f, "month {}", month),
            AcquisitionRequest::Year(year) => write!(f, "year {}", year),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_stems_are_distinct_per_granularity() {
        let date = NaiveDate::from_ymd_opt(2020, 1, 2).unwrap();
        let hours = AcquisitionRequest::Hours { date, hours: vec![5, 6] };
        assert_eq!(hours.file_stem(), "hours_20200102");
        assert_eq!(hours.to_string(), "2020-01-02 hours [5, 6]");
        assert_eq!(AcquisitionRequest::Month(Month::new(3, 2021)).file_stem(), "month_202103");
        assert_eq!(AcquisitionRequest::Year(Year(2021)).file_stem(), "year_2021");
    }
}
