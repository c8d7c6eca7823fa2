use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Serialize, Serializer};

use crate::qc::pipeline::distinct_categories;
use crate::qc::weekly::week_start;
use crate::qc::{BatchRecord, ClassifiedBatchSet, Verdict};

/// Decimal places kept on reported pass rates.
const RATE_PRECISION: i32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsWindow {
    /// Explicit range; missing ends default to the earliest record and today.
    Range {
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    },
    /// Monday of the current week through today.
    CurrentWeek,
    /// First of the current month through today.
    CurrentMonth,
}

impl StatsWindow {
    pub fn bounds(self, set: &ClassifiedBatchSet, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        match self {
            Self::Range { start, end } => {
                let end = end.unwrap_or(today);
                let start = start.or_else(|| set.earliest_date()).unwrap_or(end);
                (start, end)
            }
            Self::CurrentWeek => (week_start(today), today),
            Self::CurrentMonth => (today.with_day(1).unwrap_or(today), today),
        }
    }
}

/// Overall pass rate. `NoData` is distinct from a measured `0%`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PassRate {
    NoData,
    Percent(f64),
}

impl fmt::Display for PassRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoData => f.write_str("No Data"),
            Self::Percent(value) => write!(f, "{value}%"),
        }
    }
}

impl Serialize for PassRate {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::NoData => serializer.serialize_none(),
            Self::Percent(value) => serializer.serialize_f64(*value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryRate {
    pub category: String,
    pub pass_rate: f64,
}

pub fn round_rate(value: f64) -> f64 {
    let scale = 10_f64.powi(RATE_PRECISION);
    (value * scale).round() / scale
}

fn pass_percent(records: &[&BatchRecord]) -> Option<f64> {
    if records.is_empty() {
        return None;
    }
    let passes = records
        .iter()
        .filter(|record| record.result == Verdict::Pass)
        .count();
    Some(round_rate(passes as f64 / records.len() as f64 * 100.0))
}

fn filtered<'a>(records: &'a [BatchRecord], category: Option<&str>) -> Vec<&'a BatchRecord> {
    records
        .iter()
        .filter(|record| category.is_none_or(|wanted| record.category == wanted))
        .collect()
}

/// Pass count over pass-plus-fail count in the window. An empty window is
/// `NoData`.
pub fn overall_pass_rate(
    set: &ClassifiedBatchSet,
    from: NaiveDate,
    to: NaiveDate,
    category: Option<&str>,
) -> PassRate {
    pass_percent(&filtered(set.window(from, to), category))
        .map_or(PassRate::NoData, PassRate::Percent)
}

/// Pass rate for one category. Unlike [`overall_pass_rate`], an empty window
/// reports `0%`; callers written against the reporting tiles rely on this.
pub fn category_pass_rate(
    set: &ClassifiedBatchSet,
    from: NaiveDate,
    to: NaiveDate,
    category: &str,
) -> f64 {
    pass_percent(&filtered(set.window(from, to), Some(category))).unwrap_or(0.0)
}

/// Pass rate for every category observed within the window.
pub fn category_pass_rates(
    set: &ClassifiedBatchSet,
    from: NaiveDate,
    to: NaiveDate,
) -> Vec<CategoryRate> {
    let records = set.window(from, to);
    distinct_categories(records)
        .into_iter()
        .map(|category| CategoryRate {
            pass_rate: pass_percent(&filtered(records, Some(&category))).unwrap_or(0.0),
            category,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qc::ColumnConfig;
    use crate::qc::pipeline::classify_table;
    use crate::qc::table::RawTable;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    fn set() -> ClassifiedBatchSet {
        let sheet = "\
Date of Manufacture,Material Colour,Spread /mm,Provisional result
units,,mm,
limits,,90-120,
2024-03-04,Red,100,
2024-03-05,Red,85,
2024-03-06,Red,100,
2024-03-06,Blue,100,FAIL
2024-03-12,Blue,100,
";
        let table = RawTable::from_csv_str(sheet).expect("sheet");
        classify_table(table, &ColumnConfig::default()).expect("classified set")
    }

    #[test]
    fn overall_pass_rate_rounds_to_one_decimal() {
        let set = set();
        let rate = overall_pass_rate(&set, date(2024, 3, 4), date(2024, 3, 10), None);
        assert_eq!(rate, PassRate::Percent(50.0));

        let red = overall_pass_rate(&set, date(2024, 3, 4), date(2024, 3, 10), Some("Red"));
        assert_eq!(red, PassRate::Percent(66.7));
        assert_eq!(red.to_string(), "66.7%");
    }

    #[test]
    fn empty_overall_window_is_no_data_but_empty_category_is_zero() {
        let set = set();
        let overall = overall_pass_rate(&set, date(2024, 4, 1), date(2024, 4, 7), None);
        assert_eq!(overall, PassRate::NoData);
        assert_eq!(overall.to_string(), "No Data");

        let category = category_pass_rate(&set, date(2024, 4, 1), date(2024, 4, 7), "Red");
        assert_eq!(category, 0.0);
    }

    #[test]
    fn all_failing_window_reports_zero_not_no_data() {
        let set = set();
        let blue = overall_pass_rate(&set, date(2024, 3, 6), date(2024, 3, 6), Some("Blue"));
        assert_eq!(blue, PassRate::Percent(0.0));
    }

    #[test]
    fn category_rates_cover_categories_seen_in_window() {
        let set = set();
        let rates = category_pass_rates(&set, date(2024, 3, 4), date(2024, 3, 12));
        assert_eq!(
            rates,
            vec![
                CategoryRate {
                    category: "Red".to_string(),
                    pass_rate: 66.7
                },
                CategoryRate {
                    category: "Blue".to_string(),
                    pass_rate: 50.0
                },
            ]
        );

        let later = category_pass_rates(&set, date(2024, 3, 11), date(2024, 3, 12));
        assert_eq!(later.len(), 1);
        assert_eq!(later[0].category, "Blue");
    }

    #[test]
    fn fixed_windows_resolve_against_today() {
        let set = set();
        let today = date(2024, 3, 14);
        assert_eq!(
            StatsWindow::CurrentWeek.bounds(&set, today),
            (date(2024, 3, 11), today)
        );
        assert_eq!(
            StatsWindow::CurrentMonth.bounds(&set, today),
            (date(2024, 3, 1), today)
        );
        assert_eq!(
            StatsWindow::Range {
                start: None,
                end: None
            }
            .bounds(&set, today),
            (date(2024, 3, 4), today)
        );
    }
}
