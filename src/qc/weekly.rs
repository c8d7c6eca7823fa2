use chrono::{Datelike, Days, NaiveDate};
use serde::Serialize;

use crate::qc::{BatchRecord, ClassifiedBatchSet};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklyBucket {
    pub week_start: NaiveDate,
    pub category: String,
    pub pass_rate: f64,
    pub batch_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySeries {
    pub category: String,
    /// Newest week first.
    pub buckets: Vec<WeeklyBucket>,
}

/// One step of the backward walk: the Monday of the cursor's week up to the
/// cursor itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekWindow {
    pub monday: NaiveDate,
    pub until: NaiveDate,
}

/// Walks week windows backwards from `end` while the cursor is after `start`.
#[derive(Debug, Clone)]
pub struct WeekWindows {
    cursor: Option<NaiveDate>,
    start: NaiveDate,
}

impl WeekWindows {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            cursor: Some(end),
            start,
        }
    }
}

impl Iterator for WeekWindows {
    type Item = WeekWindow;

    fn next(&mut self) -> Option<WeekWindow> {
        let cursor = self.cursor?;
        if cursor <= self.start {
            self.cursor = None;
            return None;
        }
        let monday = week_start(cursor);
        self.cursor = monday.pred_opt();
        Some(WeekWindow {
            monday,
            until: cursor,
        })
    }
}

pub fn week_start(date: NaiveDate) -> NaiveDate {
    let offset = u64::from(date.weekday().num_days_from_monday());
    date.checked_sub_days(Days::new(offset))
        .unwrap_or(NaiveDate::MIN)
}

/// Resolves the walk bounds: `end` defaults to `today`, `start` to the
/// earliest record date.
fn resolve_range(
    set: &ClassifiedBatchSet,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    today: NaiveDate,
) -> Option<(NaiveDate, NaiveDate)> {
    let start = start.or_else(|| set.earliest_date())?;
    Some((start, end.unwrap_or(today)))
}

/// Weekly pass-rate series for one category, newest week first. Weeks in
/// which the category has no batches are left out of the series.
pub fn weekly_series(
    set: &ClassifiedBatchSet,
    category: &str,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    today: NaiveDate,
) -> Vec<WeeklyBucket> {
    let Some((start, end)) = resolve_range(set, start, end, today) else {
        return Vec::new();
    };
    let rate_column = set.schema().rate;

    WeekWindows::new(start, end)
        .filter_map(|window| {
            let records = set.window(window.monday, window.until);
            week_bucket(records, category, rate_column, window.monday)
        })
        .collect()
}

/// Weekly series for every category, in first-appearance order. The record
/// slice for each week is located once and shared across categories.
pub fn weekly_series_by_category(
    set: &ClassifiedBatchSet,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    today: NaiveDate,
) -> Vec<CategorySeries> {
    let mut series = set
        .categories()
        .into_iter()
        .map(|category| CategorySeries {
            category,
            buckets: Vec::new(),
        })
        .collect::<Vec<_>>();
    let Some((start, end)) = resolve_range(set, start, end, today) else {
        return series;
    };
    let rate_column = set.schema().rate;

    for window in WeekWindows::new(start, end) {
        let records = set.window(window.monday, window.until);
        if records.is_empty() {
            continue;
        }
        for entry in &mut series {
            if let Some(bucket) = week_bucket(records, &entry.category, rate_column, window.monday)
            {
                entry.buckets.push(bucket);
            }
        }
    }

    series
}

/// Pass rate for a category within one week: the share of its batches whose
/// rate measurement is blank, i.e. not flagged. When no batch is blank, or
/// the sheet has no rate column, the rate falls back to zero.
fn week_bucket(
    records: &[BatchRecord],
    category: &str,
    rate_column: Option<usize>,
    week_start: NaiveDate,
) -> Option<WeeklyBucket> {
    let in_category = records
        .iter()
        .filter(|record| record.category == category)
        .collect::<Vec<_>>();
    if in_category.is_empty() {
        return None;
    }

    let batch_count = in_category.len();
    let unflagged = rate_column.map(|column| {
        in_category
            .iter()
            .filter(|record| record.cell(column).is_missing())
            .count()
    });

    let pass_rate = match unflagged {
        Some(count) if count > 0 => count as f64 / batch_count as f64 * 100.0,
        _ => 0.0,
    };

    Some(WeeklyBucket {
        week_start,
        category: category.to_string(),
        pass_rate,
        batch_count,
    })
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

    fn set(rows: &[&str]) -> ClassifiedBatchSet {
        let mut sheet = String::from(
            "Date of Manufacture,Material Colour,Spread /mm,Colour\nunits,,mm,\nlimits,,90-120,\n",
        );
        for row in rows {
            sheet.push_str(row);
            sheet.push('\n');
        }
        let table = RawTable::from_csv_str(&sheet).expect("sheet");
        classify_table(table, &ColumnConfig::default()).expect("classified set")
    }

    #[test]
    fn week_start_lands_on_monday() {
        assert_eq!(week_start(date(2024, 1, 10)), date(2024, 1, 8));
        assert_eq!(week_start(date(2024, 1, 8)), date(2024, 1, 8));
        assert_eq!(week_start(date(2024, 1, 14)), date(2024, 1, 8));
    }

    #[test]
    fn week_windows_walk_backwards_until_start() {
        let windows = WeekWindows::new(date(2024, 1, 2), date(2024, 1, 17)).collect::<Vec<_>>();
        assert_eq!(
            windows,
            vec![
                WeekWindow {
                    monday: date(2024, 1, 15),
                    until: date(2024, 1, 17)
                },
                WeekWindow {
                    monday: date(2024, 1, 8),
                    until: date(2024, 1, 14)
                },
                WeekWindow {
                    monday: date(2024, 1, 1),
                    until: date(2024, 1, 7)
                },
            ]
        );
    }

    #[test]
    fn full_week_of_unflagged_batches_rates_one_hundred() {
        let set = set(&[
            "2024-01-08,Red,100,",
            "2024-01-09,Red,100,",
            "2024-01-10,Red,100,",
            "2024-01-16,Blue,100,",
        ]);

        let range = (Some(date(2024, 1, 1)), Some(date(2024, 1, 21)));
        let today = date(2024, 6, 1);

        let red = weekly_series(&set, "Red", range.0, range.1, today);
        assert_eq!(
            red,
            vec![WeeklyBucket {
                week_start: date(2024, 1, 8),
                category: "Red".to_string(),
                pass_rate: 100.0,
                batch_count: 3,
            }]
        );

        let blue = weekly_series(&set, "Blue", range.0, range.1, today);
        assert_eq!(blue.len(), 1);
        assert_eq!(blue[0].week_start, date(2024, 1, 15));
    }

    #[test]
    fn flagged_batches_lower_the_rate_and_all_flagged_falls_back_to_zero() {
        let set = set(&[
            "2024-01-08,Red,100,",
            "2024-01-09,Red,100,off shade",
            "2024-01-15,Red,100,off shade",
        ]);

        let series = weekly_series(
            &set,
            "Red",
            Some(date(2024, 1, 1)),
            Some(date(2024, 1, 21)),
            date(2024, 6, 1),
        );
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].week_start, date(2024, 1, 15));
        assert_eq!(series[0].pass_rate, 0.0);
        assert_eq!(series[0].batch_count, 1);
        assert_eq!(series[1].pass_rate, 50.0);
    }

    #[test]
    fn series_defaults_to_earliest_record_and_today() {
        let set = set(&["2024-01-03,Red,100,", "2024-01-24,Red,100,"]);

        let series = weekly_series(&set, "Red", None, None, date(2024, 1, 25));
        let weeks = series.iter().map(|bucket| bucket.week_start).collect::<Vec<_>>();
        assert_eq!(weeks, vec![date(2024, 1, 22), date(2024, 1, 1)]);
        assert!(series.iter().all(|bucket| bucket.batch_count > 0));
    }

    #[test]
    fn series_length_is_bounded_by_weeks_in_range() {
        let set = set(&[
            "2024-01-01,Red,100,",
            "2024-01-09,Red,100,",
            "2024-01-17,Red,100,",
            "2024-01-25,Red,100,",
        ]);
        let start = date(2024, 1, 1);
        let end = date(2024, 1, 28);

        let series = weekly_series(&set, "Red", Some(start), Some(end), end);
        let days = (end - start).num_days();
        let bound = (days + 6) / 7 + 1;
        assert!(series.len() as i64 <= bound);
        assert_eq!(series.len(), 4);
    }

    #[test]
    fn series_by_category_keeps_first_appearance_order() {
        let set = set(&[
            "2024-01-08,Blue,100,",
            "2024-01-09,Red,100,",
            "2024-01-16,Red,100,",
        ]);

        let series = weekly_series_by_category(
            &set,
            Some(date(2024, 1, 1)),
            Some(date(2024, 1, 21)),
            date(2024, 6, 1),
        );
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].category, "Blue");
        assert_eq!(series[0].buckets.len(), 1);
        assert_eq!(series[1].category, "Red");
        assert_eq!(series[1].buckets.len(), 2);
        assert_eq!(series[1].buckets[0].week_start, date(2024, 1, 15));
    }
}
