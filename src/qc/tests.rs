use chrono::NaiveDate;

use super::classify::classify_records;
use super::pipeline::classify_table;
use super::stats::{PassRate, category_pass_rate, overall_pass_rate};
use super::table::RawTable;
use super::weekly::weekly_series;
use super::*;

const SHEET: &str = "\
Date of Manufacture,Material Colour,Spread /mm,Thickness /mm,Colour,Failure code,Provisional result,Unnamed: 7
,,mm,mm,,,,
Conforming limits,,90-120,2 - 4,visual,,,
2024-01-08,Red,85,3,,,,
2024-01-09,Red,125,5,,,,
2024-01-10,Red,90,4,,,FAIL,
2024-01-10,Blue,1,3,,,,
,Blue,100,3,,,,
2024-01-16, ,100,3,,,,
2024-01-17,Red,100,,,HIGH FLOW,,
";

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

fn load() -> ClassifiedBatchSet {
    let table = RawTable::from_csv_str(SHEET).expect("sheet should parse");
    classify_table(table, &ColumnConfig::default()).expect("sheet should classify")
}

#[test]
fn pipeline_extracts_only_enforceable_limits() {
    let set = load();
    let limits = set
        .limits()
        .to_bound_strings()
        .into_iter()
        .collect::<Vec<_>>();
    assert_eq!(
        limits,
        vec![
            ("Spread /mm".to_string(), vec!["90".to_string(), "120".to_string()]),
            ("Thickness /mm".to_string(), vec!["2".to_string(), "4".to_string()]),
        ]
    );
}

#[test]
fn pipeline_classifies_every_dated_row() {
    let set = load();
    let counters = set.counters();
    assert_eq!(counters.rows_read, 7);
    assert_eq!(counters.rows_dropped_missing_date, 1);
    assert_eq!(counters.records, 6);
    assert_eq!(counters.categories_filled, 1);
    assert_eq!(counters.provisional_overrides, 1);

    let codes = set
        .records()
        .iter()
        .map(|record| (record.result, record.failure_code.as_str()))
        .collect::<Vec<_>>();
    assert_eq!(
        codes,
        vec![
            (Verdict::Fail, "LOW FLOW"),
            (Verdict::Fail, "HIGH FLOW,HIGH THICKNESS"),
            (Verdict::Fail, ""),
            (Verdict::Fail, "LOW FLOW"),
            (Verdict::Pass, ""),
            (Verdict::Pass, "high flow"),
        ]
    );
}

#[test]
fn existing_failure_code_without_spread_violation_keeps_pass() {
    let set = load();
    let last = set.records().last().expect("records");
    assert_eq!(last.result, Verdict::Pass);
    assert_eq!(last.failure_code.as_str(), "high flow");
}

#[test]
fn blank_category_takes_modal_value() {
    let set = load();
    let filled = set
        .records()
        .iter()
        .find(|record| record.timestamp.date() == date(2024, 1, 16))
        .expect("record from the 16th");
    assert_eq!(filled.category, "Red");
}

#[test]
fn reclassification_is_idempotent() {
    let set = load();
    let again = classify_records(set.records(), set.schema(), set.limits());
    assert_eq!(again, set.records());

    for record in &again {
        let mut tokens = record
            .failure_code
            .tokens()
            .map(|token| token.to_uppercase())
            .collect::<Vec<_>>();
        let before = tokens.len();
        tokens.sort();
        tokens.dedup();
        assert_eq!(tokens.len(), before, "duplicate token in {}", record.failure_code);
    }
}

#[test]
fn window_slices_by_inclusive_date_range() {
    let set = load();
    assert_eq!(set.window(date(2024, 1, 9), date(2024, 1, 10)).len(), 3);
    assert_eq!(set.window(date(2024, 1, 11), date(2024, 1, 15)).len(), 0);
    assert!(set.window(date(2024, 1, 17), date(2024, 1, 8)).is_empty());
    assert_eq!(set.categories(), vec!["Red".to_string(), "Blue".to_string()]);
}

#[test]
fn weekly_and_statistics_views_agree_on_volume() {
    let set = load();
    let today = date(2024, 1, 21);

    let red = weekly_series(&set, "Red", None, None, today);
    let volumes = red
        .iter()
        .map(|bucket| (bucket.week_start, bucket.batch_count))
        .collect::<Vec<_>>();
    assert_eq!(volumes, vec![(date(2024, 1, 15), 2), (date(2024, 1, 8), 3)]);
    assert!(red.iter().all(|bucket| bucket.pass_rate == 100.0));

    assert_eq!(
        overall_pass_rate(&set, date(2024, 1, 8), date(2024, 1, 14), None),
        PassRate::Percent(0.0)
    );
    assert_eq!(
        overall_pass_rate(&set, date(2024, 1, 15), date(2024, 1, 21), Some("Red")),
        PassRate::Percent(100.0)
    );
    assert_eq!(
        overall_pass_rate(&set, date(2024, 1, 22), date(2024, 1, 28), None),
        PassRate::NoData
    );
    assert_eq!(
        category_pass_rate(&set, date(2024, 1, 15), date(2024, 1, 21), "Blue"),
        0.0
    );
}

#[test]
fn bad_date_fails_the_whole_load() {
    let sheet = SHEET.replace("2024-01-17", "17th Jan");
    let table = RawTable::from_csv_str(&sheet).expect("sheet should parse");
    let error = classify_table(table, &ColumnConfig::default()).expect_err("load must fail");
    let chain = format!("{error:#}");
    assert!(chain.contains("17th Jan"), "unexpected error: {chain}");
}
