use std::collections::HashMap;

use anyhow::{Context, Result, bail};
use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use tracing::{debug, info};

use crate::qc::classify::FailureCode;
use crate::qc::table::{RawTable, Schema};
use crate::qc::{BatchRecord, Cell, Verdict};

/// Spread reading the source format uses to record an outright spread-test failure.
pub const SPREAD_FAIL_SENTINEL: f64 = 1.0;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y"];

#[derive(Debug, Clone, Default)]
pub struct NormalizeCounters {
    pub rows_read: usize,
    pub rows_dropped_missing_date: usize,
    pub cells_blanked: usize,
    pub categories_filled: usize,
    pub seeded_failures: usize,
}

#[derive(Debug)]
pub struct NormalizedRecords {
    pub records: Vec<BatchRecord>,
    pub counters: NormalizeCounters,
}

/// Cleans raw batch rows into typed records sorted by timestamp.
#[derive(Debug)]
pub struct RecordNormalizer {
    stray_punctuation: Regex,
}

struct PendingRecord {
    source_row: usize,
    raw_date: String,
    category: Option<String>,
    cells: Vec<Cell>,
    provisional: Option<String>,
    result: Verdict,
    failure_code: FailureCode,
}

impl RecordNormalizer {
    pub fn new() -> Result<Self> {
        Ok(Self {
            stray_punctuation: Regex::new(r"[^\w\s]")
                .context("failed to compile stray punctuation regex")?,
        })
    }

    pub fn normalize(&self, table: &RawTable, schema: &Schema) -> Result<NormalizedRecords> {
        let mut counters = NormalizeCounters {
            rows_read: table.rows.len(),
            ..NormalizeCounters::default()
        };

        let mut pending = Vec::with_capacity(table.rows.len());
        for (index, row) in table.rows.iter().enumerate() {
            let source_row = index + 1;
            let Some(raw_date) = row.first().cloned().flatten() else {
                counters.rows_dropped_missing_date += 1;
                continue;
            };

            let cells = (0..schema.headers().len())
                .map(|column| {
                    let raw = row.get(column).cloned().flatten();
                    let raw = if Some(column) == schema.failure_code {
                        raw.map(|code| code.trim().to_lowercase())
                            .filter(|code| !code.is_empty())
                    } else {
                        raw
                    };
                    if column == 0 {
                        return raw.map(Cell::Text).unwrap_or(Cell::Missing);
                    }
                    self.clean_cell(raw, &mut counters)
                })
                .collect::<Vec<_>>();

            let result = match schema.spread.map(|column| &cells[column]) {
                Some(Cell::Number(spread)) if *spread == SPREAD_FAIL_SENTINEL => {
                    counters.seeded_failures += 1;
                    Verdict::Fail
                }
                _ => Verdict::Pass,
            };

            let failure_code = FailureCode::from_raw(
                schema
                    .failure_code
                    .and_then(|column| text_value(&cells[column])),
            );
            let provisional = schema
                .provisional
                .and_then(|column| text_value(&cells[column]));
            let category = text_value(&cells[schema.category])
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty());

            pending.push(PendingRecord {
                source_row,
                raw_date,
                category,
                cells,
                provisional,
                result,
                failure_code,
            });
        }

        if counters.rows_dropped_missing_date > 0 {
            info!(
                dropped = counters.rows_dropped_missing_date,
                "dropped rows without a date of manufacture"
            );
        }

        let mode = modal_category(&pending);
        let mut records = Vec::with_capacity(pending.len());
        for record in pending {
            let category = match record.category {
                Some(category) => category,
                None => {
                    let fill = mode.clone().with_context(|| {
                        format!(
                            "row {} has no category and no category values exist to infer one",
                            record.source_row
                        )
                    })?;
                    counters.categories_filled += 1;
                    fill
                }
            };

            let timestamp = parse_timestamp(&record.raw_date).with_context(|| {
                format!(
                    "failed to parse date of manufacture '{}' on row {}",
                    record.raw_date, record.source_row
                )
            })?;

            let mut cells = record.cells;
            cells[schema.category] = Cell::Text(category.clone());

            records.push(BatchRecord {
                source_row: record.source_row,
                timestamp,
                category,
                cells,
                provisional: record.provisional,
                result: record.result,
                failure_code: record.failure_code,
            });
        }

        if counters.categories_filled > 0 {
            info!(
                filled = counters.categories_filled,
                category = %mode.unwrap_or_default(),
                "filled missing categories with the modal value"
            );
        }

        records.sort_by_key(|record| record.timestamp);

        Ok(NormalizedRecords { records, counters })
    }

    fn clean_cell(&self, raw: Option<String>, counters: &mut NormalizeCounters) -> Cell {
        let Some(text) = raw else {
            return Cell::Missing;
        };
        if let Some(number) = parse_number(&text) {
            return Cell::Number(number);
        }
        if self.stray_punctuation.is_match(&text) {
            debug!(cell = %text, "blanked cell containing stray punctuation");
            counters.cells_blanked += 1;
            return Cell::Missing;
        }
        Cell::Text(text)
    }
}

fn text_value(cell: &Cell) -> Option<String> {
    match cell {
        Cell::Missing => None,
        other => Some(other.render()),
    }
}

pub fn parse_number(text: &str) -> Option<f64> {
    text.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

/// Most frequent category; ties resolve to the lexicographically smallest.
fn modal_category(records: &[PendingRecord]) -> Option<String> {
    let mut counts = HashMap::<&str, usize>::new();
    for category in records.iter().filter_map(|record| record.category.as_deref()) {
        *counts.entry(category).or_default() += 1;
    }

    counts
        .into_iter()
        .max_by(|left, right| left.1.cmp(&right.1).then_with(|| right.0.cmp(left.0)))
        .map(|(category, _)| category.to_string())
}

pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime> {
    let trimmed = raw.trim();

    for format in DATETIME_FORMATS {
        if let Ok(timestamp) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(timestamp);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Ok(date.and_time(chrono::NaiveTime::MIN));
        }
    }

    bail!("unrecognised date format: {trimmed}")
}
