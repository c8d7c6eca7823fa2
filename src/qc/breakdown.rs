use std::collections::HashMap;

use anyhow::{Result, bail};
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::qc::limits::SpecLimit;
use crate::qc::{BatchRecord, Cell, ClassifiedBatchSet};

/// Readings at or below this value are sentinel encodings, not measurements.
const SENTINEL_CEILING: f64 = 1.0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailureTally {
    pub token: String,
    pub records: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionSummary {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpecDistribution {
    pub spec: String,
    pub values: Vec<f64>,
    pub summary: Option<DistributionSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub timestamp: NaiveDateTime,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpecTrend {
    pub spec: String,
    pub limit: Option<SpecLimit>,
    pub points: Vec<TrendPoint>,
}

fn in_category<'a>(
    records: &'a [BatchRecord],
    category: Option<&'a str>,
) -> impl Iterator<Item = &'a BatchRecord> {
    records
        .iter()
        .filter(move |record| category.is_none_or(|wanted| record.category == wanted))
}

/// Records per failure token, most frequent first. Empty means there are no
/// failures to report.
pub fn failure_tally(
    set: &ClassifiedBatchSet,
    from: NaiveDate,
    to: NaiveDate,
    category: Option<&str>,
) -> Vec<FailureTally> {
    let mut counts = HashMap::<String, usize>::new();
    for record in in_category(set.window(from, to), category) {
        let mut seen = Vec::<String>::new();
        for token in record.failure_code.tokens() {
            let token = token.trim().to_uppercase();
            if token.is_empty() || seen.contains(&token) {
                continue;
            }
            *counts.entry(token.clone()).or_default() += 1;
            seen.push(token);
        }
    }

    let mut tally = counts
        .into_iter()
        .map(|(token, records)| FailureTally { token, records })
        .collect::<Vec<_>>();
    tally.sort_by(|left, right| {
        right
            .records
            .cmp(&left.records)
            .then_with(|| left.token.cmp(&right.token))
    });
    tally
}

fn spec_readings<'a>(
    set: &'a ClassifiedBatchSet,
    spec: &str,
    from: NaiveDate,
    to: NaiveDate,
    category: Option<&'a str>,
) -> Result<impl Iterator<Item = (&'a BatchRecord, f64)>> {
    let Some(column) = set.schema().index_of(spec) else {
        bail!("specification column '{spec}' not found");
    };
    if set.schema().is_role_column(column) {
        bail!("'{spec}' is not a specification column");
    }

    Ok(in_category(set.window(from, to), category).filter_map(move |record| {
        match record.cell(column) {
            Cell::Number(value) if *value > SENTINEL_CEILING => Some((record, *value)),
            _ => None,
        }
    }))
}

pub fn spec_distribution(
    set: &ClassifiedBatchSet,
    spec: &str,
    from: NaiveDate,
    to: NaiveDate,
    category: Option<&str>,
) -> Result<SpecDistribution> {
    let values = spec_readings(set, spec, from, to, category)?
        .map(|(_, value)| value)
        .collect::<Vec<_>>();

    let summary = (!values.is_empty()).then(|| DistributionSummary {
        count: values.len(),
        min: values.iter().copied().fold(f64::INFINITY, f64::min),
        max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        mean: values.iter().sum::<f64>() / values.len() as f64,
    });

    Ok(SpecDistribution {
        spec: spec.to_string(),
        values,
        summary,
    })
}

pub fn spec_trend(
    set: &ClassifiedBatchSet,
    spec: &str,
    from: NaiveDate,
    to: NaiveDate,
    category: Option<&str>,
) -> Result<SpecTrend> {
    let points = spec_readings(set, spec, from, to, category)?
        .map(|(record, value)| TrendPoint {
            timestamp: record.timestamp,
            value,
        })
        .collect();

    Ok(SpecTrend {
        spec: spec.to_string(),
        limit: set.limits().get(spec).cloned(),
        points,
    })
}

/// Specification columns holding only numbers (at least one) once cleaned.
pub fn numeric_spec_columns(set: &ClassifiedBatchSet) -> Vec<String> {
    let schema = set.schema();
    schema
        .headers()
        .iter()
        .enumerate()
        .filter(|(column, _)| !schema.is_role_column(*column))
        .filter(|(column, _)| {
            let cells = set.records().iter().map(|record| record.cell(*column));
            let mut numbers = 0;
            for cell in cells {
                match cell {
                    Cell::Number(_) => numbers += 1,
                    Cell::Text(_) => return false,
                    Cell::Missing => {}
                }
            }
            numbers > 0
        })
        .map(|(_, header)| header.clone())
        .collect()
}
