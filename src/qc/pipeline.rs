use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};

use crate::qc::classify::classify_records;
use crate::qc::limits::{LimitExtractor, SpecLimits};
use crate::qc::normalize::RecordNormalizer;
use crate::qc::table::{RawTable, Schema};
use crate::qc::verdict::apply_provisional_overrides;
use crate::qc::{BatchRecord, ColumnConfig};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadCounters {
    pub rows_read: usize,
    pub rows_dropped_missing_date: usize,
    pub records: usize,
    pub cells_blanked: usize,
    pub categories_filled: usize,
    pub limits_extracted: usize,
    pub seeded_failures: usize,
    pub failing_records: usize,
    pub provisional_overrides: usize,
}

/// Canonical classified record set. Built in one pass and never mutated;
/// reclassification produces a new set.
#[derive(Debug, Clone)]
pub struct ClassifiedBatchSet {
    schema: Schema,
    limits: SpecLimits,
    records: Vec<BatchRecord>,
    counters: LoadCounters,
}

impl ClassifiedBatchSet {
    pub fn load_csv(path: &Path, config: &ColumnConfig) -> Result<Self> {
        let table = RawTable::read_csv(path)?;
        classify_table(table, config)
            .with_context(|| format!("failed to classify {}", path.display()))
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn limits(&self) -> &SpecLimits {
        &self.limits
    }

    pub fn records(&self) -> &[BatchRecord] {
        &self.records
    }

    pub fn counters(&self) -> &LoadCounters {
        &self.counters
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn earliest_date(&self) -> Option<NaiveDate> {
        self.records.first().map(|record| record.timestamp.date())
    }

    /// Records whose date falls in `from..=to`.
    pub fn window(&self, from: NaiveDate, to: NaiveDate) -> &[BatchRecord] {
        if from > to {
            return &[];
        }
        let start = self
            .records
            .partition_point(|record| record.timestamp.date() < from);
        let end = self
            .records
            .partition_point(|record| record.timestamp.date() <= to);
        &self.records[start..end.max(start)]
    }

    /// Distinct categories in first-appearance order.
    pub fn categories(&self) -> Vec<String> {
        distinct_categories(&self.records)
    }
}

pub fn distinct_categories(records: &[BatchRecord]) -> Vec<String> {
    let mut seen = Vec::<String>::new();
    for record in records {
        if !seen.iter().any(|category| *category == record.category) {
            seen.push(record.category.clone());
        }
    }
    seen
}

/// Runs limit extraction, normalisation, classification and provisional
/// overrides over a raw sheet.
pub fn classify_table(table: RawTable, config: &ColumnConfig) -> Result<ClassifiedBatchSet> {
    let (metadata, body) = table.split_metadata(config.limits_row, config.preamble_rows)?;

    let limits = LimitExtractor::new()?.extract(&metadata);
    let schema = Schema::resolve(&body.headers, config)?;
    if schema.spread.is_none() {
        warn!(
            column = %config.spread_column,
            "spread column not found; every record treated as lacking a spread reading"
        );
    }
    for limit in limits.iter() {
        if schema.index_of(&limit.spec).is_none() {
            warn!(spec = %limit.spec, "limit has no matching column; skipped");
        }
    }

    let normalized = RecordNormalizer::new()?.normalize(&body, &schema)?;
    let classified = classify_records(&normalized.records, &schema, &limits);
    let (records, provisional_overrides) = apply_provisional_overrides(classified);

    let counters = LoadCounters {
        rows_read: normalized.counters.rows_read,
        rows_dropped_missing_date: normalized.counters.rows_dropped_missing_date,
        records: records.len(),
        cells_blanked: normalized.counters.cells_blanked,
        categories_filled: normalized.counters.categories_filled,
        limits_extracted: limits.len(),
        seeded_failures: normalized.counters.seeded_failures,
        failing_records: records.iter().filter(|record| record.result.is_fail()).count(),
        provisional_overrides,
    };

    info!(
        records = counters.records,
        failing = counters.failing_records,
        overrides = counters.provisional_overrides,
        "classification complete"
    );

    Ok(ClassifiedBatchSet {
        schema,
        limits,
        records,
        counters,
    })
}
