use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::qc::breakdown::{FailureTally, SpecDistribution, SpecTrend};
use crate::qc::stats::{CategoryRate, PassRate};
use crate::qc::weekly::CategorySeries;
use crate::qc::{ColumnConfig, LoadCounters};

#[derive(Debug, Clone, Serialize)]
pub struct ClassifyPaths {
    pub cache_root: String,
    pub input_path: String,
    pub output_path: String,
    pub limits_path: String,
    pub manifest_path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassifyRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub status: String,
    pub started_at: String,
    pub updated_at: String,
    pub command: String,
    pub input_sha256: String,
    pub config: ColumnConfig,
    pub paths: ClassifyPaths,
    pub counters: LoadCounters,
    pub limits: BTreeMap<String, Vec<String>>,
    pub categories: Vec<String>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeeklyReport {
    pub start: Option<NaiveDate>,
    pub end: NaiveDate,
    pub series: Vec<CategorySeries>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsReport {
    pub window: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub category: Option<String>,
    pub overall_pass_rate: PassRate,
    pub categories: Vec<CategoryRate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailuresReport {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub category: Option<String>,
    pub failing_records: usize,
    pub tally: Vec<FailureTally>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SpecReport {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub category: Option<String>,
    pub distribution: SpecDistribution,
    pub trend: SpecTrend,
}

#[derive(Debug, Clone, Serialize)]
pub struct SpecColumnsReport {
    pub numeric_columns: Vec<String>,
    pub categories: Vec<String>,
}
