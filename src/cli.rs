use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::qc::{
    ColumnConfig, DEFAULT_CATEGORY_COLUMN, DEFAULT_FAILURE_CODE_COLUMN, DEFAULT_PROVISIONAL_COLUMN,
    DEFAULT_RATE_COLUMN, DEFAULT_SPREAD_COLUMN,
};

#[derive(Parser, Debug)]
#[command(
    name = "qcrft",
    version,
    about = "Batch conformance classification and right-first-time reporting"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Classify(ClassifyArgs),
    Weekly(WeeklyArgs),
    Stats(StatsArgs),
    Failures(FailuresArgs),
    Spec(SpecArgs),
}

/// Column roles and sheet layout, shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct ColumnArgs {
    #[arg(long, default_value = DEFAULT_CATEGORY_COLUMN)]
    pub category_column: String,

    #[arg(long, default_value = DEFAULT_SPREAD_COLUMN)]
    pub spread_column: String,

    #[arg(long, default_value = DEFAULT_FAILURE_CODE_COLUMN)]
    pub failure_code_column: String,

    #[arg(long, default_value = DEFAULT_PROVISIONAL_COLUMN)]
    pub provisional_column: String,

    #[arg(long, default_value = DEFAULT_RATE_COLUMN)]
    pub rate_column: String,

    #[arg(long, default_value_t = 1)]
    pub limits_row: usize,

    #[arg(long, default_value_t = 2)]
    pub preamble_rows: usize,
}

impl ColumnArgs {
    pub fn to_config(&self) -> ColumnConfig {
        ColumnConfig {
            category_column: self.category_column.clone(),
            spread_column: self.spread_column.clone(),
            failure_code_column: self.failure_code_column.clone(),
            provisional_column: self.provisional_column.clone(),
            rate_column: self.rate_column.clone(),
            limits_row: self.limits_row,
            preamble_rows: self.preamble_rows,
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct InputArgs {
    #[arg(long)]
    pub input: PathBuf,

    #[command(flatten)]
    pub columns: ColumnArgs,
}

#[derive(Args, Debug, Clone)]
pub struct DateRangeArgs {
    /// First day of the range (YYYY-MM-DD); defaults to the earliest record.
    #[arg(long)]
    pub start: Option<NaiveDate>,

    /// Last day of the range (YYYY-MM-DD); defaults to today.
    #[arg(long)]
    pub end: Option<NaiveDate>,
}

#[derive(Args, Debug, Clone)]
pub struct ClassifyArgs {
    #[command(flatten)]
    pub input: InputArgs,

    #[arg(long, default_value = ".cache/qcrft")]
    pub cache_root: PathBuf,

    #[arg(long)]
    pub output: Option<PathBuf>,

    #[arg(long)]
    pub limits_path: Option<PathBuf>,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct WeeklyArgs {
    #[command(flatten)]
    pub input: InputArgs,

    #[command(flatten)]
    pub range: DateRangeArgs,

    /// Restrict the series to one category; every category when omitted.
    #[arg(long)]
    pub category: Option<String>,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum WindowKind {
    Range,
    Week,
    Month,
}

impl WindowKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Range => "range",
            Self::Week => "week",
            Self::Month => "month",
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct StatsArgs {
    #[command(flatten)]
    pub input: InputArgs,

    #[command(flatten)]
    pub range: DateRangeArgs,

    #[arg(long, value_enum, default_value_t = WindowKind::Range)]
    pub window: WindowKind,

    #[arg(long)]
    pub category: Option<String>,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct FailuresArgs {
    #[command(flatten)]
    pub input: InputArgs,

    #[command(flatten)]
    pub range: DateRangeArgs,

    #[arg(long)]
    pub category: Option<String>,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct SpecArgs {
    #[command(flatten)]
    pub input: InputArgs,

    #[command(flatten)]
    pub range: DateRangeArgs,

    /// Specification column to report on; lists the numeric columns when
    /// omitted.
    #[arg(long)]
    pub spec: Option<String>,

    #[arg(long)]
    pub category: Option<String>,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}
