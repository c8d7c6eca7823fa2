use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

pub mod breakdown;
pub mod classify;
pub mod limits;
pub mod normalize;
pub mod pipeline;
pub mod stats;
pub mod table;
pub mod verdict;
pub mod weekly;
#[cfg(test)]
mod tests;

pub use classify::FailureCode;
pub use limits::Bounds;
pub use pipeline::{ClassifiedBatchSet, LoadCounters};

pub const DEFAULT_CATEGORY_COLUMN: &str = "Material Colour";
pub const DEFAULT_SPREAD_COLUMN: &str = "Spread /mm";
pub const DEFAULT_FAILURE_CODE_COLUMN: &str = "Failure code";
pub const DEFAULT_PROVISIONAL_COLUMN: &str = "Provisional result";
pub const DEFAULT_RATE_COLUMN: &str = "Colour";
pub const RESULT_COLUMN: &str = "Result";

/// Column roles and table layout the engine needs to interpret a raw QC sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnConfig {
    pub category_column: String,
    pub spread_column: String,
    pub failure_code_column: String,
    pub provisional_column: String,
    pub rate_column: String,
    /// Index, among rows following the header, of the limit-text row.
    pub limits_row: usize,
    /// Rows following the header that carry metadata instead of batches.
    pub preamble_rows: usize,
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            category_column: DEFAULT_CATEGORY_COLUMN.to_string(),
            spread_column: DEFAULT_SPREAD_COLUMN.to_string(),
            failure_code_column: DEFAULT_FAILURE_CODE_COLUMN.to_string(),
            provisional_column: DEFAULT_PROVISIONAL_COLUMN.to_string(),
            rate_column: DEFAULT_RATE_COLUMN.to_string(),
            limits_row: 1,
            preamble_rows: 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Verdict {
    Pass,
    Fail,
}

impl Verdict {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pass => "Pass",
            Self::Fail => "Fail",
        }
    }

    pub fn is_fail(self) -> bool {
        matches!(self, Self::Fail)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A cleaned cell. Numeric text is typed on load; everything else stays text.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Missing,
    Number(f64),
    Text(String),
}

impl Cell {
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }

    pub fn render(&self) -> String {
        match self {
            Self::Missing => String::new(),
            Self::Number(value) => format_number(*value),
            Self::Text(text) => text.clone(),
        }
    }
}

pub(crate) fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

/// One manufactured batch after normalisation.
///
/// `result` and `failure_code` are only ever replaced wholesale by the
/// classification builder and the provisional override, in that order.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchRecord {
    /// 1-based data row number in the source table, used in diagnostics.
    pub source_row: usize,
    pub timestamp: NaiveDateTime,
    pub category: String,
    /// Cells aligned with the schema headers.
    pub cells: Vec<Cell>,
    pub provisional: Option<String>,
    pub result: Verdict,
    pub failure_code: FailureCode,
}

impl BatchRecord {
    pub fn cell(&self, index: usize) -> &Cell {
        self.cells.get(index).unwrap_or(&Cell::Missing)
    }
}
