use std::fmt;

use tracing::info;

use crate::qc::limits::{Bounds, SpecLimits};
use crate::qc::table::Schema;
use crate::qc::{BatchRecord, Cell, Verdict};

/// Specification whose failure tokens are reported as `FLOW`.
const SPREAD_SPEC_NAME: &str = "Spread";
const SPREAD_TOKEN_NAME: &str = "FLOW";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Low,
    High,
}

impl Direction {
    fn as_str(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::High => "HIGH",
        }
    }
}

/// A `{DIRECTION} {SPEC}` failure reason such as `LOW FLOW`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReasonToken {
    pub direction: Direction,
    pub spec: String,
}

impl ReasonToken {
    pub fn for_spec(direction: Direction, spec_column: &str) -> Self {
        Self {
            direction,
            spec: spec_token_name(spec_column),
        }
    }
}

impl fmt::Display for ReasonToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.direction.as_str(), self.spec)
    }
}

/// Short token name for a specification column: the first word of the
/// header with slashes stripped, uppercased. `Spread /mm` becomes `FLOW`.
pub fn spec_token_name(spec_column: &str) -> String {
    let stem = spec_column
        .split(' ')
        .next()
        .unwrap_or_default()
        .trim_matches('/');
    if stem.eq_ignore_ascii_case(SPREAD_SPEC_NAME) {
        SPREAD_TOKEN_NAME.to_string()
    } else {
        stem.to_uppercase()
    }
}

/// Comma-joined failure reasons. Tokens compare case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FailureCode(Option<String>);

impl FailureCode {
    pub fn from_raw(raw: Option<String>) -> Self {
        Self(raw.filter(|code| !code.trim().is_empty()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }

    pub fn as_str(&self) -> &str {
        self.0.as_deref().unwrap_or_default()
    }

    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        self.0
            .as_deref()
            .into_iter()
            .flat_map(|code| code.split(','))
    }

    pub fn contains(&self, token: &str) -> bool {
        let wanted = token.trim().to_uppercase();
        self.tokens()
            .any(|existing| existing.trim().to_uppercase() == wanted)
    }

    /// Adds `token` unless an equal token is already present.
    pub fn merge(&mut self, token: &str) {
        if self.contains(token) {
            return;
        }
        if let Some(code) = self.0.as_mut() {
            code.push(',');
            code.push_str(token);
        } else {
            self.0 = Some(token.to_string());
        }
    }
}

impl fmt::Display for FailureCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the record carries a primary spread reading. Two-bound limits are
/// only checked when it does, floor-only limits only when it does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpreadMeasurement {
    HasSpreadMeasurement,
    MissingSpreadMeasurement,
}

impl SpreadMeasurement {
    pub fn of(record: &BatchRecord, schema: &Schema) -> Self {
        match schema.spread.map(|column| record.cell(column)) {
            Some(cell) if !cell.is_missing() => Self::HasSpreadMeasurement,
            _ => Self::MissingSpreadMeasurement,
        }
    }
}

/// Builds a classified record from a normalised one. The seed verdict can
/// only be downgraded.
#[derive(Debug)]
pub struct ClassificationBuilder<'a> {
    source: &'a BatchRecord,
    result: Verdict,
    failure_code: FailureCode,
}

impl<'a> ClassificationBuilder<'a> {
    pub fn new(source: &'a BatchRecord) -> Self {
        Self {
            source,
            result: source.result,
            failure_code: source.failure_code.clone(),
        }
    }

    pub fn fail(&mut self, token: &ReasonToken) {
        self.result = Verdict::Fail;
        self.failure_code.merge(&token.to_string());
    }

    pub fn finish(self) -> BatchRecord {
        BatchRecord {
            result: self.result,
            failure_code: self.failure_code,
            ..self.source.clone()
        }
    }
}

pub fn classify_record(record: &BatchRecord, schema: &Schema, limits: &SpecLimits) -> BatchRecord {
    let spread = SpreadMeasurement::of(record, schema);
    let mut builder = ClassificationBuilder::new(record);

    for limit in limits.iter() {
        let Some(column) = schema.index_of(&limit.spec) else {
            continue;
        };
        let Cell::Number(value) = *record.cell(column) else {
            continue;
        };

        match (limit.bounds, spread) {
            (Bounds::Range { floor, ceiling }, SpreadMeasurement::HasSpreadMeasurement) => {
                if value < floor {
                    builder.fail(&ReasonToken::for_spec(Direction::Low, &limit.spec));
                } else if value > ceiling {
                    builder.fail(&ReasonToken::for_spec(Direction::High, &limit.spec));
                }
            }
            (Bounds::Floor(floor), SpreadMeasurement::MissingSpreadMeasurement) => {
                if value < floor {
                    builder.fail(&ReasonToken::for_spec(Direction::Low, &limit.spec));
                }
            }
            _ => {}
        }
    }

    builder.finish()
}

pub fn classify_records(
    records: &[BatchRecord],
    schema: &Schema,
    limits: &SpecLimits,
) -> Vec<BatchRecord> {
    let classified = records
        .iter()
        .map(|record| classify_record(record, schema, limits))
        .collect::<Vec<_>>();

    let failing = classified
        .iter()
        .filter(|record| record.result.is_fail())
        .count();
    info!(
        records = classified.len(),
        failing,
        limits = limits.len(),
        "classified records against conforming limits"
    );

    classified
}
