use std::collections::BTreeMap;

use anyhow::{Context, Result};
use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::qc::table::MetadataRow;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Bounds {
    Floor(f64),
    Range { floor: f64, ceiling: f64 },
}

/// Conforming limit for one specification column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpecLimit {
    pub spec: String,
    pub bounds: Bounds,
    /// Digit runs as they appeared in the limit text, at most two.
    pub raw: Vec<String>,
}

/// Limits in sheet column order; classification evaluates them in this order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpecLimits {
    entries: Vec<SpecLimit>,
}

impl SpecLimits {
    pub fn iter(&self) -> impl Iterator<Item = &SpecLimit> {
        self.entries.iter()
    }

    pub fn get(&self, spec: &str) -> Option<&SpecLimit> {
        self.entries.iter().find(|limit| limit.spec == spec)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Side output for range displays: spec name to `[floor]` or `[floor, ceiling]`.
    pub fn to_bound_strings(&self) -> BTreeMap<String, Vec<String>> {
        self.entries
            .iter()
            .map(|limit| (limit.spec.clone(), limit.raw.clone()))
            .collect()
    }
}

impl FromIterator<SpecLimit> for SpecLimits {
    fn from_iter<I: IntoIterator<Item = SpecLimit>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Pulls numeric bounds out of free-text limit descriptions such as
/// `90-120` or `>50 MPa`. Unit text is never validated.
#[derive(Debug)]
pub struct LimitExtractor {
    digit_run: Regex,
}

impl LimitExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            digit_run: Regex::new(r"[0-9]+").context("failed to compile digit-run regex")?,
        })
    }

    pub fn extract(&self, metadata: &MetadataRow) -> SpecLimits {
        metadata
            .entries
            .iter()
            .filter_map(|(spec, text)| self.parse(spec, text.as_deref()?))
            .collect()
    }

    pub fn parse(&self, spec: &str, text: &str) -> Option<SpecLimit> {
        let mut runs = self
            .digit_run
            .find_iter(text)
            .map(|found| found.as_str().to_string())
            .collect::<Vec<_>>();

        if runs.is_empty() {
            debug!(
                spec = %spec,
                text = %text,
                "no numeric limit found; specification not enforced"
            );
            return None;
        }
        if runs.len() > 2 {
            warn!(
                spec = %spec,
                text = %text,
                numbers = runs.len(),
                "limit text holds more than two numbers; using the first two"
            );
            runs.truncate(2);
        }

        let numbers = runs
            .iter()
            .map(|run| run.parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .ok()?;

        let bounds = match numbers.as_slice() {
            [floor] => Bounds::Floor(*floor),
            [floor, ceiling] => Bounds::Range {
                floor: *floor,
                ceiling: *ceiling,
            },
            _ => return None,
        };

        Some(SpecLimit {
            spec: spec.to_string(),
            bounds,
            raw: runs,
        })
    }
}
