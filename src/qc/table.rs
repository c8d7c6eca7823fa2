use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result, bail};
use csv::ReaderBuilder;

use crate::qc::ColumnConfig;

/// Raw sheet as read from the source: a header row and string cells.
#[derive(Debug, Clone, Default)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

/// The limit-text row, keyed by column header. The date column is excluded.
#[derive(Debug, Clone, Default)]
pub struct MetadataRow {
    pub entries: Vec<(String, Option<String>)>,
}

impl RawTable {
    pub fn read_csv(path: &Path) -> Result<Self> {
        let file =
            File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
        Self::from_csv_reader(file).with_context(|| format!("failed to read {}", path.display()))
    }

    pub fn from_csv_str(input: &str) -> Result<Self> {
        Self::from_csv_reader(input.as_bytes())
    }

    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers = reader
            .headers()
            .context("failed to read csv header row")?
            .clone();
        if headers.is_empty() {
            bail!("csv input has no header row");
        }

        // Spreadsheet exports pad the sheet with unnamed columns.
        let kept = headers
            .iter()
            .enumerate()
            .filter(|(index, name)| *index == 0 || !is_unnamed_header(name))
            .map(|(index, _)| index)
            .collect::<Vec<_>>();

        let mut rows = Vec::new();
        for (line, record) in reader.records().enumerate() {
            let record =
                record.with_context(|| format!("failed to read csv row {}", line + 1))?;
            let row = kept
                .iter()
                .map(|index| {
                    record
                        .get(*index)
                        .map(str::trim)
                        .filter(|value| !value.is_empty())
                        .map(ToOwned::to_owned)
                })
                .collect::<Vec<_>>();
            rows.push(row);
        }

        Ok(Self {
            headers: kept
                .iter()
                .map(|index| headers.get(*index).unwrap_or_default().trim().to_string())
                .collect(),
            rows,
        })
    }

    /// Splits the preamble off the top of the sheet, returning the limit row
    /// and a table holding only batch rows.
    pub fn split_metadata(
        mut self,
        limits_row: usize,
        preamble_rows: usize,
    ) -> Result<(MetadataRow, RawTable)> {
        if limits_row >= preamble_rows {
            bail!(
                "limits row {limits_row} must fall inside the {preamble_rows} preamble rows"
            );
        }
        if self.rows.len() < preamble_rows {
            bail!(
                "table has {} rows but {preamble_rows} preamble rows are configured",
                self.rows.len()
            );
        }

        let body = self.rows.split_off(preamble_rows);
        let limit_cells = self.rows.swap_remove(limits_row);

        let entries = self
            .headers
            .iter()
            .zip(limit_cells)
            .skip(1)
            .map(|(header, cell)| (header.clone(), cell))
            .collect();

        Ok((
            MetadataRow { entries },
            RawTable {
                headers: self.headers,
                rows: body,
            },
        ))
    }
}

fn is_unnamed_header(name: &str) -> bool {
    let trimmed = name.trim();
    trimmed.is_empty() || trimmed.starts_with("Unnamed")
}

/// Header positions with the engine's column roles resolved.
#[derive(Debug, Clone)]
pub struct Schema {
    headers: Vec<String>,
    positions: HashMap<String, usize>,
    pub category: usize,
    pub spread: Option<usize>,
    pub failure_code: Option<usize>,
    pub provisional: Option<usize>,
    pub rate: Option<usize>,
}

impl Schema {
    pub fn resolve(headers: &[String], config: &ColumnConfig) -> Result<Self> {
        if headers.is_empty() {
            bail!("table has no columns");
        }

        let mut positions = HashMap::with_capacity(headers.len());
        for (index, header) in headers.iter().enumerate() {
            positions.entry(header.clone()).or_insert(index);
        }

        let category = positions
            .get(&config.category_column)
            .copied()
            .filter(|index| *index != 0)
            .with_context(|| {
                format!(
                    "category column '{}' not found in table header",
                    config.category_column
                )
            })?;

        let lookup = |name: &str| positions.get(name).copied().filter(|index| *index != 0);

        Ok(Self {
            category,
            spread: lookup(&config.spread_column),
            failure_code: lookup(&config.failure_code_column),
            provisional: lookup(&config.provisional_column),
            rate: lookup(&config.rate_column),
            headers: headers.to_vec(),
            positions,
        })
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    /// Columns that hold measured specifications rather than bookkeeping.
    pub fn is_role_column(&self, index: usize) -> bool {
        index == 0
            || index == self.category
            || Some(index) == self.failure_code
            || Some(index) == self.provisional
    }
}
