use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use csv::Writer;
use tracing::info;

use crate::cli::ClassifyArgs;
use crate::commands::load_batches;
use crate::model::{ClassifyPaths, ClassifyRunManifest};
use crate::qc::{ClassifiedBatchSet, ColumnConfig, RESULT_COLUMN};
use crate::util::{
    ensure_parent_directory, now_utc_string, print_json, sha256_file, utc_compact_string,
    write_json_pretty,
};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn run(args: ClassifyArgs) -> Result<()> {
    let started = Utc::now();
    let run_id = format!("run-{}", utc_compact_string(started));
    let config = args.input.columns.to_config();
    let input_path = args.input.input.clone();

    info!(run_id = %run_id, input = %input_path.display(), "classification run started");

    let input_sha256 = sha256_file(&input_path)?;
    let set = load_batches(&args.input)?;

    let output_path = args
        .output
        .unwrap_or_else(|| args.cache_root.join("classified.csv"));
    let limits_path = args
        .limits_path
        .unwrap_or_else(|| args.cache_root.join("limits.json"));
    let manifest_path = args
        .manifest_path
        .unwrap_or_else(|| args.cache_root.join("manifests").join("classify_run.json"));

    write_classified_csv(&output_path, &set, &config)?;
    info!(path = %output_path.display(), records = set.records().len(), "wrote classified table");

    let limits = set.limits().to_bound_strings();
    write_json_pretty(&limits_path, &limits)?;
    info!(path = %limits_path.display(), limits = limits.len(), "wrote limit map");

    let warnings = load_warnings(&set, &config);
    let manifest = ClassifyRunManifest {
        manifest_version: 1,
        run_id,
        status: "completed".to_string(),
        started_at: started.to_rfc3339_opts(SecondsFormat::Secs, true),
        updated_at: now_utc_string(),
        command: "classify".to_string(),
        input_sha256,
        config,
        paths: ClassifyPaths {
            cache_root: args.cache_root.display().to_string(),
            input_path: input_path.display().to_string(),
            output_path: output_path.display().to_string(),
            limits_path: limits_path.display().to_string(),
            manifest_path: manifest_path.display().to_string(),
        },
        counters: set.counters().clone(),
        limits,
        categories: set.categories(),
        warnings,
    };
    write_json_pretty(&manifest_path, &manifest)?;
    info!(path = %manifest_path.display(), "wrote classify run manifest");

    if args.json {
        return print_json(&manifest, "classify");
    }
    write_text_summary(&manifest)
}

/// Writes the classified table: the source columns with the failure code and
/// result columns filled in, appended when the sheet lacked them.
pub fn write_classified_csv(
    path: &Path,
    set: &ClassifiedBatchSet,
    config: &ColumnConfig,
) -> Result<()> {
    ensure_parent_directory(path)?;
    let schema = set.schema();

    let mut headers = schema.headers().to_vec();
    let failure_code_index = match schema.failure_code {
        Some(index) => index,
        None => {
            headers.push(config.failure_code_column.clone());
            headers.len() - 1
        }
    };
    let result_index = match schema.index_of(RESULT_COLUMN) {
        Some(index) => index,
        None => {
            headers.push(RESULT_COLUMN.to_string());
            headers.len() - 1
        }
    };

    let mut writer = Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    writer
        .write_record(&headers)
        .with_context(|| format!("failed to write header to {}", path.display()))?;

    for record in set.records() {
        let row = (0..headers.len()).map(|index| {
            if index == 0 {
                record.timestamp.format(TIMESTAMP_FORMAT).to_string()
            } else if index == failure_code_index {
                record.failure_code.as_str().to_string()
            } else if index == result_index {
                record.result.as_str().to_string()
            } else {
                record.cell(index).render()
            }
        });
        writer.write_record(row).with_context(|| {
            format!(
                "failed to write row {} to {}",
                record.source_row,
                path.display()
            )
        })?;
    }

    writer
        .flush()
        .with_context(|| format!("failed to flush {}", path.display()))?;
    Ok(())
}

fn load_warnings(set: &ClassifiedBatchSet, config: &ColumnConfig) -> Vec<String> {
    let schema = set.schema();
    let mut warnings = Vec::new();

    if schema.spread.is_none() {
        warnings.push(format!(
            "spread column '{}' not found; spread checks skipped",
            config.spread_column
        ));
    }
    if schema.rate.is_none() {
        warnings.push(format!(
            "rate column '{}' not found; weekly rates report zero",
            config.rate_column
        ));
    }
    for limit in set.limits().iter() {
        if schema.index_of(&limit.spec).is_none() {
            warnings.push(format!("limit for '{}' has no matching column", limit.spec));
        }
    }

    let counters = set.counters();
    if counters.rows_dropped_missing_date > 0 {
        warnings.push(format!(
            "{} rows dropped for missing date of manufacture",
            counters.rows_dropped_missing_date
        ));
    }

    warnings
}

fn write_text_summary(manifest: &ClassifyRunManifest) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());
    let counters = &manifest.counters;

    writeln!(output, "Run: {}", manifest.run_id)?;
    writeln!(
        output,
        "Rows: read={} dropped={} records={} failing={} overrides={}",
        counters.rows_read,
        counters.rows_dropped_missing_date,
        counters.records,
        counters.failing_records,
        counters.provisional_overrides,
    )?;
    writeln!(
        output,
        "Cleanup: blanked_cells={} categories_filled={} seeded_failures={}",
        counters.cells_blanked, counters.categories_filled, counters.seeded_failures,
    )?;
    writeln!(output, "Limits: {}", manifest.limits.len())?;
    for (spec, bounds) in &manifest.limits {
        writeln!(output, "\t{spec}\t{}", bounds.join(" - "))?;
    }
    writeln!(output, "Output: {}", manifest.paths.output_path)?;
    writeln!(output, "Manifest: {}", manifest.paths.manifest_path)?;
    for warning in &manifest.warnings {
        writeln!(output, "Warning: {warning}")?;
    }

    output.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::cli::{ColumnArgs, InputArgs};
    use crate::qc::{
        DEFAULT_CATEGORY_COLUMN, DEFAULT_FAILURE_CODE_COLUMN, DEFAULT_PROVISIONAL_COLUMN,
        DEFAULT_RATE_COLUMN, DEFAULT_SPREAD_COLUMN,
    };

    const SHEET: &str = "\
Date of Manufacture,Material Colour,Spread /mm,Thickness /mm,Provisional result
units,,mm,mm,
limits,,90-120,2-4,
2024-02-05,Red,85,3,
2024-02-06,Red,100,3,FAIL
2024-02-07,Blue,100,3,
";

    fn args(dir: &Path) -> ClassifyArgs {
        let input = dir.join("sheet.csv");
        fs::write(&input, SHEET).expect("write sheet");
        ClassifyArgs {
            input: InputArgs {
                input,
                columns: ColumnArgs {
                    category_column: DEFAULT_CATEGORY_COLUMN.to_string(),
                    spread_column: DEFAULT_SPREAD_COLUMN.to_string(),
                    failure_code_column: DEFAULT_FAILURE_CODE_COLUMN.to_string(),
                    provisional_column: DEFAULT_PROVISIONAL_COLUMN.to_string(),
                    rate_column: DEFAULT_RATE_COLUMN.to_string(),
                    limits_row: 1,
                    preamble_rows: 2,
                },
            },
            cache_root: dir.join("cache"),
            output: None,
            limits_path: None,
            manifest_path: None,
            json: false,
        }
    }

    #[test]
    fn classify_writes_table_limits_and_manifest() {
        let dir = tempfile::tempdir().expect("tempdir");
        run(args(dir.path())).expect("classify run");

        let cache = dir.path().join("cache");
        let table = fs::read_to_string(cache.join("classified.csv")).expect("classified table");
        let lines = table.lines().collect::<Vec<_>>();
        assert_eq!(
            lines[0],
            "Date of Manufacture,Material Colour,Spread /mm,Thickness /mm,Provisional result,Failure code,Result"
        );
        assert_eq!(lines[1], "2024-02-05 00:00:00,Red,85,3,,LOW FLOW,Fail");
        assert_eq!(lines[2], "2024-02-06 00:00:00,Red,100,3,FAIL,,Fail");
        assert_eq!(lines[3], "2024-02-07 00:00:00,Blue,100,3,,,Pass");

        let limits: serde_json::Value = serde_json::from_str(
            &fs::read_to_string(cache.join("limits.json")).expect("limits json"),
        )
        .expect("parse limits");
        assert_eq!(limits["Spread /mm"], serde_json::json!(["90", "120"]));

        let manifest: serde_json::Value = serde_json::from_str(
            &fs::read_to_string(cache.join("manifests").join("classify_run.json"))
                .expect("manifest json"),
        )
        .expect("parse manifest");
        assert_eq!(manifest["status"], "completed");
        assert_eq!(manifest["counters"]["records"], 3);
        assert_eq!(manifest["counters"]["provisional_overrides"], 1);
        assert_eq!(manifest["config"]["category_column"], DEFAULT_CATEGORY_COLUMN);
        assert_eq!(manifest["input_sha256"].as_str().map(str::len), Some(64));
        assert!(
            manifest["run_id"]
                .as_str()
                .is_some_and(|run_id| run_id.starts_with("run-"))
        );
    }

    #[test]
    fn classify_reports_missing_input() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut args = args(dir.path());
        args.input.input = dir.path().join("absent.csv");
        let error = run(args).expect_err("missing input");
        assert!(error.to_string().contains("absent.csv"));
    }
}
