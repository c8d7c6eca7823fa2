use std::io::{self, Write};

use anyhow::Result;
use tracing::info;

use crate::cli::SpecArgs;
use crate::commands::load_batches;
use crate::model::{SpecColumnsReport, SpecReport};
use crate::qc::Bounds;
use crate::qc::breakdown::{numeric_spec_columns, spec_distribution, spec_trend};
use crate::qc::stats::StatsWindow;
use crate::util::{local_today, print_json};

pub fn run(args: SpecArgs) -> Result<()> {
    let set = load_batches(&args.input)?;

    let Some(spec) = args.spec.as_deref() else {
        let report = SpecColumnsReport {
            numeric_columns: numeric_spec_columns(&set),
            categories: set.categories(),
        };
        info!(columns = report.numeric_columns.len(), "listed numeric specification columns");
        if args.json {
            return print_json(&report, "spec columns");
        }
        return write_columns_report(&report);
    };

    let window = StatsWindow::Range {
        start: args.range.start,
        end: args.range.end,
    };
    let (start, end) = window.bounds(&set, local_today());
    let category = args.category.as_deref();

    let distribution = spec_distribution(&set, spec, start, end, category)?;
    let trend = spec_trend(&set, spec, start, end, category)?;
    info!(
        spec = %spec,
        start = %start,
        end = %end,
        readings = distribution.values.len(),
        "specification breakdown computed"
    );

    let report = SpecReport {
        start,
        end,
        category: args.category,
        distribution,
        trend,
    };

    if args.json {
        return print_json(&report, "spec");
    }
    write_text_report(&report)
}

fn write_columns_report(report: &SpecColumnsReport) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());
    writeln!(output, "Numeric specifications: {}", report.numeric_columns.len())?;
    for column in &report.numeric_columns {
        writeln!(output, "\t{column}")?;
    }
    writeln!(output, "Categories: {}", report.categories.join(", "))?;
    output.flush()?;
    Ok(())
}

fn write_text_report(report: &SpecReport) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());
    let trend = &report.trend;

    writeln!(
        output,
        "Specification: {} ({} .. {}) category={}",
        trend.spec,
        report.start,
        report.end,
        report.category.as_deref().unwrap_or("(all)")
    )?;
    match trend.limit.as_ref().map(|limit| limit.bounds) {
        Some(Bounds::Range { floor, ceiling }) => writeln!(output, "Limits: {floor} - {ceiling}")?,
        Some(Bounds::Floor(floor)) => writeln!(output, "Limits: >= {floor}")?,
        None => writeln!(output, "Limits: none")?,
    }
    match &report.distribution.summary {
        Some(summary) => writeln!(
            output,
            "Readings: count={} min={} max={} mean={:.2}",
            summary.count, summary.min, summary.max, summary.mean
        )?,
        None => writeln!(output, "Readings: none")?,
    }
    for point in &trend.points {
        writeln!(output, "\t{}\t{}", point.timestamp, point.value)?;
    }

    output.flush()?;
    Ok(())
}
