use std::io::{self, Write};

use anyhow::Result;
use tracing::{info, warn};

use crate::cli::WeeklyArgs;
use crate::commands::load_batches;
use crate::model::WeeklyReport;
use crate::qc::weekly::{CategorySeries, weekly_series, weekly_series_by_category};
use crate::util::{local_today, print_json};

pub fn run(args: WeeklyArgs) -> Result<()> {
    let set = load_batches(&args.input)?;
    let today = local_today();
    let (start, end) = (args.range.start, args.range.end);

    let series = match &args.category {
        Some(category) => {
            if !set.categories().contains(category) {
                warn!(category = %category, "category has no batches in sheet");
            }
            vec![CategorySeries {
                category: category.clone(),
                buckets: weekly_series(&set, category, start, end, today),
            }]
        }
        None => weekly_series_by_category(&set, start, end, today),
    };

    let report = WeeklyReport {
        start: start.or_else(|| set.earliest_date()),
        end: end.unwrap_or(today),
        series,
    };
    info!(
        categories = report.series.len(),
        weeks = report
            .series
            .iter()
            .map(|entry| entry.buckets.len())
            .max()
            .unwrap_or(0),
        "weekly series computed"
    );

    if args.json {
        return print_json(&report, "weekly");
    }
    write_text_report(&report)
}

fn write_text_report(report: &WeeklyReport) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());

    match report.start {
        Some(start) => writeln!(output, "Weeks: {start} .. {}", report.end)?,
        None => writeln!(output, "Weeks: none (no dated batches)")?,
    }

    for entry in &report.series {
        writeln!(output, "Category: {}", entry.category)?;
        if entry.buckets.is_empty() {
            writeln!(output, "\t(no batches)")?;
            continue;
        }
        for bucket in &entry.buckets {
            writeln!(
                output,
                "\t{}\t{:.1}%\t{} batches",
                bucket.week_start, bucket.pass_rate, bucket.batch_count
            )?;
        }
    }

    output.flush()?;
    Ok(())
}
