use std::io::{self, Write};

use anyhow::Result;
use tracing::info;

use crate::cli::FailuresArgs;
use crate::commands::load_batches;
use crate::model::FailuresReport;
use crate::qc::breakdown::failure_tally;
use crate::qc::stats::StatsWindow;
use crate::util::{local_today, print_json};

pub fn run(args: FailuresArgs) -> Result<()> {
    let set = load_batches(&args.input)?;
    let window = StatsWindow::Range {
        start: args.range.start,
        end: args.range.end,
    };
    let (start, end) = window.bounds(&set, local_today());
    let category = args.category.as_deref();

    let tally = failure_tally(&set, start, end, category);
    let failing_records = set
        .window(start, end)
        .iter()
        .filter(|record| category.is_none_or(|wanted| record.category == wanted))
        .filter(|record| record.result.is_fail())
        .count();
    info!(
        start = %start,
        end = %end,
        tokens = tally.len(),
        failing = failing_records,
        "failure tally computed"
    );

    let report = FailuresReport {
        start,
        end,
        category: args.category,
        failing_records,
        tally,
    };

    if args.json {
        return print_json(&report, "failures");
    }
    write_text_report(&report)
}

fn write_text_report(report: &FailuresReport) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());

    writeln!(
        output,
        "Window: {} .. {} category={}",
        report.start,
        report.end,
        report.category.as_deref().unwrap_or("(all)")
    )?;
    writeln!(output, "Failing batches: {}", report.failing_records)?;

    if report.tally.is_empty() {
        writeln!(output, "No failures to report")?;
    }
    for entry in &report.tally {
        writeln!(output, "\t{}\t{}", entry.records, entry.token)?;
    }

    output.flush()?;
    Ok(())
}
