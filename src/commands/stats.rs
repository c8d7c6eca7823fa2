use std::io::{self, Write};

use anyhow::Result;
use tracing::{info, warn};

use crate::cli::{StatsArgs, WindowKind};
use crate::commands::load_batches;
use crate::model::StatsReport;
use crate::qc::stats::{
    CategoryRate, StatsWindow, category_pass_rate, category_pass_rates, overall_pass_rate,
};
use crate::util::{local_today, print_json};

pub fn run(args: StatsArgs) -> Result<()> {
    let set = load_batches(&args.input)?;
    let window = match args.window {
        WindowKind::Range => StatsWindow::Range {
            start: args.range.start,
            end: args.range.end,
        },
        WindowKind::Week => StatsWindow::CurrentWeek,
        WindowKind::Month => StatsWindow::CurrentMonth,
    };
    let explicit_range = args.range.start.is_some() || args.range.end.is_some();
    if args.window != WindowKind::Range && explicit_range {
        warn!(
            window = args.window.as_str(),
            "--start/--end ignored for calendar windows"
        );
    }

    let (start, end) = window.bounds(&set, local_today());
    let category = args.category.as_deref();

    let overall = overall_pass_rate(&set, start, end, category);
    let categories = match category {
        Some(name) => vec![CategoryRate {
            category: name.to_string(),
            pass_rate: category_pass_rate(&set, start, end, name),
        }],
        None => category_pass_rates(&set, start, end),
    };
    info!(
        window = args.window.as_str(),
        start = %start,
        end = %end,
        overall = %overall,
        "statistics computed"
    );

    let report = StatsReport {
        window: args.window.as_str().to_string(),
        start,
        end,
        category: args.category,
        overall_pass_rate: overall,
        categories,
    };

    if args.json {
        return print_json(&report, "stats");
    }
    write_text_report(&report)
}

fn write_text_report(report: &StatsReport) -> Result<()> {
    let mut output = io::BufWriter::new(io::stdout().lock());

    writeln!(
        output,
        "Window: {} ({} .. {})",
        report.window, report.start, report.end
    )?;
    match &report.category {
        Some(category) => writeln!(
            output,
            "Right first time ({category}): {}",
            report.overall_pass_rate
        )?,
        None => writeln!(output, "Right first time: {}", report.overall_pass_rate)?,
    }
    for rate in &report.categories {
        writeln!(output, "\t{}\t{}%", rate.category, rate.pass_rate)?;
    }

    output.flush()?;
    Ok(())
}
