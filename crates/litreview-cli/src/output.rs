use std::io::Write;

use litreview_core::RunReport;
use owo_colors::OwoColorize;

/// Whether to use colored output.
#[derive(Debug, Clone, Copy)]
pub struct ColorMode(pub bool);

impl ColorMode {
    pub fn enabled(&self) -> bool {
        self.0
    }
}

/// Print the post-run summary. Pending work is normal resumable state, so a
/// partially processed corpus still reads as success-with-counts.
pub fn print_report(w: &mut dyn Write, report: &RunReport, color: ColorMode) -> std::io::Result<()> {
    writeln!(w)?;
    writeln!(
        w,
        "Scanned {} PDFs, {} matched to references, {} already summarized",
        report.scanned, report.matched, report.already_done
    )?;

    if color.enabled() {
        if report.processed > 0 {
            writeln!(w, "{}", format!("  {} newly summarized", report.processed).green())?;
        }
        if report.failed > 0 {
            writeln!(
                w,
                "{}",
                format!("  {} failed (will retry on the next run)", report.failed).yellow()
            )?;
        }
    } else {
        if report.processed > 0 {
            writeln!(w, "  {} newly summarized", report.processed)?;
        }
        if report.failed > 0 {
            writeln!(w, "  {} failed (will retry on the next run)", report.failed)?;
        }
    }

    if report.processed == 0 && report.failed == 0 {
        writeln!(w, "  nothing left to do")?;
    }
    Ok(())
}

/// Print the alignment summary.
pub fn print_alignment(
    w: &mut dyn Write,
    matched: usize,
    total: usize,
    color: ColorMode,
) -> std::io::Result<()> {
    let line = format!("{} / {} files matched to a reference", matched, total);
    if color.enabled() && matched < total {
        writeln!(w, "{}", line.yellow())
    } else {
        writeln!(w, "{}", line)
    }
}
