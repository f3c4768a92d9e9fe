use std::io::Write;

use owo_colors::OwoColorize;
use pmcparse_core::{ExtractionError, NormalizationReport, Paper, PaperKind};

/// Whether to use colored output.
#[derive(Debug, Clone, Copy)]
pub struct ColorMode(pub bool);

impl ColorMode {
    pub fn enabled(&self) -> bool {
        self.0
    }
}

/// One-line summary of what was extracted.
pub fn print_summary(w: &mut dyn Write, paper: &Paper, color: ColorMode) -> std::io::Result<()> {
    let kind = match paper.kind {
        PaperKind::RepositoryNative => "native",
        PaperKind::Generic => "generic",
    };
    let line = format!(
        "Extracted \"{}\" ({} page): {} authors, {} references",
        paper.title,
        kind,
        paper.authors.len(),
        paper.references.len()
    );
    if color.enabled() {
        writeln!(w, "{}", line.bold())
    } else {
        writeln!(w, "{}", line)
    }
}

pub fn print_warnings(
    w: &mut dyn Write,
    warnings: &[ExtractionError],
    color: ColorMode,
) -> std::io::Result<()> {
    for warning in warnings {
        if color.enabled() {
            writeln!(w, "{} {}", "warning:".yellow().bold(), warning)?;
        } else {
            writeln!(w, "warning: {}", warning)?;
        }
    }
    Ok(())
}

/// Print per-reference failures, then a tally.
pub fn print_normalization(
    w: &mut dyn Write,
    report: &NormalizationReport,
    color: ColorMode,
) -> std::io::Result<()> {
    for failure in &report.failures {
        let label = format!("reference {}:", failure.index + 1);
        if color.enabled() {
            writeln!(w, "  {} {}", label.red(), failure.error)?;
        } else {
            writeln!(w, "  {} {}", label, failure.error)?;
        }
    }

    let tally = format!(
        "Normalized {} of {} references",
        report.normalized,
        report.normalized + report.failures.len()
    );
    if !color.enabled() {
        writeln!(w, "{}", tally)
    } else if report.is_complete() {
        writeln!(w, "{}", tally.green())
    } else {
        writeln!(w, "{}", tally.yellow())
    }
}
