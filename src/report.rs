//! Place-and-route report formatting.
//!
//! nextpnr writes a JSON report next to its primary output. The `report`
//! goal pipes it through the hidden `format-report` subcommand, which prints
//! cell utilisation followed by the achieved clock frequencies.

use std::io::{self, Write};

use indexmap::IndexMap;
use miette::Diagnostic;
use serde::Deserialize;
use thiserror::Error;

/// Errors raised while formatting a report.
#[derive(Debug, Error, Diagnostic)]
pub enum ReportError {
    /// The report is not the JSON nextpnr writes.
    #[error("malformed place-and-route report")]
    #[diagnostic(
        code(fpgaforge::report::parse),
        help("rebuild the design to regenerate the report")
    )]
    Parse(#[from] serde_json::Error),

    /// Writing the formatted report failed.
    #[error("failed to write report")]
    #[diagnostic(code(fpgaforge::report::io))]
    Io(#[from] io::Error),
}

/// Cells of one kind used by the design.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct CellUsage {
    /// Cells placed.
    pub used: u64,
    /// Cells the device offers.
    pub available: u64,
}

impl CellUsage {
    /// Whole percentage of the available cells in use.
    #[must_use]
    pub fn percent(self) -> u64 {
        self.used
            .saturating_mul(100)
            .checked_div(self.available)
            .unwrap_or(0)
    }
}

/// Frequency reached by one clock domain, in MHz.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct ClockFmax {
    /// Frequency the routed design meets.
    pub achieved: f64,
    /// Frequency requested by the constraints.
    pub constraint: f64,
}

/// Subset of the nextpnr report this crate reads.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PnrReport {
    /// Cell utilisation keyed by cell type, in report order.
    #[serde(default)]
    pub utilization: IndexMap<String, CellUsage>,
    /// Clock frequencies keyed by net name, in report order.
    #[serde(default)]
    pub fmax: IndexMap<String, ClockFmax>,
}

impl PnrReport {
    /// Parse report JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Parse`] when `text` is not a report.
    pub fn parse(text: &str) -> Result<Self, ReportError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Write the utilisation table and clock summary to `out`.
    ///
    /// Unused cells are listed only when `verbose` is set.
    ///
    /// # Errors
    ///
    /// Returns [`ReportError::Io`] when `out` fails.
    pub fn write_to(&self, verbose: bool, out: &mut impl Write) -> Result<(), ReportError> {
        let width = self
            .utilization
            .keys()
            .map(String::len)
            .max()
            .unwrap_or(0)
            .max("CELL".len());
        writeln!(out, "FPGA Resource Utilization")?;
        writeln!(
            out,
            "  {:<width$}  {:>8}  {:>10}  {:>5}",
            "CELL", "USED", "AVAILABLE", "%"
        )?;
        for (cell, usage) in &self.utilization {
            if usage.used == 0 && !verbose {
                continue;
            }
            writeln!(
                out,
                "  {cell:<width$}  {:>8}  {:>10}  {:>4}%",
                usage.used,
                usage.available,
                usage.percent()
            )?;
        }
        writeln!(out)?;
        writeln!(out, "Clock Information")?;
        if self.fmax.is_empty() {
            writeln!(out, "  No clocks were found in the design.")?;
        }
        for (clock, fmax) in &self.fmax {
            writeln!(
                out,
                "  {clock}: {:.2} MHz achieved, {:.2} MHz constraint",
                fmax.achieved, fmax.constraint
            )?;
        }
        Ok(())
    }
}

/// Parse `text` and write the formatted report to `out`.
///
/// # Errors
///
/// Returns [`ReportError::Parse`] for malformed JSON and
/// [`ReportError::Io`] when writing fails.
pub fn format_report(text: &str, verbose: bool, out: &mut impl Write) -> Result<(), ReportError> {
    PnrReport::parse(text)?.write_to(verbose, out)
}
