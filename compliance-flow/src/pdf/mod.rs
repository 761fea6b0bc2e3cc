//! Paginated PDF export of a guideline report.
//!
//! Rendering is two explicit passes: [`layout_report`] places every line and
//! breaks pages, then [`LaidOutReport::finalize`] stamps `Page i of N`
//! footers once `N` is known. [`FinishedReport::to_pdf_bytes`] writes the
//! result with lopdf using the base-14 Helvetica faces.

pub mod layout;
pub mod metrics;
pub mod writer;

pub use layout::{DrawOp, FinishedReport, LaidOutReport, Page, layout_report};

use chrono::{Datelike, Utc};

use crate::error::Result;
use crate::report::SpecificGuidelineResult;

pub const DEFAULT_BRAND: &str = "DentEdTeck";

/// Page geometry in millimetres (A4 by default) and the brand printed in the
/// header and copyright footer.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfStyle {
    pub brand: String,
    pub page_width: f32,
    pub page_height: f32,
    pub margin: f32,
}

impl Default for PdfStyle {
    fn default() -> Self {
        Self {
            brand: DEFAULT_BRAND.to_string(),
            page_width: 210.0,
            page_height: 297.0,
            margin: 20.0,
        }
    }
}

impl PdfStyle {
    pub fn with_brand(brand: impl Into<String>) -> Self {
        Self {
            brand: brand.into(),
            ..Self::default()
        }
    }
}

/// `GDC_Report_<program>.pdf` with every non-alphanumeric character
/// replaced by `_`.
pub fn file_name(program_name: &str) -> String {
    let safe: String = program_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("GDC_Report_{}.pdf", safe)
}

impl FinishedReport {
    pub fn file_name(&self) -> String {
        file_name(&self.program_name)
    }

    pub fn to_pdf_bytes(&self) -> Result<Vec<u8>> {
        writer::write_pdf(self)
    }
}

/// Lay out, stamp footers with the current year, and write.
pub fn render_report(result: &SpecificGuidelineResult, style: &PdfStyle) -> Result<(String, Vec<u8>)> {
    let finished = layout_report(result, style).finalize(Utc::now().year());
    let bytes = finished.to_pdf_bytes()?;
    Ok((finished.file_name(), bytes))
}
