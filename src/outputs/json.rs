//! JSON summary of an analysis run.
//!
//! The summary carries the same numbers as the charts so they can be
//! inspected or re-plotted elsewhere:
//!
//! ```json
//! {
//!   "generated_at": "2025-05-06T09:12:44+00:00",
//!   "headlines": 1234,
//!   "top_entities": [{"entity": "UN", "count": 48}],
//!   "monthly": {"columns": ["China", "Russia"], "months": [{"month": "2022-01-01", "counts": {"China": 0, "Russia": 1}}]},
//!   "series": [{"label": "Russia", "variants": ["Russia"], "points": [["2022-01-01", 1]]}]
//! }
//! ```

use crate::aggregate::{MonthlySeries, MonthlyTable, RankedEntity};
use serde::Serialize;
use std::error::Error;
use std::path::Path;
use tokio::fs;
use tracing::{error, info, instrument};

/// Everything one `analyze` run computed.
#[derive(Debug, Serialize)]
pub struct AnalysisReport {
    pub generated_at: String,
    /// Distinct headlines analyzed.
    pub headlines: usize,
    pub top_entities: Vec<RankedEntity>,
    pub monthly: MonthlyTable,
    /// Series that could be built; groups never mentioned are absent.
    pub series: Vec<MonthlySeries>,
}

/// Write `report` as pretty-printed JSON to `path`.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn write_summary(report: &AnalysisReport, path: &Path) -> Result<(), Box<dyn Error>> {
    let json = serde_json::to_string_pretty(report)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Err(e) = fs::create_dir_all(parent).await {
            error!(dir = %parent.display(), error = %e, "Failed to create summary dir");
            return Err(e.into());
        }
    }

    fs::write(path, json).await?;
    info!(
        top = report.top_entities.len(),
        months = report.monthly.months.len(),
        "Wrote JSON summary"
    );
    Ok(())
}
