//! Flat-file persistence for scraped headlines.
//!
//! Headlines are written once per scrape to a CSV file with an unnamed
//! leading row-index column:
//!
//! ```text
//! ,date,title
//! 0,15 January 2022,Kazakhstan and Russia discuss trade
//! 1,1 March 2022,Kazakh FM meets Chinese envoy
//! ```
//!
//! Loading reads the file back and drops rows that repeat an earlier
//! `(date, title)` pair.

use crate::models::{HeadlineRecord, HeadlineRow};
use itertools::Itertools;
use std::error::Error;
use std::path::Path;
use tracing::{info, instrument, warn};

/// Write scraped headlines to `path`, replacing any existing file.
#[instrument(level = "info", skip(records), fields(path = %path.display(), count = records.len()))]
pub fn write_headlines(path: &Path, records: &[HeadlineRecord]) -> Result<(), Box<dyn Error>> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["", "date", "title"])?;
    for (index, record) in records.iter().enumerate() {
        writer.write_record([index.to_string().as_str(), record.date.as_str(), record.title.as_str()])?;
    }
    writer.flush()?;
    info!("Wrote headlines CSV");
    Ok(())
}

/// Load headlines from `path` and de-duplicate them.
///
/// Columns are located by header name, so files with or without the index
/// column both load. An empty title cell becomes `None`.
#[instrument(level = "info", fields(path = %path.display()))]
pub fn load_headlines(path: &Path) -> Result<Vec<HeadlineRow>, Box<dyn Error>> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_path(path)?;
    let headers = reader.headers()?.clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim() == name)
            .ok_or_else(|| format!("{} has no '{}' column", path.display(), name))
    };
    let date_col = column("date")?;
    let title_col = column("title")?;

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        let date = record.get(date_col).unwrap_or_default().to_string();
        let title = record
            .get(title_col)
            .filter(|t| !t.trim().is_empty())
            .map(str::to_string);
        rows.push(HeadlineRow { date, title });
    }

    let loaded = rows.len();
    let rows = dedupe(rows);
    if rows.len() < loaded {
        warn!(dropped = loaded - rows.len(), "Dropped duplicate headlines");
    }
    info!(count = rows.len(), "Loaded headlines");
    Ok(rows)
}

/// Drop rows whose `(date, title)` pair already appeared, keeping the first
/// occurrence and the original order.
pub fn dedupe(rows: Vec<HeadlineRow>) -> Vec<HeadlineRow> {
    rows.into_iter()
        .unique_by(|row| (row.date.clone(), row.title.clone()))
        .collect()
}
