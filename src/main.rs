//! # mfa_headlines
//!
//! Tracks which countries and organizations appear in the press headlines of
//! Kazakhstan's Ministry of Foreign Affairs, and how often, month by month.
//!
//! ## Usage
//!
//! ```sh
//! chromedriver --port=9515 &
//! mfa_headlines run -o ./charts
//! ```
//!
//! ## Architecture
//!
//! The application is a linear batch pipeline:
//! 1. **Scraping**: Page through the press listing in a WebDriver-controlled
//!    browser, collecting (date, title) pairs
//! 2. **Storage**: Write the pairs to a CSV file; reloading drops duplicates
//! 3. **Extraction**: Tag entity spans in each headline and canonicalize them
//!    through the exclusion set and nationality alias table
//! 4. **Aggregation**: Rank entities overall and resample mentions by month
//! 5. **Output**: SVG charts and a JSON summary

use chrono::Utc;
use clap::Parser;
use std::error::Error;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod aggregate;
mod cli;
mod extract;
mod models;
mod ner;
mod outputs;
mod rules;
mod scrapers;
mod store;
mod utils;
mod webdriver;

use aggregate::{AnalysisError, GlobalCounter, MentionTable, top_entities};
use cli::{AnalyzeArgs, Cli, Command, ScrapeArgs};
use extract::extract_mentions;
use models::HeadlineRow;
use ner::{EntityRecognizer, GazetteerRecognizer, LlmRecognizer, Recognizer, RecognizerKind};
use outputs::json::{AnalysisReport, write_summary};
use outputs::{SUMMARY_FILE, TOP_ENTITIES_FILE, charts};
use rules::Rules;
use scrapers::mfa::{Pacing, ScrapeConfig};
use utils::ensure_writable_dir;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("mfa_headlines starting up");

    let args = Cli::parse();
    debug!(csv = %args.csv.display(), command = ?args.command, "Parsed CLI arguments");

    match &args.command {
        Command::Scrape(scrape) => run_scrape(&args.csv, scrape).await?,
        Command::Analyze(analyze) => run_analysis(&args.csv, analyze).await?,
        Command::Run { scrape, analyze } => {
            run_scrape(&args.csv, scrape).await?;
            run_analysis(&args.csv, analyze).await?;
        }
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );
    Ok(())
}

/// Scrape the listing and persist whatever was collected.
#[instrument(level = "info", skip_all, fields(csv = %csv.display()))]
async fn run_scrape(csv: &Path, args: &ScrapeArgs) -> Result<(), Box<dyn Error>> {
    let config = ScrapeConfig {
        start_url: args.url.clone(),
        webdriver_url: args.webdriver_url.clone(),
        headless: !args.headed,
        pacing: Pacing {
            budget: Duration::from_secs(args.budget_mins * 60),
            ..Pacing::default()
        },
    };

    let records = scrapers::mfa::scrape(&config).await?;
    if records.is_empty() {
        warn!("No headlines collected; writing an empty file");
    }
    store::write_headlines(csv, &records)?;
    info!(count = records.len(), "Headlines saved");
    Ok(())
}

/// Load the CSV, build the chosen recognizer and produce every report.
#[instrument(level = "info", skip_all, fields(csv = %csv.display()))]
async fn run_analysis(csv: &Path, args: &AnalyzeArgs) -> Result<(), Box<dyn Error>> {
    if let Err(e) = ensure_writable_dir(&args.output_dir).await {
        error!(
            path = %args.output_dir.display(),
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    let rules = Rules::load(args.rules.as_deref())?;
    let rows = store::load_headlines(csv)?;
    let recognizer = match args.recognizer {
        RecognizerKind::Gazetteer => {
            Recognizer::Gazetteer(GazetteerRecognizer::load(args.gazetteer.as_deref())?)
        }
        RecognizerKind::Llm => Recognizer::Llm(LlmRecognizer::load(args.config.as_deref()).await?),
    };
    info!(recognizer = ?args.recognizer, "Recognizer ready");

    analyze(&rows, &recognizer, &rules, &args.output_dir).await
}

/// Extract, aggregate and render.
///
/// Every artifact that can be produced is written before a missing series
/// group is reported as an error.
async fn analyze<R: EntityRecognizer>(
    rows: &[HeadlineRow],
    recognizer: &R,
    rules: &Rules,
    output_dir: &Path,
) -> Result<(), Box<dyn Error>> {
    let mut sink = (GlobalCounter::default(), MentionTable::default());
    let stats = extract_mentions(rows, recognizer, rules, &mut sink).await;
    if stats.processed == 0 {
        warn!(skipped = stats.skipped, failed = stats.failed, "No headline could be analyzed");
    }
    let (counter, table) = sink;
    if counter.is_empty() || table.is_empty() {
        warn!("No entity mentions survived filtering");
    }
    if table.undated() > 0 {
        warn!(undated = table.undated(), "Some headlines had no usable date");
    }
    info!(
        entities = counter.counts().len(),
        dated_headlines = table.records().len(),
        "Mentions aggregated"
    );

    let ranking = top_entities(&counter, rules.top_n);
    for (rank, entry) in ranking.iter().enumerate() {
        info!(rank = rank + 1, entity = %entry.entity, count = entry.count, "Top entity");
    }
    charts::render_top_entities(&output_dir.join(TOP_ENTITIES_FILE), &ranking)?;

    let mut series = Vec::new();
    let mut missing: Vec<AnalysisError> = Vec::new();
    for group in &rules.series {
        match table.series(&group.label, &group.variants) {
            Ok(s) => {
                charts::render_monthly_series(
                    &output_dir.join(&group.file),
                    &group.title,
                    &s,
                    rules.marker_date,
                )?;
                series.push(s);
            }
            Err(e) => {
                error!(label = %group.label, error = %e, "Series has no data");
                missing.push(e);
            }
        }
    }

    let report = AnalysisReport {
        generated_at: Utc::now().to_rfc3339(),
        headlines: rows.len(),
        top_entities: ranking,
        monthly: table.monthly(),
        series,
    };
    write_summary(&report, &output_dir.join(SUMMARY_FILE)).await?;

    match missing.into_iter().next() {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::tests::scenario;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_analyze_writes_artifacts_then_reports_missing_group() {
        let dir = tempdir().unwrap();
        let (rows, recognizer) = scenario();
        let rules = Rules::default();

        let err = analyze(&rows, &recognizer, &rules, dir.path()).await.unwrap_err();
        assert!(err.to_string().contains("No mentions of U.S."));

        assert!(dir.path().join(TOP_ENTITIES_FILE).exists());
        assert!(dir.path().join("MentionsOfRussiaOverTime.svg").exists());
        assert!(!dir.path().join("MentionsOfUSA.svg").exists());

        let summary: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join(SUMMARY_FILE)).unwrap(),
        )
        .unwrap();
        assert_eq!(summary["headlines"], 2);
        assert_eq!(summary["top_entities"].as_array().unwrap().len(), 2);
        assert_eq!(summary["series"][0]["label"], "Russia");
    }

    #[tokio::test]
    async fn test_analyze_succeeds_when_every_group_is_present() {
        let dir = tempdir().unwrap();
        let rows = vec![
            HeadlineRow {
                date: "15 January 2022".into(),
                title: Some("Kazakhstan and Russia discuss trade".into()),
            },
            HeadlineRow {
                date: "1 March 2022".into(),
                title: Some("Kazakh FM meets American envoy".into()),
            },
            HeadlineRow { date: "2 March 2022".into(), title: None },
        ];
        let recognizer = GazetteerRecognizer::load(None).unwrap();
        let rules = Rules::default();

        analyze(&rows, &recognizer, &rules, dir.path()).await.unwrap();
        assert!(dir.path().join("MentionsOfUSA.svg").exists());
    }

    #[tokio::test]
    async fn test_run_analysis_reads_csv() {
        let dir = tempdir().unwrap();
        let csv = dir.path().join("headings_and_dates.csv");
        let records = vec![
            models::HeadlineRecord {
                date: "2022-01-15".into(),
                title: "Russian and American delegations visit Astana".into(),
            },
            models::HeadlineRecord {
                date: "2022-01-15".into(),
                title: "Russian and American delegations visit Astana".into(),
            },
        ];
        store::write_headlines(&csv, &records).unwrap();

        let args = AnalyzeArgs {
            output_dir: dir.path().join("charts"),
            rules: None,
            recognizer: RecognizerKind::Gazetteer,
            gazetteer: None,
            config: None,
        };
        run_analysis(&csv, &args).await.unwrap();

        let summary: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(dir.path().join("charts").join(SUMMARY_FILE)).unwrap(),
        )
        .unwrap();
        assert_eq!(summary["headlines"], 1);
        assert_eq!(summary["monthly"]["months"][0]["counts"]["Russia"], 1);
        assert_eq!(summary["monthly"]["months"][0]["counts"]["United States"], 1);
    }
}
