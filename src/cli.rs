//! Command-line interface definitions for mfa_headlines.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Connection settings can also be provided via environment variables.

use crate::ner::RecognizerKind;
use crate::scrapers::mfa::START_URL;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments for the mfa_headlines application.
///
/// # Examples
///
/// ```sh
/// # Scrape the listing through a local chromedriver
/// mfa_headlines scrape --webdriver-url http://localhost:9515
///
/// # Analyze a previously scraped file with the offline tagger
/// mfa_headlines analyze --csv headings_and_dates.csv -o ./charts
///
/// # Scrape, then analyze with an LLM tagger
/// mfa_headlines run --recognizer llm -c ~/.config/aj/config.yaml
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Headline CSV written by `scrape` and read by `analyze`
    #[arg(long, global = true, default_value = "headings_and_dates.csv")]
    pub csv: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Scrape headlines from the press listing into the CSV file
    Scrape(ScrapeArgs),
    /// Extract entity mentions from the CSV file and render charts
    Analyze(AnalyzeArgs),
    /// Scrape, then analyze
    Run {
        #[command(flatten)]
        scrape: ScrapeArgs,
        #[command(flatten)]
        analyze: AnalyzeArgs,
    },
}

#[derive(Args, Debug, Clone)]
pub struct ScrapeArgs {
    /// First page of the press listing
    #[arg(long, default_value = START_URL)]
    pub url: String,

    /// WebDriver server (chromedriver, geckodriver or a Selenium grid)
    #[arg(long, env = "WEBDRIVER_URL", default_value = "http://localhost:9515")]
    pub webdriver_url: String,

    /// Show the browser window instead of running headless
    #[arg(long)]
    pub headed: bool,

    /// Wall-clock budget for pagination, in minutes
    #[arg(long, default_value_t = 20)]
    pub budget_mins: u64,
}

#[derive(Args, Debug, Clone)]
pub struct AnalyzeArgs {
    /// Output directory for charts and the JSON summary
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,

    /// YAML file overriding the exclusion set, alias table or series groups
    #[arg(long)]
    pub rules: Option<PathBuf>,

    /// Entity recognizer back-end
    #[arg(long, value_enum, default_value_t = RecognizerKind::Gazetteer)]
    pub recognizer: RecognizerKind,

    /// YAML term list for the gazetteer recognizer (built-in list if omitted)
    #[arg(long)]
    pub gazetteer: Option<PathBuf>,

    /// Optional path to the model config.yaml for the LLM recognizer
    #[arg(short, long, env = "AJ_CONFIG")]
    pub config: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_scrape_defaults() {
        let cli = Cli::parse_from(["mfa_headlines", "scrape"]);
        assert_eq!(cli.csv, PathBuf::from("headings_and_dates.csv"));
        let Command::Scrape(args) = cli.command else {
            panic!("expected scrape");
        };
        assert_eq!(args.url, START_URL);
        assert_eq!(args.budget_mins, 20);
        assert!(!args.headed);
    }

    #[test]
    fn test_cli_analyze_flags() {
        let cli = Cli::parse_from([
            "mfa_headlines",
            "analyze",
            "--csv",
            "/tmp/h.csv",
            "-o",
            "/tmp/charts",
            "--recognizer",
            "llm",
        ]);
        assert_eq!(cli.csv, PathBuf::from("/tmp/h.csv"));
        let Command::Analyze(args) = cli.command else {
            panic!("expected analyze");
        };
        assert_eq!(args.output_dir, PathBuf::from("/tmp/charts"));
        assert_eq!(args.recognizer, RecognizerKind::Llm);
        assert!(args.rules.is_none());
    }

    #[test]
    fn test_cli_run_accepts_both_option_sets() {
        let cli = Cli::parse_from([
            "mfa_headlines",
            "run",
            "--budget-mins",
            "5",
            "--rules",
            "rules.yaml",
        ]);
        let Command::Run { scrape, analyze } = cli.command else {
            panic!("expected run");
        };
        assert_eq!(scrape.budget_mins, 5);
        assert_eq!(analyze.rules, Some(PathBuf::from("rules.yaml")));
        assert_eq!(analyze.recognizer, RecognizerKind::Gazetteer);
    }
}
