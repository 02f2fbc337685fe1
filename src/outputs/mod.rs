//! Output generation for charts and the JSON summary.
//!
//! # Submodules
//!
//! - [`charts`]: Renders the ranking and monthly series as SVG charts
//! - [`json`]: Writes the computed tables as a JSON summary
//!
//! # Output Structure
//!
//! ```text
//! output_dir/
//! ├── TopMentionedCountries.svg
//! ├── MentionsOfRussiaOverTime.svg
//! ├── MentionsOfUSA.svg
//! └── summary.json
//! ```
//!
//! Series chart file names come from the rules, so additional groups add
//! files alongside these.

pub mod charts;
pub mod json;

pub const TOP_ENTITIES_FILE: &str = "TopMentionedCountries.svg";
pub const SUMMARY_FILE: &str = "summary.json";
