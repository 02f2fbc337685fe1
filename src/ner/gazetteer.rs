//! Offline term-list tagger.
//!
//! Tags every occurrence of a known term in the headline. Matching is
//! case-sensitive and word-bounded, and at each position the longest term
//! wins, so "Russian Federation" is one GPE span rather than a NORP span
//! followed by noise, and "UNESCO" never yields "UN".
//!
//! The term list is YAML keyed by label:
//!
//! ```yaml
//! GPE: [Russia, China]
//! NORP: [Chinese]
//! ORG: [United Nations]
//! ```

use super::EntityRecognizer;
use crate::models::{EntityLabel, EntitySpan};
use itertools::Itertools;
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::error::Error;
use std::path::Path;
use tracing::{debug, info, instrument};

const BUILTIN_TERMS: &str = include_str!("../../data/gazetteer.yaml");

#[derive(Debug, Clone)]
pub struct GazetteerRecognizer {
    /// `\b(?:term|...)\b` with terms longest first, so the leftmost-first
    /// alternation picks the longest term at each position. `None` when the
    /// list is empty.
    pattern: Option<Regex>,
    labels: HashMap<String, EntityLabel>,
}

impl GazetteerRecognizer {
    /// Load a term list from `path`, or the built-in list when `None`.
    #[instrument(level = "info", fields(path = ?path))]
    pub fn load(path: Option<&Path>) -> Result<Self, Box<dyn Error>> {
        let recognizer = match path {
            Some(path) => Self::from_yaml(&std::fs::read_to_string(path)?)?,
            None => Self::from_yaml(BUILTIN_TERMS)?,
        };
        info!(terms = recognizer.labels.len(), "Gazetteer ready");
        Ok(recognizer)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, Box<dyn Error>> {
        let table: BTreeMap<String, Vec<String>> = serde_yaml::from_str(raw)?;
        let recognizer = Self::from_terms(table.into_iter().flat_map(|(label, terms)| {
            let label = EntityLabel::parse(&label);
            terms.into_iter().map(move |term| (term, label.clone()))
        }))?;
        Ok(recognizer)
    }

    /// Build from `(term, label)` pairs; a term listed twice keeps its first label.
    pub fn from_terms(
        terms: impl IntoIterator<Item = (String, EntityLabel)>,
    ) -> Result<Self, regex::Error> {
        let terms: Vec<(String, EntityLabel)> = terms
            .into_iter()
            .map(|(term, label)| (term.trim().to_string(), label))
            .filter(|(term, _)| !term.is_empty())
            .unique_by(|(term, _)| term.clone())
            .collect();

        let pattern = if terms.is_empty() {
            None
        } else {
            let alternation = terms
                .iter()
                .map(|(term, _)| term.as_str())
                .sorted_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)))
                .map(regex::escape)
                .join("|");
            Some(Regex::new(&format!(r"\b(?:{alternation})\b"))?)
        };

        Ok(Self {
            pattern,
            labels: terms.into_iter().collect(),
        })
    }

    /// Tag all known terms in `text`, left to right.
    pub fn tag(&self, text: &str) -> Vec<EntitySpan> {
        let Some(pattern) = &self.pattern else {
            return Vec::new();
        };
        pattern
            .find_iter(text)
            .filter_map(|m| {
                self.labels
                    .get(m.as_str())
                    .map(|label| EntitySpan::new(m.as_str(), label.clone()))
            })
            .collect()
    }
}

impl EntityRecognizer for GazetteerRecognizer {
    async fn recognize(&self, text: &str) -> Result<Vec<EntitySpan>, Box<dyn Error>> {
        let spans = self.tag(text);
        debug!(count = spans.len(), "Gazetteer tagged headline");
        Ok(spans)
    }
}
