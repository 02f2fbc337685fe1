//! Data models for scraped headlines and the entity mentions derived from them.
//!
//! This module defines the core data structures used throughout the application:
//! - [`HeadlineRecord`]: A (date, title) pair as scraped from the listing page
//! - [`HeadlineRow`]: The same pair as read back from the CSV store, where the
//!   title may be missing
//! - [`EntitySpan`] / [`EntityLabel`]: Recognizer output for a single headline
//! - [`MentionRecord`]: Canonical entity counts for one dated headline

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A headline as scraped from the press listing.
///
/// Both fields hold the trimmed text of the page elements; the date is kept
/// as the site renders it and only parsed during analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeadlineRecord {
    /// Publication date as displayed on the listing page.
    pub date: String,
    /// Headline text.
    pub title: String,
}

/// A headline row loaded back from the CSV store.
///
/// An empty title cell is treated as missing, so rows are not guaranteed to
/// carry text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadlineRow {
    pub date: String,
    pub title: Option<String>,
}

/// Semantic category assigned to a recognized span.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityLabel {
    /// Geo-political entity: countries, cities, states.
    Gpe,
    /// Nationality, religious or political group.
    Norp,
    /// Organization.
    Org,
    /// Any other label the recognizer emits; never counted.
    Other(String),
}

impl EntityLabel {
    /// Parse a recognizer label such as `"GPE"`; matching is case-insensitive.
    pub fn parse(label: &str) -> Self {
        match label.trim().to_ascii_uppercase().as_str() {
            "GPE" => EntityLabel::Gpe,
            "NORP" => EntityLabel::Norp,
            "ORG" => EntityLabel::Org,
            other => EntityLabel::Other(other.to_string()),
        }
    }
}

impl fmt::Display for EntityLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityLabel::Gpe => f.write_str("GPE"),
            EntityLabel::Norp => f.write_str("NORP"),
            EntityLabel::Org => f.write_str("ORG"),
            EntityLabel::Other(other) => f.write_str(other),
        }
    }
}

impl Serialize for EntityLabel {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for EntityLabel {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(EntityLabel::parse(&raw))
    }
}

/// A span of headline text tagged by an entity recognizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySpan {
    pub text: String,
    pub label: EntityLabel,
}

impl EntitySpan {
    pub fn new(text: impl Into<String>, label: EntityLabel) -> Self {
        Self {
            text: text.into(),
            label,
        }
    }
}

/// Canonical entity counts for one headline, tagged with its parsed date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MentionRecord {
    pub date: NaiveDate,
    pub counts: BTreeMap<String, u64>,
}
