//! Aggregation of per-headline mentions.
//!
//! - [`GlobalCounter`]: entity → total mentions across every headline, used
//!   for the overall ranking.
//! - [`MentionTable`]: one dated row per headline, resampled into calendar
//!   months for the time series.

use crate::extract::MentionSink;
use crate::models::MentionRecord;
use crate::utils::{month_start, next_month, parse_headline_date};
use chrono::NaiveDate;
use itertools::Itertools;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("No mentions of {label} found in data (looked for: {variants:?})")]
    EntityNotFound { label: String, variants: Vec<String> },
}

/// Running entity → mention total.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GlobalCounter {
    counts: BTreeMap<String, u64>,
}

impl GlobalCounter {
    pub fn counts(&self) -> &BTreeMap<String, u64> {
        &self.counts
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn add(&mut self, name: &str, count: u64) {
        *self.counts.entry(name.to_string()).or_insert(0) += count;
    }
}

impl MentionSink for GlobalCounter {
    fn absorb(&mut self, _date: &str, mentions: &BTreeMap<String, u64>) {
        for (name, count) in mentions {
            self.add(name, *count);
        }
    }
}

/// One row of the overall ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedEntity {
    pub entity: String,
    pub count: u64,
}

/// The `n` most mentioned entities, highest first; ties are broken by name.
pub fn top_entities(counter: &GlobalCounter, n: usize) -> Vec<RankedEntity> {
    counter
        .counts
        .iter()
        .sorted_by(|(a_name, a), (b_name, b)| b.cmp(a).then_with(|| a_name.cmp(b_name)))
        .take(n)
        .map(|(entity, count)| RankedEntity {
            entity: entity.clone(),
            count: *count,
        })
        .collect()
}

/// Dated per-headline mention counts.
#[derive(Debug, Default, Clone)]
pub struct MentionTable {
    records: Vec<MentionRecord>,
    undated: usize,
}

impl MentionTable {
    pub fn records(&self) -> &[MentionRecord] {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Headlines with mentions that were left out for lack of a parseable date.
    pub fn undated(&self) -> usize {
        self.undated
    }

    pub fn push(&mut self, record: MentionRecord) {
        if !record.counts.is_empty() {
            self.records.push(record);
        }
    }

    /// Every entity that appears in at least one row.
    pub fn columns(&self) -> BTreeSet<&str> {
        self.records
            .iter()
            .flat_map(|r| r.counts.keys().map(String::as_str))
            .collect()
    }

    /// Resample to calendar months.
    ///
    /// Buckets run contiguously from the earliest to the latest month with
    /// data; every bucket carries every column, zero when unmentioned.
    pub fn monthly(&self) -> MonthlyTable {
        let columns: Vec<String> = self.columns().into_iter().map(str::to_string).collect();
        let zero: BTreeMap<String, u64> = columns.iter().map(|c| (c.clone(), 0)).collect();

        let Some((first, last)) = self
            .records
            .iter()
            .map(|r| month_start(r.date))
            .minmax()
            .into_option()
        else {
            return MonthlyTable {
                columns,
                months: Vec::new(),
            };
        };

        let mut buckets: BTreeMap<NaiveDate, BTreeMap<String, u64>> = BTreeMap::new();
        let mut month = first;
        while month <= last {
            buckets.insert(month, zero.clone());
            month = next_month(month);
        }

        for record in &self.records {
            if let Some(bucket) = buckets.get_mut(&month_start(record.date)) {
                for (name, count) in &record.counts {
                    *bucket.entry(name.clone()).or_insert(0) += count;
                }
            }
        }

        info!(
            months = buckets.len(),
            columns = columns.len(),
            "Resampled mentions to monthly totals"
        );
        MonthlyTable {
            columns,
            months: buckets
                .into_iter()
                .map(|(month, counts)| MonthBucket { month, counts })
                .collect(),
        }
    }

    /// Monthly series summed over whichever of `variants` appear as columns.
    ///
    /// Fails with [`AnalysisError::EntityNotFound`] when none of them is ever
    /// mentioned.
    pub fn series(&self, label: &str, variants: &[String]) -> Result<MonthlySeries, AnalysisError> {
        let columns = self.columns();
        let present: Vec<String> = variants
            .iter()
            .filter(|v| columns.contains(v.as_str()))
            .cloned()
            .collect();
        if present.is_empty() {
            return Err(AnalysisError::EntityNotFound {
                label: label.to_string(),
                variants: variants.to_vec(),
            });
        }

        let points = self
            .monthly()
            .months
            .into_iter()
            .map(|bucket| {
                let total: u64 = present.iter().map(|v| bucket.counts.get(v).copied().unwrap_or(0)).sum();
                (bucket.month, total)
            })
            .collect();

        Ok(MonthlySeries {
            label: label.to_string(),
            variants: present,
            points,
        })
    }
}

impl MentionSink for MentionTable {
    fn absorb(&mut self, date: &str, mentions: &BTreeMap<String, u64>) {
        if mentions.is_empty() {
            return;
        }
        match parse_headline_date(date) {
            Some(date) => self.push(MentionRecord {
                date,
                counts: mentions.clone(),
            }),
            None => {
                warn!(date, "Unparseable headline date; left out of the time series");
                self.undated += 1;
            }
        }
    }
}

/// Mention totals for one calendar month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthBucket {
    /// First day of the month.
    pub month: NaiveDate,
    pub counts: BTreeMap<String, u64>,
}

/// Month-indexed mention totals for every entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlyTable {
    pub columns: Vec<String>,
    pub months: Vec<MonthBucket>,
}

/// One entity group's monthly totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlySeries {
    pub label: String,
    /// Variants that actually occurred and were summed.
    pub variants: Vec<String>,
    pub points: Vec<(NaiveDate, u64)>,
}
