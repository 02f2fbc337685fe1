//! Per-headline entity extraction.
//!
//! Every headline with a title is run through the recognizer once; its spans
//! are canonicalized by [`Rules::canonicalize`] into a per-headline count map,
//! which is handed to a [`MentionSink`]. The sink decides the output shape:
//! a flat running total ([`GlobalCounter`](crate::aggregate::GlobalCounter)),
//! a dated per-headline table ([`MentionTable`](crate::aggregate::MentionTable)),
//! or both at once via the tuple impl.

use crate::models::{EntitySpan, HeadlineRow};
use crate::ner::EntityRecognizer;
use crate::rules::Rules;
use std::collections::BTreeMap;
use tracing::{debug, info, instrument, warn};

/// Receives the canonical mention counts of one headline.
pub trait MentionSink {
    fn absorb(&mut self, date: &str, mentions: &BTreeMap<String, u64>);
}

impl<A: MentionSink, B: MentionSink> MentionSink for (A, B) {
    fn absorb(&mut self, date: &str, mentions: &BTreeMap<String, u64>) {
        self.0.absorb(date, mentions);
        self.1.absorb(date, mentions);
    }
}

/// Counters reported after an extraction pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExtractStats {
    /// Headlines sent to the recognizer.
    pub processed: usize,
    /// Rows without a title.
    pub skipped: usize,
    /// Headlines the recognizer failed on.
    pub failed: usize,
    /// Surviving spans across all headlines.
    pub mentions: u64,
}

/// Canonical entity counts for one headline's spans.
pub fn headline_mentions(spans: &[EntitySpan], rules: &Rules) -> BTreeMap<String, u64> {
    let mut counts = BTreeMap::new();
    for name in spans.iter().filter_map(|span| rules.canonicalize(span)) {
        *counts.entry(name).or_insert(0) += 1;
    }
    counts
}

/// Recognize and canonicalize every titled row, feeding `sink`.
///
/// Rows without a title are skipped silently. A recognizer error on one
/// headline is logged and the headline contributes nothing.
#[instrument(level = "info", skip_all, fields(rows = rows.len()))]
pub async fn extract_mentions<R, S>(
    rows: &[HeadlineRow],
    recognizer: &R,
    rules: &Rules,
    sink: &mut S,
) -> ExtractStats
where
    R: EntityRecognizer,
    S: MentionSink,
{
    let mut stats = ExtractStats::default();

    for (index, row) in rows.iter().enumerate() {
        let Some(title) = row.title.as_deref() else {
            stats.skipped += 1;
            continue;
        };

        let spans = match recognizer.recognize(title).await {
            Ok(spans) => spans,
            Err(e) => {
                warn!(index, error = %e, "Entity recognition failed; skipping headline");
                stats.failed += 1;
                continue;
            }
        };

        let mentions = headline_mentions(&spans, rules);
        debug!(index, spans = spans.len(), kept = mentions.len(), "Extracted mentions");
        stats.processed += 1;
        stats.mentions += mentions.values().sum::<u64>();
        sink.absorb(&row.date, &mentions);
    }

    info!(
        processed = stats.processed,
        skipped = stats.skipped,
        failed = stats.failed,
        mentions = stats.mentions,
        "Entity extraction complete"
    );
    stats
}
