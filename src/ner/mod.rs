//! Named-entity recognition for headline text.
//!
//! The recognizer is a black box producing `(span text, label)` pairs for one
//! headline at a time. Two back-ends are available:
//!
//! | Back-end | Module | Notes |
//! |----------|--------|-------|
//! | Gazetteer | [`gazetteer`] | Offline term list, longest match first; the default |
//! | LLM | [`llm`] | OpenAI-compatible model via `awful_aj`; retried with backoff |
//!
//! Both emit the labels `GPE`, `NORP` and `ORG`; everything else the model
//! returns is carried as [`EntityLabel::Other`](crate::models::EntityLabel)
//! and ignored downstream.

pub mod gazetteer;
pub mod llm;

use crate::models::EntitySpan;
use clap::ValueEnum;
use std::error::Error;

pub use gazetteer::GazetteerRecognizer;
pub use llm::LlmRecognizer;

/// Tags entity spans in a piece of text.
pub trait EntityRecognizer {
    /// Recognize the entity spans in `text`, in order of appearance.
    async fn recognize(&self, text: &str) -> Result<Vec<EntitySpan>, Box<dyn Error>>;
}

/// Which recognizer back-end to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RecognizerKind {
    Gazetteer,
    Llm,
}

/// Runtime-selected recognizer.
#[derive(Debug)]
pub enum Recognizer {
    Gazetteer(GazetteerRecognizer),
    Llm(LlmRecognizer),
}

impl EntityRecognizer for Recognizer {
    async fn recognize(&self, text: &str) -> Result<Vec<EntitySpan>, Box<dyn Error>> {
        match self {
            Recognizer::Gazetteer(g) => g.recognize(text).await,
            Recognizer::Llm(l) => l.recognize(text).await,
        }
    }
}
