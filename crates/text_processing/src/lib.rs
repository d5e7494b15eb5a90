//! Language-aware text similarity shared across the pipeline.
//!
//! Deduplication quality for Polish review transcripts depends less on raw
//! word overlap than on whether two utterances talk about the same UI
//! concept in different inflections. The similarity here normalizes both
//! texts against hand-authored dictionaries (stopwords, number words, a
//! small stem map) and weights shared key concepts above plain Jaccard.
//!
//! The dictionaries live in `data/similarity_pl.yaml` and are embedded at
//! compile time; they are a versioned part of the merging contract.

mod similarity;

pub use similarity::{normalize_for_similarity, text_similarity};
