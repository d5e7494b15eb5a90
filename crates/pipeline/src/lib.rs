//! The pipeline: stage coordination, checkpointing, and preflight.
//!
//! The coordinator owns the fixed stage sequence
//! `audio → transcription → detection → screenshots → unified_analysis →
//! report`, persists a checkpoint after every completed stage, and keeps a
//! best-effort error list so a partial report always ships.

pub mod checkpoint;
pub mod coordinator;
pub mod validation;

pub use checkpoint::{
    checkpoint_path, checkpoint_valid_for, compute_file_hash, delete_checkpoint, load_checkpoint,
    save_checkpoint, PipelineCheckpoint, ScreenshotRecord,
};
pub use coordinator::{next_review_path, Pipeline, PipelineOptions, RunOutcome, SCREENSHOT_OFFSET};
pub use validation::validate_models;
