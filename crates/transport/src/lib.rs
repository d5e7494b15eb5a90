//! HTTP transport for the review pipeline.
//!
//! A thin layer over reqwest providing:
//! - per-operation timeouts (the pipeline's calls range from a 10 s
//!   preflight probe to a 600 s transcription upload)
//! - a shared retry policy with exponential backoff and jitter on
//!   transient failures
//! - multipart upload for the STT endpoint
//! - an SSE reader that turns `data:` lines into a tagged event union

pub mod client;
pub mod error;
pub mod retry;
pub mod sse;

pub use client::{HttpClient, MultipartFile};
pub use error::TransportError;
pub use retry::{with_retry, RetryPolicy};
pub use sse::{classify_chunk, SseLineBuffer, SseStream, StreamEvent};
