//! Model endpoint integration.
//!
//! - [`stt`]: multipart speech-to-text client producing a [`reviewscribe_core::Transcription`]
//! - [`protocol`]: request builders and response extraction for both wire
//!   flavors the model servers speak (Responses and Chat Completions)
//! - [`repair`]: best-effort JSON recovery from model output
//! - [`prompts`]: the language-tagged prompt registry

pub mod prompts;
pub mod protocol;
pub mod repair;
pub mod stt;

pub use prompts::{normalize_language, prompt_for, render_prompt, PromptRole};
pub use protocol::{
    build_request, encode_image, extract_content, extract_response_id,
    is_chat_completions_endpoint, ImageAttachment,
};
pub use repair::{clean_summary_response, parse_model_json, Repaired};
pub use stt::{transcribe, SttRequest};

use thiserror::Error;

/// Errors from model endpoint calls.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error(transparent)]
    Transport(#[from] reviewscribe_transport::TransportError),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
