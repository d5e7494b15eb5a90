//! Speech-to-text client.

use std::path::Path;
use std::time::Duration;

use serde_json::Value;

use reviewscribe_core::{Segment, Transcription};
use reviewscribe_transport::{HttpClient, MultipartFile};

use crate::LlmError;

/// Parameters for one transcription call.
#[derive(Debug, Clone)]
pub struct SttRequest<'a> {
    pub endpoint: &'a str,
    pub model: &'a str,
    pub api_key: &'a str,
    pub language: &'a str,
    pub timeout: Duration,
}

/// Upload an audio file and parse the verbose-JSON transcription.
pub async fn transcribe(
    http: &HttpClient,
    request: &SttRequest<'_>,
    audio_path: &Path,
) -> Result<Transcription, LlmError> {
    let bytes = tokio::fs::read(audio_path).await?;
    let file_name = audio_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "audio.mp3".to_string());

    tracing::info!(
        file = %file_name,
        endpoint = request.endpoint,
        "transcribing audio"
    );

    let file = MultipartFile {
        field: "file".to_string(),
        file_name,
        mime: "audio/mpeg".to_string(),
        bytes,
    };
    let fields = [
        ("model".to_string(), request.model.to_string()),
        ("language".to_string(), request.language.to_string()),
        ("response_format".to_string(), "verbose_json".to_string()),
    ];

    let result = http
        .post_multipart(
            request.endpoint,
            request.api_key,
            &fields,
            &file,
            request.timeout,
            "Transcription",
        )
        .await?;

    let transcription = parse_verbose_json(&result, request.language);
    tracing::info!(segments = transcription.segments.len(), "transcription complete");
    Ok(transcription)
}

/// Parse the STT `verbose_json` response shape.
pub fn parse_verbose_json(result: &Value, fallback_language: &str) -> Transcription {
    let mut segments = Vec::new();
    if let Some(raw_segments) = result.get("segments").and_then(Value::as_array) {
        for seg in raw_segments {
            segments.push(Segment {
                id: seg.get("id").and_then(Value::as_i64).unwrap_or(0),
                start: seg.get("start").and_then(Value::as_f64).unwrap_or(0.0),
                end: seg.get("end").and_then(Value::as_f64).unwrap_or(0.0),
                text: seg
                    .get("text")
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .trim()
                    .to_string(),
                no_speech_prob: seg
                    .get("no_speech_prob")
                    .and_then(Value::as_f64)
                    .unwrap_or(0.0),
            });
        }
    }

    Transcription {
        full_text: result
            .get("text")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string(),
        language: result
            .get("language")
            .and_then(Value::as_str)
            .unwrap_or(fallback_language)
            .to_string(),
        segments,
        // Some gateways assign a response id to transcriptions as well;
        // when present it seeds the pre-filter's conversation chain.
        response_id: result
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string(),
    }
}
