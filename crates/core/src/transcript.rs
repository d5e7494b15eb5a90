//! Transcript types produced by the STT stage.

use serde::{Deserialize, Serialize};

/// A transcription segment with timing info.
///
/// Produced by STT and immutable thereafter. Ids are unique within a
/// transcription but not globally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub id: i64,
    /// Start time in seconds from video start.
    pub start: f64,
    /// End time in seconds from video start.
    pub end: f64,
    pub text: String,
    /// Whisper-style no-speech probability. Older checkpoints lack this
    /// field, so it defaults to 0.
    #[serde(default)]
    pub no_speech_prob: f64,
}

impl Segment {
    pub fn new(id: i64, start: f64, end: f64, text: impl Into<String>) -> Self {
        Self {
            id,
            start,
            end,
            text: text.into(),
            no_speech_prob: 0.0,
        }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Full transcription result with segments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transcription {
    /// Concatenated transcript text. Serialized as `text` for checkpoint
    /// compatibility with earlier releases.
    #[serde(rename = "text")]
    pub full_text: String,
    /// Segments sorted by start time.
    pub segments: Vec<Segment>,
    pub language: String,
    /// Server-assigned response id, used to chain conversational context
    /// into the semantic pre-filter. Empty when the STT backend does not
    /// provide one.
    #[serde(default)]
    pub response_id: String,
}

impl Transcription {
    /// Mean no-speech probability across segments; 0 for an empty transcript.
    pub fn mean_no_speech_prob(&self) -> f64 {
        if self.segments.is_empty() {
            return 0.0;
        }
        self.segments.iter().map(|s| s.no_speech_prob).sum::<f64>() / self.segments.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_defaults_no_speech_prob() {
        let json = r#"{"id": 3, "start": 1.0, "end": 2.5, "text": "hello"}"#;
        let seg: Segment = serde_json::from_str(json).unwrap();
        assert_eq!(seg.no_speech_prob, 0.0);
        assert_eq!(seg.duration(), 1.5);
    }

    #[test]
    fn test_transcription_roundtrip_uses_text_key() {
        let t = Transcription {
            full_text: "a b".to_string(),
            segments: vec![Segment::new(0, 0.0, 1.0, "a"), Segment::new(1, 1.0, 2.0, "b")],
            language: "pl".to_string(),
            response_id: String::new(),
        };
        let json = serde_json::to_value(&t).unwrap();
        assert_eq!(json["text"], "a b");
        let back: Transcription = serde_json::from_value(json).unwrap();
        assert_eq!(back, t);
    }

    #[test]
    fn test_mean_no_speech_prob() {
        let mut t = Transcription {
            full_text: String::new(),
            segments: vec![],
            language: "en".to_string(),
            response_id: String::new(),
        };
        assert_eq!(t.mean_no_speech_prob(), 0.0);
        let mut a = Segment::new(0, 0.0, 1.0, "a");
        a.no_speech_prob = 0.2;
        let mut b = Segment::new(1, 1.0, 2.0, "b");
        b.no_speech_prob = 0.8;
        t.segments = vec![a, b];
        assert!((t.mean_no_speech_prob() - 0.5).abs() < 1e-9);
    }
}
