//! Semantic pre-filter: whole-transcript analysis before frame extraction.
//!
//! One streaming LLM call over the entire time-stamped transcript yields
//! ranked points of interest. Running this before screenshots means the
//! vision model later sees candidates the keyword rules would never catch.

use serde_json::Value;

use reviewscribe_config::Settings;
use reviewscribe_core::{Category, Detection, Error, PointOfInterest, Segment, Transcription};
use reviewscribe_llm::{
    parse_model_json, prompt_for, render_prompt, PromptRole, Repaired,
};
use reviewscribe_transport::{HttpClient, StreamEvent};
use reviewscribe_text_processing::text_similarity;

/// Similarity at or above which two POIs are considered duplicates.
pub const POI_DEDUP_THRESHOLD: f64 = 0.45;

/// Tolerance when resolving segment ids around a POI time range.
const SEGMENT_MATCH_SLACK: f64 = 1.0;

/// Context window (seconds) around a POI when synthesizing a detection.
const POI_CONTEXT_SLACK: f64 = 5.0;

/// Pre-filter result: POIs plus the response id for downstream chaining.
///
/// The response id lets the vision model inherit thematic context from the
/// transcript analysis (knowing the user discussed "UI bugs" helps it read
/// the screenshots).
#[derive(Debug, Clone, Default)]
pub struct PrefilterOutcome {
    pub pois: Vec<PointOfInterest>,
    pub response_id: String,
}

/// Format the transcript for LLM analysis, one `[start - end] text` line
/// per segment.
pub fn format_transcript_with_timestamps(transcription: &Transcription) -> String {
    transcription
        .segments
        .iter()
        .map(|s| format!("[{:.1}s - {:.1}s] {}", s.start, s.end, s.text))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Run the semantic pre-filter over the full transcript.
///
/// Streams the response for responsiveness and captures the server response
/// id. Parse problems yield an empty POI list, never an error; transport
/// failures propagate so the caller can fall back to keyword detection.
pub async fn semantic_prefilter(
    http: &HttpClient,
    settings: &Settings,
    transcription: &Transcription,
    previous_response_id: &str,
) -> Result<PrefilterOutcome, Error> {
    if settings.llm_key().is_empty() {
        tracing::warn!("no API key, skipping semantic pre-filter");
        return Ok(PrefilterOutcome::default());
    }

    let transcript_text = format_transcript_with_timestamps(transcription);
    let template = prompt_for(PromptRole::SemanticPrefilter, &settings.language, false);
    let prompt = render_prompt(template, &[("transcript_with_timestamps", &transcript_text)]);

    tracing::info!(
        segments = transcription.segments.len(),
        chars = transcript_text.len(),
        "running semantic pre-filter on entire transcript"
    );

    let body = reviewscribe_llm::build_request(
        &settings.llm_model,
        &prompt,
        &settings.llm_endpoint,
        None,
        true,
        (!previous_response_id.is_empty()).then_some(previous_response_id),
    );

    let mut stream = http
        .post_sse(
            &settings.llm_endpoint,
            settings.llm_key(),
            &body,
            settings.timeouts.llm(),
            "Semantic pre-filter",
        )
        .await
        .map_err(|e| Error::Transport(e.to_string()))?;

    let mut content = String::new();
    let mut response_id = String::new();
    loop {
        match stream.next_event().await {
            Ok(Some(StreamEvent::ContentDelta(delta))) => content.push_str(&delta),
            Ok(Some(StreamEvent::ReasoningDelta(delta))) => {
                tracing::trace!(target: "prefilter_reasoning", "{delta}");
            }
            Ok(Some(StreamEvent::ResponseId(id))) => response_id = id,
            Ok(Some(_)) => {}
            Ok(None) => break,
            Err(e) => return Err(Error::Transport(e.to_string())),
        }
    }

    if content.is_empty() {
        tracing::warn!("empty response from semantic pre-filter");
        return Ok(PrefilterOutcome {
            pois: Vec::new(),
            response_id,
        });
    }

    let pois = parse_prefilter_response(&content, transcription);
    let pois = deduplicate_pois(pois, POI_DEDUP_THRESHOLD);

    tracing::info!(pois = pois.len(), "semantic pre-filter complete");
    Ok(PrefilterOutcome { pois, response_id })
}

/// Parse the pre-filter JSON answer into POIs.
///
/// Individual malformed entries are skipped; an unparseable response yields
/// an empty list rather than failing the stage.
pub fn parse_prefilter_response(
    content: &str,
    transcription: &Transcription,
) -> Vec<PointOfInterest> {
    let data = match parse_model_json(content) {
        Repaired::Parsed(value) => value,
        Repaired::Sentinel { parse_error, .. } => {
            tracing::warn!(%parse_error, "failed to parse pre-filter response");
            return Vec::new();
        }
    };

    let Some(items) = data.get("points_of_interest").and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut pois = Vec::new();
    for item in items {
        let start = item.get("timestamp_start").and_then(Value::as_f64).unwrap_or(0.0);
        let end = item.get("timestamp_end").and_then(Value::as_f64).unwrap_or(0.0);

        let segment_ids = transcription
            .segments
            .iter()
            .filter(|s| s.start >= start - SEGMENT_MATCH_SLACK && s.end <= end + SEGMENT_MATCH_SLACK)
            .map(|s| s.id)
            .collect();

        pois.push(PointOfInterest {
            start,
            end,
            category: Category::parse(
                item.get("category").and_then(Value::as_str).unwrap_or("other"),
            ),
            confidence: item.get("confidence").and_then(Value::as_f64).unwrap_or(0.5),
            reasoning: item
                .get("reasoning")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string(),
            excerpt: item
                .get("transcript_excerpt")
                .and_then(Value::as_str)
                .unwrap_or("")
                .to_string(),
            segment_ids,
        });
    }

    pois
}

fn poi_similarity_text(poi: &PointOfInterest) -> String {
    let mut parts = Vec::new();
    if !poi.excerpt.is_empty() {
        parts.push(poi.excerpt.as_str());
    }
    if !poi.reasoning.is_empty() {
        parts.push(poi.reasoning.as_str());
    }
    parts.join(" ")
}

/// Merge POIs whose excerpt+reasoning texts are near-duplicates.
///
/// Each group keeps the widest time span, the union of segment ids, the
/// maximum confidence, the distinct reasonings concatenated, and the
/// longest excerpt.
pub fn deduplicate_pois(pois: Vec<PointOfInterest>, threshold: f64) -> Vec<PointOfInterest> {
    if pois.len() <= 1 {
        return pois;
    }

    let mut groups: Vec<Vec<usize>> = Vec::new();
    let mut used = vec![false; pois.len()];

    for i in 0..pois.len() {
        if used[i] {
            continue;
        }
        used[i] = true;
        let mut group = vec![i];
        let text_i = poi_similarity_text(&pois[i]);

        for j in (i + 1)..pois.len() {
            if used[j] {
                continue;
            }
            if text_similarity(&text_i, &poi_similarity_text(&pois[j])) >= threshold {
                used[j] = true;
                group.push(j);
            }
        }
        groups.push(group);
    }

    let mut result = Vec::new();
    for group in groups {
        if group.len() == 1 {
            result.push(pois[group[0]].clone());
            continue;
        }

        let members: Vec<&PointOfInterest> = group.iter().map(|&i| &pois[i]).collect();
        let best = members
            .iter()
            .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
            .expect("non-empty group");

        let mut reasonings: Vec<String> = Vec::new();
        let mut seen = std::collections::HashSet::new();
        for poi in &members {
            let key = poi.reasoning.trim().to_lowercase();
            if poi.reasoning.is_empty() || seen.contains(&key) {
                continue;
            }
            seen.insert(key);
            reasonings.push(poi.reasoning.trim().to_string());
        }

        let excerpt = members
            .iter()
            .map(|p| p.excerpt.trim())
            .filter(|e| !e.is_empty())
            .max_by_key(|e| e.len())
            .unwrap_or(members[0].excerpt.as_str())
            .to_string();

        let mut segment_ids: Vec<i64> = members
            .iter()
            .flat_map(|p| p.segment_ids.iter().copied())
            .collect();
        segment_ids.sort_unstable();
        segment_ids.dedup();

        result.push(PointOfInterest {
            start: members
                .iter()
                .map(|p| p.start)
                .fold(f64::INFINITY, f64::min),
            end: members
                .iter()
                .map(|p| p.end)
                .fold(f64::NEG_INFINITY, f64::max),
            category: best.category,
            confidence: members
                .iter()
                .map(|p| p.confidence)
                .fold(f64::NEG_INFINITY, f64::max),
            reasoning: if reasonings.is_empty() {
                members[0].reasoning.clone()
            } else {
                reasonings.join(" | ")
            },
            excerpt,
            segment_ids,
        });
    }

    result
}

/// Convert a POI into a detection so it can flow through the screenshot and
/// analysis stages.
pub fn poi_to_detection(poi: &PointOfInterest, transcription: &Transcription) -> Detection {
    let context = transcription
        .segments
        .iter()
        .filter(|s| s.start >= poi.start - POI_CONTEXT_SLACK && s.end <= poi.end + POI_CONTEXT_SLACK)
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");

    Detection {
        segment: Segment::new(
            poi.segment_ids.first().copied().unwrap_or(0),
            poi.start,
            poi.end,
            poi.excerpt.clone(),
        ),
        category: poi.category,
        keywords_found: vec![format!("semantic:{}", poi.category)],
        context,
    }
}

pub fn pois_to_detections(
    pois: &[PointOfInterest],
    transcription: &Transcription,
) -> Vec<Detection> {
    pois.iter().map(|p| poi_to_detection(p, transcription)).collect()
}
