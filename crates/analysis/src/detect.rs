//! Keyword-based issue detection.

use reviewscribe_config::CompiledKeywords;
use reviewscribe_core::{Category, Detection, Segment, Transcription};

/// Segments on each side of a hit included as context.
pub const CONTEXT_WINDOW: usize = 2;
/// Maximum gap in seconds for merging consecutive same-category detections.
pub const DETECTION_MAX_GAP: f64 = 5.0;

/// Scan every transcript segment against the keyword rules.
///
/// Category priority on multi-category matches is bug > change > ui.
pub fn detect_issues(
    transcription: &Transcription,
    keywords: &CompiledKeywords,
    context_window: usize,
) -> Vec<Detection> {
    let segments = &transcription.segments;
    let mut detections = Vec::new();

    for (i, segment) in segments.iter().enumerate() {
        let text_lower = segment.text.to_lowercase();
        let mut found: Vec<String> = Vec::new();
        let mut category: Option<Category> = None;

        for (pattern, re) in &keywords.bug {
            if re.is_match(&text_lower) {
                push_unique(&mut found, pattern);
                category = Some(Category::Bug);
            }
        }
        for (pattern, re) in &keywords.change {
            if re.is_match(&text_lower) {
                push_unique(&mut found, pattern);
                category.get_or_insert(Category::Change);
            }
        }
        for (pattern, re) in &keywords.ui {
            if re.is_match(&text_lower) {
                push_unique(&mut found, pattern);
                category.get_or_insert(Category::Ui);
            }
        }

        if let Some(category) = category {
            let start_idx = i.saturating_sub(context_window);
            let end_idx = (i + context_window + 1).min(segments.len());
            let context = segments[start_idx..end_idx]
                .iter()
                .map(|s| s.text.as_str())
                .collect::<Vec<_>>()
                .join(" ");

            detections.push(Detection {
                segment: segment.clone(),
                category,
                keywords_found: found,
                context,
            });
        }
    }

    let merged = merge_consecutive_detections(detections, DETECTION_MAX_GAP);

    tracing::info!(
        total = merged.len(),
        bugs = merged.iter().filter(|d| d.category == Category::Bug).count(),
        changes = merged.iter().filter(|d| d.category == Category::Change).count(),
        ui = merged.iter().filter(|d| d.category == Category::Ui).count(),
        "keyword detection complete"
    );

    merged
}

/// Merge consecutive detections of the same category within `max_gap`
/// seconds: union time range, union keywords, concatenated text/context.
pub fn merge_consecutive_detections(detections: Vec<Detection>, max_gap: f64) -> Vec<Detection> {
    let mut iter = detections.into_iter();
    let Some(mut current) = iter.next() else {
        return Vec::new();
    };

    let mut merged = Vec::new();
    for detection in iter {
        let gap = detection.segment.start - current.segment.end;
        if gap <= max_gap && detection.category == current.category {
            let mut keywords = current.keywords_found.clone();
            for kw in &detection.keywords_found {
                push_unique(&mut keywords, kw);
            }
            current = Detection {
                segment: Segment {
                    id: current.segment.id,
                    start: current.segment.start,
                    end: detection.segment.end,
                    text: format!("{} {}", current.segment.text, detection.segment.text),
                    no_speech_prob: current.segment.no_speech_prob,
                },
                category: current.category,
                keywords_found: keywords,
                context: format!("{} ... {}", current.context, detection.context),
            };
        } else {
            merged.push(current);
            current = detection;
        }
    }
    merged.push(current);
    merged
}

fn push_unique(list: &mut Vec<String>, value: &str) {
    if !list.iter().any(|v| v == value) {
        list.push(value.to_string());
    }
}
