//! Reconciling semantic POIs with keyword detections (combined mode).

use reviewscribe_core::{Detection, PointOfInterest};

/// Gap in seconds under which a keyword hit and a POI count as overlapping.
pub const POI_MERGE_MAX_GAP: f64 = 3.0;

/// Confidence boost for a POI corroborated by a keyword hit.
const KEYWORD_BOOST: f64 = 0.2;

/// Confidence assigned to a keyword hit promoted to a synthetic POI.
const KEYWORD_CONFIDENCE: f64 = 0.7;

/// Merge keyword detections into the semantic POI stream.
///
/// A detection near an existing POI boosts that POI's confidence; anything
/// uncovered becomes a synthetic POI. The combined list is then sorted and
/// swept once so overlapping or abutting ranges collapse into one.
pub fn merge_pois_with_detections(
    mut pois: Vec<PointOfInterest>,
    keyword_detections: &[Detection],
    max_gap: f64,
) -> Vec<PointOfInterest> {
    for det in keyword_detections {
        let mut covered = false;
        for poi in pois.iter_mut() {
            if (poi.start - det.segment.start).abs() < max_gap {
                poi.confidence = (poi.confidence + KEYWORD_BOOST).min(1.0);
                covered = true;
                break;
            }
        }

        if !covered {
            pois.push(PointOfInterest {
                start: det.segment.start,
                end: det.segment.end,
                category: det.category,
                confidence: KEYWORD_CONFIDENCE,
                reasoning: format!("Keyword detection: {}", det.keywords_found.join(", ")),
                excerpt: det.segment.text.chars().take(100).collect(),
                segment_ids: vec![det.segment.id],
            });
        }
    }

    pois.sort_by(|a, b| a.start.total_cmp(&b.start));

    let mut iter = pois.into_iter();
    let Some(mut current) = iter.next() else {
        return Vec::new();
    };

    let mut merged = Vec::new();
    for poi in iter {
        if poi.start <= current.end + max_gap {
            let category = if current.confidence >= poi.confidence {
                current.category
            } else {
                poi.category
            };
            let mut segment_ids: Vec<i64> = current
                .segment_ids
                .iter()
                .chain(poi.segment_ids.iter())
                .copied()
                .collect();
            segment_ids.sort_unstable();
            segment_ids.dedup();

            current = PointOfInterest {
                start: current.start,
                end: current.end.max(poi.end),
                category,
                confidence: current.confidence.max(poi.confidence),
                reasoning: format!("{} | {}", current.reasoning, poi.reasoning),
                excerpt: format!("{} ... {}", current.excerpt, poi.excerpt),
                segment_ids,
            };
        } else {
            merged.push(current);
            current = poi;
        }
    }
    merged.push(current);
    merged
}
