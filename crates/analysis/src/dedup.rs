//! Two-stage finding deduplication.
//!
//! Stage 1 groups findings whose normalized summaries are identical,
//! regardless of category. Stage 2 greedily groups the rest when they share
//! a category, sit within 30 seconds of each other, and their texts are
//! similar enough. Each group collapses into its earliest member.

use std::collections::{HashMap, HashSet};

use reviewscribe_core::UnifiedFinding;
use reviewscribe_text_processing::text_similarity;

/// Similarity at or above which same-category findings merge.
pub const DEDUP_SIMILARITY_THRESHOLD: f64 = 0.4;

/// Findings further apart than this never merge in the similar stage.
const DEDUP_TIME_WINDOW: f64 = 30.0;

/// Merged findings carry at most this many action items.
const MAX_ACTION_ITEMS: usize = 5;

fn normalize_text(text: &str) -> String {
    text.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

fn similarity_text(finding: &UnifiedFinding) -> String {
    if !finding.summary.trim().is_empty() {
        return finding.summary.clone();
    }
    finding
        .action_items
        .iter()
        .chain(finding.affected_components.iter())
        .chain(finding.issues_detected.iter())
        .chain(finding.ui_elements.iter())
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Deduplicate findings by merging near-duplicates.
///
/// Idempotent: running it again over its own output changes nothing.
pub fn deduplicate_findings(
    findings: Vec<UnifiedFinding>,
    similarity_threshold: f64,
) -> Vec<UnifiedFinding> {
    if findings.len() <= 1 {
        return findings;
    }

    // Stage 1: identical normalized summaries, category-agnostic.
    let mut summary_groups: HashMap<String, Vec<usize>> = HashMap::new();
    for (idx, finding) in findings.iter().enumerate() {
        let key = normalize_text(&finding.summary);
        if !key.is_empty() {
            summary_groups.entry(key).or_default().push(idx);
        }
    }

    let mut groups: Vec<Vec<usize>> = Vec::new();
    let mut used: HashSet<usize> = HashSet::new();

    for (i, finding) in findings.iter().enumerate() {
        let key = normalize_text(&finding.summary);
        if !key.is_empty() {
            if let Some(identical) = summary_groups.get(&key) {
                if identical.len() > 1 {
                    if used.contains(&i) {
                        continue;
                    }
                    used.extend(identical.iter().copied());
                    groups.push(identical.clone());
                    continue;
                }
            }
        }

        if used.contains(&i) {
            continue;
        }

        // Stage 2: same category, close in time, similar text.
        used.insert(i);
        let mut group = vec![i];
        let text_i = similarity_text(finding);

        for (j, other) in findings.iter().enumerate() {
            if used.contains(&j) {
                continue;
            }
            if finding.category != other.category {
                continue;
            }
            if (finding.timestamp - other.timestamp).abs() > DEDUP_TIME_WINDOW {
                continue;
            }
            if text_similarity(&text_i, &similarity_text(other)) >= similarity_threshold {
                used.insert(j);
                group.push(j);
            }
        }

        groups.push(group);
    }

    let mut result = Vec::new();
    for group in groups {
        if group.len() == 1 {
            result.push(findings[group[0]].clone());
            continue;
        }

        let mut members: Vec<&UnifiedFinding> = group.iter().map(|&i| &findings[i]).collect();
        members.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        let base = members[0];

        let severity = members
            .iter()
            .max_by_key(|f| f.severity.rank())
            .expect("non-empty group")
            .severity;

        let mut action_items: Vec<String> = Vec::new();
        let mut seen_actions: HashSet<String> = HashSet::new();
        for member in &members {
            for action in &member.action_items {
                let key = action.to_lowercase();
                if seen_actions.insert(key) {
                    action_items.push(action.clone());
                }
            }
        }
        action_items.truncate(MAX_ACTION_ITEMS);

        let mut affected_components: Vec<String> = Vec::new();
        let mut seen_components: HashSet<String> = HashSet::new();
        for member in &members {
            for component in &member.affected_components {
                let key = component.to_lowercase();
                if seen_components.insert(key) {
                    affected_components.push(component.clone());
                }
            }
        }

        let merged_from_ids = members[1..]
            .iter()
            .map(|f| (f.detection_id, f.timestamp))
            .collect::<Vec<_>>();

        tracing::debug!(
            merged = members.len(),
            summary = %base.summary.chars().take(50).collect::<String>(),
            "merged similar findings"
        );

        result.push(UnifiedFinding {
            severity,
            is_issue: members.iter().any(|f| f.is_issue),
            action_items,
            affected_components,
            merged_from_ids,
            ..base.clone()
        });
    }

    result
}
