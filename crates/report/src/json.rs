//! JSON report renderer.

use std::path::{Path, PathBuf};

use serde_json::{json, Value};

use reviewscribe_core::{format_timestamp, Error, Severity};

use crate::ReportContext;

/// Render and write the JSON report.
pub fn save_json_report(context: &ReportContext, output_path: &Path) -> Result<PathBuf, Error> {
    let counts = context.counts();

    let mut report = json!({
        "video": context.video.display().to_string(),
        "generated_at": chrono::Local::now().to_rfc3339(),
        "executive_summary": context.executive_summary,
        "summary": {
            "total": counts.total,
            "bugs": counts.bugs,
            "changes": counts.changes,
            "ui": counts.ui,
        },
        "severity_breakdown": {},
        "errors": context.errors,
        "findings": [],
    });

    if !context.findings.is_empty() {
        let mut breakdown = serde_json::Map::new();
        for severity in [Severity::Critical, Severity::High, Severity::Medium, Severity::Low] {
            let count = context
                .findings
                .iter()
                .filter(|f| f.is_issue && f.severity == severity)
                .count();
            breakdown.insert(severity.as_str().to_string(), json!(count));
        }
        report["severity_breakdown"] = Value::Object(breakdown);
    }

    let mut findings_json = Vec::new();
    if context.findings.is_empty() {
        // Analysis disabled or failed: report the raw detections.
        for (detection, screenshot) in &context.screenshots {
            findings_json.push(json!({
                "id": detection.segment.id,
                "category": detection.category,
                "timestamp_start": detection.segment.start,
                "timestamp_end": detection.segment.end,
                "timestamp_formatted": format_timestamp(detection.segment.start),
                "text": detection.segment.text,
                "context": detection.context,
                "keywords": detection.keywords_found,
                "screenshot": screenshot.display().to_string(),
                "unified_analysis": Value::Null,
            }));
        }
    } else {
        for finding in &context.findings {
            let detection = context
                .detections
                .iter()
                .find(|d| d.segment.id == finding.detection_id);
            let screenshot = context.screenshot_for(finding);

            findings_json.push(json!({
                "id": finding.detection_id,
                "category": finding.category,
                "timestamp_start": finding.timestamp,
                "timestamp_end": detection.map(|d| d.segment.end).unwrap_or(finding.timestamp),
                "timestamp_formatted": format_timestamp(finding.timestamp),
                "text": detection.map(|d| d.segment.text.clone()).unwrap_or_default(),
                "context": detection.map(|d| d.context.clone()).unwrap_or_default(),
                "keywords": detection.map(|d| d.keywords_found.clone()).unwrap_or_default(),
                "screenshot": screenshot.map(|p| p.display().to_string()),
                "unified_analysis": {
                    "is_issue": finding.is_issue,
                    "sentiment": finding.sentiment,
                    "severity": finding.severity,
                    "summary": finding.summary,
                    "action_items": finding.action_items,
                    "affected_components": finding.affected_components,
                    "suggested_fix": finding.suggested_fix,
                    "ui_elements": finding.ui_elements,
                    "issues_detected": finding.issues_detected,
                    "accessibility_notes": finding.accessibility_notes,
                    "design_feedback": finding.design_feedback,
                    "technical_observations": finding.technical_observations,
                    "merged_from_ids": finding.merged_from_ids,
                },
            }));
        }
    }
    report["findings"] = Value::Array(findings_json);

    let rendered = serde_json::to_string_pretty(&report)
        .map_err(|e| Error::Resource(e.to_string()))?;
    std::fs::write(output_path, rendered)?;

    tracing::info!(path = %output_path.display(), "JSON report saved");
    Ok(output_path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_fixtures::*;
    use reviewscribe_core::{Category, PipelineError, Stage};

    #[test]
    fn test_json_report_counts_match_findings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let context = ReportContext {
            video: PathBuf::from("/clip.mov"),
            detections: vec![
                detection(1, 0.0, Category::Bug),
                detection(2, 10.0, Category::Change),
                detection(3, 20.0, Category::Ui),
            ],
            findings: vec![
                finding(1, 0.0, Category::Bug),
                finding(2, 10.0, Category::Change),
                finding(3, 20.0, Category::Ui),
            ],
            ..Default::default()
        };

        save_json_report(&context, &path).unwrap();
        let report: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();

        assert_eq!(report["summary"]["total"], 3);
        assert_eq!(report["summary"]["bugs"], 1);
        assert_eq!(report["summary"]["changes"], 1);
        assert_eq!(report["summary"]["ui"], 1);
        assert_eq!(report["findings"].as_array().unwrap().len(), 3);
        assert_eq!(report["severity_breakdown"]["medium"], 3);
        assert_eq!(report["findings"][0]["unified_analysis"]["summary"], "finding 1");
    }

    #[test]
    fn test_json_report_without_findings_lists_detections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let det = detection(1, 0.0, Category::Bug);
        let context = ReportContext {
            video: PathBuf::from("/clip.mov"),
            detections: vec![det.clone()],
            screenshots: vec![(det, PathBuf::from("/shots/01.jpg"))],
            errors: vec![PipelineError::new(Stage::UnifiedAnalysis, "boom")],
            ..Default::default()
        };

        save_json_report(&context, &path).unwrap();
        let report: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();

        assert_eq!(report["summary"]["total"], 1);
        assert!(report["findings"][0]["unified_analysis"].is_null());
        assert_eq!(report["errors"][0]["stage"], "unified_analysis");
    }
}
