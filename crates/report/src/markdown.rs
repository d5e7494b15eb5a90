//! Markdown report renderer.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use reviewscribe_core::{format_timestamp, Error};

use crate::ReportContext;

/// Render and write the Markdown report.
pub fn save_markdown_report(context: &ReportContext, output_path: &Path) -> Result<PathBuf, Error> {
    let counts = context.counts();
    let mut out = String::new();

    let video_name = context
        .video
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| context.video.display().to_string());

    let _ = writeln!(out, "# Video Review: {video_name}");
    let _ = writeln!(out);
    let _ = writeln!(out, "Generated: {}", chrono::Local::now().format("%Y-%m-%d %H:%M"));
    let _ = writeln!(out);

    if !context.executive_summary.is_empty() {
        let _ = writeln!(out, "## Executive Summary");
        let _ = writeln!(out);
        let _ = writeln!(out, "{}", context.executive_summary);
        let _ = writeln!(out);
    }

    let _ = writeln!(out, "## Summary");
    let _ = writeln!(out);
    let _ = writeln!(out, "| Category | Count |");
    let _ = writeln!(out, "|----------|-------|");
    let _ = writeln!(out, "| Bugs | {} |", counts.bugs);
    let _ = writeln!(out, "| Changes | {} |", counts.changes);
    let _ = writeln!(out, "| UI | {} |", counts.ui);
    let _ = writeln!(out, "| **Total** | **{}** |", counts.total);
    let _ = writeln!(out);

    if !context.findings.is_empty() {
        let _ = writeln!(out, "## Findings");
        let _ = writeln!(out);
        for (i, finding) in context.findings.iter().enumerate() {
            let marker = if finding.is_issue {
                finding.severity.as_str().to_uppercase()
            } else {
                "OK".to_string()
            };
            let _ = writeln!(
                out,
                "### {}. [{}] {} @ {}",
                i + 1,
                marker,
                finding.category,
                format_timestamp(finding.timestamp)
            );
            let _ = writeln!(out);
            if !finding.summary.is_empty() {
                let _ = writeln!(out, "{}", finding.summary);
                let _ = writeln!(out);
            }
            if let Some(screenshot) = context.screenshot_for(finding) {
                let _ = writeln!(out, "![screenshot]({})", screenshot.display());
                let _ = writeln!(out);
            }
            if !finding.action_items.is_empty() {
                let _ = writeln!(out, "**Action items:**");
                for item in &finding.action_items {
                    let _ = writeln!(out, "- [ ] {item}");
                }
                let _ = writeln!(out);
            }
            if !finding.affected_components.is_empty() {
                let _ = writeln!(out, "**Affected:** {}", finding.affected_components.join(", "));
                let _ = writeln!(out);
            }
            if !finding.suggested_fix.is_empty() {
                let _ = writeln!(out, "**Suggested fix:** {}", finding.suggested_fix);
                let _ = writeln!(out);
            }
            if !finding.merged_from_ids.is_empty() {
                let merged = finding
                    .merged_from_ids
                    .iter()
                    .map(|(_, ts)| format_timestamp(*ts))
                    .collect::<Vec<_>>()
                    .join(", ");
                let _ = writeln!(out, "*Also reported at: {merged}*");
                let _ = writeln!(out);
            }
        }
    } else if !context.screenshots.is_empty() {
        let _ = writeln!(out, "## Detections");
        let _ = writeln!(out);
        for (i, (detection, screenshot)) in context.screenshots.iter().enumerate() {
            let _ = writeln!(
                out,
                "### {}. [{}] @ {}",
                i + 1,
                detection.category,
                format_timestamp(detection.segment.start)
            );
            let _ = writeln!(out);
            let _ = writeln!(out, "> {}", detection.segment.text);
            let _ = writeln!(out);
            let _ = writeln!(out, "![screenshot]({})", screenshot.display());
            let _ = writeln!(out);
        }
    }

    if !context.visual_summary.is_empty() {
        let _ = writeln!(out, "{}", context.visual_summary);
        let _ = writeln!(out);
    }

    if !context.errors.is_empty() {
        let _ = writeln!(out, "## Processing Errors");
        let _ = writeln!(out);
        let _ = writeln!(out, "Some stages failed; results are partial.");
        let _ = writeln!(out);
        for error in &context.errors {
            let _ = writeln!(out, "- `{}`: {}", error.stage, error.message);
        }
        let _ = writeln!(out);
    }

    std::fs::write(output_path, out)?;
    tracing::info!(path = %output_path.display(), "Markdown report saved");
    Ok(output_path.to_path_buf())
}
