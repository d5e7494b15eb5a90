//! Report assembly.
//!
//! Consumes the final finding set through a typed context and renders the
//! JSON and Markdown reports. Counts always come from the deduplicated
//! findings when any exist, falling back to raw detections otherwise.

mod json;
mod markdown;

use std::path::{Path, PathBuf};

use reviewscribe_core::{Detection, PipelineError, UnifiedFinding};

pub use json::save_json_report;
pub use markdown::save_markdown_report;

/// Everything a renderer needs for one video's report.
#[derive(Debug, Clone, Default)]
pub struct ReportContext {
    pub video: PathBuf,
    pub detections: Vec<Detection>,
    pub screenshots: Vec<(Detection, PathBuf)>,
    pub findings: Vec<UnifiedFinding>,
    pub executive_summary: String,
    pub visual_summary: String,
    pub errors: Vec<PipelineError>,
}

/// Category counts used by both renderers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CategoryCounts {
    pub total: usize,
    pub bugs: usize,
    pub changes: usize,
    pub ui: usize,
}

impl ReportContext {
    /// Count findings per category, preferring deduplicated findings.
    /// `ui` folds accessibility in, matching the report schema.
    pub fn counts(&self) -> CategoryCounts {
        use reviewscribe_core::Category;

        fn count(categories: impl Iterator<Item = Category>) -> CategoryCounts {
            let mut counts = CategoryCounts::default();
            for category in categories {
                counts.total += 1;
                match category {
                    Category::Bug => counts.bugs += 1,
                    Category::Change => counts.changes += 1,
                    Category::Ui | Category::Accessibility => counts.ui += 1,
                    _ => {}
                }
            }
            counts
        }

        if self.findings.is_empty() {
            count(self.detections.iter().map(|d| d.category))
        } else {
            count(self.findings.iter().map(|f| f.category))
        }
    }

    /// Screenshot path for a finding, matched by (detection id, timestamp)
    /// with an id-only fallback.
    pub fn screenshot_for<'a>(&'a self, finding: &'a UnifiedFinding) -> Option<&'a Path> {
        if let Some(path) = &finding.screenshot_path {
            return Some(path);
        }
        self.screenshots
            .iter()
            .find(|(d, _)| d.segment.id == finding.detection_id && d.segment.start == finding.timestamp)
            .or_else(|| {
                self.screenshots
                    .iter()
                    .find(|(d, _)| d.segment.id == finding.detection_id)
            })
            .map(|(_, p)| p.as_path())
    }
}
