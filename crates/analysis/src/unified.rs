//! Unified VLM analysis: the concurrent core of the pipeline.
//!
//! Each (detection, frame) pair becomes one streaming VLM call that sees
//! the screenshot and the transcript context together. Tasks run on a
//! bounded worker pool with staggered starts, chain the server-assigned
//! `previous_response_id` through a shared mutex, and always land back in
//! input order.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::task::JoinSet;

use reviewscribe_config::Settings;
use reviewscribe_core::{Detection, Sentiment, Severity, UnifiedFinding};
use reviewscribe_llm::{
    build_request, encode_image, parse_model_json, prompt_for, render_prompt, LlmError,
    PromptRole, Repaired,
};
use reviewscribe_transport::{HttpClient, StreamEvent};

/// Default worker pool size.
pub const MAX_WORKERS: usize = 5;
/// Default delay between task starts.
pub const STAGGER_DELAY: Duration = Duration::from_millis(500);

/// Progress events emitted while the analyzer runs.
///
/// Events stop the moment a task's result is delivered; consumers may drop
/// the receiver at any time without affecting analysis.
#[derive(Debug, Clone)]
pub enum AnalyzerEvent {
    /// Reasoning-summary delta for task `index`.
    Reasoning { index: usize, delta: String },
    /// Answer-content delta for task `index`.
    Content { index: usize, delta: String },
    /// Task `index` finished; `severity` is present on success.
    Finished {
        index: usize,
        severity: Option<Severity>,
    },
}

/// Analyzer configuration, detached from [`Settings`] so tasks can own it.
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key: String,
    pub language: String,
    pub workers: usize,
    pub stagger: Duration,
    pub timeout: Duration,
}

impl AnalyzerConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            endpoint: settings.vision_endpoint.clone(),
            model: settings.vision_model.clone(),
            api_key: settings.vision_key().to_string(),
            language: settings.language.clone(),
            workers: settings.workers.max(1),
            stagger: Duration::from_millis(settings.stagger_ms),
            timeout: settings.timeouts.vlm(),
        }
    }
}

/// The concurrent unified analyzer.
#[derive(Clone)]
pub struct UnifiedAnalyzer {
    http: HttpClient,
    config: AnalyzerConfig,
}

impl UnifiedAnalyzer {
    pub fn new(http: HttpClient, config: AnalyzerConfig) -> Self {
        Self { http, config }
    }

    /// Analyze every (detection, frame) pair.
    ///
    /// Returns one slot per input, in input order; `None` marks a task that
    /// failed after retries. Completions arrive out of order internally and
    /// are re-indexed at the end.
    pub async fn analyze_all(
        &self,
        items: Vec<(Detection, Option<PathBuf>)>,
        previous_response_id: &str,
        events: Option<mpsc::Sender<AnalyzerEvent>>,
        cancel: watch::Receiver<bool>,
    ) -> Vec<Option<UnifiedFinding>> {
        let total = items.len();
        if total == 0 {
            return Vec::new();
        }

        tracing::info!(
            findings = total,
            workers = self.config.workers,
            stagger_ms = self.config.stagger.as_millis() as u64,
            "running parallel VLM analysis"
        );

        let shared_id = Arc::new(Mutex::new(previous_response_id.to_string()));
        let semaphore = Arc::new(Semaphore::new(self.config.workers));
        let mut join_set: JoinSet<(usize, Option<UnifiedFinding>)> = JoinSet::new();

        for (index, (detection, screenshot)) in items.into_iter().enumerate() {
            let analyzer = self.clone();
            let shared_id = Arc::clone(&shared_id);
            let semaphore = Arc::clone(&semaphore);
            let events = events.clone();
            let cancel = cancel.clone();
            let stagger = self.config.stagger.mul_f64(index as f64);

            join_set.spawn(async move {
                tokio::time::sleep(stagger).await;
                if *cancel.borrow() {
                    return (index, None);
                }
                let Ok(_permit) = semaphore.acquire().await else {
                    return (index, None);
                };

                // Latest response id for conversation chaining; the order in
                // which finished tasks update it is a performance hint only.
                let prev = shared_id.lock().clone();

                match analyzer
                    .analyze_one(index, &detection, screenshot.as_deref(), &prev, &events, cancel)
                    .await
                {
                    Ok(finding) => {
                        if !finding.response_id.is_empty() {
                            *shared_id.lock() = finding.response_id.clone();
                        }
                        if let Some(tx) = &events {
                            let _ = tx
                                .send(AnalyzerEvent::Finished {
                                    index,
                                    severity: Some(finding.severity),
                                })
                                .await;
                        }
                        (index, Some(finding))
                    }
                    Err(err) => {
                        tracing::warn!(
                            index,
                            timestamp = detection.segment.start,
                            %err,
                            "unified analysis task failed"
                        );
                        if let Some(tx) = &events {
                            let _ = tx.send(AnalyzerEvent::Finished { index, severity: None }).await;
                        }
                        (index, None)
                    }
                }
            });
        }

        let mut results: Vec<Option<UnifiedFinding>> = vec![None; total];
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, finding)) => results[index] = finding,
                Err(err) => tracing::warn!(%err, "analysis task panicked"),
            }
        }

        let done = results.iter().filter(|r| r.is_some()).count();
        tracing::info!(completed = done, failed = total - done, "unified analysis complete");
        results
    }

    /// One streaming VLM call for a single finding.
    async fn analyze_one(
        &self,
        index: usize,
        detection: &Detection,
        screenshot: Option<&Path>,
        previous_response_id: &str,
        events: &Option<mpsc::Sender<AnalyzerEvent>>,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<UnifiedFinding, LlmError> {
        let image = match screenshot {
            Some(path) if path.exists() => Some(encode_image(path)?),
            _ => None,
        };
        let has_image = image.is_some();

        let template = prompt_for(PromptRole::UnifiedAnalysis, &self.config.language, has_image);
        let prompt = render_prompt(
            template,
            &[
                ("transcript_context", detection.segment.text.as_str()),
                ("full_context", detection.context.as_str()),
                ("category", detection.category.as_str()),
            ],
        );

        let body = build_request(
            &self.config.model,
            &prompt,
            &self.config.endpoint,
            image.as_ref(),
            true,
            (!previous_response_id.is_empty()).then_some(previous_response_id),
        );

        let operation = format!("Unified analysis ({:.1}s)", detection.segment.start);
        let mut stream = self
            .http
            .post_sse(
                &self.config.endpoint,
                &self.config.api_key,
                &body,
                self.config.timeout,
                &operation,
            )
            .await?;

        let mut content = String::new();
        let mut response_id = String::new();

        loop {
            tokio::select! {
                _ = wait_cancelled(&mut cancel) => {
                    return Err(LlmError::InvalidResponse("cancelled".to_string()));
                }
                event = stream.next_event() => match event {
                    Ok(Some(StreamEvent::ContentDelta(delta))) => {
                        if let Some(tx) = events {
                            let _ = tx.try_send(AnalyzerEvent::Content {
                                index,
                                delta: delta.clone(),
                            });
                        }
                        content.push_str(&delta);
                    }
                    Ok(Some(StreamEvent::ReasoningDelta(delta))) => {
                        if let Some(tx) = events {
                            let _ = tx.try_send(AnalyzerEvent::Reasoning { index, delta });
                        }
                    }
                    Ok(Some(StreamEvent::ResponseId(id))) => response_id = id,
                    Ok(Some(_)) => {}
                    Ok(None) => break,
                    Err(err) => return Err(err.into()),
                }
            }
        }

        if content.is_empty() {
            return Err(LlmError::InvalidResponse("empty streaming response".to_string()));
        }

        Ok(match parse_model_json(&content) {
            Repaired::Parsed(data) => {
                finding_from_model_json(detection, screenshot.map(Path::to_path_buf), &data, response_id)
            }
            Repaired::Sentinel { parse_error, raw_content } => sentinel_finding(
                detection,
                screenshot.map(Path::to_path_buf),
                raw_content,
                parse_error,
                response_id,
            ),
        })
    }
}

/// Resolve once the cancel signal turns true. A closed channel means the
/// controller went away without cancelling, so it never resolves.
async fn wait_cancelled(cancel: &mut watch::Receiver<bool>) {
    let closed = cancel.wait_for(|cancelled| *cancelled).await.is_err();
    if closed {
        std::future::pending().await
    }
}

/// Build a finding from parsed model JSON, defaulting every missing field.
///
/// Enforces the no-issue invariant regardless of what the model claims:
/// a non-issue carries no action items and at most `low` severity.
pub fn finding_from_model_json(
    detection: &Detection,
    screenshot_path: Option<PathBuf>,
    data: &Value,
    response_id: String,
) -> UnifiedFinding {
    let is_issue = data.get("is_issue").and_then(Value::as_bool).unwrap_or(true);
    let mut severity = data
        .get("severity")
        .and_then(Value::as_str)
        .map(Severity::parse)
        .unwrap_or(Severity::Medium);
    let mut action_items = string_list(data, "action_items");
    if !is_issue {
        action_items.clear();
        if severity.rank() > Severity::Low.rank() {
            severity = Severity::None;
        }
    }

    UnifiedFinding {
        detection_id: detection.segment.id,
        timestamp: detection.segment.start,
        screenshot_path,
        category: detection.category,
        is_issue,
        sentiment: data
            .get("sentiment")
            .and_then(Value::as_str)
            .map(Sentiment::parse)
            .unwrap_or(Sentiment::Problem),
        severity,
        summary: string_field(data, "summary"),
        action_items,
        affected_components: string_list(data, "affected_components"),
        suggested_fix: string_field(data, "suggested_fix"),
        ui_elements: string_list(data, "ui_elements"),
        issues_detected: string_list(data, "issues_detected"),
        accessibility_notes: string_list(data, "accessibility_notes"),
        design_feedback: string_field(data, "design_feedback"),
        technical_observations: string_field(data, "technical_observations"),
        response_id,
        merged_from_ids: Vec::new(),
    }
}

/// The finding emitted when model output resists every repair attempt.
///
/// The raw content becomes the summary and the parse error lands in
/// `suggested_fix`, so nothing the model said is lost from the report.
pub fn sentinel_finding(
    detection: &Detection,
    screenshot_path: Option<PathBuf>,
    raw_content: String,
    parse_error: String,
    response_id: String,
) -> UnifiedFinding {
    UnifiedFinding {
        detection_id: detection.segment.id,
        timestamp: detection.segment.start,
        screenshot_path,
        category: detection.category,
        is_issue: true,
        sentiment: Sentiment::Problem,
        severity: Severity::Medium,
        summary: raw_content,
        action_items: Vec::new(),
        affected_components: Vec::new(),
        suggested_fix: format!("JSON parse error: {parse_error}"),
        ui_elements: Vec::new(),
        issues_detected: Vec::new(),
        accessibility_notes: Vec::new(),
        design_feedback: String::new(),
        technical_observations: String::new(),
        response_id,
        merged_from_ids: Vec::new(),
    }
}

fn string_field(data: &Value, key: &str) -> String {
    data.get(key).and_then(Value::as_str).unwrap_or("").to_string()
}

fn string_list(data: &Value, key: &str) -> Vec<String> {
    data.get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reviewscribe_core::{Category, Segment};
    use serde_json::json;

    fn detection() -> Detection {
        Detection {
            segment: Segment::new(7, 12.5, 15.0, "ten przycisk nie działa"),
            category: Category::Bug,
            keywords_found: vec!["nie działa".into()],
            context: "kontekst".into(),
        }
    }

    #[test]
    fn test_finding_from_model_json_full() {
        let data = json!({
            "is_issue": true,
            "sentiment": "problem",
            "severity": "critical",
            "summary": "Przycisk zapisu nie reaguje",
            "action_items": ["Naprawić handler"],
            "affected_components": ["SaveButton"],
            "suggested_fix": "Podpiąć onClick",
            "ui_elements": ["przycisk"],
            "issues_detected": ["martwy przycisk"],
            "accessibility_notes": [],
            "design_feedback": "ok",
            "technical_observations": "brak"
        });
        let f = finding_from_model_json(&detection(), None, &data, "resp_1".into());
        assert_eq!(f.detection_id, 7);
        assert_eq!(f.timestamp, 12.5);
        assert_eq!(f.severity, Severity::Critical);
        assert_eq!(f.action_items, vec!["Naprawić handler"]);
        assert_eq!(f.response_id, "resp_1");
    }

    #[test]
    fn test_non_issue_drops_actions_and_caps_severity() {
        let data = json!({
            "is_issue": false,
            "sentiment": "positive",
            "severity": "high",
            "summary": "Działa ładnie",
            "action_items": ["should be dropped"]
        });
        let f = finding_from_model_json(&detection(), None, &data, String::new());
        assert!(!f.is_issue);
        assert!(f.action_items.is_empty());
        assert_eq!(f.severity, Severity::None);

        let low = json!({"is_issue": false, "severity": "low", "summary": "ok"});
        let f = finding_from_model_json(&detection(), None, &low, String::new());
        assert_eq!(f.severity, Severity::Low);
    }

    #[test]
    fn test_finding_from_model_json_defaults() {
        let f = finding_from_model_json(&detection(), None, &json!({}), String::new());
        assert!(f.is_issue);
        assert_eq!(f.sentiment, Sentiment::Problem);
        assert_eq!(f.severity, Severity::Medium);
        assert!(f.summary.is_empty());
        assert!(f.action_items.is_empty());
    }

    #[test]
    fn test_sentinel_finding_carries_raw_content_and_error() {
        let f = sentinel_finding(
            &detection(),
            None,
            "the answer is ...".to_string(),
            "expected value at line 1".to_string(),
            String::new(),
        );
        assert!(f.is_issue);
        assert_eq!(f.severity, Severity::Medium);
        assert_eq!(f.summary, "the answer is ...");
        assert!(f.suggested_fix.contains("expected value at line 1"));
    }

    #[tokio::test]
    async fn test_analyze_all_empty_input() {
        let analyzer = UnifiedAnalyzer::new(
            HttpClient::new().unwrap(),
            AnalyzerConfig {
                endpoint: "https://api.example.com/v1/responses".into(),
                model: "m".into(),
                api_key: "k".into(),
                language: "pl".into(),
                workers: MAX_WORKERS,
                stagger: STAGGER_DELAY,
                timeout: Duration::from_secs(120),
            },
        );
        let (_tx, cancel) = watch::channel(false);
        let results = analyzer.analyze_all(Vec::new(), "", None, cancel).await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_analyze_all_respects_preset_cancellation() {
        let analyzer = UnifiedAnalyzer::new(
            HttpClient::new().unwrap(),
            AnalyzerConfig {
                endpoint: "https://api.example.com/v1/responses".into(),
                model: "m".into(),
                api_key: "k".into(),
                language: "pl".into(),
                workers: 2,
                stagger: Duration::from_millis(1),
                timeout: Duration::from_secs(1),
            },
        );
        let (tx, cancel) = watch::channel(false);
        tx.send(true).unwrap();
        let items = vec![(detection(), None), (detection(), None)];
        let results = analyzer.analyze_all(items, "", None, cancel).await;
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(Option::is_none));
    }
}
