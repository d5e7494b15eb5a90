//! The pipeline coordinator.
//!
//! Owns the fixed stage sequence for one video, the checkpoint, and the
//! best-effort error list. Every other component returns values; only the
//! coordinator persists.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tokio::sync::{mpsc, watch};

use reviewscribe_analysis::{
    deduplicate_findings, detect_issues, generate_executive_summary, generate_visual_summary,
    merge_pois_with_detections, pois_to_detections, semantic_prefilter, AnalyzerConfig,
    AnalyzerEvent, UnifiedAnalyzer, CONTEXT_WINDOW, DEDUP_SIMILARITY_THRESHOLD,
    POI_MERGE_MAX_GAP,
};
use reviewscribe_config::{KeywordsConfig, Settings};
use reviewscribe_core::{
    format_timestamp, Detection, Error, FilterLevel, PipelineError, Stage, UnifiedFinding,
};
use reviewscribe_llm::{transcribe, SttRequest};
use reviewscribe_media::MediaAdapter;
use reviewscribe_report::{save_json_report, save_markdown_report, ReportContext};
use reviewscribe_transport::HttpClient;

use crate::checkpoint::{
    checkpoint_valid_for, delete_checkpoint, load_checkpoint, save_checkpoint, PipelineCheckpoint,
    ScreenshotRecord,
};

/// Seconds past a detection's start where the frame is grabbed.
pub const SCREENSHOT_OFFSET: f64 = 0.5;

/// Per-run options, as selected on the command line.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub language: String,
    pub filter_level: FilterLevel,
    pub use_semantic: bool,
    pub use_vision: bool,
    pub keywords_file: Option<PathBuf>,
    pub resume: bool,
    pub force: bool,
    pub skip_validation: bool,
    pub dry_run: bool,
    pub embed_video: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            language: "pl".to_string(),
            filter_level: FilterLevel::Base,
            use_semantic: true,
            use_vision: true,
            keywords_file: None,
            resume: false,
            force: false,
            skip_validation: false,
            dry_run: false,
            embed_video: false,
        }
    }
}

/// Everything a run produced, best-effort.
#[derive(Debug, Default)]
pub struct RunOutcome {
    pub output_dir: PathBuf,
    pub detections: Vec<Detection>,
    pub screenshots: Vec<(Detection, PathBuf)>,
    pub findings: Vec<UnifiedFinding>,
    pub executive_summary: String,
    pub visual_summary: String,
    pub errors: Vec<PipelineError>,
    pub report_paths: Vec<PathBuf>,
    /// True when the run stopped after detection (`--dry-run`).
    pub dry_run_only: bool,
    /// Last model response id seen, handed to the next video in a batch.
    pub last_response_id: String,
}

/// Versioned output directory: `<base>`, then `<base>_2`, `<base>_3`, …
pub fn next_review_path(base: &Path) -> (PathBuf, Option<u32>) {
    if !base.exists() {
        return (base.to_path_buf(), None);
    }
    let mut version = 2u32;
    loop {
        let candidate = PathBuf::from(format!("{}_{version}", base.display()));
        if !candidate.exists() {
            return (candidate, Some(version));
        }
        version += 1;
    }
}

/// The coordinator. One instance processes one video at a time; a batch
/// reuses the instance serially.
pub struct Pipeline {
    settings: Settings,
    http: HttpClient,
    media: MediaAdapter,
    cancel: watch::Receiver<bool>,
    events: Option<mpsc::Sender<AnalyzerEvent>>,
}

impl Pipeline {
    pub fn new(
        settings: Settings,
        http: HttpClient,
        media: MediaAdapter,
        cancel: watch::Receiver<bool>,
    ) -> Self {
        Self {
            settings,
            http,
            media,
            cancel,
            events: None,
        }
    }

    /// Attach a progress-event channel for the analyzer stage.
    pub fn with_events(mut self, events: mpsc::Sender<AnalyzerEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn check_cancel(&self) -> Result<(), Error> {
        if *self.cancel.borrow() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Run the full stage sequence for one video.
    ///
    /// `seed_response_id` carries conversational context from a previous
    /// video in a batch; it is a server-side hint with no correctness
    /// dependency.
    pub async fn run(
        &self,
        video: &Path,
        output_dir: &Path,
        options: &PipelineOptions,
        seed_response_id: &str,
    ) -> Result<RunOutcome, Error> {
        if !video.exists() {
            return Err(Error::Input(format!("video not found: {}", video.display())));
        }
        std::fs::create_dir_all(output_dir)?;

        let video_stem = video
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video".to_string());

        if options.force {
            let cache = output_dir.join(".cache");
            if cache.exists() {
                std::fs::remove_dir_all(&cache)?;
                tracing::info!("force mode: deleted existing checkpoint, starting fresh");
            }
        }

        let mut checkpoint = None;
        if options.resume && !options.force {
            checkpoint = load_checkpoint(output_dir)
                .filter(|ck| checkpoint_valid_for(ck, video, output_dir, &options.language));
            match &checkpoint {
                Some(ck) => tracing::info!(
                    completed = ck.completed_stages.len(),
                    stages = ck.completed_stages.join(", "),
                    "resuming from checkpoint"
                ),
                None => tracing::info!("no valid checkpoint found, starting fresh"),
            }
        }
        let mut checkpoint = match checkpoint {
            Some(ck) => ck,
            None => PipelineCheckpoint::create(video, output_dir, &options.language)?,
        };

        let mut errors: Vec<PipelineError> = checkpoint.errors.clone();
        let mut last_response_id = seed_response_id.to_string();

        // Stage 1: audio extraction.
        self.check_cancel()?;
        let mut audio_path: Option<PathBuf> = None;
        if !checkpoint.is_stage_complete(Stage::Audio) {
            let path = self
                .media
                .extract_audio(video, None)
                .await
                .map_err(|e| Error::Media(e.to_string()))?;
            audio_path = Some(path);
            checkpoint.mark_stage_complete(Stage::Audio);
            save_checkpoint(&checkpoint, output_dir)?;
        }

        // Stage 2: transcription.
        self.check_cancel()?;
        if !checkpoint.is_stage_complete(Stage::Transcription) {
            // The audio lives in a temp location; a resumed run re-extracts.
            let audio = match audio_path.take() {
                Some(path) => path,
                None => self
                    .media
                    .extract_audio(video, None)
                    .await
                    .map_err(|e| Error::Media(e.to_string()))?,
            };
            let request = SttRequest {
                endpoint: &self.settings.stt_endpoint,
                model: &self.settings.stt_model,
                api_key: self.settings.stt_key(),
                language: &options.language,
                timeout: self.settings.timeouts.transcription(),
            };
            let transcription = transcribe(&self.http, &request, &audio)
                .await
                .map_err(|e| Error::Transport(e.to_string()))?;

            let transcript_path = output_dir.join(format!("{video_stem}_transcript.txt"));
            std::fs::write(&transcript_path, &transcription.full_text)?;
            tracing::info!(path = %transcript_path.display(), "transcript saved");

            checkpoint.transcription = Some(transcription);
            checkpoint.mark_stage_complete(Stage::Transcription);
            save_checkpoint(&checkpoint, output_dir)?;
        }

        let transcription = checkpoint
            .transcription
            .clone()
            .ok_or_else(|| Error::Input("no transcription available".to_string()))?;

        // Audio-quality gate: a transcript of silence means the recording
        // is unusable and retrying the pipeline will not help.
        if transcription.segments.is_empty() {
            delete_checkpoint(output_dir)?;
            return Err(Error::Input(
                "audio quality: no speech segments detected".to_string(),
            ));
        }
        let mean_no_speech = transcription.mean_no_speech_prob();
        if mean_no_speech > self.settings.no_speech_fatal_threshold {
            delete_checkpoint(output_dir)?;
            return Err(Error::Input(format!(
                "audio quality: mean no-speech probability {:.2} exceeds {:.2}",
                mean_no_speech, self.settings.no_speech_fatal_threshold
            )));
        }
        if mean_no_speech > self.settings.no_speech_warn_threshold {
            tracing::warn!(
                mean_no_speech = format!("{mean_no_speech:.2}"),
                "audio quality is poor, results may be unreliable"
            );
        }

        // Stage 3: detection.
        self.check_cancel()?;
        if !checkpoint.is_stage_complete(Stage::Detection) {
            let keywords = KeywordsConfig::load(options.keywords_file.as_deref())
                .compile()
                .map_err(|e| Error::Config(e.to_string()))?;

            // STT context seeds the pre-filter chain; a batch predecessor's
            // id is the fallback.
            let stt_context = if transcription.response_id.is_empty() {
                last_response_id.clone()
            } else {
                transcription.response_id.clone()
            };

            let detections = match options.filter_level {
                FilterLevel::Keywords => detect_issues(&transcription, &keywords, CONTEXT_WINDOW),
                FilterLevel::Base => {
                    match semantic_prefilter(&self.http, &self.settings, &transcription, &stt_context)
                        .await
                    {
                        Ok(outcome) => {
                            if !outcome.response_id.is_empty() {
                                last_response_id = outcome.response_id.clone();
                            }
                            if outcome.pois.is_empty() {
                                tracing::warn!(
                                    "semantic pre-filter returned no results, falling back to keywords"
                                );
                                detect_issues(&transcription, &keywords, CONTEXT_WINDOW)
                            } else {
                                pois_to_detections(&outcome.pois, &transcription)
                            }
                        }
                        Err(err) => {
                            errors.push(PipelineError::new(Stage::Detection, err.to_string()));
                            detect_issues(&transcription, &keywords, CONTEXT_WINDOW)
                        }
                    }
                }
                FilterLevel::Combined => {
                    let keyword_detections =
                        detect_issues(&transcription, &keywords, CONTEXT_WINDOW);
                    match semantic_prefilter(&self.http, &self.settings, &transcription, &stt_context)
                        .await
                    {
                        Ok(outcome) => {
                            if !outcome.response_id.is_empty() {
                                last_response_id = outcome.response_id.clone();
                            }
                            if outcome.pois.is_empty() {
                                keyword_detections
                            } else {
                                let merged = merge_pois_with_detections(
                                    outcome.pois,
                                    &keyword_detections,
                                    POI_MERGE_MAX_GAP,
                                );
                                pois_to_detections(&merged, &transcription)
                            }
                        }
                        Err(err) => {
                            errors.push(PipelineError::new(Stage::Detection, err.to_string()));
                            keyword_detections
                        }
                    }
                }
            };

            checkpoint.detections = detections;
            checkpoint.errors = errors.clone();
            checkpoint.mark_stage_complete(Stage::Detection);
            save_checkpoint(&checkpoint, output_dir)?;
        }
        let mut detections = checkpoint.detections.clone();

        if detections.is_empty() {
            tracing::warn!("no issues detected in the video");
            let context = ReportContext {
                video: video.to_path_buf(),
                errors: errors.clone(),
                ..Default::default()
            };
            let report_paths = self.write_reports(&context, output_dir, &video_stem)?;
            delete_checkpoint(output_dir)?;
            return Ok(RunOutcome {
                output_dir: output_dir.to_path_buf(),
                errors,
                report_paths,
                last_response_id,
                ..Default::default()
            });
        }

        // Dry run stops after detection; the checkpoint stays so a real run
        // can resume from here.
        if options.dry_run {
            tracing::info!(detections = detections.len(), "dry run complete");
            return Ok(RunOutcome {
                output_dir: output_dir.to_path_buf(),
                detections,
                errors,
                dry_run_only: true,
                last_response_id,
                ..Default::default()
            });
        }

        // Stage 4: screenshots.
        self.check_cancel()?;
        if !checkpoint.is_stage_complete(Stage::Screenshots) {
            let shots_dir = output_dir.join("screenshots");
            std::fs::create_dir_all(&shots_dir)?;

            let mut records = Vec::new();
            for (i, detection) in detections.iter().enumerate() {
                let timestamp =
                    (detection.segment.start + SCREENSHOT_OFFSET).min(detection.segment.end);
                let file_name = format!(
                    "{:02}_{}_{}.jpg",
                    i + 1,
                    detection.category,
                    format_timestamp(timestamp).replace(':', "-")
                );
                match self
                    .media
                    .extract_frame(video, timestamp, &shots_dir.join(file_name))
                    .await
                {
                    Ok(path) => records.push(ScreenshotRecord {
                        detection: detection.clone(),
                        path,
                    }),
                    Err(err) => {
                        tracing::warn!(timestamp, %err, "screenshot extraction failed");
                        errors.push(PipelineError::new(
                            Stage::Screenshots,
                            format!("screenshot at {timestamp:.1}s failed: {err}"),
                        ));
                    }
                }
            }
            tracing::info!(extracted = records.len(), "screenshots extracted");
            checkpoint.screenshots = records;
            checkpoint.errors = errors.clone();
            checkpoint.mark_stage_complete(Stage::Screenshots);
            save_checkpoint(&checkpoint, output_dir)?;
        }
        let mut screenshots: Vec<(Detection, PathBuf)> = checkpoint
            .screenshots
            .iter()
            .map(|r| (r.detection.clone(), r.path.clone()))
            .collect();

        // Stage 5: unified VLM analysis.
        self.check_cancel()?;
        let mut findings: Vec<UnifiedFinding> = Vec::new();
        let mut executive_summary = checkpoint.executive_summary.clone();
        let mut visual_summary = checkpoint.visual_summary.clone();

        let analysis_enabled = (options.use_semantic || options.use_vision)
            && !self.settings.vision_key().is_empty();
        if analysis_enabled {
            if !checkpoint.is_stage_complete(Stage::UnifiedAnalysis) {
                let analyzer = UnifiedAnalyzer::new(
                    self.http.clone(),
                    AnalyzerConfig::from_settings(&self.settings),
                );
                let items: Vec<(Detection, Option<PathBuf>)> = screenshots
                    .iter()
                    .map(|(d, p)| (d.clone(), Some(p.clone())))
                    .collect();
                let results = analyzer
                    .analyze_all(items, &last_response_id, self.events.clone(), self.cancel.clone())
                    .await;

                // A cancelled fan-out must not mark the stage complete.
                self.check_cancel()?;

                for (i, result) in results.iter().enumerate() {
                    if result.is_none() {
                        let timestamp = screenshots
                            .get(i)
                            .map(|(d, _)| d.segment.start)
                            .unwrap_or(0.0);
                        errors.push(PipelineError::new(
                            Stage::UnifiedAnalysis,
                            format!("analysis failed for finding at {timestamp:.1}s"),
                        ));
                    }
                }
                findings = results.into_iter().flatten().collect();
                if let Some(chained) = findings.iter().rev().find(|f| !f.response_id.is_empty()) {
                    last_response_id = chained.response_id.clone();
                }

                let before = findings.len();
                findings = deduplicate_findings(findings, DEDUP_SIMILARITY_THRESHOLD);
                if findings.len() < before {
                    tracing::info!(before, after = findings.len(), "deduplicated findings");
                    let keep: HashSet<i64> = findings.iter().map(|f| f.detection_id).collect();
                    if !keep.is_empty() && keep.len() < screenshots.len() {
                        screenshots.retain(|(d, _)| keep.contains(&d.segment.id));
                        detections = screenshots.iter().map(|(d, _)| d.clone()).collect();
                    }
                }
                checkpoint.unified_findings = findings.clone();

                if !findings.is_empty() {
                    match generate_executive_summary(
                        &self.http,
                        &self.settings,
                        &findings,
                        &last_response_id,
                    )
                    .await
                    {
                        Ok(summary) => executive_summary = summary,
                        Err(err) => {
                            tracing::warn!(%err, "summary generation failed");
                            errors.push(PipelineError::named(
                                "summary_generation",
                                err.to_string(),
                            ));
                        }
                    }
                    visual_summary = generate_visual_summary(&findings, &self.settings.language);
                }

                checkpoint.executive_summary = executive_summary.clone();
                checkpoint.visual_summary = visual_summary.clone();
                checkpoint.errors = errors.clone();
                checkpoint.mark_stage_complete(Stage::UnifiedAnalysis);
                save_checkpoint(&checkpoint, output_dir)?;
            } else {
                findings = checkpoint.unified_findings.clone();
            }
        } else if !checkpoint.is_stage_complete(Stage::UnifiedAnalysis) {
            checkpoint.mark_stage_complete(Stage::UnifiedAnalysis);
            save_checkpoint(&checkpoint, output_dir)?;
        }

        // Stage 6: report. Always emitted, even if only errors remain.
        self.check_cancel()?;
        let context = ReportContext {
            video: video.to_path_buf(),
            detections: detections.clone(),
            screenshots: screenshots.clone(),
            findings: findings.clone(),
            executive_summary: executive_summary.clone(),
            visual_summary: visual_summary.clone(),
            errors: errors.clone(),
        };
        let report_paths = self.write_reports(&context, output_dir, &video_stem)?;

        if !errors.is_empty() {
            tracing::warn!(
                errors = errors.len(),
                "errors occurred during processing, results are partial"
            );
        }

        delete_checkpoint(output_dir)?;

        Ok(RunOutcome {
            output_dir: output_dir.to_path_buf(),
            detections,
            screenshots,
            findings,
            executive_summary,
            visual_summary,
            errors,
            report_paths,
            dry_run_only: false,
            last_response_id,
        })
    }

    fn write_reports(
        &self,
        context: &ReportContext,
        output_dir: &Path,
        video_stem: &str,
    ) -> Result<Vec<PathBuf>, Error> {
        let json_path = save_json_report(context, &output_dir.join(format!("{video_stem}_report.json")))?;
        let md_path =
            save_markdown_report(context, &output_dir.join(format!("{video_stem}_report.md")))?;
        Ok(vec![json_path, md_path])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = PipelineOptions::default();
        assert_eq!(options.filter_level, FilterLevel::Base);
        assert!(options.use_semantic);
        assert!(options.use_vision);
        assert!(!options.force);
    }

    #[test]
    fn test_next_review_path_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("clip_review");
        let (path, version) = next_review_path(&base);
        assert_eq!(path, base);
        assert_eq!(version, None);
    }

    #[test]
    fn test_next_review_path_versions() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("clip_review");
        std::fs::create_dir_all(&base).unwrap();
        let (path, version) = next_review_path(&base);
        assert_eq!(version, Some(2));
        assert!(path.display().to_string().ends_with("clip_review_2"));

        std::fs::create_dir_all(&path).unwrap();
        let (path3, version3) = next_review_path(&base);
        assert_eq!(version3, Some(3));
        assert!(path3.display().to_string().ends_with("clip_review_3"));
    }

    #[test]
    fn test_screenshot_offset_clamps_to_segment_end() {
        // The stage computes min(start + offset, end); short segments clamp.
        let start = 10.0;
        let end = 10.2;
        let timestamp = (start + SCREENSHOT_OFFSET).min(end);
        assert_eq!(timestamp, 10.2);
    }
}
