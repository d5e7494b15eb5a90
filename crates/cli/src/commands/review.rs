//! The `review` command: the full pipeline over one or more videos.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::Args;
use tokio::sync::{mpsc, watch};

use reviewscribe_analysis::AnalyzerEvent;
use reviewscribe_config::{settings::LOCAL_STT_URL, Settings};
use reviewscribe_core::{Error, FilterLevel};
use reviewscribe_media::MediaAdapter;
use reviewscribe_pipeline::{next_review_path, validate_models, Pipeline, PipelineOptions};
use reviewscribe_transport::HttpClient;

use crate::estimate::show_estimate;
use crate::EXIT_CANCELLED;

#[derive(Args, Debug)]
pub struct ReviewArgs {
    /// Videos to review. Multiple videos share model context via response
    /// chaining.
    #[arg(required = true)]
    pub videos: Vec<PathBuf>,

    /// Output directory (default: `<video>_review` next to each video).
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Language code for transcription and prompts.
    #[arg(long = "lang")]
    pub language: Option<String>,

    /// Use the local STT server instead of the cloud endpoint.
    #[arg(long)]
    pub local: bool,

    /// Enable semantic analysis (default).
    #[arg(long, overrides_with = "no_semantic")]
    pub semantic: bool,
    /// Disable semantic analysis.
    #[arg(long)]
    pub no_semantic: bool,

    /// Enable vision analysis (default).
    #[arg(long, overrides_with = "no_vision")]
    pub vision: bool,
    /// Disable vision analysis.
    #[arg(long)]
    pub no_vision: bool,

    /// Keyword-based detection only (fastest).
    #[arg(long)]
    pub keywords_only: bool,

    /// Custom keywords YAML file.
    #[arg(long)]
    pub keywords_file: Option<PathBuf>,

    /// Detection filter level: keywords, base, or combined.
    #[arg(long)]
    pub filter_level: Option<String>,

    /// Resume from a checkpoint if one exists.
    #[arg(long)]
    pub resume: bool,

    /// Overwrite an existing review instead of versioning.
    #[arg(long)]
    pub force: bool,

    /// Skip the model availability preflight.
    #[arg(long)]
    pub skip_validation: bool,

    /// Stop after detection and show what would be processed.
    #[arg(long)]
    pub dry_run: bool,

    /// Show time estimates without processing.
    #[arg(long)]
    pub estimate: bool,

    /// Embed the video into the rendered report.
    #[arg(long)]
    pub embed_video: bool,

    /// Announce the report for the browser viewer after processing.
    #[arg(long, overrides_with = "no_serve")]
    pub serve: bool,
    /// Do not announce the report (default).
    #[arg(long)]
    pub no_serve: bool,

    /// Port for the report viewer.
    #[arg(long, default_value_t = 8765)]
    pub port: u16,
}

pub async fn run(args: ReviewArgs, verbose: bool) -> Result<i32> {
    for video in &args.videos {
        if !video.exists() {
            tracing::error!(video = %video.display(), "video not found");
            return Ok(1);
        }
        if video.is_dir() {
            tracing::error!(video = %video.display(), "path is a directory");
            return Ok(1);
        }
    }

    let media = match MediaAdapter::discover() {
        Ok(media) => media,
        Err(err) => {
            tracing::error!("{err}");
            return Ok(1);
        }
    };

    let mut settings = Settings::load();
    if let Some(language) = &args.language {
        settings.language = language.clone();
    }
    settings.use_semantic = args.semantic || !args.no_semantic;
    settings.use_vision = args.vision || !args.no_vision;
    settings.verbose = verbose;
    if args.local {
        settings.stt_endpoint = LOCAL_STT_URL.to_string();
    }

    let problems = settings.validate();
    if !problems.is_empty() {
        for problem in problems {
            tracing::error!("config error: {problem}");
        }
        return Ok(1);
    }

    let filter_level = if args.keywords_only {
        FilterLevel::Keywords
    } else {
        match &args.filter_level {
            Some(level) => match level.parse::<FilterLevel>() {
                Ok(level) => level,
                Err(err) => {
                    tracing::error!("{err}");
                    return Ok(1);
                }
            },
            None => FilterLevel::Base,
        }
    };

    let http = HttpClient::new().map_err(|e| anyhow::anyhow!("http client: {e}"))?;

    if !args.skip_validation && !args.local {
        if let Err(err) = validate_models(&http, &settings, settings.use_semantic, settings.use_vision).await
        {
            tracing::error!("{err}");
            return Ok(1);
        }
    }

    // Ctrl-C flips the cancel signal; the coordinator persists the last
    // completed stage and exits with the cancelled error.
    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, finishing the current stage");
            let _ = cancel_tx.send(true);
        }
    });

    // Analyzer progress stream: severities at info, reasoning at debug.
    let (event_tx, mut event_rx) = mpsc::channel::<AnalyzerEvent>(64);
    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match event {
                AnalyzerEvent::Finished { index, severity: Some(severity) } => {
                    tracing::info!("  [{}] {severity}", index + 1);
                }
                AnalyzerEvent::Finished { index, severity: None } => {
                    tracing::warn!("  [{}] failed", index + 1);
                }
                AnalyzerEvent::Reasoning { index, delta } => {
                    tracing::debug!("  [{}] {}", index + 1, delta.trim());
                }
                AnalyzerEvent::Content { .. } => {}
            }
        }
    });

    let options_template = PipelineOptions {
        language: settings.language.clone(),
        filter_level,
        use_semantic: settings.use_semantic,
        use_vision: settings.use_vision,
        keywords_file: args.keywords_file.clone(),
        resume: args.resume,
        force: args.force,
        skip_validation: args.skip_validation,
        dry_run: args.dry_run,
        embed_video: args.embed_video,
    };

    let pipeline =
        Pipeline::new(settings, http, media.clone(), cancel_rx).with_events(event_tx);

    let total = args.videos.len();
    if total > 1 {
        tracing::info!(videos = total, "batch mode: videos share context via response chaining");
    }

    let mut batch_response_id = String::new();
    let mut failures = 0usize;

    for (index, video) in args.videos.iter().enumerate() {
        if total > 1 {
            tracing::info!("video {}/{}: {}", index + 1, total, video.display());
        }

        let output_dir = resolve_output_dir(video, &args.output, total > 1, args.force);

        if args.estimate {
            let duration = media.duration(video).await.unwrap_or(0.0);
            show_estimate(
                duration,
                options_template.use_semantic || options_template.use_vision,
                None,
                filter_level,
            );
            continue;
        }

        match pipeline
            .run(video, &output_dir, &options_template, &batch_response_id)
            .await
        {
            Ok(outcome) => {
                if !outcome.last_response_id.is_empty() {
                    batch_response_id = outcome.last_response_id.clone();
                }

                if outcome.dry_run_only {
                    print_dry_run(&outcome.detections);
                    let duration = media.duration(video).await.unwrap_or(0.0);
                    show_estimate(
                        duration,
                        options_template.use_semantic || options_template.use_vision,
                        Some(outcome.detections.len()),
                        filter_level,
                    );
                    println!("\nRun without --dry-run to process fully.");
                    continue;
                }

                println!(
                    "Review finished: {} findings, {} errors",
                    outcome.findings.len(),
                    outcome.errors.len()
                );
                for path in &outcome.report_paths {
                    println!("  report: {}", path.display());
                }
                if args.serve && !args.no_serve {
                    println!(
                        "Serve the report directory with a static file server on port {}: {}",
                        args.port,
                        outcome.output_dir.display()
                    );
                }
            }
            Err(Error::Cancelled) => {
                tracing::warn!("cancelled; resume later with --resume");
                return Ok(EXIT_CANCELLED);
            }
            Err(err) => {
                tracing::error!(video = %video.display(), "{err}");
                failures += 1;
                if total == 1 {
                    return Ok(1);
                }
            }
        }
    }

    Ok(if failures == total && total > 0 && !args.estimate { 1 } else { 0 })
}

fn resolve_output_dir(
    video: &Path,
    output: &Option<PathBuf>,
    batch: bool,
    force: bool,
) -> PathBuf {
    let stem = video
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "video".to_string());

    let base = match (output, batch) {
        (None, _) => video
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(format!("{stem}_review")),
        (Some(output), true) => output.join(format!("{stem}_review")),
        (Some(output), false) => output.clone(),
    };

    if force {
        return base;
    }
    let (path, version) = next_review_path(&base);
    if let Some(version) = version {
        tracing::info!(
            previous = %base.display(),
            version,
            "found previous review, creating new version"
        );
    }
    path
}

fn print_dry_run(detections: &[reviewscribe_core::Detection]) {
    use reviewscribe_core::{format_timestamp, Category};

    println!("Found {} issues:", detections.len());
    println!(
        "  {} bugs",
        detections.iter().filter(|d| d.category == Category::Bug).count()
    );
    println!(
        "  {} changes",
        detections.iter().filter(|d| d.category == Category::Change).count()
    );
    println!(
        "  {} UI issues",
        detections.iter().filter(|d| d.category == Category::Ui).count()
    );

    println!("\nSample detections:");
    for (i, detection) in detections.iter().take(5).enumerate() {
        let text: String = detection.segment.text.chars().take(60).collect();
        println!(
            "  {}. [{}] @ {}: {}",
            i + 1,
            detection.category,
            format_timestamp(detection.segment.start),
            text
        );
    }
    if detections.len() > 5 {
        println!("  ... and {} more", detections.len() - 5);
    }
}
