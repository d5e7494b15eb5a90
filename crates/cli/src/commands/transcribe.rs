//! The `transcribe` command: audio → transcript file, nothing else.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use reviewscribe_config::{settings::LOCAL_STT_URL, Settings};
use reviewscribe_llm::{transcribe, SttRequest};
use reviewscribe_media::MediaAdapter;
use reviewscribe_transport::HttpClient;

#[derive(Args, Debug)]
pub struct TranscribeArgs {
    /// Video to transcribe.
    pub video: PathBuf,

    /// Output file (default: `<video>_transcript.txt` next to the video).
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Language code.
    #[arg(long = "lang")]
    pub language: Option<String>,

    /// Use the local STT server instead of the cloud endpoint.
    #[arg(long)]
    pub local: bool,
}

pub async fn run(args: TranscribeArgs) -> Result<i32> {
    if !args.video.exists() {
        tracing::error!(video = %args.video.display(), "video not found");
        return Ok(1);
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
    if args.local {
        settings.stt_endpoint = LOCAL_STT_URL.to_string();
    }
    if settings.stt_key().is_empty() && !args.local {
        tracing::error!("API key not configured. Set LIBRAXIS_API_KEY or use --local");
        return Ok(1);
    }

    let audio = media.extract_audio(&args.video, None).await?;

    let http = HttpClient::new().map_err(|e| anyhow::anyhow!("http client: {e}"))?;
    let request = SttRequest {
        endpoint: &settings.stt_endpoint,
        model: &settings.stt_model,
        api_key: settings.stt_key(),
        language: &settings.language,
        timeout: settings.timeouts.transcription(),
    };
    let transcription = transcribe(&http, &request, &audio)
        .await
        .map_err(|e| anyhow::anyhow!("transcription failed: {e}"))?;

    let stem = args
        .video
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "video".to_string());
    let output = args.output.unwrap_or_else(|| {
        args.video
            .parent()
            .unwrap_or_else(|| std::path::Path::new("."))
            .join(format!("{stem}_transcript.txt"))
    });

    std::fs::write(&output, &transcription.full_text)?;
    println!(
        "Transcribed {} segments ({}) to {}",
        transcription.segments.len(),
        transcription.language,
        output.display()
    );
    Ok(0)
}
