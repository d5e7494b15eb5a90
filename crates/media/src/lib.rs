//! Media adapter wrapping ffmpeg and ffprobe.
//!
//! Pure I/O: extract a speech-recognition-friendly audio track, probe a
//! video's duration, and grab a JPEG frame at an arbitrary timestamp. All
//! invocations are external subprocesses; nothing here decodes media.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::process::Command;

/// Media tool errors.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("required tools not found: {0}. Install FFmpeg (e.g. `apt install ffmpeg`)")]
    ToolsMissing(String),

    #[error("{tool} failed: {stderr}")]
    ToolFailed { tool: &'static str, stderr: String },

    #[error("video file not found: {0}")]
    VideoMissing(PathBuf),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Wrapper around the ffmpeg/ffprobe binaries.
#[derive(Debug, Clone)]
pub struct MediaAdapter {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl MediaAdapter {
    /// Locate ffmpeg and ffprobe on PATH.
    pub fn discover() -> Result<Self, MediaError> {
        let ffmpeg = which::which("ffmpeg");
        let ffprobe = which::which("ffprobe");
        match (ffmpeg, ffprobe) {
            (Ok(ffmpeg), Ok(ffprobe)) => Ok(Self { ffmpeg, ffprobe }),
            (ffmpeg, ffprobe) => {
                let mut missing = Vec::new();
                if ffmpeg.is_err() {
                    missing.push("ffmpeg");
                }
                if ffprobe.is_err() {
                    missing.push("ffprobe");
                }
                Err(MediaError::ToolsMissing(missing.join(", ")))
            }
        }
    }

    /// Extract a 16 kHz mono MP3 audio track.
    ///
    /// Without an explicit output path the file lands in the system temp
    /// directory as `reviewscribe_<stem>.mp3`.
    pub async fn extract_audio(
        &self,
        video: &Path,
        output: Option<PathBuf>,
    ) -> Result<PathBuf, MediaError> {
        if !video.exists() {
            return Err(MediaError::VideoMissing(video.to_path_buf()));
        }

        let output = output.unwrap_or_else(|| {
            let stem = video
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "video".to_string());
            std::env::temp_dir().join(format!("reviewscribe_{stem}.mp3"))
        });

        tracing::info!(video = %video.display(), "extracting audio");

        let result = Command::new(&self.ffmpeg)
            .arg("-i")
            .arg(video)
            .args(["-vn", "-acodec", "libmp3lame", "-q:a", "2"])
            .args(["-ar", "16000", "-ac", "1", "-y"])
            .arg(&output)
            .output()
            .await?;

        if !result.status.success() {
            return Err(MediaError::ToolFailed {
                tool: "ffmpeg",
                stderr: String::from_utf8_lossy(&result.stderr).into_owned(),
            });
        }

        tracing::debug!(audio = %output.display(), "audio extracted");
        Ok(output)
    }

    /// Video duration in seconds.
    pub async fn duration(&self, video: &Path) -> Result<f64, MediaError> {
        let result = Command::new(&self.ffprobe)
            .args(["-v", "error", "-show_entries", "format=duration"])
            .args(["-of", "default=noprint_wrappers=1:nokey=1"])
            .arg(video)
            .output()
            .await?;

        if !result.status.success() {
            return Err(MediaError::ToolFailed {
                tool: "ffprobe",
                stderr: String::from_utf8_lossy(&result.stderr).into_owned(),
            });
        }

        let stdout = String::from_utf8_lossy(&result.stdout);
        stdout
            .trim()
            .parse::<f64>()
            .map_err(|e| MediaError::ToolFailed {
                tool: "ffprobe",
                stderr: format!("unparseable duration '{}': {e}", stdout.trim()),
            })
    }

    /// Grab a single JPEG frame at `timestamp` seconds.
    pub async fn extract_frame(
        &self,
        video: &Path,
        timestamp: f64,
        output: &Path,
    ) -> Result<PathBuf, MediaError> {
        let result = Command::new(&self.ffmpeg)
            .arg("-ss")
            .arg(format!("{timestamp}"))
            .arg("-i")
            .arg(video)
            .args(["-vframes", "1", "-q:v", "2", "-y"])
            .arg(output)
            .output()
            .await?;

        if !result.status.success() {
            return Err(MediaError::ToolFailed {
                tool: "ffmpeg",
                stderr: String::from_utf8_lossy(&result.stderr).into_owned(),
            });
        }

        Ok(output.to_path_buf())
    }
}
