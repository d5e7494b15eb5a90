//! Checkpoint persistence for resumable runs.
//!
//! One JSON document at `<output>/.cache/checkpoint.json` carries every
//! stage's output. Writes are atomic (temp file + rename); loads are
//! tolerant, returning `None` for anything missing or malformed so a bad
//! checkpoint can never block a fresh run.

use std::io::Read;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use reviewscribe_core::{Detection, PipelineError, Stage, Transcription, UnifiedFinding};

const CACHE_DIR_NAME: &str = ".cache";
const CHECKPOINT_FILE_NAME: &str = "checkpoint.json";

/// A detection together with its extracted frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenshotRecord {
    pub detection: Detection,
    pub path: PathBuf,
}

/// Checkpoint state for one video run.
///
/// Every stage-data field defaults on deserialization so checkpoints from
/// older releases still load. Stage names in `completed_stages` that this
/// build does not recognize are kept but ignored; the unknown stage simply
/// re-executes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineCheckpoint {
    pub video_path: String,
    /// First 16 hex chars of the video's SHA-256.
    pub video_hash: String,
    pub output_dir: String,
    pub language: String,

    #[serde(default)]
    pub completed_stages: Vec<String>,

    #[serde(default)]
    pub transcription: Option<Transcription>,
    #[serde(default)]
    pub detections: Vec<Detection>,
    #[serde(default)]
    pub screenshots: Vec<ScreenshotRecord>,
    #[serde(default)]
    pub unified_findings: Vec<UnifiedFinding>,
    #[serde(default)]
    pub executive_summary: String,
    #[serde(default)]
    pub visual_summary: String,
    #[serde(default)]
    pub errors: Vec<PipelineError>,
}

impl PipelineCheckpoint {
    /// New checkpoint for a video, hashing the file content.
    pub fn create(video: &Path, output_dir: &Path, language: &str) -> std::io::Result<Self> {
        Ok(Self {
            video_path: absolute_string(video),
            video_hash: compute_file_hash(video)?,
            output_dir: absolute_string(output_dir),
            language: language.to_string(),
            completed_stages: Vec::new(),
            transcription: None,
            detections: Vec::new(),
            screenshots: Vec::new(),
            unified_findings: Vec::new(),
            executive_summary: String::new(),
            visual_summary: String::new(),
            errors: Vec::new(),
        })
    }

    pub fn is_stage_complete(&self, stage: Stage) -> bool {
        self.completed_stages.iter().any(|s| s == stage.as_str())
    }

    pub fn mark_stage_complete(&mut self, stage: Stage) {
        if !self.is_stage_complete(stage) {
            self.completed_stages.push(stage.as_str().to_string());
        }
    }

    /// First stage of the fixed sequence not yet completed.
    pub fn next_stage(&self) -> Option<Stage> {
        Stage::ALL.into_iter().find(|s| !self.is_stage_complete(*s))
    }
}

fn absolute_string(path: &Path) -> String {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    };
    absolute.display().to_string()
}

fn checkpoint_dir(output_dir: &Path) -> PathBuf {
    output_dir.join(CACHE_DIR_NAME)
}

/// Path of the checkpoint file for an output directory.
pub fn checkpoint_path(output_dir: &Path) -> PathBuf {
    checkpoint_dir(output_dir).join(CHECKPOINT_FILE_NAME)
}

/// First 16 hex chars of the SHA-256 of a file, streamed in 64 KiB chunks.
pub fn compute_file_hash(path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 65536];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    let digest = hasher.finalize();
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    Ok(hex[..16].to_string())
}

/// Load the checkpoint if present and well-formed.
pub fn load_checkpoint(output_dir: &Path) -> Option<PipelineCheckpoint> {
    let path = checkpoint_path(output_dir);
    if !path.exists() {
        return None;
    }
    let content = match std::fs::read_to_string(&path) {
        Ok(content) => content,
        Err(err) => {
            tracing::warn!(path = %path.display(), %err, "could not read checkpoint");
            return None;
        }
    };
    match serde_json::from_str(&content) {
        Ok(checkpoint) => Some(checkpoint),
        Err(err) => {
            tracing::warn!(path = %path.display(), %err, "could not parse checkpoint");
            None
        }
    }
}

/// Atomically persist the checkpoint (write to a temp name, then rename).
pub fn save_checkpoint(checkpoint: &PipelineCheckpoint, output_dir: &Path) -> std::io::Result<()> {
    let dir = checkpoint_dir(output_dir);
    std::fs::create_dir_all(&dir)?;

    let path = checkpoint_path(output_dir);
    let tmp_path = dir.join(format!("{CHECKPOINT_FILE_NAME}.tmp"));
    let json = serde_json::to_string_pretty(checkpoint)
        .map_err(|e| std::io::Error::other(e.to_string()))?;
    std::fs::write(&tmp_path, json)?;
    std::fs::rename(&tmp_path, &path)?;

    tracing::debug!(path = %path.display(), "checkpoint saved");
    Ok(())
}

/// Remove the checkpoint and its cache directory when empty.
pub fn delete_checkpoint(output_dir: &Path) -> std::io::Result<()> {
    let path = checkpoint_path(output_dir);
    if path.exists() {
        std::fs::remove_file(&path)?;
        tracing::debug!("checkpoint cleaned up");
    }
    let dir = checkpoint_dir(output_dir);
    if dir.exists() {
        if let Ok(mut entries) = std::fs::read_dir(&dir) {
            if entries.next().is_none() {
                let _ = std::fs::remove_dir(&dir);
            }
        }
    }
    Ok(())
}

/// Whether a checkpoint matches this exact run: same video path and
/// content hash, same output directory, same language.
pub fn checkpoint_valid_for(
    checkpoint: &PipelineCheckpoint,
    video: &Path,
    output_dir: &Path,
    language: &str,
) -> bool {
    if checkpoint.video_path != absolute_string(video) {
        tracing::warn!("checkpoint is for a different video file");
        return false;
    }
    if checkpoint.output_dir != absolute_string(output_dir) {
        tracing::warn!("checkpoint is for a different output directory");
        return false;
    }
    if checkpoint.language != language {
        tracing::warn!("checkpoint is for a different language setting");
        return false;
    }
    match compute_file_hash(video) {
        Ok(hash) if hash == checkpoint.video_hash => true,
        Ok(_) => {
            tracing::warn!("video file has changed since checkpoint");
            false
        }
        Err(err) => {
            tracing::warn!(%err, "could not hash video for checkpoint validation");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_video(dir: &Path, content: &[u8]) -> PathBuf {
        let path = dir.join("clip.mov");
        std::fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_stage_tracking_is_prefix_closed() {
        let dir = tempfile::tempdir().unwrap();
        let video = write_video(dir.path(), b"data");
        let mut ck = PipelineCheckpoint::create(&video, dir.path(), "pl").unwrap();

        assert_eq!(ck.next_stage(), Some(Stage::Audio));
        ck.mark_stage_complete(Stage::Audio);
        ck.mark_stage_complete(Stage::Audio);
        assert_eq!(ck.completed_stages, vec!["audio"]);
        assert_eq!(ck.next_stage(), Some(Stage::Transcription));

        for stage in Stage::ALL {
            ck.mark_stage_complete(stage);
        }
        assert_eq!(ck.next_stage(), None);
        // Completed list is exactly the stage order.
        let names: Vec<&str> = Stage::ALL.iter().map(|s| s.as_str()).collect();
        assert_eq!(ck.completed_stages, names);
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let video = write_video(dir.path(), b"data");
        let mut ck = PipelineCheckpoint::create(&video, dir.path(), "pl").unwrap();
        ck.mark_stage_complete(Stage::Audio);
        ck.executive_summary = "summary".to_string();

        save_checkpoint(&ck, dir.path()).unwrap();
        let loaded = load_checkpoint(dir.path()).unwrap();
        assert_eq!(loaded, ck);
        assert!(checkpoint_path(dir.path()).exists());
    }

    #[test]
    fn test_load_missing_or_malformed_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_checkpoint(dir.path()).is_none());

        std::fs::create_dir_all(dir.path().join(CACHE_DIR_NAME)).unwrap();
        std::fs::write(checkpoint_path(dir.path()), "{not json").unwrap();
        assert!(load_checkpoint(dir.path()).is_none());
    }

    #[test]
    fn test_old_checkpoint_gets_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(CACHE_DIR_NAME)).unwrap();
        // A minimal document from an older release: identity fields only.
        std::fs::write(
            checkpoint_path(dir.path()),
            r#"{"video_path": "/v.mov", "video_hash": "abc", "output_dir": "/out", "language": "pl"}"#,
        )
        .unwrap();
        let ck = load_checkpoint(dir.path()).unwrap();
        assert!(ck.completed_stages.is_empty());
        assert!(ck.transcription.is_none());
        assert!(ck.unified_findings.is_empty());
        assert!(ck.errors.is_empty());
    }

    #[test]
    fn test_unknown_stage_names_are_tolerated() {
        let dir = tempfile::tempdir().unwrap();
        let video = write_video(dir.path(), b"data");
        let mut ck = PipelineCheckpoint::create(&video, dir.path(), "pl").unwrap();
        ck.completed_stages = vec!["audio".to_string(), "holographic_pass".to_string()];
        assert!(ck.is_stage_complete(Stage::Audio));
        assert_eq!(ck.next_stage(), Some(Stage::Transcription));
    }

    #[test]
    fn test_valid_for_accepts_matching_run() {
        let dir = tempfile::tempdir().unwrap();
        let video = write_video(dir.path(), b"data");
        let ck = PipelineCheckpoint::create(&video, dir.path(), "pl").unwrap();
        assert!(checkpoint_valid_for(&ck, &video, dir.path(), "pl"));
    }

    #[test]
    fn test_valid_for_rejects_mutated_video() {
        let dir = tempfile::tempdir().unwrap();
        let video = write_video(dir.path(), b"data");
        let ck = PipelineCheckpoint::create(&video, dir.path(), "pl").unwrap();

        let mut content = std::fs::read(&video).unwrap();
        content.push(0x00);
        std::fs::write(&video, content).unwrap();

        assert!(!checkpoint_valid_for(&ck, &video, dir.path(), "pl"));
    }

    #[test]
    fn test_valid_for_rejects_language_and_dir_changes() {
        let dir = tempfile::tempdir().unwrap();
        let other_dir = tempfile::tempdir().unwrap();
        let video = write_video(dir.path(), b"data");
        let ck = PipelineCheckpoint::create(&video, dir.path(), "pl").unwrap();

        assert!(!checkpoint_valid_for(&ck, &video, dir.path(), "en"));
        assert!(!checkpoint_valid_for(&ck, &video, other_dir.path(), "pl"));
    }

    #[test]
    fn test_delete_removes_file_and_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        let video = write_video(dir.path(), b"data");
        let ck = PipelineCheckpoint::create(&video, dir.path(), "pl").unwrap();
        save_checkpoint(&ck, dir.path()).unwrap();

        delete_checkpoint(dir.path()).unwrap();
        assert!(!checkpoint_path(dir.path()).exists());
        assert!(!dir.path().join(CACHE_DIR_NAME).exists());
    }

    #[test]
    fn test_hash_is_16_hex_chars_and_content_sensitive() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_video(dir.path(), b"aaaa");
        let hash_a = compute_file_hash(&a).unwrap();
        assert_eq!(hash_a.len(), 16);
        assert!(hash_a.chars().all(|c| c.is_ascii_hexdigit()));

        std::fs::write(&a, b"aaab").unwrap();
        assert_ne!(compute_file_hash(&a).unwrap(), hash_a);
    }
}
