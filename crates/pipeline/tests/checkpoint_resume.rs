//! Resume semantics at the checkpoint level.
//!
//! These tests exercise the persistence contract the coordinator relies
//! on: stage bookkeeping survives a round-trip, resumed state is reused
//! verbatim, and any change to the video, output directory, or language
//! invalidates the checkpoint.

use std::path::{Path, PathBuf};

use reviewscribe_core::{Category, Detection, Segment, Stage, Transcription};
use reviewscribe_pipeline::{
    checkpoint_valid_for, delete_checkpoint, load_checkpoint, save_checkpoint, PipelineCheckpoint,
    ScreenshotRecord,
};

fn write_video(dir: &Path, content: &[u8]) -> PathBuf {
    let path = dir.join("clip.mov");
    std::fs::write(&path, content).unwrap();
    path
}

fn sample_transcription() -> Transcription {
    Transcription {
        full_text: "To nie działa. Trzeba to poprawić. Layout jest ok.".to_string(),
        segments: vec![
            Segment::new(0, 0.0, 2.0, "To nie działa."),
            Segment::new(1, 2.0, 4.0, "Trzeba to poprawić."),
            Segment::new(2, 4.0, 6.0, "Layout jest ok."),
        ],
        language: "pl".to_string(),
        response_id: "resp_stt".to_string(),
    }
}

fn sample_detection() -> Detection {
    Detection {
        segment: Segment::new(0, 0.0, 2.0, "To nie działa."),
        category: Category::Bug,
        keywords_found: vec!["nie działa".to_string()],
        context: "To nie działa. Trzeba to poprawić.".to_string(),
    }
}

#[test]
fn resume_reuses_persisted_stage_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let video = write_video(dir.path(), b"video-bytes");

    // First run: audio + transcription + detection complete, then the
    // process dies.
    let mut ck = PipelineCheckpoint::create(&video, dir.path(), "pl").unwrap();
    ck.mark_stage_complete(Stage::Audio);
    ck.transcription = Some(sample_transcription());
    ck.mark_stage_complete(Stage::Transcription);
    ck.detections = vec![sample_detection()];
    ck.mark_stage_complete(Stage::Detection);
    save_checkpoint(&ck, dir.path()).unwrap();

    // Second run: the checkpoint is valid and the non-regeneratable fields
    // come back byte-identical.
    let resumed = load_checkpoint(dir.path()).unwrap();
    assert!(checkpoint_valid_for(&resumed, &video, dir.path(), "pl"));
    assert_eq!(resumed.transcription, ck.transcription);
    assert_eq!(resumed.detections, ck.detections);
    assert_eq!(resumed.next_stage(), Some(Stage::Screenshots));
}

#[test]
fn completed_stages_stay_a_prefix_of_the_stage_order() {
    let dir = tempfile::tempdir().unwrap();
    let video = write_video(dir.path(), b"video-bytes");
    let mut ck = PipelineCheckpoint::create(&video, dir.path(), "pl").unwrap();

    for (i, stage) in Stage::ALL.into_iter().enumerate() {
        ck.mark_stage_complete(stage);
        let expected: Vec<&str> = Stage::ALL[..=i].iter().map(|s| s.as_str()).collect();
        assert_eq!(ck.completed_stages, expected);
    }
}

#[test]
fn mutated_video_invalidates_the_checkpoint() {
    let dir = tempfile::tempdir().unwrap();
    let video = write_video(dir.path(), b"video-bytes");

    let mut ck = PipelineCheckpoint::create(&video, dir.path(), "pl").unwrap();
    ck.mark_stage_complete(Stage::Audio);
    ck.mark_stage_complete(Stage::Transcription);
    save_checkpoint(&ck, dir.path()).unwrap();

    // Append one byte to the video between runs.
    let mut content = std::fs::read(&video).unwrap();
    content.push(b'!');
    std::fs::write(&video, content).unwrap();

    let loaded = load_checkpoint(dir.path()).unwrap();
    assert!(!checkpoint_valid_for(&loaded, &video, dir.path(), "pl"));
}

#[test]
fn screenshots_round_trip_with_their_detections() {
    let dir = tempfile::tempdir().unwrap();
    let video = write_video(dir.path(), b"video-bytes");

    let mut ck = PipelineCheckpoint::create(&video, dir.path(), "pl").unwrap();
    ck.screenshots = vec![ScreenshotRecord {
        detection: sample_detection(),
        path: dir.path().join("screenshots/01_bug_00-00.jpg"),
    }];
    save_checkpoint(&ck, dir.path()).unwrap();

    let loaded = load_checkpoint(dir.path()).unwrap();
    assert_eq!(loaded.screenshots.len(), 1);
    assert_eq!(loaded.screenshots[0].detection.category, Category::Bug);
    assert!(loaded.screenshots[0]
        .path
        .to_string_lossy()
        .ends_with("01_bug_00-00.jpg"));
}

#[test]
fn delete_after_success_leaves_no_cache() {
    let dir = tempfile::tempdir().unwrap();
    let video = write_video(dir.path(), b"video-bytes");

    let mut ck = PipelineCheckpoint::create(&video, dir.path(), "pl").unwrap();
    for stage in Stage::ALL {
        ck.mark_stage_complete(stage);
    }
    save_checkpoint(&ck, dir.path()).unwrap();
    delete_checkpoint(dir.path()).unwrap();

    assert!(load_checkpoint(dir.path()).is_none());
    assert!(!dir.path().join(".cache").exists());
}
