//! Processing-time estimates for `--estimate` and `--dry-run`.

use reviewscribe_core::FilterLevel;

/// Seconds of STT per minute of video.
const STT_PER_MINUTE: f64 = 2.0;
/// Seconds of semantic pre-filter per minute of video.
const PREFILTER_PER_MINUTE: f64 = 8.0;
/// Seconds of unified VLM analysis per finding.
const UNIFIED_PER_DETECTION: f64 = 20.0;
/// Assumed findings per minute when the detection count is unknown.
const ASSUMED_DETECTIONS_PER_MINUTE: f64 = 1.5;

/// Print per-stage time estimates.
pub fn show_estimate(
    duration_secs: f64,
    analysis_enabled: bool,
    detection_count: Option<usize>,
    filter_level: FilterLevel,
) {
    let minutes = duration_secs / 60.0;
    let mut total = 0.0;

    let stt = minutes * STT_PER_MINUTE;
    total += stt;
    println!("Estimated processing time:");
    println!("  Transcription        ~{}", fmt_secs(stt));

    if matches!(filter_level, FilterLevel::Base | FilterLevel::Combined) {
        let prefilter = minutes * PREFILTER_PER_MINUTE;
        total += prefilter;
        println!("  Semantic pre-filter  ~{}", fmt_secs(prefilter));
    }

    if analysis_enabled {
        let detections = detection_count
            .map(|c| c as f64)
            .unwrap_or(minutes * ASSUMED_DETECTIONS_PER_MINUTE);
        let unified = detections * UNIFIED_PER_DETECTION;
        total += unified;
        match detection_count {
            Some(count) => println!(
                "  Unified analysis     ~{} ({count} findings)",
                fmt_secs(unified)
            ),
            None => println!(
                "  Unified analysis     ~{} (assuming ~{:.0} findings)",
                fmt_secs(unified),
                detections
            ),
        }
    }

    println!("  Total                ~{}", fmt_secs(total));
}

fn fmt_secs(secs: f64) -> String {
    if secs >= 90.0 {
        format!("{:.0} min", (secs / 60.0).ceil())
    } else {
        format!("{secs:.0} s")
    }
}
