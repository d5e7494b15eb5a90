//! Executive and visual summaries over the final findings.

use reviewscribe_config::Settings;
use reviewscribe_core::{Error, UnifiedFinding};
use reviewscribe_llm::{
    build_request, clean_summary_response, extract_content, normalize_language, prompt_for,
    render_prompt, PromptRole,
};
use reviewscribe_transport::HttpClient;

/// Ask the LLM for an executive summary of the confirmed issues.
///
/// Returns an empty string when there is nothing to summarize or no key is
/// configured; failures propagate so the coordinator can record them
/// without aborting.
pub async fn generate_executive_summary(
    http: &HttpClient,
    settings: &Settings,
    findings: &[UnifiedFinding],
    previous_response_id: &str,
) -> Result<String, Error> {
    if findings.is_empty() || settings.vision_key().is_empty() {
        return Ok(String::new());
    }

    let issues: Vec<&UnifiedFinding> = findings.iter().filter(|f| f.is_issue).collect();
    if issues.is_empty() {
        return Ok("No issues found - all observations confirmed as working correctly.".to_string());
    }

    let findings_list = issues
        .iter()
        .map(|f| format!("- [{}] {}", f.severity.as_str().to_uppercase(), f.summary))
        .collect::<Vec<_>>()
        .join("\n");

    let template = prompt_for(PromptRole::ExecutiveSummary, &settings.language, false);
    let prompt = render_prompt(template, &[("findings", &findings_list)]);

    // The summary reuses the vision endpoint and chains from the last
    // analyzer response so the server keeps the conversational context.
    let body = build_request(
        &settings.vision_model,
        &prompt,
        &settings.vision_endpoint,
        None,
        false,
        (!previous_response_id.is_empty()).then_some(previous_response_id),
    );

    let result = http
        .post_json(
            &settings.vision_endpoint,
            settings.vision_key(),
            &body,
            settings.timeouts.llm(),
            "Executive summary",
        )
        .await
        .map_err(|e| Error::Transport(e.to_string()))?;

    Ok(clean_summary_response(&extract_content(
        &result,
        &settings.vision_endpoint,
    )))
}

/// Frequency summary of visual issues, rendered as Markdown.
pub fn generate_visual_summary(findings: &[UnifiedFinding], language: &str) -> String {
    if findings.is_empty() {
        return String::new();
    }

    // Count issue texts, preserving first-seen order for equal counts.
    let mut counts: Vec<(String, usize)> = Vec::new();
    for finding in findings.iter().filter(|f| f.is_issue) {
        for issue in &finding.issues_detected {
            match counts.iter_mut().find(|(text, _)| text == issue) {
                Some((_, count)) => *count += 1,
                None => counts.push((issue.clone(), 1)),
            }
        }
    }

    if counts.is_empty() {
        return String::new();
    }

    counts.sort_by(|a, b| b.1.cmp(&a.1));

    let (header, subheader) = match normalize_language(language) {
        "pl" => ("## Podsumowanie analizy wizualnej", "### Najczęstsze problemy:"),
        _ => ("## Visual analysis summary", "### Most frequent issues:"),
    };

    let mut lines = vec![header.to_string(), String::new(), subheader.to_string()];
    for (issue, count) in counts.iter().take(10) {
        lines.push(format!("- {issue} ({count}x)"));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use reviewscribe_core::{Category, Sentiment, Severity};

    fn finding(is_issue: bool, issues: &[&str]) -> UnifiedFinding {
        UnifiedFinding {
            detection_id: 0,
            timestamp: 0.0,
            screenshot_path: None,
            category: Category::Ui,
            is_issue,
            sentiment: Sentiment::Problem,
            severity: Severity::Medium,
            summary: "s".to_string(),
            action_items: vec![],
            affected_components: vec![],
            suggested_fix: String::new(),
            ui_elements: vec![],
            issues_detected: issues.iter().map(|s| s.to_string()).collect(),
            accessibility_notes: vec![],
            design_feedback: String::new(),
            technical_observations: String::new(),
            response_id: String::new(),
            merged_from_ids: vec![],
        }
    }

    #[test]
    fn test_visual_summary_counts_and_sorts() {
        let findings = vec![
            finding(true, &["zamazany tekst", "niski kontrast"]),
            finding(true, &["niski kontrast"]),
            finding(false, &["ignorowane bo nie problem"]),
        ];
        let summary = generate_visual_summary(&findings, "pl");
        assert!(summary.starts_with("## Podsumowanie analizy wizualnej"));
        let kontrast_pos = summary.find("niski kontrast (2x)").unwrap();
        let zamazany_pos = summary.find("zamazany tekst (1x)").unwrap();
        assert!(kontrast_pos < zamazany_pos);
        assert!(!summary.contains("ignorowane"));
    }

    #[test]
    fn test_visual_summary_english_header() {
        let findings = vec![finding(true, &["low contrast"])];
        let summary = generate_visual_summary(&findings, "en-US");
        assert!(summary.starts_with("## Visual analysis summary"));
    }

    #[test]
    fn test_visual_summary_empty_cases() {
        assert_eq!(generate_visual_summary(&[], "pl"), "");
        let no_issues = vec![finding(true, &[])];
        assert_eq!(generate_visual_summary(&no_issues, "pl"), "");
    }
}
