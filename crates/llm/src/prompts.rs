//! Internationalized prompt registry.
//!
//! Prompts are keyed by `(role, language, has_image)`. The model behavior is
//! prompt-conditioned, so these strings are part of the contract: edit them
//! deliberately, never generate them at runtime.

/// What the prompt is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptRole {
    /// Per-fragment semantic analysis (text-only legacy path).
    SemanticAnalysis,
    /// Executive summary over the final findings.
    ExecutiveSummary,
    /// Screenshot-only vision analysis (legacy path).
    VisionAnalysis,
    /// Unified semantic+visual analysis of one finding.
    UnifiedAnalysis,
    /// Whole-transcript semantic pre-filter.
    SemanticPrefilter,
}

/// Normalize a language code to a supported prompt language.
pub fn normalize_language(language: &str) -> &'static str {
    match language.to_lowercase().trim() {
        "pl" | "pl-pl" | "polish" | "polski" => "pl",
        _ => "en",
    }
}

/// Look up the prompt template for a role.
///
/// `has_image` only matters for [`PromptRole::UnifiedAnalysis`], which has a
/// text-only fallback used when frame extraction failed.
pub fn prompt_for(role: PromptRole, language: &str, has_image: bool) -> &'static str {
    let lang = normalize_language(language);
    match (role, lang, has_image) {
        (PromptRole::SemanticAnalysis, "pl", _) => SEMANTIC_ANALYSIS_PL,
        (PromptRole::SemanticAnalysis, _, _) => SEMANTIC_ANALYSIS_EN,
        (PromptRole::ExecutiveSummary, "pl", _) => EXECUTIVE_SUMMARY_PL,
        (PromptRole::ExecutiveSummary, _, _) => EXECUTIVE_SUMMARY_EN,
        (PromptRole::VisionAnalysis, "pl", _) => VISION_ANALYSIS_PL,
        (PromptRole::VisionAnalysis, _, _) => VISION_ANALYSIS_EN,
        (PromptRole::UnifiedAnalysis, "pl", true) => UNIFIED_ANALYSIS_PL,
        (PromptRole::UnifiedAnalysis, _, true) => UNIFIED_ANALYSIS_EN,
        (PromptRole::UnifiedAnalysis, "pl", false) => UNIFIED_ANALYSIS_TEXT_ONLY_PL,
        (PromptRole::UnifiedAnalysis, _, false) => UNIFIED_ANALYSIS_TEXT_ONLY_EN,
        (PromptRole::SemanticPrefilter, "pl", _) => SEMANTIC_PREFILTER_PL,
        (PromptRole::SemanticPrefilter, _, _) => SEMANTIC_PREFILTER_EN,
    }
}

/// Fill `{placeholder}` tokens in a template.
pub fn render_prompt(template: &str, substitutions: &[(&str, &str)]) -> String {
    let mut result = template.to_string();
    for (name, value) in substitutions {
        result = result.replace(&format!("{{{name}}}"), value);
    }
    result
}

const SEMANTIC_ANALYSIS_PL: &str = r#"Jesteś ekspertem UX/UI i programistą analizującym feedback z nagrania screencast.

Przeanalizuj poniższy fragment transkrypcji. UWAGA: Użytkownik może zgłaszać problem, ALE TAKŻE może potwierdzać że coś działa poprawnie.

Fragment:
{text}

Kontekst (otaczające wypowiedzi):
{context}

Kategoria wykryta automatycznie: {category}

WAŻNE - Przykłady interpretacji:
- "To nie działa" → is_issue: true (zgłasza problem)
- "Te białe tła nie przeszkadzają" → is_issue: false (potwierdza że OK)
- "Powinno być przeźroczyste" → is_issue: true (zgłasza problem)
- "Działa ładnie" → is_issue: false (potwierdza że OK)
- "Jest brzydkie" → is_issue: true (zgłasza problem)
- "Teraz jest ok" → is_issue: false (potwierdza że OK)

Zwróć szczególną uwagę na NEGACJE ("nie przeszkadza", "nie ma problemu", "jest ok").

Odpowiedz w formacie JSON:
{
    "is_issue": true/false,
    "sentiment": "problem|positive|neutral",
    "severity": "critical|high|medium|low|none",
    "summary": "Krótkie podsumowanie - CO użytkownik mówi (1-2 zdania)",
    "action_items": ["Lista konkretnych zadań do wykonania (pusta jeśli is_issue=false)"],
    "affected_components": ["Lista komponentów UI/funkcji których dotyczy"],
    "suggested_fix": "Sugerowane rozwiązanie techniczne (lub 'Brak - nie jest to problem' jeśli is_issue=false)"
}

Odpowiadaj tylko JSON, bez dodatkowego tekstu."#;

const SEMANTIC_ANALYSIS_EN: &str = r#"You are a UX/UI expert and developer analyzing feedback from a screencast recording.

Analyze the following transcript fragment. NOTE: The user may be reporting a problem, BUT ALSO may be confirming that something works correctly.

Fragment:
{text}

Context (surrounding speech):
{context}

Automatically detected category: {category}

IMPORTANT - Interpretation examples:
- "This doesn't work" → is_issue: true (reports problem)
- "The white backgrounds don't bother me" → is_issue: false (confirms OK)
- "Should be transparent" → is_issue: true (reports problem)
- "Works nicely" → is_issue: false (confirms OK)
- "It's ugly" → is_issue: true (reports problem)
- "Now it's fine" → is_issue: false (confirms OK)

Pay special attention to NEGATIONS ("doesn't bother", "no problem", "is ok").

Respond in JSON format:
{
    "is_issue": true/false,
    "sentiment": "problem|positive|neutral",
    "severity": "critical|high|medium|low|none",
    "summary": "Brief summary - WHAT the user is saying (1-2 sentences)",
    "action_items": ["List of specific tasks to complete (empty if is_issue=false)"],
    "affected_components": ["List of affected UI components/features"],
    "suggested_fix": "Suggested technical solution (or 'None - not an issue' if is_issue=false)"
}

Respond only with JSON, no additional text."#;

const EXECUTIVE_SUMMARY_PL: &str = r#"Jesteś product managerem przygotowującym raport z przeglądu UX.

Na podstawie poniższych znalezisk, przygotuj krótkie podsumowanie wykonawcze (executive summary) dla zespołu developerskiego.

Znaleziska:
{findings}

Napisz podsumowanie w 3-5 zdaniach, skupiając się na:
1. Najważniejszych problemach do naprawienia
2. Ogólnym stanie UX aplikacji
3. Rekomendacji priorytetów

Odpowiadaj po polsku, zwięźle i konkretnie."#;

const EXECUTIVE_SUMMARY_EN: &str = r#"You are a product manager preparing a UX review report.

Based on the following findings, prepare a brief executive summary for the development team.

Findings:
{findings}

Write a summary in 3-5 sentences, focusing on:
1. Most critical issues to fix
2. Overall state of the application UX
3. Priority recommendations

Be concise and specific."#;

const VISION_ANALYSIS_PL: &str = r#"Jesteś ekspertem UX/UI analizującym screenshot aplikacji desktopowej.

Kontekst z transkrypcji (co użytkownik mówił w tym momencie):
"{transcript_context}"

Przeanalizuj ten screenshot i odpowiedz w formacie JSON:
{
    "ui_elements": ["Lista widocznych elementów UI (przyciski, formularze, itp.)"],
    "issues_detected": ["Lista problemów wizualnych/UX widocznych na screenshocie"],
    "accessibility_notes": ["Uwagi dotyczące dostępności"],
    "design_feedback": "Ogólna ocena designu i sugestie (1-2 zdania)",
    "technical_observations": "Obserwacje techniczne - błędy, artefakty, problemy z layoutem"
}

Odpowiadaj tylko JSON, po polsku."#;

const VISION_ANALYSIS_EN: &str = r#"You are a UX/UI expert analyzing a desktop application screenshot.

Context from transcript (what the user was saying at this moment):
"{transcript_context}"

Analyze this screenshot and respond in JSON format:
{
    "ui_elements": ["List of visible UI elements (buttons, forms, etc.)"],
    "issues_detected": ["List of visual/UX issues visible in the screenshot"],
    "accessibility_notes": ["Accessibility observations"],
    "design_feedback": "Overall design assessment and suggestions (1-2 sentences)",
    "technical_observations": "Technical observations - errors, artifacts, layout issues"
}

Respond only with JSON, in English."#;

const UNIFIED_ANALYSIS_PL: &str = r#"Jesteś ekspertem UX/UI analizującym nagranie screencast z feedbackiem użytkownika.

Masz do dyspozycji:
1. Screenshot z aplikacji (załączony obrazek)
2. Fragment transkrypcji z tego momentu nagrania

Fragment transkrypcji:
{transcript_context}

Pełny kontekst (otaczające wypowiedzi):
{full_context}

Kategoria wykryta automatycznie: {category}

WAŻNE - określ czy użytkownik zgłasza PROBLEM czy POTWIERDZA że coś jest OK:
- "To nie działa" → is_issue: true
- "Nie przeszkadza mi to" → is_issue: false
- "Powinno być inaczej" → is_issue: true
- "Teraz jest ok" → is_issue: false
- "Jest brzydkie" → is_issue: true
- "Działa ładnie" → is_issue: false

Przeanalizuj screenshot I transkrypcję RAZEM i odpowiedz JSON:
{
    "is_issue": true/false,
    "sentiment": "problem|positive|neutral",
    "severity": "critical|high|medium|low|none",
    "summary": "Co użytkownik mówi i co widać na screenshocie (1-2 zdania)",
    "action_items": ["Konkretne zadania do wykonania (puste jeśli is_issue=false)"],
    "affected_components": ["Komponenty UI których dotyczy"],
    "suggested_fix": "Sugerowane rozwiązanie techniczne",
    "ui_elements": ["Widoczne elementy UI na screenshocie"],
    "issues_detected": ["Problemy wizualne/UX widoczne na screenshocie"],
    "accessibility_notes": ["Uwagi o dostępności"],
    "design_feedback": "Ocena designu i sugestie (1-2 zdania)",
    "technical_observations": "Obserwacje techniczne - błędy, artefakty, problemy z layoutem"
}

Odpowiadaj tylko JSON, bez dodatkowego tekstu."#;

const UNIFIED_ANALYSIS_EN: &str = r#"You are a UX/UI expert analyzing a screencast recording with user feedback.

You have access to:
1. A screenshot from the application (attached image)
2. A transcript fragment from this moment in the recording

Transcript fragment:
{transcript_context}

Full context (surrounding speech):
{full_context}

Automatically detected category: {category}

IMPORTANT - determine if the user is reporting a PROBLEM or CONFIRMING something is OK:
- "This doesn't work" → is_issue: true
- "This doesn't bother me" → is_issue: false
- "Should be different" → is_issue: true
- "Now it's fine" → is_issue: false
- "It's ugly" → is_issue: true
- "Works nicely" → is_issue: false

Analyze the screenshot AND transcript TOGETHER and respond with JSON:
{
    "is_issue": true/false,
    "sentiment": "problem|positive|neutral",
    "severity": "critical|high|medium|low|none",
    "summary": "What the user says and what's visible in the screenshot (1-2 sentences)",
    "action_items": ["Specific tasks to complete (empty if is_issue=false)"],
    "affected_components": ["UI components this relates to"],
    "suggested_fix": "Suggested technical solution",
    "ui_elements": ["Visible UI elements in the screenshot"],
    "issues_detected": ["Visual/UX issues visible in the screenshot"],
    "accessibility_notes": ["Accessibility observations"],
    "design_feedback": "Design assessment and suggestions (1-2 sentences)",
    "technical_observations": "Technical observations - errors, artifacts, layout issues"
}

Respond only with JSON, no additional text."#;

const UNIFIED_ANALYSIS_TEXT_ONLY_PL: &str = r#"Jesteś ekspertem UX/UI analizującym feedback z nagrania screencast.

Fragment transkrypcji:
{transcript_context}

Pełny kontekst (otaczające wypowiedzi):
{full_context}

Kategoria wykryta automatycznie: {category}

UWAGA: Screenshot nie jest dostępny - analizuj tylko na podstawie transkrypcji.

WAŻNE - określ czy użytkownik zgłasza PROBLEM czy POTWIERDZA że coś jest OK:
- "To nie działa" → is_issue: true
- "Nie przeszkadza mi to" → is_issue: false

Odpowiedz JSON:
{
    "is_issue": true/false,
    "sentiment": "problem|positive|neutral",
    "severity": "critical|high|medium|low|none",
    "summary": "Co użytkownik mówi (1-2 zdania)",
    "action_items": ["Konkretne zadania (puste jeśli is_issue=false)"],
    "affected_components": ["Komponenty UI których dotyczy (na podstawie transkrypcji)"],
    "suggested_fix": "Sugerowane rozwiązanie",
    "ui_elements": [],
    "issues_detected": [],
    "accessibility_notes": [],
    "design_feedback": "Brak - screenshot niedostępny",
    "technical_observations": "Brak - screenshot niedostępny"
}

Odpowiadaj tylko JSON."#;

const UNIFIED_ANALYSIS_TEXT_ONLY_EN: &str = r#"You are a UX/UI expert analyzing feedback from a screencast recording.

Transcript fragment:
{transcript_context}

Full context (surrounding speech):
{full_context}

Automatically detected category: {category}

NOTE: Screenshot is not available - analyze based on transcript only.

IMPORTANT - determine if the user is reporting a PROBLEM or CONFIRMING something is OK:
- "This doesn't work" → is_issue: true
- "This doesn't bother me" → is_issue: false

Respond with JSON:
{
    "is_issue": true/false,
    "sentiment": "problem|positive|neutral",
    "severity": "critical|high|medium|low|none",
    "summary": "What the user says (1-2 sentences)",
    "action_items": ["Specific tasks (empty if is_issue=false)"],
    "affected_components": ["UI components (based on transcript)"],
    "suggested_fix": "Suggested solution",
    "ui_elements": [],
    "issues_detected": [],
    "accessibility_notes": [],
    "design_feedback": "N/A - screenshot unavailable",
    "technical_observations": "N/A - screenshot unavailable"
}

Respond only with JSON."#;

const SEMANTIC_PREFILTER_PL: &str = r#"Jesteś ekspertem UX/UI analizującym transkrypcję nagrania przeglądu aplikacji.

Przeanalizuj CAŁĄ poniższą transkrypcję i zidentyfikuj WSZYSTKIE momenty, w których użytkownik:
- Opisuje błąd, problem lub coś co nie działa
- Sugeruje zmianę lub ulepszenie
- Komentuje elementy UI/UX (przyciski, formularze, layout)
- Wspomina o problemach z wydajnością
- Porusza kwestie dostępności
- Opisuje cokolwiek co może wymagać uwagi developera

WAŻNE: Bądź LIBERALNY w identyfikacji - lepiej oznaczyć więcej momentów niż przegapić potencjalne problemy.
Model wizyjny później zweryfikuje każdy z nich analizując screenshot.

Transkrypcja z timestampami:
{transcript_with_timestamps}

Odpowiedz w formacie JSON:
{
    "points_of_interest": [
        {
            "timestamp_start": 12.5,
            "timestamp_end": 18.0,
            "category": "bug|change|ui|performance|accessibility|other",
            "confidence": 0.85,
            "reasoning": "Użytkownik mówi że przycisk nie reaguje na kliknięcie",
            "transcript_excerpt": "ten przycisk tutaj jakoś nie działa"
        }
    ],
    "total_issues_found": 5,
    "analysis_notes": "Krótkie podsumowanie znalezionych obszarów"
}

Odpowiadaj tylko JSON."#;

const SEMANTIC_PREFILTER_EN: &str = r#"You are a UX/UI expert analyzing a transcript from an application review recording.

Analyze the ENTIRE transcript below and identify ALL moments where the user:
- Describes a bug, problem, or something that doesn't work
- Suggests a change or improvement
- Comments on UI/UX elements (buttons, forms, layout)
- Mentions performance issues
- Raises accessibility concerns
- Describes anything that may require developer attention

IMPORTANT: Be LIBERAL in identification - it's better to flag more moments than to miss potential issues.
The vision model will later verify each one by analyzing the screenshot.

Transcript with timestamps:
{transcript_with_timestamps}

Respond in JSON format:
{
    "points_of_interest": [
        {
            "timestamp_start": 12.5,
            "timestamp_end": 18.0,
            "category": "bug|change|ui|performance|accessibility|other",
            "confidence": 0.85,
            "reasoning": "User says button doesn't respond to clicking",
            "transcript_excerpt": "this button here doesn't seem to work"
        }
    ],
    "total_issues_found": 5,
    "analysis_notes": "Brief summary of identified areas"
}

Respond only with JSON."#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_normalization() {
        assert_eq!(normalize_language("pl-PL"), "pl");
        assert_eq!(normalize_language("Polski"), "pl");
        assert_eq!(normalize_language("en-US"), "en");
        assert_eq!(normalize_language("de"), "en");
    }

    #[test]
    fn test_unified_prompt_selects_text_only_fallback() {
        let with_image = prompt_for(PromptRole::UnifiedAnalysis, "pl", true);
        let text_only = prompt_for(PromptRole::UnifiedAnalysis, "pl", false);
        assert!(with_image.contains("Screenshot z aplikacji"));
        assert!(text_only.contains("Screenshot nie jest dostępny"));
    }

    #[test]
    fn test_render_prompt_fills_placeholders() {
        let rendered = render_prompt(
            prompt_for(PromptRole::UnifiedAnalysis, "en", true),
            &[
                ("transcript_context", "the button is broken"),
                ("full_context", "earlier speech"),
                ("category", "bug"),
            ],
        );
        assert!(rendered.contains("the button is broken"));
        assert!(rendered.contains("Automatically detected category: bug"));
        assert!(!rendered.contains("{transcript_context}"));
    }

    #[test]
    fn test_prefilter_prompt_has_timestamp_placeholder() {
        for lang in ["pl", "en"] {
            let template = prompt_for(PromptRole::SemanticPrefilter, lang, false);
            assert!(template.contains("{transcript_with_timestamps}"));
            assert!(template.contains("points_of_interest"));
        }
    }
}
