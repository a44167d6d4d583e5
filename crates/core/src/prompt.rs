//! Prompt assembly and the prompt-role inference heuristic.
//!
//! The positive prompt for a page is the per-page override, then the
//! job's analysis-derived prompt, then a generic default. The negative
//! prompt is the per-page override merged with a fixed quality guard.
//!
//! `infer_prompt_role` is the gendered-noun heuristic used only by the
//! flat workflow dialect to tell a positive text encoder from a negative
//! one when a template carries no explicit role tags. It is known to be
//! template-dependent and fragile; newer dialects tag roles explicitly
//! and never call it.

use std::sync::OnceLock;

use regex::Regex;

/// Fallback positive prompt when neither the page nor the job supplies one.
pub const DEFAULT_POSITIVE_PROMPT: &str = "child portrait";

/// Quality guard appended to every negative prompt.
pub const DEFAULT_NEGATIVE_PROMPT: &str = "low quality, bad face, distorted";

/// Role a prompt string plays in a workflow graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptRole {
    Positive,
    Negative,
}

/// Effective positive prompt for a page.
pub fn effective_positive(page_override: Option<&str>, job_prompt: Option<&str>) -> String {
    page_override
        .or(job_prompt)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_POSITIVE_PROMPT)
        .to_string()
}

/// Effective negative prompt for a page: the override (if any) merged
/// with the quality guard.
pub fn effective_negative(page_override: Option<&str>) -> String {
    match page_override.map(str::trim).filter(|s| !s.is_empty()) {
        Some(over) => format!("{over}, {DEFAULT_NEGATIVE_PROMPT}"),
        None => DEFAULT_NEGATIVE_PROMPT.to_string(),
    }
}

fn gendered_noun_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\b(girl|boy|child|kid|daughter|son|princess|prince)\b")
            .unwrap_or_else(|_| unreachable!("static pattern"))
    })
}

/// Infer whether existing encoder text is the positive or the negative
/// prompt: subject nouns (girl, boy, child, ...) mark the positive side.
///
/// Only the flat dialect relies on this; treat a mismatch as a template
/// defect, not a contract violation.
pub fn infer_prompt_role(text: &str) -> PromptRole {
    if gendered_noun_re().is_match(text) {
        PromptRole::Positive
    } else {
        PromptRole::Negative
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -- Effective prompts --

    #[test]
    fn page_override_wins() {
        assert_eq!(
            effective_positive(Some("princess on a swing"), Some("5 year old girl")),
            "princess on a swing"
        );
    }

    #[test]
    fn job_prompt_used_when_no_override() {
        assert_eq!(
            effective_positive(None, Some("5 year old girl, curly hair")),
            "5 year old girl, curly hair"
        );
    }

    #[test]
    fn default_positive_when_nothing_set() {
        assert_eq!(effective_positive(None, None), DEFAULT_POSITIVE_PROMPT);
        assert_eq!(effective_positive(Some("   "), Some("")), DEFAULT_POSITIVE_PROMPT);
    }

    #[test]
    fn negative_merges_override_with_guard() {
        assert_eq!(
            effective_negative(Some("extra fingers")),
            "extra fingers, low quality, bad face, distorted"
        );
        assert_eq!(effective_negative(None), DEFAULT_NEGATIVE_PROMPT);
    }

    // -- Role inference --

    #[test]
    fn subject_nouns_mark_positive() {
        assert_eq!(
            infer_prompt_role("a happy girl riding a dragon"),
            PromptRole::Positive
        );
        assert_eq!(infer_prompt_role("Young BOY in the woods"), PromptRole::Positive);
    }

    #[test]
    fn quality_text_marks_negative() {
        assert_eq!(
            infer_prompt_role("low quality, blurry, watermark"),
            PromptRole::Negative
        );
    }

    #[test]
    fn word_boundaries_respected() {
        // "boycott" must not match "boy".
        assert_eq!(infer_prompt_role("boycott the blur"), PromptRole::Negative);
    }
}
