//! Post-processing: deterministic cleanup of raw model responses.
//!
//! ## Why is post-processing necessary?
//!
//! Even well-prompted models occasionally disobey the "translation only"
//! instruction:
//!
//! - wrapping the answer in ` ``` ` fences
//! - prefixing a `[DETECTED: Gujarati]`-style language label (a pattern
//!   many OCR-translation prompts train into models)
//! - leading "Here is the translation:" commentary
//! - Windows-style `\r\n` line endings and invisible Unicode
//!
//! These rules are cheap, deterministic string/regex passes that fix model
//! quirks without touching content. Each rule is a pure function
//! (`&str → String`) with no shared state, independently testable against
//! literal fixture responses.
//!
//! The cleaned text carries no trailing newline; final-output assembly
//! owns the joining and the terminating newline.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all cleanup rules to a raw model response, in order.
pub fn clean_translation(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = strip_outer_fences(&s);
    let s = strip_detected_label(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    let s = remove_invisible_chars(&s);
    s.trim().to_string()
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Strip outer code fences ──────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[a-zA-Z]*\n(.*)\n```\s*$").unwrap());

fn strip_outer_fences(input: &str) -> String {
    if let Some(caps) = RE_OUTER_FENCES.captures(input.trim()) {
        caps[1].to_string()
    } else {
        input.to_string()
    }
}

// ── Rule 3: Strip detected-language labels ───────────────────────────────

static RE_DETECTED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\[DETECTED:\s*[^\]]*\]\s*").unwrap());

fn strip_detected_label(input: &str) -> String {
    RE_DETECTED.replace(input, "").to_string()
}

// ── Rule 4: Trim trailing whitespace per line ────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 5: Collapse excessive blank lines ───────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{4,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n\n").to_string()
}

// ── Rule 6: Remove invisible Unicode characters ──────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}
