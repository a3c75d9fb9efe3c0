//! Instruction prompts for vision-model page translation.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth**: changing the instruction (e.g. adding a
//!    rule about names or honorifics) requires editing exactly one place.
//!
//! 2. **Testability**: unit tests can inspect the constructed instruction
//!    directly without spinning up a real model, making prompt regressions
//!    easy to catch.
//!
//! The instruction is deterministic: identical languages produce an
//! identical string, so requests are reproducible for testing.

/// Build the per-page instruction sent alongside the page image.
///
/// With a known `source` the model is told what language the page is in;
/// with `None` it is asked to detect the language and translate directly.
/// The detected language is deliberately not echoed back; the response
/// must be the plain translation only, since any wrapper text would have to
/// be stripped back out of every page.
pub fn build_instruction(source: Option<&str>, target: &str) -> String {
    let lang_instruction = match source {
        Some(src) => format!("This page contains {src} text. Translate it to {target}."),
        None => format!(
            "Detect the language of the text on this page, then translate it directly to {target}."
        ),
    };

    format!(
        r#"You are an expert translator. {lang_instruction}

Follow these rules precisely:

1. Read and extract ALL the text from this page image.
2. Translate it accurately and completely to {target}; do not leave
   fragments in the original language.
3. Maintain the original structure: paragraphs, headings, and lists as
   they appear on the page.
4. Preserve the meaning, tone, and cultural context.
5. Output ONLY the {target} translation: no commentary, no explanations,
   no code fences, no language labels, no "Page X" markers."#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_source_names_both_languages() {
        let p = build_instruction(Some("Gujarati"), "English");
        assert!(p.contains("Gujarati text"));
        assert!(p.contains("Translate it to English"));
    }

    #[test]
    fn auto_detect_asks_for_direct_translation() {
        let p = build_instruction(None, "Hindi");
        assert!(p.contains("Detect the language"));
        assert!(p.contains("translate it directly to Hindi"));
        // The detected language must not be requested back.
        assert!(!p.to_lowercase().contains("detected:"));
    }

    #[test]
    fn instruction_forbids_commentary() {
        let p = build_instruction(None, "English");
        assert!(p.contains("ONLY the English translation"));
        assert!(p.contains("no commentary"));
    }

    #[test]
    fn instruction_is_deterministic() {
        assert_eq!(
            build_instruction(Some("Tamil"), "English"),
            build_instruction(Some("Tamil"), "English")
        );
    }
}
