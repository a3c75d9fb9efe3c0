//! Translation-request construction.
//!
//! A [`TranslationRequest`] is everything one model call needs: the model
//! id, the instruction text, the page image as a data-URL, and the sampling
//! parameters. Construction is deterministic (identical inputs produce an
//! identical request), so requests are reproducible for testing, and it
//! never touches the network.

use crate::config::TranslationConfig;
use crate::error::TranslateError;
use crate::prompts;

/// One fully-assembled model request for a single page.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslationRequest {
    /// Remote model identifier.
    pub model: String,
    /// Instruction text sent with the image.
    pub instruction: String,
    /// Page image as a `data:image/png;base64,…` URL.
    pub image_data_url: String,
    pub temperature: f32,
    pub max_tokens: usize,
}

/// Validate the run parameters the request builder depends on.
///
/// Called once by the runner before any page work begins: an empty model
/// id or target language cannot succeed for any page, so it aborts the
/// whole run rather than failing page by page.
pub fn validate_config(config: &TranslationConfig) -> Result<(), TranslateError> {
    if config.model.trim().is_empty() {
        return Err(TranslateError::InvalidConfig(
            "model id must not be empty".into(),
        ));
    }
    if config.target_language.trim().is_empty() {
        return Err(TranslateError::InvalidConfig(
            "target language must not be empty".into(),
        ));
    }
    Ok(())
}

/// Build the request for one page image.
pub fn build_request(
    image_data_url: String,
    config: &TranslationConfig,
) -> Result<TranslationRequest, TranslateError> {
    validate_config(config)?;

    let instruction = prompts::build_instruction(
        config.effective_source_language(),
        &config.target_language,
    );

    Ok(TranslationRequest {
        model: config.model.clone(),
        instruction,
        image_data_url,
        temperature: config.temperature,
        max_tokens: config.max_tokens,
    })
}
