//! VLM interaction: send a page image, get DocTags back.
//!
//! The provider is an external collaborator; this stage only builds the
//! request, bounds each attempt with a timeout, and retries with exponential
//! backoff (`retry_backoff_ms * 2^attempt`). With the defaults the wait
//! sequence is 500 ms → 1 s → 2 s.

use super::postprocess::clean_doctags_response;
use crate::config::PipelineConfig;
use crate::error::PageError;
use crate::prompts::system_prompt_for;
use edgequake_llm::{ChatMessage, CompletionOptions, ImageData, LLMProvider};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// A successful VLM answer for one page.
#[derive(Debug, Clone)]
pub struct DocTagsReply {
    /// Cleaned response, trimmed to the `<doctag>` block when one is present.
    pub doctags: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub duration_ms: u64,
    pub retries: u8,
}

/// Ask the model for the DocTags of one page image.
///
/// # Message layout
/// 1. System message with the DocTags grammar, omitted for models trained
///    on DocTags (they expect the bare instruction)
/// 2. User message: `config.prompt` plus the page PNG
///
/// # Errors
/// [`PageError::Timeout`] when the last attempt timed out, otherwise
/// [`PageError::LlmFailed`] with the last provider error.
pub async fn request_doctags(
    provider: &Arc<dyn LLMProvider>,
    page_num: usize,
    image_data: ImageData,
    config: &PipelineConfig,
) -> Result<DocTagsReply, PageError> {
    let start = Instant::now();
    let messages = build_messages(image_data, config);
    let options = build_options(config);
    let deadline = Duration::from_secs(config.api_timeout_secs);

    let mut last_err = PageError::LlmFailed {
        page: page_num,
        retries: 0,
        detail: "no attempt made".to_string(),
    };

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let backoff = config.retry_backoff_ms * 2u64.pow(attempt - 1);
            warn!(
                "Page {}: retry {}/{} after {}ms",
                page_num, attempt, config.max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        match timeout(deadline, provider.chat(&messages, Some(&options))).await {
            Ok(Ok(response)) => {
                let duration = start.elapsed();
                debug!(
                    "Page {}: {} input tokens, {} output tokens, {:?}",
                    page_num, response.prompt_tokens, response.completion_tokens, duration
                );
                return Ok(DocTagsReply {
                    doctags: clean_doctags_response(&response.content),
                    input_tokens: response.prompt_tokens,
                    output_tokens: response.completion_tokens,
                    duration_ms: duration.as_millis() as u64,
                    retries: attempt as u8,
                });
            }
            Ok(Err(e)) => {
                warn!("Page {}: attempt {} failed: {}", page_num, attempt + 1, e);
                last_err = PageError::LlmFailed {
                    page: page_num,
                    retries: config.max_retries as u8,
                    detail: e.to_string(),
                };
            }
            Err(_) => {
                warn!(
                    "Page {}: attempt {} timed out after {}s",
                    page_num,
                    attempt + 1,
                    config.api_timeout_secs
                );
                last_err = PageError::Timeout {
                    page: page_num,
                    secs: config.api_timeout_secs,
                };
            }
        }
    }

    Err(last_err)
}

fn build_messages(image_data: ImageData, config: &PipelineConfig) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = system_prompt_for(config.model.as_deref()) {
        messages.push(ChatMessage::system(system));
    }
    messages.push(ChatMessage::user_with_images(
        config.prompt.as_str(),
        vec![image_data],
    ));
    messages
}

fn build_options(config: &PipelineConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_options_defaults() {
        let opts = build_options(&PipelineConfig::default());
        assert_eq!(opts.temperature, Some(0.0));
        assert_eq!(opts.max_tokens, Some(4096));
    }

    #[test]
    fn native_model_gets_single_message() {
        let config = PipelineConfig::builder()
            .model("granite-docling-258M")
            .build()
            .expect("config");
        let img = ImageData::new("AAAA".to_string(), "image/png");
        assert_eq!(build_messages(img, &config).len(), 1);
    }

    #[test]
    fn general_model_gets_system_prompt() {
        let config = PipelineConfig::builder()
            .model("gpt-4.1-mini")
            .build()
            .expect("config");
        let img = ImageData::new("AAAA".to_string(), "image/png");
        assert_eq!(build_messages(img, &config).len(), 2);
    }
}
