//! services/api/src/adapters/vision.rs
//!
//! This module contains the adapter for the wine-label vision model.
//! It implements the `ExtractionService` port from the `core` crate.

const SCAN_PROMPT: &str = "You are an AI for an online wine cellar. Your job is to scan and \
determine the exact bottle of wine in the image. Provide the following information in a \
structured format:\n\nWine Name:\nType: (choose from Red, Sparkling, White, Rose, Dessert, \
Fortified)\nRegion:\nDescription: (2-3 sentences about the wine and its characteristics in a \
conversational tone.). DO NOT USE ASTERISKS * OR OTHER MARKUP.";

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestMessageContentPartImageArgs,
        ChatCompletionRequestMessageContentPartTextArgs, ChatCompletionRequestUserMessageArgs,
        ChatCompletionRequestUserMessageContentPart, CreateChatCompletionRequestArgs,
        ImageUrlArgs,
    },
    Client,
};
use async_trait::async_trait;
use cellar_core::{
    domain::{normalize_wine_type, DraftRecord},
    ports::{ExtractionService, PortError, PortResult},
};
use regex::Regex;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `ExtractionService` using an OpenAI-compatible
/// vision model.
#[derive(Clone)]
pub struct OpenAiVisionAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiVisionAdapter {
    /// Creates a new `OpenAiVisionAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }
}

//=========================================================================================
// Response Parsing
//=========================================================================================

fn capture_after(output: &str, pattern: &str) -> Option<String> {
    Regex::new(pattern)
        .unwrap()
        .captures(output)
        .map(|caps| caps[1].trim().to_string())
}

/// Parses the model's plain-text output into a draft record.
///
/// Tolerant by contract: each field is taken from its label up to the next
/// line (description runs to end of output), a missing label degrades to a
/// default, and the type is normalized against the allow-list. Parsing
/// never fails.
fn parse_scan_output(output: &str) -> DraftRecord {
    let name = capture_after(output, r"Wine Name:(.*)");
    let wine_type = capture_after(output, r"Type:(.*)");
    let region = capture_after(output, r"Region:(.*)");
    let description = capture_after(output, r"(?s)Description:(.*)");

    DraftRecord {
        name: name.unwrap_or_else(|| "Unknown".to_string()),
        wine_type: wine_type
            .map(|t| normalize_wine_type(&t))
            .unwrap_or_else(|| "Other".to_string()),
        region: region.unwrap_or_else(|| "Unknown".to_string()),
        description: description.unwrap_or_else(|| "No description available.".to_string()),
    }
}

//=========================================================================================
// `ExtractionService` Trait Implementation
//=========================================================================================

#[async_trait]
impl ExtractionService for OpenAiVisionAdapter {
    /// Sends the image plus the fixed instruction prompt to the vision
    /// model and parses the reply into a draft record. Only transport and
    /// auth failures propagate; parse ambiguity never does.
    async fn extract(&self, image_url: &str) -> PortResult<DraftRecord> {
        let content_parts: Vec<ChatCompletionRequestUserMessageContentPart> = vec![
            ChatCompletionRequestMessageContentPartTextArgs::default()
                .text(SCAN_PROMPT)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestMessageContentPartImageArgs::default()
                .image_url(
                    ImageUrlArgs::default()
                        .url(image_url)
                        .build()
                        .map_err(|e| PortError::Unexpected(e.to_string()))?,
                )
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let messages = vec![ChatCompletionRequestUserMessageArgs::default()
            .content(content_parts)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .into()];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .max_tokens(300u32)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        // Call the API and manually map the error if it occurs, which respects the orphan rule.
        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Extraction(e.to_string()))?;

        let output = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        Ok(parse_scan_output(&output))
    }
}
