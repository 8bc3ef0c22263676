//! Gemini vision extraction through the OpenAI-compatible chat endpoint.

use super::{parse_extraction, PageExtraction, PageExtractor};
use crate::config::{GeminiSettings, OcrSettings};
use crate::error::{FinragError, Result};
use crate::gemini::{create_client, GeminiClient};
use crate::ingest::detect_image_format;
use async_openai::types::{
    ChatCompletionRequestMessageContentPartImageArgs, ChatCompletionRequestMessageContentPartTextArgs,
    ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContentPart,
    CreateChatCompletionRequestArgs, ImageUrlArgs, ResponseFormat,
};
use async_trait::async_trait;
use base64::Engine as _;
use tracing::{debug, info, instrument};

/// Page extractor backed by a Gemini vision model.
pub struct GeminiOcr {
    client: GeminiClient,
    model: String,
    instruction: String,
    temperature: f32,
}

impl GeminiOcr {
    /// Create an extractor from settings and the rendered OCR instruction.
    pub fn new(gemini: &GeminiSettings, ocr: &OcrSettings, instruction: &str) -> Result<Self> {
        Ok(Self::with_client(create_client(gemini)?, &ocr.model, instruction, ocr.temperature))
    }

    /// Create an extractor around an existing client.
    pub fn with_client(client: GeminiClient, model: &str, instruction: &str, temperature: f32) -> Self {
        Self {
            client,
            model: model.to_string(),
            instruction: instruction.to_string(),
            temperature,
        }
    }

    /// Encode an image as a data URI.
    fn data_uri(mime_type: &str, image: &[u8]) -> String {
        format!(
            "data:{};base64,{}",
            mime_type,
            base64::engine::general_purpose::STANDARD.encode(image)
        )
    }
}

#[async_trait]
impl PageExtractor for GeminiOcr {
    #[instrument(skip(self, image), fields(model = %self.model, bytes = image.len()))]
    async fn extract(&self, image: &[u8]) -> Result<PageExtraction> {
        info!("Processing document...");
        let mime_type = detect_image_format(image)?;

        let text_part = ChatCompletionRequestMessageContentPartTextArgs::default()
            .text(self.instruction.clone())
            .build()
            .map_err(|e| FinragError::Ocr(e.to_string()))?;

        let image_url = ImageUrlArgs::default()
            .url(Self::data_uri(mime_type, image))
            .build()
            .map_err(|e| FinragError::Ocr(e.to_string()))?;

        let image_part = ChatCompletionRequestMessageContentPartImageArgs::default()
            .image_url(image_url)
            .build()
            .map_err(|e| FinragError::Ocr(e.to_string()))?;

        let parts: Vec<ChatCompletionRequestUserMessageContentPart> =
            vec![text_part.into(), image_part.into()];

        let message = ChatCompletionRequestUserMessageArgs::default()
            .content(parts)
            .build()
            .map_err(|e| FinragError::Ocr(e.to_string()))?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(vec![message.into()])
            .response_format(ResponseFormat::JsonObject)
            .temperature(self.temperature)
            .build()
            .map_err(|e| FinragError::Ocr(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| FinragError::Gemini(format!("Vision request failed: {}", e)))?;

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.as_ref())
            .ok_or_else(|| FinragError::Ocr("Empty response from vision model".to_string()))?;

        debug!("Extraction response: {} chars", content.len());

        let extraction = parse_extraction(content)?;
        info!("Document processing successful.");
        Ok(extraction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::create_client_with_key;

    #[test]
    fn test_data_uri() {
        assert_eq!(GeminiOcr::data_uri("image/png", b"abc"), "data:image/png;base64,YWJj");
    }

    #[tokio::test]
    async fn test_rejects_unknown_image_before_calling_model() {
        let client = create_client_with_key(&GeminiSettings::default(), "test-key").unwrap();
        let ocr = GeminiOcr::with_client(client, "gemini-2.0-flash-lite", "extract", 0.0);
        let result = ocr.extract(b"%PDF-1.4 not an image").await;
        assert!(matches!(result, Err(FinragError::Ocr(_))));
    }
}
