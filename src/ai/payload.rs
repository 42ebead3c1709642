use crate::image::ImageNormalizer;
use crate::models::{
    ContentItem, Message, Payload, ToolSpec, ANTHROPIC_VERSION, DEFAULT_MAX_TOKENS,
};

/// Sampling and protocol parameters shared by every request.
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceParams {
    pub anthropic_version: String,
    pub max_tokens: u32,
    pub top_k: u32,
    pub top_p: f32,
    pub temperature: f32,
}

impl Default for InferenceParams {
    fn default() -> Self {
        Self {
            anthropic_version: ANTHROPIC_VERSION.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            top_k: 250,
            top_p: 0.999,
            temperature: 1.0,
        }
    }
}

/// Assembles request documents from text, an optional image, an optional
/// system instruction and optional tool declarations.
#[derive(Default)]
pub struct PayloadBuilder {
    normalizer: ImageNormalizer,
    params: InferenceParams,
}

impl PayloadBuilder {
    pub fn new(normalizer: ImageNormalizer, params: InferenceParams) -> Self {
        Self { normalizer, params }
    }

    pub fn params(&self) -> &InferenceParams {
        &self.params
    }

    /// Build a single-message payload.
    ///
    /// Only `images[0]` is used; the rest are dropped to keep the request
    /// under the endpoint's size ceiling. An image that fails to normalize is
    /// omitted rather than failing the build.
    pub fn build(
        &self,
        text: &str,
        images: &[Vec<u8>],
        system: Option<&str>,
        tools: Option<Vec<ToolSpec>>,
    ) -> Payload {
        let mut content = vec![ContentItem::text(text)];

        if let Some(first) = images.first() {
            if images.len() > 1 {
                tracing::debug!(
                    "Dropping {} additional image(s); one image per request",
                    images.len() - 1
                );
            }

            match self.normalizer.normalize(first) {
                Ok(image) => content.push(ContentItem::image(&image)),
                Err(e) => tracing::warn!("Skipping image that could not be processed: {}", e),
            }
        }

        Payload {
            anthropic_version: self.params.anthropic_version.clone(),
            max_tokens: self.params.max_tokens,
            top_k: self.params.top_k,
            top_p: self.params.top_p,
            temperature: self.params.temperature,
            stop_sequences: Vec::new(),
            messages: vec![Message {
                role: "user".to_string(),
                content,
            }],
            system: system.map(str::to_string),
            tools,
        }
    }
}
