//! Model invocation against Anthropic models hosted on AWS Bedrock
//!
//! Provides the [`ModelInvoker`] seam, its Bedrock implementations (AWS SDK
//! with SigV4 credentials, or plain HTTPS with a Bedrock API key), a scripted
//! mock, and the payload builder that assembles request documents.

pub mod bedrock;
pub mod mock;
pub mod payload;

pub use bedrock::{BedrockHttpInvoker, BedrockSdkInvoker};
pub use mock::MockInvoker;
pub use payload::{InferenceParams, PayloadBuilder};

use crate::models::{ModelResponse, Payload};
use crate::{Error, Result};
use async_trait::async_trait;
use tracing::Span;

#[async_trait]
pub trait ModelInvoker: Send + Sync {
    async fn invoke(&self, payload: &Payload) -> Result<ModelResponse>;
}

/// Span wrapping one model call; usage fields are recorded on completion.
pub(crate) fn invoke_span(model_id: &str, payload: &Payload) -> Span {
    tracing::info_span!(
        "invoke_model",
        model = %model_id,
        content_items = payload.content().len(),
        tools = payload.tools.as_ref().map_or(0, Vec::len),
        input_tokens = tracing::field::Empty,
        output_tokens = tracing::field::Empty
    )
}

pub(crate) fn record_usage(span: &Span, response: &ModelResponse) {
    span.record("input_tokens", response.usage.input_tokens);
    span.record("output_tokens", response.usage.output_tokens);
    tracing::debug!(
        parent: span,
        "Model response: {} content items, stop_reason={:?}",
        response.content.len(),
        response.stop_reason
    );
}

/// Decode a raw response body into the expected envelope.
pub(crate) fn decode_response(body: &[u8]) -> Result<ModelResponse> {
    serde_json::from_slice(body).map_err(|e| {
        tracing::error!(
            "Failed to parse model response: {}\nBody: {}",
            e,
            String::from_utf8_lossy(body)
        );
        Error::Invocation(format!("Failed to parse model response: {}", e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_response_rejects_unexpected_envelope() {
        let err = decode_response(br#"{"choices": []}"#).unwrap_err();
        assert!(matches!(err, Error::Invocation(_)));
    }

    #[test]
    fn test_decode_response_accepts_text_envelope() {
        let response =
            decode_response(br#"{"content":[{"type":"text","text":"hi"}],"usage":{}}"#).unwrap();
        assert_eq!(response.text(), "hi");
    }
}
