use crate::ai::{decode_response, invoke_span, record_usage, ModelInvoker};
use crate::models::{ModelResponse, Payload};
use crate::{Error, Result};
use async_trait::async_trait;
use aws_config::timeout::TimeoutConfig;
use aws_config::BehaviorVersion;
use aws_sdk_bedrockruntime::error::DisplayErrorContext;
use aws_sdk_bedrockruntime::primitives::Blob;
use aws_sdk_bedrockruntime::{config::Region, Client as BedrockClient};
use std::time::Duration;
use tracing::Instrument;

/// Invokes models through the AWS SDK, resolving credentials from the default
/// provider chain (environment, profile, SSO, instance metadata).
pub struct BedrockSdkInvoker {
    client: BedrockClient,
    model_id: String,
}

impl BedrockSdkInvoker {
    /// `timeout` bounds each whole operation; `None` keeps the SDK defaults.
    pub async fn new(region: String, model_id: String, timeout: Option<Duration>) -> Result<Self> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest()).region(Region::new(region));
        if let Some(timeout) = timeout {
            loader = loader.timeout_config(
                TimeoutConfig::builder().operation_timeout(timeout).build(),
            );
        }
        let config = loader.load().await;

        Ok(Self::with_client(BedrockClient::new(&config), model_id))
    }

    pub fn with_client(client: BedrockClient, model_id: String) -> Self {
        Self { client, model_id }
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }
}

#[async_trait]
impl ModelInvoker for BedrockSdkInvoker {
    async fn invoke(&self, payload: &Payload) -> Result<ModelResponse> {
        let span = invoke_span(&self.model_id, payload);
        let body = serde_json::to_vec(payload)?;

        let output = self
            .client
            .invoke_model()
            .model_id(&self.model_id)
            .content_type("application/json")
            .accept("application/json")
            .body(Blob::new(body))
            .send()
            .instrument(span.clone())
            .await
            .map_err(|e| {
                let message = format!("{}", DisplayErrorContext(&e));
                tracing::error!(parent: &span, "Bedrock InvokeModel failed: {}", message);
                Error::Invocation(format!("Bedrock InvokeModel failed: {}", message))
            })?;

        let response = decode_response(output.body().as_ref())?;
        record_usage(&span, &response);
        Ok(response)
    }
}
