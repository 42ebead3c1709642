use crate::ai::{decode_response, invoke_span, record_usage, ModelInvoker};
use crate::models::{ModelResponse, Payload};
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::{Client, Url};
use std::time::Duration;
use tracing::Instrument;

/// Invokes models over plain HTTPS using a Bedrock API key as bearer token.
pub struct BedrockHttpInvoker {
    client: Client,
    api_key: String,
    model_id: String,
    base_url: String,
    timeout: Option<Duration>,
}

impl BedrockHttpInvoker {
    pub fn new(api_key: String, region: &str, model_id: String) -> Self {
        Self::new_with_client(api_key, region, model_id, Client::new())
    }

    pub fn new_with_client(api_key: String, region: &str, model_id: String, client: Client) -> Self {
        Self {
            client,
            api_key,
            model_id,
            base_url: format!("https://bedrock-runtime.{}.amazonaws.com", region),
            timeout: None,
        }
    }

    /// Point at a different runtime endpoint (VPC endpoint, proxy, test server).
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    /// Bound each request; unset means the call may take as long as the endpoint does.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// `{base}/model/{model_id}/invoke`, with the model ID encoded as one path
    /// segment so inference-profile ARNs keep their `/`.
    fn invoke_url(&self) -> Result<Url> {
        let mut url = Url::parse(&self.base_url).map_err(|e| {
            Error::Config(format!("Invalid Bedrock endpoint '{}': {}", self.base_url, e))
        })?;
        url.path_segments_mut()
            .map_err(|_| {
                Error::Config(format!(
                    "Bedrock endpoint '{}' cannot take a path",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .extend(["model", self.model_id.as_str(), "invoke"]);
        Ok(url)
    }

    async fn post(&self, payload: &Payload) -> Result<ModelResponse> {
        let mut request = self
            .client
            .post(self.invoke_url()?)
            .bearer_auth(&self.api_key)
            .header("Accept", "application/json")
            .json(payload);
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await.map_err(|e| {
            tracing::error!("Failed to send request to Bedrock: {}", e);
            Error::Invocation(format!("Failed to send request to Bedrock: {}", e))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!("Bedrock API error (status {}): {}", status, error_text);
            return Err(Error::Invocation(format!(
                "Bedrock API error (status {}): {}",
                status, error_text
            )));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Invocation(format!("Failed to read Bedrock response: {}", e)))?;
        decode_response(&body)
    }
}

#[async_trait]
impl ModelInvoker for BedrockHttpInvoker {
    async fn invoke(&self, payload: &Payload) -> Result<ModelResponse> {
        let span = invoke_span(&self.model_id, payload);
        let response = self.post(payload).instrument(span.clone()).await?;
        record_usage(&span, &response);
        Ok(response)
    }
}
