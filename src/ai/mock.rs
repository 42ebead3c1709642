use super::ModelInvoker;
use crate::models::{ModelResponse, Payload};
use crate::{Error, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Scripted invoker for tests and offline runs.
///
/// Clones share state, so a clone kept by a test observes calls made through
/// the original.
#[derive(Clone)]
pub struct MockInvoker {
    responses: Arc<Mutex<Vec<ModelResponse>>>,
    calls: Arc<Mutex<Vec<Payload>>>,
    should_fail: Arc<Mutex<bool>>,
}

impl MockInvoker {
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(Vec::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            should_fail: Arc::new(Mutex::new(false)),
        }
    }

    pub fn with_response(self, response: ModelResponse) -> Self {
        self.responses.lock().unwrap().push(response);
        self
    }

    pub fn with_text_response(self, text: &str) -> Self {
        self.with_response(ModelResponse::from_text(text))
    }

    /// Queue a `tool_use` response carrying `structured_data` the way the
    /// extraction tool returns it.
    pub fn with_structured_response(self, structured_data: serde_json::Value) -> Self {
        self.with_response(ModelResponse::from_tool_use(
            "extract_structured_data",
            serde_json::json!({ "structuredData": structured_data }),
        ))
    }

    pub fn with_failure(self, should_fail: bool) -> Self {
        *self.should_fail.lock().unwrap() = should_fail;
        self
    }

    pub fn get_call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Payloads received so far, in call order.
    pub fn calls(&self) -> Vec<Payload> {
        self.calls.lock().unwrap().clone()
    }
}

impl Default for MockInvoker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ModelInvoker for MockInvoker {
    async fn invoke(&self, payload: &Payload) -> Result<ModelResponse> {
        let count = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(payload.clone());
            calls.len()
        };

        if *self.should_fail.lock().unwrap() {
            return Err(Error::Invocation("Mock failure".to_string()));
        }

        let responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(ModelResponse::from_text("Mock response"))
        } else {
            let index = (count - 1) % responses.len();
            Ok(responses[index].clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::PayloadBuilder;

    fn payload(text: &str) -> Payload {
        PayloadBuilder::default().build(text, &[], None, None)
    }

    #[tokio::test]
    async fn test_mock_invoker_default_response() {
        let invoker = MockInvoker::new();
        let response = invoker.invoke(&payload("hi")).await.unwrap();
        assert_eq!(response.text(), "Mock response");
    }

    #[tokio::test]
    async fn test_mock_invoker_cycles_responses() {
        let invoker = MockInvoker::new()
            .with_text_response("first")
            .with_text_response("second");

        assert_eq!(invoker.invoke(&payload("a")).await.unwrap().text(), "first");
        assert_eq!(invoker.invoke(&payload("b")).await.unwrap().text(), "second");
        assert_eq!(invoker.invoke(&payload("c")).await.unwrap().text(), "first");
    }

    #[tokio::test]
    async fn test_mock_invoker_records_calls_across_clones() {
        let invoker = MockInvoker::new();
        let probe = invoker.clone();

        assert_eq!(probe.get_call_count(), 0);
        invoker.invoke(&payload("question")).await.unwrap();

        assert_eq!(probe.get_call_count(), 1);
        assert_eq!(probe.calls()[0].prompt_text(), "question");
    }

    #[test]
    fn test_mock_invoker_failure() {
        let invoker = MockInvoker::new().with_failure(true);
        let result = tokio_test::block_on(invoker.invoke(&payload("x")));
        assert!(matches!(result, Err(Error::Invocation(_))));
        assert_eq!(invoker.get_call_count(), 1);
    }
}
