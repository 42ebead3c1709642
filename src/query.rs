//! Two-stage structured query
//!
//! The first call forces the model to answer through a declared tool whose
//! input schema wraps the caller's schema, yielding machine-readable data.
//! The second, independent call asks for a short prose explanation of that
//! data. Follow-up questions reuse cached data with a single call.

use crate::ai::{ModelInvoker, PayloadBuilder};
use crate::models::{ModelResponse, ToolSpec};
use crate::prompts::{self, DEFAULT_QUESTION};
use crate::{Error, Result};
use serde_json::{json, Value};

pub const EXTRACTION_TOOL_NAME: &str = "extract_structured_data";

/// Result of [`StructuredQuery::extract_and_explain`].
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub structured_data: Value,
    pub explanation: String,
}

pub struct StructuredQuery {
    invoker: Box<dyn ModelInvoker>,
    builder: PayloadBuilder,
}

impl StructuredQuery {
    pub fn new(invoker: Box<dyn ModelInvoker>, builder: PayloadBuilder) -> Self {
        Self { invoker, builder }
    }

    pub async fn extract_and_explain(
        &self,
        text: &str,
        schema: &Value,
        images: &[Vec<u8>],
    ) -> Result<Extraction> {
        let question = question_or_default(text);

        let payload = self.builder.build(
            question,
            images,
            Some(prompts::EXTRACTION_SYSTEM),
            Some(vec![extraction_tool(schema)]),
        );
        let response = self.invoker.invoke(&payload).await?;
        let structured_data = structured_data_from(&response)?;
        tracing::info!("Extracted structured data");

        let data = serde_json::to_string_pretty(&structured_data)?;
        let prompt = prompts::render(
            prompts::EXPLANATION_USER,
            &[("data", &data), ("question", question)],
        );
        let payload = self
            .builder
            .build(&prompt, &[], Some(prompts::EXPLANATION_SYSTEM), None);
        let explanation = self.invoker.invoke(&payload).await?.text();

        Ok(Extraction {
            structured_data,
            explanation,
        })
    }

    /// Answer a text-only question about previously extracted data.
    ///
    /// `history` is an optional consumption summary appended to the prompt.
    pub async fn follow_up(
        &self,
        cached: &Value,
        question: &str,
        history: Option<&str>,
    ) -> Result<String> {
        let data = serde_json::to_string_pretty(cached)?;
        let history = history
            .map(|h| format!("\nUser's consumption history:\n{}\n", h))
            .unwrap_or_default();
        let prompt = prompts::render(
            prompts::FOLLOW_UP_USER,
            &[
                ("data", &data),
                ("history", &history),
                ("question", question_or_default(question)),
            ],
        );

        let payload = self
            .builder
            .build(&prompt, &[], Some(prompts::EXPLANATION_SYSTEM), None);
        Ok(self.invoker.invoke(&payload).await?.text())
    }
}

fn question_or_default(text: &str) -> &str {
    if text.trim().is_empty() {
        DEFAULT_QUESTION
    } else {
        text
    }
}

/// Tool whose only input field, `structuredData`, follows the caller's schema.
pub fn extraction_tool(schema: &Value) -> ToolSpec {
    let mut structured = schema.clone();
    if let Value::Object(map) = &mut structured {
        map.entry("type").or_insert_with(|| json!("object"));
    }

    ToolSpec {
        name: EXTRACTION_TOOL_NAME.to_string(),
        description: "Record the structured information extracted from the user's request."
            .to_string(),
        input_schema: json!({
            "type": "object",
            "properties": { "structuredData": structured },
            "required": ["structuredData"]
        }),
    }
}

fn structured_data_from(response: &ModelResponse) -> Result<Value> {
    match response
        .first_tool_use()
        .and_then(|(_, input)| input.get("structuredData"))
    {
        Some(data) => Ok(data.clone()),
        None => {
            let raw = serde_json::to_string(response)?;
            tracing::warn!("Model produced no structured data. Raw response: {}", raw);
            Err(Error::Extraction {
                reason: "no structured data produced".to_string(),
                raw,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::MockInvoker;
    use crate::models::ContentItem;

    fn query(invoker: &MockInvoker) -> StructuredQuery {
        StructuredQuery::new(Box::new(invoker.clone()), PayloadBuilder::default())
    }

    fn schema() -> Value {
        json!({ "properties": { "name": { "type": "string" } } })
    }

    #[tokio::test]
    async fn test_extract_and_explain_returns_tool_data_and_explanation() {
        let invoker = MockInvoker::new()
            .with_structured_response(json!({ "name": "Apple" }))
            .with_text_response("An apple is a crunchy fruit.");

        let result = query(&invoker)
            .extract_and_explain("What is this?", &schema(), &[])
            .await
            .unwrap();

        assert_eq!(result.structured_data, json!({ "name": "Apple" }));
        assert_eq!(result.explanation, "An apple is a crunchy fruit.");
        assert_eq!(invoker.get_call_count(), 2);
    }

    #[tokio::test]
    async fn test_extraction_stage_declares_tool_and_second_stage_does_not() {
        let invoker = MockInvoker::new()
            .with_structured_response(json!({ "name": "Apple" }))
            .with_text_response("Explained.");

        query(&invoker)
            .extract_and_explain("Tell me about it", &schema(), &[])
            .await
            .unwrap();

        let calls = invoker.calls();
        let tools = calls[0].tools.as_ref().unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name, EXTRACTION_TOOL_NAME);
        assert_eq!(
            tools[0].input_schema["properties"]["structuredData"]["properties"]["name"]["type"],
            "string"
        );
        assert_eq!(calls[0].system.as_deref(), Some(prompts::EXTRACTION_SYSTEM));
        assert_eq!(calls[0].content(), &[ContentItem::text("Tell me about it")]);

        assert!(calls[1].tools.is_none());
        assert_eq!(calls[1].system.as_deref(), Some(prompts::EXPLANATION_SYSTEM));
        let prompt = calls[1].prompt_text();
        assert!(prompt.contains("\"name\": \"Apple\""));
        assert!(prompt.contains("Tell me about it"));
    }

    #[tokio::test]
    async fn test_missing_tool_use_is_extraction_error() {
        let invoker = MockInvoker::new().with_text_response("I think it's an apple.");

        let err = query(&invoker)
            .extract_and_explain("What is this?", &schema(), &[])
            .await
            .unwrap_err();

        match err {
            Error::Extraction { reason, raw } => {
                assert_eq!(reason, "no structured data produced");
                assert!(raw.contains("I think it's an apple."));
            }
            other => panic!("expected extraction error, got {:?}", other),
        }
        assert_eq!(invoker.get_call_count(), 1);
    }

    #[tokio::test]
    async fn test_tool_use_without_structured_data_field_is_extraction_error() {
        let invoker = MockInvoker::new().with_response(ModelResponse::from_tool_use(
            EXTRACTION_TOOL_NAME,
            json!({ "name": "Apple" }),
        ));

        let err = query(&invoker)
            .extract_and_explain("What is this?", &schema(), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Extraction { .. }));
    }

    #[tokio::test]
    async fn test_invocation_failure_propagates() {
        let invoker = MockInvoker::new().with_failure(true);

        let err = query(&invoker)
            .extract_and_explain("What is this?", &schema(), &[])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Invocation(_)));
    }

    #[tokio::test]
    async fn test_blank_question_uses_default() {
        let invoker = MockInvoker::new()
            .with_structured_response(json!({ "name": "Apple" }))
            .with_text_response("Explained.");

        query(&invoker)
            .extract_and_explain("   ", &schema(), &[])
            .await
            .unwrap();

        assert_eq!(invoker.calls()[0].prompt_text(), DEFAULT_QUESTION);
    }

    #[tokio::test]
    async fn test_follow_up_embeds_cached_data_in_single_call() {
        let invoker = MockInvoker::new().with_text_response("Bananas are rich in potassium.");
        let cached = json!({ "product": { "name": "Banana" } });

        let answer = query(&invoker)
            .follow_up(&cached, "Is it healthy?", None)
            .await
            .unwrap();

        assert_eq!(answer, "Bananas are rich in potassium.");
        assert_eq!(invoker.get_call_count(), 1);
        let call = &invoker.calls()[0];
        assert!(call.tools.is_none());
        let prompt = call.prompt_text();
        assert!(prompt.contains(&serde_json::to_string_pretty(&cached).unwrap()));
        assert!(prompt.contains("Is it healthy?"));
        assert!(!prompt.contains("consumption history"));
    }

    #[tokio::test]
    async fn test_follow_up_includes_history_when_given() {
        let invoker = MockInvoker::new();
        let cached = json!({ "product": { "name": "Banana" } });

        query(&invoker)
            .follow_up(&cached, "How am I doing today?", Some("1. Banana: 105 kcal"))
            .await
            .unwrap();

        let prompt = invoker.calls()[0].prompt_text();
        assert!(prompt.contains("User's consumption history:"));
        assert!(prompt.contains("1. Banana: 105 kcal"));
    }

    #[test]
    fn test_extraction_tool_keeps_existing_type() {
        let tool = extraction_tool(&json!({ "type": "object", "properties": {} }));
        assert_eq!(tool.input_schema["required"], json!(["structuredData"]));
        assert_eq!(
            tool.input_schema["properties"]["structuredData"]["type"],
            "object"
        );
    }
}
