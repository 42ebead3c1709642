//! Message handling at the chat boundary.
//!
//! Routes each incoming message to extraction, follow-up or cold-start
//! guidance, updates the session on success and turns failures into a
//! user-visible error reply.

use crate::ai::{
    BedrockHttpInvoker, BedrockSdkInvoker, InferenceParams, ModelInvoker, PayloadBuilder,
};
use crate::format::{format_consumption, format_response};
use crate::image::ImageNormalizer;
use crate::models::Config;
use crate::prompts::{COLD_START_GUIDANCE, GENERIC_ERROR_MESSAGE, NOTHING_TO_KEEP};
use crate::query::StructuredQuery;
use crate::session::Session;
use crate::{schema, Result};
use serde_json::Value;
use std::time::Duration;
use tracing::{error, info, warn};

pub const KEEP_PRODUCT_ACTION: &str = "keep_product";
pub const SHOW_SUMMARY_ACTION: &str = "show_summary";

/// A user message: text plus any attached encoded images.
#[derive(Debug, Clone, Default)]
pub struct IncomingMessage {
    pub text: String,
    pub images: Vec<Vec<u8>>,
}

impl IncomingMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            images: Vec::new(),
        }
    }

    pub fn with_image(mut self, image: Vec<u8>) -> Self {
        self.images.push(image);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DisplayElement {
    StructuredData(Value),
}

/// Button offered with a reply; sent back through [`App::handle_action`].
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    pub name: String,
    pub label: String,
    pub payload: Value,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Reply {
    pub display_text: String,
    pub elements: Vec<DisplayElement>,
    pub actions: Vec<Action>,
}

impl Reply {
    pub fn text(display_text: impl Into<String>) -> Self {
        Self {
            display_text: display_text.into(),
            ..Default::default()
        }
    }
}

pub struct App {
    query: StructuredQuery,
    schema: Value,
}

impl App {
    /// Build an app from a concrete invoker; used by tests and harnesses that
    /// inject mocks.
    pub fn with_services(invoker: Box<dyn ModelInvoker>, builder: PayloadBuilder, schema: Value) -> Self {
        Self {
            query: StructuredQuery::new(invoker, builder),
            schema,
        }
    }

    /// Construct an app from configuration, picking the invoker by available
    /// credentials.
    pub async fn new(config: &Config) -> Result<Self> {
        let timeout = config.request_timeout_secs.map(Duration::from_secs);
        let invoker: Box<dyn ModelInvoker> = match &config.bedrock_api_key {
            Some(api_key) => {
                info!("Invoker: Bedrock HTTPS with API key (model: {})", config.model_id);
                let invoker = BedrockHttpInvoker::new(
                    api_key.clone(),
                    &config.aws_region,
                    config.model_id.clone(),
                );
                let invoker = match timeout {
                    Some(timeout) => invoker.with_timeout(timeout),
                    None => invoker,
                };
                Box::new(match &config.bedrock_endpoint {
                    Some(endpoint) => invoker.with_base_url(endpoint.clone()),
                    None => invoker,
                })
            }
            None => {
                info!("Invoker: Bedrock SDK (model: {})", config.model_id);
                Box::new(
                    BedrockSdkInvoker::new(
                        config.aws_region.clone(),
                        config.model_id.clone(),
                        timeout,
                    )
                    .await?,
                )
            }
        };

        let normalizer = ImageNormalizer::new(config.image_max_dimension)
            .with_budget_kb(config.image_budget_kb);
        let params = InferenceParams {
            max_tokens: config.max_tokens,
            ..InferenceParams::default()
        };
        let schema = schema::load(config.schema_path.as_deref())?;

        Ok(Self::with_services(
            invoker,
            PayloadBuilder::new(normalizer, params),
            schema,
        ))
    }

    /// Handle one message. Never fails: errors become a generic reply and the
    /// session is left as it was.
    pub async fn handle_message(&self, session: &mut Session, message: IncomingMessage) -> Reply {
        match self.try_handle_message(session, message).await {
            Ok(reply) => reply,
            Err(e) => {
                error!("Session {}: failed to handle message: {}", session.id(), e);
                Reply::text(GENERIC_ERROR_MESSAGE)
            }
        }
    }

    async fn try_handle_message(
        &self,
        session: &mut Session,
        message: IncomingMessage,
    ) -> Result<Reply> {
        if !message.images.is_empty() {
            info!(
                "Session {}: analysing message with {} image(s)",
                session.id(),
                message.images.len()
            );
            let extraction = self
                .query
                .extract_and_explain(&message.text, &self.schema, &message.images)
                .await?;

            let display_text =
                format_response(&extraction.structured_data, &extraction.explanation);
            session.set_structured_result(extraction.structured_data.clone());

            return Ok(Reply {
                display_text,
                elements: vec![DisplayElement::StructuredData(
                    extraction.structured_data.clone(),
                )],
                actions: vec![Action {
                    name: KEEP_PRODUCT_ACTION.to_string(),
                    label: "I consumed this".to_string(),
                    payload: extraction.structured_data,
                }],
            });
        }

        if let Some(cached) = session.structured_result() {
            info!("Session {}: answering follow-up question", session.id());
            let history = if session.ledger().is_empty() {
                None
            } else {
                Some(format_consumption(session.ledger()))
            };
            let answer = self
                .query
                .follow_up(cached, &message.text, history.as_deref())
                .await?;
            return Ok(Reply::text(answer));
        }

        info!("Session {}: no image and no product yet", session.id());
        Ok(Reply::text(COLD_START_GUIDANCE))
    }

    /// Handle a button press from a previous reply.
    pub fn handle_action(&self, session: &mut Session, action: &Action) -> Reply {
        match action.name.as_str() {
            KEEP_PRODUCT_ACTION => {
                let name = session.consume(action.payload.clone()).name().to_string();
                kept_reply(session, &name)
            }
            SHOW_SUMMARY_ACTION => Reply::text(format_consumption(session.ledger())),
            other => {
                warn!("Session {}: unknown action '{}'", session.id(), other);
                Reply::text(format!("Unknown action: {}", other))
            }
        }
    }

    /// Record the most recently analysed product as consumed.
    pub fn keep_current(&self, session: &mut Session) -> Reply {
        match session.consume_current() {
            Some(kept) => {
                let name = kept.name().to_string();
                kept_reply(session, &name)
            }
            None => Reply::text(NOTHING_TO_KEEP),
        }
    }
}

fn kept_reply(session: &Session, name: &str) -> Reply {
    Reply::text(format!(
        "Added {} to today's products.\n\n{}",
        name,
        format_consumption(session.ledger())
    ))
}
