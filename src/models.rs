//! Data models and structures
//!
//! Defines the Bedrock/Anthropic request and response documents, the
//! normalized image type, and the environment-driven configuration.

use crate::image::NormalizedImage;
use crate::{Error, Result};
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

pub const ANTHROPIC_VERSION: &str = "bedrock-2023-05-31";
pub const DEFAULT_MODEL_ID: &str = "us.anthropic.claude-3-7-sonnet-20250219-v1:0";
pub const DEFAULT_REGION: &str = "us-west-2";
pub const DEFAULT_MAX_TOKENS: u32 = 1024;
pub const DEFAULT_IMAGE_BUDGET_KB: u32 = 2048;
pub const DEFAULT_IMAGE_MAX_DIMENSION: u32 = 2048;

/// One block of message content, tagged by `type` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentItem {
    Text { text: String },
    Image { source: ImageSource },
}

impl ContentItem {
    pub fn text(value: impl Into<String>) -> Self {
        ContentItem::Text { text: value.into() }
    }

    pub fn image(image: &NormalizedImage) -> Self {
        ContentItem::Image {
            source: ImageSource::Base64 {
                media_type: image.media_type.as_str().to_string(),
                data: base64::engine::general_purpose::STANDARD.encode(&image.bytes),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ImageSource {
    Base64 { media_type: String, data: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: Vec<ContentItem>,
}

/// Tool declaration the model is asked to "call" with schema-conforming input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

/// Request body for Bedrock `InvokeModel` with an Anthropic model.
///
/// Field names are part of the endpoint contract and must not change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Payload {
    pub anthropic_version: String,
    pub max_tokens: u32,
    pub top_k: u32,
    pub top_p: f32,
    pub temperature: f32,
    pub stop_sequences: Vec<String>,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolSpec>>,
}

impl Payload {
    /// Content of the single user message.
    pub fn content(&self) -> &[ContentItem] {
        self.messages
            .first()
            .map(|m| m.content.as_slice())
            .unwrap_or_default()
    }

    /// Concatenated text items of the user message.
    pub fn prompt_text(&self) -> String {
        self.content()
            .iter()
            .filter_map(|item| match item {
                ContentItem::Text { text } => Some(text.as_str()),
                ContentItem::Image { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Content block returned by the model.
///
/// Unknown block types (e.g. `thinking`) decode as `Other` and are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseContent {
    Text {
        text: String,
    },
    ToolUse {
        #[serde(default)]
        id: String,
        name: String,
        input: serde_json::Value,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub input_tokens: u32,
    #[serde(default)]
    pub output_tokens: u32,
}

/// Top-level response envelope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_reason: Option<String>,
    pub content: Vec<ResponseContent>,
    #[serde(default)]
    pub usage: Usage,
}

impl ModelResponse {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ResponseContent::Text { text: text.into() }],
            ..Default::default()
        }
    }

    pub fn from_tool_use(name: impl Into<String>, input: serde_json::Value) -> Self {
        Self {
            content: vec![ResponseContent::ToolUse {
                id: "toolu_mock".to_string(),
                name: name.into(),
                input,
            }],
            stop_reason: Some("tool_use".to_string()),
            ..Default::default()
        }
    }

    /// Name and input of the first `tool_use` block, if any.
    pub fn first_tool_use(&self) -> Option<(&str, &serde_json::Value)> {
        self.content.iter().find_map(|item| match item {
            ResponseContent::ToolUse { name, input, .. } => Some((name.as_str(), input)),
            _ => None,
        })
    }

    /// All text blocks concatenated in order.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|item| match item {
                ResponseContent::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

// Configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub aws_region: String,
    pub model_id: String,
    /// Bedrock API key; when set, requests go through the plain HTTPS invoker.
    pub bedrock_api_key: Option<String>,
    pub bedrock_endpoint: Option<String>,
    pub max_tokens: u32,
    pub image_budget_kb: u32,
    pub image_max_dimension: u32,
    pub schema_path: Option<PathBuf>,
    /// Per-call limit on model requests; unset leaves the client defaults.
    pub request_timeout_secs: Option<u64>,
}

impl Config {
    pub fn from_env() -> crate::Result<Self> {
        dotenvy::dotenv().ok();

        let var = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());

        Ok(Self {
            aws_region: var("AWS_REGION")
                .or_else(|| var("AWS_DEFAULT_REGION"))
                .unwrap_or_else(|| DEFAULT_REGION.to_string()),
            model_id: var("BEDROCK_MODEL_ID").unwrap_or_else(|| DEFAULT_MODEL_ID.to_string()),
            bedrock_api_key: var("AWS_BEARER_TOKEN_BEDROCK"),
            bedrock_endpoint: var("BEDROCK_ENDPOINT"),
            max_tokens: parse_nonzero("MAX_TOKENS", var("MAX_TOKENS"), DEFAULT_MAX_TOKENS)?,
            image_budget_kb: parse_nonzero(
                "IMAGE_BUDGET_KB",
                var("IMAGE_BUDGET_KB"),
                DEFAULT_IMAGE_BUDGET_KB,
            )?,
            image_max_dimension: parse_nonzero(
                "IMAGE_MAX_DIMENSION",
                var("IMAGE_MAX_DIMENSION"),
                DEFAULT_IMAGE_MAX_DIMENSION,
            )?,
            schema_path: var("SCHEMA_PATH").map(PathBuf::from),
            request_timeout_secs: var("REQUEST_TIMEOUT_SECS")
                .map(|raw| parse_nonzero("REQUEST_TIMEOUT_SECS", Some(raw), 0u64))
                .transpose()?,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            aws_region: DEFAULT_REGION.to_string(),
            model_id: DEFAULT_MODEL_ID.to_string(),
            bedrock_api_key: None,
            bedrock_endpoint: None,
            max_tokens: DEFAULT_MAX_TOKENS,
            image_budget_kb: DEFAULT_IMAGE_BUDGET_KB,
            image_max_dimension: DEFAULT_IMAGE_MAX_DIMENSION,
            schema_path: None,
            request_timeout_secs: None,
        }
    }
}

fn parse_var<T: FromStr>(key: &str, raw: Option<String>, default: T) -> Result<T> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{} must be a number, got '{}'", key, value))),
    }
}

fn parse_nonzero<T: FromStr + Default + PartialEq>(
    key: &str,
    raw: Option<String>,
    default: T,
) -> Result<T> {
    let value = parse_var(key, raw, default)?;
    if value == T::default() {
        return Err(Error::Config(format!("{} must be greater than zero", key)));
    }
    Ok(value)
}
