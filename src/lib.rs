//! Nutrition assistant backed by Anthropic models on AWS Bedrock
//!
//! Takes a photo of a food product, extracts schema-conforming product data
//! through a forced tool call, explains it in plain language, and keeps a
//! per-session ledger of consumed products.

pub mod ai;
pub mod app;
pub mod error;
pub mod format;
pub mod image;
pub mod models;
pub mod prompts;
pub mod query;
pub mod schema;
pub mod session;

pub use error::{Error, Result};
