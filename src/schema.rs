//! Extraction schemas
//!
//! A schema is a JSON-schema-shaped object with a `properties` key. The
//! built-in one describes a food product and its nutritional values.

use crate::{Error, Result};
use serde_json::Value;
use std::path::Path;

pub const PRODUCT_SCHEMA: &str = include_str!("../data/schemas/product.json");

pub fn product_schema() -> Result<Value> {
    parse(PRODUCT_SCHEMA)
}

/// Load a schema file, or the built-in product schema when `path` is `None`.
pub fn load(path: Option<&Path>) -> Result<Value> {
    match path {
        Some(path) => {
            tracing::info!("Loading extraction schema from {}", path.display());
            parse(&std::fs::read_to_string(path)?)
        }
        None => product_schema(),
    }
}

fn parse(raw: &str) -> Result<Value> {
    let schema: Value = serde_json::from_str(raw)?;
    if !schema.get("properties").is_some_and(Value::is_object) {
        return Err(Error::Config(
            "Extraction schema must be an object with a `properties` object".to_string(),
        ));
    }
    Ok(schema)
}
