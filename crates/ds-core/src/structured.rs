//! Schema-constrained generation helpers.
//!
//! A [`ResponseSchema`] is derived from a Rust type with `schemars` and sent
//! to the provider; the returned text is parsed back into the same type.

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// A named JSON schema that a response must conform to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseSchema {
    pub name: String,
    pub schema: serde_json::Value,
}

impl ResponseSchema {
    pub fn new(name: impl Into<String>, schema: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            schema,
        }
    }

    /// Build a schema from a type deriving `JsonSchema`.
    ///
    /// Meta keys (`$schema`, `title`) are stripped since strict-mode APIs
    /// reject them.
    pub fn for_type<T: JsonSchema>(name: impl Into<String>) -> Self {
        let mut schema = serde_json::to_value(schemars::schema_for!(T)).unwrap_or_default();
        if let Some(obj) = schema.as_object_mut() {
            obj.remove("$schema");
            obj.remove("title");
        }
        Self::new(name, schema)
    }
}

/// Parse a structured response, naming the schema in any failure.
pub fn parse_structured<T: DeserializeOwned>(schema: &ResponseSchema, text: &str) -> Result<T, Error> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(Error::schema(&schema.name, "empty response"));
    }
    serde_json::from_str(trimmed).map_err(|e| Error::schema(&schema.name, e.to_string()))
}
