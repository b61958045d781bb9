//! Remote API types
//!
//! Wire shapes for the collection API (legacy metadata pairs) and the comment API.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Deserialize an identifier that might be encoded as a string, a number or null.
/// The collection API is not consistent about id types; null becomes "".
pub fn deserialize_flexible_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de;

    struct FlexibleIdVisitor;

    impl<'de> de::Visitor<'de> for FlexibleIdVisitor {
        type Value = String;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a string, a number, or null")
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<String, E> {
            Ok(value.to_string())
        }

        fn visit_string<E: de::Error>(self, value: String) -> Result<String, E> {
            Ok(value)
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> Result<String, E> {
            Ok(value.to_string())
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> Result<String, E> {
            Ok(value.to_string())
        }

        fn visit_f64<E: de::Error>(self, value: f64) -> Result<String, E> {
            Ok(value.to_string())
        }

        fn visit_none<E: de::Error>(self) -> Result<String, E> {
            Ok(String::new())
        }

        fn visit_unit<E: de::Error>(self) -> Result<String, E> {
            Ok(String::new())
        }
    }

    deserializer.deserialize_any(FlexibleIdVisitor)
}

/// One `{field, value}` entry of the legacy metadata list
#[derive(Debug, Clone, Deserialize)]
pub struct MetadataPair {
    /// Metadata field name; entries without one are skipped
    #[serde(default)]
    pub field: Option<String>,
    /// Scalar, or a sequence (one-element sequences get unwrapped)
    #[serde(default)]
    pub value: Value,
}

/// A comment attached to a detail page
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    #[serde(default, deserialize_with = "deserialize_flexible_id")]
    pub id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub from: Option<String>,
    /// Detail id the comment belongs to
    #[serde(default, rename = "for", deserialize_with = "deserialize_flexible_id")]
    pub for_id: String,
    #[serde(default)]
    pub created: Option<String>,
}

/// Body for `POST items/messages`
#[derive(Debug, Serialize)]
pub struct NewMessage<'a> {
    pub text: &'a str,
    pub from: &'a str,
    #[serde(rename = "for")]
    pub for_id: &'a str,
}

/// Envelope the comment API wraps listings in
#[derive(Debug, Deserialize)]
pub struct MessagesResponse {
    #[serde(default)]
    pub data: Vec<Message>,
}
