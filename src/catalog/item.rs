//! Catalog items
//!
//! The normalized record shape shared by the overview and detail pages, plus
//! the conversions from the collection API's legacy shape.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::warn;

use crate::api::types::{deserialize_flexible_id, MetadataPair};
use crate::assets::AssetSlot;

/// Flat metadata mapping, field name → scalar or sequence
pub type Metadata = BTreeMap<String, Value>;

/// Suffix of derived display-label entries
pub const LABEL_SUFFIX: &str = "_label";

/// Placeholder author for records without one
pub const ANONYMOUS_AUTHOR: &str = "anonymous";

/// One catalog record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Item {
    #[serde(default, deserialize_with = "deserialize_flexible_id")]
    pub id: String,
    /// Usually text, but kept whatever the API sends
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<Value>,
    #[serde(default)]
    pub metadata: Metadata,
    /// Single asset used by overview cards
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset: Option<AssetSlot>,
    /// Ordered asset sequence shown page by page on the detail view
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assets: Vec<Option<AssetSlot>>,
    /// Remaining top-level properties, carried through untouched
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Item {
    /// Convert one record of the collection API into an `Item`.
    ///
    /// Legacy `{field, value}` metadata lists become a flat mapping. Only
    /// records that are not objects are logged and dropped; known fields of an
    /// unexpected type are coerced or left out instead.
    pub fn from_api(raw: Value) -> Option<Self> {
        let mut object = match raw {
            Value::Object(object) => object,
            Value::Null => {
                warn!("Skipping null item");
                return None;
            }
            other => {
                warn!(item = %other, "Skipping item that is not an object");
                return None;
            }
        };

        let metadata = normalize_metadata(object.remove("metadata").unwrap_or(Value::Null));

        if let Some(id) = object.get_mut("id") {
            if matches!(id, Value::Bool(_) | Value::Array(_) | Value::Object(_)) {
                warn!(id = %id, "Coercing non-scalar item id to text");
                *id = Value::String(value_to_string(id));
            }
        }

        if let Some(assets) = object.get("assets") {
            if !assets.is_array() && !assets.is_null() {
                warn!(assets = %assets, "Dropping assets that are not a sequence");
                object.remove("assets");
            }
        }

        match serde_json::from_value::<Item>(Value::Object(object)) {
            Ok(mut item) => {
                item.metadata = metadata;
                Some(item)
            }
            Err(e) => {
                warn!(error = %e, "Skipping item with unexpected shape");
                None
            }
        }
    }

    /// Top-level property by name, as the API delivered it
    pub fn top_level(&self, key: &str) -> Option<Value> {
        match key {
            "id" => Some(Value::String(self.id.clone())),
            "title" => self.title.clone(),
            "description" => self.description.clone(),
            "metadata" => serde_json::to_value(&self.metadata).ok(),
            "asset" => self.asset.as_ref().and_then(|a| serde_json::to_value(a).ok()),
            "assets" => serde_json::to_value(&self.assets).ok(),
            _ => self.extra.get(key).cloned(),
        }
    }

    /// Value of a field: the top-level property when it is truthy, else the
    /// metadata entry, else `None`.
    ///
    /// Falsy top-level values (`0`, `""`, `false`) deliberately fall through to
    /// metadata; filtering and sorting rely on that.
    pub fn field(&self, key: &str) -> Option<Value> {
        if let Some(value) = self.top_level(key).filter(is_truthy) {
            return Some(value);
        }
        self.metadata.get(key).filter(|v| !v.is_null()).cloned()
    }

    /// Title when it is text
    pub fn title_text(&self) -> Option<&str> {
        self.title.as_ref().and_then(Value::as_str)
    }

    /// Add `<field>_label` entries to the metadata
    pub fn with_labels(mut self) -> Self {
        add_label_fields(&mut self.metadata);
        self
    }
}

/// JavaScript-style truthiness of a JSON value
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Stringify a value the way string coercion in the browser layer does:
/// whole numbers without a fraction, sequences comma-joined.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => match (n.as_i64(), n.as_u64(), n.as_f64()) {
            (Some(i), _, _) => i.to_string(),
            (_, Some(u), _) => u.to_string(),
            (_, _, Some(f)) if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e21 => {
                format!("{:.0}", f)
            }
            _ => n.to_string(),
        },
        Value::String(s) => s.clone(),
        Value::Array(values) => values
            .iter()
            .map(|v| if v.is_null() { String::new() } else { value_to_string(v) })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

/// Normalize any metadata shape to a flat mapping.
///
/// Lists of `{field, value}` pairs are flattened (one-element values unwrapped);
/// mappings pass through; anything else yields an empty mapping.
pub fn normalize_metadata(raw: Value) -> Metadata {
    match raw {
        Value::Object(map) => map.into_iter().collect(),
        Value::Array(pairs) => {
            let mut metadata = Metadata::new();
            for (index, raw_pair) in pairs.into_iter().enumerate() {
                if !raw_pair.is_object() {
                    warn!(index = index, meta = %raw_pair, "Invalid metadata entry");
                    continue;
                }
                let pair: MetadataPair = match serde_json::from_value(raw_pair) {
                    Ok(pair) => pair,
                    Err(e) => {
                        warn!(index = index, error = %e, "Invalid metadata entry");
                        continue;
                    }
                };
                let field = match pair.field {
                    Some(field) if !field.is_empty() => field,
                    _ => {
                        warn!(index = index, "Metadata entry without 'field'");
                        continue;
                    }
                };
                metadata.insert(field, unwrap_single(pair.value));
            }
            metadata
        }
        Value::Null => {
            warn!("Item has no metadata");
            Metadata::new()
        }
        other => {
            warn!(metadata = %other, "Metadata is neither a list nor a mapping");
            Metadata::new()
        }
    }
}

fn unwrap_single(value: Value) -> Value {
    match value {
        Value::Array(mut values) if values.len() == 1 => values.remove(0),
        other => other,
    }
}

/// Human-readable label for a field name: `plaats_van_uitgave` → `plaats van uitgave`
pub fn key_to_label(key: &str) -> String {
    key.replace('_', " ")
}

/// Add a `<field>_label` entry for every field of the mapping.
///
/// Entries holding exactly the label this function would derive for a present
/// field are skipped, so applying this twice gives the same mapping as
/// applying it once. A source field that merely ends in `_label` still gets
/// its own label.
pub fn add_label_fields(metadata: &mut Metadata) {
    let labels: Vec<(String, Value)> = metadata
        .keys()
        .filter(|key| !is_derived_label(metadata, key))
        .map(|key| {
            (
                format!("{}{}", key, LABEL_SUFFIX),
                Value::String(key_to_label(key)),
            )
        })
        .collect();

    metadata.extend(labels);
}

fn is_derived_label(metadata: &Metadata, key: &str) -> bool {
    key.strip_suffix(LABEL_SUFFIX).is_some_and(|base| {
        metadata.contains_key(base)
            && metadata.get(key).and_then(Value::as_str) == Some(key_to_label(base).as_str())
    })
}

/// Normalize an author value to a single display string.
///
/// Sequences are joined with ", ", surrounding brackets are removed and
/// missing or non-text values become "anonymous".
pub fn normalize_authors(value: &Value) -> String {
    if !is_truthy(value) {
        return ANONYMOUS_AUTHOR.to_string();
    }

    match value {
        Value::Array(authors) => authors
            .iter()
            .map(value_to_string)
            .collect::<Vec<_>>()
            .join(", "),
        Value::String(author) => {
            let cleaned = author.trim();
            match cleaned
                .strip_prefix('[')
                .and_then(|inner| inner.strip_suffix(']'))
            {
                Some(inner) => inner.trim().to_string(),
                None => cleaned.to_string(),
            }
        }
        _ => ANONYMOUS_AUTHOR.to_string(),
    }
}
