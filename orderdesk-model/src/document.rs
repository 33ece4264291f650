//! Attribute codec for the order content blob.
//!
//! The intake form stores each order's free-form answers as a JSON object
//! with an `attrs` list of `{name, value}` pairs. Some older submissions
//! also carry flat convenience keys (`category`, `memo`, ...) next to it.
//! [`Document`] is the typed view of that blob.
//!
//! Decoding is deliberately forgiving: the blob is produced outside this
//! system and one corrupt record must never abort a sync or a listing.
//! Use [`try_decode`] where silently starting from an empty document would
//! destroy data, e.g. before writing a patched document back.

use crate::error::{ModelError, ModelResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::debug;

/// Key holding the attribute list. Reserved: never stored in `extras`.
const ATTRS_KEY: &str = "attrs";

/// One named form answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attr {
    pub name: String,
    #[serde(default)]
    pub value: Value,
    /// Any other keys the intake form attached to the entry.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Attr {
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            extra: BTreeMap::new(),
        }
    }

    /// The value rendered as display text.
    pub fn value_text(&self) -> String {
        value_to_text(&self.value)
    }

    fn to_value(&self) -> Value {
        let mut map = Map::new();
        for (key, value) in &self.extra {
            map.insert(key.clone(), value.clone());
        }
        map.insert("name".to_string(), Value::String(self.name.clone()));
        map.insert("value".to_string(), self.value.clone());
        Value::Object(map)
    }
}

/// What [`Document::upsert_attr`] did to the attribute list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrChange {
    /// An existing entry got a new value, in place.
    Replaced { index: usize },
    /// No entry had the name; a new one was pushed to the end.
    Appended { index: usize },
    /// An existing entry already held the value.
    Unchanged { index: usize },
}

impl AttrChange {
    pub fn is_change(&self) -> bool {
        !matches!(self, Self::Unchanged { .. })
    }
}

/// Typed view of an order's content blob.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Document {
    /// Form answers in arrival order.
    pub attrs: Vec<Attr>,
    /// Top-level keys other than `attrs`.
    pub extras: BTreeMap<String, Value>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty() && self.extras.is_empty()
    }

    /// First attribute with the given name.
    pub fn attr(&self, name: &str) -> Option<&Attr> {
        self.attrs.iter().find(|a| a.name == name)
    }

    /// Replace the value of the first attribute named `name`, or append a
    /// new one when none exists.
    pub fn upsert_attr(&mut self, name: &str, value: impl Into<Value>) -> AttrChange {
        let value = value.into();
        match self.attrs.iter().position(|a| a.name == name) {
            Some(index) if self.attrs[index].value == value => AttrChange::Unchanged { index },
            Some(index) => {
                self.attrs[index].value = value;
                AttrChange::Replaced { index }
            }
            None => {
                self.attrs.push(Attr::new(name, value));
                AttrChange::Appended {
                    index: self.attrs.len() - 1,
                }
            }
        }
    }

    /// Text of a named field, looking at attrs first and then extras.
    pub fn text_value(&self, name: &str) -> Option<String> {
        self.attr(name)
            .map(Attr::value_text)
            .or_else(|| self.extras.get(name).map(value_to_text))
    }

    /// The document as a JSON object.
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        for (key, value) in &self.extras {
            if key == ATTRS_KEY {
                continue;
            }
            map.insert(key.clone(), value.clone());
        }
        if !self.attrs.is_empty() {
            map.insert(
                ATTRS_KEY.to_string(),
                Value::Array(self.attrs.iter().map(Attr::to_value).collect()),
            );
        }
        Value::Object(map)
    }

    /// Build a document from a parsed JSON value.
    ///
    /// In strict mode anything that cannot be represented without loss is
    /// an error; otherwise it is dropped.
    pub fn from_value(value: Value, strict: bool) -> ModelResult<Self> {
        match value {
            Value::Object(map) => Self::from_object(map, strict),
            Value::Array(items) => Ok(Self {
                attrs: parse_attrs(items, strict)?,
                extras: BTreeMap::new(),
            }),
            Value::Null => Ok(Self::default()),
            other if strict => Err(ModelError::MalformedContent(format!(
                "expected a JSON object, found {}",
                json_kind(&other)
            ))),
            _ => Ok(Self::default()),
        }
    }

    fn from_object(mut map: Map<String, Value>, strict: bool) -> ModelResult<Self> {
        let attrs = match map.remove(ATTRS_KEY) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => parse_attrs(items, strict)?,
            Some(other) if strict => {
                return Err(ModelError::MalformedContent(format!(
                    "`attrs` must be a list, found {}",
                    json_kind(&other)
                )));
            }
            Some(_) => Vec::new(),
        };
        Ok(Self {
            attrs,
            extras: map.into_iter().collect(),
        })
    }
}

fn parse_attrs(items: Vec<Value>, strict: bool) -> ModelResult<Vec<Attr>> {
    let mut attrs = Vec::with_capacity(items.len());
    for (position, item) in items.into_iter().enumerate() {
        let named = item
            .as_object()
            .is_some_and(|obj| obj.get("name").is_some_and(Value::is_string));
        if !named {
            if strict {
                return Err(ModelError::MalformedContent(format!(
                    "attrs[{position}] has no string `name`"
                )));
            }
            debug!(position, "dropping unnamed attr entry");
            continue;
        }
        attrs.push(serde_json::from_value::<Attr>(item)?);
    }
    Ok(attrs)
}

/// Decode a content blob, degrading to an empty document on bad input.
pub fn decode(blob: &str) -> Document {
    match decode_inner(blob, false) {
        Ok(doc) => doc,
        Err(e) => {
            debug!(error = %e, "content blob not decodable; using empty document");
            Document::default()
        }
    }
}

/// Decode a content blob, failing instead of dropping anything.
///
/// An empty blob is an empty document, not an error.
pub fn try_decode(blob: &str) -> ModelResult<Document> {
    decode_inner(blob, true)
}

fn decode_inner(blob: &str, strict: bool) -> ModelResult<Document> {
    let trimmed = blob.trim();
    if trimmed.is_empty() {
        return Ok(Document::default());
    }

    let value: Value = serde_json::from_str(trimmed)?;
    match value {
        // Some intake exports double-encode the document as a JSON string.
        Value::String(inner) => {
            let inner = inner.trim();
            if inner.is_empty() {
                return Ok(Document::default());
            }
            match serde_json::from_str::<Value>(inner) {
                Ok(Value::String(_)) if strict => Err(ModelError::MalformedContent(
                    "content is a nested string".to_string(),
                )),
                Ok(Value::String(_)) => Ok(Document::default()),
                Ok(parsed) => Document::from_value(parsed, strict),
                Err(e) if strict => Err(e.into()),
                Err(_) => Ok(Document::default()),
            }
        }
        other => Document::from_value(other, strict),
    }
}

/// Encode a document back into a content blob.
pub fn encode(doc: &Document) -> String {
    doc.to_value().to_string()
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
