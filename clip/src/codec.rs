/********************************************************************************
 * Copyright (c) 2026 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

//! Typed property codec.
//!
//! The Ariane server is statically typed, so every property sent over AMQP or NATS
//! carries an explicit [`TypeTag`]. On the wire a property is
//! `{"propertyName": .., "propertyType": .., "propertyValue": ..}` where:
//!
//! - `array` values are a JSON array of nested `[tag, value]` pairs
//! - `map` values are a single JSON string holding the serialized object
//!
//! Envelopes exchanged over NATS are `{"properties": [..], "body": "<base64>"}`.

use crate::error::{ClipError, ClipResult};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;

/// Status code property set by the server on every reply.
pub const RC: &str = "RC";
/// Optional error text accompanying a non-zero [`RC`].
pub const SERVER_ERROR_MESSAGE: &str = "SERVER_ERROR_MESSAGE";
/// Per-request token matching a reply to its request.
pub const MSG_CORRELATION_ID: &str = "MSG_CORRELATION_ID";

const RESERVED_PROPERTIES: [&str; 3] = [RC, SERVER_ERROR_MESSAGE, MSG_CORRELATION_ID];

pub(crate) fn is_reserved(name: &str) -> bool {
    RESERVED_PROPERTIES.contains(&name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeTag {
    String,
    Long,
    Double,
    Boolean,
    Array,
    Map,
}

impl TypeTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeTag::String => "string",
            TypeTag::Long => "long",
            TypeTag::Double => "double",
            TypeTag::Boolean => "boolean",
            TypeTag::Array => "array",
            TypeTag::Map => "map",
        }
    }

    fn parse(tag: &str) -> ClipResult<Self> {
        match tag {
            "string" => Ok(TypeTag::String),
            "long" => Ok(TypeTag::Long),
            "double" => Ok(TypeTag::Double),
            "boolean" => Ok(TypeTag::Boolean),
            "array" => Ok(TypeTag::Array),
            "map" => Ok(TypeTag::Map),
            other => Err(ClipError::codec(format!("unknown type tag `{other}`"))),
        }
    }
}

/// A property value as the remote server understands it.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    String(String),
    Long(i64),
    Double(f64),
    Boolean(bool),
    Array(Vec<PropertyValue>),
    Map(Map<String, Value>),
}

pub type Properties = BTreeMap<String, PropertyValue>;

impl PropertyValue {
    pub fn type_tag(&self) -> TypeTag {
        match self {
            PropertyValue::String(_) => TypeTag::String,
            PropertyValue::Long(_) => TypeTag::Long,
            PropertyValue::Double(_) => TypeTag::Double,
            PropertyValue::Boolean(_) => TypeTag::Boolean,
            PropertyValue::Array(_) => TypeTag::Array,
            PropertyValue::Map(_) => TypeTag::Map,
        }
    }

    /// Classifies a dynamically typed JSON value.
    ///
    /// Booleans are checked before numbers, integral numbers become `long` and every
    /// other number becomes `double`. `null` has no wire type.
    pub fn from_json(value: &Value) -> ClipResult<Self> {
        match value {
            Value::Bool(b) => Ok(PropertyValue::Boolean(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(long) => Ok(PropertyValue::Long(long)),
                None => n
                    .as_f64()
                    .map(PropertyValue::Double)
                    .ok_or_else(|| ClipError::codec(format!("number {n} is not representable"))),
            },
            Value::String(s) => Ok(PropertyValue::String(s.clone())),
            Value::Array(items) => items
                .iter()
                .map(PropertyValue::from_json)
                .collect::<ClipResult<Vec<_>>>()
                .map(PropertyValue::Array),
            Value::Object(map) => Ok(PropertyValue::Map(map.clone())),
            Value::Null => Err(ClipError::codec("null has no wire type")),
        }
    }

    /// Untagged JSON view of the value, maps kept as objects.
    pub fn to_json(&self) -> Value {
        match self {
            PropertyValue::String(s) => Value::String(s.clone()),
            PropertyValue::Long(l) => Value::from(*l),
            PropertyValue::Double(d) => Number::from_f64(*d).map_or(Value::Null, Value::Number),
            PropertyValue::Boolean(b) => Value::Bool(*b),
            PropertyValue::Array(items) => {
                Value::Array(items.iter().map(PropertyValue::to_json).collect())
            }
            PropertyValue::Map(map) => Value::Object(map.clone()),
        }
    }

    /// Tagged wire form of the value.
    pub fn to_wire(&self) -> (TypeTag, Value) {
        let wire = match self {
            PropertyValue::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| {
                        let (tag, value) = item.to_wire();
                        Value::Array(vec![Value::String(tag.as_str().to_string()), value])
                    })
                    .collect(),
            ),
            PropertyValue::Map(map) => Value::String(Value::Object(map.clone()).to_string()),
            scalar => scalar.to_json(),
        };
        (self.type_tag(), wire)
    }

    /// Rebuilds a value from its tag and wire form.
    pub fn from_wire(tag: TypeTag, value: &Value) -> ClipResult<Self> {
        let mismatch = || {
            ClipError::codec(format!(
                "value {value} does not match type tag `{}`",
                tag.as_str()
            ))
        };

        match tag {
            TypeTag::String => value
                .as_str()
                .map(|s| PropertyValue::String(s.to_string()))
                .ok_or_else(mismatch),
            TypeTag::Long => value.as_i64().map(PropertyValue::Long).ok_or_else(mismatch),
            TypeTag::Double => value.as_f64().map(PropertyValue::Double).ok_or_else(mismatch),
            TypeTag::Boolean => value.as_bool().map(PropertyValue::Boolean).ok_or_else(mismatch),
            TypeTag::Array => {
                let items = value.as_array().ok_or_else(mismatch)?;
                items
                    .iter()
                    .map(|pair| match pair.as_array().map(Vec::as_slice) {
                        Some([Value::String(item_tag), item_value]) => {
                            PropertyValue::from_wire(TypeTag::parse(item_tag)?, item_value)
                        }
                        _ => Err(ClipError::codec(format!(
                            "array element {pair} is not a [tag, value] pair"
                        ))),
                    })
                    .collect::<ClipResult<Vec<_>>>()
                    .map(PropertyValue::Array)
            }
            TypeTag::Map => match value {
                Value::String(json) => match serde_json::from_str::<Value>(json)? {
                    Value::Object(map) => Ok(PropertyValue::Map(map)),
                    _ => Err(mismatch()),
                },
                Value::Object(map) => Ok(PropertyValue::Map(map.clone())),
                _ => Err(mismatch()),
            },
        }
    }

    /// Plain reading of a reserved property, never attempting array or map decoding.
    fn passthrough(value: &Value) -> Self {
        match value {
            Value::String(s) => PropertyValue::String(s.clone()),
            Value::Bool(b) => PropertyValue::Boolean(*b),
            Value::Number(n) => n
                .as_i64()
                .map(PropertyValue::Long)
                .or_else(|| n.as_f64().map(PropertyValue::Double))
                .unwrap_or_else(|| PropertyValue::String(n.to_string())),
            other => PropertyValue::String(other.to_string()),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Integer reading, accepting numeric strings as the server sometimes sends them.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PropertyValue::Long(l) => Some(*l),
            PropertyValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::Double(d) => Some(*d),
            PropertyValue::Long(l) => Some(*l as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::String(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Long(value)
    }
}

impl From<i32> for PropertyValue {
    fn from(value: i32) -> Self {
        PropertyValue::Long(value.into())
    }
}

impl From<u32> for PropertyValue {
    fn from(value: u32) -> Self {
        PropertyValue::Long(value.into())
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Double(value)
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Boolean(value)
    }
}

impl From<Vec<PropertyValue>> for PropertyValue {
    fn from(value: Vec<PropertyValue>) -> Self {
        PropertyValue::Array(value)
    }
}

impl From<Map<String, Value>> for PropertyValue {
    fn from(value: Map<String, Value>) -> Self {
        PropertyValue::Map(value)
    }
}

/// Tags a dynamically typed value: `(type tag, wire value)`.
pub fn tag_value(value: &Value) -> ClipResult<(TypeTag, Value)> {
    PropertyValue::from_json(value).map(|property| property.to_wire())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireProperty {
    #[serde(rename = "propertyName")]
    pub name: String,
    #[serde(rename = "propertyType")]
    pub type_tag: TypeTag,
    #[serde(rename = "propertyValue")]
    pub value: Value,
}

/// Encodes properties in name order.
pub fn encode_properties(properties: &Properties) -> Vec<WireProperty> {
    properties
        .iter()
        .map(|(name, property)| {
            let (type_tag, value) = property.to_wire();
            WireProperty {
                name: name.clone(),
                type_tag,
                value,
            }
        })
        .collect()
}

pub fn decode_properties(wire: &[WireProperty]) -> ClipResult<Properties> {
    wire.iter()
        .map(|property| {
            let value = if is_reserved(&property.name) {
                PropertyValue::passthrough(&property.value)
            } else {
                PropertyValue::from_wire(property.type_tag, &property.value)?
            };
            Ok((property.name.clone(), value))
        })
        .collect()
}

/// Decoded reply body.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseContent {
    Json(Value),
    Text(String),
    Bytes(Vec<u8>),
}

impl ResponseContent {
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            ResponseContent::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ResponseContent::Text(text) => Some(text),
            ResponseContent::Json(Value::String(text)) => Some(text),
            _ => None,
        }
    }
}

/// Decodes a body as JSON, falling back to text and then to raw bytes.
///
/// Never fails: the server answers some errors with plain-text bodies.
pub fn decode_body(body: &[u8]) -> Option<ResponseContent> {
    if body.is_empty() {
        return None;
    }
    if let Ok(value) = serde_json::from_slice::<Value>(body) {
        return Some(ResponseContent::Json(value));
    }
    Some(match std::str::from_utf8(body) {
        Ok(text) => ResponseContent::Text(text.to_string()),
        Err(_) => ResponseContent::Bytes(body.to_vec()),
    })
}

/// A message: typed properties plus an opaque body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Envelope {
    pub properties: Properties,
    pub body: Vec<u8>,
}

impl Envelope {
    pub fn new(properties: Properties, body: impl Into<Vec<u8>>) -> Self {
        Self {
            properties,
            body: body.into(),
        }
    }

    pub fn with_property(mut self, name: &str, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(name.to_string(), value.into());
        self
    }

    pub fn correlation_id(&self) -> Option<String> {
        self.properties
            .get(MSG_CORRELATION_ID)
            .and_then(|id| match id {
                PropertyValue::String(s) => Some(s.clone()),
                PropertyValue::Long(l) => Some(l.to_string()),
                _ => None,
            })
    }

    pub fn set_correlation_id(&mut self, correlation_id: &str) {
        self.properties.insert(
            MSG_CORRELATION_ID.to_string(),
            PropertyValue::String(correlation_id.to_string()),
        );
    }

    /// Body decoded per [`decode_body`].
    pub fn content(&self) -> Option<ResponseContent> {
        decode_body(&self.body)
    }
}

#[derive(Serialize, Deserialize)]
struct WireEnvelope {
    #[serde(default)]
    properties: Vec<WireProperty>,
    #[serde(default)]
    body: String,
}

/// JSON form used on NATS subjects.
pub fn encode_envelope(envelope: &Envelope) -> ClipResult<Vec<u8>> {
    let wire = WireEnvelope {
        properties: encode_properties(&envelope.properties),
        body: BASE64.encode(&envelope.body),
    };
    Ok(serde_json::to_vec(&wire)?)
}

pub fn decode_envelope(bytes: &[u8]) -> ClipResult<Envelope> {
    let wire: WireEnvelope = serde_json::from_slice(bytes)?;
    let properties = decode_properties(&wire.properties)?;
    let body = BASE64.decode(wire.body.as_bytes())?;
    Ok(Envelope { properties, body })
}
