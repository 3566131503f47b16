// Copyright (c) 2024 Botho Foundation

//! The signed broadcast envelope exchanged between nodes.
//!
//! Every broadcast carries the sender's public key, a millisecond timestamp
//! and a signature over `version ++ data ++ timestamp`. The envelope is never
//! modified after it is received; accepted application messages are forwarded
//! in the same wire form.

use crate::error::{BroadcastError, BroadcastResult};
use serde::Serialize;
use serde_json::{Map, Value};

/// A signed broadcast as received from a peer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BroadcastEnvelope {
    /// Protocol version of the envelope.
    pub version: i64,

    /// Public key of the node that created the broadcast.
    #[serde(rename = "pubKey")]
    pub pub_key: String,

    /// Milliseconds since the unix epoch at which the broadcast was created.
    pub timestamp: i64,

    /// Signature over [`BroadcastEnvelope::signing_message`].
    pub signature: String,

    /// Application payload, opaque to this crate.
    pub data: Value,
}

impl BroadcastEnvelope {
    /// Create a new envelope.
    pub fn new(
        version: i64,
        pub_key: impl Into<String>,
        timestamp: i64,
        signature: impl Into<String>,
        data: Value,
    ) -> Self {
        Self {
            version,
            pub_key: pub_key.into(),
            timestamp,
            signature: signature.into(),
            data,
        }
    }

    /// Parse an envelope from raw bytes.
    pub fn from_slice(bytes: &[u8]) -> BroadcastResult<Self> {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|e| BroadcastError::MalformedEnvelope(e.to_string()))?;
        Self::from_value(value)
    }

    /// Parse an envelope from a JSON string.
    pub fn from_json_str(s: &str) -> BroadcastResult<Self> {
        Self::from_slice(s.as_bytes())
    }

    /// Validate the structure of a JSON value and build an envelope from it.
    ///
    /// A JSON string is accepted if it contains a serialized envelope object.
    pub fn from_value(value: Value) -> BroadcastResult<Self> {
        let mut object = match value {
            Value::Object(object) => object,
            Value::String(s) => match serde_json::from_str(&s) {
                Ok(Value::Object(object)) => object,
                _ => return Err(malformed("envelope string is not a JSON object")),
            },
            other => {
                return Err(malformed(format!(
                    "expected a JSON object, found {}",
                    type_name(&other)
                )))
            }
        };

        let version = take_integer(&mut object, "version")?;
        let pub_key = take_string(&mut object, "pubKey")?;
        let timestamp = take_integer(&mut object, "timestamp")?;
        let signature = take_string(&mut object, "signature")?;
        let data = object
            .remove("data")
            .ok_or_else(|| malformed("missing field `data`"))?;

        Ok(Self {
            version,
            pub_key,
            timestamp,
            signature,
            data,
        })
    }

    /// Canonical text form of the payload.
    ///
    /// Strings are used verbatim, anything else is its compact JSON encoding
    /// with object keys in the order they were received. Floats with no
    /// fractional part are written as integers (`1.0` as `1`) to match how
    /// other nodes serialize numbers. Exponent forms still differ: a float of
    /// `1e21` or above is written `1e21` here but `1e+21` by those nodes, so
    /// payloads signed with such values do not verify.
    pub fn data_string(&self) -> String {
        match &self.data {
            Value::String(s) => s.clone(),
            other => {
                let mut canonical = other.clone();
                integral_floats_to_integers(&mut canonical);
                canonical.to_string()
            }
        }
    }

    /// The exact message the sender signed: `version ++ data ++ timestamp`.
    pub fn signing_message(&self) -> String {
        format!("{}{}{}", self.version, self.data_string(), self.timestamp)
    }

    /// Serialize the full envelope to its wire form.
    pub fn to_wire(&self) -> BroadcastResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl TryFrom<Value> for BroadcastEnvelope {
    type Error = BroadcastError;

    fn try_from(value: Value) -> BroadcastResult<Self> {
        Self::from_value(value)
    }
}

fn malformed(reason: impl Into<String>) -> BroadcastError {
    BroadcastError::MalformedEnvelope(reason.into())
}

fn take_integer(object: &mut Map<String, Value>, field: &str) -> BroadcastResult<i64> {
    match object.remove(field) {
        Some(value) => value
            .as_i64()
            .ok_or_else(|| malformed(format!("field `{field}` must be an integer"))),
        None => Err(malformed(format!("missing field `{field}`"))),
    }
}

fn take_string(object: &mut Map<String, Value>, field: &str) -> BroadcastResult<String> {
    match object.remove(field) {
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(malformed(format!("field `{field}` must be a string"))),
        None => Err(malformed(format!("missing field `{field}`"))),
    }
}

/// Largest magnitude at which every integer is exactly representable as f64.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

fn integral_floats_to_integers(value: &mut Value) {
    match value {
        Value::Number(n) => {
            let integral = n
                .as_f64()
                .filter(|f| n.is_f64() && f.fract() == 0.0 && f.abs() <= MAX_SAFE_INTEGER);
            if let Some(f) = integral {
                *value = Value::from(f as i64);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(integral_floats_to_integers),
        Value::Object(object) => object.values_mut().for_each(integral_floats_to_integers),
        _ => {}
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
