//! Structured documents returned by the content gateway.
//!
//! Both DAG-JSON and DAG-CBOR bodies are normalised to the DAG-JSON data
//! model held in a [`serde_json::Value`], so link extraction works the same
//! regardless of the wire encoding.

use crate::error::{Result, ScanError};
use crate::identifier::{LINK_KEY, decode_cid_bytes, extract_optional};
use base64::Engine;
use base64::engine::general_purpose::STANDARD_NO_PAD;
use ciborium::value::Value as CborValue;
use serde_json::{Map, Number, Value};

pub type Document = Value;

/// CBOR tag for IPLD links.
pub const CID_TAG: u64 = 42;

pub const DAG_JSON: &str = "application/vnd.ipld.dag-json";
pub const DAG_CBOR: &str = "application/vnd.ipld.dag-cbor";

/// Media-type essence of a content-type header value.
pub fn media_type(content_type: &str) -> &str {
    content_type.split(';').next().unwrap_or("").trim()
}

/// Decodes a response body according to its declared content type.
pub fn decode_document(content_type: Option<&str>, body: &[u8]) -> Result<Document> {
    match content_type.map(media_type) {
        Some(DAG_JSON) => serde_json::from_slice(body)
            .map_err(|e| ScanError::DecodeError(format!("invalid DAG-JSON: {}", e))),
        Some(DAG_CBOR) => decode_dag_cbor(body),
        other => Err(ScanError::UnsupportedContentType(
            other.unwrap_or("none").to_string(),
        )),
    }
}

pub fn decode_dag_cbor(body: &[u8]) -> Result<Document> {
    let value: CborValue = ciborium::de::from_reader(body)
        .map_err(|e| ScanError::DecodeError(format!("invalid DAG-CBOR: {}", e)))?;
    cbor_to_json(value)
}

/// Converts a CBOR value to the DAG-JSON data model.
pub fn cbor_to_json(value: CborValue) -> Result<Value> {
    Ok(match value {
        CborValue::Null => Value::Null,
        CborValue::Bool(b) => Value::Bool(b),
        CborValue::Integer(i) => {
            let n = i128::from(i);
            if let Ok(v) = i64::try_from(n) {
                Value::Number(v.into())
            } else if let Ok(v) = u64::try_from(n) {
                Value::Number(v.into())
            } else {
                Value::String(n.to_string())
            }
        }
        CborValue::Float(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        CborValue::Text(s) => Value::String(s),
        CborValue::Bytes(bytes) => bytes_to_json(&bytes),
        CborValue::Array(items) => Value::Array(
            items
                .into_iter()
                .map(cbor_to_json)
                .collect::<Result<Vec<_>>>()?,
        ),
        CborValue::Map(entries) => {
            let mut map = Map::with_capacity(entries.len());
            for (key, value) in entries {
                let key = match key {
                    CborValue::Text(s) => s,
                    other => {
                        return Err(ScanError::DecodeError(format!(
                            "map key is not a string: {:?}",
                            other
                        )));
                    }
                };
                map.insert(key, cbor_to_json(value)?);
            }
            Value::Object(map)
        }
        CborValue::Tag(CID_TAG, inner) => match *inner {
            CborValue::Bytes(bytes) => {
                let cid = decode_cid_bytes(&bytes).ok_or_else(|| {
                    ScanError::MalformedLink(format!("tag 42 payload of {} bytes", bytes.len()))
                })?;
                link(cid)
            }
            other => {
                return Err(ScanError::MalformedLink(format!(
                    "tag 42 wraps {:?}",
                    other
                )));
            }
        },
        CborValue::Tag(_, inner) => cbor_to_json(*inner)?,
        other => {
            return Err(ScanError::DecodeError(format!(
                "unsupported CBOR value: {:?}",
                other
            )));
        }
    })
}

/// `{"/": "<cid>"}`
pub fn link(cid: String) -> Value {
    let mut map = Map::new();
    map.insert(LINK_KEY.to_string(), Value::String(cid));
    Value::Object(map)
}

fn bytes_to_json(bytes: &[u8]) -> Value {
    let mut inner = Map::new();
    inner.insert("bytes".to_string(), Value::String(STANDARD_NO_PAD.encode(bytes)));
    let mut outer = Map::new();
    outer.insert(LINK_KEY.to_string(), Value::Object(inner));
    Value::Object(outer)
}

/// Read-only view of a block header document.
///
/// Every accessor is lenient: absent or mistyped fields read as empty.
#[derive(Debug, Clone, Copy)]
pub struct HeaderView<'a> {
    doc: &'a Document,
}

impl<'a> HeaderView<'a> {
    pub fn new(doc: &'a Document) -> Self {
        Self { doc }
    }

    fn payload(&self) -> Option<&'a Value> {
        self.doc.get("Payload")
    }

    pub fn has_payload(&self) -> bool {
        self.payload().map(Value::is_object).unwrap_or(false)
    }

    pub fn issuer(&self) -> Option<&'a str> {
        self.doc.get("Issuer").and_then(Value::as_str)
    }

    pub fn comment(&self) -> Option<&'a str> {
        self.payload_str("Comment")
    }

    pub fn schema(&self) -> Option<&'a str> {
        self.payload_str("Schema")
    }

    pub fn media_type(&self) -> Option<&'a str> {
        self.payload_str("MediaType")
    }

    pub fn version(&self) -> Option<i64> {
        self.payload().and_then(|p| p.get("Version")).and_then(Value::as_i64)
    }

    pub fn body_ref(&self) -> Option<&'a Value> {
        self.payload().and_then(|p| p.get("Body"))
    }

    pub fn body_id(&self) -> Option<String> {
        extract_optional(self.body_ref())
    }

    pub fn accept(&self) -> &'a [Value] {
        self.payload_list("Accept")
    }

    pub fn reject(&self) -> &'a [Value] {
        self.payload_list("Reject")
    }

    fn payload_str(&self, key: &str) -> Option<&'a str> {
        self.payload().and_then(|p| p.get(key)).and_then(Value::as_str)
    }

    fn payload_list(&self, key: &str) -> &'a [Value] {
        self.payload()
            .and_then(|p| p.get(key))
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
