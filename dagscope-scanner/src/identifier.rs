//! Canonical identifiers for graph nodes.
//!
//! Upstream documents reference other blocks either as a bare CID string or
//! as an IPLD link object `{"/": "<cid>"}`. Both collapse to a plain string
//! here. Extraction never fails loudly: malformed references are expected
//! and only prune the branch that carried them.

use cid::Cid;
use serde_json::Value;

/// Field name of an IPLD link object.
pub const LINK_KEY: &str = "/";

/// Node-store primary key. Equality is exact string equality.
pub type Identifier = String;

/// Normalises a reference into a canonical identifier.
///
/// A string that parses as a content identifier is returned unchanged. An
/// object carrying a string link field yields that field. Anything else
/// yields `None`.
pub fn extract_identifier(value: &Value) -> Option<Identifier> {
    match value {
        Value::String(s) if is_content_identifier(s) => Some(s.clone()),
        Value::Object(map) => map
            .get(LINK_KEY)
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}

/// Same as [`extract_identifier`] for references that may be absent.
pub fn extract_optional(value: Option<&Value>) -> Option<Identifier> {
    value.and_then(extract_identifier)
}

pub fn is_content_identifier(s: &str) -> bool {
    Cid::try_from(s).is_ok()
}

/// `<tx_hash>#<tx_index>` as used for UTxO nodes.
pub fn utxo_identifier(tx_hash: &str, tx_index: u32) -> Identifier {
    format!("{}#{}", tx_hash, tx_index)
}

/// Splits a transaction reference, returning the transaction hash.
pub fn transaction_hash(id: &str) -> Option<&str> {
    id.split_once('#').map(|(hash, _)| hash)
}

/// Decodes binary CID bytes into the canonical string form.
///
/// Tolerates the 0x00 multibase prefix used inside DAG-CBOR tag 42 links.
pub fn decode_cid_bytes(bytes: &[u8]) -> Option<Identifier> {
    let raw = match bytes.first() {
        Some(0x00) => &bytes[1..],
        _ => bytes,
    };
    Cid::try_from(raw).ok().map(|c| c.to_string())
}

/// First five and last five characters joined by `..`.
pub fn shorten_label(id: &str) -> String {
    let chars: Vec<char> = id.chars().collect();
    if chars.len() <= 12 {
        return id.to_string();
    }
    let head: String = chars[..5].iter().collect();
    let tail: String = chars[chars.len() - 5..].iter().collect();
    format!("{}..{}", head, tail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cid::multihash::Multihash;
    use serde_json::json;

    fn sample_cid(seed: u8) -> Cid {
        let digest = Multihash::<64>::wrap(0x12, &[seed; 32]).unwrap();
        Cid::new_v1(0x71, digest)
    }

    #[test]
    fn test_valid_cid_string_is_returned_unchanged() {
        let cid = sample_cid(1).to_string();
        assert_eq!(extract_identifier(&json!(cid)), Some(cid.clone()));
    }

    #[test]
    fn test_link_object_yields_link_field() {
        let value = json!({"/": "bafy-not-checked"});
        assert_eq!(extract_identifier(&value), Some("bafy-not-checked".to_string()));
    }

    #[test]
    fn test_empty_object_and_null_fail() {
        assert_eq!(extract_identifier(&json!({})), None);
        assert_eq!(extract_identifier(&Value::Null), None);
        assert_eq!(extract_optional(None), None);
    }

    #[test]
    fn test_invalid_string_fails() {
        assert_eq!(extract_identifier(&json!("C2")), None);
        assert_eq!(extract_identifier(&json!("")), None);
    }

    #[test]
    fn test_non_string_link_fails() {
        assert_eq!(extract_identifier(&json!({"/": {"bytes": "AAEC"}})), None);
        assert_eq!(extract_identifier(&json!({"/": 7})), None);
        assert_eq!(extract_identifier(&json!([1, 2])), None);
    }

    #[test]
    fn test_decode_cid_bytes_with_and_without_prefix() {
        let cid = sample_cid(9);
        let bytes = cid.to_bytes();
        assert_eq!(decode_cid_bytes(&bytes), Some(cid.to_string()));

        let mut prefixed = vec![0x00];
        prefixed.extend_from_slice(&bytes);
        assert_eq!(decode_cid_bytes(&prefixed), Some(cid.to_string()));

        assert_eq!(decode_cid_bytes(&[0xff, 0x01]), None);
        assert_eq!(decode_cid_bytes(&[]), None);
    }

    #[test]
    fn test_utxo_identifier_and_transaction_hash() {
        let id = utxo_identifier("abcd", 3);
        assert_eq!(id, "abcd#3");
        assert_eq!(transaction_hash(&id), Some("abcd"));
        assert_eq!(transaction_hash("bafyfoo"), None);
    }

    #[test]
    fn test_shorten_label() {
        assert_eq!(shorten_label("0123456789abcdef"), "01234..bcdef");
        assert_eq!(shorten_label("short"), "short");
    }
}
