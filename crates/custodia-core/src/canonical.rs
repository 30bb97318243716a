//! Canonical CBOR encoding of audit entry digest material.
//!
//! This module implements RFC 8949 Core Deterministic Encoding:
//! - Map keys sorted by encoded byte comparison
//! - Integers use smallest valid encoding
//! - Definite lengths only
//! - No floats (timestamps are i64 milliseconds)
//!
//! The canonical encoding is what makes an entry digest reproducible: the
//! same entry content produces identical bytes on every platform and every
//! storage backend.

use ciborium::value::Value;

use crate::crypto::EntryDigest;
use crate::role::Role;
use crate::types::{ActionType, ActorId, CaseId};

/// Entry field keys (integer keys for compact encoding).
///
/// Keys 0-23 encode as single bytes in CBOR.
mod keys {
    pub const VERSION: u64 = 0;
    pub const CASE_ID: u64 = 1;
    pub const SEQ: u64 = 2;
    pub const TIMESTAMP: u64 = 3;
    pub const ACTOR_ID: u64 = 4;
    pub const ACTOR_ROLE: u64 = 5;
    pub const ACTION_TYPE: u64 = 6;
    pub const DETAILS: u64 = 7;
    pub const PREV_DIGEST: u64 = 8;
}

/// The current digest-material schema version.
pub const ENTRY_ENCODING_VERSION: u8 = 0;

/// Borrowed view of everything an entry digest covers.
#[derive(Debug, Clone, Copy)]
pub struct EntryFields<'a> {
    pub case_id: &'a CaseId,
    pub seq: u64,
    pub timestamp: i64,
    pub actor_id: &'a ActorId,
    pub actor_role: Role,
    pub action_type: &'a ActionType,
    pub details: &'a str,
    pub prev_digest: &'a EntryDigest,
}

/// Encode entry fields to canonical CBOR bytes.
pub fn canonical_entry_bytes(fields: &EntryFields<'_>) -> Vec<u8> {
    let value = fields_to_cbor_value(fields);
    let mut buf = Vec::new();
    encode_value_to(&mut buf, &value);
    buf
}

/// Convert entry fields to a CBOR Value (map with integer keys).
fn fields_to_cbor_value(fields: &EntryFields<'_>) -> Value {
    let entries = vec![
        (
            Value::Integer(keys::VERSION.into()),
            Value::Integer(ENTRY_ENCODING_VERSION.into()),
        ),
        (
            Value::Integer(keys::CASE_ID.into()),
            Value::Text(fields.case_id.as_str().to_string()),
        ),
        (Value::Integer(keys::SEQ.into()), Value::Integer(fields.seq.into())),
        (
            Value::Integer(keys::TIMESTAMP.into()),
            Value::Integer(fields.timestamp.into()),
        ),
        (
            Value::Integer(keys::ACTOR_ID.into()),
            Value::Text(fields.actor_id.as_str().to_string()),
        ),
        (
            Value::Integer(keys::ACTOR_ROLE.into()),
            Value::Text(fields.actor_role.as_str().to_string()),
        ),
        (
            Value::Integer(keys::ACTION_TYPE.into()),
            Value::Text(fields.action_type.as_str().to_string()),
        ),
        (
            Value::Integer(keys::DETAILS.into()),
            Value::Text(fields.details.to_string()),
        ),
        (
            Value::Integer(keys::PREV_DIGEST.into()),
            Value::Bytes(fields.prev_digest.0.to_vec()),
        ),
    ];

    Value::Map(entries)
}

/// Recursively encode a CBOR value.
fn encode_value_to(buf: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Integer(i) => encode_integer(buf, *i),
        Value::Bytes(b) => encode_bytes(buf, b),
        Value::Text(s) => encode_text(buf, s),
        Value::Array(arr) => {
            encode_uint(buf, 4, arr.len() as u64);
            for item in arr {
                encode_value_to(buf, item);
            }
        }
        Value::Map(entries) => encode_map_canonical(buf, entries),
        Value::Bool(b) => buf.push(if *b { 0xf5 } else { 0xf4 }),
        Value::Null => buf.push(0xf6),
        // Values are only ever built by `fields_to_cbor_value`.
        _ => unreachable!("unsupported CBOR value in canonical encoding"),
    }
}

/// Encode a CBOR integer (major types 0 and 1).
fn encode_integer(buf: &mut Vec<u8>, i: ciborium::value::Integer) {
    let n: i128 = i.into();

    if n >= 0 {
        encode_uint(buf, 0, n as u64);
    } else {
        // CBOR encodes -1 as 0, -2 as 1, etc.
        let abs = (-1 - n) as u64;
        encode_uint(buf, 1, abs);
    }
}

/// Encode an unsigned integer with the given major type.
fn encode_uint(buf: &mut Vec<u8>, major: u8, n: u64) {
    let mt = major << 5;
    if n < 24 {
        buf.push(mt | (n as u8));
    } else if n <= 0xff {
        buf.push(mt | 24);
        buf.push(n as u8);
    } else if n <= 0xffff {
        buf.push(mt | 25);
        buf.extend_from_slice(&(n as u16).to_be_bytes());
    } else if n <= 0xffff_ffff {
        buf.push(mt | 26);
        buf.extend_from_slice(&(n as u32).to_be_bytes());
    } else {
        buf.push(mt | 27);
        buf.extend_from_slice(&n.to_be_bytes());
    }
}

fn encode_bytes(buf: &mut Vec<u8>, bytes: &[u8]) {
    encode_uint(buf, 2, bytes.len() as u64);
    buf.extend_from_slice(bytes);
}

fn encode_text(buf: &mut Vec<u8>, s: &str) {
    encode_uint(buf, 3, s.len() as u64);
    buf.extend_from_slice(s.as_bytes());
}

/// Encode a map canonically (major type 5).
///
/// Keys are sorted by their encoded byte comparison.
fn encode_map_canonical(buf: &mut Vec<u8>, entries: &[(Value, Value)]) {
    let mut key_value_pairs: Vec<(Vec<u8>, &Value)> = entries
        .iter()
        .map(|(k, v)| {
            let mut key_buf = Vec::new();
            encode_value_to(&mut key_buf, k);
            (key_buf, v)
        })
        .collect();

    key_value_pairs.sort_by(|a, b| a.0.cmp(&b.0));

    encode_uint(buf, 5, key_value_pairs.len() as u64);
    for (key_bytes, value) in key_value_pairs {
        buf.extend_from_slice(&key_bytes);
        encode_value_to(buf, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample<'a>(
        case_id: &'a CaseId,
        actor_id: &'a ActorId,
        action: &'a ActionType,
        prev: &'a EntryDigest,
        details: &'a str,
    ) -> EntryFields<'a> {
        EntryFields {
            case_id,
            seq: 3,
            timestamp: 1_736_870_400_000,
            actor_id,
            actor_role: Role::Judge,
            action_type: action,
            details,
            prev_digest: prev,
        }
    }

    #[test]
    fn test_canonical_encoding_deterministic() {
        let case_id = CaseId::new("SIP-2024-8921").unwrap();
        let actor = ActorId::new("u-17").unwrap();
        let action = ActionType::new("VIEW_PROFILE").unwrap();
        let prev = EntryDigest::from_bytes([7; 32]);

        let a = canonical_entry_bytes(&sample(&case_id, &actor, &action, &prev, "x"));
        let b = canonical_entry_bytes(&sample(&case_id, &actor, &action, &prev, "x"));
        assert_eq!(a, b);
    }

    #[test]
    fn test_canonical_bytes_are_valid_cbor() {
        let case_id = CaseId::new("SIP-1").unwrap();
        let actor = ActorId::new("u-1").unwrap();
        let action = ActionType::new("DOC_UPLOAD").unwrap();
        let prev = EntryDigest::GENESIS;

        let bytes = canonical_entry_bytes(&sample(&case_id, &actor, &action, &prev, "upload"));
        let decoded: Value = ciborium::from_reader(&bytes[..]).unwrap();
        match decoded {
            Value::Map(entries) => assert_eq!(entries.len(), 9),
            other => panic!("expected map, got {:?}", other),
        }
    }

    #[test]
    fn test_details_change_changes_bytes() {
        let case_id = CaseId::new("SIP-1").unwrap();
        let actor = ActorId::new("u-1").unwrap();
        let action = ActionType::new("DOC_UPLOAD").unwrap();
        let prev = EntryDigest::GENESIS;

        let a = canonical_entry_bytes(&sample(&case_id, &actor, &action, &prev, "a"));
        let b = canonical_entry_bytes(&sample(&case_id, &actor, &action, &prev, "b"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_integer_encoding() {
        let mut buf = Vec::new();

        encode_uint(&mut buf, 0, 0);
        assert_eq!(buf, vec![0x00]);

        buf.clear();
        encode_uint(&mut buf, 0, 23);
        assert_eq!(buf, vec![0x17]);

        buf.clear();
        encode_uint(&mut buf, 0, 24);
        assert_eq!(buf, vec![0x18, 24]);

        buf.clear();
        encode_uint(&mut buf, 0, 256);
        assert_eq!(buf, vec![0x19, 0x01, 0x00]);

        buf.clear();
        encode_integer(&mut buf, (-1i64).into());
        assert_eq!(buf, vec![0x20]);
    }

    #[test]
    fn test_map_key_ordering() {
        let mut buf = Vec::new();
        let entries = vec![
            (Value::Integer(8.into()), Value::Integer(80.into())),
            (Value::Integer(0.into()), Value::Integer(0.into())),
            (Value::Integer(5.into()), Value::Integer(50.into())),
        ];
        encode_map_canonical(&mut buf, &entries);

        assert_eq!(buf[0], 0xa3);
        assert_eq!(buf[1], 0x00);
        assert_eq!(buf[2], 0x00);
        assert_eq!(buf[3], 0x05);
        assert_eq!(buf[4], 0x18);
        assert_eq!(buf[5], 50);
        assert_eq!(buf[6], 0x08);
        assert_eq!(buf[7], 0x18);
        assert_eq!(buf[8], 80);
    }
}
