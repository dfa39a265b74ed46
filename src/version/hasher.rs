//! Commit identity.
//!
//! The hash is SHA-256 over five length-prefixed fields, in order:
//!
//! 1. the payload as canonical JSON (object keys sorted, no whitespace)
//! 2. the commit message
//! 3. the creation instant, RFC 3339 UTC with nanoseconds
//! 4. the parent hash, or the empty string
//! 5. a random nonce stored on the commit
//!
//! Each field is preceded by its byte length as a big-endian u64, so no two
//! different inputs share an encoding. Everything hashed is stored on the
//! commit, which keeps the hash recomputable.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

pub const SHORT_HASH_LEN: usize = 8;

#[derive(Debug, Clone, Copy)]
pub struct HashInput<'a> {
    pub payload: &'a Value,
    pub message: &'a str,
    pub created_at: DateTime<Utc>,
    pub parent_hash: Option<&'a str>,
    pub nonce: &'a str,
}

/// 64 lowercase hex characters.
pub fn compute_commit_hash(input: &HashInput<'_>) -> String {
    let payload = canonical_json(input.payload);
    let instant = input.created_at.to_rfc3339_opts(SecondsFormat::Nanos, true);

    let mut hasher = Sha256::new();
    for field in [
        payload.as_bytes(),
        input.message.as_bytes(),
        instant.as_bytes(),
        input.parent_hash.unwrap_or("").as_bytes(),
        input.nonce.as_bytes(),
    ] {
        hasher.update((field.len() as u64).to_be_bytes());
        hasher.update(field);
    }

    hex::encode(hasher.finalize())
}

/// Display prefix. Not unique; never look anything up by it.
pub fn short_hash(hash: &str) -> String {
    hash.chars().take(SHORT_HASH_LEN).collect()
}

pub fn new_nonce() -> String {
    ulid::Ulid::new().to_string().to_lowercase()
}

fn canonical_json(value: &Value) -> String {
    sorted(value).to_string()
}

// Map ordering depends on serde_json features, so sort explicitly.
fn sorted(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = Map::new();
            for key in keys {
                out.insert(key.clone(), sorted(&map[key.as_str()]));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
        other => other.clone(),
    }
}
