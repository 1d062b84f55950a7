// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::canonical::canonical_bytes;

/// The kind of event an audit record carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    SessionStart,
    StateTransition,
    ModelRequest,
    ModelResponse,
    ToolCall,
    ToolResult,
    BudgetCheck,
    Error,
    SessionEnd,
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = serde_json::to_value(self).unwrap_or(Value::Null);
        write!(f, "{}", s.as_str().unwrap_or("UNKNOWN"))
    }
}

/// One entry in a session's tamper-evident audit chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
    pub session_id: String,
    pub seq: u64,
    pub kind: EventKind,
    /// Already scrubbed by the time this struct is constructed.
    pub payload: Value,
    pub ts: DateTime<Utc>,
    /// Hex-encoded SHA-256 of the previous record; all-zero for seq 0.
    pub prev_hash: String,
    /// Hex-encoded SHA-256 of this record's canonicalized fields.
    pub hash: String,
}

pub const ZERO_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

impl AuditRecord {
    /// Compute `hash` from `(session_id, seq, kind, payload, prev_hash)`.
    /// Timestamps are deliberately excluded from the hashed fields: the
    /// determinism guarantee covers chain *contents*, not wall-clock
    /// readings (see kernel determinism requirement).
    pub fn compute_hash(session_id: &str, seq: u64, kind: EventKind, payload: &Value, prev_hash: &str) -> String {
        let tuple = serde_json::json!({
            "session_id": session_id,
            "seq": seq,
            "kind": kind,
            "payload": payload,
            "prev_hash": prev_hash,
        });
        let bytes = canonical_bytes(&tuple);
        use sha2::{Digest, Sha256};
        let digest = Sha256::digest(&bytes);
        hex::encode(digest)
    }

    /// Recompute this record's hash from its own fields and compare.
    pub fn recomputed_hash(&self) -> String {
        Self::compute_hash(&self.session_id, self.seq, self.kind, &self.payload, &self.prev_hash)
    }

    pub fn hash_is_valid(&self) -> bool {
        self.recomputed_hash() == self.hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn compute_hash_is_deterministic() {
        let a = AuditRecord::compute_hash("s1", 0, EventKind::SessionStart, &json!({"x": 1}), ZERO_HASH);
        let b = AuditRecord::compute_hash("s1", 0, EventKind::SessionStart, &json!({"x": 1}), ZERO_HASH);
        assert_eq!(a, b);
    }

    #[test]
    fn different_payload_changes_hash() {
        let a = AuditRecord::compute_hash("s1", 0, EventKind::SessionStart, &json!({"x": 1}), ZERO_HASH);
        let b = AuditRecord::compute_hash("s1", 0, EventKind::SessionStart, &json!({"x": 2}), ZERO_HASH);
        assert_ne!(a, b);
    }

    #[test]
    fn hash_is_valid_detects_tamper() {
        let mut r = AuditRecord {
            session_id: "s1".into(),
            seq: 0,
            kind: EventKind::SessionStart,
            payload: json!({"x": 1}),
            ts: Utc::now(),
            prev_hash: ZERO_HASH.into(),
            hash: String::new(),
        };
        r.hash = r.recomputed_hash();
        assert!(r.hash_is_valid());
        r.payload = json!({"x": 999});
        assert!(!r.hash_is_valid());
    }

    #[test]
    fn event_kind_display_is_screaming_snake() {
        assert_eq!(EventKind::ToolCall.to_string(), "TOOL_CALL");
        assert_eq!(EventKind::SessionStart.to_string(), "SESSION_START");
    }
}
