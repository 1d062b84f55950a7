// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use std::path::Path;
use std::sync::Mutex;

use aria_types::AriaError;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use tracing::{debug, error};

use crate::record::{AuditRecord, EventKind, ZERO_HASH};
use crate::scrubber::Scrubber;

/// Result of chain verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    Ok,
    BrokenAt(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Text,
}

/// Durable, append-only audit log plus a per-session key/value memory table,
/// backed by a single embedded SQLite database in WAL journaling mode.
///
/// All mutation goes through a single mutex: per the concurrency model this
/// is a single-session-per-process design today, but guarding every append
/// with a lock keeps the store safe if a future multi-session host adds
/// concurrent writers.
pub struct AuditStore {
    conn: Mutex<Connection>,
    scrubber: Scrubber,
}

impl AuditStore {
    pub fn open(path: &Path, scrubber: Scrubber) -> Result<Self, AriaError> {
        let conn = Connection::open(path)
            .map_err(|e| AriaError::AuditWriteFailure(format!("opening {}: {e}", path.display())))?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| AriaError::AuditWriteFailure(format!("setting WAL mode: {e}")))?;
        Self::init_schema(&conn)?;
        Ok(Self { conn: Mutex::new(conn), scrubber })
    }

    /// In-memory store for tests: same schema, no file on disk.
    pub fn open_in_memory(scrubber: Scrubber) -> Result<Self, AriaError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| AriaError::AuditWriteFailure(format!("opening in-memory db: {e}")))?;
        Self::init_schema(&conn)?;
        Ok(Self { conn: Mutex::new(conn), scrubber })
    }

    fn init_schema(conn: &Connection) -> Result<(), AriaError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS audit (
                session_id TEXT NOT NULL,
                seq        INTEGER NOT NULL,
                kind       TEXT NOT NULL,
                payload_json TEXT NOT NULL,
                ts         TEXT NOT NULL,
                prev_hash  TEXT NOT NULL,
                hash       TEXT NOT NULL,
                PRIMARY KEY (session_id, seq)
            );
            CREATE TABLE IF NOT EXISTS memory (
                session_id TEXT NOT NULL,
                key        TEXT NOT NULL,
                value_json TEXT NOT NULL,
                updated_ts TEXT NOT NULL,
                PRIMARY KEY (session_id, key)
            );",
        )
        .map_err(|e| AriaError::AuditWriteFailure(format!("initializing schema: {e}")))?;
        Ok(())
    }

    /// Append one record to `session_id`'s chain, returning its sequence
    /// number. Scrubbing, hashing, and insertion happen inside a single
    /// transaction; any failure here is a CRITICAL invariant violation.
    pub fn append(&self, session_id: &str, kind: EventKind, payload: Value) -> Result<u64, AriaError> {
        let mut conn = self.conn.lock().expect("audit store mutex poisoned");
        let tx = conn
            .transaction()
            .map_err(|e| AriaError::AuditWriteFailure(format!("starting transaction: {e}")))?;

        let last: Option<(i64, String)> = tx
            .query_row(
                "SELECT seq, hash FROM audit WHERE session_id = ?1 ORDER BY seq DESC LIMIT 1",
                params![session_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .map_err(|e| AriaError::AuditWriteFailure(format!("reading last record: {e}")))?;

        let (seq, prev_hash) = match last {
            Some((last_seq, last_hash)) => ((last_seq + 1) as u64, last_hash),
            None => (0u64, ZERO_HASH.to_string()),
        };

        let scrubbed = self
            .scrubber
            .scrub(&payload)
            .map_err(|e| AriaError::AuditWriteFailure(format!("scrubber failure: {e}")))?;

        let hash = AuditRecord::compute_hash(session_id, seq, kind, &scrubbed, &prev_hash);
        let ts = Utc::now();
        let payload_text = serde_json::to_string(&scrubbed)
            .map_err(|e| AriaError::AuditWriteFailure(format!("serializing payload: {e}")))?;
        let kind_text = serde_json::to_value(kind)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_else(|| "UNKNOWN".into());

        tx.execute(
            "INSERT INTO audit (session_id, seq, kind, payload_json, ts, prev_hash, hash)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![session_id, seq as i64, kind_text, payload_text, ts.to_rfc3339(), prev_hash, hash],
        )
        .map_err(|e| AriaError::AuditWriteFailure(format!("inserting record: {e}")))?;

        tx.commit()
            .map_err(|e| AriaError::AuditWriteFailure(format!("committing transaction: {e}")))?;

        debug!(session_id, seq, kind = %kind, "audit record appended");
        Ok(seq)
    }

    fn read_all(&self, session_id: &str) -> Result<Vec<AuditRecord>, AriaError> {
        let conn = self.conn.lock().expect("audit store mutex poisoned");
        let mut stmt = conn
            .prepare(
                "SELECT session_id, seq, kind, payload_json, ts, prev_hash, hash
                 FROM audit WHERE session_id = ?1 ORDER BY seq ASC",
            )
            .map_err(|e| AriaError::AuditWriteFailure(format!("preparing query: {e}")))?;
        let rows = stmt
            .query_map(params![session_id], |row| {
                let kind_text: String = row.get(2)?;
                let payload_text: String = row.get(3)?;
                let ts_text: String = row.get(4)?;
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?, kind_text, payload_text, ts_text, row.get::<_, String>(5)?, row.get::<_, String>(6)?))
            })
            .map_err(|e| AriaError::AuditWriteFailure(format!("querying records: {e}")))?;

        let mut out = Vec::new();
        for row in rows {
            let (sid, seq, kind_text, payload_text, ts_text, prev_hash, hash) =
                row.map_err(|e| AriaError::AuditWriteFailure(format!("reading row: {e}")))?;
            let kind: EventKind = serde_json::from_value(Value::String(kind_text.clone()))
                .map_err(|e| AriaError::AuditWriteFailure(format!("decoding kind '{kind_text}': {e}")))?;
            let payload: Value = serde_json::from_str(&payload_text)
                .map_err(|e| AriaError::AuditWriteFailure(format!("decoding payload: {e}")))?;
            let ts: DateTime<Utc> = DateTime::parse_from_rfc3339(&ts_text)
                .map_err(|e| AriaError::AuditWriteFailure(format!("decoding timestamp: {e}")))?
                .with_timezone(&Utc);
            out.push(AuditRecord { session_id: sid, seq: seq as u64, kind, payload, ts, prev_hash, hash });
        }
        Ok(out)
    }

    /// Recompute every hash in seq order; return the first offending seq,
    /// or `Ok` if the chain is intact. Deterministic and side-effect-free.
    pub fn verify(&self, session_id: &str) -> Result<VerifyOutcome, AriaError> {
        let records = self.read_all(session_id)?;
        let mut expected_prev = ZERO_HASH.to_string();
        for r in &records {
            if r.prev_hash != expected_prev || !r.hash_is_valid() {
                error!(session_id, seq = r.seq, "audit chain broken");
                return Ok(VerifyOutcome::BrokenAt(r.seq));
            }
            expected_prev = r.hash.clone();
        }
        Ok(VerifyOutcome::Ok)
    }

    /// Serialize a session's chain as JSON (array, seq order) or a
    /// human-readable text summary with hash fragments.
    pub fn export(&self, session_id: &str, format: ExportFormat) -> Result<Vec<u8>, AriaError> {
        let records = self.read_all(session_id)?;
        match format {
            ExportFormat::Json => serde_json::to_vec(&records)
                .map_err(|e| AriaError::AuditWriteFailure(format!("serializing export: {e}"))),
            ExportFormat::Text => {
                let mut out = String::new();
                for r in &records {
                    out.push_str(&format!(
                        "[{}] seq={} kind={} hash={}… prev={}…\n",
                        r.ts.to_rfc3339(),
                        r.seq,
                        r.kind,
                        &r.hash[..8.min(r.hash.len())],
                        &r.prev_hash[..8.min(r.prev_hash.len())],
                    ));
                }
                Ok(out.into_bytes())
            }
        }
    }

    /// Most recent records across all sessions, newest first (CLI `audit.list`).
    pub fn list_recent(&self, limit: usize) -> Result<Vec<AuditRecord>, AriaError> {
        let conn = self.conn.lock().expect("audit store mutex poisoned");
        let mut stmt = conn
            .prepare(
                "SELECT session_id, seq, kind, payload_json, ts, prev_hash, hash
                 FROM audit ORDER BY ts DESC LIMIT ?1",
            )
            .map_err(|e| AriaError::AuditWriteFailure(format!("preparing query: {e}")))?;
        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                    row.get::<_, String>(6)?,
                ))
            })
            .map_err(|e| AriaError::AuditWriteFailure(format!("querying records: {e}")))?;
        let mut out = Vec::new();
        for row in rows {
            let (sid, seq, kind_text, payload_text, ts_text, prev_hash, hash) =
                row.map_err(|e| AriaError::AuditWriteFailure(format!("reading row: {e}")))?;
            let kind: EventKind = serde_json::from_value(Value::String(kind_text))
                .map_err(|e| AriaError::AuditWriteFailure(format!("decoding kind: {e}")))?;
            let payload: Value = serde_json::from_str(&payload_text)
                .map_err(|e| AriaError::AuditWriteFailure(format!("decoding payload: {e}")))?;
            let ts = DateTime::parse_from_rfc3339(&ts_text)
                .map_err(|e| AriaError::AuditWriteFailure(format!("decoding timestamp: {e}")))?
                .with_timezone(&Utc);
            out.push(AuditRecord { session_id: sid, seq: seq as u64, kind, payload, ts, prev_hash, hash });
        }
        Ok(out)
    }

    pub fn memory_set(&self, session_id: &str, key: &str, value: &Value) -> Result<(), AriaError> {
        let conn = self.conn.lock().expect("audit store mutex poisoned");
        let value_text = serde_json::to_string(value)
            .map_err(|e| AriaError::AuditWriteFailure(format!("serializing memory value: {e}")))?;
        conn.execute(
            "INSERT INTO memory (session_id, key, value_json, updated_ts) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(session_id, key) DO UPDATE SET value_json = excluded.value_json, updated_ts = excluded.updated_ts",
            params![session_id, key, value_text, Utc::now().to_rfc3339()],
        )
        .map_err(|e| AriaError::AuditWriteFailure(format!("writing memory: {e}")))?;
        Ok(())
    }

    pub fn memory_get(&self, session_id: &str, key: &str) -> Result<Option<Value>, AriaError> {
        let conn = self.conn.lock().expect("audit store mutex poisoned");
        let text: Option<String> = conn
            .query_row(
                "SELECT value_json FROM memory WHERE session_id = ?1 AND key = ?2",
                params![session_id, key],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| AriaError::AuditWriteFailure(format!("reading memory: {e}")))?;
        match text {
            Some(t) => Ok(Some(
                serde_json::from_str(&t)
                    .map_err(|e| AriaError::AuditWriteFailure(format!("decoding memory value: {e}")))?,
            )),
            None => Ok(None),
        }
    }
}
