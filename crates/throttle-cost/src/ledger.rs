// SPDX-FileCopyrightText: 2026 Throttle Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Append-only routing log persisted to SQLite.
//!
//! Every proxied request produces exactly one [`LogEntry`]. Rows are only ever
//! inserted: triggers on the `routing_log` table reject UPDATE and DELETE.
//! Prompt text is never stored, only its SHA-256 digest.

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use strum::{Display, EnumString};
use throttle_core::{ClientDialect, ProviderId, RoutingMode, ThrottleError, Tier, TokenUsage};
use tracing::debug;

use crate::pricing::{ModelPricing, calculate_cost};

/// Outcome recorded for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LogStatus {
    /// The upstream answered and the response reached the client.
    Ok,
    /// The upstream call failed before any content was produced.
    Error,
    /// A stream ended without a terminal signal (client gone or upstream cut off).
    Aborted,
}

/// One durable routing record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub request_id: String,
    /// ISO 8601 UTC timestamp with millisecond precision.
    pub timestamp: String,
    /// SHA-256 hex digest of the classified prompt text.
    pub prompt_hash: String,
    pub composite_score: f64,
    pub tier: Tier,
    pub selected_model: String,
    pub provider: ProviderId,
    pub mode: RoutingMode,
    pub is_override: bool,
    /// `forced` or `inherited` when `is_override` is set.
    pub override_kind: Option<String>,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub estimated_cost_usd: f64,
    pub latency_ms: u64,
    pub parent_request_id: Option<String>,
    pub dialect: ClientDialect,
    pub stream: bool,
    pub status: LogStatus,
}

impl LogEntry {
    /// Fill in token counts, cost and latency from a finished call.
    ///
    /// Cost is always derived from `pricing` and `usage` so the two never drift.
    pub fn complete(
        &mut self,
        usage: TokenUsage,
        pricing: &ModelPricing,
        latency_ms: u64,
        status: LogStatus,
    ) {
        self.input_tokens = usage.input_tokens;
        self.output_tokens = usage.output_tokens;
        self.estimated_cost_usd = calculate_cost(&usage, pricing);
        self.latency_ms = latency_ms;
        self.status = status;
    }

    pub fn usage(&self) -> TokenUsage {
        TokenUsage::new(self.input_tokens, self.output_tokens)
    }
}

/// SHA-256 hex digest of a prompt.
pub fn hash_prompt(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

/// Current time in the log's timestamp format.
pub fn now_timestamp() -> String {
    format_timestamp(chrono::Utc::now())
}

/// Format a UTC instant the way log timestamps are stored.
pub fn format_timestamp(at: chrono::DateTime<chrono::Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS routing_log (
    request_id TEXT PRIMARY KEY NOT NULL,
    timestamp TEXT NOT NULL,
    prompt_hash TEXT NOT NULL,
    composite_score REAL NOT NULL,
    tier TEXT NOT NULL,
    selected_model TEXT NOT NULL,
    provider TEXT NOT NULL,
    mode TEXT NOT NULL,
    is_override INTEGER NOT NULL,
    override_kind TEXT,
    input_tokens INTEGER NOT NULL DEFAULT 0,
    output_tokens INTEGER NOT NULL DEFAULT 0,
    estimated_cost_usd REAL NOT NULL DEFAULT 0.0,
    latency_ms INTEGER NOT NULL DEFAULT 0,
    parent_request_id TEXT,
    dialect TEXT NOT NULL,
    stream INTEGER NOT NULL,
    status TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_routing_log_timestamp ON routing_log(timestamp);
CREATE TRIGGER IF NOT EXISTS routing_log_no_update BEFORE UPDATE ON routing_log
BEGIN SELECT RAISE(ABORT, 'routing_log is append-only'); END;
CREATE TRIGGER IF NOT EXISTS routing_log_no_delete BEFORE DELETE ON routing_log
BEGIN SELECT RAISE(ABORT, 'routing_log is append-only'); END;
";

const COLUMNS: &str = "request_id, timestamp, prompt_hash, composite_score, tier, \
     selected_model, provider, mode, is_override, override_kind, input_tokens, \
     output_tokens, estimated_cost_usd, latency_ms, parent_request_id, dialect, stream, status";

/// Convert a tokio-rusqlite error into ThrottleError::Storage.
fn map_tr_err(e: tokio_rusqlite::Error<rusqlite::Error>) -> ThrottleError {
    ThrottleError::Storage {
        source: Box::new(e),
    }
}

/// Handle to the routing log table.
///
/// All operations go through the single tokio-rusqlite background thread.
/// Cloning shares the same connection.
#[derive(Clone)]
pub struct RoutingLog {
    conn: tokio_rusqlite::Connection,
}

impl RoutingLog {
    /// Open (creating if needed) the routing log at `path`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, ThrottleError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ThrottleError::Storage {
                source: Box::new(e),
            })?;
        }
        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(|e| ThrottleError::Storage {
                source: Box::new(e),
            })?;
        conn.call(|conn| -> Result<(), rusqlite::Error> {
            conn.execute_batch("PRAGMA journal_mode = WAL;")
        })
        .await
        .map_err(map_tr_err)?;
        Self::with_connection(conn).await
    }

    /// In-memory log that disappears with the process.
    pub async fn open_in_memory() -> Result<Self, ThrottleError> {
        let conn = tokio_rusqlite::Connection::open_in_memory()
            .await
            .map_err(|e| ThrottleError::Storage {
                source: Box::new(e),
            })?;
        Self::with_connection(conn).await
    }

    async fn with_connection(conn: tokio_rusqlite::Connection) -> Result<Self, ThrottleError> {
        conn.call(|conn| -> Result<(), rusqlite::Error> { conn.execute_batch(SCHEMA) })
            .await
            .map_err(map_tr_err)?;
        Ok(Self { conn })
    }

    /// Insert one entry.
    pub async fn insert(&self, entry: &LogEntry) -> Result<(), ThrottleError> {
        let e = entry.clone();
        self.conn
            .call(move |conn| -> Result<usize, rusqlite::Error> {
                conn.execute(
                    &format!(
                        "INSERT INTO routing_log ({COLUMNS}) VALUES \
                         (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)"
                    ),
                    rusqlite::params![
                        e.request_id,
                        e.timestamp,
                        e.prompt_hash,
                        e.composite_score,
                        e.tier.to_string(),
                        e.selected_model,
                        e.provider.to_string(),
                        e.mode.to_string(),
                        e.is_override,
                        e.override_kind,
                        e.input_tokens,
                        e.output_tokens,
                        e.estimated_cost_usd,
                        i64::try_from(e.latency_ms).unwrap_or(i64::MAX),
                        e.parent_request_id,
                        e.dialect.to_string(),
                        e.stream,
                        e.status.to_string(),
                    ],
                )
            })
            .await
            .map_err(map_tr_err)?;

        debug!(
            request_id = %entry.request_id,
            model = %entry.selected_model,
            status = %entry.status,
            cost_usd = entry.estimated_cost_usd,
            "routing log entry written"
        );
        Ok(())
    }

    /// Entries at or after `since` (ISO 8601), oldest first.
    pub async fn read_since(&self, since: &str) -> Result<Vec<LogEntry>, ThrottleError> {
        let since = since.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<LogEntry>, rusqlite::Error> {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {COLUMNS} FROM routing_log WHERE timestamp >= ?1 \
                     ORDER BY timestamp ASC, rowid ASC"
                ))?;
                let rows = stmt.query_map(rusqlite::params![since], row_to_entry)?;
                rows.collect()
            })
            .await
            .map_err(map_tr_err)
    }

    /// The `n` most recent entries, oldest first.
    pub async fn tail(&self, n: usize) -> Result<Vec<LogEntry>, ThrottleError> {
        let limit = i64::try_from(n).unwrap_or(i64::MAX);
        let mut entries = self
            .conn
            .call(move |conn| -> Result<Vec<LogEntry>, rusqlite::Error> {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {COLUMNS} FROM routing_log ORDER BY rowid DESC LIMIT ?1"
                ))?;
                let rows = stmt.query_map(rusqlite::params![limit], row_to_entry)?;
                rows.collect()
            })
            .await
            .map_err(map_tr_err)?;
        entries.reverse();
        Ok(entries)
    }

    /// Look up one entry by request id.
    pub async fn find(&self, request_id: &str) -> Result<Option<LogEntry>, ThrottleError> {
        let request_id = request_id.to_string();
        self.conn
            .call(move |conn| -> Result<Option<LogEntry>, rusqlite::Error> {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {COLUMNS} FROM routing_log WHERE request_id = ?1 LIMIT 1"
                ))?;
                let mut rows = stmt.query_map(rusqlite::params![request_id], row_to_entry)?;
                let found = rows.next().transpose()?;
                Ok(found)
            })
            .await
            .map_err(map_tr_err)
    }
}

fn parse_column<T>(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse::<T>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn row_to_entry(row: &rusqlite::Row<'_>) -> rusqlite::Result<LogEntry> {
    let latency: i64 = row.get(13)?;
    Ok(LogEntry {
        request_id: row.get(0)?,
        timestamp: row.get(1)?,
        prompt_hash: row.get(2)?,
        composite_score: row.get(3)?,
        tier: parse_column(row, 4)?,
        selected_model: row.get(5)?,
        provider: parse_column(row, 6)?,
        mode: parse_column(row, 7)?,
        is_override: row.get(8)?,
        override_kind: row.get(9)?,
        input_tokens: row.get(10)?,
        output_tokens: row.get(11)?,
        estimated_cost_usd: row.get(12)?,
        latency_ms: u64::try_from(latency).unwrap_or(0),
        parent_request_id: row.get(14)?,
        dialect: parse_column(row, 15)?,
        stream: row.get(16)?,
        status: parse_column(row, 17)?,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_entry(request_id: &str, timestamp: &str) -> LogEntry {
        let mut entry = LogEntry {
            request_id: request_id.to_string(),
            timestamp: timestamp.to_string(),
            prompt_hash: hash_prompt("What is 2+2?"),
            composite_score: 0.042,
            tier: Tier::Simple,
            selected_model: "gemini-2.5-flash".to_string(),
            provider: ProviderId::Google,
            mode: RoutingMode::Standard,
            is_override: false,
            override_kind: None,
            input_tokens: 0,
            output_tokens: 0,
            estimated_cost_usd: 0.0,
            latency_ms: 0,
            parent_request_id: None,
            dialect: ClientDialect::OpenAi,
            stream: false,
            status: LogStatus::Ok,
        };
        entry.complete(
            TokenUsage::new(1000, 500),
            &ModelPricing::new(0.30, 2.50),
            420,
            LogStatus::Ok,
        );
        entry
    }

    #[test]
    fn prompt_hash_is_sha256_hex() {
        let h = hash_prompt("hello");
        assert_eq!(
            h,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert!(!h.contains("hello"));
    }

    #[test]
    fn complete_derives_cost_from_pricing() {
        let entry = sample_entry("r1", "2026-03-01T10:00:00.000Z");
        let expected = calculate_cost(&TokenUsage::new(1000, 500), &ModelPricing::new(0.30, 2.50));
        assert_eq!(entry.estimated_cost_usd, expected);
        assert_eq!(entry.latency_ms, 420);
    }

    #[tokio::test]
    async fn insert_then_find_round_trips_every_field() {
        let log = RoutingLog::open_in_memory().await.unwrap();
        let mut entry = sample_entry("req-1", "2026-03-01T10:00:00.000Z");
        entry.is_override = true;
        entry.override_kind = Some("inherited".into());
        entry.parent_request_id = Some("req-0".into());
        entry.dialect = ClientDialect::Anthropic;
        entry.stream = true;
        entry.status = LogStatus::Aborted;
        log.insert(&entry).await.unwrap();

        let found = log.find("req-1").await.unwrap().expect("entry should exist");
        assert_eq!(found, entry);
        assert!(log.find("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn read_since_filters_and_orders() {
        let log = RoutingLog::open_in_memory().await.unwrap();
        log.insert(&sample_entry("b", "2026-03-02T00:00:00.000Z")).await.unwrap();
        log.insert(&sample_entry("a", "2026-03-01T00:00:00.000Z")).await.unwrap();
        log.insert(&sample_entry("c", "2026-03-03T00:00:00.000Z")).await.unwrap();

        let since = log.read_since("2026-03-02").await.unwrap();
        let ids: Vec<_> = since.iter().map(|e| e.request_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[tokio::test]
    async fn tail_returns_latest_in_insert_order() {
        let log = RoutingLog::open_in_memory().await.unwrap();
        for i in 0..5 {
            log.insert(&sample_entry(&format!("r{i}"), "2026-03-01T00:00:00.000Z"))
                .await
                .unwrap();
        }
        let tail = log.tail(2).await.unwrap();
        let ids: Vec<_> = tail.iter().map(|e| e.request_id.as_str()).collect();
        assert_eq!(ids, vec!["r3", "r4"]);
    }

    #[tokio::test]
    async fn rows_cannot_be_updated_or_deleted() {
        let log = RoutingLog::open_in_memory().await.unwrap();
        log.insert(&sample_entry("r1", "2026-03-01T00:00:00.000Z")).await.unwrap();

        let result = log
            .conn
            .call(|conn| -> Result<usize, rusqlite::Error> {
                conn.execute("UPDATE routing_log SET tier = 'reasoning'", [])
            })
            .await;
        assert!(result.is_err());
        let result = log
            .conn
            .call(|conn| -> Result<usize, rusqlite::Error> {
                conn.execute("DELETE FROM routing_log", [])
            })
            .await;
        assert!(result.is_err());
        assert_eq!(log.tail(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn open_creates_file_and_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("routing.db");
        {
            let log = RoutingLog::open(&path).await.unwrap();
            log.insert(&sample_entry("persisted", "2026-03-01T00:00:00.000Z"))
                .await
                .unwrap();
        }
        let reopened = RoutingLog::open(&path).await.unwrap();
        assert!(reopened.find("persisted").await.unwrap().is_some());
    }
}
