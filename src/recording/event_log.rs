// src/recording/event_log.rs
//! Append-only clip and trigger log
//!
//! SQLite-backed record of every completed, truncated, or failed clip,
//! consumed read-only by the external dashboard. Appends commit before
//! they are acknowledged; a clip is not reported written until its record
//! is durable.

use crate::trigger::coordinator::TriggerReason;
use crate::utils::errors::{EngineError, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};
use ulid::Ulid;

/// Terminal state of a clip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ClipStatus {
    /// Written and durable
    Ok,

    /// Write failed; no file exists for this record
    Failed,
}

impl ClipStatus {
    fn as_str(&self) -> &'static str {
        match self {
            ClipStatus::Ok => "ok",
            ClipStatus::Failed => "failed",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "failed" => ClipStatus::Failed,
            _ => ClipStatus::Ok,
        }
    }
}

/// One clip's metadata, immutable once appended
#[derive(Debug, Clone, Serialize)]
pub struct ClipRecord {
    pub id: Ulid,
    pub camera_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub reason: TriggerReason,

    /// Container file; absent for failed writes
    pub path: Option<PathBuf>,

    /// Largest changed-pixel area observed during the clip
    pub peak_area: u32,

    pub frame_count: u32,

    /// Clip was cut short by pipeline shutdown
    pub truncated: bool,

    pub status: ClipStatus,
}

/// Append-only event log
pub struct EventLog {
    db: Arc<Mutex<Connection>>,
}

impl EventLog {
    /// Open (or create) the log database
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                EngineError::StorageFailed(format!("failed to create log directory: {}", e))
            })?;
        }

        let conn = Connection::open(path)
            .map_err(|e| EngineError::StorageFailed(format!("failed to open event log: {}", e)))?;

        let log = Self {
            db: Arc::new(Mutex::new(conn)),
        };
        log.init_schema().await?;

        info!(path = %path.display(), "Event log opened");
        Ok(log)
    }

    /// In-memory log for tests
    pub async fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| EngineError::StorageFailed(format!("failed to open event log: {}", e)))?;
        let log = Self {
            db: Arc::new(Mutex::new(conn)),
        };
        log.init_schema().await?;
        Ok(log)
    }

    async fn init_schema(&self) -> Result<()> {
        let db = self.db.lock().await;

        db.execute(
            r#"
            CREATE TABLE IF NOT EXISTS clips (
                id TEXT PRIMARY KEY,
                camera TEXT NOT NULL,
                started_at TEXT NOT NULL,
                ended_at TEXT NOT NULL,
                reason TEXT NOT NULL,
                path TEXT,
                peak_area INTEGER NOT NULL,
                frame_count INTEGER NOT NULL,
                truncated INTEGER NOT NULL,
                status TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )
            "#,
            [],
        )
        .map_err(|e| EngineError::StorageFailed(format!("schema creation failed: {}", e)))?;

        db.execute(
            "CREATE INDEX IF NOT EXISTS idx_clips_camera ON clips(camera, created_at)",
            [],
        )
        .map_err(|e| EngineError::StorageFailed(format!("index creation failed: {}", e)))?;

        Ok(())
    }

    /// Append a record. Returns only after the row is committed.
    pub async fn append(&self, record: &ClipRecord) -> Result<()> {
        let db = self.db.lock().await;

        db.execute(
            r#"
            INSERT INTO clips
                (id, camera, started_at, ended_at, reason, path, peak_area,
                 frame_count, truncated, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
            params![
                record.id.to_string(),
                record.camera_id,
                record.started_at.to_rfc3339(),
                record.ended_at.to_rfc3339(),
                record.reason.as_str(),
                record.path.as_ref().map(|p| p.to_string_lossy().to_string()),
                record.peak_area,
                record.frame_count,
                record.truncated as i64,
                record.status.as_str(),
                Utc::now().timestamp_micros(),
            ],
        )
        .map_err(|e| EngineError::StorageFailed(format!("failed to append clip record: {}", e)))?;

        debug!(clip = %record.id, camera = %record.camera_id, "Clip record appended");
        Ok(())
    }

    /// Most recent records first
    pub async fn recent(&self, limit: usize) -> Result<Vec<ClipRecord>> {
        self.query(
            "SELECT id, camera, started_at, ended_at, reason, path, peak_area,
                    frame_count, truncated, status
             FROM clips ORDER BY created_at DESC LIMIT ?",
            params![limit as i64],
        )
        .await
    }

    /// Most recent records for one camera
    pub async fn recent_for_camera(&self, camera: &str, limit: usize) -> Result<Vec<ClipRecord>> {
        self.query(
            "SELECT id, camera, started_at, ended_at, reason, path, peak_area,
                    frame_count, truncated, status
             FROM clips WHERE camera = ? ORDER BY created_at DESC LIMIT ?",
            params![camera, limit as i64],
        )
        .await
    }

    async fn query(
        &self,
        sql: &str,
        args: impl rusqlite::Params,
    ) -> Result<Vec<ClipRecord>> {
        let db = self.db.lock().await;

        let mut stmt = db
            .prepare(sql)
            .map_err(|e| EngineError::StorageFailed(format!("query preparation failed: {}", e)))?;

        let rows = stmt
            .query_map(args, |row| {
                let id: String = row.get(0)?;
                let started: String = row.get(2)?;
                let ended: String = row.get(3)?;
                let reason: String = row.get(4)?;
                let path: Option<String> = row.get(5)?;
                let status: String = row.get(9)?;

                Ok(ClipRecord {
                    id: Ulid::from_string(&id).unwrap_or_default(),
                    camera_id: row.get(1)?,
                    started_at: parse_time(&started),
                    ended_at: parse_time(&ended),
                    reason: parse_reason(&reason),
                    path: path.map(PathBuf::from),
                    peak_area: row.get(6)?,
                    frame_count: row.get(7)?,
                    truncated: row.get::<_, i64>(8)? != 0,
                    status: ClipStatus::parse(&status),
                })
            })
            .map_err(|e| EngineError::StorageFailed(format!("query execution failed: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| EngineError::StorageFailed(format!("row decoding failed: {}", e)))?;

        Ok(rows)
    }
}

fn parse_time(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn parse_reason(s: &str) -> TriggerReason {
    match s {
        "sensor" => TriggerReason::Sensor,
        "test" => TriggerReason::Test,
        _ => TriggerReason::Motion,
    }
}
