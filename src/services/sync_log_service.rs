use crate::error::AppError;
use crate::models::{SyncLog, SyncStatus, SyncType};
use rusqlite::{params, Connection};

/// Appends one entry to the sync ledger. Entries are never updated or
/// deleted by the application.
pub fn record(
    conn: &Connection,
    webdav_config_id: Option<i64>,
    sync_type: SyncType,
    status: SyncStatus,
    message: Option<&str>,
) -> Result<i64, AppError> {
    conn.execute(
        "INSERT INTO sync_logs (webdav_config_id, sync_type, status, message)
         VALUES (?1, ?2, ?3, ?4)",
        params![webdav_config_id, sync_type.as_str(), status.as_str(), message],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Most recent entries first, optionally scoped to one remote.
pub fn query(
    conn: &Connection,
    webdav_config_id: Option<i64>,
    limit: i64,
) -> Result<Vec<SyncLog>, AppError> {
    let limit = limit.clamp(1, 500);
    let mut stmt = conn.prepare(
        "SELECT id, webdav_config_id, sync_type, status, message, synced_at
         FROM sync_logs
         WHERE (?1 IS NULL OR webdav_config_id = ?1)
         ORDER BY synced_at DESC, id DESC
         LIMIT ?2",
    )?;
    let logs = stmt
        .query_map(params![webdav_config_id, limit], |row| SyncLog::try_from(row))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(logs)
}
