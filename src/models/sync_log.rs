use rusqlite::Row;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SyncType {
    Upload,
    Download,
}

impl SyncType {
    pub fn as_str(&self) -> &str {
        match self {
            SyncType::Upload => "upload",
            SyncType::Download => "download",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "download" => SyncType::Download,
            _ => SyncType::Upload,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Success,
    Failed,
    Warning,
}

impl SyncStatus {
    pub fn as_str(&self) -> &str {
        match self {
            SyncStatus::Success => "success",
            SyncStatus::Failed => "failed",
            SyncStatus::Warning => "warning",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "success" => SyncStatus::Success,
            "warning" => SyncStatus::Warning,
            _ => SyncStatus::Failed,
        }
    }
}

/// One row of the append-only sync ledger
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncLog {
    pub id: i64,
    pub webdav_config_id: Option<i64>,
    pub sync_type: SyncType,
    pub status: SyncStatus,
    pub message: Option<String>,
    pub synced_at: String,
}

impl<'r> TryFrom<&Row<'r>> for SyncLog {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'r>) -> Result<Self, Self::Error> {
        let sync_type: String = row.get(2)?;
        let status: String = row.get(3)?;
        Ok(SyncLog {
            id: row.get(0)?,
            webdav_config_id: row.get(1)?,
            sync_type: SyncType::from_str(&sync_type),
            status: SyncStatus::from_str(&status),
            message: row.get(4)?,
            synced_at: row.get(5)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_type_roundtrip() {
        assert_eq!(SyncType::from_str("upload"), SyncType::Upload);
        assert_eq!(SyncType::from_str("download"), SyncType::Download);
        assert_eq!(SyncStatus::from_str("warning"), SyncStatus::Warning);
    }
}
