use crate::error::AppError;
use rusqlite::Row;
use serde::{Deserialize, Serialize};

/// WebDAV remote sync target
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WebdavConfig {
    pub id: Option<i64>,
    pub name: String,
    pub url: String,
    pub username: String,
    pub password: String,
    pub remote_path: String,
    pub auto_sync: bool,
    pub sync_interval: i64,
    #[serde(default)]
    pub is_active: bool,
    pub last_sync_at: Option<String>,
}

impl WebdavConfig {
    pub fn new(name: String, url: String, username: String, password: String) -> Self {
        Self {
            id: None,
            name,
            url,
            username,
            password,
            remote_path: "/claude-switch".to_string(),
            auto_sync: false,
            sync_interval: 3600,
            is_active: false,
            last_sync_at: None,
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::Validation("Name must not be empty".to_string()));
        }
        crate::models::validate_endpoint_url(&self.url)?;
        if self.username.trim().is_empty() {
            return Err(AppError::Validation(
                "Username must not be empty".to_string(),
            ));
        }
        if self.sync_interval <= 0 {
            return Err(AppError::Validation(
                "Sync interval must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl<'r> TryFrom<&Row<'r>> for WebdavConfig {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'r>) -> Result<Self, Self::Error> {
        Ok(WebdavConfig {
            id: Some(row.get(0)?),
            name: row.get(1)?,
            url: row.get(2)?,
            username: row.get(3)?,
            password: row.get(4)?,
            remote_path: row.get(5)?,
            auto_sync: row.get(6)?,
            sync_interval: row.get(7)?,
            is_active: row.get(8)?,
            last_sync_at: row.get(9)?,
        })
    }
}
