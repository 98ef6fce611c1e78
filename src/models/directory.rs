use crate::error::AppError;
use rusqlite::Row;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Directory {
    pub id: Option<i64>,
    pub uuid: String,
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub is_active: bool,
}

impl Directory {
    /// Creates a new directory record with generated UUID
    pub fn new(name: String, path: String) -> Self {
        Self {
            id: None,
            uuid: uuid::Uuid::new_v4().to_string(),
            name,
            path,
            is_active: false,
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::Validation("Name must not be empty".to_string()));
        }
        if self.path.trim().is_empty() {
            return Err(AppError::Validation("Path must not be empty".to_string()));
        }
        Ok(())
    }

    /// Opportunistic filesystem probe; the record may legitimately outlive
    /// its target, so this is informational only.
    pub fn path_exists(&self) -> bool {
        std::path::Path::new(&self.path).exists()
    }
}

impl<'r> TryFrom<&Row<'r>> for Directory {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'r>) -> Result<Self, Self::Error> {
        Ok(Directory {
            id: Some(row.get(0)?),
            uuid: row.get(1)?,
            name: row.get(2)?,
            path: row.get(3)?,
            is_active: row.get(4)?,
        })
    }
}
