use crate::error::AppError;
use rusqlite::Row;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BaseUrl {
    pub id: Option<i64>,
    pub uuid: String,
    pub name: String,
    pub url: String,
    pub description: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

impl BaseUrl {
    pub fn new(name: String, url: String) -> Self {
        Self {
            id: None,
            uuid: uuid::Uuid::new_v4().to_string(),
            name,
            url,
            description: None,
            is_default: false,
        }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::Validation("Name must not be empty".to_string()));
        }
        crate::models::validate_endpoint_url(&self.url)?;
        Ok(())
    }
}

impl<'r> TryFrom<&Row<'r>> for BaseUrl {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'r>) -> Result<Self, Self::Error> {
        Ok(BaseUrl {
            id: Some(row.get(0)?),
            uuid: row.get(1)?,
            name: row.get(2)?,
            url: row.get(3)?,
            description: row.get(4)?,
            is_default: row.get(5)?,
        })
    }
}
