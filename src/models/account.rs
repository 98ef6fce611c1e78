use crate::error::AppError;
use rusqlite::Row;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Account {
    pub id: Option<i64>,
    pub uuid: String,
    pub name: String,
    pub token: String,
    pub base_url: String,
    pub model: Option<String>,
    /// Free-form per-account env vars; reserved keys are rejected at entry
    #[serde(default)]
    pub custom_env: BTreeMap<String, serde_json::Value>,
    #[serde(default)]
    pub is_active: bool,
}

impl Account {
    /// Creates a new account with generated UUID
    pub fn new(name: String, token: String, base_url: String) -> Self {
        Self {
            id: None,
            uuid: uuid::Uuid::new_v4().to_string(),
            name,
            token,
            base_url,
            model: None,
            custom_env: BTreeMap::new(),
            is_active: false,
        }
    }

    /// Validates all fields of the account
    pub fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() {
            return Err(AppError::Validation("Name must not be empty".to_string()));
        }

        if self.name.len() > 100 {
            return Err(AppError::Validation(
                "Name must not exceed 100 characters".to_string(),
            ));
        }

        if self.token.trim().is_empty() {
            return Err(AppError::Validation("Token must not be empty".to_string()));
        }

        crate::models::validate_endpoint_url(&self.base_url)?;

        Ok(())
    }
}

impl<'r> TryFrom<&Row<'r>> for Account {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'r>) -> Result<Self, Self::Error> {
        let name: String = row.get(2)?;
        let custom_env_json: String = row.get(6)?;
        let custom_env: BTreeMap<String, serde_json::Value> =
            serde_json::from_str(&custom_env_json).unwrap_or_else(|e| {
                log::error!(
                    "stored custom env of account '{}' is not valid JSON, treating as empty: {}",
                    name,
                    e
                );
                BTreeMap::new()
            });

        Ok(Account {
            id: Some(row.get(0)?),
            uuid: row.get(1)?,
            name,
            token: row.get(3)?,
            base_url: row.get(4)?,
            model: row.get(5)?,
            custom_env,
            is_active: row.get(7)?,
        })
    }
}

/// Pagination metadata for account listings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PaginationInfo {
    pub page: i64,
    pub per_page: i64,
    pub total: i64,
    pub pages: i64,
    pub has_prev: bool,
    pub has_next: bool,
    pub prev_num: Option<i64>,
    pub next_num: Option<i64>,
}

impl PaginationInfo {
    pub fn new(page: i64, per_page: i64, total: i64, pages: i64) -> Self {
        let has_prev = page > 1;
        let has_next = page < pages;
        Self {
            page,
            per_page,
            total,
            pages,
            has_prev,
            has_next,
            prev_num: has_prev.then(|| page - 1),
            next_num: has_next.then(|| page + 1),
        }
    }
}

/// One page of accounts plus pagination metadata
#[derive(Debug, Serialize, Deserialize)]
pub struct AccountPage {
    pub accounts: Vec<Account>,
    pub pagination: PaginationInfo,
}

/// Listing filter for accounts
#[derive(Debug, Default, Clone)]
pub struct AccountFilter {
    pub search: Option<String>,
    pub base_url: Option<String>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}
