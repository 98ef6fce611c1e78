use rusqlite::Row;
use serde::{Deserialize, Serialize};

/// Many-to-many edge recording that an account has been used with a directory
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Association {
    pub id: i64,
    pub account_id: i64,
    pub directory_id: i64,
    pub created_at: String,
}

/// Association joined with the names of both endpoints, for listings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AssociationView {
    pub id: i64,
    pub account_id: i64,
    pub directory_id: i64,
    pub account_name: String,
    pub directory_name: String,
    pub created_at: String,
}

impl<'r> TryFrom<&Row<'r>> for Association {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'r>) -> Result<Self, Self::Error> {
        Ok(Association {
            id: row.get(0)?,
            account_id: row.get(1)?,
            directory_id: row.get(2)?,
            created_at: row.get(3)?,
        })
    }
}

impl<'r> TryFrom<&Row<'r>> for AssociationView {
    type Error = rusqlite::Error;

    fn try_from(row: &Row<'r>) -> Result<Self, Self::Error> {
        Ok(AssociationView {
            id: row.get(0)?,
            account_id: row.get(1)?,
            directory_id: row.get(2)?,
            account_name: row.get(3)?,
            directory_name: row.get(4)?,
            created_at: row.get(5)?,
        })
    }
}
