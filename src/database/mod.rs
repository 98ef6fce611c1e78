pub mod schema;

use crate::error::AppError;
use rusqlite::Connection;
use std::path::PathBuf;

/// Returns the directory holding the application database.
///
/// Prefers `$HOME/.claude-switch`; falls back to the current directory when
/// no home directory can be determined.
pub fn get_data_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .map(|home| home.join(".claude-switch"))
        .unwrap_or_else(|| PathBuf::from("./data"))
}

/// Returns the path of the database file
pub fn get_database_path() -> PathBuf {
    get_data_dir().join("claude_switch.db")
}

/// Opens the database at `path` and initializes the schema
pub fn open_database(path: &std::path::Path) -> Result<Connection, AppError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let conn = Connection::open(path)?;
    schema::init_schema(&conn)?;

    Ok(conn)
}

/// Opens the database at the default location
pub fn init_database() -> Result<Connection, AppError> {
    open_database(&get_database_path())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_database_creates_parent_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("test.db");

        let conn = open_database(&path).unwrap();
        let count: i32 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table'",
                [],
                |row| row.get(0),
            )
            .unwrap();

        assert!(count >= 7);
        assert!(path.exists());
    }
}
