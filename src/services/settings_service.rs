use crate::error::AppError;
use crate::settings::SettingsDocument;
use rusqlite::{params, Connection, OptionalExtension};

/// Loads the global settings document. Falls back to the built-in default
/// when nothing has been saved yet or the stored JSON no longer parses.
pub fn load_settings(conn: &Connection) -> Result<SettingsDocument, AppError> {
    let stored: Option<String> = conn
        .query_row(
            "SELECT settings_json FROM claude_settings ORDER BY id LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()?;

    let mut document = match stored {
        Some(json) => match serde_json::from_str::<serde_json::Value>(&json) {
            Ok(raw) => SettingsDocument::from_value(&raw)?,
            Err(e) => {
                log::error!("stored settings are not valid JSON, using defaults: {}", e);
                SettingsDocument::default()
            }
        },
        None => SettingsDocument::default(),
    };

    document.normalize();
    Ok(document)
}

/// Persists the global settings document into its single backing row.
pub fn save_settings(conn: &Connection, document: &SettingsDocument) -> Result<(), AppError> {
    let json = serde_json::to_string(&document.to_value())?;

    let existing: Option<i64> = conn
        .query_row(
            "SELECT id FROM claude_settings ORDER BY id LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()?;

    match existing {
        Some(id) => {
            conn.execute(
                "UPDATE claude_settings SET settings_json = ?1 WHERE id = ?2",
                params![json, id],
            )?;
        }
        None => {
            conn.execute(
                "INSERT INTO claude_settings (settings_json) VALUES (?1)",
                params![json],
            )?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::schema;

    fn test_connection() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        schema::init_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn test_load_returns_default_when_empty() {
        let conn = test_connection();
        let document = load_settings(&conn).unwrap();
        assert_eq!(document, SettingsDocument::default());
    }

    #[test]
    fn test_save_then_load_round_trip() {
        let conn = test_connection();
        let mut document = SettingsDocument::default();
        document.set_max_output_tokens(Some(32000));
        document
            .set_custom_env("HTTP_PROXY", serde_json::json!("http://localhost:7890"))
            .unwrap();

        save_settings(&conn, &document).unwrap();
        let loaded = load_settings(&conn).unwrap();
        assert_eq!(loaded, document);
    }

    #[test]
    fn test_save_overwrites_single_row() {
        let conn = test_connection();
        save_settings(&conn, &SettingsDocument::default()).unwrap();

        let mut changed = SettingsDocument::default();
        changed.set_sandbox(false);
        save_settings(&conn, &changed).unwrap();

        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM claude_settings", [], |r| r.get(0))
            .unwrap();
        assert_eq!(rows, 1);
        assert_eq!(load_settings(&conn).unwrap(), changed);
    }

    #[test]
    fn test_corrupt_json_falls_back_to_default() {
        let conn = test_connection();
        conn.execute(
            "INSERT INTO claude_settings (settings_json) VALUES ('{not json')",
            [],
        )
        .unwrap();
        assert_eq!(load_settings(&conn).unwrap(), SettingsDocument::default());
    }
}
