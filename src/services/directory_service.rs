use crate::error::AppError;
use crate::models::Directory;
use crate::services::op_guard;
use rusqlite::{params, Connection, OptionalExtension};

const DIRECTORY_COLUMNS: &str = "id, uuid, name, path, is_active";

fn ensure_unique_path(
    conn: &Connection,
    path: &str,
    exclude_id: Option<i64>,
) -> Result<(), AppError> {
    let taken: Option<i64> = conn
        .query_row(
            "SELECT id FROM directories WHERE path = ?1 AND (?2 IS NULL OR id != ?2)",
            params![path, exclude_id],
            |row| row.get(0),
        )
        .optional()?;

    if taken.is_some() {
        return Err(AppError::Uniqueness {
            field: "path",
            value: path.to_string(),
        });
    }
    Ok(())
}

pub fn create_directory(conn: &Connection, directory: &Directory) -> Result<i64, AppError> {
    directory.validate()?;
    ensure_unique_path(conn, &directory.path, None)?;

    // Registration never requires the path to exist on disk.
    if !check_directory_exists(&directory.path) {
        log::warn!("registering directory {} which is absent on disk", directory.path);
    }

    conn.execute(
        "INSERT INTO directories (uuid, name, path, is_active) VALUES (?1, ?2, ?3, ?4)",
        params![
            directory.uuid,
            directory.name,
            directory.path,
            directory.is_active
        ],
    )?;

    Ok(conn.last_insert_rowid())
}

pub fn get_directory(conn: &Connection, id: i64) -> Result<Directory, AppError> {
    let sql = format!("SELECT {} FROM directories WHERE id = ?1", DIRECTORY_COLUMNS);
    conn.query_row(&sql, params![id], |row| Directory::try_from(row))
        .optional()?
        .ok_or_else(|| AppError::NotFound(format!("directory {}", id)))
}

pub fn get_directory_by_path(conn: &Connection, path: &str) -> Result<Option<Directory>, AppError> {
    let sql = format!("SELECT {} FROM directories WHERE path = ?1", DIRECTORY_COLUMNS);
    Ok(conn
        .query_row(&sql, params![path], |row| Directory::try_from(row))
        .optional()?)
}

pub fn get_active_directory(conn: &Connection) -> Result<Option<Directory>, AppError> {
    let sql = format!(
        "SELECT {} FROM directories WHERE is_active = 1",
        DIRECTORY_COLUMNS
    );
    Ok(conn
        .query_row(&sql, [], |row| Directory::try_from(row))
        .optional()?)
}

pub fn list_directories(conn: &Connection) -> Result<Vec<Directory>, AppError> {
    let sql = format!(
        "SELECT {} FROM directories ORDER BY created_at DESC, id DESC",
        DIRECTORY_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let directories = stmt
        .query_map([], |row| Directory::try_from(row))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(directories)
}

pub fn update_directory(conn: &Connection, directory: &Directory) -> Result<(), AppError> {
    let id = directory
        .id
        .ok_or_else(|| AppError::Validation("directory has no id".to_string()))?;
    directory.validate()?;
    ensure_unique_path(conn, &directory.path, Some(id))?;

    let changed = conn.execute(
        "UPDATE directories SET name = ?1, path = ?2, is_active = ?3 WHERE id = ?4",
        params![directory.name, directory.path, directory.is_active, id],
    )?;

    if changed == 0 {
        return Err(AppError::NotFound(format!("directory {}", id)));
    }
    Ok(())
}

/// Deletes a directory row and its associations. Fails fast when a switch
/// targeting the same directory is still running.
pub fn delete_directory(conn: &Connection, id: i64) -> Result<(), AppError> {
    let _guard = op_guard::acquire("directory", id)?;

    let changed = conn.execute("DELETE FROM directories WHERE id = ?1", params![id])?;
    if changed == 0 {
        return Err(AppError::NotFound(format!("directory {}", id)));
    }
    Ok(())
}

/// Opportunistic existence probe for a path. Failures to stat are treated
/// as "absent"; callers only ever warn on the result.
pub fn check_directory_exists(path: &str) -> bool {
    std::path::Path::new(path).is_dir()
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

    fn sample(name: &str, path: &str) -> Directory {
        Directory::new(name.to_string(), path.to_string())
    }

    #[test]
    fn test_create_and_list() {
        let conn = test_connection();
        let id = create_directory(&conn, &sample("a", "/tmp/project-a")).unwrap();
        create_directory(&conn, &sample("b", "/tmp/project-b")).unwrap();

        let all = list_directories(&conn).unwrap();
        assert_eq!(all.len(), 2);

        let loaded = get_directory(&conn, id).unwrap();
        assert_eq!(loaded.path, "/tmp/project-a");
        assert!(!loaded.is_active);
    }

    #[test]
    fn test_duplicate_path_rejected() {
        let conn = test_connection();
        create_directory(&conn, &sample("one", "/tmp/project")).unwrap();

        let err = create_directory(&conn, &sample("two", "/tmp/project")).unwrap_err();
        assert!(matches!(err, AppError::Uniqueness { field: "path", .. }));
    }

    #[test]
    fn test_missing_path_is_allowed() {
        let conn = test_connection();
        let id = create_directory(&conn, &sample("ghost", "/definitely/not/present")).unwrap();
        assert!(get_directory(&conn, id).is_ok());
    }

    #[test]
    fn test_delete_fails_fast_while_directory_is_busy() {
        let _serial = op_guard::test_serial_lock();
        let conn = test_connection();
        let id = create_directory(&conn, &sample("busy", "/tmp/busy-dir")).unwrap();

        let _held = op_guard::acquire("directory", id).unwrap();
        assert!(matches!(
            delete_directory(&conn, id),
            Err(AppError::Busy(_))
        ));
        // The row is untouched.
        assert!(get_directory(&conn, id).is_ok());
    }

    #[test]
    fn test_delete_missing_directory() {
        let _serial = op_guard::test_serial_lock();
        let conn = test_connection();
        assert!(matches!(
            delete_directory(&conn, 7),
            Err(AppError::NotFound(_))
        ));
    }
}
