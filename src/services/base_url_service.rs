use crate::error::AppError;
use crate::models::BaseUrl;
use rusqlite::{params, Connection, OptionalExtension};

const BASE_URL_COLUMNS: &str = "id, uuid, name, url, description, is_default";

/// Name and url carry independent uniqueness; each conflict is reported
/// against the field that collided.
fn ensure_unique(conn: &Connection, base_url: &BaseUrl) -> Result<(), AppError> {
    let exclude_id = base_url.id;

    let name_taken: Option<i64> = conn
        .query_row(
            "SELECT id FROM base_urls WHERE name = ?1 AND (?2 IS NULL OR id != ?2)",
            params![base_url.name, exclude_id],
            |row| row.get(0),
        )
        .optional()?;
    if name_taken.is_some() {
        return Err(AppError::Uniqueness {
            field: "name",
            value: base_url.name.clone(),
        });
    }

    let url_taken: Option<i64> = conn
        .query_row(
            "SELECT id FROM base_urls WHERE url = ?1 AND (?2 IS NULL OR id != ?2)",
            params![base_url.url, exclude_id],
            |row| row.get(0),
        )
        .optional()?;
    if url_taken.is_some() {
        return Err(AppError::Uniqueness {
            field: "url",
            value: base_url.url.clone(),
        });
    }

    Ok(())
}

fn clear_other_defaults(conn: &Connection, keep_id: i64) -> Result<(), AppError> {
    conn.execute(
        "UPDATE base_urls SET is_default = 0 WHERE id != ?1",
        params![keep_id],
    )?;
    Ok(())
}

pub fn create_base_url(conn: &Connection, base_url: &BaseUrl) -> Result<i64, AppError> {
    base_url.validate()?;
    ensure_unique(conn, base_url)?;

    conn.execute(
        "INSERT INTO base_urls (uuid, name, url, description, is_default)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            base_url.uuid,
            base_url.name,
            base_url.url,
            base_url.description,
            base_url.is_default,
        ],
    )?;
    let id = conn.last_insert_rowid();

    if base_url.is_default {
        clear_other_defaults(conn, id)?;
    }
    Ok(id)
}

pub fn get_base_url(conn: &Connection, id: i64) -> Result<BaseUrl, AppError> {
    let sql = format!("SELECT {} FROM base_urls WHERE id = ?1", BASE_URL_COLUMNS);
    conn.query_row(&sql, params![id], |row| BaseUrl::try_from(row))
        .optional()?
        .ok_or_else(|| AppError::NotFound(format!("base url {}", id)))
}

pub fn get_base_url_by_uuid(conn: &Connection, uuid: &str) -> Result<Option<BaseUrl>, AppError> {
    let sql = format!("SELECT {} FROM base_urls WHERE uuid = ?1", BASE_URL_COLUMNS);
    Ok(conn
        .query_row(&sql, params![uuid], |row| BaseUrl::try_from(row))
        .optional()?)
}

pub fn get_base_url_by_name(conn: &Connection, name: &str) -> Result<Option<BaseUrl>, AppError> {
    let sql = format!("SELECT {} FROM base_urls WHERE name = ?1", BASE_URL_COLUMNS);
    Ok(conn
        .query_row(&sql, params![name], |row| BaseUrl::try_from(row))
        .optional()?)
}

pub fn get_default_base_url(conn: &Connection) -> Result<Option<BaseUrl>, AppError> {
    let sql = format!(
        "SELECT {} FROM base_urls WHERE is_default = 1",
        BASE_URL_COLUMNS
    );
    Ok(conn
        .query_row(&sql, [], |row| BaseUrl::try_from(row))
        .optional()?)
}

pub fn list_base_urls(conn: &Connection) -> Result<Vec<BaseUrl>, AppError> {
    let sql = format!(
        "SELECT {} FROM base_urls ORDER BY is_default DESC, name",
        BASE_URL_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let urls = stmt
        .query_map([], |row| BaseUrl::try_from(row))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(urls)
}

pub fn update_base_url(conn: &Connection, base_url: &BaseUrl) -> Result<(), AppError> {
    let id = base_url
        .id
        .ok_or_else(|| AppError::Validation("base url has no id".to_string()))?;
    base_url.validate()?;
    ensure_unique(conn, base_url)?;

    let changed = conn.execute(
        "UPDATE base_urls SET name = ?1, url = ?2, description = ?3, is_default = ?4 WHERE id = ?5",
        params![
            base_url.name,
            base_url.url,
            base_url.description,
            base_url.is_default,
            id,
        ],
    )?;
    if changed == 0 {
        return Err(AppError::NotFound(format!("base url {}", id)));
    }

    if base_url.is_default {
        clear_other_defaults(conn, id)?;
    }
    Ok(())
}

/// Marks one endpoint as the default and clears the flag everywhere else.
pub fn set_default_base_url(conn: &Connection, id: i64) -> Result<(), AppError> {
    // The flip below touches every row; verify the target exists first.
    get_base_url(conn, id)?;
    conn.execute("UPDATE base_urls SET is_default = (id = ?1)", params![id])?;
    Ok(())
}

pub fn delete_base_url(conn: &Connection, id: i64) -> Result<(), AppError> {
    let changed = conn.execute("DELETE FROM base_urls WHERE id = ?1", params![id])?;
    if changed == 0 {
        return Err(AppError::NotFound(format!("base url {}", id)));
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

    fn sample(name: &str, url: &str) -> BaseUrl {
        BaseUrl::new(name.to_string(), url.to_string())
    }

    #[test]
    fn test_name_and_url_are_independently_unique() {
        let conn = test_connection();
        create_base_url(&conn, &sample("prod", "https://api.anthropic.com")).unwrap();

        let err = create_base_url(&conn, &sample("prod", "https://other.example.com")).unwrap_err();
        assert!(matches!(err, AppError::Uniqueness { field: "name", .. }));

        let err = create_base_url(&conn, &sample("mirror", "https://api.anthropic.com")).unwrap_err();
        assert!(matches!(err, AppError::Uniqueness { field: "url", .. }));
    }

    #[test]
    fn test_single_default_invariant() {
        let conn = test_connection();
        let first = create_base_url(&conn, &sample("a", "https://a.example.com")).unwrap();
        let second = create_base_url(&conn, &sample("b", "https://b.example.com")).unwrap();

        set_default_base_url(&conn, first).unwrap();
        set_default_base_url(&conn, second).unwrap();

        let defaults: i64 = conn
            .query_row("SELECT COUNT(*) FROM base_urls WHERE is_default = 1", [], |r| r.get(0))
            .unwrap();
        assert_eq!(defaults, 1);
        assert_eq!(get_default_base_url(&conn).unwrap().unwrap().id, Some(second));
    }

    #[test]
    fn test_create_with_default_flag_clears_previous() {
        let conn = test_connection();
        let mut a = sample("a", "https://a.example.com");
        a.is_default = true;
        create_base_url(&conn, &a).unwrap();

        let mut b = sample("b", "https://b.example.com");
        b.is_default = true;
        create_base_url(&conn, &b).unwrap();

        assert_eq!(get_default_base_url(&conn).unwrap().unwrap().name, "b");
    }

    #[test]
    fn test_set_default_on_missing_id() {
        let conn = test_connection();
        create_base_url(&conn, &sample("a", "https://a.example.com")).unwrap();
        assert!(matches!(
            set_default_base_url(&conn, 99),
            Err(AppError::NotFound(_))
        ));
    }
}
