use crate::error::AppError;
use crate::models::WebdavConfig;
use rusqlite::{params, Connection, OptionalExtension};

const WEBDAV_COLUMNS: &str =
    "id, name, url, username, password, remote_path, auto_sync, sync_interval, is_active, last_sync_at";

// ---------------------------------------------------------------------------
// Config CRUD
// ---------------------------------------------------------------------------

fn ensure_unique_name(
    conn: &Connection,
    name: &str,
    exclude_id: Option<i64>,
) -> Result<(), AppError> {
    let taken: Option<i64> = conn
        .query_row(
            "SELECT id FROM webdav_configs WHERE name = ?1 AND (?2 IS NULL OR id != ?2)",
            params![name, exclude_id],
            |row| row.get(0),
        )
        .optional()?;

    if taken.is_some() {
        return Err(AppError::Uniqueness {
            field: "name",
            value: name.to_string(),
        });
    }
    Ok(())
}

pub fn create_config(conn: &Connection, config: &WebdavConfig) -> Result<i64, AppError> {
    config.validate()?;
    ensure_unique_name(conn, &config.name, None)?;

    conn.execute(
        "INSERT INTO webdav_configs
         (name, url, username, password, remote_path, auto_sync, sync_interval, is_active)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            config.name,
            config.url,
            config.username,
            config.password,
            config.remote_path,
            config.auto_sync,
            config.sync_interval,
            config.is_active,
        ],
    )?;
    let id = conn.last_insert_rowid();

    if config.is_active {
        activate_config(conn, id)?;
    }
    Ok(id)
}

pub fn get_config(conn: &Connection, id: i64) -> Result<WebdavConfig, AppError> {
    let sql = format!("SELECT {} FROM webdav_configs WHERE id = ?1", WEBDAV_COLUMNS);
    conn.query_row(&sql, params![id], |row| WebdavConfig::try_from(row))
        .optional()?
        .ok_or_else(|| AppError::NotFound(format!("webdav config {}", id)))
}

pub fn get_active_config(conn: &Connection) -> Result<Option<WebdavConfig>, AppError> {
    let sql = format!(
        "SELECT {} FROM webdav_configs WHERE is_active = 1",
        WEBDAV_COLUMNS
    );
    Ok(conn
        .query_row(&sql, [], |row| WebdavConfig::try_from(row))
        .optional()?)
}

pub fn list_configs(conn: &Connection) -> Result<Vec<WebdavConfig>, AppError> {
    let sql = format!(
        "SELECT {} FROM webdav_configs ORDER BY created_at DESC, id DESC",
        WEBDAV_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let configs = stmt
        .query_map([], |row| WebdavConfig::try_from(row))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(configs)
}

pub fn update_config(conn: &Connection, config: &WebdavConfig) -> Result<(), AppError> {
    let id = config
        .id
        .ok_or_else(|| AppError::Validation("webdav config has no id".to_string()))?;
    config.validate()?;
    ensure_unique_name(conn, &config.name, Some(id))?;

    let changed = conn.execute(
        "UPDATE webdav_configs
         SET name = ?1, url = ?2, username = ?3, password = ?4, remote_path = ?5,
             auto_sync = ?6, sync_interval = ?7, is_active = ?8
         WHERE id = ?9",
        params![
            config.name,
            config.url,
            config.username,
            config.password,
            config.remote_path,
            config.auto_sync,
            config.sync_interval,
            config.is_active,
            id,
        ],
    )?;
    if changed == 0 {
        return Err(AppError::NotFound(format!("webdav config {}", id)));
    }

    if config.is_active {
        activate_config(conn, id)?;
    }
    Ok(())
}

/// Makes one remote the active sync target; only one may be active.
pub fn activate_config(conn: &Connection, id: i64) -> Result<(), AppError> {
    get_config(conn, id)?;
    conn.execute(
        "UPDATE webdav_configs SET is_active = (id = ?1)",
        params![id],
    )?;
    Ok(())
}

pub fn delete_config(conn: &Connection, id: i64) -> Result<(), AppError> {
    let changed = conn.execute("DELETE FROM webdav_configs WHERE id = ?1", params![id])?;
    if changed == 0 {
        return Err(AppError::NotFound(format!("webdav config {}", id)));
    }
    Ok(())
}

pub fn touch_last_sync(conn: &Connection, id: i64) -> Result<(), AppError> {
    conn.execute(
        "UPDATE webdav_configs SET last_sync_at = CURRENT_TIMESTAMP WHERE id = ?1",
        params![id],
    )?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Remote client
// ---------------------------------------------------------------------------

/// Thin wrapper around a `reqwest_dav` client rooted at the config's
/// remote path.
pub struct WebdavClient {
    client: reqwest_dav::Client,
    remote_path: String,
}

impl WebdavClient {
    pub fn from_config(config: &WebdavConfig) -> Result<Self, AppError> {
        let client = reqwest_dav::ClientBuilder::new()
            .set_host(config.url.trim_end_matches('/').to_string())
            .set_auth(reqwest_dav::Auth::Basic(
                config.username.clone(),
                config.password.clone(),
            ))
            .build()
            .map_err(|e| AppError::Remote(format!("WebDAV client error: {:?}", e)))?;

        Ok(Self {
            client,
            remote_path: config.remote_path.trim_end_matches('/').to_string(),
        })
    }

    fn remote_file(&self, filename: &str) -> String {
        format!("{}/{}", self.remote_path, filename)
    }

    /// Lightweight reachability and credential probe.
    pub async fn test_connection(&self) -> Result<(), AppError> {
        self.client
            .list("", reqwest_dav::Depth::Number(0))
            .await
            .map_err(|e| AppError::Remote(format!("Connection test failed: {:?}", e)))?;
        Ok(())
    }

    /// Best-effort MKCOL; the collection may already exist.
    async fn ensure_remote_dir(&self) {
        if let Err(e) = self.client.mkcol(&self.remote_path).await {
            log::debug!("MKCOL '{}' note: {:?}", self.remote_path, e);
        }
    }

    pub async fn upload_json(
        &self,
        filename: &str,
        payload: &serde_json::Value,
    ) -> Result<(), AppError> {
        let body = serde_json::to_string_pretty(payload)?;
        self.ensure_remote_dir().await;

        self.client
            .put(&self.remote_file(filename), body.into_bytes())
            .await
            .map_err(|e| AppError::Remote(format!("Upload of '{}' failed: {:?}", filename, e)))?;
        Ok(())
    }

    pub async fn download_json(&self, filename: &str) -> Result<serde_json::Value, AppError> {
        let response = self
            .client
            .get(&self.remote_file(filename))
            .await
            .map_err(|e| AppError::Remote(format!("Download of '{}' failed: {:?}", filename, e)))?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::Remote(format!("Read response failed: {:?}", e)))?;

        let value = serde_json::from_slice(&bytes)
            .map_err(|e| AppError::Serialization(format!("'{}' is not valid JSON: {}", filename, e)))?;
        Ok(value)
    }

    /// File names under the remote path, newest name last. Collections are
    /// skipped; a missing remote path lists as empty.
    pub async fn list_files(&self) -> Result<Vec<String>, AppError> {
        let entries = match self
            .client
            .list(&self.remote_path, reqwest_dav::Depth::Number(1))
            .await
        {
            Ok(entries) => entries,
            Err(e) => {
                log::debug!("remote path {} not listable: {:?}", self.remote_path, e);
                return Ok(Vec::new());
            }
        };

        let mut names = Vec::new();
        for entry in entries {
            if let reqwest_dav::list_cmd::ListEntity::File(file) = entry {
                let name = file
                    .href
                    .trim_end_matches('/')
                    .split('/')
                    .next_back()
                    .unwrap_or("")
                    .to_string();
                if !name.is_empty() {
                    names.push(name);
                }
            }
        }
        names.sort();
        Ok(names)
    }

    pub async fn delete_file(&self, filename: &str) -> Result<(), AppError> {
        self.client
            .delete(&self.remote_file(filename))
            .await
            .map_err(|e| AppError::Remote(format!("Delete of '{}' failed: {:?}", filename, e)))?;
        Ok(())
    }
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

    fn sample(name: &str) -> WebdavConfig {
        WebdavConfig::new(
            name.to_string(),
            "https://dav.example.com".to_string(),
            "user".to_string(),
            "secret".to_string(),
        )
    }

    #[test]
    fn test_create_and_get_config() {
        let conn = test_connection();
        let id = create_config(&conn, &sample("nas")).unwrap();

        let loaded = get_config(&conn, id).unwrap();
        assert_eq!(loaded.name, "nas");
        assert_eq!(loaded.remote_path, "/claude-switch");
        assert_eq!(loaded.sync_interval, 3600);
        assert!(loaded.last_sync_at.is_none());
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let conn = test_connection();
        create_config(&conn, &sample("nas")).unwrap();
        let err = create_config(&conn, &sample("nas")).unwrap_err();
        assert!(matches!(err, AppError::Uniqueness { field: "name", .. }));
    }

    #[test]
    fn test_single_active_config() {
        let conn = test_connection();
        let first = create_config(&conn, &sample("a")).unwrap();
        let second = create_config(&conn, &sample("b")).unwrap();

        activate_config(&conn, first).unwrap();
        activate_config(&conn, second).unwrap();

        let active: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM webdav_configs WHERE is_active = 1",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(active, 1);
        assert_eq!(get_active_config(&conn).unwrap().unwrap().id, Some(second));
    }

    #[test]
    fn test_touch_last_sync() {
        let conn = test_connection();
        let id = create_config(&conn, &sample("nas")).unwrap();
        touch_last_sync(&conn, id).unwrap();
        assert!(get_config(&conn, id).unwrap().last_sync_at.is_some());
    }
}
