use rusqlite::{Connection, Result};

/// Initialize the complete database schema
pub fn init_schema(conn: &Connection) -> Result<()> {
    // Enable foreign keys
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    // Schema version table for future migrations
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    let current_version: i32 = conn
        .query_row(
            "SELECT version FROM schema_version ORDER BY version DESC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .unwrap_or(0);

    if current_version < 1 {
        create_schema(conn)?;
        conn.execute("INSERT INTO schema_version (version) VALUES (1)", [])?;
    }

    Ok(())
}

/// Create the complete schema (version 1)
fn create_schema(conn: &Connection) -> Result<()> {
    // Table: accounts (API accounts for the Claude Code CLI)
    conn.execute(
        "CREATE TABLE IF NOT EXISTS accounts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            uuid TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL UNIQUE,
            token TEXT NOT NULL,
            base_url TEXT NOT NULL,
            model TEXT,
            custom_env TEXT NOT NULL DEFAULT '{}',
            is_active INTEGER NOT NULL DEFAULT 0 CHECK(is_active IN (0,1)),
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_accounts_name ON accounts(name)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_accounts_base_url ON accounts(base_url)",
        [],
    )?;

    conn.execute(
        "CREATE TRIGGER IF NOT EXISTS update_accounts_timestamp
         AFTER UPDATE ON accounts
         BEGIN
            UPDATE accounts SET updated_at = CURRENT_TIMESTAMP WHERE id = NEW.id;
         END",
        [],
    )?;

    // Table: directories (project directories the CLI is switched into)
    conn.execute(
        "CREATE TABLE IF NOT EXISTS directories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            uuid TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            path TEXT NOT NULL UNIQUE,
            is_active INTEGER NOT NULL DEFAULT 0 CHECK(is_active IN (0,1)),
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_directories_path ON directories(path)",
        [],
    )?;

    conn.execute(
        "CREATE TRIGGER IF NOT EXISTS update_directories_timestamp
         AFTER UPDATE ON directories
         BEGIN
            UPDATE directories SET updated_at = CURRENT_TIMESTAMP WHERE id = NEW.id;
         END",
        [],
    )?;

    // Table: base_urls (named API endpoints)
    conn.execute(
        "CREATE TABLE IF NOT EXISTS base_urls (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            uuid TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL UNIQUE,
            url TEXT NOT NULL UNIQUE,
            description TEXT,
            is_default INTEGER NOT NULL DEFAULT 0 CHECK(is_default IN (0,1)),
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE TRIGGER IF NOT EXISTS update_base_urls_timestamp
         AFTER UPDATE ON base_urls
         BEGIN
            UPDATE base_urls SET updated_at = CURRENT_TIMESTAMP WHERE id = NEW.id;
         END",
        [],
    )?;

    // Table: account_directories (many-to-many switch history)
    conn.execute(
        "CREATE TABLE IF NOT EXISTS account_directories (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            account_id INTEGER NOT NULL,
            directory_id INTEGER NOT NULL,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (account_id) REFERENCES accounts(id) ON DELETE CASCADE,
            FOREIGN KEY (directory_id) REFERENCES directories(id) ON DELETE CASCADE,
            UNIQUE(account_id, directory_id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_account_directories_account
         ON account_directories(account_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_account_directories_directory
         ON account_directories(directory_id)",
        [],
    )?;

    // Table: claude_settings (single-row global settings document)
    conn.execute(
        "CREATE TABLE IF NOT EXISTS claude_settings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            settings_json TEXT NOT NULL,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // Table: webdav_configs (remote sync targets)
    conn.execute(
        "CREATE TABLE IF NOT EXISTS webdav_configs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            url TEXT NOT NULL,
            username TEXT NOT NULL,
            password TEXT NOT NULL,
            remote_path TEXT NOT NULL DEFAULT '/claude-switch',
            auto_sync INTEGER NOT NULL DEFAULT 0 CHECK(auto_sync IN (0,1)),
            sync_interval INTEGER NOT NULL DEFAULT 3600,
            is_active INTEGER NOT NULL DEFAULT 0 CHECK(is_active IN (0,1)),
            last_sync_at TEXT,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE TRIGGER IF NOT EXISTS update_webdav_configs_timestamp
         AFTER UPDATE ON webdav_configs
         BEGIN
            UPDATE webdav_configs SET updated_at = CURRENT_TIMESTAMP WHERE id = NEW.id;
         END",
        [],
    )?;

    // Table: sync_logs (append-only ledger of remote operations)
    conn.execute(
        "CREATE TABLE IF NOT EXISTS sync_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            webdav_config_id INTEGER,
            sync_type TEXT CHECK(sync_type IN ('upload', 'download')) NOT NULL,
            status TEXT CHECK(status IN ('success', 'failed', 'warning')) NOT NULL,
            message TEXT,
            synced_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            FOREIGN KEY (webdav_config_id) REFERENCES webdav_configs(id) ON DELETE SET NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_sync_logs_config ON sync_logs(webdav_config_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_sync_logs_synced_at ON sync_logs(synced_at DESC)",
        [],
    )?;

    Ok(())
}
