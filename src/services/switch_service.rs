use crate::error::AppError;
use crate::services::{
    account_service, association_service, config_file, directory_service, op_guard,
    settings_service,
};
use crate::settings::{resolve_env, SettingsDocument};
use rusqlite::{params, Connection};
use std::collections::BTreeMap;

/// Where a switch stopped. Reported back to the caller so a failed run can
/// name the phase that broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchPhase {
    Validating,
    Resolving,
    Writing,
    Done,
}

impl SwitchPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SwitchPhase::Validating => "validating",
            SwitchPhase::Resolving => "resolving",
            SwitchPhase::Writing => "writing",
            SwitchPhase::Done => "done",
        }
    }
}

/// A switch that did not reach `Done`, carrying the phase it broke in.
#[derive(Debug)]
pub struct SwitchFailure {
    pub phase: SwitchPhase,
    pub error: AppError,
}

impl std::fmt::Display for SwitchFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "switch failed while {}: {}", self.phase.as_str(), self.error)
    }
}

#[derive(Debug, Default, Clone)]
pub struct SwitchOptions {
    /// Overrides the global sandbox switch for this switch only
    pub sandbox: Option<bool>,
}

#[derive(Debug)]
pub struct SwitchReport {
    pub account_name: String,
    pub directory_path: String,
    pub phase: SwitchPhase,
    pub warnings: Vec<String>,
    pub env_keys: Vec<String>,
}

/// Activates `account_id` for `directory_id`.
///
/// Ordering matters: the settings artifact on disk is written before any
/// database flag flips, so an interrupted run leaves the database pointing at
/// the previous pair while the directory already carries usable settings.
/// Re-running the same switch is the recovery path; it converges to the same
/// file bytes and the same flags.
pub fn switch(
    conn: &Connection,
    account_id: i64,
    directory_id: i64,
    options: &SwitchOptions,
) -> Result<SwitchReport, SwitchFailure> {
    let fail = |phase: SwitchPhase| move |error: AppError| SwitchFailure { phase, error };

    let _guard =
        op_guard::acquire("directory", directory_id).map_err(fail(SwitchPhase::Validating))?;
    let mut warnings = Vec::new();

    // Validating
    let account =
        account_service::get_account(conn, account_id).map_err(fail(SwitchPhase::Validating))?;
    let directory = directory_service::get_directory(conn, directory_id)
        .map_err(fail(SwitchPhase::Validating))?;
    if !directory.path_exists() {
        let warning = format!("directory path {} does not exist on disk", directory.path);
        log::warn!("{}", warning);
        warnings.push(warning);
    }

    // Resolving
    let mut global =
        settings_service::load_settings(conn).map_err(fail(SwitchPhase::Resolving))?;
    if let Some(sandbox) = options.sandbox {
        global.set_sandbox(sandbox);
    }
    let env = resolve_env(&account, &global);
    let artifact = SettingsDocument {
        permissions: global.permissions.clone(),
        env: env.clone(),
    }
    .to_value();

    // Writing: artifact first, then the flag flips.
    config_file::write_settings_artifact(&directory.path, &artifact)
        .map_err(fail(SwitchPhase::Writing))?;

    conn.execute(
        "UPDATE directories SET is_active = (id = ?1)",
        params![directory_id],
    )
    .map_err(AppError::from)
    .map_err(fail(SwitchPhase::Writing))?;
    conn.execute(
        "UPDATE accounts SET is_active = (id = ?1)",
        params![account_id],
    )
    .map_err(AppError::from)
    .map_err(fail(SwitchPhase::Writing))?;
    association_service::link(conn, account_id, directory_id)
        .map_err(fail(SwitchPhase::Writing))?;

    log::info!(
        "switched account '{}' into {}",
        account.name,
        directory.path
    );

    Ok(SwitchReport {
        account_name: account.name,
        directory_path: directory.path,
        phase: SwitchPhase::Done,
        warnings,
        env_keys: env.keys().cloned().collect(),
    })
}

/// The directory's current on-disk configuration, read back from its
/// settings artifact.
pub fn current_config(
    conn: &Connection,
    directory_id: i64,
) -> Result<(crate::models::Directory, BTreeMap<String, String>), AppError> {
    let directory = directory_service::get_directory(conn, directory_id)?;
    let env = config_file::read_env_config(&directory.path)?;
    Ok((directory, env))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::schema;
    use crate::models::{Account, Directory};
    use crate::settings::resolver::{AUTH_TOKEN_KEY, BASE_URL_KEY, MODEL_KEY};
    use std::fs;

    fn test_connection() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        schema::init_schema(&conn).unwrap();
        conn
    }

    fn seed_account(conn: &Connection, name: &str) -> i64 {
        let mut account = Account::new(
            name.to_string(),
            format!("sk-{}", name),
            "https://api.anthropic.com".to_string(),
        );
        account.model = Some("claude-x".to_string());
        account_service::create_account(conn, &account).unwrap()
    }

    fn seed_directory(conn: &Connection, dir: &tempfile::TempDir) -> i64 {
        let directory = Directory::new(
            "proj".to_string(),
            dir.path().to_str().unwrap().to_string(),
        );
        directory_service::create_directory(conn, &directory).unwrap()
    }

    #[test]
    fn test_switch_writes_artifact_and_flips_flags() {
        let _serial = op_guard::test_serial_lock();
        let conn = test_connection();
        let dir = tempfile::tempdir().unwrap();
        let account_id = seed_account(&conn, "work");
        let directory_id = seed_directory(&conn, &dir);

        let report = switch(&conn, account_id, directory_id, &SwitchOptions::default()).unwrap();
        assert_eq!(report.phase, SwitchPhase::Done);
        assert!(report.warnings.is_empty());

        let (_, env) = current_config(&conn, directory_id).unwrap();
        assert_eq!(env.get(AUTH_TOKEN_KEY).map(String::as_str), Some("sk-work"));
        assert_eq!(
            env.get(BASE_URL_KEY).map(String::as_str),
            Some("https://api.anthropic.com")
        );
        assert_eq!(env.get(MODEL_KEY).map(String::as_str), Some("claude-x"));

        let active_account = account_service::get_active_account(&conn).unwrap().unwrap();
        assert_eq!(active_account.id, Some(account_id));
        let active_directory = directory_service::get_active_directory(&conn)
            .unwrap()
            .unwrap();
        assert_eq!(active_directory.id, Some(directory_id));
        assert!(association_service::has_association(&conn, account_id).unwrap());
    }

    #[test]
    fn test_switch_moves_active_flags_exclusively() {
        let _serial = op_guard::test_serial_lock();
        let conn = test_connection();
        let tmp_dirs: Vec<tempfile::TempDir> =
            (0..3).map(|_| tempfile::tempdir().unwrap()).collect();
        let first = seed_account(&conn, "one");
        let second = seed_account(&conn, "two");
        let dir_ids: Vec<i64> = tmp_dirs
            .iter()
            .enumerate()
            .map(|(i, tmp)| {
                let directory = Directory::new(
                    format!("proj-{}", i),
                    tmp.path().to_str().unwrap().to_string(),
                );
                directory_service::create_directory(&conn, &directory).unwrap()
            })
            .collect();

        switch(&conn, first, dir_ids[0], &SwitchOptions::default()).unwrap();
        switch(&conn, second, dir_ids[1], &SwitchOptions::default()).unwrap();
        let dir_b_id = dir_ids[2];
        switch(&conn, second, dir_b_id, &SwitchOptions::default()).unwrap();

        let active_accounts: i64 = conn
            .query_row("SELECT COUNT(*) FROM accounts WHERE is_active = 1", [], |r| r.get(0))
            .unwrap();
        let active_dirs: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM directories WHERE is_active = 1",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(active_accounts, 1);
        assert_eq!(active_dirs, 1);
        assert_eq!(
            account_service::get_active_account(&conn).unwrap().unwrap().id,
            Some(second)
        );
        assert_eq!(
            directory_service::get_active_directory(&conn)
                .unwrap()
                .unwrap()
                .id,
            Some(dir_b_id)
        );
    }

    #[test]
    fn test_switch_is_idempotent() {
        let _serial = op_guard::test_serial_lock();
        let conn = test_connection();
        let dir = tempfile::tempdir().unwrap();
        let account_id = seed_account(&conn, "work");
        let directory_id = seed_directory(&conn, &dir);

        switch(&conn, account_id, directory_id, &SwitchOptions::default()).unwrap();
        let path = config_file::settings_file_path(dir.path().to_str().unwrap());
        let first = fs::read_to_string(&path).unwrap();

        switch(&conn, account_id, directory_id, &SwitchOptions::default()).unwrap();
        let second = fs::read_to_string(&path).unwrap();

        assert_eq!(first, second);
        let edges: i64 = conn
            .query_row("SELECT COUNT(*) FROM account_directories", [], |r| r.get(0))
            .unwrap();
        assert_eq!(edges, 1);
    }

    #[test]
    fn test_switch_unknown_account_changes_nothing() {
        let _serial = op_guard::test_serial_lock();
        let conn = test_connection();
        let dir = tempfile::tempdir().unwrap();
        let directory_id = seed_directory(&conn, &dir);

        let failure = switch(&conn, 99, directory_id, &SwitchOptions::default()).unwrap_err();
        assert_eq!(failure.phase, SwitchPhase::Validating);
        assert!(matches!(failure.error, AppError::NotFound(_)));
        assert!(!config_file::settings_file_path(dir.path().to_str().unwrap()).exists());
    }

    #[test]
    fn test_unwritable_artifact_fails_in_writing_phase() {
        let _serial = op_guard::test_serial_lock();
        let conn = test_connection();
        let dir = tempfile::tempdir().unwrap();
        let account_id = seed_account(&conn, "work");

        // A plain file where the directory path's parent should be makes
        // the artifact write fail.
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, b"").unwrap();
        let directory = Directory::new(
            "blocked".to_string(),
            blocker.join("proj").to_str().unwrap().to_string(),
        );
        let directory_id = directory_service::create_directory(&conn, &directory).unwrap();

        let failure =
            switch(&conn, account_id, directory_id, &SwitchOptions::default()).unwrap_err();
        assert_eq!(failure.phase, SwitchPhase::Writing);
        assert!(matches!(failure.error, AppError::Filesystem(_)));
        // No flags were flipped before the failed write.
        assert!(account_service::get_active_account(&conn).unwrap().is_none());
    }

    #[test]
    fn test_busy_directory_fails_in_validating_phase() {
        let _serial = op_guard::test_serial_lock();
        let conn = test_connection();
        let dir = tempfile::tempdir().unwrap();
        let account_id = seed_account(&conn, "work");
        let directory_id = seed_directory(&conn, &dir);

        let _held = op_guard::acquire("directory", directory_id).unwrap();
        let failure =
            switch(&conn, account_id, directory_id, &SwitchOptions::default()).unwrap_err();
        assert_eq!(failure.phase, SwitchPhase::Validating);
        assert!(matches!(failure.error, AppError::Busy(_)));
    }

    #[test]
    fn test_missing_path_is_a_warning_not_an_error() {
        let _serial = op_guard::test_serial_lock();
        let conn = test_connection();
        let account_id = seed_account(&conn, "work");
        let dir = tempfile::tempdir().unwrap();
        // Register then remove the path so the switch sees it missing.
        let path = dir.path().join("gone");
        fs::create_dir(&path).unwrap();
        let directory = Directory::new(
            "ghost".to_string(),
            path.to_str().unwrap().to_string(),
        );
        let directory_id = directory_service::create_directory(&conn, &directory).unwrap();
        fs::remove_dir(&path).unwrap();

        let report = switch(&conn, account_id, directory_id, &SwitchOptions::default()).unwrap();
        assert_eq!(report.phase, SwitchPhase::Done);
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn test_sandbox_override_applies_to_artifact_only() {
        let _serial = op_guard::test_serial_lock();
        let conn = test_connection();
        let dir = tempfile::tempdir().unwrap();
        let account_id = seed_account(&conn, "work");
        let directory_id = seed_directory(&conn, &dir);

        switch(
            &conn,
            account_id,
            directory_id,
            &SwitchOptions {
                sandbox: Some(false),
            },
        )
        .unwrap();

        let (_, env) = current_config(&conn, directory_id).unwrap();
        assert!(!env.contains_key("IS_SANDBOX"));
        // The stored global document keeps its own sandbox setting.
        let global = settings_service::load_settings(&conn).unwrap();
        assert_eq!(global, SettingsDocument::default());
    }
}
