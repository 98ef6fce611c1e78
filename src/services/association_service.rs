use crate::error::AppError;
use crate::models::{Account, Association, AssociationView, Directory};
use crate::services::{account_service, directory_service};
use rusqlite::{params, Connection, OptionalExtension};

/// Records that an account has been used with a directory. Linking the same
/// pair twice is a no-op that returns the existing edge.
pub fn link(conn: &Connection, account_id: i64, directory_id: i64) -> Result<Association, AppError> {
    // Surface a clean NotFound instead of a foreign key failure.
    account_service::get_account(conn, account_id)?;
    directory_service::get_directory(conn, directory_id)?;

    conn.execute(
        "INSERT OR IGNORE INTO account_directories (account_id, directory_id) VALUES (?1, ?2)",
        params![account_id, directory_id],
    )?;

    let association = conn.query_row(
        "SELECT id, account_id, directory_id, created_at
         FROM account_directories WHERE account_id = ?1 AND directory_id = ?2",
        params![account_id, directory_id],
        |row| Association::try_from(row),
    )?;
    Ok(association)
}

pub fn unlink(conn: &Connection, association_id: i64) -> Result<(), AppError> {
    let changed = conn.execute(
        "DELETE FROM account_directories WHERE id = ?1",
        params![association_id],
    )?;
    if changed == 0 {
        return Err(AppError::NotFound(format!("association {}", association_id)));
    }
    Ok(())
}

pub fn has_association(conn: &Connection, account_id: i64) -> Result<bool, AppError> {
    let hit: Option<i64> = conn
        .query_row(
            "SELECT id FROM account_directories WHERE account_id = ?1 LIMIT 1",
            params![account_id],
            |row| row.get(0),
        )
        .optional()?;
    Ok(hit.is_some())
}

/// Directories an account has been switched into, newest link first.
pub fn directories_for_account(
    conn: &Connection,
    account_id: i64,
) -> Result<Vec<Directory>, AppError> {
    let mut stmt = conn.prepare(
        "SELECT d.id, d.uuid, d.name, d.path, d.is_active
         FROM directories d
         JOIN account_directories ad ON ad.directory_id = d.id
         WHERE ad.account_id = ?1
         ORDER BY ad.created_at DESC, ad.id DESC",
    )?;
    let directories = stmt
        .query_map(params![account_id], |row| Directory::try_from(row))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(directories)
}

/// Accounts that have been switched into a directory, newest link first.
pub fn accounts_for_directory(
    conn: &Connection,
    directory_id: i64,
) -> Result<Vec<Account>, AppError> {
    let mut stmt = conn.prepare(
        "SELECT a.id, a.uuid, a.name, a.token, a.base_url, a.model, a.custom_env, a.is_active
         FROM accounts a
         JOIN account_directories ad ON ad.account_id = a.id
         WHERE ad.directory_id = ?1
         ORDER BY ad.created_at DESC, ad.id DESC",
    )?;
    let accounts = stmt
        .query_map(params![directory_id], |row| Account::try_from(row))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(accounts)
}

pub fn list_associations(conn: &Connection) -> Result<Vec<AssociationView>, AppError> {
    let mut stmt = conn.prepare(
        "SELECT ad.id, ad.account_id, ad.directory_id, a.name, d.name, ad.created_at
         FROM account_directories ad
         JOIN accounts a ON a.id = ad.account_id
         JOIN directories d ON d.id = ad.directory_id
         ORDER BY ad.created_at DESC, ad.id DESC",
    )?;
    let views = stmt
        .query_map([], |row| AssociationView::try_from(row))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(views)
}
