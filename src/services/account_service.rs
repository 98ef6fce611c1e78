use crate::error::AppError;
use crate::models::{Account, AccountFilter, AccountPage, PaginationInfo};
use rusqlite::{params, Connection, OptionalExtension};

const ACCOUNT_COLUMNS: &str = "id, uuid, name, token, base_url, model, custom_env, is_active";

fn ensure_unique_name(
    conn: &Connection,
    name: &str,
    exclude_id: Option<i64>,
) -> Result<(), AppError> {
    let taken: Option<i64> = conn
        .query_row(
            "SELECT id FROM accounts WHERE name = ?1 AND (?2 IS NULL OR id != ?2)",
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

pub fn create_account(conn: &Connection, account: &Account) -> Result<i64, AppError> {
    account.validate()?;
    ensure_unique_name(conn, &account.name, None)?;

    let custom_env = serde_json::to_string(&account.custom_env)?;
    conn.execute(
        "INSERT INTO accounts (uuid, name, token, base_url, model, custom_env, is_active)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            account.uuid,
            account.name,
            account.token,
            account.base_url,
            account.model,
            custom_env,
            account.is_active,
        ],
    )?;

    Ok(conn.last_insert_rowid())
}

pub fn get_account(conn: &Connection, id: i64) -> Result<Account, AppError> {
    let sql = format!("SELECT {} FROM accounts WHERE id = ?1", ACCOUNT_COLUMNS);
    conn.query_row(&sql, params![id], |row| Account::try_from(row))
        .optional()?
        .ok_or_else(|| AppError::NotFound(format!("account {}", id)))
}

pub fn get_account_by_uuid(conn: &Connection, uuid: &str) -> Result<Option<Account>, AppError> {
    let sql = format!("SELECT {} FROM accounts WHERE uuid = ?1", ACCOUNT_COLUMNS);
    Ok(conn
        .query_row(&sql, params![uuid], |row| Account::try_from(row))
        .optional()?)
}

pub fn get_account_by_name(conn: &Connection, name: &str) -> Result<Option<Account>, AppError> {
    let sql = format!("SELECT {} FROM accounts WHERE name = ?1", ACCOUNT_COLUMNS);
    Ok(conn
        .query_row(&sql, params![name], |row| Account::try_from(row))
        .optional()?)
}

pub fn get_active_account(conn: &Connection) -> Result<Option<Account>, AppError> {
    let sql = format!("SELECT {} FROM accounts WHERE is_active = 1", ACCOUNT_COLUMNS);
    Ok(conn
        .query_row(&sql, [], |row| Account::try_from(row))
        .optional()?)
}

pub fn update_account(conn: &Connection, account: &Account) -> Result<(), AppError> {
    let id = account
        .id
        .ok_or_else(|| AppError::Validation("account has no id".to_string()))?;
    account.validate()?;
    ensure_unique_name(conn, &account.name, Some(id))?;

    let custom_env = serde_json::to_string(&account.custom_env)?;
    let changed = conn.execute(
        "UPDATE accounts
         SET name = ?1, token = ?2, base_url = ?3, model = ?4, custom_env = ?5, is_active = ?6
         WHERE id = ?7",
        params![
            account.name,
            account.token,
            account.base_url,
            account.model,
            custom_env,
            account.is_active,
            id,
        ],
    )?;

    if changed == 0 {
        return Err(AppError::NotFound(format!("account {}", id)));
    }
    Ok(())
}

pub fn delete_account(conn: &Connection, id: i64) -> Result<(), AppError> {
    // Associations go with the account (ON DELETE CASCADE).
    let changed = conn.execute("DELETE FROM accounts WHERE id = ?1", params![id])?;
    if changed == 0 {
        return Err(AppError::NotFound(format!("account {}", id)));
    }
    Ok(())
}

/// Paginated listing with optional name search and base URL filter.
pub fn list_accounts(conn: &Connection, filter: &AccountFilter) -> Result<AccountPage, AppError> {
    let page = filter.page.unwrap_or(1).max(1);
    let per_page = filter.per_page.unwrap_or(10).clamp(1, 100);

    let mut conditions: Vec<&str> = Vec::new();
    let mut bound: Vec<String> = Vec::new();

    let search = filter.search.as_deref().map(str::trim).unwrap_or("");
    if !search.is_empty() {
        conditions.push("name LIKE ?");
        bound.push(format!("%{}%", search));
    }
    if let Some(base_url) = filter.base_url.as_deref() {
        if !base_url.is_empty() {
            conditions.push("base_url = ?");
            bound.push(base_url.to_string());
        }
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    };

    let count_sql = format!("SELECT COUNT(*) FROM accounts{}", where_clause);
    let total: i64 = conn.query_row(
        &count_sql,
        rusqlite::params_from_iter(bound.iter()),
        |row| row.get(0),
    )?;

    let pages = if total == 0 {
        1
    } else {
        (total + per_page - 1) / per_page
    };
    let page = page.min(pages);
    let offset = (page - 1) * per_page;

    let list_sql = format!(
        "SELECT {} FROM accounts{} ORDER BY created_at DESC, id DESC LIMIT {} OFFSET {}",
        ACCOUNT_COLUMNS, where_clause, per_page, offset
    );
    let mut stmt = conn.prepare(&list_sql)?;
    let accounts = stmt
        .query_map(rusqlite::params_from_iter(bound.iter()), |row| {
            Account::try_from(row)
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(AccountPage {
        accounts,
        pagination: PaginationInfo::new(page, per_page, total, pages),
    })
}

/// Every account, unpaginated, for exports.
pub fn list_all_accounts(conn: &Connection) -> Result<Vec<Account>, AppError> {
    let sql = format!(
        "SELECT {} FROM accounts ORDER BY created_at DESC, id DESC",
        ACCOUNT_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let accounts = stmt
        .query_map([], |row| Account::try_from(row))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(accounts)
}

/// Distinct base URLs currently in use by accounts, for filter dropdowns.
pub fn distinct_base_urls(conn: &Connection) -> Result<Vec<String>, AppError> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT base_url FROM accounts WHERE base_url != '' ORDER BY base_url",
    )?;
    let urls = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(urls)
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

    fn sample(name: &str) -> Account {
        Account::new(
            name.to_string(),
            "sk-test".to_string(),
            "https://api.anthropic.com".to_string(),
        )
    }

    #[test]
    fn test_create_and_get_account() {
        let conn = test_connection();
        let mut account = sample("work");
        account.model = Some("claude-x".to_string());

        let id = create_account(&conn, &account).unwrap();
        let loaded = get_account(&conn, id).unwrap();

        assert_eq!(loaded.name, "work");
        assert_eq!(loaded.model.as_deref(), Some("claude-x"));
        assert_eq!(loaded.uuid, account.uuid);
        assert!(!loaded.is_active);
    }

    #[test]
    fn test_duplicate_name_is_a_typed_error() {
        let conn = test_connection();
        create_account(&conn, &sample("work")).unwrap();

        let err = create_account(&conn, &sample("work")).unwrap_err();
        match err {
            AppError::Uniqueness { field, value } => {
                assert_eq!(field, "name");
                assert_eq!(value, "work");
            }
            other => panic!("expected uniqueness error, got {:?}", other),
        }
    }

    #[test]
    fn test_update_keeps_name_uniqueness_for_other_rows() {
        let conn = test_connection();
        create_account(&conn, &sample("one")).unwrap();
        let id = create_account(&conn, &sample("two")).unwrap();

        let mut account = get_account(&conn, id).unwrap();
        account.name = "one".to_string();
        assert!(update_account(&conn, &account).is_err());

        // Saving under its own unchanged name is fine.
        account.name = "two".to_string();
        update_account(&conn, &account).unwrap();
    }

    #[test]
    fn test_list_accounts_pagination_and_search() {
        let conn = test_connection();
        for i in 0..12 {
            create_account(&conn, &sample(&format!("acct-{:02}", i))).unwrap();
        }

        let page = list_accounts(
            &conn,
            &AccountFilter {
                per_page: Some(5),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(page.accounts.len(), 5);
        assert_eq!(page.pagination.total, 12);
        assert_eq!(page.pagination.pages, 3);
        assert!(page.pagination.has_next);
        assert!(!page.pagination.has_prev);

        let hits = list_accounts(
            &conn,
            &AccountFilter {
                search: Some("acct-03".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(hits.accounts.len(), 1);
        assert_eq!(hits.pagination.pages, 1);
    }

    #[test]
    fn test_page_out_of_range_clamps_to_last_page() {
        let conn = test_connection();
        create_account(&conn, &sample("only")).unwrap();

        let page = list_accounts(
            &conn,
            &AccountFilter {
                page: Some(99),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(page.pagination.page, 1);
        assert_eq!(page.accounts.len(), 1);
    }

    #[test]
    fn test_corrupt_custom_env_loads_as_empty() {
        let conn = test_connection();
        conn.execute(
            "INSERT INTO accounts (uuid, name, token, base_url, custom_env)
             VALUES ('u1', 'broken', 'sk-test', 'https://api.anthropic.com', '{not json')",
            [],
        )
        .unwrap();

        let account = get_account_by_name(&conn, "broken").unwrap().unwrap();
        assert!(account.custom_env.is_empty());
    }

    #[test]
    fn test_delete_missing_account_is_not_found() {
        let conn = test_connection();
        assert!(matches!(
            delete_account(&conn, 42),
            Err(AppError::NotFound(_))
        ));
    }
}
