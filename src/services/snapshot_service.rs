use crate::error::AppError;
use crate::models::{Account, BaseUrl, SyncStatus, SyncType, WebdavConfig};
use crate::services::{
    account_service, base_url_service, settings_service, sync_log_service, webdav_service,
    webdav_service::WebdavClient,
};
use crate::settings::SettingsDocument;
use rusqlite::Connection;
use serde_json::{json, Value};

pub const SNAPSHOT_FORMAT_VERSION: i64 = 1;

/// Default snapshot file name, timestamped to the second.
pub fn default_snapshot_filename() -> String {
    format!(
        "claude-config-{}.json",
        chrono::Local::now().format("%Y%m%d-%H%M%S")
    )
}

/// Counts of what an import changed. Nothing is ever deleted locally.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub accounts_added: usize,
    pub accounts_updated: usize,
    pub base_urls_added: usize,
    pub base_urls_updated: usize,
    pub settings_applied: bool,
}

/// Serializes the full local configuration state into one JSON document.
pub fn build_snapshot(conn: &Connection) -> Result<Value, AppError> {
    let accounts = account_service::list_all_accounts(conn)?;
    let base_urls = base_url_service::list_base_urls(conn)?;
    let settings = settings_service::load_settings(conn)?;

    Ok(json!({
        "format_version": SNAPSHOT_FORMAT_VERSION,
        "exported_at": chrono::Utc::now().to_rfc3339(),
        "accounts": accounts,
        "base_urls": base_urls,
        "claude_settings": settings.to_value(),
    }))
}

/// Merges a snapshot into the local store. Matching is by uuid first, then
/// by the entity's unique name; matched rows take the snapshot's values,
/// everything else is inserted. Local rows absent from the snapshot stay.
pub fn apply_snapshot(conn: &Connection, snapshot: &Value) -> Result<ImportSummary, AppError> {
    let obj = snapshot
        .as_object()
        .ok_or_else(|| AppError::Validation("Snapshot must be a JSON object".to_string()))?;

    let version = obj
        .get("format_version")
        .and_then(Value::as_i64)
        .unwrap_or(0);
    if version != SNAPSHOT_FORMAT_VERSION {
        return Err(AppError::Validation(format!(
            "Unsupported snapshot format version {}",
            version
        )));
    }

    let mut summary = ImportSummary::default();

    if let Some(Value::Array(raw_accounts)) = obj.get("accounts") {
        for raw in raw_accounts {
            let incoming: Account = serde_json::from_value(raw.clone())
                .map_err(|e| AppError::Validation(format!("Bad account in snapshot: {}", e)))?;
            merge_account(conn, incoming, &mut summary)?;
        }
    }

    if let Some(Value::Array(raw_urls)) = obj.get("base_urls") {
        for raw in raw_urls {
            let incoming: BaseUrl = serde_json::from_value(raw.clone())
                .map_err(|e| AppError::Validation(format!("Bad base url in snapshot: {}", e)))?;
            merge_base_url(conn, incoming, &mut summary)?;
        }
    }

    if let Some(raw_settings) = obj.get("claude_settings") {
        let mut document = SettingsDocument::from_value(raw_settings)?;
        document.normalize();
        settings_service::save_settings(conn, &document)?;
        summary.settings_applied = true;
    }

    Ok(summary)
}

fn merge_account(
    conn: &Connection,
    mut incoming: Account,
    summary: &mut ImportSummary,
) -> Result<(), AppError> {
    let existing = match account_service::get_account_by_uuid(conn, &incoming.uuid)? {
        Some(hit) => Some(hit),
        None => account_service::get_account_by_name(conn, &incoming.name)?,
    };

    match existing {
        Some(local) => {
            incoming.id = local.id;
            // The active flag is local state, not snapshot state.
            incoming.is_active = local.is_active;
            incoming.uuid = local.uuid;
            account_service::update_account(conn, &incoming)?;
            summary.accounts_updated += 1;
        }
        None => {
            incoming.id = None;
            incoming.is_active = false;
            account_service::create_account(conn, &incoming)?;
            summary.accounts_added += 1;
        }
    }
    Ok(())
}

fn merge_base_url(
    conn: &Connection,
    mut incoming: BaseUrl,
    summary: &mut ImportSummary,
) -> Result<(), AppError> {
    let existing = match base_url_service::get_base_url_by_uuid(conn, &incoming.uuid)? {
        Some(hit) => Some(hit),
        None => base_url_service::get_base_url_by_name(conn, &incoming.name)?,
    };

    match existing {
        Some(local) => {
            incoming.id = local.id;
            incoming.is_default = local.is_default;
            incoming.uuid = local.uuid;
            base_url_service::update_base_url(conn, &incoming)?;
            summary.base_urls_updated += 1;
        }
        None => {
            incoming.id = None;
            incoming.is_default = false;
            base_url_service::create_base_url(conn, &incoming)?;
            summary.base_urls_added += 1;
        }
    }
    Ok(())
}

/// Records the outcome of a finished remote operation in the sync ledger.
/// A success gets exactly one success entry plus a last-sync touch; a
/// failure gets one failed entry carrying the error text. A failed ledger
/// write after a remote success propagates; the remote operation is never
/// undone.
fn finish_sync<T>(
    conn: &Connection,
    config_id: Option<i64>,
    sync_type: SyncType,
    filename: &str,
    outcome: Result<T, AppError>,
) -> Result<T, AppError> {
    match outcome {
        Ok(value) => {
            sync_log_service::record(
                conn,
                config_id,
                sync_type,
                SyncStatus::Success,
                Some(filename),
            )?;
            if let Some(id) = config_id {
                webdav_service::touch_last_sync(conn, id)?;
            }
            Ok(value)
        }
        Err(e) => {
            if let Err(log_err) = sync_log_service::record(
                conn,
                config_id,
                sync_type,
                SyncStatus::Failed,
                Some(&e.to_string()),
            ) {
                log::error!("failed to record {} failure: {}", sync_type.as_str(), log_err);
            }
            Err(e)
        }
    }
}

/// Uploads a snapshot of the local state to the remote and records the
/// outcome in the sync ledger.
pub async fn upload_snapshot(
    conn: &Connection,
    config: &WebdavConfig,
    filename: &str,
) -> Result<(), AppError> {
    let snapshot = build_snapshot(conn)?;
    let client = WebdavClient::from_config(config)?;
    let outcome = client.upload_json(filename, &snapshot).await;
    finish_sync(conn, config.id, SyncType::Upload, filename, outcome)
}

/// Downloads a snapshot from the remote and merges it into the local store.
pub async fn download_snapshot(
    conn: &Connection,
    config: &WebdavConfig,
    filename: &str,
) -> Result<ImportSummary, AppError> {
    let client = WebdavClient::from_config(config)?;
    let outcome = match client.download_json(filename).await {
        Ok(snapshot) => apply_snapshot(conn, &snapshot),
        Err(e) => Err(e),
    };
    finish_sync(conn, config.id, SyncType::Download, filename, outcome)
}
