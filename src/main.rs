mod database;
mod error;
mod models;
mod services;
mod settings;

use clap::{Parser, Subcommand};
use error::AppError;
use models::{Account, AccountFilter, BaseUrl, Directory, WebdavConfig};
use rusqlite::Connection;
use services::{
    account_service, association_service, base_url_service, directory_service, settings_service,
    snapshot_service, switch_service, sync_log_service, webdav_service,
};
use settings::is_system_managed;

#[derive(Parser)]
#[command(name = "claude-switch", version, about = "Account and settings switcher for the Claude Code CLI")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Manage API accounts
    Account {
        #[command(subcommand)]
        cmd: AccountCmd,
    },
    /// Manage project directories
    Dir {
        #[command(subcommand)]
        cmd: DirCmd,
    },
    /// Manage named API endpoints
    Url {
        #[command(subcommand)]
        cmd: UrlCmd,
    },
    /// Link an account to a directory
    Link {
        account_id: i64,
        directory_id: i64,
    },
    /// Remove an account-directory link
    Unlink { association_id: i64 },
    /// List all account-directory links
    Links,
    /// Activate an account for a directory
    Switch {
        account_id: i64,
        directory_id: i64,
        /// Override the sandbox switch for this switch only
        #[arg(long)]
        sandbox: Option<bool>,
    },
    /// Show the configuration currently written into a directory
    Current { directory_id: i64 },
    /// Show the active account, directory, default endpoint and remote
    Status,
    /// Inspect and edit the global settings document
    Settings {
        #[command(subcommand)]
        cmd: SettingsCmd,
    },
    /// Manage WebDAV remotes
    Webdav {
        #[command(subcommand)]
        cmd: WebdavCmd,
    },
    /// Snapshot sync against the active WebDAV remote
    Sync {
        #[command(subcommand)]
        cmd: SyncCmd,
    },
}

#[derive(Subcommand)]
enum AccountCmd {
    Add {
        name: String,
        token: String,
        base_url: String,
        #[arg(long)]
        model: Option<String>,
        /// Extra env vars as KEY=VALUE, repeatable
        #[arg(short, long = "env")]
        env: Vec<String>,
    },
    List {
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        base_url: Option<String>,
        #[arg(long)]
        page: Option<i64>,
        #[arg(long)]
        per_page: Option<i64>,
    },
    Show { id: i64 },
    Edit {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        token: Option<String>,
        #[arg(long)]
        base_url: Option<String>,
        #[arg(long)]
        model: Option<String>,
        /// Drop the per-account model override
        #[arg(long)]
        clear_model: bool,
        /// Extra env vars as KEY=VALUE, repeatable; replaces the stored set
        #[arg(short, long = "env")]
        env: Vec<String>,
    },
    Rm { id: i64 },
}

#[derive(Subcommand)]
enum DirCmd {
    Add { name: String, path: String },
    List,
    /// Probe whether a path exists on disk
    Check { path: String },
    Rm { id: i64 },
}

#[derive(Subcommand)]
enum UrlCmd {
    Add {
        name: String,
        url: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        default: bool,
    },
    List,
    SetDefault { id: i64 },
    Rm { id: i64 },
}

#[derive(Subcommand)]
enum SettingsCmd {
    /// Print the current document as JSON
    Show,
    /// Set a custom env var (system-managed keys are rejected)
    SetEnv { key: String, value: String },
    /// Remove a custom env var
    UnsetEnv { key: String },
    /// Edit the system-managed switches and limits
    Set {
        #[arg(long)]
        sandbox: Option<bool>,
        #[arg(long)]
        disable_autoupdater: Option<bool>,
        #[arg(long)]
        disable_prompt_caching: Option<bool>,
        #[arg(long)]
        small_fast_model: Option<String>,
        #[arg(long)]
        clear_small_fast_model: bool,
        /// 0 clears the limit
        #[arg(long)]
        max_output_tokens: Option<u64>,
        /// 0 clears the limit
        #[arg(long)]
        max_thinking_tokens: Option<u64>,
        /// 0 clears the limit
        #[arg(long)]
        max_mcp_output_tokens: Option<u64>,
        /// 0 clears the timeout
        #[arg(long)]
        bash_timeout_ms: Option<u64>,
        /// 0 clears the timeout
        #[arg(long)]
        mcp_timeout_ms: Option<u64>,
    },
}

#[derive(Subcommand)]
enum WebdavCmd {
    Add {
        name: String,
        url: String,
        username: String,
        password: String,
        #[arg(long)]
        remote_path: Option<String>,
    },
    List,
    Activate { id: i64 },
    /// Probe reachability and credentials of a remote
    Test { id: i64 },
    Rm { id: i64 },
}

#[derive(Subcommand)]
enum SyncCmd {
    /// Upload a snapshot of the local configuration
    Upload {
        #[arg(long)]
        file: Option<String>,
    },
    /// Download a snapshot and merge it into the local store
    Download { file: String },
    /// List snapshot files on the remote
    Files,
    /// Delete a snapshot file on the remote
    RmFile { file: String },
    /// Show the sync ledger, newest first
    Logs {
        #[arg(long, default_value_t = 20)]
        limit: i64,
        #[arg(long)]
        config: Option<i64>,
    },
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result = database::init_database().and_then(|conn| run(&conn, cli.cmd));
    if let Err(e) = result {
        log::error!("{}", e);
        eprintln!("Error: {}", e.user_message());
        std::process::exit(1);
    }
}

fn run(conn: &Connection, cmd: Command) -> Result<(), AppError> {
    match cmd {
        Command::Account { cmd } => run_account(conn, cmd),
        Command::Dir { cmd } => run_dir(conn, cmd),
        Command::Url { cmd } => run_url(conn, cmd),
        Command::Link {
            account_id,
            directory_id,
        } => {
            let edge = association_service::link(conn, account_id, directory_id)?;
            println!("Linked account {} to directory {} (association {})",
                account_id, directory_id, edge.id);
            Ok(())
        }
        Command::Unlink { association_id } => {
            association_service::unlink(conn, association_id)?;
            println!("Association {} removed", association_id);
            Ok(())
        }
        Command::Links => {
            for view in association_service::list_associations(conn)? {
                println!(
                    "{:>4}  {} -> {}  ({})",
                    view.id, view.account_name, view.directory_name, view.created_at
                );
            }
            Ok(())
        }
        Command::Switch {
            account_id,
            directory_id,
            sandbox,
        } => {
            let report = switch_service::switch(
                conn,
                account_id,
                directory_id,
                &switch_service::SwitchOptions { sandbox },
            )
            .map_err(|failure| {
                eprintln!("Switch failed during the {} phase", failure.phase.as_str());
                failure.error
            })?;
            for warning in &report.warnings {
                println!("Warning: {}", warning);
            }
            println!(
                "Switched '{}' into {} ({} env vars)",
                report.account_name,
                report.directory_path,
                report.env_keys.len()
            );
            Ok(())
        }
        Command::Current { directory_id } => {
            let (directory, env) = switch_service::current_config(conn, directory_id)?;
            println!("{} ({})", directory.name, directory.path);
            if env.is_empty() {
                println!("No settings written for this directory yet");
            }
            for (key, value) in env {
                println!("{}={}", key, value);
            }
            let used = association_service::accounts_for_directory(conn, directory_id)?;
            if !used.is_empty() {
                let names: Vec<&str> = used.iter().map(|a| a.name.as_str()).collect();
                println!("Previously used accounts: {}", names.join(", "));
            }
            Ok(())
        }
        Command::Status => {
            match account_service::get_active_account(conn)? {
                Some(account) => println!("Active account:   {} ({})", account.name, account.base_url),
                None => println!("Active account:   none"),
            }
            match directory_service::get_active_directory(conn)? {
                Some(dir) => println!("Active directory: {} ({})", dir.name, dir.path),
                None => println!("Active directory: none"),
            }
            match base_url_service::get_default_base_url(conn)? {
                Some(url) => println!("Default endpoint: {} ({})", url.name, url.url),
                None => println!("Default endpoint: none"),
            }
            match webdav_service::get_active_config(conn)? {
                Some(config) => println!(
                    "Active remote:    {} (last sync: {})",
                    config.name,
                    config.last_sync_at.as_deref().unwrap_or("never")
                ),
                None => println!("Active remote:    none"),
            }
            Ok(())
        }
        Command::Settings { cmd } => run_settings(conn, cmd),
        Command::Webdav { cmd } => run_webdav(conn, cmd),
        Command::Sync { cmd } => run_sync(conn, cmd),
    }
}

fn parse_env_pairs(pairs: &[String]) -> Result<std::collections::BTreeMap<String, serde_json::Value>, AppError> {
    let mut env = std::collections::BTreeMap::new();
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| AppError::Validation(format!("'{}' is not KEY=VALUE", pair)))?;
        if is_system_managed(key) {
            return Err(AppError::ReservedKey(key.to_string()));
        }
        env.insert(key.to_string(), serde_json::Value::String(value.to_string()));
    }
    Ok(env)
}

fn run_account(conn: &Connection, cmd: AccountCmd) -> Result<(), AppError> {
    match cmd {
        AccountCmd::Add {
            name,
            token,
            base_url,
            model,
            env,
        } => {
            let mut account = Account::new(name, token, base_url);
            account.model = model;
            account.custom_env = parse_env_pairs(&env)?;
            let id = account_service::create_account(conn, &account)?;
            println!("Account {} created (id {})", account.name, id);
            Ok(())
        }
        AccountCmd::List {
            search,
            base_url,
            page,
            per_page,
        } => {
            let result = account_service::list_accounts(
                conn,
                &AccountFilter {
                    search,
                    base_url,
                    page,
                    per_page,
                },
            )?;
            for account in &result.accounts {
                let marker = if account.is_active { "*" } else { " " };
                let linked = account
                    .id
                    .map(|id| association_service::has_association(conn, id))
                    .transpose()?
                    .unwrap_or(false);
                println!(
                    "{:>4} {}{} {}  {}  {}",
                    account.id.unwrap_or_default(),
                    marker,
                    if linked { "+" } else { " " },
                    account.name,
                    account.base_url,
                    account.model.as_deref().unwrap_or("-")
                );
            }
            let p = &result.pagination;
            println!("page {}/{} ({} total)", p.page, p.pages, p.total);
            Ok(())
        }
        AccountCmd::Show { id } => {
            let account = account_service::get_account(conn, id)?;
            println!("{}", serde_json::to_string_pretty(&account)?);
            let linked = association_service::directories_for_account(conn, id)?;
            if !linked.is_empty() {
                println!("Linked directories:");
                for dir in linked {
                    println!("  {} ({})", dir.name, dir.path);
                }
            }
            Ok(())
        }
        AccountCmd::Edit {
            id,
            name,
            token,
            base_url,
            model,
            clear_model,
            env,
        } => {
            let mut account = account_service::get_account(conn, id)?;
            if let Some(name) = name {
                account.name = name;
            }
            if let Some(token) = token {
                account.token = token;
            }
            if let Some(base_url) = base_url {
                account.base_url = base_url;
            }
            if clear_model {
                account.model = None;
            } else if let Some(model) = model {
                account.model = Some(model);
            }
            if !env.is_empty() {
                account.custom_env = parse_env_pairs(&env)?;
            }
            account_service::update_account(conn, &account)?;
            println!("Account {} updated", id);
            Ok(())
        }
        AccountCmd::Rm { id } => {
            account_service::delete_account(conn, id)?;
            println!("Account {} deleted", id);
            Ok(())
        }
    }
}

fn run_dir(conn: &Connection, cmd: DirCmd) -> Result<(), AppError> {
    match cmd {
        DirCmd::Add { name, path } => {
            let id = directory_service::create_directory(conn, &Directory::new(name, path))?;
            println!("Directory registered (id {})", id);
            Ok(())
        }
        DirCmd::List => {
            for dir in directory_service::list_directories(conn)? {
                let marker = if dir.is_active { "*" } else { " " };
                let present = if dir.path_exists() { "" } else { "  [missing]" };
                println!(
                    "{:>4} {} {}  {}{}",
                    dir.id.unwrap_or_default(),
                    marker,
                    dir.name,
                    dir.path,
                    present
                );
            }
            Ok(())
        }
        DirCmd::Check { path } => {
            if directory_service::check_directory_exists(&path) {
                println!("{} exists", path);
            } else {
                println!("{} does not exist", path);
            }
            match directory_service::get_directory_by_path(conn, &path)? {
                Some(dir) => println!("Registered as '{}' (id {})", dir.name, dir.id.unwrap_or_default()),
                None => println!("Not registered"),
            }
            Ok(())
        }
        DirCmd::Rm { id } => {
            directory_service::delete_directory(conn, id)?;
            println!("Directory {} deleted", id);
            Ok(())
        }
    }
}

fn run_url(conn: &Connection, cmd: UrlCmd) -> Result<(), AppError> {
    match cmd {
        UrlCmd::Add {
            name,
            url,
            description,
            default,
        } => {
            let mut base_url = BaseUrl::new(name, url);
            base_url.description = description;
            base_url.is_default = default;
            let id = base_url_service::create_base_url(conn, &base_url)?;
            println!("Endpoint registered (id {})", id);
            Ok(())
        }
        UrlCmd::List => {
            for url in base_url_service::list_base_urls(conn)? {
                let marker = if url.is_default { "*" } else { " " };
                println!(
                    "{:>4} {} {}  {}  {}",
                    url.id.unwrap_or_default(),
                    marker,
                    url.name,
                    url.url,
                    url.description.as_deref().unwrap_or("")
                );
            }
            let in_use = account_service::distinct_base_urls(conn)?;
            if !in_use.is_empty() {
                println!("In use by accounts: {}", in_use.join(", "));
            }
            Ok(())
        }
        UrlCmd::SetDefault { id } => {
            base_url_service::set_default_base_url(conn, id)?;
            println!("Endpoint {} is now the default", id);
            Ok(())
        }
        UrlCmd::Rm { id } => {
            base_url_service::delete_base_url(conn, id)?;
            println!("Endpoint {} deleted", id);
            Ok(())
        }
    }
}

fn run_settings(conn: &Connection, cmd: SettingsCmd) -> Result<(), AppError> {
    match cmd {
        SettingsCmd::Show => {
            let document = settings_service::load_settings(conn)?;
            println!("{}", serde_json::to_string_pretty(&document.to_value())?);
            Ok(())
        }
        SettingsCmd::SetEnv { key, value } => {
            let mut document = settings_service::load_settings(conn)?;
            document.set_custom_env(&key, serde_json::Value::String(value))?;
            settings_service::save_settings(conn, &document)?;
            println!("{} set", key);
            Ok(())
        }
        SettingsCmd::UnsetEnv { key } => {
            let mut document = settings_service::load_settings(conn)?;
            document.remove_custom_env(&key)?;
            settings_service::save_settings(conn, &document)?;
            println!("{} removed", key);
            Ok(())
        }
        SettingsCmd::Set {
            sandbox,
            disable_autoupdater,
            disable_prompt_caching,
            small_fast_model,
            clear_small_fast_model,
            max_output_tokens,
            max_thinking_tokens,
            max_mcp_output_tokens,
            bash_timeout_ms,
            mcp_timeout_ms,
        } => {
            let mut document = settings_service::load_settings(conn)?;
            if let Some(on) = sandbox {
                document.set_sandbox(on);
            }
            if let Some(on) = disable_autoupdater {
                document.set_autoupdater_disabled(on);
            }
            if let Some(on) = disable_prompt_caching {
                document.set_prompt_caching_disabled(on);
            }
            if clear_small_fast_model {
                document.set_small_fast_model(None);
            } else if small_fast_model.is_some() {
                document.set_small_fast_model(small_fast_model);
            }
            if let Some(v) = max_output_tokens {
                document.set_max_output_tokens((v > 0).then_some(v));
            }
            if let Some(v) = max_thinking_tokens {
                document.set_max_thinking_tokens((v > 0).then_some(v));
            }
            if let Some(v) = max_mcp_output_tokens {
                document.set_max_mcp_output_tokens((v > 0).then_some(v));
            }
            if let Some(v) = bash_timeout_ms {
                document.set_bash_default_timeout_ms((v > 0).then_some(v));
            }
            if let Some(v) = mcp_timeout_ms {
                document.set_mcp_timeout((v > 0).then_some(v));
            }
            settings_service::save_settings(conn, &document)?;
            println!("Settings saved");
            Ok(())
        }
    }
}

fn run_webdav(conn: &Connection, cmd: WebdavCmd) -> Result<(), AppError> {
    match cmd {
        WebdavCmd::Add {
            name,
            url,
            username,
            password,
            remote_path,
        } => {
            let mut config = WebdavConfig::new(name, url, username, password);
            if let Some(remote_path) = remote_path {
                config.remote_path = remote_path;
            }
            let id = webdav_service::create_config(conn, &config)?;
            println!("WebDAV remote registered (id {})", id);
            Ok(())
        }
        WebdavCmd::List => {
            for config in webdav_service::list_configs(conn)? {
                let marker = if config.is_active { "*" } else { " " };
                println!(
                    "{:>4} {} {}  {}{}  (last sync: {})",
                    config.id.unwrap_or_default(),
                    marker,
                    config.name,
                    config.url,
                    config.remote_path,
                    config.last_sync_at.as_deref().unwrap_or("never")
                );
            }
            Ok(())
        }
        WebdavCmd::Activate { id } => {
            webdav_service::activate_config(conn, id)?;
            println!("WebDAV remote {} is now active", id);
            Ok(())
        }
        WebdavCmd::Test { id } => {
            let config = webdav_service::get_config(conn, id)?;
            let client = webdav_service::WebdavClient::from_config(&config)?;
            block_on(client.test_connection())??;
            println!("Connection to '{}' OK", config.name);
            Ok(())
        }
        WebdavCmd::Rm { id } => {
            webdav_service::delete_config(conn, id)?;
            println!("WebDAV remote {} deleted", id);
            Ok(())
        }
    }
}

fn active_remote(conn: &Connection) -> Result<WebdavConfig, AppError> {
    webdav_service::get_active_config(conn)?
        .ok_or_else(|| AppError::Validation("No active WebDAV remote configured".to_string()))
}

fn run_sync(conn: &Connection, cmd: SyncCmd) -> Result<(), AppError> {
    match cmd {
        SyncCmd::Upload { file } => {
            let config = active_remote(conn)?;
            let filename = file.unwrap_or_else(snapshot_service::default_snapshot_filename);
            block_on(snapshot_service::upload_snapshot(conn, &config, &filename))??;
            println!("Uploaded {}", filename);
            Ok(())
        }
        SyncCmd::Download { file } => {
            let config = active_remote(conn)?;
            let summary = block_on(snapshot_service::download_snapshot(conn, &config, &file))??;
            println!(
                "Merged {}: accounts +{}/~{}, endpoints +{}/~{}, settings {}",
                file,
                summary.accounts_added,
                summary.accounts_updated,
                summary.base_urls_added,
                summary.base_urls_updated,
                if summary.settings_applied { "applied" } else { "unchanged" }
            );
            Ok(())
        }
        SyncCmd::Files => {
            let config = active_remote(conn)?;
            let client = webdav_service::WebdavClient::from_config(&config)?;
            for name in block_on(client.list_files())?? {
                println!("{}", name);
            }
            Ok(())
        }
        SyncCmd::RmFile { file } => {
            let config = active_remote(conn)?;
            let client = webdav_service::WebdavClient::from_config(&config)?;
            block_on(client.delete_file(&file))??;
            println!("Deleted {}", file);
            Ok(())
        }
        SyncCmd::Logs { limit, config } => {
            for entry in sync_log_service::query(conn, config, limit)? {
                println!(
                    "{}  {:<8} {:<8} {}",
                    entry.synced_at,
                    entry.sync_type.as_str(),
                    entry.status.as_str(),
                    entry.message.as_deref().unwrap_or("")
                );
            }
            Ok(())
        }
    }
}

/// Runs one async remote operation on a throwaway current-thread runtime.
fn block_on<F: std::future::Future>(future: F) -> Result<F::Output, AppError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    Ok(runtime.block_on(future))
}
