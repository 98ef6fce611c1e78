pub mod account_service;
pub mod association_service;
pub mod base_url_service;
pub mod config_file;
pub mod directory_service;
pub mod op_guard;
pub mod settings_service;
pub mod snapshot_service;
pub mod switch_service;
pub mod sync_log_service;
pub mod webdav_service;
