pub mod account;
pub mod association;
pub mod base_url;
pub mod directory;
pub mod sync_log;
pub mod webdav_config;

pub use account::{Account, AccountFilter, AccountPage, PaginationInfo};
pub use association::{Association, AssociationView};
pub use base_url::BaseUrl;
pub use directory::Directory;
pub use sync_log::{SyncLog, SyncStatus, SyncType};
pub use webdav_config::WebdavConfig;

use crate::error::AppError;

/// Validates that a URL is usable as an API endpoint (http or https)
pub fn validate_endpoint_url(url: &str) -> Result<(), AppError> {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return Err(AppError::Validation("URL must not be empty".to_string()));
    }
    if !trimmed.starts_with("http://") && !trimmed.starts_with("https://") {
        return Err(AppError::Validation(
            "URL must start with http:// or https://".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_endpoint_url() {
        assert!(validate_endpoint_url("https://api.anthropic.com").is_ok());
        assert!(validate_endpoint_url("http://localhost:8080").is_ok());
        assert!(validate_endpoint_url("ftp://example.com").is_err());
        assert!(validate_endpoint_url("   ").is_err());
    }
}
