use std::fmt;

/// Central error types for the switcher
#[derive(Debug)]
pub enum AppError {
    /// Database error (rusqlite)
    Database(rusqlite::Error),
    /// Filesystem error
    Filesystem(std::io::Error),
    /// Validation error (e.g. invalid inputs)
    Validation(String),
    /// Unique-field collision; carries the field name and the rejected value
    Uniqueness { field: &'static str, value: String },
    /// Resource not found
    NotFound(String),
    /// Attempt to set a system-managed env key through the custom path
    ReservedKey(String),
    /// Re-entrant operation on a resource that is already locked
    Busy(String),
    /// WebDAV / network failure, surfaced verbatim
    Remote(String),
    /// JSON (de)serialization error
    Serialization(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AppError::Database(e) => write!(f, "Database error: {}", e),
            AppError::Filesystem(e) => write!(f, "Filesystem error: {}", e),
            AppError::Validation(msg) => write!(f, "Validation error: {}", msg),
            AppError::Uniqueness { field, value } => {
                write!(f, "Duplicate {}: '{}' already exists", field, value)
            }
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::ReservedKey(key) => {
                write!(f, "'{}' is system-managed and cannot be set directly", key)
            }
            AppError::Busy(msg) => write!(f, "Operation already in progress: {}", msg),
            AppError::Remote(msg) => write!(f, "Remote error: {}", msg),
            AppError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

// Conversions from other error types
impl From<rusqlite::Error> for AppError {
    fn from(e: rusqlite::Error) -> Self {
        AppError::Database(e)
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::Filesystem(e)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::Serialization(e.to_string())
    }
}

/// User-friendly error messages for the CLI surface
impl AppError {
    pub fn user_message(&self) -> String {
        match self {
            AppError::Database(_) => "A database error occurred. Please try again.".to_string(),
            AppError::Filesystem(_) => {
                "Error accessing files. Please check permissions.".to_string()
            }
            AppError::Validation(msg) => msg.clone(),
            AppError::Uniqueness { field, value } => {
                format!("A record with {} '{}' already exists.", field, value)
            }
            AppError::NotFound(msg) => format!("{} was not found.", msg),
            AppError::ReservedKey(key) => format!(
                "{} is managed by the application and must be changed via its own setting.",
                key
            ),
            AppError::Busy(msg) => format!("Please wait: {}.", msg),
            AppError::Remote(msg) => msg.clone(),
            AppError::Serialization(_) => "Error processing configuration data.".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniqueness_display_names_the_field() {
        let err = AppError::Uniqueness {
            field: "name",
            value: "work".to_string(),
        };
        assert!(err.to_string().contains("name"));
        assert!(err.to_string().contains("work"));
    }

    #[test]
    fn test_reserved_key_message() {
        let err = AppError::ReservedKey("IS_SANDBOX".to_string());
        assert!(err.user_message().contains("IS_SANDBOX"));
    }
}
