pub mod document;
pub mod resolver;

pub use document::{is_system_managed, SettingsDocument};
pub use resolver::resolve_env;
