use crate::error::AppError;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

const CLAUDE_DIR: &str = ".claude";
const SETTINGS_FILE: &str = "settings.local.json";

/// Path of the per-directory settings artifact.
pub fn settings_file_path(directory: &str) -> PathBuf {
    Path::new(directory).join(CLAUDE_DIR).join(SETTINGS_FILE)
}

/// Writes the resolved settings document into `<dir>/.claude/settings.local.json`,
/// creating the `.claude` directory as needed.
pub fn write_settings_artifact(directory: &str, document: &Value) -> Result<(), AppError> {
    let claude_dir = Path::new(directory).join(CLAUDE_DIR);
    fs::create_dir_all(&claude_dir)?;

    let json = serde_json::to_string_pretty(document)?;
    fs::write(claude_dir.join(SETTINGS_FILE), json)?;
    Ok(())
}

/// Reads the env block back out of a directory's settings artifact.
/// A missing file yields an empty map; values are rendered as plain strings.
pub fn read_env_config(directory: &str) -> Result<BTreeMap<String, String>, AppError> {
    let path = settings_file_path(directory);
    if !path.exists() {
        return Ok(BTreeMap::new());
    }

    let raw = fs::read_to_string(&path)?;
    let parsed: Value = serde_json::from_str(&raw)
        .map_err(|e| AppError::Serialization(format!("{}: {}", path.display(), e)))?;

    let mut env = BTreeMap::new();
    if let Some(map) = parsed.get("env").and_then(Value::as_object) {
        for (key, value) in map {
            let rendered = match value {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                other => other.to_string(),
            };
            env.insert(key.clone(), rendered);
        }
    }
    Ok(env)
}
