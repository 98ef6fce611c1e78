use crate::error::AppError;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// Env keys reserved for typed setters; never settable through the
/// free-form custom-env path.
pub const SYSTEM_MANAGED_KEYS: &[&str] = &[
    "IS_SANDBOX",
    "DISABLE_AUTOUPDATER",
    "DISABLE_PROMPT_CACHING",
    "ANTHROPIC_SMALL_FAST_MODEL",
    "CLAUDE_CODE_MAX_OUTPUT_TOKENS",
    "MAX_THINKING_TOKENS",
    "MAX_MCP_OUTPUT_TOKENS",
    "BASH_DEFAULT_TIMEOUT_MS",
    "MCP_TIMEOUT",
];

/// Keys that act as on/off switches: present (truthy) when on, absent when off
const BOOL_SWITCH_KEYS: &[&str] = &["IS_SANDBOX", "DISABLE_AUTOUPDATER", "DISABLE_PROMPT_CACHING"];

pub fn is_system_managed(key: &str) -> bool {
    SYSTEM_MANAGED_KEYS.contains(&key)
}

fn is_bool_switch(key: &str) -> bool {
    BOOL_SWITCH_KEYS.contains(&key)
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_i64().map(|v| v != 0).unwrap_or(false),
        Value::String(s) => s == "1" || s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionMode {
    BypassPermissions,
    AcceptEdits,
    Normal,
}

impl PermissionMode {
    pub fn as_str(&self) -> &str {
        match self {
            PermissionMode::BypassPermissions => "bypassPermissions",
            PermissionMode::AcceptEdits => "acceptEdits",
            PermissionMode::Normal => "normal",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "bypassPermissions" => Some(PermissionMode::BypassPermissions),
            "acceptEdits" => Some(PermissionMode::AcceptEdits),
            "normal" => Some(PermissionMode::Normal),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Permissions {
    pub default_mode: Option<PermissionMode>,
    pub allow: Option<Vec<String>>,
    pub deny: Vec<String>,
}

/// The mutable JSON configuration written to a directory's settings artifact.
///
/// `env` uses a BTreeMap so that serialization is deterministic: resolving
/// and serializing the same inputs twice yields byte-identical output.
#[derive(Debug, Clone, PartialEq)]
pub struct SettingsDocument {
    pub permissions: Permissions,
    pub env: BTreeMap<String, Value>,
}

impl Default for SettingsDocument {
    /// The factory document: bypass permissions, everything allowed,
    /// sandbox on, auto-updater off.
    fn default() -> Self {
        let mut env = BTreeMap::new();
        env.insert("IS_SANDBOX".to_string(), json!("1"));
        env.insert("DISABLE_AUTOUPDATER".to_string(), json!(1));
        Self {
            permissions: Permissions {
                default_mode: Some(PermissionMode::BypassPermissions),
                allow: Some(vec!["*".to_string()]),
                deny: Vec::new(),
            },
            env,
        }
    }
}

impl SettingsDocument {
    /// Parses and validates a raw JSON value.
    ///
    /// Both `permissions` and `env` must be present and well-formed; inner
    /// permission fields may be absent and are filled by `normalize()`.
    pub fn from_value(raw: &Value) -> Result<Self, AppError> {
        let obj = raw
            .as_object()
            .ok_or_else(|| AppError::Validation("Settings must be a JSON object".to_string()))?;

        let permissions_raw = obj
            .get("permissions")
            .ok_or_else(|| AppError::Validation("Missing 'permissions' section".to_string()))?
            .as_object()
            .ok_or_else(|| AppError::Validation("'permissions' must be an object".to_string()))?;

        let default_mode = match permissions_raw.get("defaultMode") {
            None => None,
            Some(Value::String(s)) => Some(PermissionMode::from_str(s).ok_or_else(|| {
                AppError::Validation(format!("Unknown permission mode '{}'", s))
            })?),
            Some(_) => {
                return Err(AppError::Validation(
                    "'defaultMode' must be a string".to_string(),
                ))
            }
        };

        let allow = match permissions_raw.get("allow") {
            None => None,
            Some(v) => Some(parse_string_array(v, "allow")?),
        };

        let deny = match permissions_raw.get("deny") {
            None => Vec::new(),
            Some(v) => parse_string_array(v, "deny")?,
        };

        let env_raw = obj
            .get("env")
            .ok_or_else(|| AppError::Validation("Missing 'env' section".to_string()))?
            .as_object()
            .ok_or_else(|| AppError::Validation("'env' must be an object".to_string()))?;

        let mut env = BTreeMap::new();
        for (key, value) in env_raw {
            if key.trim().is_empty() {
                return Err(AppError::Validation(
                    "Env keys must not be empty".to_string(),
                ));
            }
            match value {
                Value::String(_) | Value::Number(_) => {
                    env.insert(key.clone(), value.clone());
                }
                _ => {
                    return Err(AppError::Validation(format!(
                        "Env value for '{}' must be a string or number",
                        key
                    )))
                }
            }
        }

        Ok(Self {
            permissions: Permissions {
                default_mode,
                allow,
                deny,
            },
            env,
        })
    }

    /// Fills absent permission fields with their defaults
    pub fn normalize(&mut self) {
        if self.permissions.default_mode.is_none() {
            self.permissions.default_mode = Some(PermissionMode::BypassPermissions);
        }
        if self.permissions.allow.is_none() {
            self.permissions.allow = Some(vec!["*".to_string()]);
        }
    }

    /// Sets a free-form env var. System-managed keys are rejected and the
    /// document is left unchanged.
    pub fn set_custom_env(&mut self, key: &str, value: Value) -> Result<(), AppError> {
        if is_system_managed(key) {
            return Err(AppError::ReservedKey(key.to_string()));
        }
        if key.trim().is_empty() {
            return Err(AppError::Validation(
                "Env key must not be empty".to_string(),
            ));
        }
        match value {
            Value::String(_) | Value::Number(_) => {
                self.env.insert(key.to_string(), value);
                Ok(())
            }
            _ => Err(AppError::Validation(format!(
                "Env value for '{}' must be a string or number",
                key
            ))),
        }
    }

    /// Removes a free-form env var; system-managed keys are rejected
    pub fn remove_custom_env(&mut self, key: &str) -> Result<(), AppError> {
        if is_system_managed(key) {
            return Err(AppError::ReservedKey(key.to_string()));
        }
        self.env.remove(key);
        Ok(())
    }

    // Typed setters for the system-managed switches. On is stored as the
    // canonical truthy form; off removes the key so it is omitted from the
    // serialized document.

    pub fn set_sandbox(&mut self, on: bool) {
        self.set_switch("IS_SANDBOX", on, json!("1"));
    }

    pub fn set_autoupdater_disabled(&mut self, on: bool) {
        self.set_switch("DISABLE_AUTOUPDATER", on, json!(1));
    }

    pub fn set_prompt_caching_disabled(&mut self, on: bool) {
        self.set_switch("DISABLE_PROMPT_CACHING", on, json!(1));
    }

    fn set_switch(&mut self, key: &str, on: bool, truthy: Value) {
        if on {
            self.env.insert(key.to_string(), truthy);
        } else {
            self.env.remove(key);
        }
    }

    pub fn set_small_fast_model(&mut self, model: Option<String>) {
        self.set_typed("ANTHROPIC_SMALL_FAST_MODEL", model.map(Value::String));
    }

    pub fn set_max_output_tokens(&mut self, tokens: Option<u64>) {
        self.set_typed("CLAUDE_CODE_MAX_OUTPUT_TOKENS", tokens.map(Value::from));
    }

    pub fn set_max_thinking_tokens(&mut self, tokens: Option<u64>) {
        self.set_typed("MAX_THINKING_TOKENS", tokens.map(Value::from));
    }

    pub fn set_max_mcp_output_tokens(&mut self, tokens: Option<u64>) {
        self.set_typed("MAX_MCP_OUTPUT_TOKENS", tokens.map(Value::from));
    }

    pub fn set_bash_default_timeout_ms(&mut self, timeout: Option<u64>) {
        self.set_typed("BASH_DEFAULT_TIMEOUT_MS", timeout.map(Value::from));
    }

    pub fn set_mcp_timeout(&mut self, timeout: Option<u64>) {
        self.set_typed("MCP_TIMEOUT", timeout.map(Value::from));
    }

    fn set_typed(&mut self, key: &str, value: Option<Value>) {
        match value {
            Some(v) => {
                self.env.insert(key.to_string(), v);
            }
            None => {
                self.env.remove(key);
            }
        }
    }

    /// Serializes with the clean pass applied: switch keys are present only
    /// when truthy, and an empty `deny` is omitted entirely.
    pub fn to_value(&self) -> Value {
        let mut permissions = Map::new();
        if let Some(mode) = self.permissions.default_mode {
            permissions.insert("defaultMode".to_string(), json!(mode.as_str()));
        }
        if let Some(allow) = &self.permissions.allow {
            permissions.insert("allow".to_string(), json!(allow));
        }
        if !self.permissions.deny.is_empty() {
            permissions.insert("deny".to_string(), json!(self.permissions.deny));
        }

        let mut env = Map::new();
        for (key, value) in &self.env {
            if is_bool_switch(key) && !is_truthy(value) {
                continue;
            }
            env.insert(key.clone(), value.clone());
        }

        json!({
            "permissions": permissions,
            "env": env,
        })
    }
}

fn parse_string_array(value: &Value, field: &str) -> Result<Vec<String>, AppError> {
    let arr = value
        .as_array()
        .ok_or_else(|| AppError::Validation(format!("'{}' must be an array", field)))?;

    arr.iter()
        .map(|v| {
            v.as_str()
                .map(|s| s.to_string())
                .ok_or_else(|| AppError::Validation(format!("'{}' entries must be strings", field)))
        })
        .collect()
}
