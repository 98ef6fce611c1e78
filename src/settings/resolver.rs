use crate::models::Account;
use crate::settings::document::{is_system_managed, SettingsDocument};
use serde_json::Value;
use std::collections::BTreeMap;

/// Fixed key receiving the account token on every switch
pub const AUTH_TOKEN_KEY: &str = "ANTHROPIC_AUTH_TOKEN";
/// Fixed key receiving the account base URL on every switch
pub const BASE_URL_KEY: &str = "ANTHROPIC_BASE_URL";
/// Key receiving the account-level model override
pub const MODEL_KEY: &str = "ANTHROPIC_MODEL";

/// Computes the effective environment for switching `account` into a
/// directory, given the global settings document.
///
/// Precedence, highest to lowest: account token/base_url (always win),
/// account model, account custom env, global settings env. The function is
/// pure; identical inputs produce identical (deterministically ordered)
/// output.
pub fn resolve_env(account: &Account, global: &SettingsDocument) -> BTreeMap<String, Value> {
    let mut env = global.env.clone();

    // Account-level custom vars override global ones. Reserved keys cannot
    // enter here either; they are filtered with a warning because account
    // records may predate the reserved list.
    for (key, value) in &account.custom_env {
        if is_system_managed(key) {
            log::warn!(
                "Ignoring system-managed key '{}' in custom env of account '{}'",
                key,
                account.name
            );
            continue;
        }
        env.insert(key.clone(), value.clone());
    }

    // The model override originates from the account record, not free-form
    // input, so it may bypass the reserved-key restriction.
    if let Some(model) = &account.model {
        if !model.trim().is_empty() {
            env.insert(MODEL_KEY.to_string(), Value::String(model.clone()));
        }
    }

    // Token and base URL are the point of the switch; they are injected
    // last and unconditionally.
    env.insert(
        AUTH_TOKEN_KEY.to_string(),
        Value::String(account.token.clone()),
    );
    env.insert(
        BASE_URL_KEY.to_string(),
        Value::String(account.base_url.clone()),
    );

    env
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn account() -> Account {
        let mut account = Account::new(
            "work".to_string(),
            "sk-abc123".to_string(),
            "https://api.x.com".to_string(),
        );
        account.model = Some("claude-x".to_string());
        account
    }

    #[test]
    fn test_resolve_scenario_with_empty_global_env() {
        let mut global = SettingsDocument::default();
        global.env.clear();

        let env = resolve_env(&account(), &global);

        assert_eq!(env.get(AUTH_TOKEN_KEY), Some(&json!("sk-abc123")));
        assert_eq!(env.get(BASE_URL_KEY), Some(&json!("https://api.x.com")));
        assert_eq!(env.get(MODEL_KEY), Some(&json!("claude-x")));
        assert_eq!(env.len(), 3);
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let global = SettingsDocument::default();
        let account = account();

        let first = resolve_env(&account, &global);
        let second = resolve_env(&account, &global);

        assert_eq!(first, second);
        let a = serde_json::to_string(&first).unwrap();
        let b = serde_json::to_string(&second).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_account_keys_override_global_env() {
        let mut global = SettingsDocument::default();
        global
            .env
            .insert(AUTH_TOKEN_KEY.to_string(), json!("stale-token"));
        global
            .env
            .insert(BASE_URL_KEY.to_string(), json!("https://old.example.com"));

        let env = resolve_env(&account(), &global);

        assert_eq!(env.get(AUTH_TOKEN_KEY), Some(&json!("sk-abc123")));
        assert_eq!(env.get(BASE_URL_KEY), Some(&json!("https://api.x.com")));
    }

    #[test]
    fn test_custom_env_overrides_global_but_not_fixed_keys() {
        let mut global = SettingsDocument::default();
        global.env.insert("HTTP_PROXY".to_string(), json!("global"));

        let mut acc = account();
        acc.custom_env.insert("HTTP_PROXY".to_string(), json!("account"));
        acc.custom_env
            .insert(AUTH_TOKEN_KEY.to_string(), json!("spoofed"));

        let env = resolve_env(&acc, &global);

        assert_eq!(env.get("HTTP_PROXY"), Some(&json!("account")));
        assert_eq!(env.get(AUTH_TOKEN_KEY), Some(&json!("sk-abc123")));
    }

    #[test]
    fn test_reserved_keys_in_custom_env_filtered() {
        let global = SettingsDocument::default();
        let mut acc = account();
        acc.custom_env.insert("IS_SANDBOX".to_string(), json!("0"));

        let env = resolve_env(&acc, &global);

        // Global default wins; the custom entry is ignored.
        assert_eq!(env.get("IS_SANDBOX"), Some(&json!("1")));
    }

    #[test]
    fn test_unset_model_adds_no_key() {
        let mut global = SettingsDocument::default();
        global.env.clear();
        let mut acc = account();
        acc.model = None;

        let env = resolve_env(&acc, &global);
        assert!(env.get(MODEL_KEY).is_none());
        assert_eq!(env.len(), 2);
    }
}
