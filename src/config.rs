use crate::utils::get_env_with_prefix;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Session manager configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ManagerConfig {
    /// Name of the registered storage backend to use
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Name of the session cookie
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,

    /// Session max lifetime (in seconds)
    ///
    /// Drives both the cookie expiry and the gc sweep interval.
    #[serde(default = "default_max_lifetime_seconds")]
    pub max_lifetime_seconds: u64,

    /// Session identifier assumed when a lock operation arrives on a
    /// transport that carries no cookie (the WebSocket unlock path).
    ///
    /// This is an intentional single-tenant fallback: the service serves one
    /// admin surface, so a cookieless unlock maps to one well-known session.
    #[serde(default = "default_fallback_session_id")]
    pub fallback_session_id: String,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            cookie_name: default_cookie_name(),
            max_lifetime_seconds: default_max_lifetime_seconds(),
            fallback_session_id: default_fallback_session_id(),
        }
    }
}

impl ManagerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(provider) = get_env_with_prefix("SESSION_PROVIDER") {
            config.provider = provider;
        }

        if let Some(name) = get_env_with_prefix("SESSION_COOKIE_NAME") {
            config.cookie_name = name;
        }

        if let Some(ttl) = get_env_with_prefix("SESSION_MAX_LIFETIME_SECONDS") {
            if let Ok(seconds) = ttl.parse() {
                config.max_lifetime_seconds = seconds;
            }
        }

        if let Some(sid) = get_env_with_prefix("SESSION_FALLBACK_ID") {
            config.fallback_session_id = sid;
        }

        config
    }

    /// Get max lifetime as Duration
    pub fn max_lifetime(&self) -> Duration {
        Duration::from_secs(self.max_lifetime_seconds)
    }
}

fn default_provider() -> String {
    "memory".to_string()
}

fn default_cookie_name() -> String {
    "lockside_session".to_string()
}

fn default_max_lifetime_seconds() -> u64 {
    3600
}

fn default_fallback_session_id() -> String {
    "lockside".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ManagerConfig::default();
        assert_eq!(config.provider, "memory");
        assert_eq!(config.cookie_name, "lockside_session");
        assert_eq!(config.max_lifetime_seconds, 3600);
        assert_eq!(config.max_lifetime(), Duration::from_secs(3600));
        assert_eq!(config.fallback_session_id, "lockside");
    }

    #[test]
    fn test_deserialize_partial() {
        let config: ManagerConfig =
            serde_json::from_str(r#"{"cookie_name": "bdpan", "max_lifetime_seconds": 60}"#)
                .unwrap();
        assert_eq!(config.cookie_name, "bdpan");
        assert_eq!(config.max_lifetime_seconds, 60);
        assert_eq!(config.provider, "memory");
    }

    #[test]
    fn test_from_env_overrides() {
        unsafe {
            std::env::set_var("LOCKSIDE_SESSION_COOKIE_NAME", "admin_session");
            std::env::set_var("LOCKSIDE_SESSION_MAX_LIFETIME_SECONDS", "7200");
        }

        let config = ManagerConfig::from_env();
        assert_eq!(config.cookie_name, "admin_session");
        assert_eq!(config.max_lifetime_seconds, 7200);

        unsafe {
            std::env::remove_var("LOCKSIDE_SESSION_COOKIE_NAME");
            std::env::remove_var("LOCKSIDE_SESSION_MAX_LIFETIME_SECONDS");
        }
    }
}
