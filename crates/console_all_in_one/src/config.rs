use common::domain::ApiGeneration;
use common::identity::IdentityClientConfig;
use common::telemetry::TelemetryConfig;
use config::{Config, ConfigError, Environment, File};
use identity_console::ConsolePolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Admin account the console uses against the identity service
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct IdentitySettings {
    /// Identity endpoint; the version suffix is optional
    #[serde(default = "default_auth_url")]
    pub auth_url: String,

    #[serde(default = "default_admin_name")]
    pub username: String,

    #[serde(default)]
    pub password: String,

    /// Project the admin token is scoped to
    #[serde(default = "default_admin_name")]
    pub tenant_name: String,

    #[serde(default)]
    pub region_name: Option<String>,

    #[serde(default = "default_domain_id")]
    pub user_domain_id: String,

    #[serde(default = "default_domain_id")]
    pub project_domain_id: String,

    /// Force an API version (`2.0` or `3`) instead of negotiating
    #[serde(default)]
    pub api_generation: Option<String>,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for IdentitySettings {
    fn default() -> Self {
        Self {
            auth_url: default_auth_url(),
            username: default_admin_name(),
            password: String::new(),
            tenant_name: default_admin_name(),
            region_name: None,
            user_domain_id: default_domain_id(),
            project_domain_id: default_domain_id(),
            api_generation: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ConsoleSettings {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub otel_enabled: bool,

    #[serde(default = "default_otel_endpoint")]
    pub otel_endpoint: String,

    #[serde(default = "default_otel_service_name")]
    pub otel_service_name: String,

    /// Rows per page of paginated listings
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    #[serde(default)]
    pub identity: IdentitySettings,

    #[serde(default)]
    pub policy: ConsolePolicy,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_otel_service_name() -> String {
    "identity-console".to_string()
}

fn default_page_size() -> usize {
    20
}

fn default_auth_url() -> String {
    "http://127.0.0.1:5000/v3".to_string()
}

fn default_admin_name() -> String {
    "admin".to_string()
}

fn default_domain_id() -> String {
    "default".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl ConsoleSettings {
    /// Load settings from an optional file, then `CONSOLE_*` environment
    /// variables. Nested keys use `__`, e.g. `CONSOLE_IDENTITY__AUTH_URL`;
    /// role lists are comma separated.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path).required(false));
        }

        builder
            .add_source(
                Environment::with_prefix("CONSOLE")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("policy.default_user_roles")
                    .with_list_parse_key("policy.default_group_roles")
                    .with_list_parse_key("policy.disinherited_roles"),
            )
            .build()?
            .try_deserialize()
    }

    pub fn identity_client_config(&self) -> anyhow::Result<IdentityClientConfig> {
        let identity = &self.identity;
        let generation = identity
            .api_generation
            .as_deref()
            .map(ApiGeneration::from_version)
            .transpose()?;

        Ok(IdentityClientConfig {
            auth_url: identity.auth_url.clone(),
            username: identity.username.clone(),
            password: identity.password.clone(),
            tenant_name: identity.tenant_name.clone(),
            user_domain_id: identity.user_domain_id.clone(),
            project_domain_id: identity.project_domain_id.clone(),
            timeout: Duration::from_secs(identity.request_timeout_secs),
            generation,
        })
    }

    pub fn telemetry_config(&self) -> TelemetryConfig {
        TelemetryConfig {
            service_name: self.otel_service_name.clone(),
            otel_endpoint: self.otel_endpoint.clone(),
            otel_enabled: self.otel_enabled,
            log_level: self.log_level.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Mutex to ensure tests run serially and don't interfere with each other
    static TEST_LOCK: Mutex<()> = Mutex::new(());

    const VARS: &[&str] = &[
        "CONSOLE_LOG_LEVEL",
        "CONSOLE_PAGE_SIZE",
        "CONSOLE_IDENTITY__AUTH_URL",
        "CONSOLE_IDENTITY__API_GENERATION",
        "CONSOLE_POLICY__DEFAULT_USER_ROLES",
    ];

    fn clear_env() {
        for var in VARS {
            // SAFETY: Test runs with mutex lock to prevent concurrent env access
            unsafe {
                std::env::remove_var(var);
            }
        }
    }

    #[test]
    fn test_default_settings() {
        let _lock = TEST_LOCK.lock().unwrap();
        clear_env();

        let settings = ConsoleSettings::load(None).unwrap();
        assert_eq!(settings.log_level, "info");
        assert_eq!(settings.page_size, 20);
        assert_eq!(settings.identity.tenant_name, "admin");
        assert_eq!(settings.policy.default_group_roles, vec!["_member_"]);
        assert_eq!(settings.policy.disinherited_roles.len(), 3);
        assert_eq!(settings.policy.role_categories.len(), 3);

        let identity = settings.identity_client_config().unwrap();
        assert_eq!(identity.generation, None);
        assert_eq!(identity.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_environment_overrides() {
        let _lock = TEST_LOCK.lock().unwrap();
        clear_env();

        // SAFETY: Test runs with mutex lock to prevent concurrent env access
        unsafe {
            std::env::set_var("CONSOLE_LOG_LEVEL", "debug");
            std::env::set_var("CONSOLE_PAGE_SIZE", "50");
            std::env::set_var("CONSOLE_IDENTITY__AUTH_URL", "http://keystone:5000/v2.0");
            std::env::set_var("CONSOLE_IDENTITY__API_GENERATION", "2.0");
            std::env::set_var("CONSOLE_POLICY__DEFAULT_USER_ROLES", "_member_,C__DC1__Viewer");
        }

        let settings = ConsoleSettings::load(None).unwrap();
        assert_eq!(settings.log_level, "debug");
        assert_eq!(settings.page_size, 50);
        assert_eq!(settings.identity.auth_url, "http://keystone:5000/v2.0");
        assert_eq!(
            settings.policy.default_user_roles,
            vec!["_member_", "C__DC1__Viewer"]
        );

        let identity = settings.identity_client_config().unwrap();
        assert_eq!(identity.generation, Some(ApiGeneration::Legacy));

        clear_env();
    }

    #[test]
    fn test_unknown_api_generation_is_rejected() {
        let _lock = TEST_LOCK.lock().unwrap();
        clear_env();

        // SAFETY: Test runs with mutex lock to prevent concurrent env access
        unsafe {
            std::env::set_var("CONSOLE_IDENTITY__API_GENERATION", "v4");
        }

        let settings = ConsoleSettings::load(None).unwrap();
        assert!(settings.identity_client_config().is_err());

        clear_env();
    }
}
