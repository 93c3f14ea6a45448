use std::time::Duration;

use crate::domain::ApiGeneration;

/// Connection settings for the identity service admin account
#[derive(Debug, Clone)]
pub struct IdentityClientConfig {
    /// Identity endpoint, e.g. `http://127.0.0.1:5000/v3`
    pub auth_url: String,
    pub username: String,
    pub password: String,
    /// Project (tenant) the admin token is scoped to
    pub tenant_name: String,
    pub user_domain_id: String,
    pub project_domain_id: String,
    pub timeout: Duration,
    /// Skip version negotiation and use this generation
    pub generation: Option<ApiGeneration>,
}

impl IdentityClientConfig {
    pub fn new(auth_url: &str, username: &str, password: &str, tenant_name: &str) -> Self {
        Self {
            auth_url: auth_url.to_string(),
            username: username.to_string(),
            password: password.to_string(),
            tenant_name: tenant_name.to_string(),
            user_domain_id: "default".to_string(),
            project_domain_id: "default".to_string(),
            timeout: Duration::from_secs(30),
            generation: None,
        }
    }

    /// Identity root URL with any version suffix removed
    pub fn root_url(&self) -> String {
        let trimmed = self.auth_url.trim_end_matches('/');
        match trimmed.rsplit_once('/') {
            Some((root, last)) if is_version_segment(last) => root.to_string(),
            _ => trimmed.to_string(),
        }
    }

    /// Versioned endpoint for a generation under the identity root
    pub fn endpoint_for(&self, generation: ApiGeneration) -> String {
        format!("{}/{}", self.root_url(), generation.version())
    }
}

fn is_version_segment(segment: &str) -> bool {
    segment
        .strip_prefix('v')
        .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit() || c == '.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_url_strips_version() {
        let config = IdentityClientConfig::new("http://127.0.0.1:5000/v3", "admin", "x", "admin");
        assert_eq!(config.root_url(), "http://127.0.0.1:5000");

        let config = IdentityClientConfig::new("http://keystone/identity/v2.0/", "admin", "x", "admin");
        assert_eq!(config.root_url(), "http://keystone/identity");

        let config = IdentityClientConfig::new("http://keystone:5000", "admin", "x", "admin");
        assert_eq!(config.root_url(), "http://keystone:5000");
    }

    #[test]
    fn test_endpoint_for_generation() {
        let config = IdentityClientConfig::new("http://127.0.0.1:5000/v3", "admin", "x", "admin");
        assert_eq!(
            config.endpoint_for(ApiGeneration::Legacy),
            "http://127.0.0.1:5000/v2.0"
        );
        assert_eq!(
            config.endpoint_for(ApiGeneration::Current),
            "http://127.0.0.1:5000/v3"
        );
    }
}
