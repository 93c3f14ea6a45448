use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::domain::{ApiGeneration, DomainError, DomainResult, IdentityClient};
use crate::identity::config::IdentityClientConfig;
use crate::identity::current::CurrentIdentityClient;
use crate::identity::legacy::LegacyIdentityClient;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum VersionDocument {
    Many { versions: VersionValues },
    Single { version: VersionEntry },
}

#[derive(Debug, Deserialize)]
struct VersionValues {
    values: Vec<VersionEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct VersionEntry {
    id: String,
    #[serde(default)]
    links: Vec<VersionLink>,
}

#[derive(Debug, Clone, Deserialize)]
struct VersionLink {
    rel: String,
    href: String,
}

/// A generation advertised by the identity service and where it lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdvertisedVersion {
    pub generation: ApiGeneration,
    pub endpoint: String,
}

impl VersionDocument {
    fn entries(self) -> Vec<VersionEntry> {
        match self {
            VersionDocument::Many { versions } => versions.values,
            VersionDocument::Single { version } => vec![version],
        }
    }
}

/// Pick the newest generation this console speaks out of a version document.
/// Unknown versions are skipped.
fn select_version(
    document: VersionDocument,
    config: &IdentityClientConfig,
) -> DomainResult<AdvertisedVersion> {
    let mut advertised: Vec<AdvertisedVersion> = document
        .entries()
        .into_iter()
        .filter_map(|entry| {
            let generation = match ApiGeneration::from_version(&entry.id) {
                Ok(generation) => generation,
                Err(_) => {
                    debug!(version = %entry.id, "skipping unsupported identity version");
                    return None;
                }
            };
            let endpoint = entry
                .links
                .iter()
                .find(|link| link.rel == "self")
                .map(|link| link.href.trim_end_matches('/').to_string())
                .unwrap_or_else(|| config.endpoint_for(generation));
            Some(AdvertisedVersion {
                generation,
                endpoint,
            })
        })
        .collect();

    advertised.sort_by(|a, b| b.generation.cmp(&a.generation));
    advertised
        .into_iter()
        .next()
        .ok_or_else(|| DomainError::UnsupportedIdentityVersion(config.root_url()))
}

/// Read the version document at the identity root
#[instrument(skip(config), fields(auth_url = %config.auth_url))]
pub async fn discover_version(config: &IdentityClientConfig) -> DomainResult<AdvertisedVersion> {
    let client = reqwest::Client::builder()
        .timeout(config.timeout)
        .build()
        .map_err(|e| DomainError::RemoteError(e.into()))?;

    let root = format!("{}/", config.root_url());
    let response = client
        .get(&root)
        .send()
        .await
        .map_err(|e| DomainError::RemoteError(e.into()))?;

    // the root answers 300 Multiple Choices on most deployments
    let status = response.status();
    if !status.is_success() && !status.is_redirection() {
        return Err(DomainError::IdentityService {
            status: status.as_u16(),
            message: format!("version discovery failed at {root}"),
        });
    }

    let document: VersionDocument = response
        .json()
        .await
        .map_err(|e| DomainError::RemoteError(e.into()))?;

    select_version(document, config)
}

/// Build the identity client for the configured service.
///
/// A configured generation is used as-is; otherwise the version document is
/// consulted and the current generation preferred.
pub async fn negotiate_identity_client(
    config: &IdentityClientConfig,
) -> DomainResult<Arc<dyn IdentityClient>> {
    let advertised = match config.generation {
        Some(generation) => {
            debug!(%generation, "identity API generation pinned by configuration");
            AdvertisedVersion {
                generation,
                endpoint: config.endpoint_for(generation),
            }
        }
        None => discover_version(config).await?,
    };

    if advertised.generation == ApiGeneration::Legacy {
        warn!("identity service only offers the v2.0 API, groups and domains are unavailable");
    }

    info!(
        generation = %advertised.generation,
        endpoint = %advertised.endpoint,
        "identity client ready"
    );

    let client: Arc<dyn IdentityClient> = match advertised.generation {
        ApiGeneration::Legacy => Arc::new(LegacyIdentityClient::new(&advertised.endpoint, config)?),
        ApiGeneration::Current => Arc::new(CurrentIdentityClient::new(&advertised.endpoint, config)?),
    };
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config() -> IdentityClientConfig {
        IdentityClientConfig::new("http://keystone:5000/v2.0", "admin", "secret", "admin")
    }

    fn document(value: serde_json::Value) -> VersionDocument {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_prefers_current_generation() {
        let doc = document(json!({
            "versions": {"values": [
                {"id": "v2.0", "status": "deprecated", "links": [{"rel": "self", "href": "http://keystone:5000/v2.0/"}]},
                {"id": "v3.14", "status": "stable", "links": [{"rel": "self", "href": "http://keystone:5000/v3/"}]}
            ]}
        }));
        let selected = select_version(doc, &config()).unwrap();
        assert_eq!(selected.generation, ApiGeneration::Current);
        assert_eq!(selected.endpoint, "http://keystone:5000/v3");
    }

    #[test]
    fn test_falls_back_to_legacy() {
        let doc = document(json!({
            "versions": {"values": [{"id": "v2.0", "links": []}]}
        }));
        let selected = select_version(doc, &config()).unwrap();
        assert_eq!(selected.generation, ApiGeneration::Legacy);
        assert_eq!(selected.endpoint, "http://keystone:5000/v2.0");
    }

    #[test]
    fn test_single_version_document() {
        let doc = document(json!({
            "version": {"id": "v3.10", "links": [{"rel": "self", "href": "http://id/v3"}]}
        }));
        let selected = select_version(doc, &config()).unwrap();
        assert_eq!(selected.generation, ApiGeneration::Current);
        assert_eq!(selected.endpoint, "http://id/v3");
    }

    #[test]
    fn test_no_supported_version() {
        let doc = document(json!({
            "versions": {"values": [{"id": "v4.0", "links": []}]}
        }));
        assert!(matches!(
            select_version(doc, &config()),
            Err(DomainError::UnsupportedIdentityVersion(_))
        ));
    }

    #[tokio::test]
    async fn test_pinned_generation_skips_discovery() {
        let mut config = config();
        config.generation = Some(ApiGeneration::Legacy);
        let client = negotiate_identity_client(&config).await.unwrap();
        assert_eq!(client.generation(), ApiGeneration::Legacy);
    }
}
