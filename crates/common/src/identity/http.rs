use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::domain::{DomainError, DomainResult};

/// Header carrying the admin token on every request
pub const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

/// Header the current generation returns the issued token in
pub const SUBJECT_TOKEN_HEADER: &str = "X-Subject-Token";

/// Tokens this close to expiry are re-issued before use
const TOKEN_EXPIRY_MARGIN_SECS: i64 = 60;

/// Token issued to the admin account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedToken {
    pub id: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl IssuedToken {
    pub fn is_usable_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at - ChronoDuration::seconds(TOKEN_EXPIRY_MARGIN_SECS) > now,
            None => true,
        }
    }
}

/// Authenticates the admin account in one generation's dialect
#[async_trait]
pub trait TokenIssuer: Send + Sync {
    async fn issue(&self, client: &reqwest::Client, endpoint: &str) -> DomainResult<IssuedToken>;
}

/// Resource a request addresses; decides which error a 404 becomes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceRef<'a> {
    Project(&'a str),
    User(&'a str),
    Group(&'a str),
    Role(&'a str),
    Domain(&'a str),
    Path(&'a str),
}

impl ResourceRef<'_> {
    pub fn not_found(&self) -> DomainError {
        match *self {
            ResourceRef::Project(id) => DomainError::ProjectNotFound(id.to_string()),
            ResourceRef::User(id) => DomainError::UserNotFound(id.to_string()),
            ResourceRef::Group(id) => DomainError::GroupNotFound(id.to_string()),
            ResourceRef::Role(id) => DomainError::RoleNotFound(id.to_string()),
            ResourceRef::Domain(id) => DomainError::DomainNotFound(id.to_string()),
            ResourceRef::Path(path) => DomainError::ResourceNotFound(path.to_string()),
        }
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Authenticated JSON transport to one identity endpoint.
///
/// The admin token is issued on first use and cached until it nears expiry.
/// A 401 response drops the cached token so the next call authenticates
/// again; the failed call itself is not retried.
pub struct IdentityHttp {
    client: reqwest::Client,
    endpoint: String,
    issuer: Box<dyn TokenIssuer>,
    token: Mutex<Option<IssuedToken>>,
}

impl IdentityHttp {
    pub fn new(
        endpoint: &str,
        timeout: Duration,
        issuer: Box<dyn TokenIssuer>,
    ) -> DomainResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DomainError::RemoteError(e.into()))?;

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            issuer,
            token: Mutex::new(None),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint, path.trim_start_matches('/'))
    }

    async fn token(&self) -> DomainResult<String> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.is_usable_at(Utc::now()) {
                return Ok(token.id.clone());
            }
            debug!("identity token near expiry, re-authenticating");
        }

        let token = self.issuer.issue(&self.client, &self.endpoint).await?;
        let id = token.id.clone();
        *cached = Some(token);
        Ok(id)
    }

    async fn forget_token(&self) {
        *self.token.lock().await = None;
    }

    async fn execute(&self, builder: RequestBuilder, resource: ResourceRef<'_>) -> DomainResult<Response> {
        let token = self.token().await?;
        let response = builder
            .header(AUTH_TOKEN_HEADER, token)
            .send()
            .await
            .map_err(|e| DomainError::RemoteError(e.into()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::UNAUTHORIZED {
            warn!("identity service rejected the admin token");
            self.forget_token().await;
        }

        let body = response.text().await.unwrap_or_default();
        Err(status_to_error(status, &body, resource))
    }

    /// GET a JSON document
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
        resource: ResourceRef<'_>,
    ) -> DomainResult<T> {
        let builder = self.client.get(self.url(path)).query(query);
        let response = self.execute(builder, resource).await?;
        decode(response).await
    }

    /// Send a JSON body and decode the JSON reply
    pub async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &serde_json::Value,
        resource: ResourceRef<'_>,
    ) -> DomainResult<T> {
        let builder = self.client.request(method, self.url(path)).json(body);
        let response = self.execute(builder, resource).await?;
        decode(response).await
    }

    /// Send a request whose reply carries no document (grants, deletes, ...)
    pub async fn send_empty(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
        resource: ResourceRef<'_>,
    ) -> DomainResult<()> {
        let mut builder = self.client.request(method, self.url(path));
        if let Some(body) = body {
            builder = builder.json(body);
        }
        self.execute(builder, resource).await?;
        Ok(())
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> DomainResult<T> {
    response
        .json::<T>()
        .await
        .map_err(|e| DomainError::RemoteError(e.into()))
}

/// Map a non-success identity response to a domain error
pub fn status_to_error(status: StatusCode, body: &str, resource: ResourceRef<'_>) -> DomainError {
    let message = error_message(status, body);
    match status {
        StatusCode::CONFLICT => DomainError::Conflict(message),
        StatusCode::NOT_FOUND => resource.not_found(),
        StatusCode::FORBIDDEN => DomainError::PermissionDenied(message),
        _ => DomainError::IdentityService {
            status: status.as_u16(),
            message,
        },
    }
}

fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        return parsed.error.message;
    }
    if body.trim().is_empty() {
        status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string()
    } else {
        body.trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_maps_to_conflict() {
        let body = r#"{"error": {"message": "Duplicate entry", "code": 409, "title": "Conflict"}}"#;
        let err = status_to_error(StatusCode::CONFLICT, body, ResourceRef::User("u1"));
        assert!(matches!(err, DomainError::Conflict(msg) if msg == "Duplicate entry"));
    }

    #[test]
    fn test_not_found_maps_to_resource() {
        let err = status_to_error(StatusCode::NOT_FOUND, "", ResourceRef::Project("p1"));
        assert!(matches!(err, DomainError::ProjectNotFound(id) if id == "p1"));

        let err = status_to_error(StatusCode::NOT_FOUND, "", ResourceRef::Group("g1"));
        assert!(matches!(err, DomainError::GroupNotFound(id) if id == "g1"));
    }

    #[test]
    fn test_other_status_passes_through() {
        let err = status_to_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "boom",
            ResourceRef::Path("/roles"),
        );
        match err {
            DomainError::IdentityService { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_empty_body_uses_reason_phrase() {
        let err = status_to_error(StatusCode::SERVICE_UNAVAILABLE, " ", ResourceRef::Path("/"));
        assert!(matches!(
            err,
            DomainError::IdentityService { status: 503, message } if message == "Service Unavailable"
        ));
    }

    #[test]
    fn test_token_usability() {
        let now = Utc::now();
        let fresh = IssuedToken {
            id: "t".to_string(),
            expires_at: Some(now + ChronoDuration::hours(1)),
        };
        let stale = IssuedToken {
            id: "t".to_string(),
            expires_at: Some(now + ChronoDuration::seconds(30)),
        };
        let unbounded = IssuedToken {
            id: "t".to_string(),
            expires_at: None,
        };
        assert!(fresh.is_usable_at(now));
        assert!(!stale.is_usable_at(now));
        assert!(unbounded.is_usable_at(now));
    }
}
