use common::domain::{
    DomainError, IdentityClient, ListProjectsInput, Project, SessionContext, UpdateUserInput,
};
use common::identity::{IdentityClientConfig, LegacyIdentityClient};
use httpmock::prelude::*;
use serde_json::json;

fn project(id: &str) -> Project {
    Project {
        id: id.to_string(),
        name: format!("{id}-name"),
        description: None,
        enabled: true,
        domain_id: None,
        parent_id: None,
    }
}

fn session(page_size: usize) -> SessionContext {
    SessionContext {
        user_id: "u-admin".to_string(),
        user_name: "admin".to_string(),
        token_id: "session-token".to_string(),
        project_id: "p1".to_string(),
        project_name: "p1-name".to_string(),
        user_domain_id: None,
        domain_context: None,
        roles: vec!["admin".to_string()],
        authorized_projects: vec![project("p1"), project("p2")],
        page_size,
    }
}

fn client(server: &MockServer) -> LegacyIdentityClient {
    let endpoint = server.url("/v2.0");
    let config = IdentityClientConfig::new(&endpoint, "admin", "secret", "admin");
    LegacyIdentityClient::new(&endpoint, &config).unwrap()
}

async fn mock_token(server: &MockServer) -> httpmock::Mock<'_> {
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v2.0/tokens").json_body_partial(
                r#"{"auth": {"passwordCredentials": {"username": "admin", "password": "secret"}, "tenantName": "admin"}}"#,
            );
            then.status(200).json_body(json!({
                "access": {"token": {"id": "legacy-token", "expires": "2099-01-01T00:00:00Z"}}
            }));
        })
        .await
}

#[tokio::test]
async fn test_own_project_listing_uses_session_cache() {
    let server = MockServer::start_async().await;
    let token = mock_token(&server).await;
    let tenants = server
        .mock_async(|when, then| {
            when.method(GET).path("/v2.0/tenants");
            then.status(200).json_body(json!({"tenants": []}));
        })
        .await;

    let client = client(&server);
    let session = session(20);
    let page = client
        .project_list(
            &session,
            ListProjectsInput {
                user_id: Some("u-admin".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(page.projects, session.authorized_projects);
    assert!(!page.has_more);
    token.assert_hits_async(0).await;
    tenants.assert_hits_async(0).await;
}

#[tokio::test]
async fn test_paginated_listing_trims_extra_row() {
    let server = MockServer::start_async().await;
    mock_token(&server).await;
    let tenants = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/v2.0/tenants")
                .query_param("limit", "3")
                .query_param("marker", "p0")
                .header("X-Auth-Token", "legacy-token");
            then.status(200).json_body(json!({"tenants": [
                {"id": "p1", "name": "one", "enabled": true},
                {"id": "p2", "name": "two", "enabled": false},
                {"id": "p3", "name": "three"}
            ]}));
        })
        .await;

    let client = client(&server);
    let page = client
        .project_list(
            &session(2),
            ListProjectsInput {
                paginate: true,
                marker: Some("p0".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    tenants.assert_async().await;
    assert!(page.has_more);
    assert_eq!(page.projects.len(), 2);
    assert_eq!(page.projects[1].id, "p2");
    assert!(!page.projects[1].enabled);
}

#[tokio::test]
async fn test_user_update_attempts_both_calls() {
    let server = MockServer::start_async().await;
    mock_token(&server).await;
    let user_doc = server
        .mock_async(|when, then| {
            when.method(PUT).path("/v2.0/users/u1");
            then.status(500).json_body(json!({"error": {"message": "boom", "code": 500}}));
        })
        .await;
    let tenant = server
        .mock_async(|when, then| {
            when.method(PUT)
                .path("/v2.0/users/u1/OS-KSADM/tenant")
                .json_body(json!({"user": {"tenantId": "p2"}}));
            then.status(200).json_body(json!({"user": {"id": "u1", "name": "alice"}}));
        })
        .await;

    let client = client(&server);
    let err = client
        .user_update(UpdateUserInput {
            user_id: "u1".to_string(),
            email: Some("alice@example.com".to_string()),
            project_id: Some("p2".to_string()),
            ..Default::default()
        })
        .await
        .unwrap_err();

    user_doc.assert_async().await;
    tenant.assert_async().await;
    assert!(matches!(err, DomainError::IdentityService { status: 500, .. }));
}

#[tokio::test]
async fn test_user_update_conflict_stops_early() {
    let server = MockServer::start_async().await;
    mock_token(&server).await;
    server
        .mock_async(|when, then| {
            when.method(PUT).path("/v2.0/users/u1");
            then.status(409)
                .json_body(json!({"error": {"message": "Duplicate name, alice.", "code": 409}}));
        })
        .await;
    let tenant = server
        .mock_async(|when, then| {
            when.method(PUT).path("/v2.0/users/u1/OS-KSADM/tenant");
            then.status(200);
        })
        .await;

    let client = client(&server);
    let err = client
        .user_update(UpdateUserInput {
            user_id: "u1".to_string(),
            name: Some("alice".to_string()),
            project_id: Some("p2".to_string()),
            ..Default::default()
        })
        .await
        .unwrap_err();

    assert!(err.is_conflict());
    tenant.assert_hits_async(0).await;
}

#[tokio::test]
async fn test_role_assignments_fail_without_remote_call() {
    let server = MockServer::start_async().await;
    let token = mock_token(&server).await;

    let client = client(&server);
    let err = client
        .role_assignments_list(Default::default())
        .await
        .unwrap_err();

    assert!(err.is_not_available());
    token.assert_hits_async(0).await;
}
