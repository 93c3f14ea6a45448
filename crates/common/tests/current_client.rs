use common::domain::{
    CreateUserInput, DomainError, IdentityClient, ListProjectsInput, ListRoleAssignmentsInput,
    RoleGrant, SessionContext,
};
use common::identity::{CurrentIdentityClient, IdentityClientConfig};
use httpmock::prelude::*;
use serde_json::json;

fn session() -> SessionContext {
    SessionContext {
        user_id: "u-admin".to_string(),
        user_name: "admin".to_string(),
        token_id: "session-token".to_string(),
        project_id: "p1".to_string(),
        project_name: "tenant-a".to_string(),
        user_domain_id: Some("default".to_string()),
        domain_context: None,
        roles: vec!["admin".to_string()],
        authorized_projects: vec![],
        page_size: 20,
    }
}

fn client(server: &MockServer) -> CurrentIdentityClient {
    let endpoint = server.url("/v3");
    let config = IdentityClientConfig::new(&endpoint, "admin", "secret", "admin");
    CurrentIdentityClient::new(&endpoint, &config).unwrap()
}

async fn mock_token(server: &MockServer) -> httpmock::Mock<'_> {
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v3/auth/tokens").json_body_partial(
                r#"{"auth": {"identity": {"methods": ["password"]}, "scope": {"project": {"name": "admin", "domain": {"id": "default"}}}}}"#,
            );
            then.status(201)
                .header("X-Subject-Token", "current-token")
                .json_body(json!({"token": {"expires_at": "2099-01-01T00:00:00.000000Z"}}));
        })
        .await
}

#[tokio::test]
async fn test_domain_filtered_project_listing() {
    let server = MockServer::start_async().await;
    let token = mock_token(&server).await;
    let projects = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/v3/projects")
                .query_param("domain_id", "d1")
                .header("X-Auth-Token", "current-token");
            then.status(200).json_body(json!({"projects": [
                {"id": "p1", "name": "tenant-a", "domain_id": "d1", "enabled": true, "parent_id": "d1"},
                {"id": "p2", "name": "tenant-b", "domain_id": "d1", "enabled": true, "parent_id": "p1"}
            ]}));
        })
        .await;

    let client = client(&server);
    let page = client
        .project_list(
            &session(),
            ListProjectsInput {
                domain_id: Some("d1".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    token.assert_async().await;
    projects.assert_async().await;
    assert_eq!(page.projects.len(), 2);
    assert_eq!(page.projects[1].parent_id.as_deref(), Some("p1"));
    assert!(!page.has_more);
}

#[tokio::test]
async fn test_own_project_listing_goes_remote() {
    let server = MockServer::start_async().await;
    mock_token(&server).await;
    let projects = server
        .mock_async(|when, then| {
            when.method(GET).path("/v3/users/u-admin/projects");
            then.status(200).json_body(json!({"projects": []}));
        })
        .await;

    let client = client(&server);
    client
        .project_list(
            &session(),
            ListProjectsInput {
                user_id: Some("u-admin".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    projects.assert_async().await;
}

#[tokio::test]
async fn test_token_is_cached_across_calls() {
    let server = MockServer::start_async().await;
    let token = mock_token(&server).await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v3/roles");
            then.status(200).json_body(json!({"roles": [
                {"id": "r1", "name": "C__DC1__Viewer"},
                {"id": "r2", "name": "admin"}
            ]}));
        })
        .await;

    let client = client(&server);
    let first = client.role_list().await.unwrap();
    let second = client.role_list().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first[0].name, "C__DC1__Viewer");
    token.assert_hits_async(1).await;
}

#[tokio::test]
async fn test_unauthorized_clears_cached_token() {
    let server = MockServer::start_async().await;
    let token = mock_token(&server).await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v3/roles");
            then.status(401).json_body(json!({"error": {"message": "The request you have made requires authentication.", "code": 401}}));
        })
        .await;

    let client = client(&server);
    let err = client.role_list().await.unwrap_err();
    assert!(err.is_unauthorized());
    let err = client.role_list().await.unwrap_err();
    assert!(err.is_unauthorized());

    token.assert_hits_async(2).await;
}

#[tokio::test]
async fn test_conflict_on_user_create() {
    let server = MockServer::start_async().await;
    mock_token(&server).await;
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v3/users")
                .json_body_partial(r#"{"user": {"name": "alice", "default_project_id": "p1", "domain_id": "default"}}"#);
            then.status(409).json_body(json!({"error": {"message": "Conflict occurred attempting to store user", "code": 409}}));
        })
        .await;

    let client = client(&server);
    let err = client
        .user_create(CreateUserInput {
            name: "alice".to_string(),
            email: None,
            password: "pw".to_string(),
            project_id: Some("p1".to_string()),
            enabled: true,
            domain_id: Some("default".to_string()),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, DomainError::Conflict(_)));
}

#[tokio::test]
async fn test_missing_project_maps_to_not_found() {
    let server = MockServer::start_async().await;
    mock_token(&server).await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/v3/projects/nope");
            then.status(404).json_body(json!({"error": {"message": "Could not find project: nope.", "code": 404}}));
        })
        .await;

    let client = client(&server);
    let err = client.project_get("nope").await.unwrap_err();
    assert!(matches!(err, DomainError::ProjectNotFound(id) if id == "nope"));
}

#[tokio::test]
async fn test_group_grant_and_assignment_listing() {
    let server = MockServer::start_async().await;
    mock_token(&server).await;
    let grant = server
        .mock_async(|when, then| {
            when.method(PUT).path("/v3/projects/p1/groups/g1/roles/r1");
            then.status(204);
        })
        .await;
    let assignments = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/v3/role_assignments")
                .query_param("scope.project.id", "p1")
                .query_param("effective", "true");
            then.status(200).json_body(json!({"role_assignments": [
                {"role": {"id": "r1"}, "group": {"id": "g1"}, "scope": {"project": {"id": "p1"}}},
                {"role": {"id": "r2"}, "user": {"id": "u1"}, "scope": {"project": {"id": "p1"}}}
            ]}));
        })
        .await;

    let client = client(&server);
    client
        .grant_role(RoleGrant::group_on_project("r1", "g1", "p1"))
        .await
        .unwrap();
    let listed = client
        .role_assignments_list(ListRoleAssignmentsInput {
            project_id: Some("p1".to_string()),
            effective: true,
            ..Default::default()
        })
        .await
        .unwrap();

    grant.assert_async().await;
    assignments.assert_async().await;
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].group_id(), Some("g1"));
    assert_eq!(listed[1].user_id(), Some("u1"));
}
