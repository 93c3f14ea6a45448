use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde_json::json;
use tracing::{debug, instrument};

use crate::domain::{
    ApiGeneration, AssignmentActor, AssignmentScope, CreateGroupInput, CreateProjectInput,
    CreateUserInput, Domain, DomainError, DomainResult, Group, IdentityClient, ListGroupsInput,
    ListProjectsInput, ListRoleAssignmentsInput, ListUsersInput, Project, ProjectPage, Role,
    RoleAssignment, RoleGrant, SessionContext, UpdateGroupInput, UpdateProjectInput,
    UpdateUserInput, User,
};
use crate::identity::config::IdentityClientConfig;
use crate::identity::http::{
    IdentityHttp, IssuedToken, ResourceRef, SUBJECT_TOKEN_HEADER, TokenIssuer, status_to_error,
};
use crate::identity::wire::{
    RoleList, V3DomainEnvelope, V3GroupEnvelope, V3GroupFields, V3GroupList, V3ProjectEnvelope,
    V3ProjectFields, V3ProjectList, V3RoleAssignment, V3RoleAssignmentList, V3TokenEnvelope,
    V3UserEnvelope, V3UserFields, V3UserList,
};

/// Password authentication against `POST /auth/tokens`, project scoped
pub struct CurrentTokenIssuer {
    username: String,
    password: String,
    user_domain_id: String,
    project_name: String,
    project_domain_id: String,
}

impl CurrentTokenIssuer {
    pub fn new(config: &IdentityClientConfig) -> Self {
        Self {
            username: config.username.clone(),
            password: config.password.clone(),
            user_domain_id: config.user_domain_id.clone(),
            project_name: config.tenant_name.clone(),
            project_domain_id: config.project_domain_id.clone(),
        }
    }
}

#[async_trait]
impl TokenIssuer for CurrentTokenIssuer {
    #[instrument(skip(self, client), fields(username = %self.username))]
    async fn issue(&self, client: &reqwest::Client, endpoint: &str) -> DomainResult<IssuedToken> {
        let body = json!({
            "auth": {
                "identity": {
                    "methods": ["password"],
                    "password": {
                        "user": {
                            "name": self.username,
                            "password": self.password,
                            "domain": { "id": self.user_domain_id },
                        }
                    }
                },
                "scope": {
                    "project": {
                        "name": self.project_name,
                        "domain": { "id": self.project_domain_id },
                    }
                }
            }
        });

        let response = client
            .post(format!("{endpoint}/auth/tokens"))
            .json(&body)
            .send()
            .await
            .map_err(|e| DomainError::RemoteError(e.into()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(DomainError::AuthenticationFailed(self.username.clone()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_to_error(status, &body, ResourceRef::Path("/auth/tokens")));
        }

        let id = response
            .headers()
            .get(SUBJECT_TOKEN_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| {
                DomainError::AuthenticationFailed(format!(
                    "{} missing {SUBJECT_TOKEN_HEADER} header",
                    self.username
                ))
            })?;

        let envelope: V3TokenEnvelope = response
            .json()
            .await
            .map_err(|e| DomainError::RemoteError(e.into()))?;

        debug!("issued v3 admin token");
        Ok(IssuedToken {
            id,
            expires_at: envelope.token.expires_at,
        })
    }
}

/// Identity client speaking the v3 dialect
pub struct CurrentIdentityClient {
    http: IdentityHttp,
}

fn scope_segment(scope: &AssignmentScope) -> (&'static str, &str) {
    match scope {
        AssignmentScope::Project(id) => ("projects", id),
        AssignmentScope::Domain(id) => ("domains", id),
    }
}

fn actor_segment(actor: &AssignmentActor) -> (&'static str, &str) {
    match actor {
        AssignmentActor::User(id) => ("users", id),
        AssignmentActor::Group(id) => ("groups", id),
    }
}

fn grant_path(grant: &RoleGrant) -> String {
    let (scope_kind, scope_id) = scope_segment(&grant.scope);
    let (actor_kind, actor_id) = actor_segment(&grant.actor);
    format!(
        "{scope_kind}/{scope_id}/{actor_kind}/{actor_id}/roles/{}",
        grant.role_id
    )
}

fn push_opt<'a>(query: &mut Vec<(&'a str, String)>, key: &'a str, value: &Option<String>) {
    if let Some(value) = value {
        query.push((key, value.clone()));
    }
}

impl CurrentIdentityClient {
    pub fn new(endpoint: &str, config: &IdentityClientConfig) -> DomainResult<Self> {
        let issuer = Box::new(CurrentTokenIssuer::new(config));
        Ok(Self {
            http: IdentityHttp::new(endpoint, config.timeout, issuer)?,
        })
    }

    pub fn endpoint(&self) -> &str {
        self.http.endpoint()
    }
}

#[async_trait]
impl IdentityClient for CurrentIdentityClient {
    fn generation(&self) -> ApiGeneration {
        ApiGeneration::Current
    }

    #[instrument(skip(self), fields(domain_id = %domain_id))]
    async fn domain_get(&self, domain_id: &str) -> DomainResult<Domain> {
        let envelope: V3DomainEnvelope = self
            .http
            .get(&format!("domains/{domain_id}"), &[], ResourceRef::Domain(domain_id))
            .await?;
        Ok(envelope.domain.into())
    }

    #[instrument(skip(self), fields(project_id = %project_id))]
    async fn project_get(&self, project_id: &str) -> DomainResult<Project> {
        let envelope: V3ProjectEnvelope = self
            .http
            .get(&format!("projects/{project_id}"), &[], ResourceRef::Project(project_id))
            .await?;
        Ok(envelope.project.into())
    }

    #[instrument(skip(self, input), fields(name = %input.name, parent_id = ?input.parent_id))]
    async fn project_create(&self, input: CreateProjectInput) -> DomainResult<Project> {
        let fields = V3ProjectFields {
            name: Some(input.name),
            description: input.description,
            enabled: Some(input.enabled),
            domain_id: input.domain_id,
            parent_id: input.parent_id,
        };
        let envelope: V3ProjectEnvelope = self
            .http
            .send(
                Method::POST,
                "projects",
                &json!({ "project": fields }),
                ResourceRef::Path("/projects"),
            )
            .await?;
        Ok(envelope.project.into())
    }

    #[instrument(skip(self, input), fields(project_id = %input.project_id))]
    async fn project_update(&self, input: UpdateProjectInput) -> DomainResult<Project> {
        let fields = V3ProjectFields {
            name: input.name,
            description: input.description,
            enabled: input.enabled,
            domain_id: input.domain_id,
            parent_id: None,
        };
        let envelope: V3ProjectEnvelope = self
            .http
            .send(
                Method::PATCH,
                &format!("projects/{}", input.project_id),
                &json!({ "project": fields }),
                ResourceRef::Project(&input.project_id),
            )
            .await?;
        Ok(envelope.project.into())
    }

    #[instrument(skip(self), fields(project_id = %project_id))]
    async fn project_delete(&self, project_id: &str) -> DomainResult<()> {
        self.http
            .send_empty(
                Method::DELETE,
                &format!("projects/{project_id}"),
                None,
                ResourceRef::Project(project_id),
            )
            .await
    }

    #[instrument(skip(self, _session, input), fields(user_id = ?input.user_id, domain_id = ?input.domain_id))]
    async fn project_list(
        &self,
        _session: &SessionContext,
        input: ListProjectsInput,
    ) -> DomainResult<ProjectPage> {
        let mut query: Vec<(&str, String)> = Vec::new();
        push_opt(&mut query, "domain_id", &input.domain_id);
        query.extend(
            input
                .filters
                .iter()
                .map(|(key, value)| (key.as_str(), value.clone())),
        );

        let list: V3ProjectList = match &input.user_id {
            Some(user_id) => {
                self.http
                    .get(
                        &format!("users/{user_id}/projects"),
                        &query,
                        ResourceRef::User(user_id),
                    )
                    .await?
            }
            None => {
                self.http
                    .get("projects", &query, ResourceRef::Path("/projects"))
                    .await?
            }
        };

        Ok(ProjectPage {
            projects: list.projects.into_iter().map(Project::from).collect(),
            has_more: false,
        })
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn user_get(&self, user_id: &str) -> DomainResult<User> {
        let envelope: V3UserEnvelope = self
            .http
            .get(&format!("users/{user_id}"), &[], ResourceRef::User(user_id))
            .await?;
        Ok(envelope.user.into())
    }

    #[instrument(skip(self, input), fields(name = %input.name, domain_id = ?input.domain_id))]
    async fn user_create(&self, input: CreateUserInput) -> DomainResult<User> {
        let fields = V3UserFields {
            name: Some(input.name),
            password: Some(input.password),
            email: input.email,
            enabled: Some(input.enabled),
            default_project_id: input.project_id,
            domain_id: input.domain_id,
        };
        let envelope: V3UserEnvelope = self
            .http
            .send(
                Method::POST,
                "users",
                &json!({ "user": fields }),
                ResourceRef::Path("/users"),
            )
            .await?;
        Ok(envelope.user.into())
    }

    #[instrument(skip(self, input), fields(user_id = %input.user_id))]
    async fn user_update(&self, input: UpdateUserInput) -> DomainResult<User> {
        let fields = V3UserFields {
            name: input.name,
            password: input.password,
            email: input.email,
            enabled: input.enabled,
            default_project_id: input.project_id,
            domain_id: None,
        };
        let envelope: V3UserEnvelope = self
            .http
            .send(
                Method::PATCH,
                &format!("users/{}", input.user_id),
                &json!({ "user": fields }),
                ResourceRef::User(&input.user_id),
            )
            .await?;
        Ok(envelope.user.into())
    }

    #[instrument(skip(self), fields(user_id = %user_id, project_id = %project_id))]
    async fn user_update_project(&self, user_id: &str, project_id: &str) -> DomainResult<()> {
        let _: V3UserEnvelope = self
            .http
            .send(
                Method::PATCH,
                &format!("users/{user_id}"),
                &json!({ "user": { "default_project_id": project_id } }),
                ResourceRef::User(user_id),
            )
            .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn user_delete(&self, user_id: &str) -> DomainResult<()> {
        self.http
            .send_empty(
                Method::DELETE,
                &format!("users/{user_id}"),
                None,
                ResourceRef::User(user_id),
            )
            .await
    }

    #[instrument(skip(self, input), fields(project_id = ?input.project_id, group_id = ?input.group_id))]
    async fn user_list(&self, input: ListUsersInput) -> DomainResult<Vec<User>> {
        let mut query: Vec<(&str, String)> = Vec::new();
        query.extend(
            input
                .filters
                .iter()
                .map(|(key, value)| (key.as_str(), value.clone())),
        );

        let list: V3UserList = match &input.group_id {
            Some(group_id) => {
                self.http
                    .get(
                        &format!("groups/{group_id}/users"),
                        &query,
                        ResourceRef::Group(group_id),
                    )
                    .await?
            }
            None => {
                push_opt(&mut query, "domain_id", &input.domain_id);
                push_opt(&mut query, "default_project_id", &input.project_id);
                self.http
                    .get("users", &query, ResourceRef::Path("/users"))
                    .await?
            }
        };

        Ok(list.users.into_iter().map(User::from).collect())
    }

    #[instrument(skip(self))]
    async fn role_list(&self) -> DomainResult<Vec<Role>> {
        let list: RoleList = self
            .http
            .get("roles", &[], ResourceRef::Path("/roles"))
            .await?;
        Ok(list.into_roles())
    }

    #[instrument(skip(self), fields(user_id = %user_id, scope = ?scope))]
    async fn roles_for_user(
        &self,
        user_id: &str,
        scope: AssignmentScope,
    ) -> DomainResult<Vec<Role>> {
        let (scope_kind, scope_id) = scope_segment(&scope);
        let list: RoleList = self
            .http
            .get(
                &format!("{scope_kind}/{scope_id}/users/{user_id}/roles"),
                &[],
                ResourceRef::User(user_id),
            )
            .await?;
        Ok(list.into_roles())
    }

    #[instrument(skip(self), fields(group_id = %group_id, project_id = %project_id))]
    async fn roles_for_group(&self, group_id: &str, project_id: &str) -> DomainResult<Vec<Role>> {
        let list: RoleList = self
            .http
            .get(
                &format!("projects/{project_id}/groups/{group_id}/roles"),
                &[],
                ResourceRef::Group(group_id),
            )
            .await?;
        Ok(list.into_roles())
    }

    #[instrument(skip(self, grant), fields(role_id = %grant.role_id, actor = %grant.actor.id()))]
    async fn grant_role(&self, grant: RoleGrant) -> DomainResult<()> {
        let path = grant_path(&grant);
        self.http
            .send_empty(Method::PUT, &path, None, ResourceRef::Path(&path))
            .await
    }

    #[instrument(skip(self, grant), fields(role_id = %grant.role_id, actor = %grant.actor.id()))]
    async fn revoke_role(&self, grant: RoleGrant) -> DomainResult<()> {
        let path = grant_path(&grant);
        self.http
            .send_empty(Method::DELETE, &path, None, ResourceRef::Path(&path))
            .await
    }

    #[instrument(skip(self, input), fields(project_id = ?input.project_id, user_id = ?input.user_id))]
    async fn role_assignments_list(
        &self,
        input: ListRoleAssignmentsInput,
    ) -> DomainResult<Vec<RoleAssignment>> {
        let mut query: Vec<(&str, String)> = Vec::new();
        push_opt(&mut query, "scope.project.id", &input.project_id);
        push_opt(&mut query, "user.id", &input.user_id);
        push_opt(&mut query, "group.id", &input.group_id);
        push_opt(&mut query, "role.id", &input.role_id);
        push_opt(&mut query, "scope.domain.id", &input.domain_id);
        if input.effective {
            query.push(("effective", "true".to_string()));
        }

        let list: V3RoleAssignmentList = self
            .http
            .get("role_assignments", &query, ResourceRef::Path("/role_assignments"))
            .await?;

        Ok(list
            .role_assignments
            .into_iter()
            .filter_map(V3RoleAssignment::into_assignment)
            .collect())
    }

    #[instrument(skip(self), fields(group_id = %group_id))]
    async fn group_get(&self, group_id: &str) -> DomainResult<Group> {
        let envelope: V3GroupEnvelope = self
            .http
            .get(&format!("groups/{group_id}"), &[], ResourceRef::Group(group_id))
            .await?;
        Ok(envelope.group.into())
    }

    #[instrument(skip(self, input), fields(name = %input.name, domain_id = ?input.domain_id))]
    async fn group_create(&self, input: CreateGroupInput) -> DomainResult<Group> {
        let fields = V3GroupFields {
            name: Some(input.name),
            description: input.description,
            domain_id: input.domain_id,
        };
        let envelope: V3GroupEnvelope = self
            .http
            .send(
                Method::POST,
                "groups",
                &json!({ "group": fields }),
                ResourceRef::Path("/groups"),
            )
            .await?;
        Ok(envelope.group.into())
    }

    #[instrument(skip(self, input), fields(group_id = %input.group_id))]
    async fn group_update(&self, input: UpdateGroupInput) -> DomainResult<Group> {
        let fields = V3GroupFields {
            name: input.name,
            description: input.description,
            domain_id: None,
        };
        let envelope: V3GroupEnvelope = self
            .http
            .send(
                Method::PATCH,
                &format!("groups/{}", input.group_id),
                &json!({ "group": fields }),
                ResourceRef::Group(&input.group_id),
            )
            .await?;
        Ok(envelope.group.into())
    }

    #[instrument(skip(self), fields(group_id = %group_id))]
    async fn group_delete(&self, group_id: &str) -> DomainResult<()> {
        self.http
            .send_empty(
                Method::DELETE,
                &format!("groups/{group_id}"),
                None,
                ResourceRef::Group(group_id),
            )
            .await
    }

    #[instrument(skip(self, input), fields(domain_id = ?input.domain_id, user_id = ?input.user_id))]
    async fn group_list(&self, input: ListGroupsInput) -> DomainResult<Vec<Group>> {
        let list: V3GroupList = match &input.user_id {
            Some(user_id) => {
                self.http
                    .get(
                        &format!("users/{user_id}/groups"),
                        &[],
                        ResourceRef::User(user_id),
                    )
                    .await?
            }
            None => {
                let mut query: Vec<(&str, String)> = Vec::new();
                push_opt(&mut query, "domain_id", &input.domain_id);
                self.http
                    .get("groups", &query, ResourceRef::Path("/groups"))
                    .await?
            }
        };

        let groups = list.groups.into_iter().map(Group::from);
        // the per-user listing has no domain filter of its own
        Ok(match (&input.user_id, &input.domain_id) {
            (Some(_), Some(domain_id)) => groups
                .filter(|group| group.domain_id.as_deref() == Some(domain_id.as_str()))
                .collect(),
            _ => groups.collect(),
        })
    }

    #[instrument(skip(self), fields(group_id = %group_id, user_id = %user_id))]
    async fn group_add_user(&self, group_id: &str, user_id: &str) -> DomainResult<()> {
        self.http
            .send_empty(
                Method::PUT,
                &format!("groups/{group_id}/users/{user_id}"),
                None,
                ResourceRef::Group(group_id),
            )
            .await
    }

    #[instrument(skip(self), fields(group_id = %group_id, user_id = %user_id))]
    async fn group_remove_user(&self, group_id: &str, user_id: &str) -> DomainResult<()> {
        self.http
            .send_empty(
                Method::DELETE,
                &format!("groups/{group_id}/users/{user_id}"),
                None,
                ResourceRef::Group(group_id),
            )
            .await
    }
}
