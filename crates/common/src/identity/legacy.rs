use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde_json::json;
use tracing::{debug, instrument, warn};

use crate::domain::{
    ApiGeneration, AssignmentActor, AssignmentScope, CreateGroupInput, CreateProjectInput,
    CreateUserInput, Domain, DomainError, DomainResult, Group, IdentityClient, ListGroupsInput,
    ListProjectsInput, ListRoleAssignmentsInput, ListUsersInput, Project, ProjectPage, Role,
    RoleAssignment, RoleGrant, SessionContext, UpdateGroupInput, UpdateProjectInput,
    UpdateUserInput, User,
};
use crate::identity::config::IdentityClientConfig;
use crate::identity::http::{IdentityHttp, IssuedToken, ResourceRef, TokenIssuer, status_to_error};
use crate::identity::wire::{
    RoleList, V2Access, V2TenantEnvelope, V2TenantFields, V2TenantList, V2UserEnvelope,
    V2UserFields, V2UserList,
};

const GENERATION: ApiGeneration = ApiGeneration::Legacy;

/// Password authentication against `POST /tokens`
pub struct LegacyTokenIssuer {
    username: String,
    password: String,
    tenant_name: String,
}

impl LegacyTokenIssuer {
    pub fn new(config: &IdentityClientConfig) -> Self {
        Self {
            username: config.username.clone(),
            password: config.password.clone(),
            tenant_name: config.tenant_name.clone(),
        }
    }
}

#[async_trait]
impl TokenIssuer for LegacyTokenIssuer {
    #[instrument(skip(self, client), fields(username = %self.username))]
    async fn issue(&self, client: &reqwest::Client, endpoint: &str) -> DomainResult<IssuedToken> {
        let body = json!({
            "auth": {
                "passwordCredentials": {
                    "username": self.username,
                    "password": self.password,
                },
                "tenantName": self.tenant_name,
            }
        });

        let response = client
            .post(format!("{endpoint}/tokens"))
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
            return Err(status_to_error(status, &body, ResourceRef::Path("/tokens")));
        }

        let access: V2Access = response
            .json()
            .await
            .map_err(|e| DomainError::RemoteError(e.into()))?;

        debug!("issued v2.0 admin token");
        Ok(IssuedToken {
            id: access.access.token.id,
            expires_at: access.access.token.expires,
        })
    }
}

/// Identity client speaking the v2.0 admin dialect.
///
/// Tenants stand in for projects. Groups, domains and role assignment
/// listings do not exist here and fail before any request is made.
pub struct LegacyIdentityClient {
    http: IdentityHttp,
}

impl LegacyIdentityClient {
    pub fn new(endpoint: &str, config: &IdentityClientConfig) -> DomainResult<Self> {
        let issuer = Box::new(LegacyTokenIssuer::new(config));
        Ok(Self {
            http: IdentityHttp::new(endpoint, config.timeout, issuer)?,
        })
    }

    pub fn endpoint(&self) -> &str {
        self.http.endpoint()
    }

    fn project_user_role_path(grant: &RoleGrant, operation: &str) -> DomainResult<String> {
        match (&grant.actor, &grant.scope) {
            (AssignmentActor::User(user_id), AssignmentScope::Project(project_id)) => Ok(format!(
                "tenants/{project_id}/users/{user_id}/roles/OS-KSADM/{}",
                grant.role_id
            )),
            _ => Err(GENERATION.not_available(operation)),
        }
    }
}

#[async_trait]
impl IdentityClient for LegacyIdentityClient {
    fn generation(&self) -> ApiGeneration {
        GENERATION
    }

    async fn domain_get(&self, _domain_id: &str) -> DomainResult<Domain> {
        Err(GENERATION.not_available("domain_get"))
    }

    #[instrument(skip(self), fields(project_id = %project_id))]
    async fn project_get(&self, project_id: &str) -> DomainResult<Project> {
        let envelope: V2TenantEnvelope = self
            .http
            .get(&format!("tenants/{project_id}"), &[], ResourceRef::Project(project_id))
            .await?;
        Ok(envelope.tenant.into())
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    async fn project_create(&self, input: CreateProjectInput) -> DomainResult<Project> {
        if input.parent_id.is_some() {
            debug!("tenants have no hierarchy, ignoring parent project");
        }

        let fields = V2TenantFields {
            name: Some(input.name),
            description: input.description,
            enabled: Some(input.enabled),
            ..Default::default()
        };
        let envelope: V2TenantEnvelope = self
            .http
            .send(
                Method::POST,
                "tenants",
                &json!({ "tenant": fields }),
                ResourceRef::Path("/tenants"),
            )
            .await?;
        Ok(envelope.tenant.into())
    }

    #[instrument(skip(self, input), fields(project_id = %input.project_id))]
    async fn project_update(&self, input: UpdateProjectInput) -> DomainResult<Project> {
        let fields = V2TenantFields {
            id: Some(input.project_id.clone()),
            name: input.name,
            description: input.description,
            enabled: input.enabled,
        };
        let envelope: V2TenantEnvelope = self
            .http
            .send(
                Method::POST,
                &format!("tenants/{}", input.project_id),
                &json!({ "tenant": fields }),
                ResourceRef::Project(&input.project_id),
            )
            .await?;
        Ok(envelope.tenant.into())
    }

    #[instrument(skip(self), fields(project_id = %project_id))]
    async fn project_delete(&self, project_id: &str) -> DomainResult<()> {
        self.http
            .send_empty(
                Method::DELETE,
                &format!("tenants/{project_id}"),
                None,
                ResourceRef::Project(project_id),
            )
            .await
    }

    #[instrument(skip(self, session, input), fields(user_id = ?input.user_id, marker = ?input.marker))]
    async fn project_list(
        &self,
        session: &SessionContext,
        input: ListProjectsInput,
    ) -> DomainResult<ProjectPage> {
        if input.user_id.as_deref() == Some(session.user_id.as_str()) {
            debug!(
                count = session.authorized_projects.len(),
                "answering own project listing from the session"
            );
            return Ok(ProjectPage {
                projects: session.authorized_projects.clone(),
                has_more: false,
            });
        }
        if input.user_id.is_some() {
            debug!("tenant listing cannot filter by user, listing all tenants");
        }

        let page_size = session.page_size();
        let mut query: Vec<(&str, String)> = Vec::new();
        if input.paginate {
            query.push(("limit", (page_size + 1).to_string()));
            if let Some(marker) = &input.marker {
                query.push(("marker", marker.clone()));
            }
        }

        let list: V2TenantList = self
            .http
            .get("tenants", &query, ResourceRef::Path("/tenants"))
            .await?;
        let mut projects: Vec<Project> = list.tenants.into_iter().map(Project::from).collect();

        let mut has_more = false;
        if input.paginate && projects.len() > page_size {
            projects.truncate(page_size);
            has_more = true;
        }

        Ok(ProjectPage { projects, has_more })
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn user_get(&self, user_id: &str) -> DomainResult<User> {
        let envelope: V2UserEnvelope = self
            .http
            .get(&format!("users/{user_id}"), &[], ResourceRef::User(user_id))
            .await?;
        Ok(envelope.user.into())
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    async fn user_create(&self, input: CreateUserInput) -> DomainResult<User> {
        let fields = V2UserFields {
            name: Some(input.name),
            password: Some(input.password),
            email: input.email,
            tenant_id: input.project_id,
            enabled: Some(input.enabled),
        };
        let envelope: V2UserEnvelope = self
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

    /// Updates the user document, then the default tenant. Both calls are
    /// attempted unless the first one conflicts; the first failure wins.
    #[instrument(skip(self, input), fields(user_id = %input.user_id))]
    async fn user_update(&self, input: UpdateUserInput) -> DomainResult<User> {
        let user_id = input.user_id.clone();
        let fields = V2UserFields {
            name: input.name,
            password: input.password,
            email: input.email,
            tenant_id: None,
            enabled: input.enabled,
        };

        let updated: DomainResult<V2UserEnvelope> = match self
            .http
            .send(
                Method::PUT,
                &format!("users/{user_id}"),
                &json!({ "user": fields }),
                ResourceRef::User(&user_id),
            )
            .await
        {
            Err(err) if err.is_conflict() => return Err(err),
            other => other,
        };

        if let Err(err) = &updated {
            warn!(error = %err, "user document update failed");
        }

        let tenant_result = match &input.project_id {
            Some(project_id) => self.user_update_project(&user_id, project_id).await,
            None => Ok(()),
        };

        let mut user: User = updated?.user.into();
        tenant_result?;
        if let Some(project_id) = input.project_id {
            user.default_project_id = Some(project_id);
        }
        Ok(user)
    }

    #[instrument(skip(self), fields(user_id = %user_id, project_id = %project_id))]
    async fn user_update_project(&self, user_id: &str, project_id: &str) -> DomainResult<()> {
        self.http
            .send_empty(
                Method::PUT,
                &format!("users/{user_id}/OS-KSADM/tenant"),
                Some(&json!({ "user": { "tenantId": project_id } })),
                ResourceRef::User(user_id),
            )
            .await
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

    #[instrument(skip(self, input), fields(project_id = ?input.project_id))]
    async fn user_list(&self, input: ListUsersInput) -> DomainResult<Vec<User>> {
        if input.group_id.is_some() {
            return Err(GENERATION.not_available("user_list by group"));
        }

        let query: Vec<(&str, String)> = input
            .filters
            .iter()
            .map(|(key, value)| (key.as_str(), value.clone()))
            .collect();

        let list: V2UserList = match &input.project_id {
            Some(project_id) => {
                self.http
                    .get(
                        &format!("tenants/{project_id}/users"),
                        &query,
                        ResourceRef::Project(project_id),
                    )
                    .await?
            }
            None => {
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
            .get("OS-KSADM/roles", &[], ResourceRef::Path("/OS-KSADM/roles"))
            .await?;
        Ok(list.into_roles())
    }

    #[instrument(skip(self), fields(user_id = %user_id, scope = ?scope))]
    async fn roles_for_user(
        &self,
        user_id: &str,
        scope: AssignmentScope,
    ) -> DomainResult<Vec<Role>> {
        let AssignmentScope::Project(project_id) = scope else {
            return Err(GENERATION.not_available("roles_for_user on a domain"));
        };
        let list: RoleList = self
            .http
            .get(
                &format!("tenants/{project_id}/users/{user_id}/roles"),
                &[],
                ResourceRef::User(user_id),
            )
            .await?;
        Ok(list.into_roles())
    }

    async fn roles_for_group(&self, _group_id: &str, _project_id: &str) -> DomainResult<Vec<Role>> {
        Err(GENERATION.not_available("roles_for_group"))
    }

    #[instrument(skip(self, grant), fields(role_id = %grant.role_id, actor = %grant.actor.id()))]
    async fn grant_role(&self, grant: RoleGrant) -> DomainResult<()> {
        let path = Self::project_user_role_path(&grant, "grant_role")?;
        self.http
            .send_empty(Method::PUT, &path, None, ResourceRef::Path(&path))
            .await
    }

    #[instrument(skip(self, grant), fields(role_id = %grant.role_id, actor = %grant.actor.id()))]
    async fn revoke_role(&self, grant: RoleGrant) -> DomainResult<()> {
        let path = Self::project_user_role_path(&grant, "revoke_role")?;
        self.http
            .send_empty(Method::DELETE, &path, None, ResourceRef::Path(&path))
            .await
    }

    async fn role_assignments_list(
        &self,
        _input: ListRoleAssignmentsInput,
    ) -> DomainResult<Vec<RoleAssignment>> {
        Err(GENERATION.not_available("role_assignments_list"))
    }

    async fn group_get(&self, _group_id: &str) -> DomainResult<Group> {
        Err(GENERATION.not_available("group_get"))
    }

    async fn group_create(&self, _input: CreateGroupInput) -> DomainResult<Group> {
        Err(GENERATION.not_available("group_create"))
    }

    async fn group_update(&self, _input: UpdateGroupInput) -> DomainResult<Group> {
        Err(GENERATION.not_available("group_update"))
    }

    async fn group_delete(&self, _group_id: &str) -> DomainResult<()> {
        Err(GENERATION.not_available("group_delete"))
    }

    async fn group_list(&self, _input: ListGroupsInput) -> DomainResult<Vec<Group>> {
        Err(GENERATION.not_available("group_list"))
    }

    async fn group_add_user(&self, _group_id: &str, _user_id: &str) -> DomainResult<()> {
        Err(GENERATION.not_available("group_add_user"))
    }

    async fn group_remove_user(&self, _group_id: &str, _user_id: &str) -> DomainResult<()> {
        Err(GENERATION.not_available("group_remove_user"))
    }
}
