use common::domain::{
    ApiGeneration, AssignmentScope, CreateProjectInput, DomainError, DomainResult,
    IdentityClient, ListProjectsInput, ListUsersInput, Project, ProjectPage, RoleGrant,
    SessionContext, UpdateProjectInput, User,
};
use common::identity::IdentityQueries;
use garde::Validate;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::domain::{
    BatchOutcome, ConsolePolicy, MemberRelease, ProjectCache, ProjectTreeRow, build_project_tree,
    release_member,
};

// ============================================================================
// Service Request Types
// ============================================================================

/// Which projects the operator asked to see
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectListScope {
    /// Every project of the domain context, paginated
    All,
    /// Projects the operator holds a role on
    Own,
    /// The operator may not list projects
    Denied,
}

#[derive(Debug, Clone, Validate)]
pub struct ListProjectsRequest {
    #[garde(inner(length(min = 1)))]
    pub marker: Option<String>,
    #[garde(skip)]
    pub scope: ProjectListScope,
}

/// Request to create a project under the session's project
#[derive(Debug, Clone, Validate)]
pub struct CreateProjectRequest {
    #[garde(length(min = 1, max = 64))]
    pub name: String,
    #[garde(inner(length(max = 255)))]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Validate)]
pub struct UpdateProjectRequest {
    #[garde(length(min = 1))]
    pub project_id: String,
    #[garde(length(min = 1, max = 64))]
    pub name: String,
    #[garde(inner(length(max = 255)))]
    pub description: Option<String>,
    #[garde(skip)]
    pub enabled: bool,
}

#[derive(Debug, Clone, Validate)]
pub struct ProjectMembersRequest {
    #[garde(length(min = 1))]
    pub project_id: String,
    #[garde(length(min = 1), inner(length(min = 1)))]
    pub user_ids: Vec<String>,
}

/// A project with the context shown on its detail page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectDetail {
    pub project: Project,
    pub parent: Option<Project>,
    pub domain_name: Option<String>,
}

/// Domain service for project administration and project membership
pub struct ProjectService {
    client: Arc<dyn IdentityClient>,
    queries: Arc<IdentityQueries>,
    cache: Arc<dyn ProjectCache>,
    policy: Arc<ConsolePolicy>,
}

impl ProjectService {
    pub fn new(
        client: Arc<dyn IdentityClient>,
        queries: Arc<IdentityQueries>,
        cache: Arc<dyn ProjectCache>,
        policy: Arc<ConsolePolicy>,
    ) -> Self {
        Self {
            client,
            queries,
            cache,
            policy,
        }
    }

    #[instrument(skip(self, session, request), fields(user_id = %session.user_id, scope = ?request.scope))]
    pub async fn list_projects(
        &self,
        session: &SessionContext,
        request: ListProjectsRequest,
    ) -> DomainResult<ProjectPage> {
        common::garde::validate_struct(&request)?;

        match request.scope {
            ProjectListScope::Denied => {
                Err(DomainError::PermissionDenied("project listing".to_string()))
            }
            ProjectListScope::Own => {
                let projects = self.own_projects(session).await?;
                Ok(ProjectPage {
                    projects,
                    has_more: false,
                })
            }
            ProjectListScope::All => {
                self.client
                    .project_list(
                        session,
                        ListProjectsInput {
                            paginate: true,
                            marker: request.marker,
                            domain_id: session.domain_context_id(),
                            ..Default::default()
                        },
                    )
                    .await
            }
        }
    }

    async fn own_projects(&self, session: &SessionContext) -> DomainResult<Vec<Project>> {
        if let Some(projects) = self.cache.get(&session.token_id).await {
            debug!(count = projects.len(), "own projects served from cache");
            return Ok(projects);
        }

        let page = self
            .client
            .project_list(
                session,
                ListProjectsInput {
                    user_id: Some(session.user_id.clone()),
                    ..Default::default()
                },
            )
            .await?;
        self.cache
            .insert(&session.token_id, page.projects.clone())
            .await;
        Ok(page.projects)
    }

    /// Arrange listed projects by hierarchy (current identity API only)
    #[instrument(skip(self, session, projects), fields(project_id = %session.project_id, count = projects.len()))]
    pub async fn project_tree(
        &self,
        session: &SessionContext,
        projects: &[Project],
    ) -> DomainResult<Vec<ProjectTreeRow>> {
        let all = if self.client.generation() >= ApiGeneration::Current {
            self.client
                .project_list(
                    session,
                    ListProjectsInput {
                        domain_id: session.domain_context_id(),
                        ..Default::default()
                    },
                )
                .await?
                .projects
        } else {
            Vec::new()
        };

        Ok(build_project_tree(&session.project_id, projects, &all))
    }

    #[instrument(skip(self, _session), fields(project_id = %project_id))]
    pub async fn get_project(
        &self,
        _session: &SessionContext,
        project_id: &str,
    ) -> DomainResult<Project> {
        self.client.project_get(project_id).await
    }

    #[instrument(skip(self, _session), fields(project_id = %project_id))]
    pub async fn project_detail(
        &self,
        _session: &SessionContext,
        project_id: &str,
    ) -> DomainResult<ProjectDetail> {
        let project = self.client.project_get(project_id).await?;

        // top-level projects name their domain as parent
        let parent = match project.parent_id.as_deref() {
            Some(parent_id) if project.domain_id.as_deref() != Some(parent_id) => {
                match self.client.project_get(parent_id).await {
                    Ok(parent) => Some(parent),
                    Err(err) => {
                        warn!(parent_id = %parent_id, error = %err, "unable to retrieve parent project");
                        None
                    }
                }
            }
            _ => None,
        };

        let domain_name = match (&project.domain_id, self.client.generation()) {
            (Some(domain_id), ApiGeneration::Current) => {
                match self.client.domain_get(domain_id).await {
                    Ok(domain) => Some(domain.name),
                    Err(err) => {
                        warn!(domain_id = %domain_id, error = %err, "unable to retrieve domain");
                        None
                    }
                }
            }
            _ => None,
        };

        Ok(ProjectDetail {
            project,
            parent,
            domain_name,
        })
    }

    /// Create a project and give the operator their own roles on it.
    ///
    /// Roles listed as disinherited are not carried over. The operator's
    /// cached project list is dropped whether or not creation succeeds.
    #[instrument(skip(self, session, request), fields(user_id = %session.user_id, name = %request.name))]
    pub async fn create_project(
        &self,
        session: &SessionContext,
        request: CreateProjectRequest,
    ) -> DomainResult<Project> {
        common::garde::validate_struct(&request)?;

        let result = self.create_and_inherit(session, request).await;
        self.cache.invalidate(&session.token_id).await;
        result
    }

    async fn create_and_inherit(
        &self,
        session: &SessionContext,
        request: CreateProjectRequest,
    ) -> DomainResult<Project> {
        let domain = self.queries.default_domain(session).await;
        let parent_id = (self.client.generation() >= ApiGeneration::Current)
            .then(|| session.project_id.clone());

        let project = self
            .client
            .project_create(CreateProjectInput {
                name: request.name,
                description: request.description,
                enabled: true,
                domain_id: domain.id,
                parent_id,
            })
            .await?;
        debug!(project_id = %project.id, "project created");

        let catalogue = self.client.role_list().await?;
        let disinherited: HashSet<&str> = self
            .policy
            .disinherited_roles
            .iter()
            .map(String::as_str)
            .collect();

        for role_name in session.roles.iter().filter(|r| !disinherited.contains(r.as_str())) {
            let Some(role) = catalogue.iter().find(|role| &role.name == role_name) else {
                warn!(role = %role_name, "operator role missing from the role catalogue");
                continue;
            };
            self.client
                .grant_role(RoleGrant::user_on_project(&role.id, &session.user_id, &project.id))
                .await?;
        }

        Ok(project)
    }

    #[instrument(skip(self, session, request), fields(project_id = %request.project_id))]
    pub async fn update_project(
        &self,
        session: &SessionContext,
        request: UpdateProjectRequest,
    ) -> DomainResult<Project> {
        common::garde::validate_struct(&request)?;

        if !request.enabled && session.is_current_project(&request.project_id) {
            return Err(DomainError::CurrentProjectProtected(request.project_id));
        }

        self.client
            .project_update(UpdateProjectInput {
                project_id: request.project_id,
                name: Some(request.name),
                description: request.description,
                enabled: Some(request.enabled),
                domain_id: None,
            })
            .await
    }

    /// Delete projects one by one; the session's own project is refused
    #[instrument(skip(self, session, project_ids), fields(count = project_ids.len()))]
    pub async fn delete_projects(
        &self,
        session: &SessionContext,
        project_ids: &[String],
    ) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        for project_id in project_ids {
            let result = if session.is_current_project(project_id) {
                Err(DomainError::CurrentProjectProtected(project_id.clone()))
            } else {
                self.client.project_delete(project_id).await
            };
            if let Err(err) = &result {
                warn!(project_id = %project_id, error = %err, "project not deleted");
            }
            outcome.record(project_id, result);
        }

        self.cache.invalidate(&session.token_id).await;
        outcome
    }

    #[instrument(skip(self, _session), fields(project_id = %project_id))]
    pub async fn list_members(
        &self,
        _session: &SessionContext,
        project_id: &str,
    ) -> DomainResult<Vec<User>> {
        self.queries.project_user_list(project_id).await
    }

    /// Users of the default domain not yet on the project
    #[instrument(skip(self, session), fields(project_id = %project_id))]
    pub async fn list_non_members(
        &self,
        session: &SessionContext,
        project_id: &str,
    ) -> DomainResult<Vec<User>> {
        let domain = self.queries.default_domain(session).await;
        let members = self.queries.project_user_list(project_id).await?;
        let member_ids: HashSet<&str> = members.iter().map(|u| u.id.as_str()).collect();

        let users = self
            .client
            .user_list(ListUsersInput {
                domain_id: domain.id,
                ..Default::default()
            })
            .await?;
        Ok(users
            .into_iter()
            .filter(|user| !member_ids.contains(user.id.as_str()))
            .collect())
    }

    /// Grant the configured default user roles on the project to each user
    #[instrument(skip(self, _session, request), fields(project_id = %request.project_id, count = request.user_ids.len()))]
    pub async fn add_members(
        &self,
        _session: &SessionContext,
        request: ProjectMembersRequest,
    ) -> DomainResult<BatchOutcome> {
        common::garde::validate_struct(&request)?;

        let mut roles = Vec::new();
        for name in &self.policy.default_user_roles {
            match self.queries.default_role(name).await? {
                Some(role) => roles.push(role),
                None => warn!(role = %name, "default user role not found"),
            }
        }

        let mut outcome = BatchOutcome::default();
        for user_id in &request.user_ids {
            let mut result = Ok(());
            for role in &roles {
                result = self
                    .client
                    .grant_role(RoleGrant::user_on_project(&role.id, user_id, &request.project_id))
                    .await;
                if result.is_err() {
                    break;
                }
            }
            outcome.record(user_id, result);
        }
        Ok(outcome)
    }

    #[instrument(skip(self, session), fields(project_id = %project_id, user_id = %user_id))]
    pub async fn remove_member(
        &self,
        session: &SessionContext,
        project_id: &str,
        user_id: &str,
    ) -> DomainResult<MemberRelease> {
        release_member(&self.queries, session, user_id, project_id).await
    }

    /// Roles the user holds on the session's project, for display
    pub async fn member_roles(
        &self,
        session: &SessionContext,
        user_id: &str,
    ) -> DomainResult<Vec<String>> {
        let roles = self
            .client
            .roles_for_user(user_id, AssignmentScope::Project(session.project_id.clone()))
            .await?;
        Ok(roles.into_iter().map(|role| role.name).collect())
    }
}
