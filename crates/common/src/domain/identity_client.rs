use async_trait::async_trait;
use std::fmt;

use crate::domain::{
    AssignmentScope, CreateGroupInput, CreateProjectInput, CreateUserInput, Domain,
    DomainError, DomainResult, Group, ListGroupsInput, ListProjectsInput,
    ListRoleAssignmentsInput, ListUsersInput, Project, ProjectPage, Role, RoleAssignment,
    RoleGrant, SessionContext, UpdateGroupInput, UpdateProjectInput, UpdateUserInput, User,
};

/// Identity API generation spoken by the identity service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ApiGeneration {
    /// v2.0: tenants, no groups or domains
    Legacy,
    /// v3: projects with hierarchy, groups, domains, role assignments
    Current,
}

impl ApiGeneration {
    pub fn version(&self) -> &'static str {
        match self {
            ApiGeneration::Legacy => "v2.0",
            ApiGeneration::Current => "v3",
        }
    }

    /// Parse a configured version string such as `2`, `2.0`, `v2.0`, `3` or `v3`
    pub fn from_version(version: &str) -> DomainResult<Self> {
        let trimmed = version.trim().trim_start_matches(['v', 'V']);
        match trimmed.split('.').next() {
            Some("2") => Ok(ApiGeneration::Legacy),
            Some("3") => Ok(ApiGeneration::Current),
            _ => Err(DomainError::UnsupportedIdentityVersion(version.to_string())),
        }
    }

    /// Error for an operation this generation cannot serve
    pub fn not_available(&self, operation: &str) -> DomainError {
        DomainError::NotAvailable {
            generation: self.version().to_string(),
            operation: operation.to_string(),
        }
    }
}

impl fmt::Display for ApiGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.version())
    }
}

/// Uniform call surface over both identity API generations.
///
/// Implementations translate each call into their generation's wire dialect.
/// Calls the active generation cannot serve fail with
/// [`DomainError::NotAvailable`] before anything is sent.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait IdentityClient: Send + Sync {
    fn generation(&self) -> ApiGeneration;

    async fn domain_get(&self, domain_id: &str) -> DomainResult<Domain>;

    async fn project_get(&self, project_id: &str) -> DomainResult<Project>;

    async fn project_create(&self, input: CreateProjectInput) -> DomainResult<Project>;

    async fn project_update(&self, input: UpdateProjectInput) -> DomainResult<Project>;

    async fn project_delete(&self, project_id: &str) -> DomainResult<()>;

    /// List projects. A listing for the session's own user may be answered
    /// from the projects attached to the session.
    async fn project_list(
        &self,
        session: &SessionContext,
        input: ListProjectsInput,
    ) -> DomainResult<ProjectPage>;

    async fn user_get(&self, user_id: &str) -> DomainResult<User>;

    async fn user_create(&self, input: CreateUserInput) -> DomainResult<User>;

    async fn user_update(&self, input: UpdateUserInput) -> DomainResult<User>;

    /// Change the primary project of a user
    async fn user_update_project(&self, user_id: &str, project_id: &str) -> DomainResult<()>;

    async fn user_delete(&self, user_id: &str) -> DomainResult<()>;

    async fn user_list(&self, input: ListUsersInput) -> DomainResult<Vec<User>>;

    /// All roles defined in the deployment
    async fn role_list(&self) -> DomainResult<Vec<Role>>;

    async fn roles_for_user(&self, user_id: &str, scope: AssignmentScope)
    -> DomainResult<Vec<Role>>;

    async fn roles_for_group(&self, group_id: &str, project_id: &str) -> DomainResult<Vec<Role>>;

    async fn grant_role(&self, grant: RoleGrant) -> DomainResult<()>;

    async fn revoke_role(&self, grant: RoleGrant) -> DomainResult<()>;

    async fn role_assignments_list(
        &self,
        input: ListRoleAssignmentsInput,
    ) -> DomainResult<Vec<RoleAssignment>>;

    async fn group_get(&self, group_id: &str) -> DomainResult<Group>;

    async fn group_create(&self, input: CreateGroupInput) -> DomainResult<Group>;

    async fn group_update(&self, input: UpdateGroupInput) -> DomainResult<Group>;

    async fn group_delete(&self, group_id: &str) -> DomainResult<()>;

    async fn group_list(&self, input: ListGroupsInput) -> DomainResult<Vec<Group>>;

    async fn group_add_user(&self, group_id: &str, user_id: &str) -> DomainResult<()>;

    async fn group_remove_user(&self, group_id: &str, user_id: &str) -> DomainResult<()>;
}
