/// Holder of a role assignment
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AssignmentActor {
    User(String),
    Group(String),
}

impl AssignmentActor {
    pub fn id(&self) -> &str {
        match self {
            AssignmentActor::User(id) | AssignmentActor::Group(id) => id,
        }
    }
}

/// Scope a role assignment applies to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AssignmentScope {
    Project(String),
    Domain(String),
}

/// A role granted to a user or group on a project or domain
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoleAssignment {
    pub role_id: String,
    pub actor: AssignmentActor,
    pub scope: AssignmentScope,
}

impl RoleAssignment {
    pub fn user_id(&self) -> Option<&str> {
        match &self.actor {
            AssignmentActor::User(id) => Some(id),
            AssignmentActor::Group(_) => None,
        }
    }

    pub fn group_id(&self) -> Option<&str> {
        match &self.actor {
            AssignmentActor::Group(id) => Some(id),
            AssignmentActor::User(_) => None,
        }
    }
}

/// Input for granting or revoking a single role
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleGrant {
    pub role_id: String,
    pub actor: AssignmentActor,
    pub scope: AssignmentScope,
}

impl RoleGrant {
    pub fn user_on_project(role_id: &str, user_id: &str, project_id: &str) -> Self {
        Self {
            role_id: role_id.to_string(),
            actor: AssignmentActor::User(user_id.to_string()),
            scope: AssignmentScope::Project(project_id.to_string()),
        }
    }

    pub fn group_on_project(role_id: &str, group_id: &str, project_id: &str) -> Self {
        Self {
            role_id: role_id.to_string(),
            actor: AssignmentActor::Group(group_id.to_string()),
            scope: AssignmentScope::Project(project_id.to_string()),
        }
    }
}

/// Input for listing role assignments
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ListRoleAssignmentsInput {
    pub project_id: Option<String>,
    pub user_id: Option<String>,
    pub role_id: Option<String>,
    pub group_id: Option<String>,
    pub domain_id: Option<String>,
    /// Expand group memberships into per-user assignments
    pub effective: bool,
}
