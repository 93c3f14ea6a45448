//! JSON documents of both identity API dialects and their conversion to
//! domain entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{
    AssignmentActor, AssignmentScope, Domain, Group, Project, Role, RoleAssignment, User,
};

fn enabled_by_default() -> bool {
    true
}

// ============================================================================
// Shared
// ============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct WireRole {
    pub id: String,
    pub name: String,
}

impl From<WireRole> for Role {
    fn from(role: WireRole) -> Self {
        Role {
            id: role.id,
            name: role.name,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct RoleList {
    pub roles: Vec<WireRole>,
}

impl RoleList {
    pub fn into_roles(self) -> Vec<Role> {
        self.roles.into_iter().map(Role::from).collect()
    }
}

// ============================================================================
// Legacy (v2.0)
// ============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct V2Tenant {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

impl From<V2Tenant> for Project {
    fn from(tenant: V2Tenant) -> Self {
        Project {
            id: tenant.id,
            name: tenant.name,
            description: tenant.description,
            enabled: tenant.enabled,
            domain_id: None,
            parent_id: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct V2TenantEnvelope {
    pub tenant: V2Tenant,
}

#[derive(Debug, Deserialize)]
pub(crate) struct V2TenantList {
    pub tenants: Vec<V2Tenant>,
}

#[derive(Debug, Default, Serialize)]
pub(crate) struct V2TenantFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct V2User {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default, rename = "tenantId")]
    pub tenant_id: Option<String>,
}

impl From<V2User> for User {
    fn from(user: V2User) -> Self {
        User {
            id: user.id,
            name: user.name,
            email: user.email,
            enabled: user.enabled,
            default_project_id: user.tenant_id,
            domain_id: None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct V2UserEnvelope {
    pub user: V2User,
}

#[derive(Debug, Deserialize)]
pub(crate) struct V2UserList {
    pub users: Vec<V2User>,
}

#[derive(Debug, Default, Serialize)]
pub(crate) struct V2UserFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(rename = "tenantId", skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct V2Access {
    pub access: V2AccessBody,
}

#[derive(Debug, Deserialize)]
pub(crate) struct V2AccessBody {
    pub token: V2Token,
}

#[derive(Debug, Deserialize)]
pub(crate) struct V2Token {
    pub id: String,
    #[serde(default)]
    pub expires: Option<DateTime<Utc>>,
}

// ============================================================================
// Current (v3)
// ============================================================================

#[derive(Debug, Deserialize)]
pub(crate) struct V3Project {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub domain_id: Option<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
}

impl From<V3Project> for Project {
    fn from(project: V3Project) -> Self {
        Project {
            id: project.id,
            name: project.name,
            description: project.description,
            enabled: project.enabled,
            domain_id: project.domain_id,
            parent_id: project.parent_id,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct V3ProjectEnvelope {
    pub project: V3Project,
}

#[derive(Debug, Deserialize)]
pub(crate) struct V3ProjectList {
    pub projects: Vec<V3Project>,
}

#[derive(Debug, Default, Serialize)]
pub(crate) struct V3ProjectFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct V3User {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub default_project_id: Option<String>,
    #[serde(default)]
    pub domain_id: Option<String>,
}

impl From<V3User> for User {
    fn from(user: V3User) -> Self {
        User {
            id: user.id,
            name: user.name,
            email: user.email,
            enabled: user.enabled,
            default_project_id: user.default_project_id,
            domain_id: user.domain_id,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct V3UserEnvelope {
    pub user: V3User,
}

#[derive(Debug, Deserialize)]
pub(crate) struct V3UserList {
    pub users: Vec<V3User>,
}

#[derive(Debug, Default, Serialize)]
pub(crate) struct V3UserFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_project_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct V3Group {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub domain_id: Option<String>,
}

impl From<V3Group> for Group {
    fn from(group: V3Group) -> Self {
        Group {
            id: group.id,
            name: group.name,
            description: group.description,
            domain_id: group.domain_id,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct V3GroupEnvelope {
    pub group: V3Group,
}

#[derive(Debug, Deserialize)]
pub(crate) struct V3GroupList {
    pub groups: Vec<V3Group>,
}

#[derive(Debug, Default, Serialize)]
pub(crate) struct V3GroupFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct V3Domain {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct V3DomainEnvelope {
    pub domain: V3Domain,
}

impl From<V3Domain> for Domain {
    fn from(domain: V3Domain) -> Self {
        Domain {
            id: domain.id,
            name: domain.name,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct IdRef {
    pub id: String,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct V3Scope {
    #[serde(default)]
    pub project: Option<IdRef>,
    #[serde(default)]
    pub domain: Option<IdRef>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct V3RoleAssignment {
    pub role: IdRef,
    #[serde(default)]
    pub user: Option<IdRef>,
    #[serde(default)]
    pub group: Option<IdRef>,
    #[serde(default)]
    pub scope: Option<V3Scope>,
}

impl V3RoleAssignment {
    /// Assignments without a user/group holder or without a project/domain
    /// scope (system scope) have no console representation.
    pub fn into_assignment(self) -> Option<RoleAssignment> {
        let actor = match (self.user, self.group) {
            (Some(user), _) => AssignmentActor::User(user.id),
            (None, Some(group)) => AssignmentActor::Group(group.id),
            (None, None) => return None,
        };
        let scope = self.scope?;
        let scope = match (scope.project, scope.domain) {
            (Some(project), _) => AssignmentScope::Project(project.id),
            (None, Some(domain)) => AssignmentScope::Domain(domain.id),
            (None, None) => return None,
        };
        Some(RoleAssignment {
            role_id: self.role.id,
            actor,
            scope,
        })
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct V3RoleAssignmentList {
    pub role_assignments: Vec<V3RoleAssignment>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct V3TokenEnvelope {
    pub token: V3Token,
}

#[derive(Debug, Deserialize)]
pub(crate) struct V3Token {
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}
