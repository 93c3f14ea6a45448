use std::collections::BTreeMap;

/// Project (tenant) domain entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub enabled: bool,
    pub domain_id: Option<String>,
    /// Only reported by the current identity API generation
    pub parent_id: Option<String>,
}

/// Input for creating a project
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateProjectInput {
    pub name: String,
    pub description: Option<String>,
    pub enabled: bool,
    pub domain_id: Option<String>,
    pub parent_id: Option<String>,
}

/// Input for updating a project; `None` fields are left unchanged
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UpdateProjectInput {
    pub project_id: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub enabled: Option<bool>,
    pub domain_id: Option<String>,
}

/// Input for listing projects
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ListProjectsInput {
    pub paginate: bool,
    pub marker: Option<String>,
    pub domain_id: Option<String>,
    pub user_id: Option<String>,
    pub filters: BTreeMap<String, String>,
}

/// One page of projects
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProjectPage {
    pub projects: Vec<Project>,
    pub has_more: bool,
}

/// Identity domain (namespace for projects, users and groups)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Domain {
    pub id: String,
    pub name: String,
}

/// Domain the console operates in; either part may be unknown
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DomainRef {
    pub id: Option<String>,
    pub name: Option<String>,
}
