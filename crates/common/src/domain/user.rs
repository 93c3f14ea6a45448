use std::collections::BTreeMap;

/// User domain entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub enabled: bool,
    /// Primary project of the user
    pub default_project_id: Option<String>,
    pub domain_id: Option<String>,
}

/// Input for creating a user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateUserInput {
    pub name: String,
    pub email: Option<String>,
    pub password: String,
    pub project_id: Option<String>,
    pub enabled: bool,
    pub domain_id: Option<String>,
}

/// Input for updating a user; `None` fields are left unchanged
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UpdateUserInput {
    pub user_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub enabled: Option<bool>,
    pub password: Option<String>,
    /// New primary project
    pub project_id: Option<String>,
}

/// Input for listing users
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ListUsersInput {
    pub project_id: Option<String>,
    pub domain_id: Option<String>,
    pub group_id: Option<String>,
    pub filters: BTreeMap<String, String>,
}
