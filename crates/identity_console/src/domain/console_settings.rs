use serde::{Deserialize, Serialize};

/// Who may see and assign the roles of a category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryPolicy {
    #[default]
    #[serde(alias = "")]
    Open,
    /// Visible to `admin` holders only; assigning any of its roles also grants `admin`
    Admin,
}

/// A row of the role category table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleCategory {
    /// First segment of the structured role names in this category
    pub initial: String,
    /// Display name
    pub name: String,
    #[serde(default)]
    pub policy: CategoryPolicy,
}

impl RoleCategory {
    pub fn new(initial: &str, name: &str, policy: CategoryPolicy) -> Self {
        Self {
            initial: initial.to_string(),
            name: name.to_string(),
            policy,
        }
    }
}

fn default_member_roles() -> Vec<String> {
    vec!["_member_".to_string()]
}

fn default_disinherited_roles() -> Vec<String> {
    ["T__DC1__ObjectStore", "T__DC2__ObjectStore", "T__DC3__ObjectStore"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

fn default_role_categories() -> Vec<RoleCategory> {
    vec![
        RoleCategory::new("C", "Common Roles", CategoryPolicy::Open),
        RoleCategory::new("O", "Operator Roles", CategoryPolicy::Admin),
        RoleCategory::new("T", "Tenant User Roles", CategoryPolicy::Open),
    ]
}

/// Role policy of the console
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsolePolicy {
    /// Granted to users added to a project; never revoked by the matrix
    #[serde(default = "default_member_roles")]
    pub default_user_roles: Vec<String>,
    /// Granted to groups created in a project; never revoked by the matrix
    #[serde(default = "default_member_roles")]
    pub default_group_roles: Vec<String>,
    /// Operator roles not copied onto projects the operator creates
    #[serde(default = "default_disinherited_roles")]
    pub disinherited_roles: Vec<String>,
    /// Matrix categories in display order
    #[serde(default = "default_role_categories")]
    pub role_categories: Vec<RoleCategory>,
}

impl Default for ConsolePolicy {
    fn default() -> Self {
        Self {
            default_user_roles: default_member_roles(),
            default_group_roles: default_member_roles(),
            disinherited_roles: default_disinherited_roles(),
            role_categories: default_role_categories(),
        }
    }
}

impl ConsolePolicy {
    /// Initials of the categories with the `admin` policy
    pub fn admin_categories(&self) -> Vec<String> {
        self.role_categories
            .iter()
            .filter(|category| category.policy == CategoryPolicy::Admin)
            .map(|category| category.initial.clone())
            .collect()
    }
}
