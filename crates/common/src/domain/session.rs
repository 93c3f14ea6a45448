use crate::domain::{DomainRef, Project};

/// Page size used when the session does not carry one
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Facts about the signed-in operator that the console session carries
/// into every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub user_id: String,
    pub user_name: String,
    pub token_id: String,
    /// Project the operator is currently scoped to
    pub project_id: String,
    pub project_name: String,
    pub user_domain_id: Option<String>,
    /// Domain selected in the console, if any
    pub domain_context: Option<DomainRef>,
    /// Role names the operator holds on the current project
    pub roles: Vec<String>,
    /// Projects attached to the authenticated identity at sign-in
    pub authorized_projects: Vec<Project>,
    pub page_size: usize,
}

impl SessionContext {
    pub fn domain_context_id(&self) -> Option<String> {
        self.domain_context.as_ref().and_then(|d| d.id.clone())
    }

    pub fn holds_role(&self, role_name: &str) -> bool {
        self.roles.iter().any(|r| r == role_name)
    }

    pub fn is_current_project(&self, project_id: &str) -> bool {
        self.project_id == project_id
    }

    pub fn page_size(&self) -> usize {
        if self.page_size == 0 {
            DEFAULT_PAGE_SIZE
        } else {
            self.page_size
        }
    }
}
