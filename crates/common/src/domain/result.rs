use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Group not found: {0}")]
    GroupNotFound(String),

    #[error("Role not found: {0}")]
    RoleNotFound(String),

    #[error("Domain not found: {0}")]
    DomainNotFound(String),

    #[error("Identity resource not found: {0}")]
    ResourceNotFound(String),

    /// Uniqueness constraint violated on the identity service (HTTP 409)
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("User name is already used: {0}")]
    UserNameInUse(String),

    /// Operation is not supported by the active identity API generation.
    /// Raised before any remote call is made.
    #[error("Not available on the {generation} identity API: {operation}")]
    NotAvailable {
        generation: String,
        operation: String,
    },

    #[error("The current project cannot be deleted or disabled: {0}")]
    CurrentProjectProtected(String),

    #[error("Cannot delete the signed-in user: {0}")]
    CannotDeleteSelf(String),

    #[error("Unsupported identity API version: {0}")]
    UnsupportedIdentityVersion(String),

    #[error("Identity service authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Identity service returned {status}: {message}")]
    IdentityService { status: u16, message: String },

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Remote error: {0}")]
    RemoteError(#[from] anyhow::Error),
}

impl DomainError {
    /// True when the error reports a uniqueness violation
    pub fn is_conflict(&self) -> bool {
        matches!(self, DomainError::Conflict(_) | DomainError::UserNameInUse(_))
    }

    pub fn is_not_available(&self) -> bool {
        matches!(self, DomainError::NotAvailable { .. })
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, DomainError::IdentityService { status: 401, .. })
    }
}
