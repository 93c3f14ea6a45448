use common::domain::DomainError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageLevel {
    Success,
    Info,
    Warning,
    Error,
}

/// Page-level message shown after a console action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlashMessage {
    pub level: MessageLevel,
    pub text: String,
}

impl FlashMessage {
    pub fn new(level: MessageLevel, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
        }
    }
}

/// Message attached to a single form field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleMessage {
    Flash(FlashMessage),
    Field(FieldError),
}

/// Convert a failed console action into what the form shows.
///
/// Name conflicts land on `field`; everything else becomes a page message
/// prefixed with `action` (e.g. "Unable to create user").
pub fn console_message(error: &DomainError, action: &str, field: &str) -> ConsoleMessage {
    let flash = |level, text: String| ConsoleMessage::Flash(FlashMessage::new(level, text));

    match error {
        DomainError::Conflict(_) | DomainError::UserNameInUse(_) => {
            ConsoleMessage::Field(FieldError {
                field: field.to_string(),
                message: "The name is already used.".to_string(),
            })
        }

        DomainError::ValidationError(msg) => flash(MessageLevel::Warning, format!("{action}: {msg}")),

        DomainError::PermissionDenied(_) => flash(
            MessageLevel::Info,
            "Insufficient privilege level to view this information.".to_string(),
        ),

        DomainError::NotAvailable { .. } => flash(MessageLevel::Info, error.to_string()),

        DomainError::CurrentProjectProtected(_) | DomainError::CannotDeleteSelf(_) => {
            flash(MessageLevel::Warning, error.to_string())
        }

        DomainError::ProjectNotFound(_)
        | DomainError::UserNotFound(_)
        | DomainError::GroupNotFound(_)
        | DomainError::RoleNotFound(_)
        | DomainError::DomainNotFound(_)
        | DomainError::ResourceNotFound(_) => flash(MessageLevel::Error, format!("{action}: {error}")),

        DomainError::UnsupportedIdentityVersion(_)
        | DomainError::AuthenticationFailed(_)
        | DomainError::IdentityService { .. }
        | DomainError::RemoteError(_) => flash(MessageLevel::Error, format!("{action}.")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_becomes_field_error() {
        let err = DomainError::UserNameInUse("alice".to_string());
        assert_eq!(
            console_message(&err, "Unable to create user", "name"),
            ConsoleMessage::Field(FieldError {
                field: "name".to_string(),
                message: "The name is already used.".to_string(),
            })
        );
    }

    #[test]
    fn test_remote_failure_hides_details() {
        let err = DomainError::IdentityService {
            status: 500,
            message: "stack trace".to_string(),
        };
        match console_message(&err, "Unable to update project", "name") {
            ConsoleMessage::Flash(flash) => {
                assert_eq!(flash.level, MessageLevel::Error);
                assert_eq!(flash.text, "Unable to update project.");
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_permission_denied_is_informational() {
        let err = DomainError::PermissionDenied("projects".to_string());
        assert!(matches!(
            console_message(&err, "Unable to retrieve projects", "name"),
            ConsoleMessage::Flash(FlashMessage { level: MessageLevel::Info, .. })
        ));
    }
}
