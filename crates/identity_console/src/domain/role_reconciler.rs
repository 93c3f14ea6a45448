use common::domain::{ADMIN_ROLE_NAME, IdentityClient, Role, RoleGrant, RoleKey};
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, instrument, warn};

/// Holder of the roles being reconciled, always on the session's project
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleTarget {
    User(String),
    Group(String),
}

impl RoleTarget {
    pub fn id(&self) -> &str {
        match self {
            RoleTarget::User(id) | RoleTarget::Group(id) => id,
        }
    }

    fn grant(&self, role_id: &str, project_id: &str) -> RoleGrant {
        match self {
            RoleTarget::User(user_id) => RoleGrant::user_on_project(role_id, user_id, project_id),
            RoleTarget::Group(group_id) => RoleGrant::group_on_project(role_id, group_id, project_id),
        }
    }
}

/// Grants and revokes that make a target's roles match a checklist
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReconcilePlan {
    pub grants: Vec<Role>,
    pub revokes: Vec<Role>,
    /// `admin` was added because an admin-policy role was checked
    pub escalated: bool,
}

impl ReconcilePlan {
    pub fn is_empty(&self) -> bool {
        self.grants.is_empty() && self.revokes.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileAction {
    Grant,
    Revoke,
}

impl fmt::Display for ReconcileAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileAction::Grant => f.write_str("grant"),
            ReconcileAction::Revoke => f.write_str("revoke"),
        }
    }
}

/// A grant or revoke that failed; the rest of the plan still ran
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileWarning {
    pub action: ReconcileAction,
    pub role_name: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ReconcileReport {
    pub granted: Vec<String>,
    pub revoked: Vec<String>,
    pub warnings: Vec<ReconcileWarning>,
}

/// Diffs a submitted role checklist against a target's roles.
///
/// Roles named in `protected` are never revoked, neither when an empty
/// checklist clears the target nor when unchecked managed roles are dropped.
/// This holds for protected matrix roles and `admin` too. Checking any role
/// of a category in `admin_categories` escalates the checklist with `admin`.
pub struct MembershipReconciler {
    protected: HashSet<String>,
    admin_categories: HashSet<String>,
}

impl MembershipReconciler {
    pub fn new(protected: Vec<String>, admin_categories: Vec<String>) -> Self {
        Self {
            protected: protected.into_iter().collect(),
            admin_categories: admin_categories.into_iter().collect(),
        }
    }

    fn is_protected(&self, role: &Role) -> bool {
        self.protected.contains(&role.name)
    }

    pub fn plan(&self, checklist: &[String], current: &[Role], available: &[Role]) -> ReconcilePlan {
        if checklist.is_empty() {
            return ReconcilePlan {
                grants: Vec::new(),
                revokes: current
                    .iter()
                    .filter(|role| !self.is_protected(role))
                    .cloned()
                    .collect(),
                escalated: false,
            };
        }

        let mut wanted: HashSet<&str> = checklist.iter().map(String::as_str).collect();
        let escalated = checklist.iter().any(|name| {
            RoleKey::parse(name)
                .category()
                .is_some_and(|category| self.admin_categories.contains(category))
        });
        if escalated {
            wanted.insert(ADMIN_ROLE_NAME);
        }

        let mut remaining: Vec<&Role> = current.iter().collect();
        let mut grants = Vec::new();
        for role in available {
            if !wanted.contains(role.name.as_str()) {
                continue;
            }
            match remaining.iter().position(|held| held.id == role.id) {
                Some(index) => {
                    remaining.remove(index);
                }
                None => grants.push(role.clone()),
            }
        }

        let revokes = remaining
            .into_iter()
            .filter(|role| role.key().is_managed() && !self.is_protected(role))
            .cloned()
            .collect();

        ReconcilePlan {
            grants,
            revokes,
            escalated,
        }
    }

    /// Apply a plan step by step. Failures become warnings.
    #[instrument(skip(self, client, plan), fields(target = %target.id(), project_id = %project_id, grants = plan.grants.len(), revokes = plan.revokes.len()))]
    pub async fn apply(
        &self,
        client: &dyn IdentityClient,
        target: &RoleTarget,
        project_id: &str,
        plan: &ReconcilePlan,
    ) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        for role in &plan.grants {
            match client.grant_role(target.grant(&role.id, project_id)).await {
                Ok(()) => report.granted.push(role.name.clone()),
                Err(err) => {
                    warn!(role = %role.name, error = %err, "role grant failed");
                    report.warnings.push(ReconcileWarning {
                        action: ReconcileAction::Grant,
                        role_name: role.name.clone(),
                        message: err.to_string(),
                    });
                }
            }
        }

        for role in &plan.revokes {
            match client.revoke_role(target.grant(&role.id, project_id)).await {
                Ok(()) => report.revoked.push(role.name.clone()),
                Err(err) => {
                    warn!(role = %role.name, error = %err, "role revoke failed");
                    report.warnings.push(ReconcileWarning {
                        action: ReconcileAction::Revoke,
                        role_name: role.name.clone(),
                        message: err.to_string(),
                    });
                }
            }
        }

        debug!(
            granted = report.granted.len(),
            revoked = report.revoked.len(),
            warnings = report.warnings.len(),
            "role reconciliation applied"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::domain::{AssignmentActor, DomainError, MockIdentityClient};

    fn catalogue() -> Vec<Role> {
        vec![
            Role::new("r-member", "_member_"),
            Role::new("r-admin", "admin"),
            Role::new("r-viewer", "C__DC1__Viewer"),
            Role::new("r-editor", "C__DC2__Editor"),
            Role::new("r-op", "O__DC1__Admin"),
            Role::new("r-heat", "heat_stack_owner"),
        ]
    }

    fn role(name: &str) -> Role {
        catalogue().into_iter().find(|r| r.name == name).unwrap()
    }

    fn checklist(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn reconciler() -> MembershipReconciler {
        MembershipReconciler::new(checklist(&["_member_"]), checklist(&["O"]))
    }

    fn names(roles: &[Role]) -> Vec<&str> {
        roles.iter().map(|r| r.name.as_str()).collect()
    }

    #[test]
    fn test_single_grant_without_escalation() {
        let plan = reconciler().plan(&checklist(&["C__DC1__Viewer"]), &[], &catalogue());
        assert_eq!(names(&plan.grants), vec!["C__DC1__Viewer"]);
        assert!(plan.revokes.is_empty());
        assert!(!plan.escalated);
    }

    #[test]
    fn test_admin_category_escalates() {
        let plan = reconciler().plan(&checklist(&["O__DC1__Admin"]), &[], &catalogue());
        assert!(plan.escalated);
        assert_eq!(names(&plan.grants), vec!["admin", "O__DC1__Admin"]);
    }

    #[test]
    fn test_matching_checklist_is_noop() {
        let current = vec![role("_member_"), role("C__DC1__Viewer"), role("admin"), role("O__DC1__Admin")];
        let plan = reconciler().plan(
            &checklist(&["C__DC1__Viewer", "O__DC1__Admin", "admin"]),
            &current,
            &catalogue(),
        );
        assert!(plan.is_empty());
    }

    #[test]
    fn test_unchecked_managed_roles_are_revoked() {
        let current = vec![
            role("_member_"),
            role("heat_stack_owner"),
            role("admin"),
            role("C__DC1__Viewer"),
            role("C__DC2__Editor"),
        ];
        let plan = reconciler().plan(&checklist(&["C__DC2__Editor"]), &current, &catalogue());
        assert!(plan.grants.is_empty());
        assert_eq!(names(&plan.revokes), vec!["admin", "C__DC1__Viewer"]);
    }

    #[test]
    fn test_empty_checklist_revokes_all_but_protected() {
        let current = vec![role("_member_"), role("heat_stack_owner"), role("O__DC1__Admin"), role("admin")];
        let plan = reconciler().plan(&[], &current, &catalogue());
        assert!(plan.grants.is_empty());
        assert!(!plan.escalated);
        assert_eq!(names(&plan.revokes), vec!["heat_stack_owner", "O__DC1__Admin", "admin"]);
    }

    #[test]
    fn test_protected_managed_roles_survive_both_revoke_passes() {
        let reconciler = MembershipReconciler::new(
            checklist(&["_member_", "C__DC1__Viewer", "admin"]),
            checklist(&["O"]),
        );
        let current = vec![role("C__DC1__Viewer"), role("admin"), role("C__DC2__Editor")];

        let plan = reconciler.plan(&checklist(&["O__DC1__Admin"]), &current, &catalogue());
        assert_eq!(names(&plan.grants), vec!["O__DC1__Admin"]);
        assert_eq!(names(&plan.revokes), vec!["C__DC2__Editor"]);

        let plan = reconciler.plan(&[], &current, &catalogue());
        assert_eq!(names(&plan.revokes), vec!["C__DC2__Editor"]);
    }

    #[tokio::test]
    async fn test_apply_collects_warnings_and_continues() {
        let mut client = MockIdentityClient::new();
        client
            .expect_grant_role()
            .withf(|grant| grant.role_id == "r-viewer")
            .times(1)
            .return_once(|_| Err(DomainError::PermissionDenied("forbidden".to_string())));
        client
            .expect_grant_role()
            .withf(|grant| {
                grant.role_id == "r-editor" && grant.actor == AssignmentActor::Group("g1".to_string())
            })
            .times(1)
            .return_once(|_| Ok(()));
        client
            .expect_revoke_role()
            .times(1)
            .return_once(|_| Ok(()));

        let plan = ReconcilePlan {
            grants: vec![role("C__DC1__Viewer"), role("C__DC2__Editor")],
            revokes: vec![role("admin")],
            escalated: false,
        };
        let report = reconciler()
            .apply(&client, &RoleTarget::Group("g1".to_string()), "p1", &plan)
            .await;

        assert_eq!(report.granted, vec!["C__DC2__Editor"]);
        assert_eq!(report.revoked, vec!["admin"]);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].action, ReconcileAction::Grant);
        assert_eq!(report.warnings[0].role_name, "C__DC1__Viewer");
    }
}
