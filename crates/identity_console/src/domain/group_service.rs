use common::domain::{
    ApiGeneration, CreateGroupInput, DomainResult, Group, IdentityClient, ListUsersInput,
    RoleGrant, SessionContext, UpdateGroupInput, User,
};
use common::identity::IdentityQueries;
use garde::Validate;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::domain::{
    BatchOutcome, ConsolePolicy, MembershipReconciler, ReconcileReport, RoleMatrix,
    RoleMatrixBuilder, RoleTarget,
};

// ============================================================================
// Service Request Types
// ============================================================================

#[derive(Debug, Clone, Validate)]
pub struct CreateGroupRequest {
    #[garde(length(min = 1, max = 64))]
    pub name: String,
    #[garde(inner(length(max = 255)))]
    pub description: Option<String>,
}

/// Only the description of a group can change
#[derive(Debug, Clone, Validate)]
pub struct UpdateGroupRequest {
    #[garde(length(min = 1))]
    pub group_id: String,
    #[garde(inner(length(max = 255)))]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Validate)]
pub struct GroupMembersRequest {
    #[garde(length(min = 1))]
    pub group_id: String,
    #[garde(length(min = 1), inner(length(min = 1)))]
    pub user_ids: Vec<String>,
}

#[derive(Debug, Clone, Validate)]
pub struct ModifyGroupRolesRequest {
    #[garde(length(min = 1))]
    pub group_id: String,
    #[garde(inner(length(min = 1)))]
    pub checklist: Vec<String>,
}

/// Domain service for the groups of the session's project.
///
/// Groups exist on the current identity API only; on the legacy API every
/// operation fails with `NotAvailable` before anything is sent.
pub struct GroupService {
    client: Arc<dyn IdentityClient>,
    queries: Arc<IdentityQueries>,
    policy: Arc<ConsolePolicy>,
}

impl GroupService {
    pub fn new(
        client: Arc<dyn IdentityClient>,
        queries: Arc<IdentityQueries>,
        policy: Arc<ConsolePolicy>,
    ) -> Self {
        Self {
            client,
            queries,
            policy,
        }
    }

    fn ensure_groups(&self, operation: &str) -> DomainResult<()> {
        let generation = self.client.generation();
        if generation < ApiGeneration::Current {
            return Err(generation.not_available(operation));
        }
        Ok(())
    }

    #[instrument(skip(self, session), fields(project_id = %session.project_id))]
    pub async fn list_groups(&self, session: &SessionContext) -> DomainResult<Vec<Group>> {
        self.ensure_groups("group_list")?;

        let domain_id = session.domain_context_id();
        self.queries
            .project_group_list(&session.project_id, domain_id.as_deref())
            .await
    }

    #[instrument(skip(self, _session), fields(group_id = %group_id))]
    pub async fn get_group(&self, _session: &SessionContext, group_id: &str) -> DomainResult<Group> {
        self.ensure_groups("group_get")?;
        self.client.group_get(group_id).await
    }

    /// Create a group in the domain context and give it the default group
    /// roles on the session's project
    #[instrument(skip(self, session, request), fields(project_id = %session.project_id, name = %request.name))]
    pub async fn create_group(
        &self,
        session: &SessionContext,
        request: CreateGroupRequest,
    ) -> DomainResult<Group> {
        common::garde::validate_struct(&request)?;
        self.ensure_groups("group_create")?;

        let domain = self.queries.default_domain(session).await;
        let group = self
            .client
            .group_create(CreateGroupInput {
                domain_id: domain.id,
                name: request.name,
                description: request.description,
            })
            .await?;
        debug!(group_id = %group.id, "group created");

        for role_name in &self.policy.default_group_roles {
            let Some(role) = self.queries.default_role(role_name).await? else {
                warn!(role = %role_name, "default group role not found");
                continue;
            };
            self.client
                .grant_role(RoleGrant::group_on_project(
                    &role.id,
                    &group.id,
                    &session.project_id,
                ))
                .await?;
        }

        Ok(group)
    }

    #[instrument(skip(self, _session, request), fields(group_id = %request.group_id))]
    pub async fn update_group(
        &self,
        _session: &SessionContext,
        request: UpdateGroupRequest,
    ) -> DomainResult<Group> {
        common::garde::validate_struct(&request)?;
        self.ensure_groups("group_update")?;

        self.client
            .group_update(UpdateGroupInput {
                group_id: request.group_id,
                name: None,
                description: request.description,
            })
            .await
    }

    #[instrument(skip(self, _session), fields(group_id = %group_id))]
    pub async fn delete_group(&self, _session: &SessionContext, group_id: &str) -> DomainResult<()> {
        self.ensure_groups("group_delete")?;
        self.client.group_delete(group_id).await
    }

    #[instrument(skip(self, session), fields(project_id = %session.project_id, group_id = %group_id))]
    pub async fn list_members(
        &self,
        session: &SessionContext,
        group_id: &str,
    ) -> DomainResult<Vec<User>> {
        self.ensure_groups("group_user_list")?;
        self.queries
            .group_user_list(&session.project_id, group_id)
            .await
    }

    /// Project users that are not in the group
    #[instrument(skip(self, session), fields(project_id = %session.project_id, group_id = %group_id))]
    pub async fn list_non_members(
        &self,
        session: &SessionContext,
        group_id: &str,
    ) -> DomainResult<Vec<User>> {
        self.ensure_groups("group_user_list")?;

        let group_users = self
            .client
            .user_list(ListUsersInput {
                group_id: Some(group_id.to_string()),
                ..Default::default()
            })
            .await?;
        let in_group: HashSet<&str> = group_users.iter().map(|u| u.id.as_str()).collect();

        let project_users = self.queries.project_user_list(&session.project_id).await?;
        Ok(project_users
            .into_iter()
            .filter(|user| !in_group.contains(user.id.as_str()))
            .collect())
    }

    #[instrument(skip(self, _session, request), fields(group_id = %request.group_id, count = request.user_ids.len()))]
    pub async fn add_members(
        &self,
        _session: &SessionContext,
        request: GroupMembersRequest,
    ) -> DomainResult<BatchOutcome> {
        common::garde::validate_struct(&request)?;
        self.ensure_groups("group_add_user")?;

        let mut outcome = BatchOutcome::default();
        for user_id in &request.user_ids {
            let result = self.client.group_add_user(&request.group_id, user_id).await;
            outcome.record(user_id, result);
        }
        Ok(outcome)
    }

    #[instrument(skip(self, _session, request), fields(group_id = %request.group_id, count = request.user_ids.len()))]
    pub async fn remove_members(
        &self,
        _session: &SessionContext,
        request: GroupMembersRequest,
    ) -> DomainResult<BatchOutcome> {
        common::garde::validate_struct(&request)?;
        self.ensure_groups("group_remove_user")?;

        let mut outcome = BatchOutcome::default();
        for user_id in &request.user_ids {
            let result = self
                .client
                .group_remove_user(&request.group_id, user_id)
                .await;
            outcome.record(user_id, result);
        }
        Ok(outcome)
    }

    #[instrument(skip(self, session), fields(project_id = %session.project_id, group_id = %group_id))]
    pub async fn role_matrix(
        &self,
        session: &SessionContext,
        group_id: &str,
    ) -> DomainResult<RoleMatrix> {
        self.ensure_groups("roles_for_group")?;

        let catalogue = self.client.role_list().await?;
        let held: Vec<String> = self
            .client
            .roles_for_group(group_id, &session.project_id)
            .await?
            .into_iter()
            .map(|role| role.name)
            .collect();

        Ok(RoleMatrixBuilder::new(self.policy.role_categories.clone()).build(
            &catalogue,
            &session.roles,
            &held,
        ))
    }

    /// Make the group's roles on the session's project match the checklist
    #[instrument(skip(self, session, request), fields(project_id = %session.project_id, group_id = %request.group_id))]
    pub async fn modify_roles(
        &self,
        session: &SessionContext,
        request: ModifyGroupRolesRequest,
    ) -> DomainResult<ReconcileReport> {
        common::garde::validate_struct(&request)?;
        self.ensure_groups("roles_for_group")?;

        let catalogue = self.client.role_list().await?;
        let current = self
            .client
            .roles_for_group(&request.group_id, &session.project_id)
            .await?;

        let reconciler = MembershipReconciler::new(
            self.policy.default_group_roles.clone(),
            self.policy.admin_categories(),
        );
        let plan = reconciler.plan(&request.checklist, &current, &catalogue);
        if plan.escalated {
            debug!("admin role added to checklist");
        }

        Ok(reconciler
            .apply(
                self.client.as_ref(),
                &RoleTarget::Group(request.group_id),
                &session.project_id,
                &plan,
            )
            .await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::domain::{
        AssignmentActor, AssignmentScope, Domain, DomainError, MockIdentityClient, Role,
        RoleAssignment,
    };

    fn session() -> SessionContext {
        SessionContext {
            user_id: "u-admin".to_string(),
            user_name: "admin".to_string(),
            token_id: "token".to_string(),
            project_id: "p1".to_string(),
            project_name: "tenant-a".to_string(),
            user_domain_id: Some("default".to_string()),
            domain_context: None,
            roles: vec!["O__DC1__Admin".to_string()],
            authorized_projects: vec![],
            page_size: 20,
        }
    }

    fn user(id: &str) -> User {
        User {
            id: id.to_string(),
            name: id.to_string(),
            email: None,
            enabled: true,
            default_project_id: None,
            domain_id: None,
        }
    }

    fn service(client: MockIdentityClient) -> GroupService {
        let client: Arc<dyn IdentityClient> = Arc::new(client);
        GroupService::new(
            client.clone(),
            Arc::new(IdentityQueries::new(client)),
            Arc::new(ConsolePolicy::default()),
        )
    }

    fn current_client() -> MockIdentityClient {
        let mut client = MockIdentityClient::new();
        client
            .expect_generation()
            .return_const(ApiGeneration::Current);
        client
    }

    #[tokio::test]
    async fn test_legacy_api_has_no_groups() {
        let mut client = MockIdentityClient::new();
        client
            .expect_generation()
            .return_const(ApiGeneration::Legacy);
        client.expect_group_list().never();

        let result = service(client).list_groups(&session()).await;
        assert!(matches!(result, Err(DomainError::NotAvailable { .. })));
    }

    #[tokio::test]
    async fn test_create_group_grants_default_roles() {
        let mut client = current_client();
        client.expect_domain_get().times(1).returning(|id| {
            Ok(Domain {
                id: id.to_string(),
                name: "Default".to_string(),
            })
        });
        client
            .expect_group_create()
            .withf(|input: &CreateGroupInput| {
                input.name == "ops" && input.domain_id.as_deref() == Some("default")
            })
            .times(1)
            .return_once(|input| {
                Ok(Group {
                    id: "g1".to_string(),
                    name: input.name,
                    description: input.description,
                    domain_id: input.domain_id,
                })
            });
        client
            .expect_role_list()
            .times(1)
            .return_once(|| Ok(vec![Role::new("r-member", "_member_")]));
        client
            .expect_grant_role()
            .withf(|grant| *grant == RoleGrant::group_on_project("r-member", "g1", "p1"))
            .times(1)
            .return_once(|_| Ok(()));

        let group = service(client)
            .create_group(
                &session(),
                CreateGroupRequest {
                    name: "ops".to_string(),
                    description: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(group.id, "g1");
    }

    #[tokio::test]
    async fn test_update_group_leaves_name() {
        let mut client = current_client();
        client
            .expect_group_update()
            .withf(|input: &UpdateGroupInput| {
                input.name.is_none() && input.description.as_deref() == Some("night shift")
            })
            .times(1)
            .return_once(|input| {
                Ok(Group {
                    id: input.group_id,
                    name: "ops".to_string(),
                    description: input.description,
                    domain_id: None,
                })
            });

        let group = service(client)
            .update_group(
                &session(),
                UpdateGroupRequest {
                    group_id: "g1".to_string(),
                    description: Some("night shift".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(group.name, "ops");
    }

    #[tokio::test]
    async fn test_non_members_are_project_users_outside_group() {
        let mut client = current_client();
        client
            .expect_user_list()
            .withf(|input: &ListUsersInput| input.group_id.as_deref() == Some("g1"))
            .times(1)
            .return_once(|_| Ok(vec![user("u1")]));
        client
            .expect_role_assignments_list()
            .times(1)
            .return_once(|_| {
                Ok(vec![
                    RoleAssignment {
                        role_id: "r-member".to_string(),
                        actor: AssignmentActor::User("u1".to_string()),
                        scope: AssignmentScope::Project("p1".to_string()),
                    },
                    RoleAssignment {
                        role_id: "r-member".to_string(),
                        actor: AssignmentActor::User("u2".to_string()),
                        scope: AssignmentScope::Project("p1".to_string()),
                    },
                ])
            });
        client
            .expect_user_list()
            .withf(|input: &ListUsersInput| input.group_id.is_none())
            .times(1)
            .return_once(|_| Ok(vec![user("u1"), user("u2"), user("u3")]));

        let users = service(client)
            .list_non_members(&session(), "g1")
            .await
            .unwrap();
        let ids: Vec<&str> = users.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, vec!["u2"]);
    }

    #[tokio::test]
    async fn test_modify_roles_keeps_default_group_role() {
        let mut client = current_client();
        client.expect_role_list().times(1).return_once(|| {
            Ok(vec![
                Role::new("r-member", "_member_"),
                Role::new("r-viewer", "C__DC1__Viewer"),
            ])
        });
        client
            .expect_roles_for_group()
            .times(1)
            .return_once(|_, _| Ok(vec![Role::new("r-member", "_member_")]));
        client
            .expect_grant_role()
            .withf(|grant| *grant == RoleGrant::group_on_project("r-viewer", "g1", "p1"))
            .times(1)
            .return_once(|_| Ok(()));
        client.expect_revoke_role().never();

        let report = service(client)
            .modify_roles(
                &session(),
                ModifyGroupRolesRequest {
                    group_id: "g1".to_string(),
                    checklist: vec!["C__DC1__Viewer".to_string()],
                },
            )
            .await
            .unwrap();
        assert_eq!(report.granted, vec!["C__DC1__Viewer"]);
    }

    #[tokio::test]
    async fn test_remove_members_reports_each_user() {
        let mut client = current_client();
        client
            .expect_group_remove_user()
            .times(2)
            .returning(|_, user_id| {
                if user_id == "u2" {
                    Err(DomainError::UserNotFound(user_id.to_string()))
                } else {
                    Ok(())
                }
            });

        let outcome = service(client)
            .remove_members(
                &session(),
                GroupMembersRequest {
                    group_id: "g1".to_string(),
                    user_ids: vec!["u1".to_string(), "u2".to_string()],
                },
            )
            .await
            .unwrap();
        assert_eq!(outcome.succeeded, vec!["u1"]);
        assert_eq!(outcome.failed[0].id, "u2");
    }
}
