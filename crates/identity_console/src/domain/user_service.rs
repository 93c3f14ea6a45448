use common::domain::{
    AssignmentScope, CreateUserInput, DomainError, DomainResult, IdentityClient, RoleGrant,
    SessionContext, UpdateUserInput, User,
};
use common::identity::IdentityQueries;
use garde::Validate;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::domain::{
    BatchOutcome, ConsolePolicy, MembershipReconciler, ReconcileReport, RoleMatrix,
    RoleMatrixBuilder, RoleTarget, release_member,
};

// ============================================================================
// Service Request Types
// ============================================================================

/// Request to create a user on the session's project
#[derive(Debug, Clone, Validate)]
pub struct CreateUserRequest {
    #[garde(length(min = 1, max = 255))]
    pub name: String,
    #[garde(inner(email))]
    pub email: Option<String>,
    #[garde(length(min = 1))]
    pub password: String,
    #[garde(matches(password))]
    pub confirm_password: String,
}

#[derive(Debug, Clone, Validate)]
pub struct UpdateUserRequest {
    #[garde(length(min = 1))]
    pub user_id: String,
    #[garde(length(min = 1, max = 255))]
    pub name: String,
    #[garde(inner(email))]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Validate)]
pub struct SetUserEnabledRequest {
    #[garde(length(min = 1))]
    pub user_id: String,
    #[garde(skip)]
    pub enabled: bool,
}

/// Submitted role checklist for one user
#[derive(Debug, Clone, Validate)]
pub struct ModifyUserRolesRequest {
    #[garde(length(min = 1))]
    pub user_id: String,
    #[garde(inner(length(min = 1)))]
    pub checklist: Vec<String>,
}

/// Domain service for the users of the session's project
pub struct UserService {
    client: Arc<dyn IdentityClient>,
    queries: Arc<IdentityQueries>,
    policy: Arc<ConsolePolicy>,
}

impl UserService {
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

    #[instrument(skip(self, session), fields(project_id = %session.project_id))]
    pub async fn list_users(&self, session: &SessionContext) -> DomainResult<Vec<User>> {
        let users = self.queries.project_user_list(&session.project_id).await?;
        debug!(count = users.len(), "listed project users");
        Ok(users)
    }

    #[instrument(skip(self, session, request), fields(project_id = %session.project_id, name = %request.name))]
    pub async fn create_user(
        &self,
        session: &SessionContext,
        request: CreateUserRequest,
    ) -> DomainResult<User> {
        common::garde::validate_struct(&request)?;

        let domain = self.queries.default_domain(session).await;
        let name = request.name.clone();
        let user = self
            .client
            .user_create(CreateUserInput {
                name: request.name,
                email: request.email,
                password: request.password,
                project_id: Some(session.project_id.clone()),
                enabled: true,
                domain_id: domain.id,
            })
            .await
            .map_err(|err| name_in_use(err, &name))?;
        debug!(user_id = %user.id, "user created");

        let held = self
            .client
            .roles_for_user(&user.id, AssignmentScope::Project(session.project_id.clone()))
            .await?;

        for role_name in &self.policy.default_user_roles {
            let Some(role) = self.queries.default_role(role_name).await? else {
                warn!(role = %role_name, "default user role not found");
                continue;
            };
            if held.iter().any(|r| r.id == role.id) {
                continue;
            }
            self.client
                .grant_role(RoleGrant::user_on_project(
                    &role.id,
                    &user.id,
                    &session.project_id,
                ))
                .await?;
        }

        Ok(user)
    }

    #[instrument(skip(self, _session, request), fields(user_id = %request.user_id))]
    pub async fn update_user(
        &self,
        _session: &SessionContext,
        request: UpdateUserRequest,
    ) -> DomainResult<User> {
        common::garde::validate_struct(&request)?;

        let name = request.name.clone();
        self.client
            .user_update(UpdateUserInput {
                user_id: request.user_id,
                name: Some(request.name),
                email: request.email,
                ..Default::default()
            })
            .await
            .map_err(|err| name_in_use(err, &name))
    }

    #[instrument(skip(self, _session, request), fields(user_id = %request.user_id, enabled = request.enabled))]
    pub async fn set_user_enabled(
        &self,
        _session: &SessionContext,
        request: SetUserEnabledRequest,
    ) -> DomainResult<User> {
        common::garde::validate_struct(&request)?;

        self.client
            .user_update(UpdateUserInput {
                user_id: request.user_id,
                enabled: Some(request.enabled),
                ..Default::default()
            })
            .await
    }

    /// Take users off the session's project; the caller is refused
    #[instrument(skip(self, session, user_ids), fields(project_id = %session.project_id, count = user_ids.len()))]
    pub async fn delete_users(&self, session: &SessionContext, user_ids: &[String]) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        for user_id in user_ids {
            let result = if *user_id == session.user_id {
                Err(DomainError::CannotDeleteSelf(user_id.clone()))
            } else {
                match release_member(&self.queries, session, user_id, &session.project_id).await {
                    Ok(release) => {
                        debug!(user_id = %user_id, ?release, "user released");
                        Ok(())
                    }
                    Err(err) => Err(err),
                }
            };
            if let Err(err) = &result {
                warn!(user_id = %user_id, error = %err, "user not deleted");
            }
            outcome.record(user_id, result);
        }
        outcome
    }

    #[instrument(skip(self, session), fields(project_id = %session.project_id, user_id = %user_id))]
    pub async fn user_role_matrix(
        &self,
        session: &SessionContext,
        user_id: &str,
    ) -> DomainResult<RoleMatrix> {
        let catalogue = self.client.role_list().await?;
        let held: Vec<String> = self
            .client
            .roles_for_user(user_id, AssignmentScope::Project(session.project_id.clone()))
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

    /// Make the user's roles on the session's project match the checklist
    #[instrument(skip(self, session, request), fields(project_id = %session.project_id, user_id = %request.user_id))]
    pub async fn modify_user_roles(
        &self,
        session: &SessionContext,
        request: ModifyUserRolesRequest,
    ) -> DomainResult<ReconcileReport> {
        common::garde::validate_struct(&request)?;

        let catalogue = self.client.role_list().await?;
        let current = self
            .client
            .roles_for_user(
                &request.user_id,
                AssignmentScope::Project(session.project_id.clone()),
            )
            .await?;

        let reconciler = MembershipReconciler::new(
            self.policy.default_user_roles.clone(),
            self.policy.admin_categories(),
        );
        let plan = reconciler.plan(&request.checklist, &current, &catalogue);
        if plan.escalated {
            debug!("admin role added to checklist");
        }

        Ok(reconciler
            .apply(
                self.client.as_ref(),
                &RoleTarget::User(request.user_id),
                &session.project_id,
                &plan,
            )
            .await)
    }
}

fn name_in_use(err: DomainError, name: &str) -> DomainError {
    if err.is_conflict() {
        DomainError::UserNameInUse(name.to_string())
    } else {
        err
    }
}

/// Case-insensitive substring match on user name or email
pub fn filter_users(users: &[User], query: &str) -> Vec<User> {
    let query = query.to_lowercase();
    users
        .iter()
        .filter(|user| {
            user.name.to_lowercase().contains(&query)
                || user
                    .email
                    .as_deref()
                    .is_some_and(|email| email.to_lowercase().contains(&query))
        })
        .cloned()
        .collect()
}
