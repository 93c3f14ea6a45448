use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use crate::domain::{
    ApiGeneration, AssignmentScope, DomainRef, DomainResult, Group, IdentityClient,
    ListGroupsInput, ListRoleAssignmentsInput, ListUsersInput, Role, RoleAssignment, RoleGrant,
    SessionContext, User,
};

/// Multi-call identity lookups shared by the console services
pub struct IdentityQueries {
    client: Arc<dyn IdentityClient>,
    roles_by_key: Mutex<HashMap<String, Role>>,
}

impl IdentityQueries {
    pub fn new(client: Arc<dyn IdentityClient>) -> Self {
        Self {
            client,
            roles_by_key: Mutex::new(HashMap::new()),
        }
    }

    pub fn client(&self) -> &Arc<dyn IdentityClient> {
        &self.client
    }

    async fn project_assignments(
        &self,
        project_id: &str,
    ) -> DomainResult<Vec<RoleAssignment>> {
        self.client
            .role_assignments_list(ListRoleAssignmentsInput {
                project_id: Some(project_id.to_string()),
                ..Default::default()
            })
            .await
    }

    /// Users holding any role on the project.
    ///
    /// Falls back to the tenant membership listing where role assignments
    /// cannot be listed.
    #[instrument(skip(self), fields(project_id = %project_id))]
    pub async fn project_user_list(&self, project_id: &str) -> DomainResult<Vec<User>> {
        let assignments = match self.project_assignments(project_id).await {
            Ok(assignments) => assignments,
            Err(err) if err.is_not_available() => {
                debug!("role assignments unavailable, listing tenant users");
                return self
                    .client
                    .user_list(ListUsersInput {
                        project_id: Some(project_id.to_string()),
                        ..Default::default()
                    })
                    .await;
            }
            Err(err) => return Err(err),
        };

        let member_ids: HashSet<&str> = assignments.iter().filter_map(|a| a.user_id()).collect();
        let users = self.client.user_list(ListUsersInput::default()).await?;
        Ok(users
            .into_iter()
            .filter(|user| member_ids.contains(user.id.as_str()))
            .collect())
    }

    /// Groups of the domain holding any role on the project
    #[instrument(skip(self), fields(project_id = %project_id, domain_id = ?domain_id))]
    pub async fn project_group_list(
        &self,
        project_id: &str,
        domain_id: Option<&str>,
    ) -> DomainResult<Vec<Group>> {
        let assignments = self.project_assignments(project_id).await?;
        let group_ids: HashSet<&str> = assignments.iter().filter_map(|a| a.group_id()).collect();

        let groups = self
            .client
            .group_list(ListGroupsInput {
                domain_id: domain_id.map(str::to_string),
                user_id: None,
            })
            .await?;
        Ok(groups
            .into_iter()
            .filter(|group| group_ids.contains(group.id.as_str()))
            .collect())
    }

    /// Members of the group that also hold a role on the project
    #[instrument(skip(self), fields(project_id = %project_id, group_id = %group_id))]
    pub async fn group_user_list(&self, project_id: &str, group_id: &str) -> DomainResult<Vec<User>> {
        let group_users = self
            .client
            .user_list(ListUsersInput {
                group_id: Some(group_id.to_string()),
                ..Default::default()
            })
            .await?;
        let assignments = self.project_assignments(project_id).await?;
        let member_ids: HashSet<&str> = assignments.iter().filter_map(|a| a.user_id()).collect();

        Ok(group_users
            .into_iter()
            .filter(|user| member_ids.contains(user.id.as_str()))
            .collect())
    }

    /// Role ids each user holds directly on the project
    #[instrument(skip(self), fields(project_id = %project_id))]
    pub async fn project_users_roles(
        &self,
        project_id: &str,
    ) -> DomainResult<BTreeMap<String, Vec<String>>> {
        let mut users_roles: BTreeMap<String, Vec<String>> = BTreeMap::new();

        match self.project_assignments(project_id).await {
            Ok(assignments) => {
                for assignment in assignments {
                    if let Some(user_id) = assignment.user_id() {
                        users_roles
                            .entry(user_id.to_string())
                            .or_default()
                            .push(assignment.role_id.clone());
                    }
                }
            }
            Err(err) if err.is_not_available() => {
                let users = self
                    .client
                    .user_list(ListUsersInput {
                        project_id: Some(project_id.to_string()),
                        ..Default::default()
                    })
                    .await?;
                for user in users {
                    let roles = self
                        .client
                        .roles_for_user(&user.id, AssignmentScope::Project(project_id.to_string()))
                        .await?;
                    users_roles
                        .entry(user.id)
                        .or_default()
                        .extend(roles.into_iter().map(|role| role.id));
                }
            }
            Err(err) => return Err(err),
        }

        Ok(users_roles)
    }

    /// Revoke every role the user holds on the project
    #[instrument(skip(self), fields(project_id = %project_id, user_id = %user_id))]
    pub async fn remove_project_user(&self, project_id: &str, user_id: &str) -> DomainResult<()> {
        let roles = self
            .client
            .roles_for_user(user_id, AssignmentScope::Project(project_id.to_string()))
            .await?;
        for role in roles {
            self.client
                .revoke_role(RoleGrant::user_on_project(&role.id, user_id, project_id))
                .await?;
        }
        Ok(())
    }

    /// Domain new identity objects are created in: the session's domain
    /// context, otherwise the user's own domain.
    #[instrument(skip(self, session), fields(user_id = %session.user_id))]
    pub async fn default_domain(&self, session: &SessionContext) -> DomainRef {
        if let Some(context) = session.domain_context.as_ref().filter(|d| d.id.is_some()) {
            return context.clone();
        }

        let Some(domain_id) = session.user_domain_id.clone() else {
            return DomainRef::default();
        };
        if self.client.generation() < ApiGeneration::Current {
            return DomainRef {
                id: Some(domain_id),
                name: None,
            };
        }

        match self.client.domain_get(&domain_id).await {
            Ok(domain) => DomainRef {
                id: Some(domain.id),
                name: Some(domain.name),
            },
            Err(err) => {
                warn!(domain_id = %domain_id, error = %err, "unable to retrieve domain");
                DomainRef {
                    id: Some(domain_id),
                    name: None,
                }
            }
        }
    }

    /// Role matching an id or name, memoized for the life of this value
    #[instrument(skip(self), fields(key = %id_or_name))]
    pub async fn default_role(&self, id_or_name: &str) -> DomainResult<Option<Role>> {
        let mut cached = self.roles_by_key.lock().await;
        if let Some(role) = cached.get(id_or_name) {
            return Ok(Some(role.clone()));
        }

        let roles = self.client.role_list().await?;
        let found = roles
            .into_iter()
            .find(|role| role.id == id_or_name || role.name == id_or_name);
        if let Some(role) = &found {
            cached.insert(id_or_name.to_string(), role.clone());
        }
        Ok(found)
    }
}
