use crate::domain::{
    ConsolePolicy, GroupService, InMemoryProjectCache, ProjectCache, ProjectService, UserService,
};
use common::domain::{ApiGeneration, DomainResult, IdentityClient, RoleKey};
use common::identity::IdentityQueries;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Shape of the identity service's role catalogue
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RoleCatalogueSummary {
    pub matrix_roles: usize,
    pub administrative_roles: usize,
    pub has_admin_role: bool,
    /// Matrix roles per category initial
    pub per_category: BTreeMap<String, usize>,
    /// Categories present in the catalogue but missing from the policy
    pub unknown_categories: Vec<String>,
}

/// The console back end: every service wired to one identity client
pub struct IdentityConsole {
    client: Arc<dyn IdentityClient>,
    policy: Arc<ConsolePolicy>,
    pub projects: ProjectService,
    pub users: UserService,
    pub groups: GroupService,
}

impl IdentityConsole {
    pub fn new(
        client: Arc<dyn IdentityClient>,
        policy: ConsolePolicy,
        cache: Arc<dyn ProjectCache>,
    ) -> Self {
        debug!(generation = %client.generation(), "Initializing identity console");

        let policy = Arc::new(policy);
        let queries = Arc::new(IdentityQueries::new(client.clone()));

        Self {
            projects: ProjectService::new(
                client.clone(),
                queries.clone(),
                cache,
                policy.clone(),
            ),
            users: UserService::new(client.clone(), queries.clone(), policy.clone()),
            groups: GroupService::new(client.clone(), queries, policy.clone()),
            client,
            policy,
        }
    }

    pub fn with_in_memory_cache(client: Arc<dyn IdentityClient>, policy: ConsolePolicy) -> Self {
        Self::new(client, policy, Arc::new(InMemoryProjectCache::default()))
    }

    pub fn generation(&self) -> ApiGeneration {
        self.client.generation()
    }

    pub fn policy(&self) -> &ConsolePolicy {
        &self.policy
    }

    /// Fetch the role catalogue and sort it the way the role matrix will
    #[instrument(skip(self))]
    pub async fn role_catalogue_summary(&self) -> DomainResult<RoleCatalogueSummary> {
        let roles = self.client.role_list().await?;

        let mut summary = RoleCatalogueSummary::default();
        for role in &roles {
            match role.key() {
                RoleKey::Matrix { category, .. } => {
                    summary.matrix_roles += 1;
                    *summary.per_category.entry(category).or_default() += 1;
                }
                RoleKey::Admin => summary.has_admin_role = true,
                RoleKey::Administrative(_) => summary.administrative_roles += 1,
            }
        }

        summary.unknown_categories = summary
            .per_category
            .keys()
            .filter(|initial| {
                !self
                    .policy
                    .role_categories
                    .iter()
                    .any(|category| &category.initial == *initial)
            })
            .cloned()
            .collect();

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::domain::{MockIdentityClient, Role};

    #[tokio::test]
    async fn test_role_catalogue_summary() {
        let mut client = MockIdentityClient::new();
        client
            .expect_generation()
            .return_const(ApiGeneration::Current);
        client.expect_role_list().times(1).return_once(|| {
            Ok(vec![
                Role::new("r1", "admin"),
                Role::new("r2", "_member_"),
                Role::new("r3", "C__DC1__Viewer"),
                Role::new("r4", "C__DC2__Viewer"),
                Role::new("r5", "O__DC1__Admin"),
                Role::new("r6", "X__DC1__Audit"),
            ])
        });

        let console =
            IdentityConsole::with_in_memory_cache(Arc::new(client), ConsolePolicy::default());
        let summary = console.role_catalogue_summary().await.unwrap();

        assert!(summary.has_admin_role);
        assert_eq!(summary.matrix_roles, 4);
        assert_eq!(summary.administrative_roles, 1);
        assert_eq!(summary.per_category.get("C"), Some(&2));
        assert_eq!(summary.unknown_categories, vec!["X"]);
    }
}
