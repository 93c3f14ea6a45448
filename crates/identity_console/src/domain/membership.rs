use common::domain::{DomainResult, ListProjectsInput, SessionContext};
use common::identity::IdentityQueries;
use tracing::{debug, info, instrument};

/// What happened to a user taken off a project
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberRelease {
    /// The user stays, with this project as their new primary project
    Reassigned { project_id: String },
    /// The project was the user's last one
    Deleted,
}

/// First project other than `project_id` the user holds a role on
#[instrument(skip(queries, session), fields(user_id = %user_id, project_id = %project_id))]
pub async fn find_other_project(
    queries: &IdentityQueries,
    session: &SessionContext,
    user_id: &str,
    project_id: &str,
) -> DomainResult<Option<String>> {
    let page = queries
        .client()
        .project_list(session, ListProjectsInput::default())
        .await?;

    for project in page.projects.iter().filter(|p| p.id != project_id) {
        let members = queries.project_user_list(&project.id).await?;
        if members.iter().any(|member| member.id == user_id) {
            return Ok(Some(project.id.clone()));
        }
    }
    Ok(None)
}

/// Take the user out of every group of the project they belong to.
/// Without groups on the identity API this is a no-op.
#[instrument(skip(queries, session), fields(user_id = %user_id, project_id = %project_id))]
pub async fn remove_from_project_groups(
    queries: &IdentityQueries,
    session: &SessionContext,
    user_id: &str,
    project_id: &str,
) -> DomainResult<()> {
    let domain_id = session.domain_context_id();
    let groups = match queries
        .project_group_list(project_id, domain_id.as_deref())
        .await
    {
        Ok(groups) => groups,
        Err(err) if err.is_not_available() => return Ok(()),
        Err(err) => return Err(err),
    };

    for group in groups {
        let members = queries.group_user_list(project_id, &group.id).await?;
        if members.iter().any(|member| member.id == user_id) {
            debug!(group_id = %group.id, "removing user from project group");
            queries.client().group_remove_user(&group.id, user_id).await?;
        }
    }
    Ok(())
}

/// Remove a user from a project.
///
/// A user always keeps one primary project: if they hold a role on another
/// project, that project becomes primary and their roles here are revoked;
/// otherwise the user is deleted.
#[instrument(skip(queries, session), fields(user_id = %user_id, project_id = %project_id))]
pub async fn release_member(
    queries: &IdentityQueries,
    session: &SessionContext,
    user_id: &str,
    project_id: &str,
) -> DomainResult<MemberRelease> {
    let Some(other_project) = find_other_project(queries, session, user_id, project_id).await?
    else {
        info!("project was the user's last, deleting user");
        queries.client().user_delete(user_id).await?;
        return Ok(MemberRelease::Deleted);
    };

    remove_from_project_groups(queries, session, user_id, project_id).await?;
    queries
        .client()
        .user_update_project(user_id, &other_project)
        .await?;
    queries.remove_project_user(project_id, user_id).await?;

    info!(new_project_id = %other_project, "user moved to another primary project");
    Ok(MemberRelease::Reassigned {
        project_id: other_project,
    })
}
