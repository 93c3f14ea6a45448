use common::domain::Project;
use std::collections::{HashMap, HashSet};

/// Separator between ancestor names in a hierarchical project name
pub const HIERARCHY_SEPARATOR: &str = " \\ ";

/// A project placed in the visible project tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectTreeRow {
    /// `parent_id` rewritten to the closest visible ancestor
    pub project: Project,
    /// `root \ child \ leaf`
    pub hierarchical_name: String,
    pub depth: usize,
}

/// Arrange the visible projects as a tree.
///
/// `all` is the full listing of the domain and is only used to walk past
/// ancestors the operator cannot see. Rows come depth first starting from
/// `current_project_id`, then the remaining roots by name; siblings are
/// ordered by name. A listing without any parent information is returned
/// flat, in input order.
pub fn build_project_tree(
    current_project_id: &str,
    visible: &[Project],
    all: &[Project],
) -> Vec<ProjectTreeRow> {
    if visible.iter().all(|p| p.parent_id.is_none()) {
        return visible
            .iter()
            .map(|project| ProjectTreeRow {
                project: project.clone(),
                hierarchical_name: project.name.clone(),
                depth: 0,
            })
            .collect();
    }

    let visible_ids: HashSet<&str> = visible.iter().map(|p| p.id.as_str()).collect();
    let parents: HashMap<&str, &str> = all
        .iter()
        .chain(visible.iter())
        .filter_map(|p| p.parent_id.as_deref().map(|parent| (p.id.as_str(), parent)))
        .collect();

    let closest_visible_ancestor = |project: &Project| -> Option<String> {
        let mut seen = HashSet::new();
        let mut cursor = project.parent_id.as_deref();
        while let Some(id) = cursor {
            if visible_ids.contains(id) {
                return Some(id.to_string());
            }
            if !seen.insert(id) {
                break;
            }
            cursor = parents.get(id).copied();
        }
        None
    };

    let placed: Vec<Project> = visible
        .iter()
        .map(|project| Project {
            parent_id: closest_visible_ancestor(project),
            ..project.clone()
        })
        .collect();

    let mut children: HashMap<Option<&str>, Vec<&Project>> = HashMap::new();
    for project in &placed {
        children
            .entry(project.parent_id.as_deref())
            .or_default()
            .push(project);
    }
    for siblings in children.values_mut() {
        siblings.sort_by(|a, b| a.name.cmp(&b.name));
    }

    let mut rows = Vec::with_capacity(placed.len());
    let mut emitted: HashSet<&str> = HashSet::new();

    let by_id: HashMap<&str, &Project> = placed.iter().map(|p| (p.id.as_str(), p)).collect();
    let mut starts: Vec<&Project> = Vec::new();
    if let Some(current) = by_id.get(current_project_id) {
        starts.push(*current);
    }
    starts.extend(children.get(&None).into_iter().flatten().copied());

    for start in starts {
        let prefix = ancestor_names(start, &by_id);
        let depth = prefix.len();
        push_subtree(start, prefix, depth, &children, &mut emitted, &mut rows);
    }

    rows
}

fn ancestor_names(project: &Project, by_id: &HashMap<&str, &Project>) -> Vec<String> {
    let mut names = Vec::new();
    let mut seen = HashSet::new();
    let mut cursor = project.parent_id.as_deref();
    while let Some(id) = cursor {
        let Some(parent) = by_id.get(id) else {
            break;
        };
        if !seen.insert(id) {
            break;
        }
        names.push(parent.name.clone());
        cursor = parent.parent_id.as_deref();
    }
    names.reverse();
    names
}

fn push_subtree<'a>(
    project: &'a Project,
    mut path: Vec<String>,
    depth: usize,
    children: &HashMap<Option<&str>, Vec<&'a Project>>,
    emitted: &mut HashSet<&'a str>,
    rows: &mut Vec<ProjectTreeRow>,
) {
    if !emitted.insert(project.id.as_str()) {
        return;
    }

    path.push(project.name.clone());
    rows.push(ProjectTreeRow {
        project: project.clone(),
        hierarchical_name: path.join(HIERARCHY_SEPARATOR),
        depth,
    });

    if let Some(kids) = children.get(&Some(project.id.as_str())) {
        for child in kids {
            push_subtree(child, path.clone(), depth + 1, children, emitted, rows);
        }
    }
}

/// Case-insensitive substring match on project names
pub fn filter_projects(projects: &[Project], query: &str) -> Vec<Project> {
    let query = query.to_lowercase();
    projects
        .iter()
        .filter(|project| project.name.to_lowercase().contains(&query))
        .cloned()
        .collect()
}
