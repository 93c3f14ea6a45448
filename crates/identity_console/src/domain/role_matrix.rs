use common::domain::{ADMIN_ROLE_NAME, Role, RoleKey};
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::domain::{CategoryPolicy, RoleCategory};

/// One position of the role grid
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatrixCell {
    Role {
        operator_has: bool,
        target_has: bool,
        role_id: String,
        role_name: String,
    },
    /// No role exists for this region and role name
    NotApplicable,
}

impl MatrixCell {
    /// Tuple the console templates render: holdings as 0/1 and `3` for an
    /// empty position.
    pub fn as_display_tuple(&self) -> (u8, u8, &str, &str) {
        match self {
            MatrixCell::Role {
                operator_has,
                target_has,
                role_id,
                role_name,
            } => (
                u8::from(*operator_has),
                u8::from(*target_has),
                role_id,
                role_name,
            ),
            MatrixCell::NotApplicable => (3, 0, "", ""),
        }
    }
}

/// One role name across every region of a category
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatrixRow {
    pub role_name: String,
    /// Aligned with [`CategoryMatrix::regions`]
    pub cells: Vec<MatrixCell>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryMatrix {
    pub initial: String,
    pub name: String,
    pub policy: CategoryPolicy,
    /// Sorted
    pub regions: Vec<String>,
    /// In the order role names were first seen in the role list
    pub rows: Vec<MatrixRow>,
}

impl CategoryMatrix {
    pub fn cell(&self, region: &str, role_name: &str) -> Option<&MatrixCell> {
        let column = self.regions.iter().position(|r| r == region)?;
        self.rows
            .iter()
            .find(|row| row.role_name == role_name)
            .and_then(|row| row.cells.get(column))
    }

    pub fn cell_count(&self) -> usize {
        self.rows
            .iter()
            .flat_map(|row| &row.cells)
            .filter(|cell| matches!(cell, MatrixCell::Role { .. }))
            .count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RoleMatrix {
    pub categories: Vec<CategoryMatrix>,
    /// Roles with no structured name, `admin` excluded
    pub administrative_roles: Vec<Role>,
}

impl RoleMatrix {
    pub fn category(&self, initial: &str) -> Option<&CategoryMatrix> {
        self.categories.iter().find(|c| c.initial == initial)
    }
}

#[derive(Default)]
struct CategoryGrid<'a> {
    role_names: Vec<String>,
    cells: BTreeMap<String, HashMap<String, &'a Role>>,
}

/// Builds the category → region → role name grid from the role catalogue
pub struct RoleMatrixBuilder {
    categories: Vec<RoleCategory>,
}

impl RoleMatrixBuilder {
    pub fn new(categories: Vec<RoleCategory>) -> Self {
        Self { categories }
    }

    pub fn build(
        &self,
        roles: &[Role],
        operator_roles: &[String],
        target_roles: &[String],
    ) -> RoleMatrix {
        let operator: HashSet<&str> = operator_roles.iter().map(String::as_str).collect();
        let target: HashSet<&str> = target_roles.iter().map(String::as_str).collect();

        let mut grids: HashMap<String, CategoryGrid<'_>> = HashMap::new();
        let mut administrative_roles = Vec::new();

        for role in roles {
            match role.key() {
                RoleKey::Matrix {
                    category,
                    region,
                    role_name,
                } => {
                    let grid = grids.entry(category).or_default();
                    if !grid.role_names.contains(&role_name) {
                        grid.role_names.push(role_name.clone());
                    }
                    grid.cells.entry(region).or_default().insert(role_name, role);
                }
                RoleKey::Admin => {}
                RoleKey::Administrative(_) => administrative_roles.push(role.clone()),
            }
        }

        let operator_is_admin = operator.contains(ADMIN_ROLE_NAME);

        let categories = self
            .categories
            .iter()
            .filter(|category| category.policy != CategoryPolicy::Admin || operator_is_admin)
            .filter_map(|category| {
                let grid = grids.get(&category.initial)?;
                let regions: Vec<String> = grid.cells.keys().cloned().collect();
                let rows = grid
                    .role_names
                    .iter()
                    .map(|role_name| MatrixRow {
                        role_name: role_name.clone(),
                        cells: grid
                            .cells
                            .values()
                            .map(|by_name| match by_name.get(role_name) {
                                Some(role) => MatrixCell::Role {
                                    operator_has: operator.contains(role.name.as_str()),
                                    target_has: target.contains(role.name.as_str()),
                                    role_id: role.id.clone(),
                                    role_name: role.name.clone(),
                                },
                                None => MatrixCell::NotApplicable,
                            })
                            .collect(),
                    })
                    .collect();

                Some(CategoryMatrix {
                    initial: category.initial.clone(),
                    name: category.name.clone(),
                    policy: category.policy,
                    regions,
                    rows,
                })
            })
            .collect();

        RoleMatrix {
            categories,
            administrative_roles,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ConsolePolicy;

    fn roles(names: &[&str]) -> Vec<Role> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| Role::new(format!("r{i}"), *name))
            .collect()
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn builder() -> RoleMatrixBuilder {
        RoleMatrixBuilder::new(ConsolePolicy::default().role_categories)
    }

    #[test]
    fn test_grid_is_padded_with_sentinels() {
        let catalogue = roles(&["T__DC2__Viewer", "T__DC1__Viewer", "T__DC1__Editor"]);
        let matrix = builder().build(&catalogue, &[], &names(&["T__DC1__Editor"]));

        let tenant = matrix.category("T").unwrap();
        assert_eq!(tenant.regions, vec!["DC1", "DC2"]);
        assert_eq!(
            tenant.rows.iter().map(|r| r.role_name.as_str()).collect::<Vec<_>>(),
            vec!["Viewer", "Editor"]
        );
        assert_eq!(tenant.cell("DC2", "Editor"), Some(&MatrixCell::NotApplicable));
        assert_eq!(
            tenant.cell("DC1", "Editor").unwrap().as_display_tuple(),
            (0, 1, "r2", "T__DC1__Editor")
        );
        assert_eq!(tenant.cell_count(), 3);
    }

    #[test]
    fn test_admin_categories_hidden_from_non_admins() {
        let catalogue = roles(&["C__DC1__Viewer", "O__DC1__Admin", "admin"]);

        let matrix = builder().build(&catalogue, &names(&["O__DC1__Admin"]), &[]);
        assert!(matrix.category("O").is_none());
        assert!(matrix.category("C").is_some());

        let matrix = builder().build(&catalogue, &names(&["admin"]), &[]);
        let initials: Vec<&str> = matrix.categories.iter().map(|c| c.initial.as_str()).collect();
        assert_eq!(initials, vec!["C", "O"]);
    }

    #[test]
    fn test_administrative_roles_kept_aside() {
        let catalogue = roles(&["_member_", "admin", "C__DC1__Viewer", "heat_stack_owner"]);
        let matrix = builder().build(&catalogue, &[], &[]);

        let administrative: Vec<&str> = matrix
            .administrative_roles
            .iter()
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(administrative, vec!["_member_", "heat_stack_owner"]);
        assert_eq!(matrix.categories.len(), 1);
    }

    #[test]
    fn test_unknown_categories_are_omitted() {
        let catalogue = roles(&["X__DC1__Viewer"]);
        let matrix = builder().build(&catalogue, &[], &[]);
        assert!(matrix.categories.is_empty());
    }

    #[test]
    fn test_sentinel_display_tuple() {
        assert_eq!(MatrixCell::NotApplicable.as_display_tuple(), (3, 0, "", ""));
    }

    #[test]
    fn test_build_is_deterministic() {
        let catalogue = roles(&["C__DC3__A", "C__DC1__B", "C__DC2__A", "T__DC1__A"]);
        let first = builder().build(&catalogue, &names(&["C__DC1__B"]), &[]);
        let second = builder().build(&catalogue, &names(&["C__DC1__B"]), &[]);
        assert_eq!(first, second);
    }
}
