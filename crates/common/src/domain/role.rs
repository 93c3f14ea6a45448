use std::fmt;

/// Name of the distinguished super-role
pub const ADMIN_ROLE_NAME: &str = "admin";

/// Separator between the parts of a structured role name
pub const ROLE_KEY_SEPARATOR: &str = "__";

/// Role domain entity
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Role {
    pub id: String,
    pub name: String,
}

impl Role {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    pub fn key(&self) -> RoleKey {
        RoleKey::parse(&self.name)
    }
}

/// Decoded form of a role name.
///
/// Role names carry a structured key: `category__region__role_name` places the
/// role in the role matrix, the literal `admin` is the super-role, and every
/// other name is an opaque administrative role (for example `_member_`).
///
/// A matrix key needs exactly three non-empty segments. Names with an empty
/// segment such as `C____Viewer` or `__DC1__x` are administrative, so they are
/// never shown in the matrix nor revoked by a checklist.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RoleKey {
    Matrix {
        category: String,
        region: String,
        role_name: String,
    },
    Admin,
    Administrative(String),
}

impl RoleKey {
    pub fn parse(name: &str) -> Self {
        if name == ADMIN_ROLE_NAME {
            return RoleKey::Admin;
        }

        let parts: Vec<&str> = name.split(ROLE_KEY_SEPARATOR).collect();
        match parts.as_slice() {
            [category, region, role_name]
                if !category.is_empty() && !region.is_empty() && !role_name.is_empty() =>
            {
                RoleKey::Matrix {
                    category: category.to_string(),
                    region: region.to_string(),
                    role_name: role_name.to_string(),
                }
            }
            _ => RoleKey::Administrative(name.to_string()),
        }
    }

    /// Compose the structured role name for a matrix cell
    pub fn compose(category: &str, region: &str, role_name: &str) -> String {
        format!(
            "{category}{sep}{region}{sep}{role_name}",
            sep = ROLE_KEY_SEPARATOR
        )
    }

    pub fn category(&self) -> Option<&str> {
        match self {
            RoleKey::Matrix { category, .. } => Some(category),
            _ => None,
        }
    }

    /// Roles the console manages through the matrix: structured roles and `admin`
    pub fn is_managed(&self) -> bool {
        matches!(self, RoleKey::Matrix { .. } | RoleKey::Admin)
    }
}

impl fmt::Display for RoleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoleKey::Matrix {
                category,
                region,
                role_name,
            } => f.write_str(&RoleKey::compose(category, region, role_name)),
            RoleKey::Admin => f.write_str(ADMIN_ROLE_NAME),
            RoleKey::Administrative(name) => f.write_str(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_matrix_role() {
        assert_eq!(
            RoleKey::parse("C__DC1__Viewer"),
            RoleKey::Matrix {
                category: "C".to_string(),
                region: "DC1".to_string(),
                role_name: "Viewer".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_admin_role() {
        assert_eq!(RoleKey::parse("admin"), RoleKey::Admin);
        assert!(RoleKey::parse("admin").is_managed());
    }

    #[test]
    fn test_parse_administrative_roles() {
        for name in ["_member_", "C__DC1", "A__B__C__D", "C____Viewer", "__DC1__x", "Admin"] {
            assert_eq!(
                RoleKey::parse(name),
                RoleKey::Administrative(name.to_string()),
                "{name} should be opaque"
            );
        }
    }

    #[test]
    fn test_display_restores_role_name() {
        for name in ["T__DC2__ObjectStore", "admin", "_member_"] {
            assert_eq!(RoleKey::parse(name).to_string(), name);
        }
    }

    #[test]
    fn test_compose() {
        assert_eq!(RoleKey::compose("O", "DC3", "Admin"), "O__DC3__Admin");
    }
}
