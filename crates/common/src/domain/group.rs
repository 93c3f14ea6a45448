/// Group domain entity (current identity API generation only)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub domain_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateGroupInput {
    pub domain_id: Option<String>,
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UpdateGroupInput {
    pub group_id: String,
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ListGroupsInput {
    pub domain_id: Option<String>,
    pub user_id: Option<String>,
}
