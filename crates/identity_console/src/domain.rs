mod batch;
mod console_settings;
mod flash;
mod group_service;
mod membership;
mod project_cache;
mod project_service;
mod project_tree;
mod role_matrix;
mod role_reconciler;
mod user_service;

pub use batch::*;
pub use console_settings::*;
pub use flash::*;
pub use group_service::*;
pub use membership::*;
pub use project_cache::*;
pub use project_service::*;
pub use project_tree::*;
pub use role_matrix::*;
pub use role_reconciler::*;
pub use user_service::*;
