mod group;
mod identity_client;
mod project;
mod result;
mod role;
mod role_assignment;
mod session;
mod user;

pub use group::*;
pub use identity_client::*;
pub use project::*;
pub use result::*;
pub use role::*;
pub use role_assignment::*;
pub use session::*;
pub use user::*;
