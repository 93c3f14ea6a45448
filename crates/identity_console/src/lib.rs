pub mod domain;
pub mod identity_console;

pub use domain::*;
pub use identity_console::*;
