mod config;
mod current;
mod http;
mod legacy;
mod negotiate;
mod queries;
mod wire;

pub use config::*;
pub use current::*;
pub use http::*;
pub use legacy::*;
pub use negotiate::*;
pub use queries::*;
