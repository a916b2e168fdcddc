//! CLI commands implementation

pub mod check;
pub mod extract;
pub mod init;
pub mod query;
pub mod status;

pub use check::*;
pub use extract::*;
pub use init::*;
pub use query::*;
pub use status::*;
