pub mod common;
pub mod configuration;
pub mod instance;
pub mod project;
pub mod user_context;
pub mod workspace;

pub use common::*;
pub use configuration::*;
pub use instance::*;
pub use project::*;
pub use user_context::*;
pub use workspace::*;
