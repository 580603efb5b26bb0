pub mod instance_config;
pub mod project_registry;

pub use instance_config::*;
pub use project_registry::*;
