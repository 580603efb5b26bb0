pub mod handlers;
pub mod instance_handlers;
pub mod project_handlers;
pub mod routes;
pub mod user_extractor;

pub use handlers::*;
pub use instance_handlers::*;
pub use project_handlers::*;
pub use routes::*;
