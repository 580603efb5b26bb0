pub mod error;
pub mod memory;
pub mod postgres;
pub mod response_cache;
pub mod traits;

pub use error::*;
pub use memory::*;
pub use postgres::*;
pub use response_cache::*;
pub use traits::*;
