pub mod config_manager;
pub mod corpus;
pub mod error;
pub mod hydration;
pub mod perspective;
pub mod schema;
pub mod writer;

pub use config_manager::*;
pub use corpus::*;
pub use error::*;
pub use hydration::*;
pub use perspective::*;
pub use schema::*;
pub use writer::*;
