pub mod assembly;
pub mod schema_fetcher;

pub use assembly::*;
pub use schema_fetcher::Neo4jSchemaFetcher;
