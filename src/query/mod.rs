//! Data-fetching layer: a request cache plus cached reads and invalidating
//! mutations over the service layer.

pub mod cache;
pub mod keys;
pub mod queries;

pub use cache::QueryCache;
pub use queries::Queries;
