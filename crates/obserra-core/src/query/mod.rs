//! Query and mutation execution with timeout, retry, and error extraction.

pub mod errors;
pub mod executor;
pub mod types;

pub use errors::QueryError;
pub use executor::QueryExecutor;
pub use types::{Attempt, AttemptState, Execution, QueryConfig};
