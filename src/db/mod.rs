//! Database module for PostgreSQL connection and operations.

mod orders;
mod pool;
mod schema;
mod users;

pub use orders::PgOrderLedger;
pub use pool::DatabasePool;
pub use schema::*;
pub use users::PgCredentialStore;
