pub mod mock;
pub mod persistence;
pub mod repositories;

pub use persistence::{Database, SqliteDeletionAuditRepository, SqliteEntityStore};
pub use repositories::{InMemoryDeletionAuditRepository, InMemoryEntityStore};
