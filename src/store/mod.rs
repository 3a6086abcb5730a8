//! Persistence layer: the record store and the audience mirror, both on libSQL.

pub mod audience;
pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use audience::LibSqlAudienceSource;
pub use libsql_backend::LibSqlBackend;
pub use traits::{AudienceSource, MessageTemplate, RecordStore};
