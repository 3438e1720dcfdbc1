//! ABOUTME: Dual-dialect relational+vector storage provider and dual-backend KV store
//! ABOUTME: Everything downstream (repository, REM, ingest) talks to storage only through these seams

pub mod config;
pub mod dialect;
pub mod kv;

#[cfg(feature = "postgres")]
pub mod pool;

pub use config::ConnectionConfig;
pub use dialect::{MySqlDialect, PostgresDialect, StorageDialect};
pub use kv::KvStore;

#[cfg(feature = "postgres")]
pub use pool::{PoolStatus, PostgresBackend};

use p8fs_config::Dialect;

/// Build the dialect implementation selected by configuration.
#[must_use]
pub fn dialect_for(dialect: Dialect) -> Box<dyn StorageDialect> {
    match dialect {
        Dialect::Postgres => Box::new(PostgresDialect),
        Dialect::MySql => Box::new(MySqlDialect),
    }
}
