//! ABOUTME: Connection pool configuration, mirroring the builder pattern used across the workspace

use p8fs_config::{Dialect, StorageConfig};
use p8fs_core::P8fsError;

/// Pool and connection tuning for one [`crate::dialect::StorageDialect`] backend.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub dialect: Dialect,
    pub connection_string: String,
    pub max_pool_size: usize,
    pub connection_timeout_ms: u64,
    /// A connection is retired once it has served this many checkouts.
    pub max_usage_count: u32,
    /// A connection is retired once it has lived this many seconds,
    /// regardless of usage count.
    pub max_lifetime_seconds: u64,
    pub enable_rls: bool,
}

impl ConnectionConfig {
    #[must_use]
    pub fn new(connection_string: impl Into<String>) -> Self {
        Self {
            dialect: Dialect::Postgres,
            connection_string: connection_string.into(),
            max_pool_size: 20,
            connection_timeout_ms: 5000,
            max_usage_count: 10_000,
            max_lifetime_seconds: 3600,
            enable_rls: true,
        }
    }

    #[must_use]
    pub const fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    #[must_use]
    pub const fn with_max_pool_size(mut self, size: usize) -> Self {
        self.max_pool_size = size;
        self
    }

    #[must_use]
    pub const fn with_connection_timeout(mut self, timeout_ms: u64) -> Self {
        self.connection_timeout_ms = timeout_ms;
        self
    }

    #[must_use]
    pub const fn with_max_usage_count(mut self, count: u32) -> Self {
        self.max_usage_count = count;
        self
    }

    #[must_use]
    pub const fn with_max_lifetime(mut self, seconds: u64) -> Self {
        self.max_lifetime_seconds = seconds;
        self
    }

    #[must_use]
    pub const fn with_rls(mut self, enabled: bool) -> Self {
        self.enable_rls = enabled;
        self
    }

    pub fn validate(&self) -> Result<(), P8fsError> {
        if self.connection_string.trim().is_empty() {
            return Err(P8fsError::validation("connection string must not be empty"));
        }
        if self.max_pool_size == 0 || self.max_pool_size > 100 {
            return Err(P8fsError::validation("pool size must be in 1..=100"));
        }
        Ok(())
    }
}

impl From<&StorageConfig> for ConnectionConfig {
    fn from(cfg: &StorageConfig) -> Self {
        Self::new(cfg.connection_string.clone())
            .with_dialect(cfg.dialect)
            .with_max_pool_size(cfg.max_pool_size)
            .with_max_usage_count(cfg.max_usage_count)
            .with_max_lifetime(cfg.max_lifetime_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_connection_string() {
        assert!(ConnectionConfig::new("").validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_pool_size() {
        assert!(ConnectionConfig::new("postgres://x").with_max_pool_size(0).validate().is_err());
        assert!(ConnectionConfig::new("postgres://x").with_max_pool_size(101).validate().is_err());
    }

    #[test]
    fn builder_chain_sets_all_fields() {
        let cfg = ConnectionConfig::new("postgres://x")
            .with_max_pool_size(15)
            .with_connection_timeout(10_000)
            .with_rls(false);
        assert_eq!(cfg.max_pool_size, 15);
        assert_eq!(cfg.connection_timeout_ms, 10_000);
        assert!(!cfg.enable_rls);
    }
}
