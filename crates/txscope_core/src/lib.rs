//! Context-scoped unit-of-work coordination over a generic record repository.
//!
//! A caller wraps a unit of work in [`Transactor::run_in_transaction`]; the
//! transactor attaches a transaction to a derived [`DbContext`] (or reuses one
//! already attached) and guarantees exactly one commit or rollback per begin,
//! including under panics. Repository operations resolve the transactional
//! route through the context on every call, so the same repository instance
//! serves transactional and non-transactional call sites.

pub mod context;
pub mod db;
pub mod logging;
pub mod repo;
pub mod scopes;
pub mod transactor;

pub use context::DbContext;
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status};
pub use repo::crud::{CrudRepository, Specification, SqliteCrudRepository};
pub use repo::entity::{Entity, ValidationError};
pub use repo::{RepoError, RepoResult};
pub use scopes::{
    default_order, for_update, order_by, paginate, time_range, time_range_clause,
    where_by_example, QueryBuilder, Scope, ScopeError, Timestamp,
};
pub use transactor::{Transactor, TxError};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
