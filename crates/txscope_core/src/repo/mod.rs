//! Repository layer: entity mapping contract and CRUD implementations.
//!
//! # Responsibility
//! - Define transaction-aware, use-case oriented data access contracts.
//! - Keep SQL assembly and row mapping inside the persistence boundary.
//!
//! # Invariants
//! - Write paths reject zero-value entities before any SQL is issued.
//! - Every operation resolves its connection through the context per call,
//!   never caching the transactional route on the repository instance.

pub mod crud;
pub mod entity;

use crate::repo::entity::ValidationError;
use crate::scopes::ScopeError;
use crate::transactor::TxError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository operation error.
#[derive(Debug)]
pub enum RepoError {
    /// Caller mistake detected before touching the store.
    Validation(ValidationError),
    /// A query-shaping scope rejected its input.
    Scope(ScopeError),
    /// Transaction lifecycle failure surfaced through a unit of work.
    Tx(TxError),
    /// The store failed while executing an operation.
    Query {
        entity: &'static str,
        operation: &'static str,
        source: rusqlite::Error,
    },
    /// A write targeted a row that does not exist.
    NotFound { entity: &'static str, id: i64 },
    /// A preload requested a relation the entity does not define.
    UnknownRelation {
        entity: &'static str,
        relation: String,
    },
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Scope(err) => write!(f, "{err}"),
            Self::Tx(err) => write!(f, "{err}"),
            Self::Query {
                entity,
                operation,
                source,
            } => write!(f, "error executing {operation} for {entity}: {source}"),
            Self::NotFound { entity, id } => write!(f, "{entity} row not found: id={id}"),
            Self::UnknownRelation { entity, relation } => {
                write!(f, "unknown relation `{relation}` for {entity}")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Scope(err) => Some(err),
            Self::Tx(err) => Some(err),
            Self::Query { source, .. } => Some(source),
            Self::NotFound { .. } | Self::UnknownRelation { .. } => None,
        }
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<ScopeError> for RepoError {
    fn from(value: ScopeError) -> Self {
        Self::Scope(value)
    }
}

impl From<TxError> for RepoError {
    fn from(value: TxError) -> Self {
        Self::Tx(value)
    }
}
