//! Entity persistence contract.
//!
//! # Responsibility
//! - Describe how a record type maps onto one table with an integer id.
//! - Supply the explicit zero-value predicate used by write validation.
//!
//! # Invariants
//! - `columns()` and `values()` stay aligned index by index.
//! - The id column is named `id` and is server-assigned on insert unless the
//!   caller provides one.

use crate::repo::{RepoError, RepoResult};
use rusqlite::types::Value;
use rusqlite::{Connection, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Caller mistake rejected before any query is issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    /// A write operation received the zero value of its entity type.
    ZeroEntity { entity: &'static str },
    /// `batch_insert` received an empty list.
    EmptyBatch { entity: &'static str },
    /// An update or delete received an entity without an id.
    MissingId { entity: &'static str },
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ZeroEntity { entity } => write!(f, "{entity} entity cannot be zero value"),
            Self::EmptyBatch { entity } => write!(f, "{entity} batch cannot be empty"),
            Self::MissingId { entity } => write!(f, "{entity} entity has no id"),
        }
    }
}

impl Error for ValidationError {}

/// Mapping contract between a record type and its table.
///
/// `Default` doubles as the zero value: `is_zero` must return `true` for
/// `Self::default()` and for nothing a caller could meaningfully persist.
pub trait Entity: Default {
    /// Table this entity persists to.
    const TABLE: &'static str;

    /// Data columns, excluding the `id` primary key.
    fn columns() -> &'static [&'static str];

    /// Column values in the same order as [`Entity::columns`].
    fn values(&self) -> Vec<Value>;

    /// Maps a full row (`id` first, then data columns) back into an entity.
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;

    /// Server-assigned identity, when present.
    fn id(&self) -> Option<i64>;

    fn set_id(&mut self, id: i64);

    /// The explicit "is this the default/empty instance" predicate.
    fn is_zero(&self) -> bool;

    /// Loads one named relation into this entity.
    ///
    /// Called once per requested relation after the row itself is mapped.
    /// Entities without relations keep the default, which rejects every name.
    fn load_relation(&mut self, _conn: &Connection, relation: &str) -> RepoResult<()> {
        Err(RepoError::UnknownRelation {
            entity: Self::TABLE,
            relation: relation.to_string(),
        })
    }
}
