//! Generic CRUD repository over [`Entity`] types.
//!
//! # Responsibility
//! - Provide transaction-aware create/read/update/delete for any entity.
//! - Apply the query specification pipeline: filter-by-example, caller
//!   scopes, default ordering, locking, relation preload.
//!
//! # Invariants
//! - The transactional route is resolved through the context on every call.
//! - "No rows matched" is an empty vec / `None`, never an error.

use crate::context::DbContext;
use crate::repo::entity::{Entity, ValidationError};
use crate::repo::{RepoError, RepoResult};
use crate::scopes::{self, QueryBuilder, Scope};
use log::trace;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use std::marker::PhantomData;

/// Declarative query intent consumed by read operations.
///
/// `model` drives equality filter-by-example on its non-zero fields. Filtering
/// for an explicit `false`/`0`/empty string is unrepresentable through the
/// example; attach a hand-written entry in `scopes` for those cases.
pub struct Specification<T: Entity> {
    /// Example entity; non-zero fields become equality predicates.
    pub model: T,
    /// Relation names to eager-load, applied per row in order.
    pub preload_relations: Vec<String>,
    /// Whether to issue a locking read (`SELECT ... FOR UPDATE`).
    pub for_update: bool,
    /// Extra query transforms, applied in order between the example filter
    /// and the default ordering.
    pub scopes: Vec<Scope>,
}

impl<T: Entity> Default for Specification<T> {
    fn default() -> Self {
        Self {
            model: T::default(),
            preload_relations: Vec::new(),
            for_update: false,
            scopes: Vec::new(),
        }
    }
}

/// Generic CRUD contract for entities of type `T`.
pub trait CrudRepository<T: Entity> {
    /// Creates a new record, returning it with its server-assigned id.
    fn insert(&self, ctx: &DbContext<'_>, entity: T) -> RepoResult<T>;
    /// Retrieves all records matching the specification.
    fn find_all(&self, ctx: &DbContext<'_>, spec: Specification<T>) -> RepoResult<Vec<T>>;
    /// Retrieves the first record matching the specification, if any.
    fn find_first(&self, ctx: &DbContext<'_>, spec: Specification<T>) -> RepoResult<Option<T>>;
    /// Persists all fields of the given entity (full-row replace).
    fn update(&self, ctx: &DbContext<'_>, entity: T) -> RepoResult<T>;
    /// Permanently deletes the record (hard delete).
    fn delete(&self, ctx: &DbContext<'_>, entity: &T) -> RepoResult<()>;
    /// Inserts all records in one statement.
    fn batch_insert(&self, ctx: &DbContext<'_>, entities: Vec<T>) -> RepoResult<Vec<T>>;
}

/// SQLite-backed CRUD repository.
///
/// Holds only the immutable base connection; one instance serves both
/// transactional and non-transactional call sites.
pub struct SqliteCrudRepository<'conn, T: Entity> {
    conn: &'conn Connection,
    marker: PhantomData<fn() -> T>,
}

impl<'conn, T: Entity> SqliteCrudRepository<'conn, T> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self {
            conn,
            marker: PhantomData,
        }
    }

    /// Resolves the connection for one operation: the context's transaction
    /// when one is live, the base connection otherwise. Recomputed per call.
    fn resolve<'a>(&'a self, ctx: &'a DbContext<'_>) -> &'a Connection {
        if ctx.in_transaction() {
            trace!("event=repo_resolve entity={} route=transaction", T::TABLE);
            ctx.connection()
        } else {
            trace!("event=repo_resolve entity={} route=base", T::TABLE);
            self.conn
        }
    }

    fn select_builder(&self, spec: &Specification<T>) -> QueryBuilder {
        let mut projection: Vec<&str> = Vec::with_capacity(T::columns().len() + 1);
        projection.push("id");
        projection.extend_from_slice(T::columns());

        let mut builder = QueryBuilder::select(T::TABLE, &projection)
            .apply(&scopes::where_by_example(example_pairs(&spec.model)));
        for scope in &spec.scopes {
            builder = builder.apply(scope);
        }
        builder
            .apply(&scopes::default_order())
            .apply(&scopes::for_update(spec.for_update))
    }

    fn preload(&self, conn: &Connection, entity: &mut T, relations: &[String]) -> RepoResult<()> {
        for relation in relations {
            entity.load_relation(conn, relation)?;
        }
        Ok(())
    }
}

impl<T: Entity> CrudRepository<T> for SqliteCrudRepository<'_, T> {
    fn insert(&self, ctx: &DbContext<'_>, mut entity: T) -> RepoResult<T> {
        if entity.is_zero() {
            return Err(ValidationError::ZeroEntity { entity: T::TABLE }.into());
        }

        let conn = self.resolve(ctx);
        let mut columns: Vec<&str> = T::columns().to_vec();
        let mut values = entity.values();

        // Caller-provided identity is persisted as-is; otherwise the engine
        // assigns the rowid and it is written back below.
        let caller_id = entity.id();
        if let Some(id) = caller_id {
            columns.push("id");
            values.push(Value::Integer(id));
        }

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            T::TABLE,
            columns.join(", "),
            placeholders(columns.len()),
        );
        conn.execute(&sql, params_from_iter(values))
            .map_err(query_error::<T>("insert"))?;

        if caller_id.is_none() {
            entity.set_id(conn.last_insert_rowid());
        }
        Ok(entity)
    }

    fn find_all(&self, ctx: &DbContext<'_>, spec: Specification<T>) -> RepoResult<Vec<T>> {
        let conn = self.resolve(ctx);
        let (sql, params) = self.select_builder(&spec).build()?;

        let mut stmt = conn.prepare(&sql).map_err(query_error::<T>("find_all"))?;
        let mut rows = stmt
            .query(params_from_iter(params))
            .map_err(query_error::<T>("find_all"))?;

        let mut entities = Vec::new();
        while let Some(row) = rows.next().map_err(query_error::<T>("find_all"))? {
            entities.push(T::from_row(row).map_err(query_error::<T>("find_all"))?);
        }

        for entity in &mut entities {
            self.preload(conn, entity, &spec.preload_relations)?;
        }
        Ok(entities)
    }

    fn find_first(&self, ctx: &DbContext<'_>, spec: Specification<T>) -> RepoResult<Option<T>> {
        let conn = self.resolve(ctx);
        let (sql, params) = self
            .select_builder(&spec)
            .apply(&scopes::paginate(1, 1))
            .build()?;

        let mut stmt = conn.prepare(&sql).map_err(query_error::<T>("find_first"))?;
        let mut rows = stmt
            .query(params_from_iter(params))
            .map_err(query_error::<T>("find_first"))?;

        let Some(row) = rows.next().map_err(query_error::<T>("find_first"))? else {
            // No match is a valid outcome for this primitive, not an error.
            return Ok(None);
        };

        let mut entity = T::from_row(row).map_err(query_error::<T>("find_first"))?;
        self.preload(conn, &mut entity, &spec.preload_relations)?;
        Ok(Some(entity))
    }

    fn update(&self, ctx: &DbContext<'_>, entity: T) -> RepoResult<T> {
        if entity.is_zero() {
            return Err(ValidationError::ZeroEntity { entity: T::TABLE }.into());
        }
        let Some(id) = entity.id() else {
            return Err(ValidationError::MissingId { entity: T::TABLE }.into());
        };

        let conn = self.resolve(ctx);
        let assignments = T::columns()
            .iter()
            .map(|column| format!("{column} = ?"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("UPDATE {} SET {} WHERE id = ?", T::TABLE, assignments);

        let mut params = entity.values();
        params.push(Value::Integer(id));

        let changed = conn
            .execute(&sql, params_from_iter(params))
            .map_err(query_error::<T>("update"))?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: T::TABLE,
                id,
            });
        }
        Ok(entity)
    }

    fn delete(&self, ctx: &DbContext<'_>, entity: &T) -> RepoResult<()> {
        if entity.is_zero() {
            return Err(ValidationError::ZeroEntity { entity: T::TABLE }.into());
        }
        let Some(id) = entity.id() else {
            return Err(ValidationError::MissingId { entity: T::TABLE }.into());
        };

        let conn = self.resolve(ctx);
        let sql = format!("DELETE FROM {} WHERE id = ?", T::TABLE);
        let changed = conn
            .execute(&sql, [Value::Integer(id)])
            .map_err(query_error::<T>("delete"))?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: T::TABLE,
                id,
            });
        }
        Ok(())
    }

    fn batch_insert(&self, ctx: &DbContext<'_>, mut entities: Vec<T>) -> RepoResult<Vec<T>> {
        if entities.is_empty() {
            return Err(ValidationError::EmptyBatch { entity: T::TABLE }.into());
        }

        let conn = self.resolve(ctx);
        let columns = T::columns();
        let row = format!("({})", placeholders(columns.len()));
        let sql = format!(
            "INSERT INTO {} ({}) VALUES {}",
            T::TABLE,
            columns.join(", "),
            vec![row; entities.len()].join(", "),
        );

        let mut params = Vec::with_capacity(entities.len() * columns.len());
        for entity in &entities {
            params.extend(entity.values());
        }
        conn.execute(&sql, params_from_iter(params))
            .map_err(query_error::<T>("batch_insert"))?;

        // One multi-row INSERT assigns a contiguous rowid range ending at
        // last_insert_rowid.
        let first_id = conn.last_insert_rowid() - entities.len() as i64 + 1;
        for (index, entity) in entities.iter_mut().enumerate() {
            entity.set_id(first_id + index as i64);
        }
        Ok(entities)
    }
}

fn example_pairs<T: Entity>(model: &T) -> Vec<(&'static str, Value)> {
    let mut pairs: Vec<(&'static str, Value)> = T::columns()
        .iter()
        .copied()
        .zip(model.values())
        .collect();
    if let Some(id) = model.id() {
        pairs.push(("id", Value::Integer(id)));
    }
    pairs
}

fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

fn query_error<T: Entity>(operation: &'static str) -> impl FnOnce(rusqlite::Error) -> RepoError {
    move |source| RepoError::Query {
        entity: T::TABLE,
        operation,
        source,
    }
}
