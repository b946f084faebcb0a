//! Context-scoped transaction coordinator.
//!
//! # Responsibility
//! - Open, commit and roll back transactions bound into a [`DbContext`].
//! - Run caller units of work with exactly-once commit/rollback per begin.
//!
//! # Invariants
//! - Every `begin` is closed by exactly one effective commit or rollback.
//! - `run_in_transaction` on a context that already carries a live transaction
//!   is pass-through: commit/rollback authority stays with the outermost call.
//! - Rollback failures are logged, never returned, so they cannot mask the
//!   error that triggered the rollback.

use crate::context::{DbContext, TxState};
use log::{debug, error, warn};
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::rc::Rc;

/// Transaction lifecycle error.
#[derive(Debug)]
pub enum TxError {
    /// The engine refused to start a transaction.
    Begin(rusqlite::Error),
    /// The engine refused to commit the transaction.
    Commit(rusqlite::Error),
    /// `begin` was called on a context that already carries a live transaction.
    AlreadyActive,
}

impl Display for TxError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Begin(err) => write!(f, "error starting transaction: {err}"),
            Self::Commit(err) => write!(f, "error committing transaction: {err}"),
            Self::AlreadyActive => write!(f, "context already carries an active transaction"),
        }
    }
}

impl Error for TxError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Begin(err) | Self::Commit(err) => Some(err),
            Self::AlreadyActive => None,
        }
    }
}

/// Coordinates database transactions attached to [`DbContext`] values.
///
/// Holds only an immutable reference to the base connection; every piece of
/// transactional state lives in the per-call context, so one `Transactor` can
/// be reused across any number of sequential units of work.
pub struct Transactor<'conn> {
    conn: &'conn Connection,
}

impl<'conn> Transactor<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Creates a root context scoped to this transactor's connection.
    pub fn context(&self) -> DbContext<'conn> {
        DbContext::new(self.conn)
    }

    /// Starts a new transaction and returns a derived context carrying it.
    ///
    /// # Errors
    /// - [`TxError::AlreadyActive`] when `ctx` already carries a live
    ///   transaction. Callers that want reuse-if-open semantics should go
    ///   through [`Transactor::run_in_transaction`] instead.
    /// - [`TxError::Begin`] when the engine cannot start a transaction.
    pub fn begin<'c>(&self, ctx: &DbContext<'c>) -> Result<DbContext<'c>, TxError> {
        if ctx.in_transaction() {
            return Err(TxError::AlreadyActive);
        }

        ctx.connection()
            .execute_batch("BEGIN DEFERRED")
            .map_err(TxError::Begin)?;

        debug!("event=tx_begin module=transactor status=ok");
        Ok(ctx.with_transaction(Rc::new(TxState::new())))
    }

    /// Commits the transaction carried by `ctx`.
    ///
    /// A context without a transaction is a successful no-op, so callers that
    /// may or may not be inside a unit of work can commit unconditionally. A
    /// handle that is already finished is also a no-op.
    pub fn commit(&self, ctx: &DbContext<'_>) -> Result<(), TxError> {
        let Some(state) = ctx.transaction() else {
            debug!("event=tx_commit module=transactor status=skipped reason=no_transaction");
            return Ok(());
        };

        if state.is_finished() {
            warn!("event=tx_commit module=transactor status=skipped reason=already_finished");
            return Ok(());
        }

        // On commit failure the handle stays unfinished so a deferred
        // rollback can still close the transaction.
        ctx.connection()
            .execute_batch("COMMIT")
            .map_err(TxError::Commit)?;
        state.finish();

        debug!("event=tx_commit module=transactor status=ok");
        Ok(())
    }

    /// Rolls back the transaction carried by `ctx`.
    ///
    /// Idempotent and infallible by contract: a missing handle, a handle
    /// already committed or rolled back, and the engine's "no transaction is
    /// active" response are all tolerated. Any other engine failure is logged
    /// and swallowed.
    pub fn rollback(&self, ctx: &DbContext<'_>) {
        let Some(state) = ctx.transaction() else {
            warn!("event=tx_rollback module=transactor status=skipped reason=no_transaction");
            return;
        };

        if state.is_finished() {
            return;
        }

        match ctx.connection().execute_batch("ROLLBACK") {
            Ok(()) => {
                state.finish();
                debug!("event=tx_rollback module=transactor status=ok");
            }
            Err(err) if is_already_finished(&err) => {
                state.finish();
            }
            Err(err) => {
                error!("event=tx_rollback module=transactor status=error error={err}");
            }
        }
    }

    /// Runs `f` inside a transaction, committing on success and rolling back
    /// on error or panic.
    ///
    /// When `ctx` already carries a live transaction, `f` is executed directly
    /// against the same context and no second transaction is opened; the
    /// outermost caller keeps sole commit/rollback authority. This makes a
    /// service function that always wraps itself in `run_in_transaction`
    /// composable from both transactional and non-transactional call sites.
    ///
    /// Panics inside `f` are not caught: the rollback guard closes the
    /// transaction, then the panic continues unwinding.
    pub fn run_in_transaction<T, E, F>(&self, ctx: &DbContext<'_>, f: F) -> Result<T, E>
    where
        F: FnOnce(&DbContext<'_>) -> Result<T, E>,
        E: From<TxError>,
    {
        if ctx.in_transaction() {
            debug!("event=tx_reuse module=transactor status=ok");
            return f(ctx);
        }

        let tx_ctx = self.begin(ctx).map_err(E::from)?;
        let _guard = RollbackGuard {
            transactor: self,
            ctx: &tx_ctx,
        };

        let value = f(&tx_ctx)?;
        self.commit(&tx_ctx).map_err(E::from)?;
        Ok(value)
    }
}

/// Closes the transaction on every exit path of `run_in_transaction`.
///
/// After a successful commit the handle is finished and the rollback is a
/// no-op; on error return or panic the rollback fires for real.
struct RollbackGuard<'a, 'conn, 'c> {
    transactor: &'a Transactor<'conn>,
    ctx: &'a DbContext<'c>,
}

impl Drop for RollbackGuard<'_, '_, '_> {
    fn drop(&mut self) {
        self.transactor.rollback(self.ctx);
    }
}

fn is_already_finished(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(_, Some(message))
            if message.contains("no transaction is active")
    )
}
