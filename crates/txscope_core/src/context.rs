//! Transaction context carrier.
//!
//! # Responsibility
//! - Attach an optional open-transaction handle to an execution-scoped value.
//! - Let deep call chains discover the active transaction without threading an
//!   explicit handle through every signature.
//!
//! # Invariants
//! - At most one transaction handle is attached to a context at any time.
//! - Absence of a handle means "use the base connection"; presence means
//!   "route through the transaction".
//! - Deriving a child context never mutates the parent.

use rusqlite::Connection;
use std::cell::Cell;
use std::rc::Rc;

/// Lifecycle state of one open transaction.
///
/// The flag flips exactly once, on the first commit or rollback that reaches
/// the engine. Later rollback attempts on the same handle become no-ops, which
/// is what makes the deferred rollback in `run_in_transaction` safe to run
/// unconditionally.
#[derive(Debug, Default)]
pub(crate) struct TxState {
    finished: Cell<bool>,
}

impl TxState {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.finished.get()
    }

    pub(crate) fn finish(&self) {
        self.finished.set(true);
    }
}

/// Execution-scoped carrier for the base connection and, optionally, an open
/// transaction handle.
///
/// Cloning is cheap (a borrow plus an `Rc` bump), so callers pass contexts by
/// reference or value freely. The handle fields are private: only the
/// `Transactor` can attach a handle, so unrelated code cannot collide with or
/// forge transactional state.
#[derive(Debug, Clone)]
pub struct DbContext<'conn> {
    conn: &'conn Connection,
    tx: Option<Rc<TxState>>,
}

impl<'conn> DbContext<'conn> {
    /// Creates a root context with no transaction attached.
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn, tx: None }
    }

    /// Returns the connection this context is scoped to.
    ///
    /// While a transaction is active, statements on this connection execute
    /// inside it; SQLite scopes transactions to the connection itself.
    pub fn connection(&self) -> &'conn Connection {
        self.conn
    }

    /// Returns whether a live (not yet committed/rolled back) transaction is
    /// attached to this context.
    pub fn in_transaction(&self) -> bool {
        self.tx.as_ref().is_some_and(|state| !state.is_finished())
    }

    /// Derives a child context carrying the given transaction handle.
    pub(crate) fn with_transaction(&self, state: Rc<TxState>) -> Self {
        Self {
            conn: self.conn,
            tx: Some(state),
        }
    }

    /// Returns the attached transaction handle, finished or not.
    pub(crate) fn transaction(&self) -> Option<&Rc<TxState>> {
        self.tx.as_ref()
    }
}
