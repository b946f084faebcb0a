//! Composable query-shaping scopes.
//!
//! # Responsibility
//! - Accumulate WHERE/ORDER BY/LIMIT/locking state into a [`QueryBuilder`].
//! - Keep each scope an independent transform so call sites decide ordering.
//!
//! # Invariants
//! - Scopes never execute SQL; they only shape the statement text and params.
//! - `order_by` is the single place untrusted input can reach raw SQL text,
//!   and its allow-list check is the safeguard against injection.
//! - The first scope error wins and surfaces at build time; later scopes do
//!   not overwrite it.

use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Epoch milliseconds. `0` is the explicit "no bound" sentinel for time-range
/// filtering, mirroring the zero-value convention used across entity fields.
pub type Timestamp = i64;

/// One composable query transform.
pub type Scope = Box<dyn Fn(QueryBuilder) -> QueryBuilder>;

static FIELD_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.]+$").expect("field name pattern must compile"));

/// Query-shaping error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScopeError {
    /// A field name failed the allow-list check and was never interpolated.
    InvalidFieldName(String),
}

impl Display for ScopeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidFieldName(field) => write!(f, "invalid field name: {field}"),
        }
    }
}

impl Error for ScopeError {}

/// Ordered accumulation of SELECT statement state.
///
/// Built by the repository, transformed by scopes, rendered once via
/// [`QueryBuilder::build`].
#[derive(Debug)]
pub struct QueryBuilder {
    table: &'static str,
    projection: String,
    wheres: Vec<String>,
    params: Vec<Value>,
    orders: Vec<String>,
    limit: Option<i64>,
    offset: i64,
    locked: bool,
    error: Option<ScopeError>,
}

impl QueryBuilder {
    /// Starts a SELECT over `table` with the given projection columns.
    pub fn select(table: &'static str, columns: &[&str]) -> Self {
        Self {
            table,
            projection: columns.join(", "),
            wheres: Vec::new(),
            params: Vec::new(),
            orders: Vec::new(),
            limit: None,
            offset: 0,
            locked: false,
            error: None,
        }
    }

    /// Applies one scope to this builder.
    pub fn apply(self, scope: &Scope) -> Self {
        scope(self)
    }

    pub(crate) fn push_where(mut self, clause: String, params: Vec<Value>) -> Self {
        self.wheres.push(clause);
        self.params.extend(params);
        self
    }

    pub(crate) fn push_order(mut self, term: String) -> Self {
        self.orders.push(term);
        self
    }

    pub(crate) fn set_limit(mut self, limit: i64, offset: i64) -> Self {
        self.limit = Some(limit);
        self.offset = offset;
        self
    }

    pub(crate) fn set_locked(mut self, locked: bool) -> Self {
        self.locked = locked;
        self
    }

    pub(crate) fn set_error(mut self, error: ScopeError) -> Self {
        if self.error.is_none() {
            self.error = Some(error);
        }
        self
    }

    /// Renders the statement text and its positional parameters.
    ///
    /// # Errors
    /// Returns the first error recorded by any applied scope; the statement is
    /// never rendered in that case.
    pub fn build(self) -> Result<(String, Vec<Value>), ScopeError> {
        if let Some(error) = self.error {
            return Err(error);
        }

        let mut sql = format!("SELECT {} FROM {}", self.projection, self.table);

        if !self.wheres.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.wheres.join(" AND "));
        }

        if !self.orders.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.orders.join(", "));
        }

        match self.limit {
            Some(limit) => {
                sql.push_str(&format!(" LIMIT {limit}"));
                if self.offset > 0 {
                    sql.push_str(&format!(" OFFSET {}", self.offset));
                }
            }
            // LIMIT -1 keeps the result unbounded when only an offset is set.
            None if self.offset > 0 => {
                sql.push_str(&format!(" LIMIT -1 OFFSET {}", self.offset));
            }
            None => {}
        }

        if self.locked {
            sql.push_str(" FOR UPDATE");
        }

        Ok((sql, self.params))
    }
}

/// Equality filters for every pair whose value differs from its zero value.
///
/// `NULL`, `0`, `0.0`, `""` and the empty blob all read as "field not set", so
/// filtering for those exact values is unrepresentable through this scope.
/// Callers that need them attach a hand-written scope instead.
pub fn where_by_example(pairs: Vec<(&'static str, Value)>) -> Scope {
    Box::new(move |mut builder| {
        for (column, value) in &pairs {
            if is_zero_value(value) {
                continue;
            }
            builder = builder.push_where(format!("{column} = ?"), vec![value.clone()]);
        }
        builder
    })
}

/// Orders by `field`, ascending or descending.
///
/// The field name is checked against an allow-list pattern (letters, digits,
/// underscore, dot) before interpolation. A rejected name records a
/// [`ScopeError::InvalidFieldName`] on the builder and applies no ordering.
pub fn order_by(field: &str, ascending: bool) -> Scope {
    let field = field.to_string();
    Box::new(move |builder| {
        if !is_valid_field_name(&field) {
            return builder.set_error(ScopeError::InvalidFieldName(field.clone()));
        }
        let direction = if ascending { "ASC" } else { "DESC" };
        builder.push_order(format!("{field} {direction}"))
    })
}

/// Deterministic default ordering: newest rows first.
pub fn default_order() -> Scope {
    Box::new(|builder| builder.push_order("id DESC".to_string()))
}

/// Limits results to one page.
///
/// Pages below 1 clamp to 1; the offset is `(page - 1) * limit`. No upper
/// bound is enforced on `limit`.
pub fn paginate(page: i64, limit: i64) -> Scope {
    Box::new(move |builder| {
        let page = page.max(1);
        builder.set_limit(limit, (page - 1) * limit)
    })
}

/// Toggles a `FOR UPDATE` locking clause on the built statement.
///
/// Whether the engine honors the clause is up to the store driver; engines
/// without locking reads reject the statement as a query error.
pub fn for_update(enabled: bool) -> Scope {
    Box::new(move |builder| builder.set_locked(enabled))
}

/// Restricts `column` to the given time range; `0` bounds are open ends.
pub fn time_range(column: &'static str, start: Timestamp, end: Timestamp) -> Scope {
    Box::new(move |builder| {
        let (clause, params) = time_range_clause(column, start, end);
        if clause.is_empty() {
            return builder;
        }
        builder.push_where(clause, params)
    })
}

/// Renders a time-range WHERE clause for `column`.
///
/// - both bounds zero: empty clause, no parameters
/// - start only: `column >= ?`
/// - end only: `column <= ?`
/// - both: `column BETWEEN ? AND ?`
pub fn time_range_clause(
    column: &str,
    start: Timestamp,
    end: Timestamp,
) -> (String, Vec<Value>) {
    match (start, end) {
        (0, 0) => (String::new(), Vec::new()),
        (start, 0) => (format!("{column} >= ?"), vec![Value::Integer(start)]),
        (0, end) => (format!("{column} <= ?"), vec![Value::Integer(end)]),
        (start, end) => (
            format!("{column} BETWEEN ? AND ?"),
            vec![Value::Integer(start), Value::Integer(end)],
        ),
    }
}

/// Returns whether `value` is the SQL rendition of a zero value.
pub(crate) fn is_zero_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Integer(n) => *n == 0,
        Value::Real(r) => *r == 0.0,
        Value::Text(text) => text.is_empty(),
        Value::Blob(bytes) => bytes.is_empty(),
    }
}

fn is_valid_field_name(field: &str) -> bool {
    FIELD_NAME_RE.is_match(field)
}

#[cfg(test)]
mod tests {
    use super::{
        default_order, for_update, is_valid_field_name, is_zero_value, order_by, paginate,
        time_range_clause, where_by_example, QueryBuilder, ScopeError,
    };
    use rusqlite::types::Value;

    fn builder() -> QueryBuilder {
        QueryBuilder::select("people", &["id", "name", "age"])
    }

    #[test]
    fn bare_builder_renders_plain_select() {
        let (sql, params) = builder().build().expect("plain select should build");
        assert_eq!(sql, "SELECT id, name, age FROM people");
        assert!(params.is_empty());
    }

    #[test]
    fn time_range_clause_covers_all_bound_combinations() {
        let (clause, params) = time_range_clause("created_at", 0, 0);
        assert!(clause.is_empty());
        assert!(params.is_empty());

        let (clause, params) = time_range_clause("created_at", 100, 0);
        assert_eq!(clause, "created_at >= ?");
        assert_eq!(params, vec![Value::Integer(100)]);

        let (clause, params) = time_range_clause("created_at", 0, 200);
        assert_eq!(clause, "created_at <= ?");
        assert_eq!(params, vec![Value::Integer(200)]);

        let (clause, params) = time_range_clause("created_at", 100, 200);
        assert_eq!(clause, "created_at BETWEEN ? AND ?");
        assert_eq!(params, vec![Value::Integer(100), Value::Integer(200)]);
    }

    #[test]
    fn time_range_clause_accepts_qualified_columns() {
        let (clause, _) = time_range_clause("people.created_at", 1, 2);
        assert_eq!(clause, "people.created_at BETWEEN ? AND ?");
    }

    #[test]
    fn order_by_rejects_injection_attempts_and_applies_no_ordering() {
        let result = builder().apply(&order_by("name; DROP TABLE x", true)).build();
        match result {
            Err(ScopeError::InvalidFieldName(field)) => {
                assert_eq!(field, "name; DROP TABLE x");
            }
            other => panic!("expected invalid field name error, got {other:?}"),
        }
    }

    #[test]
    fn order_by_allows_qualified_field_names() {
        let (sql, _) = builder()
            .apply(&order_by("people.age", true))
            .build()
            .expect("qualified field should be accepted");
        assert!(sql.ends_with("ORDER BY people.age ASC"));
    }

    #[test]
    fn first_scope_error_is_retained() {
        let result = builder()
            .apply(&order_by("bad name", true))
            .apply(&order_by("also;bad", false))
            .build();
        assert_eq!(
            result.expect_err("build should fail"),
            ScopeError::InvalidFieldName("bad name".to_string())
        );
    }

    #[test]
    fn paginate_clamps_pages_below_one() {
        for page in [0, -3, 1] {
            let (sql, _) = builder()
                .apply(&paginate(page, 10))
                .build()
                .expect("paginated select should build");
            assert!(sql.ends_with("LIMIT 10"), "page {page} produced: {sql}");
        }

        let (sql, _) = builder()
            .apply(&paginate(3, 10))
            .build()
            .expect("paginated select should build");
        assert!(sql.ends_with("LIMIT 10 OFFSET 20"));
    }

    #[test]
    fn for_update_appends_locking_clause_only_when_enabled() {
        let (sql, _) = builder().apply(&for_update(true)).build().unwrap();
        assert!(sql.ends_with(" FOR UPDATE"));

        let (sql, _) = builder().apply(&for_update(false)).build().unwrap();
        assert!(!sql.contains("FOR UPDATE"));
    }

    #[test]
    fn where_by_example_skips_zero_values() {
        let pairs = vec![
            ("name", Value::Text("ada".to_string())),
            ("age", Value::Integer(0)),
            ("note", Value::Text(String::new())),
            ("score", Value::Null),
        ];
        let (sql, params) = builder().apply(&where_by_example(pairs)).build().unwrap();
        assert_eq!(sql, "SELECT id, name, age FROM people WHERE name = ?");
        assert_eq!(params, vec![Value::Text("ada".to_string())]);
    }

    #[test]
    fn caller_order_precedes_default_order() {
        let (sql, _) = builder()
            .apply(&order_by("age", true))
            .apply(&default_order())
            .build()
            .unwrap();
        assert!(sql.ends_with("ORDER BY age ASC, id DESC"));
    }

    #[test]
    fn zero_value_detection_matches_sql_zero_renditions() {
        assert!(is_zero_value(&Value::Null));
        assert!(is_zero_value(&Value::Integer(0)));
        assert!(is_zero_value(&Value::Real(0.0)));
        assert!(is_zero_value(&Value::Text(String::new())));
        assert!(is_zero_value(&Value::Blob(Vec::new())));

        assert!(!is_zero_value(&Value::Integer(7)));
        assert!(!is_zero_value(&Value::Text("x".to_string())));
    }

    #[test]
    fn field_name_allow_list_accepts_identifier_characters_only() {
        assert!(is_valid_field_name("created_at"));
        assert!(is_valid_field_name("users.created_at"));
        assert!(!is_valid_field_name(""));
        assert!(!is_valid_field_name("name "));
        assert!(!is_valid_field_name("name--"));
    }
}
