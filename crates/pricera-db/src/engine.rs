//! # Query Engine
//!
//! Shared plumbing underneath every repository: dynamic-SQL identifier
//! validation, typed bind arguments, pagination, and the generic fetch
//! helpers the uniform repository contract is built from.
//!
//! ## Dynamic SQL
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │              Two-Gate Rule for Dynamic SQL                              │
//! │                                                                         │
//! │  table / attribute names ──► validate_identifier() ──► format!()       │
//! │  values                  ──► Arg ──────────────────► .bind(?)          │
//! │                                                                         │
//! │  Identifiers can only be interpolated after passing the charset gate;  │
//! │  values never touch the SQL string at all.                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Sqlite, SqliteConnection};

use crate::error::{DbError, DbResult};

// =============================================================================
// Identifier validation
// =============================================================================

/// Gate for table and column names that end up interpolated into SQL.
///
/// Accepts `[A-Za-z_][A-Za-z0-9_]*` only; anything else is rejected as
/// [`DbError::InvalidAttribute`] before any query string is built.
pub(crate) fn validate_identifier(name: &str) -> DbResult<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(DbError::InvalidAttribute(name.to_string()))
    }
}

// =============================================================================
// Bind arguments
// =============================================================================

/// A typed value headed for a `?` placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Int(i64),
    Real(f64),
    Text(String),
    Bool(bool),
    Null,
}

impl From<i64> for Arg {
    fn from(v: i64) -> Self {
        Arg::Int(v)
    }
}

impl From<f64> for Arg {
    fn from(v: f64) -> Self {
        Arg::Real(v)
    }
}

impl From<&str> for Arg {
    fn from(v: &str) -> Self {
        Arg::Text(v.to_string())
    }
}

impl From<String> for Arg {
    fn from(v: String) -> Self {
        Arg::Text(v)
    }
}

impl From<bool> for Arg {
    fn from(v: bool) -> Self {
        Arg::Bool(v)
    }
}

pub(crate) fn bind_arg<'q, O>(
    query: sqlx::query::QueryAs<'q, Sqlite, O, SqliteArguments<'q>>,
    arg: Arg,
) -> sqlx::query::QueryAs<'q, Sqlite, O, SqliteArguments<'q>> {
    match arg {
        Arg::Int(v) => query.bind(v),
        Arg::Real(v) => query.bind(v),
        Arg::Text(v) => query.bind(v),
        Arg::Bool(v) => query.bind(v),
        Arg::Null => query.bind(None::<i64>),
    }
}

pub(crate) fn bind_arg_scalar<'q, O>(
    query: sqlx::query::QueryScalar<'q, Sqlite, O, SqliteArguments<'q>>,
    arg: Arg,
) -> sqlx::query::QueryScalar<'q, Sqlite, O, SqliteArguments<'q>> {
    match arg {
        Arg::Int(v) => query.bind(v),
        Arg::Real(v) => query.bind(v),
        Arg::Text(v) => query.bind(v),
        Arg::Bool(v) => query.bind(v),
        Arg::Null => query.bind(None::<i64>),
    }
}

// =============================================================================
// Pagination
// =============================================================================

/// 1-based page request. Out-of-range values are clamped by [`Page::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    page: u32,
    per_page: u32,
}

impl Page {
    pub const DEFAULT_PER_PAGE: u32 = 10;
    pub const MAX_PER_PAGE: u32 = 500;

    pub fn new(page: u32, per_page: u32) -> Self {
        Page {
            page: page.max(1),
            per_page: per_page.clamp(1, Self::MAX_PER_PAGE),
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.per_page)
    }
}

impl Default for Page {
    fn default() -> Self {
        Page::new(1, Self::DEFAULT_PER_PAGE)
    }
}

/// How equality criteria in a [`FindQuery`] combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Join {
    #[default]
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    fn sql(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

/// A caller-shaped listing: equality criteria, ordering, and a page window.
///
/// The default query lists everything in id order, ten rows per page.
/// Criteria column names pass the identifier gate like any other dynamic
/// identifier; values are bound.
#[derive(Debug, Clone, Default)]
pub struct FindQuery {
    pub page: Page,
    pub filter: Vec<(String, Arg)>,
    pub join: Join,
    pub order: Option<(String, Direction)>,
}

impl FindQuery {
    pub fn page(mut self, page: Page) -> Self {
        self.page = page;
        self
    }

    pub fn filter(mut self, column: impl Into<String>, value: impl Into<Arg>) -> Self {
        self.filter.push((column.into(), value.into()));
        self
    }

    pub fn join(mut self, join: Join) -> Self {
        self.join = join;
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, direction: Direction) -> Self {
        self.order = Some((column.into(), direction));
        self
    }
}

/// One page of rows plus the total for the query's filter.
#[derive(Debug, Clone)]
pub struct Paginated<T> {
    pub rows: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub per_page: u32,
}

impl<T> Paginated<T> {
    pub fn total_pages(&self) -> u32 {
        if self.total <= 0 {
            return 0;
        }
        ((self.total as u64).div_ceil(u64::from(self.per_page))) as u32
    }
}

// =============================================================================
// Generic fetch helpers
// =============================================================================

/// Row types the generic helpers can materialize.
pub(crate) trait Row: for<'r> sqlx::FromRow<'r, SqliteRow> + Send + Unpin {}
impl<T> Row for T where T: for<'r> sqlx::FromRow<'r, SqliteRow> + Send + Unpin {}

/// `deleted = 0` predicate for tables that soft-delete, empty otherwise.
fn liveness(soft_delete: bool) -> &'static str {
    if soft_delete {
        " AND deleted = 0"
    } else {
        ""
    }
}

pub(crate) async fn fetch_by_attribute<T: Row>(
    conn: &mut SqliteConnection,
    table: &str,
    attribute: &str,
    value: Arg,
    soft_delete: bool,
) -> DbResult<Option<T>> {
    validate_identifier(table)?;
    validate_identifier(attribute)?;

    let sql = format!(
        "SELECT * FROM {table} WHERE {attribute} = ?{}",
        liveness(soft_delete)
    );
    let row = bind_arg(sqlx::query_as::<_, T>(&sql), value)
        .fetch_optional(conn)
        .await?;
    Ok(row)
}

/// Case-insensitive substring match on a text attribute.
pub(crate) async fn fetch_by_like<T: Row>(
    conn: &mut SqliteConnection,
    table: &str,
    attribute: &str,
    needle: &str,
    soft_delete: bool,
) -> DbResult<Vec<T>> {
    validate_identifier(table)?;
    validate_identifier(attribute)?;

    let sql = format!(
        "SELECT * FROM {table} WHERE {attribute} LIKE ? ESCAPE '\\'{} ORDER BY id",
        liveness(soft_delete)
    );
    let pattern = format!("%{}%", escape_like(needle));
    let rows = sqlx::query_as::<_, T>(&sql)
        .bind(pattern)
        .fetch_all(conn)
        .await?;
    Ok(rows)
}

pub(crate) async fn fetch_many_by_attribute<T: Row>(
    conn: &mut SqliteConnection,
    table: &str,
    attribute: &str,
    value: Arg,
    soft_delete: bool,
) -> DbResult<Vec<T>> {
    validate_identifier(table)?;
    validate_identifier(attribute)?;

    let sql = format!(
        "SELECT * FROM {table} WHERE {attribute} = ?{} ORDER BY id",
        liveness(soft_delete)
    );
    let rows = bind_arg(sqlx::query_as::<_, T>(&sql), value)
        .fetch_all(conn)
        .await?;
    Ok(rows)
}

pub(crate) async fn fetch_page<T: Row>(
    conn: &mut SqliteConnection,
    table: &str,
    soft_delete: bool,
    query: FindQuery,
) -> DbResult<Paginated<T>> {
    validate_identifier(table)?;
    for (column, _) in &query.filter {
        validate_identifier(column)?;
    }

    let joiner = match query.join {
        Join::And => " AND ",
        Join::Or => " OR ",
    };
    let filter_sql = query
        .filter
        .iter()
        .map(|(column, _)| format!("{column} = ?"))
        .collect::<Vec<_>>()
        .join(joiner);

    // The liveness predicate always ANDs over the caller's criteria, even
    // when those are OR-joined
    let mut predicates = Vec::new();
    if !filter_sql.is_empty() {
        predicates.push(format!("({filter_sql})"));
    }
    if soft_delete {
        predicates.push("deleted = 0".to_string());
    }
    let where_clause = if predicates.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", predicates.join(" AND "))
    };

    let (order_column, direction) = match &query.order {
        Some((column, direction)) => {
            validate_identifier(column)?;
            (column.as_str(), *direction)
        }
        None => ("id", Direction::Asc),
    };

    let count_sql = format!("SELECT COUNT(*) FROM {table}{where_clause}");
    let mut count = sqlx::query_scalar::<_, i64>(&count_sql);
    for (_, arg) in &query.filter {
        count = bind_arg_scalar(count, arg.clone());
    }
    let total = count.fetch_one(&mut *conn).await?;

    let page = query.page;
    let sql = format!(
        "SELECT * FROM {table}{where_clause} ORDER BY {order_column} {} LIMIT ? OFFSET ?",
        direction.sql()
    );
    let mut rows_query = sqlx::query_as::<_, T>(&sql);
    for (_, arg) in query.filter {
        rows_query = bind_arg(rows_query, arg);
    }
    let rows = rows_query
        .bind(i64::from(page.per_page()))
        .bind(page.offset())
        .fetch_all(conn)
        .await?;

    Ok(Paginated {
        rows,
        total,
        page: page.page(),
        per_page: page.per_page(),
    })
}

/// Count of rows matching `attribute = value`, excluding `exclude_id`.
///
/// Uniqueness checks pass the row's own id on update (0 on create) so a
/// record never collides with itself.
pub(crate) async fn count_matching(
    conn: &mut SqliteConnection,
    table: &str,
    attribute: &str,
    value: Arg,
    exclude_id: i64,
) -> DbResult<i64> {
    validate_identifier(table)?;
    validate_identifier(attribute)?;

    let sql = format!("SELECT COUNT(*) FROM {table} WHERE {attribute} = ? AND id != ?");
    let n = bind_arg_scalar(sqlx::query_scalar::<_, i64>(&sql), value)
        .bind(exclude_id)
        .fetch_one(conn)
        .await?;
    Ok(n)
}

/// Hard delete. Returns whether a row actually went away.
pub(crate) async fn delete_by_id(
    conn: &mut SqliteConnection,
    table: &str,
    id: i64,
) -> DbResult<bool> {
    validate_identifier(table)?;

    let done = sqlx::query(&format!("DELETE FROM {table} WHERE id = ?"))
        .bind(id)
        .execute(conn)
        .await?;
    Ok(done.rows_affected() > 0)
}

fn escape_like(needle: &str) -> String {
    needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

// =============================================================================
// Unit Tests
// =============================================================================
