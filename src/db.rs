//! Database setup and the query helpers shared by the user, category and transaction stores.

use std::time::{Duration, Instant};

use rusqlite::{
    Connection, OptionalExtension, Row, ToSql, Transaction as SqlTransaction, TransactionBehavior,
    params_from_iter,
};
use time::OffsetDateTime;

use crate::{
    Error,
    category::create_category_table,
    database_id::{DatabaseId, Version},
    transaction::create_transaction_table,
    user::{UserID, create_user_table},
};

/// How many SQLite virtual machine instructions run between deadline checks.
const PROGRESS_HANDLER_PERIOD: i32 = 1_000;

/// Create the application tables and indexes if they do not exist yet.
///
/// Foreign key enforcement is switched on for `connection`.
///
/// # Errors
/// Returns an error if a table cannot be created or there is some other SQL error.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    connection.pragma_update(None, "foreign_keys", true)?;

    let transaction = SqlTransaction::new_unchecked(connection, TransactionBehavior::Exclusive)?;

    create_user_table(&transaction)?;
    create_category_table(&transaction)?;
    create_transaction_table(&transaction)?;

    transaction.commit()?;

    Ok(())
}

/// Run `operation` against `connection`, interrupting any statement that is still running once
/// `timeout` has elapsed.
///
/// An interrupted statement surfaces as [Error::Timeout]. The busy timeout is set to the same
/// duration so that waiting on another writer is bounded as well.
pub fn with_deadline<T>(
    connection: &Connection,
    timeout: Duration,
    operation: impl FnOnce(&Connection) -> Result<T, Error>,
) -> Result<T, Error> {
    connection.busy_timeout(timeout)?;

    let deadline = Instant::now() + timeout;
    connection.progress_handler(
        PROGRESS_HANDLER_PERIOD,
        Some(move || Instant::now() >= deadline),
    );

    let result = operation(connection);

    connection.progress_handler(0, None::<fn() -> bool>);

    result
}

/// The current UTC time truncated to whole seconds, the precision timestamps are stored with.
pub fn now_utc() -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();

    now.replace_nanosecond(0).unwrap_or(now)
}

/// Read a unix timestamp column as a UTC date time.
pub fn get_timestamp(row: &Row, index: usize) -> Result<OffsetDateTime, rusqlite::Error> {
    let seconds: i64 = row.get(index)?;

    OffsetDateTime::from_unix_timestamp(seconds).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(
            index,
            rusqlite::types::Type::Integer,
            Box::new(error),
        )
    })
}

/// The tables whose rows belong to a single user and are soft deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OwnedTable {
    /// The `category` table.
    Category,
    /// The `transaction` table.
    Transaction,
}

impl OwnedTable {
    /// The quoted table name, safe to interpolate into SQL.
    pub fn as_sql(self) -> &'static str {
        match self {
            OwnedTable::Category => "category",
            OwnedTable::Transaction => "\"transaction\"",
        }
    }
}

/// Apply `assignments` to the live row `id` owned by `owner`, but only if its stored version
/// still equals `version`.
///
/// `assignments` is a literal `SET` list such as `name = ?1, color = ?2` whose positional
/// parameters are bound from `values`. The version is incremented in the same statement.
///
/// # Errors
/// - [Error::EditConflict] if the row is live but its version differs from `version`.
/// - [Error::NotFound] if there is no live row with `id` owned by `owner`.
pub fn compare_and_swap(
    connection: &Connection,
    table: OwnedTable,
    id: DatabaseId,
    owner: UserID,
    version: Version,
    assignments: &'static str,
    values: &[&dyn ToSql],
) -> Result<Version, Error> {
    let next = values.len() + 1;
    let query = format!(
        "UPDATE {table} SET {assignments}, version = version + 1 \
         WHERE id = ?{next} AND user_id = ?{} AND version = ?{} AND deleted = 0 \
         RETURNING version",
        next + 1,
        next + 2,
        table = table.as_sql(),
    );

    let owner_id = owner.as_i64();
    let mut params: Vec<&dyn ToSql> = values.to_vec();
    params.extend([&id as &dyn ToSql, &owner_id, &version]);

    let new_version = connection
        .query_row(&query, params_from_iter(params), |row| row.get(0))
        .optional()?;

    match new_version {
        Some(new_version) => Ok(new_version),
        None if is_live(connection, table, id, owner)? => Err(Error::EditConflict),
        None => Err(Error::NotFound),
    }
}

/// Soft delete the live row `id` owned by `owner` if its version still equals `version`.
///
/// # Errors
/// Same as [compare_and_swap].
pub fn soft_delete(
    connection: &Connection,
    table: OwnedTable,
    id: DatabaseId,
    owner: UserID,
    version: Version,
) -> Result<(), Error> {
    compare_and_swap(connection, table, id, owner, version, "deleted = 1", &[]).map(|_| ())
}

/// Whether `id` is a live row owned by `owner`.
pub fn is_live(
    connection: &Connection,
    table: OwnedTable,
    id: DatabaseId,
    owner: UserID,
) -> Result<bool, Error> {
    let query = format!(
        "SELECT EXISTS (SELECT 1 FROM {} WHERE id = ?1 AND user_id = ?2 AND deleted = 0)",
        table.as_sql()
    );

    connection
        .query_row(&query, (id, owner.as_i64()), |row| row.get(0))
        .map_err(Error::from)
}

/// The case folded form of `text` stored next to searchable and unique text columns.
///
/// SQLite only folds ASCII letters, so the folding is done here for the whole of Unicode.
pub fn search_key(text: &str) -> String {
    text.to_lowercase()
}

/// Add one `LIKE` condition per whitespace separated term in `query` so that every term must
/// appear somewhere in `key_column`, a column holding the [search_key] of the text.
///
/// Nothing is added for a blank query, so it matches every row.
pub fn push_text_search(
    key_column: &'static str,
    query: &str,
    conditions: &mut Vec<String>,
    params: &mut Vec<Box<dyn ToSql>>,
) {
    for term in search_key(query).split_whitespace() {
        conditions.push(format!("{key_column} LIKE ? ESCAPE '\\'"));
        params.push(Box::new(format!("%{}%", escape_like(term))));
    }
}

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());

    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }

    escaped
}

/// Join `conditions` into a `WHERE` clause.
pub fn where_clause(conditions: &[String]) -> String {
    format!("WHERE {}", conditions.join(" AND "))
}
