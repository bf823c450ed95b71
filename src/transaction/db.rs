//! The transaction table and the SQLite backed transaction store.

use rusqlite::{Connection, Row, ToSql, params, params_from_iter};
use time::Date;

use crate::{
    Error,
    category::{
        CATEGORY_COLUMNS, Category, CategoryId, CategoryType, get_category, map_category_columns,
    },
    database_id::Version,
    db::{
        OwnedTable, compare_and_swap, get_timestamp, is_live, now_utc, push_text_search,
        search_key, soft_delete, where_clause,
    },
    pagination::{Filters, Paginated, calculate_metadata},
    store::{OwnedStore, StoreHandle},
    transaction::{NewTransaction, Transaction, TransactionId},
    user::UserID,
};

/// The sort keys accepted when listing transactions.
pub const TRANSACTION_SORT_SAFELIST: &[&str] = &[
    "id",
    "description",
    "amount",
    "created_at",
    "-id",
    "-description",
    "-amount",
    "-created_at",
];

const TRANSACTION_COLUMNS: &str =
    "t.id, t.created_at, t.description, t.amount, t.category_id, t.user_id, t.version";

const SECONDS_PER_DAY: i64 = 86_400;

/// Where the joined category columns start in a transaction row.
const CATEGORY_OFFSET: usize = 7;

/// Create the transaction table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
                id INTEGER PRIMARY KEY,
                created_at INTEGER NOT NULL,
                description TEXT NOT NULL,
                description_key TEXT NOT NULL,
                amount REAL NOT NULL,
                category_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                version INTEGER NOT NULL DEFAULT 1,
                deleted INTEGER NOT NULL DEFAULT 0,
                FOREIGN KEY(category_id) REFERENCES category(id) ON UPDATE CASCADE,
                FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
                );
        CREATE INDEX IF NOT EXISTS idx_transaction_user_created
            ON \"transaction\" (user_id, created_at);",
    )?;

    Ok(())
}

fn select_transactions(where_clause: &str) -> String {
    format!(
        "SELECT {TRANSACTION_COLUMNS}, {CATEGORY_COLUMNS}, c.deleted
         FROM \"transaction\" t
         INNER JOIN category c ON c.id = t.category_id
         {where_clause}"
    )
}

/// Map a row selected by [select_transactions] to a transaction with its live category.
fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    let category_deleted: bool = row.get(CATEGORY_OFFSET + 7)?;
    let category = if category_deleted {
        None
    } else {
        Some(map_category_columns(row, CATEGORY_OFFSET)?)
    };

    Ok(Transaction {
        id: row.get(0)?,
        created_at: get_timestamp(row, 1)?,
        description: row.get(2)?,
        amount: row.get(3)?,
        category_id: row.get(4)?,
        user_id: row.get(5)?,
        version: row.get(6)?,
        category,
    })
}

/// Get the live category `category_id` that a transaction owned by `owner` may reference.
///
/// # Errors
/// Returns [Error::InvalidCategory] if the category does not exist, was deleted or belongs to
/// another user.
fn get_referenced_category(
    category_id: CategoryId,
    owner: UserID,
    connection: &Connection,
) -> Result<Category, Error> {
    get_category(category_id, owner, connection).map_err(|error| match error {
        Error::NotFound => Error::InvalidCategory(category_id),
        error => error,
    })
}

/// Insert a transaction owned by `owner`.
///
/// # Errors
/// - [Error::InvalidCategory] if the category is not a live category owned by `owner`.
/// - [Error::SqlError] if there is some other SQL error.
pub fn insert_transaction(
    new_transaction: NewTransaction,
    owner: UserID,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let category = get_referenced_category(new_transaction.category_id, owner, connection)?;
    let created_at = now_utc();

    let (id, version) = connection.query_row(
        "INSERT INTO \"transaction\"
            (created_at, description, description_key, amount, category_id, user_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         RETURNING id, version",
        (
            created_at.unix_timestamp(),
            &new_transaction.description,
            search_key(&new_transaction.description),
            new_transaction.amount,
            new_transaction.category_id,
            owner,
        ),
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    Ok(Transaction {
        id,
        created_at,
        description: new_transaction.description,
        amount: new_transaction.amount,
        category_id: new_transaction.category_id,
        category: Some(category),
        user_id: owner,
        version,
    })
}

/// Get the live transaction `id` owned by `owner`, together with its live category.
///
/// # Errors
/// Returns [Error::NotFound] if there is no such transaction.
pub fn get_transaction(
    id: TransactionId,
    owner: UserID,
    connection: &Connection,
) -> Result<Transaction, Error> {
    connection
        .query_row(
            &select_transactions("WHERE t.id = ?1 AND t.user_id = ?2 AND t.deleted = 0"),
            (id, owner),
            map_transaction_row,
        )
        .map_err(Error::from)
}

/// The filters for listing transactions.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TransactionSearch {
    /// Every whitespace separated term must appear in the description.
    pub description: String,
    /// Only include transactions created on or after this date (UTC).
    pub start: Option<Date>,
    /// Only include transactions created on or before this date (UTC).
    pub end: Option<Date>,
    /// Only include transactions whose category currently has this type.
    pub category_type: Option<CategoryType>,
    /// Only include transactions in this category.
    pub category_id: Option<CategoryId>,
}

fn start_of_day(date: Date) -> i64 {
    date.midnight().assume_utc().unix_timestamp()
}

/// The first second after `date`, the exclusive bound for an inclusive end date.
///
/// Computed on the timestamp so that it also exists for [Date::MAX].
fn start_of_next_day(date: Date) -> i64 {
    start_of_day(date) + SECONDS_PER_DAY
}

/// Get a page of the live transactions owned by `owner` that match `search`.
///
/// # Errors
///
/// Returns [Error::Validation] if the sort key in `filters` is not allow-listed.
pub fn search_transactions(
    search: &TransactionSearch,
    owner: UserID,
    filters: &Filters,
    connection: &Connection,
) -> Result<Paginated<Transaction>, Error> {
    let order_by = filters.sort_key()?.order_by("t");

    let mut conditions = vec!["t.user_id = ?".to_owned(), "t.deleted = 0".to_owned()];
    let mut params: Vec<Box<dyn ToSql>> = vec![Box::new(owner)];

    push_text_search("t.description_key", &search.description, &mut conditions, &mut params);

    if let Some(start) = search.start {
        conditions.push("t.created_at >= ?".to_owned());
        params.push(Box::new(start_of_day(start)));
    }

    if let Some(end) = search.end {
        conditions.push("t.created_at < ?".to_owned());
        params.push(Box::new(start_of_next_day(end)));
    }

    if let Some(category_type) = search.category_type {
        conditions.push("c.type = ?".to_owned());
        params.push(Box::new(category_type));
    }

    if let Some(category_id) = search.category_id {
        conditions.push("t.category_id = ?".to_owned());
        params.push(Box::new(category_id));
    }

    let where_clause = where_clause(&conditions);

    let total_records: i64 = connection.query_row(
        &format!(
            "SELECT COUNT(*) FROM \"transaction\" t
             INNER JOIN category c ON c.id = t.category_id
             {where_clause}"
        ),
        params_from_iter(params.iter()),
        |row| row.get(0),
    )?;

    params.push(Box::new(filters.limit()));
    params.push(Box::new(filters.offset()));

    let records = connection
        .prepare(&format!(
            "{} {order_by} LIMIT ? OFFSET ?",
            select_transactions(&where_clause)
        ))?
        .query_map(params_from_iter(params.iter()), map_transaction_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Paginated {
        records,
        metadata: calculate_metadata(total_records, filters.page, filters.page_size),
    })
}

/// Overwrite the description, amount and category of the live transaction `transaction.id` if
/// its stored version equals `transaction.version`.
///
/// # Errors
///
/// - [Error::NotFound] if there is no live transaction owned by `owner`.
/// - [Error::InvalidCategory] if the category is not a live category owned by `owner`.
/// - [Error::EditConflict] if the stored version differs.
pub fn update_transaction(
    transaction: &Transaction,
    owner: UserID,
    connection: &Connection,
) -> Result<Version, Error> {
    if !is_live(connection, OwnedTable::Transaction, transaction.id, owner)? {
        return Err(Error::NotFound);
    }

    get_referenced_category(transaction.category_id, owner, connection)?;

    compare_and_swap(
        connection,
        OwnedTable::Transaction,
        transaction.id,
        owner,
        transaction.version,
        "description = ?1, description_key = ?2, amount = ?3, category_id = ?4",
        params![
            transaction.description,
            search_key(&transaction.description),
            transaction.amount,
            transaction.category_id
        ],
    )
}

/// Stores transactions in a SQLite database.
#[derive(Debug, Clone)]
pub struct SQLiteTransactionStore {
    handle: StoreHandle,
}

impl SQLiteTransactionStore {
    /// Create a new store on the shared database `handle`.
    pub fn new(handle: StoreHandle) -> Self {
        Self { handle }
    }
}

impl OwnedStore for SQLiteTransactionStore {
    type Entity = Transaction;
    type NewEntity = NewTransaction;
    type Search = TransactionSearch;

    const RESOURCE: &'static str = "transaction";

    fn insert(&self, new_transaction: NewTransaction, owner: UserID) -> Result<Transaction, Error> {
        self.handle
            .run(|connection| insert_transaction(new_transaction, owner, connection))
    }

    fn get(&self, id: TransactionId, owner: UserID) -> Result<Transaction, Error> {
        self.handle
            .run(|connection| get_transaction(id, owner, connection))
    }

    fn search(
        &self,
        search: &TransactionSearch,
        owner: UserID,
        filters: &Filters,
    ) -> Result<Paginated<Transaction>, Error> {
        self.handle
            .run(|connection| search_transactions(search, owner, filters, connection))
    }

    fn update(&self, transaction: &Transaction, owner: UserID) -> Result<Version, Error> {
        self.handle
            .run(|connection| update_transaction(transaction, owner, connection))
    }

    fn delete(&self, id: TransactionId, owner: UserID, version: Version) -> Result<(), Error> {
        self.handle.run(|connection| {
            soft_delete(connection, OwnedTable::Transaction, id, owner, version)
        })
    }
}
