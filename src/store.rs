//! The shared database handle and the capability set of the per-user stores.

use std::{
    sync::{Arc, Mutex, MutexGuard, TryLockError},
    thread,
    time::{Duration, Instant},
};

use rusqlite::Connection;

use crate::{
    Error,
    database_id::{DatabaseId, Version},
    db::with_deadline,
    pagination::{Filters, Paginated},
    user::UserID,
};

/// The default deadline for a single store operation.
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(3);

const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(1);

/// A shared database connection whose operations run under a deadline.
#[derive(Debug, Clone)]
pub struct StoreHandle {
    connection: Arc<Mutex<Connection>>,
    timeout: Duration,
}

impl StoreHandle {
    /// Wrap `connection` so that each operation is interrupted after `timeout`.
    pub fn new(connection: Arc<Mutex<Connection>>, timeout: Duration) -> Self {
        Self {
            connection,
            timeout,
        }
    }

    /// Lock the connection and run `operation` under the store deadline.
    ///
    /// The deadline covers waiting for the connection as well as running `operation`.
    ///
    /// # Errors
    /// - [Error::DatabaseLockError] if the connection lock is poisoned.
    /// - [Error::Timeout] if the deadline passes while waiting for the connection or while a
    ///   statement is running.
    /// - Any error returned by `operation`.
    pub fn run<T>(
        &self,
        operation: impl FnOnce(&Connection) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let deadline = Instant::now() + self.timeout;
        let connection = self.lock_until(deadline)?;

        with_deadline(
            &connection,
            deadline.saturating_duration_since(Instant::now()),
            operation,
        )
    }

    fn lock_until(&self, deadline: Instant) -> Result<MutexGuard<'_, Connection>, Error> {
        loop {
            match self.connection.try_lock() {
                Ok(connection) => return Ok(connection),
                Err(TryLockError::Poisoned(_)) => return Err(Error::DatabaseLockError),
                Err(TryLockError::WouldBlock) if Instant::now() >= deadline => {
                    tracing::warn!("timed out waiting for the database connection");
                    return Err(Error::Timeout);
                }
                Err(TryLockError::WouldBlock) => thread::sleep(LOCK_RETRY_INTERVAL),
            }
        }
    }
}

/// CRUD and search over records that belong to a single user and are soft deleted.
///
/// Every read, update and delete only sees live rows owned by `owner`.
pub trait OwnedStore {
    /// The stored record.
    type Entity;
    /// The validated data needed to create a record.
    type NewEntity;
    /// Filters that narrow a search beyond the owner, e.g. a text query.
    type Search;

    /// The resource name used in client facing messages, e.g. "category".
    const RESOURCE: &'static str;

    /// Persist `new_entity` for `owner` and return the stored record with its ID, creation time
    /// and initial version.
    fn insert(&self, new_entity: Self::NewEntity, owner: UserID) -> Result<Self::Entity, Error>;

    /// Get the live record `id` owned by `owner`.
    ///
    /// # Errors
    /// Returns [Error::NotFound] if there is no such record.
    fn get(&self, id: DatabaseId, owner: UserID) -> Result<Self::Entity, Error>;

    /// Get one page of the records owned by `owner` that match `search`, ordered by the sort key
    /// in `filters`.
    fn search(
        &self,
        search: &Self::Search,
        owner: UserID,
        filters: &Filters,
    ) -> Result<Paginated<Self::Entity>, Error>;

    /// Overwrite the stored record with `entity` if the stored version equals `entity`'s version.
    ///
    /// Returns the incremented version.
    ///
    /// # Errors
    /// - [Error::EditConflict] if the stored version differs.
    /// - [Error::NotFound] if there is no live record.
    fn update(&self, entity: &Self::Entity, owner: UserID) -> Result<Version, Error>;

    /// Soft delete the record `id` if the stored version equals `version`.
    ///
    /// # Errors
    /// - [Error::EditConflict] if the stored version differs.
    /// - [Error::NotFound] if there is no live record, including one that was already deleted.
    fn delete(&self, id: DatabaseId, owner: UserID, version: Version) -> Result<(), Error>;
}
