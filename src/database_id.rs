//! Database ID type definitions.

/// Alias for the integer type used for mapping to database IDs.
pub type DatabaseId = i64;

/// The counter used for optimistic concurrency control.
///
/// Every row starts at version 1 and each successful write bumps it by exactly one.
pub type Version = i64;
