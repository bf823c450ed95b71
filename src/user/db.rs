//! Code for creating the user table and reading and writing users.

use rusqlite::{Connection, OptionalExtension, Row};

use crate::{
    Error,
    database_id::Version,
    db::{get_timestamp, now_utc},
    user::{NewUser, PasswordHash, User, UserID},
};

const USER_COLUMNS: &str =
    "id, created_at, name, email, phone, code, password, activated, version";

/// Create the user table.
///
/// Email addresses are unique regardless of case.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_user_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS user (
                id INTEGER PRIMARY KEY,
                created_at INTEGER NOT NULL,
                name TEXT NOT NULL,
                email TEXT NOT NULL COLLATE NOCASE UNIQUE,
                phone TEXT NOT NULL,
                code INTEGER NOT NULL DEFAULT 0,
                password TEXT NOT NULL,
                activated INTEGER NOT NULL DEFAULT 0,
                version INTEGER NOT NULL DEFAULT 1,
                deleted INTEGER NOT NULL DEFAULT 0
                )",
        (),
    )?;

    Ok(())
}

fn map_user_row(row: &Row) -> Result<User, rusqlite::Error> {
    let raw_password_hash: String = row.get(6)?;

    Ok(User {
        id: row.get(0)?,
        created_at: get_timestamp(row, 1)?,
        name: row.get(2)?,
        email: row.get(3)?,
        phone: row.get(4)?,
        activation_code: row.get(5)?,
        password_hash: PasswordHash::new_unchecked(&raw_password_hash),
        activated: row.get(7)?,
        version: row.get(8)?,
    })
}

/// Create and insert a new user into the database.
///
/// # Errors
///
/// - [Error::DuplicateEmail] if another user already has the same email address.
/// - [Error::SqlError] if an SQL related error occurred.
pub fn insert_user(new_user: NewUser, connection: &Connection) -> Result<User, Error> {
    let created_at = now_utc();

    let (id, version) = connection.query_row(
        "INSERT INTO user (created_at, name, email, phone, code, password)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         RETURNING id, version",
        (
            created_at.unix_timestamp(),
            &new_user.name,
            &new_user.email,
            &new_user.phone,
            new_user.activation_code,
            new_user.password_hash.as_ref(),
        ),
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    Ok(User {
        id,
        created_at,
        name: new_user.name,
        email: new_user.email,
        phone: new_user.phone,
        activation_code: new_user.activation_code,
        password_hash: new_user.password_hash,
        activated: false,
        version,
    })
}

/// Get the live user with an ID equal to `user_id`.
///
/// # Errors
///
/// Returns [Error::NotFound] if `user_id` does not belong to a live user.
pub fn get_user_by_id(user_id: UserID, connection: &Connection) -> Result<User, Error> {
    connection
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM user WHERE id = ?1 AND deleted = 0"),
            (user_id,),
            map_user_row,
        )
        .map_err(Error::from)
}

/// Get the live user registered with `email`, ignoring case.
///
/// # Errors
///
/// Returns [Error::NotFound] if no live user has the address.
pub fn get_user_by_email(email: &str, connection: &Connection) -> Result<User, Error> {
    connection
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM user WHERE email = ?1 AND deleted = 0"),
            (email,),
            map_user_row,
        )
        .map_err(Error::from)
}

/// Get the live, not yet activated user with the activation `code` and `email`.
///
/// # Errors
///
/// Returns [Error::NotFound] if the pair does not match such a user.
pub fn get_user_by_code_and_email(
    code: i64,
    email: &str,
    connection: &Connection,
) -> Result<User, Error> {
    connection
        .query_row(
            &format!(
                "SELECT {USER_COLUMNS} FROM user
                 WHERE code = ?1 AND email = ?2 AND activated = 0 AND deleted = 0"
            ),
            (code, email),
            map_user_row,
        )
        .map_err(Error::from)
}

/// Overwrite the stored user with `user` if the stored version equals `user.version`.
///
/// Returns the incremented version.
///
/// # Errors
///
/// - [Error::EditConflict] if the user exists but was modified since it was read.
/// - [Error::NotFound] if there is no live user with the ID.
/// - [Error::DuplicateEmail] if the new email address belongs to another user.
pub fn update_user(user: &User, connection: &Connection) -> Result<Version, Error> {
    let new_version = connection
        .query_row(
            "UPDATE user
             SET name = ?1, email = ?2, phone = ?3, code = ?4, password = ?5, activated = ?6,
                 version = version + 1
             WHERE id = ?7 AND version = ?8 AND deleted = 0
             RETURNING version",
            (
                &user.name,
                &user.email,
                &user.phone,
                user.activation_code,
                user.password_hash.as_ref(),
                user.activated,
                user.id,
                user.version,
            ),
            |row| row.get(0),
        )
        .optional()?;

    match new_version {
        Some(new_version) => Ok(new_version),
        None if user_is_live(user.id, connection)? => Err(Error::EditConflict),
        None => Err(Error::NotFound),
    }
}

/// Soft delete the user `user_id` if the stored version equals `version`.
///
/// # Errors
///
/// - [Error::EditConflict] if the user exists but was modified since it was read.
/// - [Error::NotFound] if there is no live user with the ID.
pub fn delete_user(user_id: UserID, version: Version, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE user SET deleted = 1, version = version + 1
         WHERE id = ?1 AND version = ?2 AND deleted = 0",
        (user_id, version),
    )?;

    match rows_affected {
        0 if user_is_live(user_id, connection)? => Err(Error::EditConflict),
        0 => Err(Error::NotFound),
        _ => Ok(()),
    }
}

fn user_is_live(user_id: UserID, connection: &Connection) -> Result<bool, Error> {
    connection
        .query_row(
            "SELECT EXISTS (SELECT 1 FROM user WHERE id = ?1 AND deleted = 0)",
            (user_id,),
            |row| row.get(0),
        )
        .map_err(Error::from)
}
