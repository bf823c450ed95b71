//! The user entity, its wire representation and the registration rules.

use std::fmt::Display;

use email_address::EmailAddress;
use rusqlite::{
    ToSql,
    types::{FromSql, FromSqlResult, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{database_id::Version, user::PasswordHash, validator::Validator};

/// A newtype wrapper for integer user IDs.
///
/// This helps disambiguate user IDs from other types of IDs, leading to better compile time
/// errors, and more flexible generics that can have distinct implementations for multiple ID types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub struct UserID(i64);

impl UserID {
    /// Create a new user ID.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Cast the user ID to a 64 bit integer.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for UserID {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl ToSql for UserID {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        self.0.to_sql()
    }
}

impl FromSql for UserID {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        i64::column_result(value).map(UserID)
    }
}

/// A registered user of the application.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    /// The user's ID in the application database.
    pub id: UserID,
    /// When the user registered.
    pub created_at: OffsetDateTime,
    /// The user's display name.
    pub name: String,
    /// The address the user logs in with.
    pub email: String,
    /// The user's phone number.
    pub phone: String,
    /// The code that activates the account, zero once the account is activated.
    pub activation_code: i64,
    /// The user's password hash.
    pub password_hash: PasswordHash,
    /// Whether the user has confirmed their activation code.
    pub activated: bool,
    /// Incremented on every successful update.
    pub version: Version,
}

/// The data needed to register a user.
#[derive(Debug, Clone, PartialEq)]
pub struct NewUser {
    /// The user's display name.
    pub name: String,
    /// The address the user logs in with.
    pub email: String,
    /// The user's phone number.
    pub phone: String,
    /// The code the user must submit to activate the account.
    pub activation_code: i64,
    /// The hash of the user's password.
    pub password_hash: PasswordHash,
}

/// Check the fields shared by every user record.
pub fn validate_user(validator: &mut Validator, name: &str, phone: &str, email: &str) {
    validator.check(!name.is_empty(), "name", "must be provided");
    validator.check(
        name.len() <= 500,
        "name",
        "must not be more than 500 bytes long",
    );
    validator.check(!phone.is_empty(), "phone", "must be provided");

    validate_email(validator, email);
}

/// Check that `email` is present and syntactically valid.
pub fn validate_email(validator: &mut Validator, email: &str) {
    validator.check(!email.is_empty(), "email", "must be provided");
    validator.check(
        EmailAddress::is_valid(email),
        "email",
        "must be a valid email address",
    );
}

/// How a user is rendered inside API responses.
///
/// Only fields with a non-empty value are serialized.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserID>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activated: Option<bool>,
}

impl From<&User> for UserDto {
    fn from(user: &User) -> Self {
        Self {
            user_id: Some(user.id),
            name: non_empty(&user.name),
            email: non_empty(&user.email),
            phone: non_empty(&user.phone),
            activated: user.activated.then_some(true),
        }
    }
}

pub(crate) fn non_empty(value: &str) -> Option<String> {
    (!value.is_empty()).then(|| value.to_owned())
}
