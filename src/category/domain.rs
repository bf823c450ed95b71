//! This file defines the `Category` type, its closed set of kinds and the rules a category must
//! satisfy. Every transaction belongs to exactly one category.

use std::fmt::Display;

use rusqlite::{
    ToSql,
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef},
};
use time::OffsetDateTime;

use crate::{
    database_id::{DatabaseId, Version},
    user::UserID,
    validator::Validator,
};

/// The database ID of a category.
pub type CategoryId = DatabaseId;

/// Whether money in a category is coming in or going out.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CategoryType {
    /// Money received, e.g. wages.
    Income,
    /// Money spent, e.g. groceries.
    #[default]
    Expense,
}

impl CategoryType {
    /// Parse the name a client uses for a category type, ignoring case.
    ///
    /// Both the Portuguese wire names ("Receita", "Despesa") and the English names are accepted.
    pub fn from_wire(raw: &str) -> Option<Self> {
        let raw = raw.trim();

        if raw.eq_ignore_ascii_case("receita") || raw.eq_ignore_ascii_case("income") {
            Some(CategoryType::Income)
        } else if raw.eq_ignore_ascii_case("despesa") || raw.eq_ignore_ascii_case("expense") {
            Some(CategoryType::Expense)
        } else {
            None
        }
    }

    /// The name used for this type in API responses.
    pub fn wire_name(self) -> &'static str {
        match self {
            CategoryType::Income => "Receita",
            CategoryType::Expense => "Despesa",
        }
    }

    /// The name used for this type in the database.
    pub fn as_str(self) -> &'static str {
        match self {
            CategoryType::Income => "Income",
            CategoryType::Expense => "Expense",
        }
    }
}

impl Display for CategoryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToSql for CategoryType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for CategoryType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "Income" => Ok(CategoryType::Income),
            "Expense" => Ok(CategoryType::Expense),
            _ => Err(FromSqlError::InvalidType),
        }
    }
}

/// A category for expenses and income, e.g., 'Groceries', 'Eating Out', 'Wages'.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    /// The ID of the category.
    pub id: CategoryId,
    /// When the category was created.
    pub created_at: OffsetDateTime,
    /// The name of the category, unique per user regardless of case.
    pub name: String,
    /// Whether the category holds income or expenses.
    pub category_type: CategoryType,
    /// The colour the category is displayed with.
    pub color: String,
    /// The user that owns the category.
    pub user_id: UserID,
    /// Incremented on every successful update.
    pub version: Version,
}

/// The data needed to create a category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCategory {
    pub name: String,
    pub category_type: CategoryType,
    pub color: String,
}

/// Check the free text fields of a category.
pub fn validate_category(validator: &mut Validator, name: &str, color: &str) {
    validator.check(!name.is_empty(), "name", "must be provided");
    validator.check(
        name.len() <= 500,
        "name",
        "must not be more than 500 bytes long",
    );
    validator.check(!color.is_empty(), "color", "must be provided");
}

/// Parse the `tipo` wire field, recording a failure if it is missing or unknown.
pub fn parse_category_type(validator: &mut Validator, raw: Option<&str>) -> Option<CategoryType> {
    match raw.map(str::trim) {
        None | Some("") => {
            validator.add_error("tipo", "must be provided");
            None
        }
        Some(raw) => {
            let category_type = CategoryType::from_wire(raw);
            validator.check(
                category_type.is_some(),
                "tipo",
                "must be either Receita or Despesa",
            );
            category_type
        }
    }
}
