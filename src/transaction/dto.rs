//! The wire representation of a transaction.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    Error,
    category::CategoryDto,
    database_id::Version,
    transaction::{
        NewTransaction, Transaction, TransactionId, validate_amount, validate_description,
        validate_new_amount,
    },
    user::{User, UserDto, non_empty},
    validator::Validator,
};

/// A transaction as sent to and received from clients.
///
/// The category is referenced by the `category_id` of the nested category object. Any other
/// nested category or user fields sent by a client are ignored, the server always renders the
/// live records.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<TransactionId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<CategoryDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<Version>,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<OffsetDateTime>,
}

impl TransactionDto {
    /// Render `transaction` for `owner`, omitting empty fields.
    pub fn from_transaction(transaction: &Transaction, owner: &User) -> Self {
        Self {
            transaction_id: (transaction.id != 0).then_some(transaction.id),
            description: non_empty(&transaction.description),
            amount: (transaction.amount != 0.0).then_some(transaction.amount),
            category: transaction
                .category
                .as_ref()
                .map(|category| CategoryDto::from_category(category, owner)),
            user: Some(UserDto::from(owner)),
            version: (transaction.version != 0).then_some(transaction.version),
            created_at: Some(transaction.created_at),
        }
    }

    /// Read a transaction to create from the request body.
    ///
    /// # Errors
    ///
    /// - [Error::Validation] if the description or amount are missing or invalid.
    /// - [Error::CategoryRequired] if no category ID was given.
    pub fn into_new_transaction(self) -> Result<NewTransaction, Error> {
        let mut validator = Validator::new();

        let description = self.description.unwrap_or_default();
        validate_description(&mut validator, &description);
        validate_new_amount(&mut validator, self.amount);
        validator.finish()?;

        let category_id = self
            .category
            .and_then(|category| category.category_id)
            .ok_or(Error::CategoryRequired)?;

        Ok(NewTransaction {
            description,
            amount: self.amount.unwrap_or_default(),
            category_id,
        })
    }

    /// Merge the fields present in this DTO into `transaction`.
    ///
    /// Moving the transaction to another category clears the attached category, which is
    /// loaded again once the update is stored.
    ///
    /// # Errors
    ///
    /// - [Error::Validation] if the merged transaction is invalid.
    /// - [Error::CategoryRequired] if a category object without an ID was given.
    pub fn apply_to(self, mut transaction: Transaction) -> Result<Transaction, Error> {
        if let Some(description) = self.description {
            transaction.description = description;
        }

        if let Some(amount) = self.amount {
            transaction.amount = amount;
        }

        if let Some(version) = self.version {
            transaction.version = version;
        }

        let mut validator = Validator::new();
        validate_description(&mut validator, &transaction.description);
        validate_amount(&mut validator, transaction.amount);
        validator.finish()?;

        if let Some(category) = self.category {
            let category_id = category.category_id.ok_or(Error::CategoryRequired)?;

            if category_id != transaction.category_id {
                transaction.category_id = category_id;
                transaction.category = None;
            }
        }

        Ok(transaction)
    }
}
