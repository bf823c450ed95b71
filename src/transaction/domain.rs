//! Defines the `Transaction` type and the rules its fields must satisfy.

use time::OffsetDateTime;

use crate::{
    category::{Category, CategoryId},
    database_id::{DatabaseId, Version},
    user::UserID,
    validator::Validator,
};

/// The database ID of a transaction.
pub type TransactionId = DatabaseId;

/// The longest description allowed, in bytes.
pub const MAX_DESCRIPTION_LENGTH: usize = 500;

/// An expense or income, i.e. an event where money was either spent or earned.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// When the transaction was recorded.
    pub created_at: OffsetDateTime,
    /// A text description of what the transaction was for.
    pub description: String,
    /// The amount of money spent or earned in this transaction.
    pub amount: f64,
    /// The ID of the category the transaction belongs to.
    pub category_id: CategoryId,
    /// The current state of the category, if it has not been deleted.
    ///
    /// This is read from the database every time the transaction is loaded, so it always
    /// reflects the live category rather than what a client sent.
    pub category: Option<Category>,
    /// The user that owns the transaction.
    pub user_id: UserID,
    /// Incremented on every successful update.
    pub version: Version,
}

/// The data needed to create a transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTransaction {
    pub description: String,
    pub amount: f64,
    pub category_id: CategoryId,
}

/// Check the description of a transaction.
pub fn validate_description(validator: &mut Validator, description: &str) {
    validator.check(!description.is_empty(), "description", "must be provided");
    validator.check(
        description.len() <= MAX_DESCRIPTION_LENGTH,
        "description",
        "must not be more than 500 bytes long",
    );
}

/// Check the amount of an existing transaction, which may be negative but not zero.
pub fn validate_amount(validator: &mut Validator, amount: f64) {
    validator.check(amount.is_finite(), "amount", "must be a number");
    validator.check(amount != 0.0, "amount", "must not be zero");
}

/// Check the amount of a transaction that is being created.
pub fn validate_new_amount(validator: &mut Validator, amount: Option<f64>) {
    match amount {
        None => validator.add_error("amount", "must be provided"),
        Some(amount) => {
            validator.check(amount.is_finite(), "amount", "must be a number");
            validator.check(amount > 0.0, "amount", "must be greater than zero");
        }
    }
}

#[cfg(test)]
mod transaction_domain_tests {
    use crate::validator::Validator;

    use super::{validate_amount, validate_description, validate_new_amount};

    #[test]
    fn description_is_required() {
        let mut validator = Validator::new();

        validate_description(&mut validator, "");

        assert_eq!(validator.errors()["description"], "must be provided");
    }

    #[test]
    fn long_description_is_rejected() {
        let mut validator = Validator::new();

        validate_description(&mut validator, &"a".repeat(501));

        assert_eq!(
            validator.errors()["description"],
            "must not be more than 500 bytes long"
        );
    }

    #[test]
    fn description_at_limit_passes() {
        let mut validator = Validator::new();

        validate_description(&mut validator, &"a".repeat(500));

        assert!(validator.is_valid());
    }

    #[test]
    fn zero_amount_is_rejected() {
        let mut validator = Validator::new();

        validate_amount(&mut validator, 0.0);

        assert_eq!(validator.errors()["amount"], "must not be zero");
    }

    #[test]
    fn negative_amount_passes_on_update() {
        let mut validator = Validator::new();

        validate_amount(&mut validator, -12.5);

        assert!(validator.is_valid());
    }

    #[test]
    fn new_amount_must_be_positive() {
        for amount in [0.0, -1.0] {
            let mut validator = Validator::new();

            validate_new_amount(&mut validator, Some(amount));

            assert_eq!(
                validator.errors()["amount"],
                "must be greater than zero",
                "amount {amount}"
            );
        }
    }

    #[test]
    fn new_amount_must_be_provided() {
        let mut validator = Validator::new();

        validate_new_amount(&mut validator, None);

        assert_eq!(validator.errors()["amount"], "must be provided");
    }
}
