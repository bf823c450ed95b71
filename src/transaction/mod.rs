//! Transactions record money that was spent or earned in one of the user's categories.

mod db;
mod domain;
mod dto;
mod endpoints;

pub use db::{
    SQLiteTransactionStore, TRANSACTION_SORT_SAFELIST, TransactionSearch,
    create_transaction_table, get_transaction, insert_transaction, search_transactions,
    update_transaction,
};
pub use domain::{
    MAX_DESCRIPTION_LENGTH, NewTransaction, Transaction, TransactionId, validate_amount,
    validate_description, validate_new_amount,
};
pub use dto::TransactionDto;
pub use endpoints::{
    TransactionListState, create_transaction, get_transaction_endpoint,
    list_category_transactions, list_transactions, update_transaction_endpoint,
};
