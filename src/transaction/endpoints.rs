//! Route handlers for listing, creating, reading and updating transactions.
//!
//! Deleting a transaction goes through [crate::handlers::delete_record].

use axum::{
    Extension, Json,
    extract::{FromRef, Path, Query, State},
    http::{StatusCode, header::LOCATION},
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::{Value, json};
use time::{Date, format_description::BorrowedFormatItem, macros::format_description};

use crate::{
    AppState, Error,
    category::{CategoryType, SQLiteCategoryStore},
    endpoints::{self, format_endpoint},
    handlers::parse_record_id,
    pagination::{Filters, PageParams, PaginationConfig, validate_filters},
    store::OwnedStore,
    transaction::{
        SQLiteTransactionStore, TRANSACTION_SORT_SAFELIST, TransactionDto, TransactionSearch,
    },
    user::User,
    validator::Validator,
};

const DATE_FORMAT: &[BorrowedFormatItem<'_>] = format_description!("[year]-[month]-[day]");

impl FromRef<AppState> for SQLiteTransactionStore {
    fn from_ref(state: &AppState) -> Self {
        SQLiteTransactionStore::new(state.store.clone())
    }
}

/// The state needed to list transactions.
#[derive(Debug, Clone)]
pub struct TransactionListState {
    pub store: SQLiteTransactionStore,
    pub categories: SQLiteCategoryStore,
    pub pagination_config: PaginationConfig,
}

impl FromRef<AppState> for TransactionListState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            store: SQLiteTransactionStore::from_ref(state),
            categories: SQLiteCategoryStore::from_ref(state),
            pagination_config: state.pagination_config.clone(),
        }
    }
}

/// The query parameters for listing transactions.
#[derive(Debug, Default, Deserialize)]
pub struct TransactionListQuery {
    #[serde(flatten)]
    page: PageParams,
    #[serde(default)]
    description: String,
    start: Option<String>,
    end: Option<String>,
    category_type: Option<String>,
}

fn parse_date(validator: &mut Validator, raw: Option<&str>, field: &str) -> Option<Date> {
    let raw = raw.map(str::trim).filter(|raw| !raw.is_empty())?;

    match Date::parse(raw, DATE_FORMAT) {
        Ok(date) => Some(date),
        Err(_) => {
            validator.add_error(field, "must be a date in the format YYYY-MM-DD");
            None
        }
    }
}

impl TransactionListQuery {
    /// Validate the query and split it into the search and the paging filters.
    fn into_search(
        self,
        config: &PaginationConfig,
    ) -> Result<(TransactionSearch, Filters), Error> {
        let mut validator = Validator::new();

        let filters = Filters::from_params(
            &self.page,
            TRANSACTION_SORT_SAFELIST,
            config,
            &mut validator,
        );
        validate_filters(&mut validator, &filters);

        let start = parse_date(&mut validator, self.start.as_deref(), "start");
        let end = parse_date(&mut validator, self.end.as_deref(), "end");
        if let (Some(start), Some(end)) = (start, end) {
            validator.check(start <= end, "end", "must not be before start");
        }

        let category_type = match self.category_type.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => {
                let category_type = CategoryType::from_wire(raw);
                validator.check(
                    category_type.is_some(),
                    "category_type",
                    "must be either Receita or Despesa",
                );
                category_type
            }
        };

        validator.finish()?;

        let search = TransactionSearch {
            description: self.description,
            start,
            end,
            category_type,
            category_id: None,
        };

        Ok((search, filters))
    }
}

fn render_page(
    store: &SQLiteTransactionStore,
    search: &TransactionSearch,
    filters: &Filters,
    user: &User,
) -> Result<Json<Value>, Error> {
    let page = store.search(search, user.id, filters)?;

    let transactions: Vec<_> = page
        .records
        .iter()
        .map(|transaction| TransactionDto::from_transaction(transaction, user))
        .collect();

    Ok(Json(
        json!({ "transactions": transactions, "metadata": page.metadata }),
    ))
}

/// A route handler that lists a page of the user's transactions.
///
/// Transactions can be narrowed by description terms, an inclusive creation date range and the
/// current type of their category.
pub async fn list_transactions(
    State(state): State<TransactionListState>,
    Extension(user): Extension<User>,
    Query(query): Query<TransactionListQuery>,
) -> Result<Json<Value>, Error> {
    let (search, filters) = query.into_search(&state.pagination_config)?;

    render_page(&state.store, &search, &filters, &user)
}

/// A route handler that lists a page of the transactions in one of the user's categories.
///
/// # Errors
///
/// Returns [Error::NotFound] if the category does not exist.
pub async fn list_category_transactions(
    State(state): State<TransactionListState>,
    Extension(user): Extension<User>,
    Path(raw_id): Path<String>,
    Query(query): Query<TransactionListQuery>,
) -> Result<Json<Value>, Error> {
    let category_id = parse_record_id(&raw_id)?;
    let (mut search, filters) = query.into_search(&state.pagination_config)?;

    state.categories.get(category_id, user.id)?;
    search.category_id = Some(category_id);

    render_page(&state.store, &search, &filters, &user)
}

/// A route handler that records a transaction for the user.
///
/// # Errors
///
/// - [Error::Validation] if the description or amount are invalid.
/// - [Error::CategoryRequired] if no category was given.
/// - [Error::InvalidCategory] if the category is not one of the user's categories.
pub async fn create_transaction(
    State(store): State<SQLiteTransactionStore>,
    Extension(user): Extension<User>,
    Json(dto): Json<TransactionDto>,
) -> Result<impl IntoResponse, Error> {
    let new_transaction = dto.into_new_transaction()?;
    let transaction = store.insert(new_transaction, user.id)?;

    let location = format_endpoint(endpoints::TRANSACTION, transaction.id);

    Ok((
        StatusCode::CREATED,
        [(LOCATION, location)],
        Json(json!({ "transaction": TransactionDto::from_transaction(&transaction, &user) })),
    ))
}

/// A route handler that gets one of the user's transactions.
pub async fn get_transaction_endpoint(
    State(store): State<SQLiteTransactionStore>,
    Extension(user): Extension<User>,
    Path(raw_id): Path<String>,
) -> Result<Json<Value>, Error> {
    let id = parse_record_id(&raw_id)?;
    let transaction = store.get(id, user.id)?;

    Ok(Json(
        json!({ "transaction": TransactionDto::from_transaction(&transaction, &user) }),
    ))
}

/// A route handler that merges the fields in the request body into one of the user's
/// transactions.
///
/// The stored transaction is read back after the update so the response carries the live
/// category.
pub async fn update_transaction_endpoint(
    State(store): State<SQLiteTransactionStore>,
    Extension(user): Extension<User>,
    Path(raw_id): Path<String>,
    Json(dto): Json<TransactionDto>,
) -> Result<Json<Value>, Error> {
    let id = parse_record_id(&raw_id)?;
    let transaction = store.get(id, user.id)?;

    let transaction = dto.apply_to(transaction)?;
    store.update(&transaction, user.id)?;
    let transaction = store.get(id, user.id)?;

    Ok(Json(
        json!({ "transaction": TransactionDto::from_transaction(&transaction, &user) }),
    ))
}
