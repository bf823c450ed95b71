//! Route handlers for listing, creating, reading and updating categories.
//!
//! Deleting a category goes through [crate::handlers::delete_record].

use axum::{
    Extension, Json,
    extract::{FromRef, Path, Query, State},
    http::{StatusCode, header::LOCATION},
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{
    AppState, Error,
    category::{CATEGORY_SORT_SAFELIST, CategoryDto, CategorySearch, SQLiteCategoryStore},
    endpoints::{self, format_endpoint},
    handlers::parse_record_id,
    pagination::{Filters, PageParams, PaginationConfig, validate_filters},
    store::OwnedStore,
    user::User,
    validator::Validator,
};

impl FromRef<AppState> for SQLiteCategoryStore {
    fn from_ref(state: &AppState) -> Self {
        SQLiteCategoryStore::new(state.store.clone())
    }
}

/// The state needed by the category route handlers.
#[derive(Debug, Clone)]
pub struct CategoryEndpointState {
    pub store: SQLiteCategoryStore,
    pub pagination_config: PaginationConfig,
}

impl FromRef<AppState> for CategoryEndpointState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            store: SQLiteCategoryStore::from_ref(state),
            pagination_config: state.pagination_config.clone(),
        }
    }
}

/// The query parameters for listing categories.
#[derive(Debug, Default, Deserialize)]
pub struct CategoryListQuery {
    #[serde(flatten)]
    page: PageParams,
    #[serde(default)]
    name: String,
}

/// A route handler that lists a page of the user's categories.
///
/// # Errors
///
/// Returns [Error::Validation] if the paging parameters are invalid.
pub async fn list_categories(
    State(state): State<CategoryEndpointState>,
    Extension(user): Extension<User>,
    Query(query): Query<CategoryListQuery>,
) -> Result<Json<Value>, Error> {
    let mut validator = Validator::new();
    let filters = Filters::from_params(
        &query.page,
        CATEGORY_SORT_SAFELIST,
        &state.pagination_config,
        &mut validator,
    );
    validate_filters(&mut validator, &filters);
    validator.finish()?;

    let search = CategorySearch { name: query.name };
    let page = state.store.search(&search, user.id, &filters)?;

    let categories: Vec<_> = page
        .records
        .iter()
        .map(|category| CategoryDto::from_category(category, &user))
        .collect();

    Ok(Json(
        json!({ "categories": categories, "metadata": page.metadata }),
    ))
}

/// A route handler that creates a category for the user.
///
/// Responds with 201 and the location of the new category.
pub async fn create_category(
    State(store): State<SQLiteCategoryStore>,
    Extension(user): Extension<User>,
    Json(dto): Json<CategoryDto>,
) -> Result<impl IntoResponse, Error> {
    let new_category = dto.into_new_category()?;
    let category = store.insert(new_category, user.id)?;

    let location = format_endpoint(endpoints::CATEGORY, category.id);

    Ok((
        StatusCode::CREATED,
        [(LOCATION, location)],
        Json(json!({ "category": CategoryDto::from_category(&category, &user) })),
    ))
}

/// A route handler that gets one of the user's categories.
pub async fn get_category_endpoint(
    State(store): State<SQLiteCategoryStore>,
    Extension(user): Extension<User>,
    Path(raw_id): Path<String>,
) -> Result<Json<Value>, Error> {
    let id = parse_record_id(&raw_id)?;
    let category = store.get(id, user.id)?;

    Ok(Json(
        json!({ "category": CategoryDto::from_category(&category, &user) }),
    ))
}

/// A route handler that merges the fields in the request body into one of the user's
/// categories.
///
/// If the body carries a `version` it must match the stored version, otherwise the version read
/// just before the update is used.
///
/// # Errors
///
/// - [Error::NotFound] if the category does not exist.
/// - [Error::EditConflict] if the category was changed concurrently.
/// - [Error::DuplicateName] if the new name is taken.
pub async fn update_category_endpoint(
    State(store): State<SQLiteCategoryStore>,
    Extension(user): Extension<User>,
    Path(raw_id): Path<String>,
    Json(dto): Json<CategoryDto>,
) -> Result<Json<Value>, Error> {
    let id = parse_record_id(&raw_id)?;
    let category = store.get(id, user.id)?;

    let mut category = dto.apply_to(category)?;
    category.version = store.update(&category, user.id)?;

    Ok(Json(
        json!({ "category": CategoryDto::from_category(&category, &user) }),
    ))
}
