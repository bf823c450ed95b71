//! Categories group a user's transactions into income and expenses.

mod db;
mod domain;
mod dto;
mod endpoints;

pub(crate) use db::{CATEGORY_COLUMNS, map_category_columns};
pub use db::{
    CATEGORY_SORT_SAFELIST, CategorySearch, SQLiteCategoryStore, create_category_table,
    get_category, insert_category, search_categories, update_category,
};
pub use domain::{
    Category, CategoryId, CategoryType, NewCategory, parse_category_type, validate_category,
};
pub use dto::CategoryDto;
pub use endpoints::{
    CategoryEndpointState, create_category, get_category_endpoint, list_categories,
    update_category_endpoint,
};
