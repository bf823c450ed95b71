//! Turns paging and sorting query parameters into validated SQL fragments and computes
//! the metadata that accompanies a page of results.
//!
//! Sorting is the only place where request data influences the shape of a query string.
//! The requested sort key is therefore checked against a per-endpoint allow-list first and
//! only the matching allow-list literal is ever interpolated, never the request value.

use serde::{Deserialize, Serialize};

use crate::{
    Error,
    validator::{Validator, permitted_value},
};

/// The largest page number a client may request.
pub const MAX_PAGE: i64 = 10_000_000;
/// The largest number of records a client may request per page.
pub const MAX_PAGE_SIZE: i64 = 100;

/// The config for pagination
#[derive(Debug, Clone)]
pub struct PaginationConfig {
    /// The page number to default to when not specified in a request.
    pub default_page: i64,
    /// The number of records per page when not specified in a request.
    pub default_page_size: i64,
    /// The sort key to use when not specified in a request.
    pub default_sort: &'static str,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page: 1,
            default_page_size: 20,
            default_sort: "id",
        }
    }
}

/// The raw paging query parameters of a list request.
///
/// Values are kept as strings so that malformed numbers can be reported as validation
/// failures rather than rejected wholesale by the extractor.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct PageParams {
    pub page: Option<String>,
    pub page_size: Option<String>,
    pub sort: Option<String>,
}

/// The requested page and ordering for a list query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filters {
    pub page: i64,
    pub page_size: i64,
    /// The raw sort key, e.g. `name` or `-id`.
    pub sort: String,
    /// The sort keys this endpoint accepts.
    pub sort_safelist: &'static [&'static str],
}

impl Filters {
    /// Read the filters from `params`, falling back to the defaults in `config`.
    ///
    /// Numbers that cannot be parsed are recorded in `validator`.
    pub fn from_params(
        params: &PageParams,
        sort_safelist: &'static [&'static str],
        config: &PaginationConfig,
        validator: &mut Validator,
    ) -> Self {
        Self {
            page: read_int(params.page.as_deref(), "page", config.default_page, validator),
            page_size: read_int(
                params.page_size.as_deref(),
                "page_size",
                config.default_page_size,
                validator,
            ),
            sort: params
                .sort
                .as_deref()
                .filter(|sort| !sort.is_empty())
                .unwrap_or(config.default_sort)
                .to_owned(),
            sort_safelist,
        }
    }

    /// The maximum number of rows to fetch.
    pub fn limit(&self) -> i64 {
        self.page_size
    }

    /// The number of rows to skip before the requested page.
    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.page_size
    }

    /// Resolve the requested sort key to its allow-listed column and direction.
    ///
    /// # Errors
    ///
    /// Returns [Error::Validation] if the sort key is not in the allow-list.
    pub fn sort_key(&self) -> Result<SortKey, Error> {
        let permitted = self
            .sort_safelist
            .iter()
            .copied()
            .find(|candidate| *candidate == self.sort)
            .ok_or_else(|| {
                let mut validator = Validator::new();
                validator.add_error("sort", "invalid sort value");
                Error::Validation(validator.errors().clone())
            })?;

        Ok(match permitted.strip_prefix('-') {
            Some(column) => SortKey {
                column,
                direction: SortDirection::Descending,
            },
            None => SortKey {
                column: permitted,
                direction: SortDirection::Ascending,
            },
        })
    }
}

/// Check the page bounds and that the sort key is allow-listed.
pub fn validate_filters(validator: &mut Validator, filters: &Filters) {
    validator.check(filters.page > 0, "page", "must be greater than zero");
    validator.check(
        filters.page <= MAX_PAGE,
        "page",
        "must be a maximum of 10 million",
    );
    validator.check(filters.page_size > 0, "page_size", "must be greater than zero");
    validator.check(
        filters.page_size <= MAX_PAGE_SIZE,
        "page_size",
        "must be a maximum of 100",
    );
    validator.check(
        permitted_value(&filters.sort.as_str(), filters.sort_safelist),
        "sort",
        "invalid sort value",
    );
}

fn read_int(raw: Option<&str>, field: &str, default: i64, validator: &mut Validator) -> i64 {
    match raw {
        None | Some("") => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            validator.add_error(field, "must be an integer value");
            default
        }),
    }
}

/// The order to sort rows in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Sort in order of increasing value.
    Ascending,
    /// Sort in order of decreasing value.
    Descending,
}

impl SortDirection {
    fn as_sql(self) -> &'static str {
        match self {
            SortDirection::Ascending => "ASC",
            SortDirection::Descending => "DESC",
        }
    }
}

/// A sort column taken from an allow-list, never from request data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub column: &'static str,
    pub direction: SortDirection,
}

impl SortKey {
    /// Build the `ORDER BY` clause for columns of the table aliased as `table`.
    ///
    /// `id` is always appended as a tiebreaker so that pages do not overlap when the
    /// primary sort column has duplicate values.
    pub fn order_by(&self, table: &'static str) -> String {
        format!(
            "ORDER BY {table}.{} {}, {table}.id ASC",
            self.column,
            self.direction.as_sql()
        )
    }
}

/// Describes where a page of results sits in the full result set.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub current_page: i64,
    pub page_size: i64,
    pub first_page: i64,
    pub last_page: i64,
    pub total_records: i64,
}

/// Compute the metadata for a page of `total_records` rows.
///
/// Every field is zero when there are no records.
pub fn calculate_metadata(total_records: i64, page: i64, page_size: i64) -> Metadata {
    if total_records == 0 || page_size <= 0 {
        return Metadata::default();
    }

    Metadata {
        current_page: page,
        page_size,
        first_page: 1,
        last_page: (total_records + page_size - 1) / page_size,
        total_records,
    }
}

/// A page of records together with its metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Paginated<T> {
    pub records: Vec<T>,
    pub metadata: Metadata,
}

#[cfg(test)]
mod filters_tests {
    use crate::{Error, validator::Validator};

    use super::{
        Filters, MAX_PAGE, PageParams, PaginationConfig, SortDirection, SortKey, validate_filters,
    };

    const SAFELIST: &[&str] = &["id", "name", "-id", "-name"];

    fn filters(page: i64, page_size: i64, sort: &str) -> Filters {
        Filters {
            page,
            page_size,
            sort: sort.to_owned(),
            sort_safelist: SAFELIST,
        }
    }

    #[test]
    fn limit_and_offset_follow_page() {
        for page in 1..=20 {
            for page_size in [1, 5, 10, 100] {
                let filters = filters(page, page_size, "id");

                assert_eq!(filters.limit(), page_size);
                assert_eq!(filters.offset(), (page - 1) * page_size);
            }
        }
    }

    #[test]
    fn valid_filters_pass() {
        let mut validator = Validator::new();

        validate_filters(&mut validator, &filters(1, 20, "-name"));

        assert!(validator.is_valid(), "{:?}", validator.errors());
    }

    #[test]
    fn out_of_range_page_fails() {
        for page in [0, -1, MAX_PAGE + 1] {
            let mut validator = Validator::new();

            validate_filters(&mut validator, &filters(page, 20, "id"));

            assert!(validator.errors().contains_key("page"), "page {page}");
        }
    }

    #[test]
    fn out_of_range_page_size_fails() {
        for page_size in [0, 101] {
            let mut validator = Validator::new();

            validate_filters(&mut validator, &filters(1, page_size, "id"));

            assert!(
                validator.errors().contains_key("page_size"),
                "page_size {page_size}"
            );
        }
    }

    #[test]
    fn sort_outside_safelist_fails_validation_and_resolution() {
        for sort in ["description", "ID", "--id", "id; DROP TABLE category", ""] {
            let filters = filters(1, 20, sort);
            let mut validator = Validator::new();

            validate_filters(&mut validator, &filters);

            assert_eq!(
                validator.errors().get("sort").map(String::as_str),
                Some("invalid sort value")
            );
            assert!(matches!(filters.sort_key(), Err(Error::Validation(_))));
        }
    }

    #[test]
    fn sort_key_is_ascending_by_default() {
        let key = filters(1, 20, "name").sort_key().unwrap();

        assert_eq!(
            key,
            SortKey {
                column: "name",
                direction: SortDirection::Ascending
            }
        );
    }

    #[test]
    fn leading_dash_sorts_descending() {
        let key = filters(1, 20, "-id").sort_key().unwrap();

        assert_eq!(key.column, "id");
        assert_eq!(key.direction, SortDirection::Descending);
    }

    #[test]
    fn order_by_appends_id_tiebreaker() {
        let key = filters(1, 20, "-name").sort_key().unwrap();

        assert_eq!(key.order_by("c"), "ORDER BY c.name DESC, c.id ASC");
    }

    #[test]
    fn from_params_uses_defaults() {
        let mut validator = Validator::new();

        let filters = Filters::from_params(
            &PageParams::default(),
            SAFELIST,
            &PaginationConfig::default(),
            &mut validator,
        );

        assert!(validator.is_valid());
        assert_eq!(filters.page, 1);
        assert_eq!(filters.page_size, 20);
        assert_eq!(filters.sort, "id");
    }

    #[test]
    fn from_params_reports_malformed_numbers() {
        let mut validator = Validator::new();
        let params = PageParams {
            page: Some("two".to_owned()),
            page_size: Some("5".to_owned()),
            sort: Some("-id".to_owned()),
        };

        let filters = Filters::from_params(
            &params,
            SAFELIST,
            &PaginationConfig::default(),
            &mut validator,
        );

        assert_eq!(validator.errors()["page"], "must be an integer value");
        assert_eq!(filters.page_size, 5);
        assert_eq!(filters.sort, "-id");
    }
}
