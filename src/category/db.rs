//! The category table and the SQLite backed category store.

use rusqlite::{Connection, Row, ToSql, params, params_from_iter};

use crate::{
    Error,
    category::{Category, CategoryId, NewCategory},
    database_id::Version,
    db::{
        OwnedTable, compare_and_swap, get_timestamp, now_utc, push_text_search, search_key,
        soft_delete, where_clause,
    },
    pagination::{Filters, Paginated, calculate_metadata},
    store::{OwnedStore, StoreHandle},
    user::UserID,
};

/// The sort keys accepted when listing categories.
pub const CATEGORY_SORT_SAFELIST: &[&str] = &["id", "name", "-id", "-name"];

pub(crate) const CATEGORY_COLUMNS: &str = "c.id, c.created_at, c.name, c.type, c.color, c.user_id, c.version";

/// Create the category table.
///
/// Names are unique per user, ignoring case, among categories that have not been deleted.
/// Case is folded through `name_key`, which holds the [search_key] of the name.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_category_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "CREATE TABLE IF NOT EXISTS category (
                id INTEGER PRIMARY KEY,
                created_at INTEGER NOT NULL,
                name TEXT NOT NULL,
                name_key TEXT NOT NULL,
                type TEXT NOT NULL CHECK (type IN ('Income', 'Expense')),
                color TEXT NOT NULL,
                user_id INTEGER NOT NULL,
                version INTEGER NOT NULL DEFAULT 1,
                deleted INTEGER NOT NULL DEFAULT 0,
                FOREIGN KEY(user_id) REFERENCES user(id) ON UPDATE CASCADE ON DELETE CASCADE
                );
        CREATE UNIQUE INDEX IF NOT EXISTS category_user_name
            ON category (user_id, name_key) WHERE deleted = 0;",
    )?;

    Ok(())
}

fn map_category_row(row: &Row) -> Result<Category, rusqlite::Error> {
    map_category_columns(row, 0)
}

/// Read the category columns, in the order of [CATEGORY_COLUMNS], starting at column `offset`.
pub(crate) fn map_category_columns(row: &Row, offset: usize) -> Result<Category, rusqlite::Error> {
    Ok(Category {
        id: row.get(offset)?,
        created_at: get_timestamp(row, offset + 1)?,
        name: row.get(offset + 2)?,
        category_type: row.get(offset + 3)?,
        color: row.get(offset + 4)?,
        user_id: row.get(offset + 5)?,
        version: row.get(offset + 6)?,
    })
}

/// Insert a category owned by `owner`.
///
/// # Errors
///
/// - [Error::DuplicateName] if `owner` already has a live category with the same name.
/// - [Error::SqlError] if there is some other SQL error.
pub fn insert_category(
    new_category: NewCategory,
    owner: UserID,
    connection: &Connection,
) -> Result<Category, Error> {
    let created_at = now_utc();

    let (id, version) = connection.query_row(
        "INSERT INTO category (created_at, name, name_key, type, color, user_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         RETURNING id, version",
        (
            created_at.unix_timestamp(),
            &new_category.name,
            search_key(&new_category.name),
            new_category.category_type,
            &new_category.color,
            owner,
        ),
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    Ok(Category {
        id,
        created_at,
        name: new_category.name,
        category_type: new_category.category_type,
        color: new_category.color,
        user_id: owner,
        version,
    })
}

/// Get the live category `id` owned by `owner`.
///
/// # Errors
///
/// Returns [Error::NotFound] if there is no such category.
pub fn get_category(
    id: CategoryId,
    owner: UserID,
    connection: &Connection,
) -> Result<Category, Error> {
    connection
        .query_row(
            &format!(
                "SELECT {CATEGORY_COLUMNS} FROM category c
                 WHERE c.id = ?1 AND c.user_id = ?2 AND c.deleted = 0"
            ),
            (id, owner),
            map_category_row,
        )
        .map_err(Error::from)
}

/// Get a page of the live categories owned by `owner` whose name contains every term in
/// `name_query`.
///
/// # Errors
///
/// Returns [Error::Validation] if the sort key in `filters` is not allow-listed.
pub fn search_categories(
    name_query: &str,
    owner: UserID,
    filters: &Filters,
    connection: &Connection,
) -> Result<Paginated<Category>, Error> {
    let order_by = filters.sort_key()?.order_by("c");

    let mut conditions = vec!["c.user_id = ?".to_owned(), "c.deleted = 0".to_owned()];
    let mut params: Vec<Box<dyn ToSql>> = vec![Box::new(owner)];
    push_text_search("c.name_key", name_query, &mut conditions, &mut params);
    let where_clause = where_clause(&conditions);

    let total_records: i64 = connection.query_row(
        &format!("SELECT COUNT(*) FROM category c {where_clause}"),
        params_from_iter(params.iter()),
        |row| row.get(0),
    )?;

    params.push(Box::new(filters.limit()));
    params.push(Box::new(filters.offset()));

    let records = connection
        .prepare(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM category c {where_clause} {order_by} LIMIT ? OFFSET ?"
        ))?
        .query_map(params_from_iter(params.iter()), map_category_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Paginated {
        records,
        metadata: calculate_metadata(total_records, filters.page, filters.page_size),
    })
}

/// Overwrite the name, type and color of the live category `category.id` if its stored version
/// equals `category.version`.
///
/// # Errors
///
/// - [Error::EditConflict] if the stored version differs.
/// - [Error::NotFound] if there is no live category owned by `owner`.
/// - [Error::DuplicateName] if the new name collides with another live category.
pub fn update_category(
    category: &Category,
    owner: UserID,
    connection: &Connection,
) -> Result<Version, Error> {
    compare_and_swap(
        connection,
        OwnedTable::Category,
        category.id,
        owner,
        category.version,
        "name = ?1, name_key = ?2, type = ?3, color = ?4",
        params![
            category.name,
            search_key(&category.name),
            category.category_type,
            category.color
        ],
    )
}

/// Stores categories in a SQLite database.
#[derive(Debug, Clone)]
pub struct SQLiteCategoryStore {
    handle: StoreHandle,
}

impl SQLiteCategoryStore {
    /// Create a new store on the shared database `handle`.
    pub fn new(handle: StoreHandle) -> Self {
        Self { handle }
    }
}

/// The filters for listing categories.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CategorySearch {
    /// Every whitespace separated term must appear in the category name.
    pub name: String,
}

impl OwnedStore for SQLiteCategoryStore {
    type Entity = Category;
    type NewEntity = NewCategory;
    type Search = CategorySearch;

    const RESOURCE: &'static str = "category";

    fn insert(&self, new_category: NewCategory, owner: UserID) -> Result<Category, Error> {
        self.handle
            .run(|connection| insert_category(new_category, owner, connection))
    }

    fn get(&self, id: CategoryId, owner: UserID) -> Result<Category, Error> {
        self.handle
            .run(|connection| get_category(id, owner, connection))
    }

    fn search(
        &self,
        search: &CategorySearch,
        owner: UserID,
        filters: &Filters,
    ) -> Result<Paginated<Category>, Error> {
        self.handle
            .run(|connection| search_categories(&search.name, owner, filters, connection))
    }

    fn update(&self, category: &Category, owner: UserID) -> Result<Version, Error> {
        self.handle
            .run(|connection| update_category(category, owner, connection))
    }

    fn delete(&self, id: CategoryId, owner: UserID, version: Version) -> Result<(), Error> {
        self.handle.run(|connection| {
            soft_delete(connection, OwnedTable::Category, id, owner, version)
        })
    }
}

#[cfg(test)]
mod category_store_tests {
    use crate::{
        Error,
        category::{CategorySearch, CategoryType, NewCategory, SQLiteCategoryStore},
        pagination::{Filters, Metadata},
        store::OwnedStore,
        test_utils::{create_activated_user, get_test_app_state},
        user::UserID,
    };

    use super::CATEGORY_SORT_SAFELIST;

    fn new_category(name: &str) -> NewCategory {
        NewCategory {
            name: name.to_owned(),
            category_type: CategoryType::Expense,
            color: "#fff".to_owned(),
        }
    }

    fn filters(page: i64, page_size: i64, sort: &str) -> Filters {
        Filters {
            page,
            page_size,
            sort: sort.to_owned(),
            sort_safelist: CATEGORY_SORT_SAFELIST,
        }
    }

    fn get_store_and_users() -> (SQLiteCategoryStore, UserID, UserID) {
        let state = get_test_app_state();
        let alice = create_activated_user(&state, "alice@example.com").id;
        let bob = create_activated_user(&state, "bob@example.com").id;

        (SQLiteCategoryStore::new(state.store.clone()), alice, bob)
    }

    #[test]
    fn insert_assigns_id_version_and_timestamp() {
        let (store, alice, _) = get_store_and_users();

        let category = store.insert(new_category("Groceries"), alice).unwrap();

        assert!(category.id > 0);
        assert_eq!(category.version, 1);
        assert_eq!(category.user_id, alice);
        assert_eq!(store.get(category.id, alice), Ok(category));
    }

    #[test]
    fn insert_duplicate_name_for_same_user_fails() {
        let (store, alice, _) = get_store_and_users();
        store.insert(new_category("Groceries"), alice).unwrap();

        assert_eq!(
            store.insert(new_category("groceries"), alice),
            Err(Error::DuplicateName)
        );
    }

    #[test]
    fn duplicate_name_differing_in_accented_case_fails() {
        let (store, alice, _) = get_store_and_users();
        store.insert(new_category("Educação"), alice).unwrap();

        assert_eq!(
            store.insert(new_category("EDUCAÇÃO"), alice),
            Err(Error::DuplicateName)
        );
    }

    #[test]
    fn update_to_name_differing_in_accented_case_is_duplicate() {
        let (store, alice, _) = get_store_and_users();
        store.insert(new_category("Educação"), alice).unwrap();
        let mut category = store.insert(new_category("Saúde"), alice).unwrap();
        category.name = "EDUCAÇÃO".to_owned();

        assert_eq!(store.update(&category, alice), Err(Error::DuplicateName));
    }

    #[test]
    fn same_name_for_different_users_succeeds() {
        let (store, alice, bob) = get_store_and_users();
        store.insert(new_category("Groceries"), alice).unwrap();

        assert!(store.insert(new_category("Groceries"), bob).is_ok());
    }

    #[test]
    fn name_is_reusable_after_delete() {
        let (store, alice, _) = get_store_and_users();
        let category = store.insert(new_category("Groceries"), alice).unwrap();
        store.delete(category.id, alice, category.version).unwrap();

        assert!(store.insert(new_category("Groceries"), alice).is_ok());
    }

    #[test]
    fn get_other_users_category_is_not_found() {
        let (store, alice, bob) = get_store_and_users();
        let category = store.insert(new_category("Groceries"), alice).unwrap();

        assert_eq!(store.get(category.id, bob), Err(Error::NotFound));
    }

    #[test]
    fn update_increments_version() {
        let (store, alice, _) = get_store_and_users();
        let mut category = store.insert(new_category("Groceries"), alice).unwrap();
        category.name = "Food".to_owned();
        category.category_type = CategoryType::Income;

        let version = store.update(&category, alice).unwrap();

        assert_eq!(version, 2);
        let stored = store.get(category.id, alice).unwrap();
        assert_eq!(stored.name, "Food");
        assert_eq!(stored.category_type, CategoryType::Income);
        assert_eq!(stored.version, 2);
    }

    #[test]
    fn concurrent_update_with_stale_version_is_conflict() {
        let (store, alice, _) = get_store_and_users();
        let category = store.insert(new_category("Groceries"), alice).unwrap();
        let mut first = category.clone();
        first.color = "#000".to_owned();
        let mut second = category.clone();
        second.color = "#123".to_owned();

        assert_eq!(store.update(&first, alice), Ok(2));
        assert_eq!(store.update(&second, alice), Err(Error::EditConflict));
        assert_eq!(store.get(category.id, alice).unwrap().color, "#000");
    }

    #[test]
    fn update_to_taken_name_is_duplicate() {
        let (store, alice, _) = get_store_and_users();
        store.insert(new_category("Groceries"), alice).unwrap();
        let mut category = store.insert(new_category("Rent"), alice).unwrap();
        category.name = "GROCERIES".to_owned();

        assert_eq!(store.update(&category, alice), Err(Error::DuplicateName));
    }

    #[test]
    fn delete_twice_is_not_found() {
        let (store, alice, _) = get_store_and_users();
        let category = store.insert(new_category("Groceries"), alice).unwrap();

        assert_eq!(store.delete(category.id, alice, 1), Ok(()));
        assert_eq!(store.delete(category.id, alice, 1), Err(Error::NotFound));
        assert_eq!(store.delete(category.id, alice, 2), Err(Error::NotFound));
        assert_eq!(store.get(category.id, alice), Err(Error::NotFound));
    }

    #[test]
    fn delete_with_stale_version_is_conflict() {
        let (store, alice, _) = get_store_and_users();
        let category = store.insert(new_category("Groceries"), alice).unwrap();
        store.update(&category, alice).unwrap();

        assert_eq!(
            store.delete(category.id, alice, category.version),
            Err(Error::EditConflict)
        );
    }

    #[test]
    fn search_pages_by_sort_key() {
        let (store, alice, bob) = get_store_and_users();
        for name in ["Rent", "Groceries", "Wages", "Eating Out", "Bills"] {
            store.insert(new_category(name), alice).unwrap();
        }
        store.insert(new_category("Other user"), bob).unwrap();

        let page = store
            .search(&CategorySearch::default(), alice, &filters(2, 2, "name"))
            .unwrap();

        let names: Vec<_> = page.records.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Groceries", "Rent"]);
        assert_eq!(
            page.metadata,
            Metadata {
                current_page: 2,
                page_size: 2,
                first_page: 1,
                last_page: 3,
                total_records: 5,
            }
        );
    }

    #[test]
    fn search_descending_id() {
        let (store, alice, _) = get_store_and_users();
        let ids: Vec<_> = ["A", "B", "C"]
            .into_iter()
            .map(|name| store.insert(new_category(name), alice).unwrap().id)
            .collect();

        let page = store
            .search(&CategorySearch::default(), alice, &filters(1, 10, "-id"))
            .unwrap();

        let got: Vec<_> = page.records.iter().map(|c| c.id).collect();
        assert_eq!(got, ids.into_iter().rev().collect::<Vec<_>>());
    }

    #[test]
    fn search_matches_every_name_term() {
        let (store, alice, _) = get_store_and_users();
        for name in ["Eating Out", "Eating In", "Going Out"] {
            store.insert(new_category(name), alice).unwrap();
        }
        let search = CategorySearch {
            name: "out eat".to_owned(),
        };

        let page = store.search(&search, alice, &filters(1, 10, "id")).unwrap();

        assert_eq!(page.records.len(), 1);
        assert_eq!(page.records[0].name, "Eating Out");
    }

    #[test]
    fn search_folds_non_ascii_case() {
        let (store, alice, _) = get_store_and_users();
        for name in ["Educação", "Alimentação", "Saúde"] {
            store.insert(new_category(name), alice).unwrap();
        }
        let search = CategorySearch {
            name: "AÇÃO".to_owned(),
        };

        let page = store.search(&search, alice, &filters(1, 10, "id")).unwrap();

        let names: Vec<_> = page.records.iter().map(|category| category.name.as_str()).collect();
        assert_eq!(names, vec!["Educação", "Alimentação"]);
    }

    #[test]
    fn search_excludes_deleted_categories() {
        let (store, alice, _) = get_store_and_users();
        let category = store.insert(new_category("Groceries"), alice).unwrap();
        store.delete(category.id, alice, category.version).unwrap();

        let page = store
            .search(&CategorySearch::default(), alice, &filters(1, 10, "id"))
            .unwrap();

        assert!(page.records.is_empty());
        assert_eq!(page.metadata, Metadata::default());
    }

    #[test]
    fn search_with_unlisted_sort_is_rejected() {
        let (store, alice, _) = get_store_and_users();

        let got = store.search(
            &CategorySearch::default(),
            alice,
            &filters(1, 10, "name; DROP TABLE category"),
        );

        assert!(matches!(got, Err(Error::Validation(_))));
    }
}
