//! The wire representation of a category, used both for responses and for create and
//! merge-patch update requests.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    Error,
    category::{
        Category, CategoryId, CategoryType, NewCategory, parse_category_type, validate_category,
    },
    database_id::Version,
    user::{User, UserDto, non_empty},
    validator::Validator,
};

/// A category as sent to and received from clients.
///
/// Every field is optional. When rendering, fields holding an empty value are omitted. When
/// patching, only the fields that are present overwrite the stored category.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<CategoryId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tipo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<Version>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserDto>,
    #[serde(
        default,
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<OffsetDateTime>,
}

impl CategoryDto {
    /// Render `category` for `owner`, omitting empty fields.
    pub fn from_category(category: &Category, owner: &User) -> Self {
        Self {
            category_id: (category.id != 0).then_some(category.id),
            name: non_empty(&category.name),
            tipo: Some(category.category_type.wire_name().to_owned()),
            color: non_empty(&category.color),
            version: (category.version != 0).then_some(category.version),
            user: Some(UserDto::from(owner)),
            created_at: Some(category.created_at),
        }
    }

    /// Read a category to create from the request body.
    ///
    /// Absent fields are treated as empty. The ID, version, owner and timestamp are assigned
    /// by the server and ignored here.
    ///
    /// # Errors
    ///
    /// Returns [Error::Validation] if the name, type or color are missing or invalid.
    pub fn into_new_category(self) -> Result<NewCategory, Error> {
        let mut validator = Validator::new();

        let category_type = parse_category_type(&mut validator, self.tipo.as_deref());
        let name = self.name.unwrap_or_default();
        let color = self.color.unwrap_or_default();
        validate_category(&mut validator, &name, &color);

        validator.finish()?;

        Ok(NewCategory {
            name,
            category_type: category_type.unwrap_or_default(),
            color,
        })
    }

    /// Merge the fields present in this DTO into `category`.
    ///
    /// A present `version` replaces the version used for the conflict check. The ID, owner and
    /// timestamp cannot be changed and are ignored.
    ///
    /// # Errors
    ///
    /// Returns [Error::Validation] if the merged category is invalid.
    pub fn apply_to(self, mut category: Category) -> Result<Category, Error> {
        let mut validator = Validator::new();

        if let Some(name) = self.name {
            category.name = name;
        }

        if let Some(tipo) = self.tipo {
            if let Some(category_type) = parse_category_type(&mut validator, Some(&tipo)) {
                category.category_type = category_type;
            }
        }

        if let Some(color) = self.color {
            category.color = color;
        }

        if let Some(version) = self.version {
            category.version = version;
        }

        validate_category(&mut validator, &category.name, &category.color);
        validator.finish()?;

        Ok(category)
    }
}

#[cfg(test)]
mod category_dto_tests {
    use serde_json::json;
    use time::{OffsetDateTime, macros::datetime};

    use crate::{
        Error,
        category::{Category, CategoryType},
        user::{PasswordHash, User, UserID},
    };

    use super::CategoryDto;

    fn get_user() -> User {
        User {
            id: UserID::new(42),
            created_at: OffsetDateTime::UNIX_EPOCH,
            name: "Alice".to_owned(),
            email: "alice@example.com".to_owned(),
            phone: "555".to_owned(),
            activation_code: 0,
            password_hash: PasswordHash::new_unchecked("hash"),
            activated: true,
            version: 2,
        }
    }

    fn get_category() -> Category {
        Category {
            id: 3,
            created_at: datetime!(2024-05-01 12:00:00 UTC),
            name: "Groceries".to_owned(),
            category_type: CategoryType::Expense,
            color: "#fff".to_owned(),
            user_id: UserID::new(42),
            version: 1,
        }
    }

    #[test]
    fn renders_wire_fields() {
        let got = serde_json::to_value(CategoryDto::from_category(&get_category(), &get_user()))
            .unwrap();

        assert_eq!(
            got,
            json!({
                "category_id": 3,
                "name": "Groceries",
                "tipo": "Despesa",
                "color": "#fff",
                "version": 1,
                "user": {
                    "user_id": 42,
                    "name": "Alice",
                    "email": "alice@example.com",
                    "phone": "555",
                    "activated": true,
                },
                "created_at": "2024-05-01T12:00:00Z",
            })
        );
    }

    #[test]
    fn empty_fields_are_omitted() {
        let mut category = get_category();
        category.color = String::new();

        let got = serde_json::to_value(CategoryDto::from_category(&category, &get_user()))
            .unwrap();

        assert!(got.get("color").is_none());
        assert!(got.get("created_at").is_some());
    }

    #[test]
    fn empty_patch_changes_nothing() {
        let category = get_category();

        assert_eq!(CategoryDto::default().apply_to(category.clone()), Ok(category));
    }

    #[test]
    fn patch_overwrites_only_present_fields() {
        let patch = CategoryDto {
            name: Some("Food".to_owned()),
            tipo: Some("Receita".to_owned()),
            ..Default::default()
        };

        let got = patch.apply_to(get_category()).unwrap();

        assert_eq!(got.name, "Food");
        assert_eq!(got.category_type, CategoryType::Income);
        assert_eq!(got.color, "#fff");
        assert_eq!(got.version, 1);
    }

    #[test]
    fn patch_cannot_change_identity() {
        let patch = CategoryDto {
            category_id: Some(99),
            created_at: Some(OffsetDateTime::UNIX_EPOCH),
            ..Default::default()
        };

        assert_eq!(patch.apply_to(get_category()), Ok(get_category()));
    }

    #[test]
    fn patch_with_version_uses_it_for_conflict_check() {
        let patch = CategoryDto {
            version: Some(7),
            ..Default::default()
        };

        assert_eq!(patch.apply_to(get_category()).unwrap().version, 7);
    }

    #[test]
    fn patch_to_empty_name_fails() {
        let patch = CategoryDto {
            name: Some(String::new()),
            ..Default::default()
        };

        assert!(matches!(
            patch.apply_to(get_category()),
            Err(Error::Validation(errors)) if errors["name"] == "must be provided"
        ));
    }

    #[test]
    fn patch_with_unknown_type_fails() {
        let patch = CategoryDto {
            tipo: Some("Unknown".to_owned()),
            ..Default::default()
        };

        assert!(matches!(
            patch.apply_to(get_category()),
            Err(Error::Validation(errors)) if errors["tipo"] == "must be either Receita or Despesa"
        ));
    }

    #[test]
    fn new_category_from_complete_dto() {
        let dto: CategoryDto =
            serde_json::from_value(json!({ "name": "Wages", "tipo": "Receita", "color": "#0f0" }))
                .unwrap();

        let got = dto.into_new_category().unwrap();

        assert_eq!(got.name, "Wages");
        assert_eq!(got.category_type, CategoryType::Income);
        assert_eq!(got.color, "#0f0");
    }

    #[test]
    fn new_category_reports_missing_fields() {
        let got = CategoryDto::default().into_new_category();

        assert!(matches!(
            got,
            Err(Error::Validation(errors)) if errors.len() == 3
        ));
    }
}
