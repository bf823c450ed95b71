//! Users: registration, activation and the user table.

mod db;
mod domain;
mod password;
mod register;

pub use db::{
    create_user_table, delete_user, get_user_by_code_and_email, get_user_by_email,
    get_user_by_id, insert_user, update_user,
};
pub use domain::{NewUser, User, UserDto, UserID, validate_email, validate_user};
pub(crate) use domain::non_empty;
pub use password::{PasswordHash, validate_password_plaintext};
pub use register::{activate_user, register_user};
