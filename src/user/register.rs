//! Endpoints for registering and activating users.

use axum::{
    Json,
    extract::{FromRef, State},
    http::StatusCode,
    response::IntoResponse,
};
use rand::Rng;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{
    AppState, Error,
    store::StoreHandle,
    user::{
        NewUser, PasswordHash, UserDto, get_user_by_code_and_email, insert_user, update_user,
        validate_email, validate_password_plaintext, validate_user,
    },
    validator::Validator,
};

/// The state needed to register a user.
#[derive(Debug, Clone)]
pub struct RegistrationState {
    /// The shared database handle.
    pub store: StoreHandle,
    /// The bcrypt cost used to hash new passwords.
    pub password_cost: u32,
}

impl FromRef<AppState> for RegistrationState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            password_cost: state.password_cost,
        }
    }
}

/// The request body for registering a user.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegisterForm {
    name: String,
    email: String,
    phone: String,
    password: String,
}

/// The request body for activating a user.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ActivationForm {
    cod: i64,
    email: String,
}

fn generate_activation_code() -> i64 {
    rand::thread_rng().gen_range(100_000..=999_999)
}

/// A route handler for registering a new, inactive user.
///
/// The activation code is only written to the debug log, there is no email delivery.
///
/// # Errors
///
/// - [Error::Validation] if a field is missing or malformed.
/// - [Error::DuplicateEmail] if the email address is taken.
pub async fn register_user(
    State(state): State<RegistrationState>,
    Json(form): Json<RegisterForm>,
) -> Result<impl IntoResponse, Error> {
    let mut validator = Validator::new();
    validate_user(&mut validator, &form.name, &form.phone, &form.email);
    validate_password_plaintext(&mut validator, &form.password);
    validator.finish()?;

    let password_hash = PasswordHash::new(&form.password, state.password_cost)?;
    let activation_code = generate_activation_code();
    let new_user = NewUser {
        name: form.name,
        email: form.email,
        phone: form.phone,
        activation_code,
        password_hash,
    };

    let user = state
        .store
        .run(|connection| insert_user(new_user, connection))?;

    tracing::debug!("Activation code for user {}: {}", user.id, activation_code);

    Ok((
        StatusCode::CREATED,
        Json(json!({ "user": UserDto::from(&user) })),
    ))
}

/// A route handler that activates the user matching the submitted code and email address.
///
/// # Errors
///
/// - [Error::Validation] if the email address is malformed.
/// - [Error::InvalidActivationCode] if no inactive user matches the pair.
pub async fn activate_user(
    State(store): State<StoreHandle>,
    Json(form): Json<ActivationForm>,
) -> Result<Json<Value>, Error> {
    let mut validator = Validator::new();
    validate_email(&mut validator, &form.email);
    validator.finish()?;

    let user = store.run(|connection| {
        let mut user = get_user_by_code_and_email(form.cod, &form.email, connection).map_err(
            |error| match error {
                Error::NotFound => Error::InvalidActivationCode,
                error => error,
            },
        )?;

        user.activated = true;
        user.activation_code = 0;
        user.version = update_user(&user, connection)?;

        Ok(user)
    })?;

    Ok(Json(json!({ "user": UserDto::from(&user) })))
}
