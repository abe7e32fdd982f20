// src/auth.rs
// Passwords are stored as `pbkdf2_sha256$<iterations>$<salt hex>$<hash hex>`.
use axum::{extract::FromRequestParts, http::request::Parts};
use chrono::{Duration, Utc};
use http::{header, HeaderMap};
use pbkdf2::pbkdf2_hmac;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    error::AppError,
    forms::{FieldErrors, LoginForm, RegisterForm, NON_FIELD_ERRORS},
    models::User,
    state::AppState,
    store::{AccountStore, StoreError},
};

pub const SESSION_COOKIE: &str = "sessionid";

const HASH_ALGORITHM: &str = "pbkdf2_sha256";
const HASH_LENGTH: usize = 32;

pub fn hash_password(password: &str, iterations: u32) -> String {
    let salt = Uuid::new_v4().into_bytes();
    let mut hash = [0u8; HASH_LENGTH];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, iterations, &mut hash);

    format!(
        "{HASH_ALGORITHM}${iterations}${}${}",
        hex::encode(salt),
        hex::encode(hash)
    )
}

pub fn verify_password(password: &str, encoded: &str) -> bool {
    let mut parts = encoded.split('$');
    let (Some(HASH_ALGORITHM), Some(iterations), Some(salt), Some(expected), None) = (
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
        parts.next(),
    ) else {
        return false;
    };

    let (Ok(iterations), Ok(salt), Ok(expected)) = (
        iterations.parse::<u32>(),
        hex::decode(salt),
        hex::decode(expected),
    ) else {
        return false;
    };

    let mut hash = [0u8; HASH_LENGTH];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, iterations, &mut hash);

    hash.as_slice().ct_eq(expected.as_slice()).into()
}

/// Reads the session token from the `Cookie` header, if any.
pub fn session_token(headers: &HeaderMap) -> Option<Uuid> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| Uuid::parse_str(value.trim()).ok())
}

pub fn session_cookie(token: Uuid, ttl_days: i64) -> String {
    format!(
        "{SESSION_COOKIE}={token}; Max-Age={}; Path=/; HttpOnly; SameSite=Lax",
        ttl_days * 24 * 60 * 60
    )
}

pub fn expired_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; Max-Age=0; Path=/; HttpOnly; SameSite=Lax")
}

/// Validates the form, creates the account and opens a session for it.
pub async fn register(
    accounts: &dyn AccountStore,
    form: &RegisterForm,
    iterations: u32,
    ttl_days: i64,
) -> Result<(User, Uuid), AppError> {
    let credentials = form.validate().map_err(AppError::Validation)?;

    let taken = || {
        AppError::Validation(FieldErrors::single(
            "username",
            "A user with that username already exists.",
        ))
    };
    if accounts.find_user(&credentials.username).await?.is_some() {
        return Err(taken());
    }

    let password_hash = hash_password(&credentials.password, iterations);
    let user = match accounts
        .create_user(&credentials.username, &password_hash)
        .await
    {
        Ok(user) => user,
        Err(StoreError::DuplicateUsername(_)) => return Err(taken()),
        Err(e) => return Err(e.into()),
    };
    info!(user_id = user.id, username = %user.username, "Registered user");

    let token = open_session(accounts, &user, ttl_days).await?;
    Ok((user, token))
}

/// Checks the credentials and opens a session on success.
pub async fn login(
    accounts: &dyn AccountStore,
    form: &LoginForm,
    ttl_days: i64,
) -> Result<(User, Uuid), AppError> {
    let credentials = form.validate().map_err(AppError::Validation)?;

    let user = accounts
        .find_user(&credentials.username)
        .await?
        .filter(|user| verify_password(&credentials.password, &user.password_hash));

    let Some(user) = user else {
        warn!(username = %credentials.username, "Failed login attempt");
        return Err(AppError::Validation(FieldErrors::single(
            NON_FIELD_ERRORS,
            "Please enter a correct username and password. Note that both fields may be case-sensitive.",
        )));
    };

    let token = open_session(accounts, &user, ttl_days).await?;
    Ok((user, token))
}

pub async fn logout(accounts: &dyn AccountStore, token: Option<Uuid>) -> Result<(), AppError> {
    if let Some(token) = token {
        accounts.delete_session(token).await?;
    }
    Ok(())
}

async fn open_session(
    accounts: &dyn AccountStore,
    user: &User,
    ttl_days: i64,
) -> Result<Uuid, AppError> {
    let expires_at = Utc::now() + Duration::days(ttl_days);
    Ok(accounts.create_session(user.id, expires_at).await?)
}

/// The identity behind the request's session cookie, `None` when anonymous.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Option<User>);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let Some(token) = session_token(&parts.headers) else {
            return Ok(CurrentUser(None));
        };

        let user = state.accounts.session_user(token, Utc::now()).await?;
        Ok(CurrentUser(user))
    }
}
