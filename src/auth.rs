//! Registration and password authentication.
//!
//! These functions hash or verify with bcrypt and are meant to run on the
//! blocking pool.

use anyhow::{Context, Result};
use bcrypt::{hash, verify};
use serde::Deserialize;
use tracing::{info, warn};

use crate::config::AdminSeed;
use crate::db::{Database, StoreError};
use crate::error::{ApiError, ApiResult};
use crate::models::{Account, NewAccount, Role};

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Body of `POST /auth/register`. Any `isActive` key is ignored.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub user_type: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone: String,
    pub national_id: Option<String>,
}

impl Registration {
    /// Checks the form and splits it into the account to create and the
    /// plaintext password.
    ///
    /// # Errors
    ///
    /// [`ApiError::Validation`] naming the first field that is wrong.
    pub fn validate(self, allow_admin: bool) -> ApiResult<(NewAccount, String)> {
        let email = normalize_email(&self.email);
        if email.is_empty() {
            return Err(ApiError::validation("Email is required"));
        }
        if !email.contains('@') {
            return Err(ApiError::validation("Please provide a valid email"));
        }
        if self.password.len() < MIN_PASSWORD_LEN {
            return Err(ApiError::validation(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }
        let role = Role::parse(&self.user_type)
            .ok_or_else(|| ApiError::validation("Invalid user type"))?;
        if role == Role::Admin && !allow_admin {
            return Err(ApiError::validation(
                "Admin accounts cannot be created through registration",
            ));
        }
        if self.name.trim().is_empty() {
            return Err(ApiError::validation("Name is required"));
        }
        if self.phone.trim().is_empty() {
            return Err(ApiError::validation("Phone number is required"));
        }

        let account = NewAccount {
            email,
            role,
            name: self.name.trim().to_string(),
            phone: self.phone.trim().to_string(),
            national_id: self
                .national_id
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty()),
        };
        Ok((account, self.password))
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Hashes `password` and stores the new account.
///
/// # Errors
///
/// [`ApiError::DuplicateEmail`] if the email is taken.
pub fn register(db: &Database, account: &NewAccount, password: &str, cost: u32) -> ApiResult<Account> {
    let password_hash = hash(password, cost).context("Failed to hash password")?;
    let created = db.create_account(account, &password_hash)?;
    info!(
        account_id = created.id,
        email = %created.email,
        role = %created.role(),
        "User registered"
    );
    Ok(created)
}

/// Checks an email and password pair.
///
/// Unknown emails and wrong passwords produce the same error; only the log
/// tells them apart. Inactive accounts authenticate normally.
pub fn authenticate(db: &Database, credentials: &Credentials) -> ApiResult<Account> {
    let email = normalize_email(&credentials.email);
    if email.is_empty() || credentials.password.is_empty() {
        return Err(ApiError::validation("Please provide email and password"));
    }

    let Some((id, stored_hash)) = db.credentials_by_email(&email)? else {
        info!(%email, "Login failed: user not found");
        return Err(ApiError::InvalidCredentials);
    };

    if !verify(&credentials.password, &stored_hash).context("Failed to verify password")? {
        info!(%email, "Login failed: invalid password");
        return Err(ApiError::InvalidCredentials);
    }

    let account = db.account(id)?.ok_or(ApiError::InvalidCredentials)?;
    if !account.is_active {
        info!(%email, "Login notice: account not activated yet");
    }
    info!(account_id = account.id, role = %account.role(), "Login successful");
    Ok(account)
}

/// Creates the configured admin account unless one with that email exists.
///
/// # Returns
///
/// The new admin, or `None` when nothing had to be created.
pub fn bootstrap_admin(db: &Database, seed: &AdminSeed, cost: u32) -> Result<Option<Account>> {
    let email = normalize_email(&seed.email);
    if let Some(existing) = db.account_by_email(&email)? {
        if existing.role() != Role::Admin {
            warn!(%email, "Bootstrap admin email belongs to a non-admin account");
        }
        return Ok(None);
    }

    let account = NewAccount {
        email,
        role: Role::Admin,
        name: seed.name.clone(),
        phone: seed.phone.clone(),
        national_id: None,
    };
    let password_hash = hash(&seed.password, cost).context("Failed to hash admin password")?;
    match db.create_account(&account, &password_hash) {
        Ok(admin) => {
            info!(account_id = admin.id, email = %admin.email, "Created bootstrap admin");
            Ok(Some(admin))
        }
        Err(StoreError::DuplicateEmail) => Ok(None),
        Err(e) => Err(e).context("Failed to create bootstrap admin"),
    }
}
