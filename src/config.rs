//! Server configuration, read from the environment.

use anyhow::{anyhow, Context, Result};
use std::{env, fmt::Display, fs::read_to_string, path::PathBuf, str::FromStr, time::Duration};
use tracing::{info, warn};

/// Credentials for the admin account created at startup when none exists.
#[derive(Debug, Clone)]
pub struct AdminSeed {
    pub email: String,
    pub password: String,
    pub name: String,
    pub phone: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: PathBuf,
    pub jwt_secret: String,
    pub session_ttl: Duration,
    pub bcrypt_cost: u32,
    /// Whether `POST /auth/register` accepts `userType: "admin"`.
    pub allow_admin_signup: bool,
    pub bootstrap_admin: Option<AdminSeed>,
    pub email_from: String,
}

impl Config {
    /// Reads the configuration from environment variables.
    ///
    /// `JWT_SECRET` is required and may come from `/run/secrets/JWT_SECRET`
    /// instead of the environment. Everything else has a default.
    ///
    /// # Errors
    ///
    /// Returns an error if the secret is missing or a variable doesn't parse.
    pub fn load() -> Result<Self> {
        let bootstrap_admin = match (var("ADMIN_EMAIL"), var("ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(AdminSeed {
                email,
                password,
                name: var("ADMIN_NAME").unwrap_or_else(|| "Administrator".to_string()),
                phone: var("ADMIN_PHONE").unwrap_or_else(|| "01000000000".to_string()),
            }),
            (Some(_), None) | (None, Some(_)) => {
                warn!("ADMIN_EMAIL and ADMIN_PASSWORD must both be set, skipping admin bootstrap");
                None
            }
            (None, None) => None,
        };

        Ok(Self {
            port: try_load("PORT", "3000")?,
            database_path: try_load("DATABASE_PATH", "homecare.db")?,
            jwt_secret: read_secret("JWT_SECRET")?,
            session_ttl: session_ttl(try_load("SESSION_TTL_SECS", "604800")?)?,
            bcrypt_cost: try_load("BCRYPT_COST", "12")?,
            allow_admin_signup: try_load("ALLOW_ADMIN_SIGNUP", "false")?,
            bootstrap_admin,
            email_from: try_load("EMAIL_FROM", "no-reply@homecare.local")?,
        })
    }

    /// Defaults for everything but the signing secret.
    pub fn with_secret(jwt_secret: impl Into<String>) -> Self {
        Self {
            port: 3000,
            database_path: PathBuf::from("homecare.db"),
            jwt_secret: jwt_secret.into(),
            session_ttl: Duration::from_secs(7 * 24 * 60 * 60),
            bcrypt_cost: bcrypt::DEFAULT_COST,
            allow_admin_signup: false,
            bootstrap_admin: None,
            email_from: "no-reply@homecare.local".to_string(),
        }
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T>
where
    T::Err: Display,
{
    let raw = var(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });
    raw.parse()
        .map_err(|e| anyhow!("Invalid {key} value {raw:?}: {e}"))
}

/// Longest accepted session lifetime; keeps `iat + ttl` inside `i64`.
const MAX_SESSION_TTL_SECS: u64 = (i64::MAX / 2) as u64;

fn session_ttl(secs: u64) -> Result<Duration> {
    if !(1..=MAX_SESSION_TTL_SECS).contains(&secs) {
        return Err(anyhow!(
            "Invalid SESSION_TTL_SECS value {secs}: must be between 1 and {MAX_SESSION_TTL_SECS}"
        ));
    }
    Ok(Duration::from_secs(secs))
}

fn read_secret(name: &str) -> Result<String> {
    if let Some(value) = var(name) {
        return Ok(value);
    }

    let path = format!("/run/secrets/{name}");
    let secret = read_to_string(&path)
        .with_context(|| format!("{name} is not set and {path} could not be read"))?;
    let secret = secret.trim().to_string();
    if secret.is_empty() {
        return Err(anyhow!("{path} is empty"));
    }
    Ok(secret)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_typed_values() {
        let port: u16 = try_load("HOMECARE_TEST_UNSET_PORT", "8080").unwrap();
        assert_eq!(port, 8080);
        let flag: bool = try_load("HOMECARE_TEST_UNSET_FLAG", "false").unwrap();
        assert!(!flag);
        assert!(try_load::<u16>("HOMECARE_TEST_UNSET_BAD", "not-a-port").is_err());
    }

    #[test]
    fn session_ttl_is_bounded() {
        assert_eq!(session_ttl(60).unwrap(), Duration::from_secs(60));
        assert!(session_ttl(MAX_SESSION_TTL_SECS).is_ok());
        assert!(session_ttl(0).is_err());
        assert!(session_ttl(MAX_SESSION_TTL_SECS + 1).is_err());
        assert!(session_ttl(u64::MAX).is_err());
    }

    #[test]
    fn defaults_keep_the_secret() {
        let config = Config::with_secret("s3cret");
        assert_eq!(config.jwt_secret, "s3cret");
        assert_eq!(config.session_ttl, Duration::from_secs(604_800));
        assert!(!config.allow_admin_signup);
    }
}
