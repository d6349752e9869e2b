//! Blocking HTTP client used by the console.

use anyhow::{anyhow, Context, Result};
use reqwest::blocking::{Client, RequestBuilder};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_API: &str = "http://127.0.0.1:3000/api";

/// Account as the server reports it. Only the fields the console shows.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSummary {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub phone: String,
    pub user_type: String,
    pub is_active: bool,
    #[serde(default)]
    pub profile_complete: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub registration_date: time::OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub activation_date: Option<time::OffsetDateTime>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterForm {
    pub email: String,
    pub password: String,
    pub user_type: String,
    pub name: String,
    pub phone: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub national_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionReply {
    token: String,
    user: AccountSummary,
}

#[derive(Debug, Deserialize)]
struct DataReply<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct ErrorReply {
    message: String,
}

/// A logged-in session. The token is never written anywhere.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub account: AccountSummary,
}

pub struct ApiClient {
    http: Client,
    base: String,
}

impl ApiClient {
    /// Base URL from `HOMECARE_API`, falling back to [`DEFAULT_API`].
    pub fn from_env() -> Result<Self> {
        let base = std::env::var("HOMECARE_API").unwrap_or_else(|_| DEFAULT_API.to_string());
        Self::new(&base)
    }

    pub fn new(base: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            base: base.trim_end_matches('/').to_string(),
        })
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub fn login(&self, email: &str, password: &str) -> Result<Session> {
        let request = self
            .http
            .post(self.url("/auth/login"))
            .json(&serde_json::json!({ "email": email, "password": password }));
        let reply: SessionReply = send(request)?;
        Ok(Session {
            token: reply.token,
            account: reply.user,
        })
    }

    pub fn register(&self, form: &RegisterForm) -> Result<Session> {
        let request = self.http.post(self.url("/auth/register")).json(form);
        let reply: SessionReply = send(request)?;
        Ok(Session {
            token: reply.token,
            account: reply.user,
        })
    }

    /// Re-reads the account behind `token`.
    pub fn profile(&self, token: &str) -> Result<AccountSummary> {
        let request = self.http.get(self.url("/user/profile")).bearer_auth(token);
        let reply: DataReply<AccountSummary> = send(request)?;
        Ok(reply.data)
    }
}

/// Sends `request` and decodes a success body, or turns the server's
/// `{ message }` into the error text.
fn send<T: DeserializeOwned>(request: RequestBuilder) -> Result<T> {
    let response = request.send().context("Could not reach the server")?;
    let status = response.status();
    let body = response.text().context("Failed to read response")?;

    if status.is_success() {
        return serde_json::from_str(&body).context("Unexpected response from server");
    }

    match serde_json::from_str::<ErrorReply>(&body) {
        Ok(reply) => Err(anyhow!(reply.message)),
        Err(_) => Err(anyhow!("Request failed with status {status}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_normalized() {
        let client = ApiClient::new("http://localhost:3000/api/").unwrap();
        assert_eq!(client.base(), "http://localhost:3000/api");
        assert_eq!(client.url("/auth/login"), "http://localhost:3000/api/auth/login");
    }

    #[test]
    fn account_summary_reads_server_shape() {
        let body = r#"{
            "id": 7,
            "email": "nurse@example.com",
            "name": "Mona",
            "phone": "01012345678",
            "userType": "nurse",
            "isActive": false,
            "profileComplete": false,
            "registrationDate": "2024-05-01T10:00:00Z",
            "activationDate": null,
            "availabilityStatus": false
        }"#;
        let account: AccountSummary = serde_json::from_str(body).unwrap();
        assert_eq!(account.user_type, "nurse");
        assert!(!account.is_active);
        assert!(account.activation_date.is_none());
    }

    #[test]
    fn register_form_omits_missing_national_id() {
        let form = RegisterForm {
            email: "a@b.com".into(),
            password: "secret1".into(),
            user_type: "nurse".into(),
            name: "A".into(),
            phone: "01012345678".into(),
            national_id: None,
        };
        let value = serde_json::to_value(&form).unwrap();
        assert_eq!(value["userType"], "nurse");
        assert!(value.get("nationalId").is_none());
    }
}
