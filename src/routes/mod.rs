//! HTTP surface. Everything lives under `/api`; the role prefix of a path
//! matches the guard its handlers use.

use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{FromRequest, FromRequestParts, Path, Request, State},
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, Method, StatusCode, Uri,
    },
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::json;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::error::{ApiError, ApiResult, InternalFailure};
use crate::state::SharedState;

pub mod admin;
pub mod auth;
pub mod nurse;
pub mod patient;
pub mod user;

/// Response body shared by every successful endpoint.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    results: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
}

impl<T: Serialize> Envelope<T> {
    pub fn data(data: T) -> Self {
        Self {
            status: "success",
            results: None,
            message: None,
            data: Some(data),
        }
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl<T: Serialize> Envelope<Vec<T>> {
    pub fn list(items: Vec<T>) -> Self {
        Self {
            results: Some(items.len()),
            ..Self::data(items)
        }
    }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// JSON request body whose rejections are reported as validation errors.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct Payload<T>(pub T);

/// Path parameter whose rejections are reported as validation errors.
#[derive(FromRequestParts)]
#[from_request(via(Path), rejection(ApiError))]
pub struct IdParam<T>(pub T);

/// Parses a body that may be absent. An empty body yields `T::default()`.
pub fn optional_body<T: DeserializeOwned + Default>(body: &Bytes) -> ApiResult<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiError::validation(format!("Invalid JSON body: {e}")))
}

/// Runs CPU-heavy work (password hashing) on the blocking pool.
pub async fn blocking<T, F>(work: F) -> ApiResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> ApiResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("Blocking task failed: {e}")))?
}

/// Builds the complete application router.
pub fn app(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            CONTENT_TYPE,
            AUTHORIZATION,
            HeaderName::from_static("x-requested-with"),
        ])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/api", get(banner))
        .nest("/api/auth", auth::router())
        .nest("/api/user", user::router())
        .nest("/api/patient", patient::router())
        .nest("/api/nurse", nurse::router())
        .nest("/api/admin", admin::router())
        .fallback(not_found)
        .layer(middleware::from_fn(attach_path))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn banner(State(state): State<SharedState>) -> impl IntoResponse {
    let time = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default();
    let database = if state.db.is_healthy() {
        "connected"
    } else {
        "disconnected"
    };
    Json(json!({
        "message": "Welcome to the Nursing Service API",
        "status": "online",
        "time": time,
        "database": database,
    }))
}

async fn not_found(uri: Uri) -> ApiError {
    ApiError::not_found(format!("Can't find {} on this server", uri.path()))
}

/// Rewrites 500 responses to carry the path of the failed request.
async fn attach_path(req: Request, next: Next) -> Response {
    let path = req.uri().path().to_string();
    let response = next.run(req).await;

    match response.extensions().get::<InternalFailure>() {
        Some(InternalFailure(message)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "status": "error", "message": message, "path": path })),
        )
            .into_response(),
        None => response,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_envelope_counts_results() {
        let value = serde_json::to_value(Envelope::list(vec![1, 2, 3])).unwrap();
        assert_eq!(value["status"], "success");
        assert_eq!(value["results"], 3);
        assert!(value.get("message").is_none());
    }

    #[test]
    fn empty_body_uses_default() {
        #[derive(serde::Deserialize, Default)]
        struct Body {
            note: Option<String>,
        }

        let body: Body = optional_body(&Bytes::new()).unwrap();
        assert!(body.note.is_none());
        let body: Body = optional_body(&Bytes::from_static(br#"{"note":"hi"}"#)).unwrap();
        assert_eq!(body.note.as_deref(), Some("hi"));
        assert!(optional_body::<Body>(&Bytes::from_static(b"{oops")).is_err());
    }
}
