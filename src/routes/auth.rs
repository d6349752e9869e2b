use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::post, Json, Router};
use serde::Serialize;
use tracing::info;

use super::{blocking, Payload};
use crate::auth::{self, Credentials, Registration};
use crate::error::ApiResult;
use crate::models::{Account, Role};
use crate::notify::Notification;
use crate::state::SharedState;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

/// Body returned by register and login.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionBody {
    status: &'static str,
    token: String,
    user_type: Role,
    user: Account,
}

fn session_body(state: &SharedState, user: Account) -> ApiResult<SessionBody> {
    let token = state.sessions.issue(user.id, user.role())?;
    Ok(SessionBody {
        status: "success",
        token,
        user_type: user.role(),
        user,
    })
}

async fn register(
    State(state): State<SharedState>,
    Payload(form): Payload<Registration>,
) -> ApiResult<impl IntoResponse> {
    info!(email = %form.email, user_type = %form.user_type, "Registration attempt");
    let (account, password) = form.validate(state.config.allow_admin_signup)?;

    let db = Arc::clone(&state.db);
    let cost = state.config.bcrypt_cost;
    let user = blocking(move || auth::register(&db, &account, &password, cost)).await?;

    match state.db.first_admin()? {
        Some(admin) => state.notifier.notify(
            &admin.email,
            Notification::NewRegistration {
                name: user.name.clone(),
                email: user.email.clone(),
                role: user.role(),
            },
        ),
        None => info!("No admin accounts found to notify"),
    }

    Ok((StatusCode::CREATED, Json(session_body(&state, user)?)))
}

async fn login(
    State(state): State<SharedState>,
    Payload(credentials): Payload<Credentials>,
) -> ApiResult<impl IntoResponse> {
    info!(email = %credentials.email, "Login attempt");
    let db = Arc::clone(&state.db);
    let user = blocking(move || auth::authenticate(&db, &credentials)).await?;
    Ok(Json(session_body(&state, user)?))
}
