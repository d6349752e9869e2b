use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, put},
    Router,
};
use tracing::info;

use super::{Envelope, IdParam};
use crate::error::{ApiError, ApiResult};
use crate::gate::{AdminOnly, Authorized};
use crate::models::{Account, AccountId, ServiceRequest};
use crate::notify::Notification;
use crate::reporting::{service_stats, ServiceStats};
use crate::state::SharedState;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/users", get(users))
        .route("/users/{id}", get(user).delete(delete_user))
        .route("/users/{id}/activate", put(activate))
        .route("/users/{id}/deactivate", put(deactivate))
        .route("/service-requests", get(service_requests))
        .route("/service-stats", get(stats))
}

fn user_not_found() -> ApiError {
    ApiError::not_found("User not found")
}

async fn users(
    State(state): State<SharedState>,
    _admin: Authorized<AdminOnly>,
) -> ApiResult<Envelope<Vec<Account>>> {
    Ok(Envelope::list(state.db.all_accounts()?))
}

async fn user(
    State(state): State<SharedState>,
    _admin: Authorized<AdminOnly>,
    IdParam(id): IdParam<AccountId>,
) -> ApiResult<Envelope<Account>> {
    let account = state.db.account(id)?.ok_or_else(user_not_found)?;
    Ok(Envelope::data(account))
}

async fn activate(
    State(state): State<SharedState>,
    Authorized { account: admin, .. }: Authorized<AdminOnly>,
    IdParam(id): IdParam<AccountId>,
) -> ApiResult<Envelope<Account>> {
    let account = state
        .db
        .set_activation(id, true)?
        .ok_or_else(user_not_found)?;
    info!(account_id = id, admin_id = admin.id, "Account activated");

    state
        .notifier
        .notify(&account.email, Notification::account_activated(&account));

    Ok(Envelope::data(account).message("User account activated successfully"))
}

async fn deactivate(
    State(state): State<SharedState>,
    Authorized { account: admin, .. }: Authorized<AdminOnly>,
    IdParam(id): IdParam<AccountId>,
) -> ApiResult<Envelope<Account>> {
    let account = state
        .db
        .set_activation(id, false)?
        .ok_or_else(user_not_found)?;
    info!(account_id = id, admin_id = admin.id, "Account deactivated");
    Ok(Envelope::data(account).message("User account deactivated successfully"))
}

async fn delete_user(
    State(state): State<SharedState>,
    Authorized { account: admin, .. }: Authorized<AdminOnly>,
    IdParam(id): IdParam<AccountId>,
) -> ApiResult<StatusCode> {
    if !state.db.delete_account(id)? {
        return Err(user_not_found());
    }
    info!(account_id = id, admin_id = admin.id, "Account deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn service_requests(
    State(state): State<SharedState>,
    _admin: Authorized<AdminOnly>,
) -> ApiResult<Envelope<Vec<ServiceRequest>>> {
    Ok(Envelope::list(state.requests.all()?))
}

async fn stats(
    State(state): State<SharedState>,
    _admin: Authorized<AdminOnly>,
) -> ApiResult<Envelope<ServiceStats>> {
    Ok(Envelope::data(service_stats(&state.db)?))
}
