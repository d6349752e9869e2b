use axum::{
    extract::State,
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::{Envelope, Payload};
use crate::error::{ApiError, ApiResult};
use crate::gate::{AnyRole, Authorized};
use crate::models::{Account, ProfileUpdate};
use crate::state::SharedState;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route(
            "/profile",
            get(profile).post(update_profile).put(update_profile),
        )
        .route("/complete-profile", put(complete_profile))
        .route("/upload-profile-image", post(upload_profile_image))
}

/// Applies a profile edit to `account` and writes it back.
///
/// Shared with the nurse profile route.
pub(super) fn save_update(
    state: &SharedState,
    mut account: Account,
    update: ProfileUpdate,
    mark_complete: bool,
) -> ApiResult<Account> {
    account.apply(update).map_err(ApiError::validation)?;
    if mark_complete {
        account.profile_complete = true;
    }
    if !state.db.save_profile(&account)? {
        return Err(ApiError::not_found("User not found"));
    }
    info!(account_id = account.id, "Profile updated");

    state
        .db
        .account(account.id)?
        .ok_or_else(|| ApiError::not_found("User not found"))
}

async fn profile(Authorized { account, .. }: Authorized<AnyRole>) -> Envelope<Account> {
    Envelope::data(account)
}

async fn update_profile(
    State(state): State<SharedState>,
    Authorized { account, .. }: Authorized<AnyRole>,
    Payload(update): Payload<ProfileUpdate>,
) -> ApiResult<Envelope<Account>> {
    Ok(Envelope::data(save_update(&state, account, update, false)?))
}

async fn complete_profile(
    State(state): State<SharedState>,
    Authorized { account, .. }: Authorized<AnyRole>,
    Payload(update): Payload<ProfileUpdate>,
) -> ApiResult<Envelope<Account>> {
    Ok(Envelope::data(save_update(&state, account, update, true)?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageForm {
    image_url: Option<String>,
}

async fn upload_profile_image(
    State(state): State<SharedState>,
    Authorized { account, .. }: Authorized<AnyRole>,
    Payload(form): Payload<ImageForm>,
) -> ApiResult<Envelope<serde_json::Value>> {
    let image_url = form
        .image_url
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty())
        .ok_or_else(|| ApiError::validation("No image URL provided"))?;

    let update = ProfileUpdate {
        profile_image: Some(image_url),
        ..Default::default()
    };
    let account = save_update(&state, account, update, false)?;
    Ok(Envelope::data(json!({ "imageUrl": account.profile_image })))
}
