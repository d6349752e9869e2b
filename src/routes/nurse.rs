use axum::{
    body::Bytes,
    extract::State,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::{optional_body, user::save_update, Envelope, IdParam, Payload};
use crate::error::{ApiError, ApiResult};
use crate::gate::{Active, Authorized, NurseOnly};
use crate::models::{
    Account, Coordinates, MedicalQuestion, ProfileUpdate, QuestionId, RequestId, ServiceRequest,
};
use crate::state::SharedState;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/profile", post(update_profile))
        .route("/availability", post(availability))
        .route("/requests", get(requests))
        .route("/request-history", get(request_history))
        .route("/requests/{id}/accept", post(accept))
        .route("/requests/{id}/complete", post(complete))
        .route("/questions", get(questions))
        .route("/questions/{id}/answer", post(answer))
}

async fn update_profile(
    State(state): State<SharedState>,
    Authorized { account, .. }: Authorized<NurseOnly>,
    Payload(update): Payload<ProfileUpdate>,
) -> ApiResult<Envelope<Account>> {
    Ok(Envelope::data(save_update(&state, account, update, false)?))
}

#[derive(Debug, Deserialize)]
struct AvailabilityForm {
    available: bool,
    location: Option<Coordinates>,
}

async fn availability(
    State(state): State<SharedState>,
    Active { account, .. }: Active<NurseOnly>,
    Payload(form): Payload<AvailabilityForm>,
) -> ApiResult<Envelope<serde_json::Value>> {
    let nurse = state
        .db
        .set_availability(account.id, form.available, form.location)?
        .ok_or_else(|| ApiError::not_found("Nurse not found"))?;
    let details = nurse
        .nurse()
        .ok_or_else(|| ApiError::not_found("Nurse not found"))?;
    info!(
        nurse_id = nurse.id,
        available = details.availability_status,
        "Availability changed"
    );

    Ok(Envelope::data(json!({
        "available": details.availability_status,
        "location": details.location,
    })))
}

async fn requests(
    State(state): State<SharedState>,
    _nurse: Active<NurseOnly>,
) -> ApiResult<Envelope<Vec<ServiceRequest>>> {
    Ok(Envelope::list(state.requests.broadcast_board()?))
}

async fn request_history(
    State(state): State<SharedState>,
    Authorized { account, .. }: Authorized<NurseOnly>,
) -> ApiResult<Envelope<Vec<ServiceRequest>>> {
    Ok(Envelope::list(state.requests.history_for_nurse(&account)?))
}

#[derive(Debug, Default, Deserialize)]
struct AcceptForm {
    location: Option<Coordinates>,
}

async fn accept(
    State(state): State<SharedState>,
    Active { account, .. }: Active<NurseOnly>,
    IdParam(id): IdParam<RequestId>,
    body: Bytes,
) -> ApiResult<Envelope<ServiceRequest>> {
    let form: AcceptForm = optional_body(&body)?;
    let request = state.requests.accept(&account, id, form.location)?;
    Ok(Envelope::data(request).message("Request accepted successfully"))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompleteForm {
    additional_services: Option<String>,
}

async fn complete(
    State(state): State<SharedState>,
    Active { account, .. }: Active<NurseOnly>,
    IdParam(id): IdParam<RequestId>,
    body: Bytes,
) -> ApiResult<Envelope<ServiceRequest>> {
    let form: CompleteForm = optional_body(&body)?;
    let request = state
        .requests
        .complete(&account, id, form.additional_services)?;
    Ok(Envelope::data(request).message("Service completed successfully"))
}

async fn questions(
    State(state): State<SharedState>,
    _nurse: Active<NurseOnly>,
) -> ApiResult<Envelope<Vec<MedicalQuestion>>> {
    Ok(Envelope::list(state.questions.open()?))
}

#[derive(Debug, Deserialize)]
struct AnswerForm {
    answer: Option<String>,
}

async fn answer(
    State(state): State<SharedState>,
    Active { account, .. }: Active<NurseOnly>,
    IdParam(id): IdParam<QuestionId>,
    Payload(form): Payload<AnswerForm>,
) -> ApiResult<Envelope<MedicalQuestion>> {
    let question = state.questions.answer(&account, id, form.answer)?;
    Ok(Envelope::data(question).message("Question answered successfully"))
}
