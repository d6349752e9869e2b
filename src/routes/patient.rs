use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::{Envelope, Payload};
use crate::error::{ApiError, ApiResult};
use crate::gate::{Active, Authorized, PatientOnly};
use crate::lifecycle::{CurrentRequest, ServiceRequestForm};
use crate::models::{MedicalQuestion, Rating, RequestId, ServiceRequest};
use crate::questions::QuestionForm;
use crate::state::SharedState;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/request-service", post(request_service))
        .route("/current-request", get(current_request))
        .route("/request-history", get(request_history))
        .route("/payment", post(payment))
        .route("/rating", post(rating))
        .route("/questions", get(questions).post(ask_question))
}

async fn request_service(
    State(state): State<SharedState>,
    Active { account, .. }: Active<PatientOnly>,
    Payload(form): Payload<ServiceRequestForm>,
) -> ApiResult<impl IntoResponse> {
    let request = state.requests.create(&account, form)?;
    Ok((StatusCode::CREATED, Envelope::data(request)))
}

async fn current_request(
    State(state): State<SharedState>,
    Authorized { account, .. }: Authorized<PatientOnly>,
) -> ApiResult<Envelope<CurrentRequest>> {
    state
        .requests
        .current_for_patient(&account)?
        .map(Envelope::data)
        .ok_or_else(|| ApiError::not_found("No active service requests found"))
}

async fn request_history(
    State(state): State<SharedState>,
    Authorized { account, .. }: Authorized<PatientOnly>,
) -> ApiResult<Envelope<Vec<ServiceRequest>>> {
    Ok(Envelope::list(state.requests.history_for_patient(&account)?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaymentForm {
    request_id: RequestId,
    method: Option<String>,
}

async fn payment(
    State(state): State<SharedState>,
    Active { account, .. }: Active<PatientOnly>,
    Payload(form): Payload<PaymentForm>,
) -> ApiResult<Envelope<serde_json::Value>> {
    let method = form
        .method
        .map(|m| m.trim().to_string())
        .filter(|m| !m.is_empty())
        .ok_or_else(|| ApiError::validation("Payment method is required"))?;

    let request = state.requests.pay(&account, form.request_id, &method)?;
    Ok(Envelope::data(json!({
        "isPaid": request.is_paid,
        "paymentDate": request.payment_date.and_then(|d| {
            d.format(&time::format_description::well_known::Rfc3339).ok()
        }),
    }))
    .message("Payment successful"))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RatingForm {
    request_id: RequestId,
    rating: i64,
    comment: Option<String>,
}

async fn rating(
    State(state): State<SharedState>,
    Active { account, .. }: Active<PatientOnly>,
    Payload(form): Payload<RatingForm>,
) -> ApiResult<Envelope<Rating>> {
    let rating = state
        .requests
        .rate(&account, form.request_id, form.rating, form.comment)?;
    Ok(Envelope::data(rating).message("Rating submitted successfully"))
}

async fn ask_question(
    State(state): State<SharedState>,
    Active { account, .. }: Active<PatientOnly>,
    Payload(form): Payload<QuestionForm>,
) -> ApiResult<impl IntoResponse> {
    let question = state.questions.ask(&account, form)?;
    Ok((StatusCode::CREATED, Envelope::data(question)))
}

async fn questions(
    State(state): State<SharedState>,
    Authorized { account, .. }: Authorized<PatientOnly>,
) -> ApiResult<Envelope<Vec<MedicalQuestion>>> {
    Ok(Envelope::list(state.questions.for_patient(&account)?))
}
