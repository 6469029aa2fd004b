// src/handlers/recurring.rs

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::auth::AuthenticatedUser,
    models::recurring::{
        CreateRecurringMeetingRequest, MeetingOccurrence, OccurrenceUpdateResult, RecurringMeeting,
        RecurringMeetingDetail, RescheduleOccurrenceRequest,
    },
};

// POST /api/recurring-meetings
#[utoipa::path(
    post,
    path = "/api/recurring-meetings",
    tag = "Recurring Meetings",
    request_body = CreateRecurringMeetingRequest,
    responses(
        (status = 201, description = "Regra criada com o primeiro lote de ocorrências", body = RecurringMeetingDetail),
        (status = 403, description = "Recurso exclusivo para assinantes"),
        (status = 422, description = "Regra de recorrência inválida")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_meeting(
    State(app_state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(payload): Json<CreateRecurringMeetingRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let detail = app_state
        .recurring_service
        .create(&claims, payload, Utc::now())
        .await?;

    Ok((StatusCode::CREATED, Json(detail)))
}

// GET /api/recurring-meetings/mine
#[utoipa::path(
    get,
    path = "/api/recurring-meetings/mine",
    tag = "Recurring Meetings",
    responses((status = 200, description = "Regras do cliente logado", body = Vec<RecurringMeeting>)),
    security(("api_jwt" = []))
)]
pub async fn list_my_meetings(
    State(app_state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> Result<impl IntoResponse, AppError> {
    let meetings = app_state.recurring_service.list_for_owner(claims.sub).await?;
    Ok(Json(meetings))
}

// POST /api/recurring-meetings/{id}/pause
#[utoipa::path(
    post,
    path = "/api/recurring-meetings/{id}/pause",
    tag = "Recurring Meetings",
    params(("id" = Uuid, Path, description = "ID da regra")),
    responses(
        (status = 200, description = "Regra encerrada hoje; futuras canceladas", body = RecurringMeeting),
        (status = 403, description = "A regra pertence a outro cliente"),
        (status = 404, description = "Regra não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn pause_meeting(
    State(app_state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let meeting = app_state.recurring_service.pause(id, &claims, Utc::now()).await?;
    Ok(Json(meeting))
}

// GET /api/recurring-meetings/{id}/occurrences
#[utoipa::path(
    get,
    path = "/api/recurring-meetings/{id}/occurrences",
    tag = "Recurring Meetings",
    params(("id" = Uuid, Path, description = "ID da regra")),
    responses(
        (status = 200, description = "Ocorrências geradas", body = Vec<MeetingOccurrence>),
        (status = 404, description = "Regra não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn list_occurrences(
    State(app_state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let occurrences = app_state.recurring_service.list_occurrences(id, &claims).await?;
    Ok(Json(occurrences))
}

// PATCH /api/occurrences/{id}
#[utoipa::path(
    patch,
    path = "/api/occurrences/{id}",
    tag = "Recurring Meetings",
    request_body = RescheduleOccurrenceRequest,
    params(("id" = Uuid, Path, description = "ID da ocorrência")),
    responses(
        (status = 200, description = "Ocorrência atualizada (e o evento do calendário)", body = OccurrenceUpdateResult),
        (status = 404, description = "Ocorrência não encontrada"),
        (status = 409, description = "A ocorrência não está mais agendada")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_occurrence(
    State(app_state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<RescheduleOccurrenceRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let result = app_state
        .recurring_service
        .reschedule_occurrence(id, &claims, payload)
        .await?;
    Ok(Json(result))
}
