// src/handlers/jobs.rs

use axum::{extract::State, response::IntoResponse, Json};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    common::error::AppError, config::AppState, middleware::auth::AdminUser,
    models::recurring::MaterializeReport,
};

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReminderRunResponse {
    #[schema(example = 3)]
    pub reminders_sent: usize,
}

// POST /api/admin/jobs/occurrences
#[utoipa::path(
    post,
    path = "/api/admin/jobs/occurrences",
    tag = "Admin - Jobs",
    responses((status = 200, description = "Ocorrências geradas nesta rodada", body = MaterializeReport)),
    security(("api_jwt" = []))
)]
pub async fn run_materialization(
    State(app_state): State<AppState>,
    _admin: AdminUser,
) -> Result<impl IntoResponse, AppError> {
    let report = app_state.recurring_service.materialize_all(Utc::now()).await?;
    Ok(Json(report))
}

// POST /api/admin/jobs/reminders
#[utoipa::path(
    post,
    path = "/api/admin/jobs/reminders",
    tag = "Admin - Jobs",
    responses((status = 200, description = "Lembretes enfileirados", body = ReminderRunResponse)),
    security(("api_jwt" = []))
)]
pub async fn run_reminders(
    State(app_state): State<AppState>,
    _admin: AdminUser,
) -> Result<impl IntoResponse, AppError> {
    let reminders_sent = app_state.booking_service.send_due_reminders(Utc::now()).await?;
    Ok(Json(ReminderRunResponse { reminders_sent }))
}
