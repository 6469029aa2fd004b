// src/handlers/availability.rs

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{Days, NaiveDate, Utc};
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::auth::AdminUser,
    models::availability::{
        AvailableTimeSlot, BlackoutDate, CreateBlackoutRequest, DateRangeQuery, DayAvailability, SlotWindow,
        UpsertSlotRequest,
    },
};

// =============================================================================
//  1. PÚBLICO (calendário do site)
// =============================================================================

// GET /api/availability
#[utoipa::path(
    get,
    path = "/api/availability",
    tag = "Availability",
    params(DateRangeQuery),
    responses(
        (status = 200, description = "Disponibilidade por dia (limitada à janela de reserva)", body = Vec<DayAvailability>)
    )
)]
pub async fn list_availability(
    State(app_state): State<AppState>,
    Query(range): Query<DateRangeQuery>,
) -> Result<impl IntoResponse, AppError> {
    let now = Utc::now();
    let today = app_state.settings.today(now);

    // Sem intervalo: de hoje até o limite de reserva
    let from = range.from.unwrap_or(today);
    let to = range.to.unwrap_or_else(|| {
        u64::try_from(app_state.settings.max_days_ahead)
            .ok()
            .and_then(|days| from.checked_add_days(Days::new(days)))
            .unwrap_or(from)
    });

    let days = app_state.slot_catalog.availability_between(from, to, now).await?;
    Ok(Json(days))
}

// GET /api/availability/{date}
#[utoipa::path(
    get,
    path = "/api/availability/{date}",
    tag = "Availability",
    params(("date" = String, Path, description = "Data (AAAA-MM-DD)")),
    responses(
        (status = 200, description = "Janelas com vagas na data", body = Vec<SlotWindow>)
    )
)]
pub async fn windows_for_date(
    State(app_state): State<AppState>,
    Path(date): Path<NaiveDate>,
) -> Result<impl IntoResponse, AppError> {
    let windows = app_state.slot_catalog.available_slots_for_date(date, Utc::now()).await?;
    Ok(Json(windows))
}

// =============================================================================
//  2. ADMIN: GRADE SEMANAL
// =============================================================================

// GET /api/admin/slots
#[utoipa::path(
    get,
    path = "/api/admin/slots",
    tag = "Admin - Slots",
    responses((status = 200, description = "Grade completa", body = Vec<AvailableTimeSlot>)),
    security(("api_jwt" = []))
)]
pub async fn list_slots(
    State(app_state): State<AppState>,
    _admin: AdminUser,
) -> Result<impl IntoResponse, AppError> {
    let slots = app_state.slot_catalog.list_slots().await?;
    Ok(Json(slots))
}

// POST /api/admin/slots
#[utoipa::path(
    post,
    path = "/api/admin/slots",
    tag = "Admin - Slots",
    request_body = UpsertSlotRequest,
    responses(
        (status = 201, description = "Horário criado", body = AvailableTimeSlot),
        (status = 409, description = "Sobrepõe outro horário ativo ou reservas futuras do mesmo dia"),
        (status = 422, description = "Intervalo inválido ou curto demais")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_slot(
    State(app_state): State<AppState>,
    _admin: AdminUser,
    Json(payload): Json<UpsertSlotRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let slot = app_state.slot_catalog.upsert_slot(None, payload, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(slot)))
}

// PUT /api/admin/slots/{id}
#[utoipa::path(
    put,
    path = "/api/admin/slots/{id}",
    tag = "Admin - Slots",
    request_body = UpsertSlotRequest,
    params(("id" = Uuid, Path, description = "ID do horário")),
    responses(
        (status = 200, description = "Horário atualizado", body = AvailableTimeSlot),
        (status = 404, description = "Horário não encontrado"),
        (status = 409, description = "Sobrepõe outro horário ativo ou reservas futuras do mesmo dia")
    ),
    security(("api_jwt" = []))
)]
pub async fn update_slot(
    State(app_state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpsertSlotRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let slot = app_state.slot_catalog.upsert_slot(Some(id), payload, Utc::now()).await?;
    Ok(Json(slot))
}

// DELETE /api/admin/slots/{id}
#[utoipa::path(
    delete,
    path = "/api/admin/slots/{id}",
    tag = "Admin - Slots",
    params(("id" = Uuid, Path, description = "ID do horário")),
    responses(
        (status = 204, description = "Horário removido"),
        (status = 404, description = "Horário não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_slot(
    State(app_state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    app_state.slot_catalog.delete_slot(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
//  3. ADMIN: BLOQUEIOS
// =============================================================================

// GET /api/admin/blackouts
#[utoipa::path(
    get,
    path = "/api/admin/blackouts",
    tag = "Admin - Slots",
    params(DateRangeQuery),
    responses((status = 200, description = "Datas bloqueadas", body = Vec<BlackoutDate>)),
    security(("api_jwt" = []))
)]
pub async fn list_blackouts(
    State(app_state): State<AppState>,
    _admin: AdminUser,
    Query(range): Query<DateRangeQuery>,
) -> Result<impl IntoResponse, AppError> {
    let blackouts = app_state.slot_catalog.list_blackouts(range.from, range.to).await?;
    Ok(Json(blackouts))
}

// POST /api/admin/blackouts
#[utoipa::path(
    post,
    path = "/api/admin/blackouts",
    tag = "Admin - Slots",
    request_body = CreateBlackoutRequest,
    responses(
        (status = 201, description = "Data bloqueada", body = BlackoutDate),
        (status = 409, description = "A data já estava bloqueada")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_blackout(
    State(app_state): State<AppState>,
    _admin: AdminUser,
    Json(payload): Json<CreateBlackoutRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let blackout = app_state.slot_catalog.add_blackout(payload).await?;
    Ok((StatusCode::CREATED, Json(blackout)))
}

// DELETE /api/admin/blackouts/{id}
#[utoipa::path(
    delete,
    path = "/api/admin/blackouts/{id}",
    tag = "Admin - Slots",
    params(("id" = Uuid, Path, description = "ID do bloqueio")),
    responses(
        (status = 204, description = "Bloqueio removido"),
        (status = 404, description = "Bloqueio não encontrado")
    ),
    security(("api_jwt" = []))
)]
pub async fn delete_blackout(
    State(app_state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    app_state.slot_catalog.remove_blackout(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
