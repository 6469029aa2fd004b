// src/handlers/bookings.rs

use axum::{
    extract::{Path, Query, State},
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
    middleware::auth::{AdminUser, AuthenticatedUser},
    models::booking::{
        AdminBookingView, Booking, BookingFilter, BookingStatusChange, BookingTransitionResult, CreateBookingRequest,
        TransitionBookingRequest,
    },
};

// POST /api/bookings
#[utoipa::path(
    post,
    path = "/api/bookings",
    tag = "Bookings",
    request_body = CreateBookingRequest,
    responses(
        (status = 201, description = "Reserva recebida (pendente)", body = Booking),
        (status = 409, description = "Vaga esgotada ou horário não está mais disponível"),
        (status = 422, description = "Data passada, bloqueada, fim de semana ou além do limite")
    ),
    security(("api_jwt" = []))
)]
pub async fn create_booking(
    State(app_state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(payload): Json<CreateBookingRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let booking = app_state
        .booking_service
        .create_booking(claims.sub, payload, Utc::now())
        .await?;

    Ok((StatusCode::CREATED, Json(booking)))
}

// GET /api/bookings/mine
#[utoipa::path(
    get,
    path = "/api/bookings/mine",
    tag = "Bookings",
    responses((status = 200, description = "Reservas do cliente logado", body = Vec<Booking>)),
    security(("api_jwt" = []))
)]
pub async fn list_my_bookings(
    State(app_state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> Result<impl IntoResponse, AppError> {
    let bookings = app_state.booking_service.list_for_customer(claims.sub).await?;
    Ok(Json(bookings))
}

// GET /api/admin/bookings
#[utoipa::path(
    get,
    path = "/api/admin/bookings",
    tag = "Admin - Bookings",
    params(BookingFilter),
    responses((status = 200, description = "Reservas com notas internas", body = Vec<AdminBookingView>)),
    security(("api_jwt" = []))
)]
pub async fn list_bookings(
    State(app_state): State<AppState>,
    _admin: AdminUser,
    Query(filter): Query<BookingFilter>,
) -> Result<impl IntoResponse, AppError> {
    let bookings = app_state.booking_service.list_for_admin(&filter).await?;
    Ok(Json(bookings))
}

// PATCH /api/admin/bookings/{id}/status
#[utoipa::path(
    patch,
    path = "/api/admin/bookings/{id}/status",
    tag = "Admin - Bookings",
    request_body = TransitionBookingRequest,
    params(("id" = Uuid, Path, description = "ID da reserva")),
    responses(
        (status = 200, description = "Status alterado (com instruções manuais se o calendário falhou)", body = BookingTransitionResult),
        (status = 404, description = "Reserva não encontrada"),
        (status = 409, description = "Transição inválida para o status atual")
    ),
    security(("api_jwt" = []))
)]
pub async fn transition_booking(
    State(app_state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<TransitionBookingRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let result = app_state.booking_service.transition(id, payload, admin.sub).await?;
    Ok(Json(result))
}

// GET /api/admin/bookings/{id}/history
#[utoipa::path(
    get,
    path = "/api/admin/bookings/{id}/history",
    tag = "Admin - Bookings",
    params(("id" = Uuid, Path, description = "ID da reserva")),
    responses(
        (status = 200, description = "Histórico de status", body = Vec<BookingStatusChange>),
        (status = 404, description = "Reserva não encontrada")
    ),
    security(("api_jwt" = []))
)]
pub async fn booking_history(
    State(app_state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let history = app_state.booking_service.history(id).await?;
    Ok(Json(history))
}
