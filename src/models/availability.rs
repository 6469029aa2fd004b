// src/models/availability.rs

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

// --- 1. Grade semanal ---
// day_of_week segue a convenção 0 = domingo ... 6 = sábado
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AvailableTimeSlot {
    pub id: Uuid,
    #[schema(example = 2)]
    pub day_of_week: i16,
    #[schema(value_type = String, example = "09:00:00")]
    pub start_time: NaiveTime,
    #[schema(value_type = String, example = "10:00:00")]
    pub end_time: NaiveTime,
    #[schema(example = 2)]
    pub max_bookings_per_slot: i32,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// --- 2. Bloqueios ---
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BlackoutDate {
    pub id: Uuid,
    #[schema(example = "2026-12-25")]
    pub date: NaiveDate,
    #[schema(example = "Natal")]
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

// --- 3. Disponibilidade calculada para uma data ---
// Uma janela = um horário da grade + quantas vagas ainda restam naquela data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SlotWindow {
    pub slot_id: Uuid,
    #[schema(value_type = String, example = "09:00:00")]
    pub start_time: NaiveTime,
    #[schema(value_type = String, example = "10:00:00")]
    pub end_time: NaiveTime,
    pub max_bookings: i32,
    pub remaining: i32,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DayAvailability {
    pub date: NaiveDate,
    pub bookable: bool,
    pub windows: Vec<SlotWindow>,
}

// Quantas reservas uma janela já tem numa data (linha de slot_reservations)
#[derive(Debug, Clone, FromRow)]
pub struct SlotReservation {
    pub booking_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub bookings_count: i32,
}

// --- Payloads ---

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpsertSlotRequest {
    #[validate(range(min = 0, max = 6, message = "O dia da semana deve estar entre 0 (domingo) e 6 (sábado)."))]
    #[schema(example = 1)]
    pub day_of_week: i16,

    #[schema(value_type = String, example = "09:00:00")]
    pub start_time: NaiveTime,

    #[schema(value_type = String, example = "10:00:00")]
    pub end_time: NaiveTime,

    #[validate(range(min = 1, message = "Deve aceitar pelo menos uma reserva."))]
    #[serde(default = "default_max_bookings")]
    #[schema(example = 1)]
    pub max_bookings_per_slot: i32,

    #[serde(default = "default_true")]
    pub is_available: bool,
}

fn default_max_bookings() -> i32 {
    1
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateBlackoutRequest {
    #[schema(example = "2026-12-25")]
    pub date: NaiveDate,

    #[validate(length(min = 1, max = 200, message = "Informe o motivo do bloqueio."))]
    #[schema(example = "Natal")]
    pub reason: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DateRangeQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}
