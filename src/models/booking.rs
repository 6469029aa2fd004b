// src/models/booking.rs

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::models::calendar::ManualMeetingInstructions;

// --- Enums ---
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "booking_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Completed,
    Cancelled,
    NoShow,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 5] = [
        BookingStatus::Pending,
        BookingStatus::Confirmed,
        BookingStatus::Completed,
        BookingStatus::Cancelled,
        BookingStatus::NoShow,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::NoShow => "no_show",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// A reserva guarda a própria data/horário (não é FK para a grade),
// então apagar um horário da grade não mexe no histórico.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: Uuid,
    pub customer_id: Uuid,

    #[schema(example = "Maria Souza")]
    pub customer_name: String,
    #[schema(example = "maria@empresa.com")]
    pub customer_email: String,
    pub customer_phone: Option<String>,

    #[schema(example = "Padaria Souza")]
    pub business_name: String,
    pub business_website: Option<String>,
    pub customer_message: Option<String>,

    pub preferred_date: NaiveDate,
    #[schema(value_type = String, example = "09:00:00")]
    pub slot_start_time: NaiveTime,
    #[schema(value_type = String, example = "10:00:00")]
    pub slot_end_time: NaiveTime,

    pub status: BookingStatus,

    // Nunca aparece para o cliente
    #[serde(skip_serializing)]
    pub admin_notes: Option<String>,

    pub external_event_id: Option<String>,
    pub external_meeting_link: Option<String>,
    pub confirmation_sent_at: Option<DateTime<Utc>>,
    pub reminder_sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Visão do admin: igual à reserva, mas com as notas internas
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdminBookingView {
    #[serde(flatten)]
    pub booking: Booking,
    pub admin_notes: Option<String>,
}

impl From<Booking> for AdminBookingView {
    fn from(booking: Booking) -> Self {
        let admin_notes = booking.admin_notes.clone();
        Self { booking, admin_notes }
    }
}

// Resposta da transição: a reserva e, se o calendário falhou, o que fazer no lugar
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookingTransitionResult {
    #[serde(flatten)]
    pub booking: AdminBookingView,
    pub manual_instructions: Option<ManualMeetingInstructions>,
    pub calendar_reauth_required: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TimeSlot {
    #[schema(value_type = String, example = "09:00:00")]
    pub start_time: NaiveTime,
    #[schema(value_type = String, example = "10:00:00")]
    pub end_time: NaiveTime,
}

// Livro-razão de mudanças de status (auditoria)
#[derive(Debug, Clone, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookingStatusChange {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub from_status: Option<BookingStatus>,
    pub to_status: BookingStatus,
    pub note: Option<String>,
    pub changed_by: Option<Uuid>,
    pub changed_at: DateTime<Utc>,
}

// --- Payloads ---

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    #[validate(length(min = 2, max = 120, message = "Informe seu nome."))]
    pub customer_name: String,

    #[validate(email(message = "O e-mail fornecido é inválido."))]
    pub customer_email: String,

    #[validate(length(max = 30))]
    pub customer_phone: Option<String>,

    #[validate(length(min = 1, max = 160, message = "Informe o nome da empresa."))]
    pub business_name: String,

    #[validate(url(message = "O site informado é inválido."))]
    pub business_website: Option<String>,

    #[validate(length(max = 2000))]
    pub customer_message: Option<String>,

    #[schema(example = "2026-11-03")]
    pub preferred_date: NaiveDate,

    pub preferred_time_slot: TimeSlot,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TransitionBookingRequest {
    pub status: BookingStatus,

    #[validate(length(max = 2000))]
    pub admin_note: Option<String>,

    #[serde(default)]
    pub notify_customer: bool,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct BookingFilter {
    pub status: Option<BookingStatus>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}
