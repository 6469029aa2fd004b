// src/models/recurring.rs

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::models::calendar::ManualMeetingInstructions;

// --- Enums ---
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "recurrence_frequency")]
pub enum RecurrenceFrequency {
    #[sqlx(rename = "weekly")]
    #[serde(rename = "weekly")]
    Weekly,
    #[sqlx(rename = "bi-weekly")]
    #[serde(rename = "bi-weekly")]
    BiWeekly,
    #[sqlx(rename = "monthly")]
    #[serde(rename = "monthly")]
    Monthly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "occurrence_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OccurrenceStatus {
    Scheduled,
    Cancelled,
    Completed,
}

// A regra. "Pausar" = end_date recebe a data atual; nunca apagamos a linha.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecurringMeeting {
    pub id: Uuid,
    pub owner_id: Uuid,
    #[schema(example = "Reunião mensal de resultados")]
    pub title: String,
    pub attendee_email: String,
    pub recurrence_frequency: RecurrenceFrequency,
    // Semanal/quinzenal: só day_of_week.
    // Mensal: day_of_month OU (day_of_week + week_of_month), ex: "2ª terça".
    pub day_of_week: Option<i16>,
    pub day_of_month: Option<i16>,
    pub week_of_month: Option<i16>,
    #[schema(value_type = String, example = "14:00:00")]
    pub preferred_time: NaiveTime,
    #[schema(example = 45)]
    pub duration_minutes: i32,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MeetingOccurrence {
    pub id: Uuid,
    pub recurring_meeting_id: Uuid,
    pub scheduled_date: NaiveDate,
    #[schema(value_type = String, example = "14:00:00")]
    pub scheduled_time: NaiveTime,
    pub external_event_id: Option<String>,
    pub external_meeting_link: Option<String>,
    pub client_notes: Option<String>,
    pub status: OccurrenceStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// --- Payloads ---

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateRecurringMeetingRequest {
    #[validate(length(min = 1, max = 160, message = "Informe um título."))]
    pub title: String,

    #[validate(email(message = "O e-mail fornecido é inválido."))]
    pub attendee_email: String,

    pub recurrence_frequency: RecurrenceFrequency,

    #[validate(range(min = 0, max = 6))]
    pub day_of_week: Option<i16>,

    // 29-31 não existem em todos os meses; rejeitamos na entrada
    #[validate(range(min = 1, max = 28, message = "O dia do mês deve estar entre 1 e 28."))]
    pub day_of_month: Option<i16>,

    #[validate(range(min = 1, max = 5))]
    pub week_of_month: Option<i16>,

    #[schema(value_type = String, example = "14:00:00")]
    pub preferred_time: NaiveTime,

    #[validate(range(min = 15, max = 240, message = "A duração deve estar entre 15 e 240 minutos."))]
    #[schema(example = 45)]
    pub duration_minutes: i32,

    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RescheduleOccurrenceRequest {
    #[schema(value_type = Option<String>, example = "15:30:00")]
    pub scheduled_time: Option<NaiveTime>,

    #[validate(length(max = 2000))]
    pub client_notes: Option<String>,
}

// Regra recém-criada + o primeiro lote de ocorrências
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RecurringMeetingDetail {
    #[serde(flatten)]
    pub meeting: RecurringMeeting,
    pub occurrences: Vec<MeetingOccurrence>,
    pub manual_instructions: Option<ManualMeetingInstructions>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OccurrenceUpdateResult {
    #[serde(flatten)]
    pub occurrence: MeetingOccurrence,
    pub manual_instructions: Option<ManualMeetingInstructions>,
}

#[derive(Debug, Default, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MaterializeReport {
    pub meetings_processed: usize,
    pub occurrences_created: usize,
    pub calendar_degraded: usize,
}
