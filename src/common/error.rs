// src/common/error.rs

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{NaiveDate, NaiveTime};
use serde_json::json;
use thiserror::Error;

use crate::models::{booking::BookingStatus, recurring::OccurrenceStatus};

// Violações de regra de agenda. São determinísticas: nunca há retry automático,
// o chamador recebe o `code` e decide o que mostrar.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScheduleError {
    #[error("O horário inicial ({start}) deve ser anterior ao final ({end})")]
    InvalidRange { start: NaiveTime, end: NaiveTime },

    #[error("O horário deve ter pelo menos {minimum} minutos (recebido: {minutes})")]
    TooShort { minutes: i64, minimum: i64 },

    #[error("Conflito com o horário existente de {start} às {end} (dia {day_of_week})")]
    SlotOverlap { day_of_week: i16, start: NaiveTime, end: NaiveTime },

    #[error("A data {0} já passou")]
    PastDate(NaiveDate),

    #[error("A data {date} está além do limite de {max_days_ahead} dias")]
    TooFarAhead { date: NaiveDate, max_days_ahead: i64 },

    #[error("A data {date} está bloqueada: {reason}")]
    BlackedOut { date: NaiveDate, reason: String },

    #[error("Não atendemos em {0} (apenas segunda a sexta)")]
    Unavailable(NaiveDate),

    #[error("O horário {start}-{end} de {date} não está mais disponível")]
    SlotNoLongerAvailable { date: NaiveDate, start: NaiveTime, end: NaiveTime },

    #[error("Já há reservas em {date} no horário {start}-{end}; cancele-as antes de mudar a grade")]
    SlotHasReservations { date: NaiveDate, start: NaiveTime, end: NaiveTime },

    #[error("Transição inválida: {current} → {requested}")]
    IllegalTransition { current: BookingStatus, requested: BookingStatus },

    #[error("Não há mais vagas em {date} às {start}")]
    CapacityExceeded { date: NaiveDate, start: NaiveTime },

    #[error("Regra de recorrência inválida: {0}")]
    InvalidRecurrence(String),

    #[error("A ocorrência já está {0:?} e não pode ser alterada")]
    OccurrenceNotScheduled(OccurrenceStatus),
}

impl ScheduleError {
    /// Código estável para o front-end.
    pub fn code(&self) -> &'static str {
        match self {
            ScheduleError::InvalidRange { .. } => "INVALID_RANGE",
            ScheduleError::TooShort { .. } => "TOO_SHORT",
            ScheduleError::SlotOverlap { .. } => "SLOT_OVERLAP",
            ScheduleError::PastDate(_) => "PAST_DATE",
            ScheduleError::TooFarAhead { .. } => "TOO_FAR_AHEAD",
            ScheduleError::BlackedOut { .. } => "BLACKED_OUT",
            ScheduleError::Unavailable(_) => "UNAVAILABLE",
            ScheduleError::SlotNoLongerAvailable { .. } => "SLOT_NO_LONGER_AVAILABLE",
            ScheduleError::SlotHasReservations { .. } => "SLOT_HAS_RESERVATIONS",
            ScheduleError::IllegalTransition { .. } => "ILLEGAL_TRANSITION",
            ScheduleError::CapacityExceeded { .. } => "CAPACITY_EXCEEDED",
            ScheduleError::InvalidRecurrence(_) => "INVALID_RECURRENCE",
            ScheduleError::OccurrenceNotScheduled(_) => "OCCURRENCE_NOT_SCHEDULED",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            ScheduleError::SlotOverlap { .. }
            | ScheduleError::SlotNoLongerAvailable { .. }
            | ScheduleError::SlotHasReservations { .. }
            | ScheduleError::IllegalTransition { .. }
            | ScheduleError::CapacityExceeded { .. }
            | ScheduleError::OccurrenceNotScheduled(_) => StatusCode::CONFLICT,
            _ => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error("Token inválido")]
    InvalidToken,

    #[error("Acesso negado: {0}")]
    Forbidden(String),

    #[error("{0} não encontrado")]
    NotFound(String),

    #[error("Já existe um bloqueio para {0}")]
    BlackoutAlreadyExists(NaiveDate),

    #[error("Erro de banco de dados")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Erro interno do servidor")]
    InternalServerError(#[from] anyhow::Error),
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "VALIDATION_FAILED",
            AppError::Schedule(e) => e.code(),
            AppError::InvalidToken => "INVALID_TOKEN",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::BlackoutAlreadyExists(_) => "BLACKOUT_EXISTS",
            AppError::DatabaseError(_) | AppError::InternalServerError(_) => "INTERNAL",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let code = self.code();
        let (status, error_message) = match &self {
            AppError::ValidationError(errors) => {
                let mut details = std::collections::HashMap::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<String> = field_errors.iter()
                        .map(|e| e.message.as_ref().map(|m| m.to_string()).unwrap_or_else(|| e.code.to_string()))
                        .collect();
                    details.insert(field.to_string(), messages);
                }
                let body = Json(json!({
                    "error": "Um ou mais campos são inválidos.",
                    "code": code,
                    "details": details,
                }));
                return (StatusCode::BAD_REQUEST, body).into_response();
            }
            AppError::Schedule(e) => (e.status(), e.to_string()),
            AppError::InvalidToken => (StatusCode::UNAUTHORIZED, "Token de autenticação inválido ou ausente.".to_string()),
            AppError::Forbidden(_) => (StatusCode::FORBIDDEN, self.to_string()),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::BlackoutAlreadyExists(_) => (StatusCode::CONFLICT, self.to_string()),

            // O `tracing` loga a mensagem detalhada; o cliente só vê a genérica.
            AppError::DatabaseError(e) => {
                tracing::error!("Erro de banco de dados: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Ocorreu um erro inesperado.".to_string())
            }
            AppError::InternalServerError(e) => {
                tracing::error!("Erro Interno do Servidor: {:#}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Ocorreu um erro inesperado.".to_string())
            }
        };

        let body = Json(json!({ "error": error_message, "code": code }));
        (status, body).into_response()
    }
}
