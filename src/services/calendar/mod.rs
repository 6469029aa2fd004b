// src/services/calendar/mod.rs

pub mod classify;
pub mod gateway;
pub mod google;
pub mod retry;
#[cfg(test)]
pub(crate) mod testing;

use std::{fmt, time::Duration};

use async_trait::async_trait;
use thiserror::Error;

use crate::models::calendar::{CalendarEvent, CalendarEventRequest};

// Taxonomia fechada. Toda falha do provedor vira exatamente um destes tipos
// na fronteira de classificação (classify.rs); daqui para frente só fazemos `match`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CalendarErrorKind {
    RateLimited,
    TokenExpired,
    InvalidToken,
    NotFound,
    Forbidden,
    NetworkError,
    InvalidRequest,
    QuotaExceeded,
    CalendarNotFound,
    EventConflict,
    Unknown,
}

impl CalendarErrorKind {
    pub fn is_retryable(self) -> bool {
        matches!(
            self,
            CalendarErrorKind::RateLimited | CalendarErrorKind::NetworkError | CalendarErrorKind::Unknown
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CalendarErrorKind::RateLimited => "RATE_LIMITED",
            CalendarErrorKind::TokenExpired => "TOKEN_EXPIRED",
            CalendarErrorKind::InvalidToken => "INVALID_TOKEN",
            CalendarErrorKind::NotFound => "NOT_FOUND",
            CalendarErrorKind::Forbidden => "FORBIDDEN",
            CalendarErrorKind::NetworkError => "NETWORK_ERROR",
            CalendarErrorKind::InvalidRequest => "INVALID_REQUEST",
            CalendarErrorKind::QuotaExceeded => "QUOTA_EXCEEDED",
            CalendarErrorKind::CalendarNotFound => "CALENDAR_NOT_FOUND",
            CalendarErrorKind::EventConflict => "EVENT_CONFLICT",
            CalendarErrorKind::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for CalendarErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Erro já classificado.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct CalendarError {
    pub kind: CalendarErrorKind,
    /// Status HTTP original, quando houve resposta
    pub code: Option<u16>,
    pub message: String,
    /// Dica "retry after" do provedor
    pub retry_after: Option<Duration>,
}

impl CalendarError {
    pub fn new(kind: CalendarErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: None,
            message: message.into(),
            retry_after: None,
        }
    }

    /// Quem chama dispara a reautenticação fora de banda; aqui não mexemos em credenciais.
    pub fn should_refresh_token(&self) -> bool {
        matches!(self.kind, CalendarErrorKind::TokenExpired | CalendarErrorKind::InvalidToken)
            || self.code == Some(401)
    }
}

/// Falha crua do provedor, antes da classificação.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderFailure {
    /// `None` = nem chegou resposta (conexão, DNS, timeout)
    pub status: Option<u16>,
    pub body: String,
    pub retry_after: Option<Duration>,
}

impl ProviderFailure {
    pub fn http(status: u16, body: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            body: body.into(),
            retry_after: None,
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            body: message.into(),
            retry_after: None,
        }
    }

    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }
}

// Porta para o provedor externo (Google Calendar em produção, fakes nos testes)
#[async_trait]
pub trait CalendarProvider: Send + Sync {
    async fn create_event(&self, request: &CalendarEventRequest) -> Result<CalendarEvent, ProviderFailure>;

    async fn update_event(
        &self,
        event_id: &str,
        request: &CalendarEventRequest,
    ) -> Result<CalendarEvent, ProviderFailure>;

    async fn delete_event(&self, event_id: &str) -> Result<(), ProviderFailure>;
}

/// Usado quando o ambiente não tem credenciais: toda chamada cai no fallback manual
/// e o alerta pede reautenticação.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredCalendar;

impl UnconfiguredCalendar {
    fn failure() -> ProviderFailure {
        ProviderFailure::http(
            401,
            r#"{"error":{"code":401,"message":"Calendar credentials are not configured","status":"UNAUTHENTICATED"}}"#,
        )
    }
}

#[async_trait]
impl CalendarProvider for UnconfiguredCalendar {
    async fn create_event(&self, _request: &CalendarEventRequest) -> Result<CalendarEvent, ProviderFailure> {
        Err(Self::failure())
    }

    async fn update_event(
        &self,
        _event_id: &str,
        _request: &CalendarEventRequest,
    ) -> Result<CalendarEvent, ProviderFailure> {
        Err(Self::failure())
    }

    async fn delete_event(&self, _event_id: &str) -> Result<(), ProviderFailure> {
        Err(Self::failure())
    }
}
