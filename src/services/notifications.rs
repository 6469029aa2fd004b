// src/services/notifications.rs
//
// Colaboradores externos "dispara e esquece": o núcleo só escolhe o template
// e monta o contexto. Renderização e envio de e-mail ficam fora deste serviço.

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::models::booking::BookingStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateKey {
    BookingReceived,
    BookingConfirmed,
    BookingCancelled,
    BookingCompleted,
    BookingNoShow,
    BookingReminder,
    OccurrenceScheduled,
    OccurrenceUpdated,
    OccurrenceCancelled,
}

impl TemplateKey {
    /// A escolha é sempre pelo status de DESTINO da transição.
    pub fn for_booking_status(status: BookingStatus) -> Self {
        match status {
            BookingStatus::Pending => TemplateKey::BookingReceived,
            BookingStatus::Confirmed => TemplateKey::BookingConfirmed,
            BookingStatus::Cancelled => TemplateKey::BookingCancelled,
            BookingStatus::Completed => TemplateKey::BookingCompleted,
            BookingStatus::NoShow => TemplateKey::BookingNoShow,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateKey::BookingReceived => "booking_received",
            TemplateKey::BookingConfirmed => "booking_confirmed",
            TemplateKey::BookingCancelled => "booking_cancelled",
            TemplateKey::BookingCompleted => "booking_completed",
            TemplateKey::BookingNoShow => "booking_no_show",
            TemplateKey::BookingReminder => "booking_reminder",
            TemplateKey::OccurrenceScheduled => "occurrence_scheduled",
            TemplateKey::OccurrenceUpdated => "occurrence_updated",
            TemplateKey::OccurrenceCancelled => "occurrence_cancelled",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OutboundEmail {
    pub template: TemplateKey,
    pub recipient: String,
    pub context: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdminAlert {
    pub operation: String,
    pub subject_id: Uuid,
    pub error_summary: String,
}

pub trait NotificationSender: Send + Sync {
    /// Não bloqueia e não falha do ponto de vista do chamador.
    fn enqueue(&self, email: OutboundEmail);
}

pub trait AdminAlerter: Send + Sync {
    fn notify(&self, alert: AdminAlert);
}

/// Implementação padrão: registra no log estruturado para o worker de e-mail consumir.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingNotificationSender;

impl NotificationSender for LoggingNotificationSender {
    fn enqueue(&self, email: OutboundEmail) {
        tracing::info!(
            template = email.template.as_str(),
            recipient = %email.recipient,
            context = %email.context,
            "📧 E-mail enfileirado"
        );
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingAdminAlerter;

impl AdminAlerter for LoggingAdminAlerter {
    fn notify(&self, alert: AdminAlert) {
        tracing::warn!(
            operation = %alert.operation,
            subject_id = %alert.subject_id,
            error = %alert.error_summary,
            "🚨 Alerta para o administrador"
        );
    }
}
