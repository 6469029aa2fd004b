// src/models/calendar.rs

use std::fmt;

use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

// O que pedimos ao provedor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarEventRequest {
    pub summary: String,
    pub description: String,
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    pub attendees: Vec<String>,
    // Idempotência do lado do provedor (conferenceData.createRequest.requestId)
    pub request_id: String,
}

// O que o provedor devolve
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub event_id: String,
    pub meeting_link: Option<String>,
}

// Vai no e-mail no lugar do link quando o calendário falha
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ManualMeetingInstructions {
    pub phone: String,
    pub video_instructions: String,
    pub message: String,
}

/// Registro afetado por uma sincronização (vai para logs e alertas).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncSubject {
    Booking(Uuid),
    Occurrence(Uuid),
}

impl SyncSubject {
    pub fn id(&self) -> Uuid {
        match self {
            SyncSubject::Booking(id) | SyncSubject::Occurrence(id) => *id,
        }
    }
}

impl fmt::Display for SyncSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncSubject::Booking(id) => write!(f, "booking:{id}"),
            SyncSubject::Occurrence(id) => write!(f, "occurrence:{id}"),
        }
    }
}
