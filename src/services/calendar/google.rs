// src/services/calendar/google.rs
//
// Adaptador REST do Google Calendar v3. Só cuida de transporte:
// monta o corpo, envia e devolve a falha crua para o classificador.

use std::time::Duration;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use reqwest::{header, Client, Response, Url};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    config::settings::GoogleCalendarSettings,
    models::calendar::{CalendarEvent, CalendarEventRequest},
};

use super::{CalendarProvider, ProviderFailure};

pub struct GoogleCalendarProvider {
    client: Client,
    events_url: Url,
    access_token: String,
    time_zone: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventResponse {
    id: String,
    hangout_link: Option<String>,
    conference_data: Option<ConferenceData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConferenceData {
    #[serde(default)]
    entry_points: Vec<EntryPoint>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EntryPoint {
    entry_point_type: String,
    uri: String,
}

impl GoogleCalendarProvider {
    pub fn new(settings: GoogleCalendarSettings) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .context("Falha ao construir cliente HTTP do calendário")?;

        let events_url = events_url(&settings.base_url, &settings.calendar_id)?;

        Ok(Self {
            client,
            events_url,
            access_token: settings.access_token,
            time_zone: settings.time_zone,
        })
    }

    fn event_url(&self, event_id: &str) -> Result<Url, ProviderFailure> {
        let mut url = self.events_url.clone();
        url.path_segments_mut()
            .map_err(|_| ProviderFailure::transport("URL base do calendário inválida"))?
            .push(event_id);
        Ok(url)
    }

    async fn read_event(response: Response) -> Result<CalendarEvent, ProviderFailure> {
        let response = ensure_success(response).await?;
        let body: EventResponse = response
            .json()
            .await
            .map_err(|e| ProviderFailure::transport(format!("resposta inválida do calendário: {e}")))?;
        Ok(body.into_event())
    }
}

#[async_trait]
impl CalendarProvider for GoogleCalendarProvider {
    async fn create_event(&self, request: &CalendarEventRequest) -> Result<CalendarEvent, ProviderFailure> {
        let response = self
            .client
            .post(self.events_url.clone())
            .bearer_auth(&self.access_token)
            .query(&[("conferenceDataVersion", "1"), ("sendUpdates", "all")])
            .json(&event_body(request, &self.time_zone, true))
            .send()
            .await
            .map_err(map_transport_error)?;

        Self::read_event(response).await
    }

    async fn update_event(
        &self,
        event_id: &str,
        request: &CalendarEventRequest,
    ) -> Result<CalendarEvent, ProviderFailure> {
        let response = self
            .client
            .patch(self.event_url(event_id)?)
            .bearer_auth(&self.access_token)
            .query(&[("sendUpdates", "all")])
            .json(&event_body(request, &self.time_zone, false))
            .send()
            .await
            .map_err(map_transport_error)?;

        Self::read_event(response).await
    }

    async fn delete_event(&self, event_id: &str) -> Result<(), ProviderFailure> {
        let response = self
            .client
            .delete(self.event_url(event_id)?)
            .bearer_auth(&self.access_token)
            .query(&[("sendUpdates", "all")])
            .send()
            .await
            .map_err(map_transport_error)?;

        ensure_success(response).await.map(|_| ())
    }
}

impl EventResponse {
    fn into_event(self) -> CalendarEvent {
        // hangoutLink é o campo clássico; entryPoints cobre as contas novas
        let video_entry = self.conference_data.and_then(|data| {
            data.entry_points
                .into_iter()
                .find(|entry| entry.entry_point_type == "video")
                .map(|entry| entry.uri)
        });

        CalendarEvent {
            event_id: self.id,
            meeting_link: self.hangout_link.or(video_entry),
        }
    }
}

fn events_url(base_url: &str, calendar_id: &str) -> anyhow::Result<Url> {
    let mut url = Url::parse(base_url).with_context(|| format!("GOOGLE_CALENDAR_BASE_URL inválida: {base_url}"))?;
    url.path_segments_mut()
        .map_err(|_| anyhow!("GOOGLE_CALENDAR_BASE_URL não aceita caminho: {base_url}"))?
        .pop_if_empty()
        .extend(["calendars", calendar_id, "events"]);
    Ok(url)
}

fn event_body(request: &CalendarEventRequest, time_zone: &str, with_conference: bool) -> Value {
    let mut body = json!({
        "summary": request.summary,
        "description": request.description,
        "start": { "dateTime": request.start.to_rfc3339(), "timeZone": time_zone },
        "end": { "dateTime": request.end.to_rfc3339(), "timeZone": time_zone },
        "attendees": request
            .attendees
            .iter()
            .map(|email| json!({ "email": email }))
            .collect::<Vec<_>>(),
    });

    if with_conference {
        body["conferenceData"] = json!({
            "createRequest": {
                "requestId": request.request_id,
                "conferenceSolutionKey": { "type": "hangoutsMeet" }
            }
        });
    }

    body
}

async fn ensure_success(response: Response) -> Result<Response, ProviderFailure> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get(header::RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_retry_after);

    let body = response.text().await.unwrap_or_default();
    let failure = ProviderFailure::http(status.as_u16(), body);

    Err(match retry_after {
        Some(delay) => failure.with_retry_after(delay),
        None => failure,
    })
}

// Só o formato em segundos; datas HTTP caem no backoff normal.
fn parse_retry_after(raw: &str) -> Option<Duration> {
    raw.trim().parse::<u64>().ok().map(Duration::from_secs)
}

fn map_transport_error(error: reqwest::Error) -> ProviderFailure {
    ProviderFailure::transport(error.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};

    fn request() -> CalendarEventRequest {
        let offset = FixedOffset::west_opt(3 * 3600).unwrap();
        CalendarEventRequest {
            summary: "Reunião mensal".to_string(),
            description: "Acompanhamento".to_string(),
            start: offset.with_ymd_and_hms(2026, 11, 3, 14, 0, 0).unwrap(),
            end: offset.with_ymd_and_hms(2026, 11, 3, 14, 45, 0).unwrap(),
            attendees: vec!["cliente@empresa.com".to_string()],
            request_id: "occurrence-42".to_string(),
        }
    }

    #[test]
    fn builds_events_url_for_calendar() {
        let url = events_url("https://www.googleapis.com/calendar/v3", "primary").unwrap();
        assert_eq!(url.as_str(), "https://www.googleapis.com/calendar/v3/calendars/primary/events");

        // IDs de calendário trazem '@' e precisam de escape no caminho
        let url = events_url("https://www.googleapis.com/calendar/v3/", "team#x@group.calendar.google.com").unwrap();
        assert!(url.path().ends_with("/calendars/team%23x@group.calendar.google.com/events"));
    }

    #[test]
    fn create_body_requests_meet_link() {
        let body = event_body(&request(), "America/Sao_Paulo", true);

        assert_eq!(body["start"]["dateTime"], "2026-11-03T14:00:00-03:00");
        assert_eq!(body["end"]["timeZone"], "America/Sao_Paulo");
        assert_eq!(body["attendees"][0]["email"], "cliente@empresa.com");
        assert_eq!(body["conferenceData"]["createRequest"]["requestId"], "occurrence-42");
        assert_eq!(
            body["conferenceData"]["createRequest"]["conferenceSolutionKey"]["type"],
            "hangoutsMeet"
        );
    }

    #[test]
    fn update_body_leaves_conference_alone() {
        let body = event_body(&request(), "America/Sao_Paulo", false);
        assert!(body.get("conferenceData").is_none());
    }

    #[test]
    fn reads_meeting_link_from_either_field() {
        let classic: EventResponse = serde_json::from_value(json!({
            "id": "evt1",
            "hangoutLink": "https://meet.google.com/aaa-bbbb-ccc"
        }))
        .unwrap();
        assert_eq!(classic.into_event().meeting_link.as_deref(), Some("https://meet.google.com/aaa-bbbb-ccc"));

        let entry_points: EventResponse = serde_json::from_value(json!({
            "id": "evt2",
            "conferenceData": { "entryPoints": [
                { "entryPointType": "phone", "uri": "tel:+55-11-4000-0000" },
                { "entryPointType": "video", "uri": "https://meet.google.com/xyz-wxyz-xyz" }
            ]}
        }))
        .unwrap();
        let event = entry_points.into_event();
        assert_eq!(event.event_id, "evt2");
        assert_eq!(event.meeting_link.as_deref(), Some("https://meet.google.com/xyz-wxyz-xyz"));

        let bare: EventResponse = serde_json::from_value(json!({ "id": "evt3" })).unwrap();
        assert_eq!(bare.into_event().meeting_link, None);
    }

    #[test]
    fn retry_after_accepts_only_seconds() {
        assert_eq!(parse_retry_after(" 5 "), Some(Duration::from_secs(5)));
        assert_eq!(parse_retry_after("Wed, 21 Oct 2026 07:28:00 GMT"), None);
    }
}
