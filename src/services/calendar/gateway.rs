// src/services/calendar/gateway.rs

use std::{future::Future, sync::Arc};

use crate::{
    config::settings::CalendarSettings,
    models::calendar::{CalendarEvent, CalendarEventRequest, ManualMeetingInstructions, SyncSubject},
    services::notifications::{AdminAlert, AdminAlerter},
};

use super::{
    classify::classify,
    retry::{JitterSource, RandomJitter, Sleeper, TokioSleeper},
    CalendarError, CalendarErrorKind, CalendarProvider, ProviderFailure,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "calendar.create_event",
            Operation::Update => "calendar.update_event",
            Operation::Delete => "calendar.delete_event",
        }
    }
}

/// Resultado de create/update: ou o evento saiu, ou o fluxo segue "degradado"
/// com instruções manuais no lugar do link.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    Synced(CalendarEvent),
    Degraded(DegradedSync),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DegradedSync {
    pub error: CalendarError,
    pub instructions: ManualMeetingInstructions,
    pub refresh_token: bool,
}

#[derive(Clone)]
pub struct CalendarSyncGateway {
    provider: Arc<dyn CalendarProvider>,
    alerter: Arc<dyn AdminAlerter>,
    settings: CalendarSettings,
    sleeper: Arc<dyn Sleeper>,
    jitter: Arc<dyn JitterSource>,
}

impl CalendarSyncGateway {
    pub fn new(
        provider: Arc<dyn CalendarProvider>,
        alerter: Arc<dyn AdminAlerter>,
        settings: CalendarSettings,
    ) -> Self {
        Self {
            provider,
            alerter,
            settings,
            sleeper: Arc::new(TokioSleeper),
            jitter: Arc::new(RandomJitter),
        }
    }

    pub fn with_runtime(mut self, sleeper: Arc<dyn Sleeper>, jitter: Arc<dyn JitterSource>) -> Self {
        self.sleeper = sleeper;
        self.jitter = jitter;
        self
    }

    // --- CREATE ---
    pub async fn create_event(&self, subject: SyncSubject, request: &CalendarEventRequest) -> SyncOutcome {
        let result = self
            .execute(Operation::Create, subject, || self.provider.create_event(request))
            .await;

        match result {
            Ok(event) => {
                tracing::info!(%subject, event_id = %event.event_id, "📅 Evento criado no calendário");
                SyncOutcome::Synced(event)
            }
            Err(error) => self.degrade(Operation::Create, subject, error),
        }
    }

    // --- UPDATE ---
    pub async fn update_event(
        &self,
        subject: SyncSubject,
        event_id: &str,
        request: &CalendarEventRequest,
    ) -> SyncOutcome {
        let result = self
            .execute(Operation::Update, subject, || self.provider.update_event(event_id, request))
            .await;

        match result {
            Ok(event) => SyncOutcome::Synced(event),
            Err(error) => self.degrade(Operation::Update, subject, error),
        }
    }

    // --- DELETE ---
    /// Evento que já não existe conta como removido. Outras falhas são logadas e
    /// alertadas; quem chama nunca deve abortar o fluxo por causa delas.
    pub async fn delete_event(&self, subject: SyncSubject, event_id: &str) -> Result<(), CalendarError> {
        let result = self
            .execute(Operation::Delete, subject, || self.provider.delete_event(event_id))
            .await;

        match result {
            Ok(()) => Ok(()),
            Err(error) if error.kind == CalendarErrorKind::NotFound => {
                tracing::debug!(%subject, event_id, "Evento já não existia no calendário");
                Ok(())
            }
            Err(error) => {
                self.report(Operation::Delete, subject, &error);
                Err(error)
            }
        }
    }

    /// Executor fino em volta da política pura: tenta, classifica, pergunta à política, dorme.
    /// O prazo total vale para o loop inteiro; estourar vira NetworkError.
    async fn execute<T, F, Fut>(&self, operation: Operation, subject: SyncSubject, call: F) -> Result<T, CalendarError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, ProviderFailure>>,
    {
        let policy = self.settings.retry;
        let deadline = self.settings.operation_deadline;

        let attempts = async {
            let mut attempt: u32 = 0;
            loop {
                attempt += 1;
                let error = match call().await {
                    Ok(value) => return Ok(value),
                    Err(failure) => classify(&failure),
                };

                let decision = policy.decide(attempt, &error, self.jitter.sample());
                if !decision.retry {
                    return Err(error);
                }

                tracing::warn!(
                    operation = operation.as_str(),
                    %subject,
                    attempt,
                    kind = %error.kind,
                    delay_ms = decision.delay.as_millis() as u64,
                    "Falha no calendário, tentando novamente"
                );
                self.sleeper.sleep(decision.delay).await;
            }
        };

        match tokio::time::timeout(deadline, attempts).await {
            Ok(result) => result,
            Err(_) => Err(CalendarError::new(
                CalendarErrorKind::NetworkError,
                format!("prazo de {}s esgotado", deadline.as_secs()),
            )),
        }
    }

    fn report(&self, operation: Operation, subject: SyncSubject, error: &CalendarError) {
        tracing::error!(
            operation = operation.as_str(),
            %subject,
            kind = %error.kind,
            code = ?error.code,
            refresh_token = error.should_refresh_token(),
            "🔥 Falha irrecuperável no calendário: {}",
            error.message
        );

        self.alerter.notify(AdminAlert {
            operation: operation.as_str().to_string(),
            subject_id: subject.id(),
            error_summary: error.to_string(),
        });
    }

    fn degrade(&self, operation: Operation, subject: SyncSubject, error: CalendarError) -> SyncOutcome {
        self.report(operation, subject, &error);

        let fallback = &self.settings.fallback;
        let instructions = ManualMeetingInstructions {
            phone: fallback.phone.clone(),
            video_instructions: fallback.video_instructions.clone(),
            message: format!(
                "Não conseguimos gerar o convite automático. Ligue para {} ou aguarde nosso contato. {}",
                fallback.phone, fallback.video_instructions
            ),
        };

        SyncOutcome::Degraded(DegradedSync {
            refresh_token: error.should_refresh_token(),
            error,
            instructions,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::{FixedOffset, TimeZone};

    use super::*;
    use crate::services::{
        calendar::testing::{NoJitter, RecordingSleeper, ScriptedProvider},
        notifications::testing::RecordingAlerter,
    };

    /// Provedor que nunca responde (para testar o prazo total)
    struct HangingProvider;

    #[async_trait]
    impl CalendarProvider for HangingProvider {
        async fn create_event(&self, _request: &CalendarEventRequest) -> Result<CalendarEvent, ProviderFailure> {
            std::future::pending().await
        }

        async fn update_event(&self, _id: &str, _request: &CalendarEventRequest) -> Result<CalendarEvent, ProviderFailure> {
            std::future::pending().await
        }

        async fn delete_event(&self, _id: &str) -> Result<(), ProviderFailure> {
            std::future::pending().await
        }
    }

    struct Harness {
        gateway: CalendarSyncGateway,
        sleeper: Arc<RecordingSleeper>,
        alerter: Arc<RecordingAlerter>,
    }

    fn harness(provider: Arc<dyn CalendarProvider>, settings: CalendarSettings) -> Harness {
        let sleeper = Arc::new(RecordingSleeper::default());
        let alerter = Arc::new(RecordingAlerter::default());
        let gateway = CalendarSyncGateway::new(provider, alerter.clone(), settings)
            .with_runtime(sleeper.clone(), Arc::new(NoJitter));
        Harness { gateway, sleeper, alerter }
    }

    fn request() -> CalendarEventRequest {
        let offset = FixedOffset::west_opt(3 * 3600).unwrap();
        CalendarEventRequest {
            summary: "Consultoria".to_string(),
            description: "Primeira conversa".to_string(),
            start: offset.with_ymd_and_hms(2026, 11, 3, 9, 0, 0).unwrap(),
            end: offset.with_ymd_and_hms(2026, 11, 3, 10, 0, 0).unwrap(),
            attendees: vec!["maria@empresa.com".to_string()],
            request_id: "booking-1".to_string(),
        }
    }

    fn event() -> CalendarEvent {
        CalendarEvent {
            event_id: "evt_123".to_string(),
            meeting_link: Some("https://meet.google.com/abc-defg-hij".to_string()),
        }
    }

    fn subject() -> SyncSubject {
        SyncSubject::Booking(uuid::Uuid::nil())
    }

    #[tokio::test]
    async fn rate_limit_hint_replaces_default_backoff() {
        let provider = Arc::new(ScriptedProvider::creating(vec![
            Err(ProviderFailure::http(429, "").with_retry_after(Duration::from_secs(5))),
            Ok(event()),
        ]));
        let h = harness(provider.clone(), CalendarSettings::default());

        let outcome = h.gateway.create_event(subject(), &request()).await;

        assert_eq!(outcome, SyncOutcome::Synced(event()));
        assert_eq!(provider.calls(), 2);
        assert_eq!(*h.sleeper.delays.lock().unwrap(), vec![Duration::from_secs(5)]);
        assert!(h.alerter.alerts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn four_unknown_failures_fall_back_after_four_attempts() {
        let provider = Arc::new(ScriptedProvider::creating(
            (0..4).map(|_| Err(ProviderFailure::http(500, "Internal error"))).collect(),
        ));
        let h = harness(provider.clone(), CalendarSettings::default());

        let outcome = h.gateway.create_event(subject(), &request()).await;

        assert_eq!(provider.calls(), 4);
        assert_eq!(
            *h.sleeper.delays.lock().unwrap(),
            vec![Duration::from_secs(1), Duration::from_secs(2), Duration::from_secs(4)]
        );

        let SyncOutcome::Degraded(degraded) = outcome else {
            panic!("esperava fallback, veio {outcome:?}");
        };
        assert_eq!(degraded.error.kind, CalendarErrorKind::Unknown);
        assert!(!degraded.refresh_token);
        assert_eq!(degraded.instructions.phone, CalendarSettings::default().fallback.phone);

        let alerts = h.alerter.alerts.lock().unwrap();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].operation, "calendar.create_event");
    }

    #[tokio::test]
    async fn non_retryable_failure_is_not_retried() {
        let provider = Arc::new(ScriptedProvider::creating(vec![Err(ProviderFailure::http(
            403,
            r#"{"error":{"code":403,"message":"Forbidden","errors":[{"reason":"forbidden"}]}}"#,
        ))]));
        let h = harness(provider.clone(), CalendarSettings::default());

        let outcome = h.gateway.create_event(subject(), &request()).await;

        assert_eq!(provider.calls(), 1);
        assert!(h.sleeper.delays.lock().unwrap().is_empty());
        assert!(matches!(outcome, SyncOutcome::Degraded(_)));
    }

    #[tokio::test]
    async fn expired_token_degrades_and_flags_refresh() {
        let provider = Arc::new(ScriptedProvider::creating(vec![Err(ProviderFailure::http(
            401,
            r#"{"error":{"code":401,"message":"Token expired","status":"UNAUTHENTICATED"}}"#,
        ))]));
        let h = harness(provider.clone(), CalendarSettings::default());

        let SyncOutcome::Degraded(degraded) = h.gateway.create_event(subject(), &request()).await else {
            panic!("esperava fallback");
        };
        assert_eq!(degraded.error.kind, CalendarErrorKind::TokenExpired);
        assert!(degraded.refresh_token);
    }

    #[tokio::test]
    async fn deleting_a_missing_event_counts_as_done() {
        let provider = Arc::new(ScriptedProvider::deleting(vec![Err(ProviderFailure::http(410, "Gone"))]));
        let h = harness(provider.clone(), CalendarSettings::default());

        assert!(h.gateway.delete_event(subject(), "evt_123").await.is_ok());
        assert!(h.alerter.alerts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_delete_is_reported_but_returned() {
        let provider = Arc::new(ScriptedProvider::deleting(vec![Err(ProviderFailure::http(400, "bad"))]));
        let h = harness(provider.clone(), CalendarSettings::default());

        let error = h.gateway.delete_event(subject(), "evt_123").await.unwrap_err();
        assert_eq!(error.kind, CalendarErrorKind::InvalidRequest);
        assert_eq!(h.alerter.alerts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn overall_deadline_is_a_network_error() {
        let settings = CalendarSettings {
            operation_deadline: Duration::from_millis(50),
            ..CalendarSettings::default()
        };
        let h = harness(Arc::new(HangingProvider), settings);

        let SyncOutcome::Degraded(degraded) = h.gateway.create_event(subject(), &request()).await else {
            panic!("esperava fallback");
        };
        assert_eq!(degraded.error.kind, CalendarErrorKind::NetworkError);
    }
}
