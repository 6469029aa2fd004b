// src/services/recurrence.rs

use std::sync::Arc;

use chrono::{DateTime, Datelike, Days, Duration, Months, NaiveDate, Utc, Weekday};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::{
        db_utils::{acquire_xact_lock, uuid_lock_key, RECURRING_MEETING_LOCK},
        error::{AppError, ScheduleError},
    },
    config::SchedulingSettings,
    db::RecurringRepository,
    models::{
        auth::Claims,
        calendar::{CalendarEvent, CalendarEventRequest, ManualMeetingInstructions, SyncSubject},
        recurring::{
            CreateRecurringMeetingRequest, MaterializeReport, MeetingOccurrence, OccurrenceStatus,
            OccurrenceUpdateResult, RecurrenceFrequency, RecurringMeeting, RecurringMeetingDetail,
            RescheduleOccurrenceRequest,
        },
    },
    services::{
        calendar::gateway::{CalendarSyncGateway, SyncOutcome},
        notifications::{NotificationSender, OutboundEmail, TemplateKey},
    },
};

// =============================================================================
//  GERADOR (puro)
// =============================================================================

/// Só os campos que definem as datas. Vem da regra salva ou do payload de criação.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecurrenceRule {
    pub frequency: RecurrenceFrequency,
    pub day_of_week: Option<i16>,
    pub day_of_month: Option<i16>,
    pub week_of_month: Option<i16>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

impl From<&RecurringMeeting> for RecurrenceRule {
    fn from(meeting: &RecurringMeeting) -> Self {
        Self {
            frequency: meeting.recurrence_frequency,
            day_of_week: meeting.day_of_week,
            day_of_month: meeting.day_of_month,
            week_of_month: meeting.week_of_month,
            start_date: meeting.start_date,
            end_date: meeting.end_date,
        }
    }
}

impl From<&CreateRecurringMeetingRequest> for RecurrenceRule {
    fn from(payload: &CreateRecurringMeetingRequest) -> Self {
        Self {
            frequency: payload.recurrence_frequency,
            day_of_week: payload.day_of_week,
            day_of_month: payload.day_of_month,
            week_of_month: payload.week_of_month,
            start_date: payload.start_date,
            end_date: payload.end_date,
        }
    }
}

/// 0 = domingo, igual à grade de horários.
pub fn weekday_from_index(index: i16) -> Option<Weekday> {
    match index {
        0 => Some(Weekday::Sun),
        1 => Some(Weekday::Mon),
        2 => Some(Weekday::Tue),
        3 => Some(Weekday::Wed),
        4 => Some(Weekday::Thu),
        5 => Some(Weekday::Fri),
        6 => Some(Weekday::Sat),
        _ => None,
    }
}

fn invalid(message: &str) -> ScheduleError {
    ScheduleError::InvalidRecurrence(message.to_string())
}

pub fn validate_rule(rule: &RecurrenceRule) -> Result<(), ScheduleError> {
    if let Some(day) = rule.day_of_week {
        weekday_from_index(day).ok_or_else(|| invalid("dia da semana deve estar entre 0 e 6"))?;
    }
    if let Some(day) = rule.day_of_month {
        if !(1..=28).contains(&day) {
            return Err(invalid("dia do mês deve estar entre 1 e 28"));
        }
    }
    if let Some(week) = rule.week_of_month {
        if !(1..=5).contains(&week) {
            return Err(invalid("semana do mês deve estar entre 1 e 5"));
        }
    }

    match rule.frequency {
        RecurrenceFrequency::Weekly | RecurrenceFrequency::BiWeekly => {
            if rule.day_of_week.is_none() {
                return Err(invalid("recorrência semanal exige o dia da semana"));
            }
            if rule.day_of_month.is_some() || rule.week_of_month.is_some() {
                return Err(invalid("recorrência semanal não aceita dia ou semana do mês"));
            }
        }
        RecurrenceFrequency::Monthly => match (rule.day_of_month, rule.day_of_week, rule.week_of_month) {
            (Some(_), None, None) => {}
            (None, Some(_), Some(_)) => {}
            (Some(_), Some(_), _) => return Err(invalid("informe o dia do mês OU o dia da semana, não os dois")),
            (Some(_), None, Some(_)) => return Err(invalid("semana do mês exige o dia da semana")),
            (None, Some(_), None) => return Err(invalid("dia da semana mensal exige a semana do mês")),
            (None, None, _) => return Err(invalid("recorrência mensal exige dia do mês ou dia da semana")),
        },
    }

    if let Some(end) = rule.end_date {
        if end < rule.start_date {
            return Err(invalid("a data final é anterior à inicial"));
        }
    }

    Ok(())
}

fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)?
        .checked_add_months(Months::new(1))?
        .pred_opt()
}

/// Dia fixo do mês; se o mês for curto, cai no último dia (nunca no mês seguinte).
fn clamped_day(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    let last = last_day_of_month(year, month)?;
    NaiveDate::from_ymd_opt(year, month, day.min(last.day()))
}

/// Próximas `count` datas em `from` ou depois, sempre dentro de [start_date, end_date].
/// Regra inválida gera lista vazia; valide antes com `validate_rule`.
pub fn next_occurrences(rule: &RecurrenceRule, count: usize, from: NaiveDate) -> Vec<NaiveDate> {
    if count == 0 || validate_rule(rule).is_err() {
        return Vec::new();
    }

    let from = from.max(rule.start_date);
    let within_end = |date: &NaiveDate| rule.end_date.is_none_or(|end| *date <= end);

    match rule.frequency {
        RecurrenceFrequency::Weekly | RecurrenceFrequency::BiWeekly => {
            let Some(weekday) = rule.day_of_week.and_then(weekday_from_index) else {
                return Vec::new();
            };
            let step: i64 = if rule.frequency == RecurrenceFrequency::Weekly { 7 } else { 14 };

            // A grade começa no primeiro dia certo a partir de start_date, então a paridade
            // quinzenal não muda quando geramos de novo a partir de outra data.
            let offset = (7 + weekday.num_days_from_monday() as i64
                - rule.start_date.weekday().num_days_from_monday() as i64)
                % 7;
            let anchor = rule.start_date + Duration::days(offset);

            let first = if anchor >= from {
                anchor
            } else {
                let gap = (from - anchor).num_days();
                anchor + Duration::days(((gap + step - 1) / step) * step)
            };

            (0..)
                .map(|i: i64| first + Duration::days(i * step))
                .take_while(within_end)
                .take(count)
                .collect()
        }

        RecurrenceFrequency::Monthly => {
            let Some(month_start) = NaiveDate::from_ymd_opt(from.year(), from.month(), 1) else {
                return Vec::new();
            };
            // Limite de meses: "5ª terça" aparece pelo menos a cada 3 meses
            let max_months = count.saturating_mul(4).saturating_add(12);

            let mut dates = Vec::with_capacity(count);
            for i in 0..max_months {
                let Some(month) = month_start.checked_add_months(Months::new(i as u32)) else {
                    break;
                };

                let candidate = match (rule.day_of_month, rule.day_of_week, rule.week_of_month) {
                    (Some(day), _, _) => clamped_day(month.year(), month.month(), day as u32),
                    (None, Some(dow), Some(week)) => weekday_from_index(dow).and_then(|weekday| {
                        NaiveDate::from_weekday_of_month_opt(month.year(), month.month(), weekday, week as u8)
                    }),
                    _ => None,
                };

                let Some(date) = candidate else { continue };
                if date < from {
                    continue;
                }
                if !within_end(&date) {
                    break;
                }

                dates.push(date);
                if dates.len() == count {
                    break;
                }
            }
            dates
        }
    }
}

fn occurrence_event_request(
    meeting: &RecurringMeeting,
    occurrence: &MeetingOccurrence,
    settings: &SchedulingSettings,
) -> Result<CalendarEventRequest, AppError> {
    let start = settings
        .at_business_time(occurrence.scheduled_date, occurrence.scheduled_time)
        .ok_or_else(|| anyhow::anyhow!("Horário inválido para a ocorrência {}", occurrence.id))?;
    let end = start + Duration::minutes(i64::from(meeting.duration_minutes));

    Ok(CalendarEventRequest {
        summary: meeting.title.clone(),
        description: occurrence.client_notes.clone().unwrap_or_default(),
        start,
        end,
        attendees: vec![meeting.attendee_email.clone()],
        request_id: format!("occurrence-{}", occurrence.id),
    })
}

// =============================================================================
//  SERVIÇO
// =============================================================================

#[derive(Clone)]
pub struct RecurringMeetingService {
    pool: PgPool,
    repo: RecurringRepository,
    gateway: CalendarSyncGateway,
    notifier: Arc<dyn NotificationSender>,
    settings: SchedulingSettings,
}

impl RecurringMeetingService {
    pub fn new(
        pool: PgPool,
        repo: RecurringRepository,
        gateway: CalendarSyncGateway,
        notifier: Arc<dyn NotificationSender>,
        settings: SchedulingSettings,
    ) -> Self {
        Self { pool, repo, gateway, notifier, settings }
    }

    fn ensure_owner(meeting: &RecurringMeeting, claims: &Claims) -> Result<(), AppError> {
        if claims.is_admin() || meeting.owner_id == claims.sub {
            Ok(())
        } else {
            Err(AppError::Forbidden("Esta reunião pertence a outro cliente".to_string()))
        }
    }

    async fn owned_meeting(&self, id: Uuid, claims: &Claims) -> Result<RecurringMeeting, AppError> {
        let meeting = self
            .repo
            .find_meeting(&self.pool, id)
            .await?
            .ok_or_else(|| AppError::NotFound("Reunião recorrente".to_string()))?;
        Self::ensure_owner(&meeting, claims)?;
        Ok(meeting)
    }

    /// Grava o evento recém-sincronizado. Se a ocorrência foi cancelada enquanto o
    /// calendário respondia, o evento sai de lá. Erro de banco aqui só vai para o log.
    async fn attach_event(&self, occurrence: &mut MeetingOccurrence, event: CalendarEvent) {
        let attached = self
            .repo
            .attach_occurrence_event(&self.pool, occurrence.id, &event.event_id, event.meeting_link.as_deref())
            .await;

        match attached {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(
                    occurrence_id = %occurrence.id,
                    event_id = %event.event_id,
                    "Ocorrência cancelada durante a sincronização; removendo o evento"
                );
                // Falha na remoção já gera alerta no gateway
                let _ = self
                    .gateway
                    .delete_event(SyncSubject::Occurrence(occurrence.id), &event.event_id)
                    .await;
                occurrence.status = OccurrenceStatus::Cancelled;
                return;
            }
            Err(e) => {
                tracing::error!(
                    occurrence_id = %occurrence.id,
                    event_id = %event.event_id,
                    "Evento criado mas não registrado: {}",
                    e
                );
            }
        }

        occurrence.external_event_id = Some(event.event_id);
        occurrence.external_meeting_link = event.meeting_link;
    }

    // --- CRIAR ---
    pub async fn create(
        &self,
        claims: &Claims,
        payload: CreateRecurringMeetingRequest,
        now: DateTime<Utc>,
    ) -> Result<RecurringMeetingDetail, AppError> {
        if !claims.is_subscriber() {
            return Err(AppError::Forbidden("Reuniões recorrentes são exclusivas para assinantes".to_string()));
        }

        validate_rule(&RecurrenceRule::from(&payload))?;

        let meeting = self.repo.insert_meeting(&self.pool, claims.sub, &payload).await?;
        tracing::info!(
            meeting_id = %meeting.id,
            owner_id = %meeting.owner_id,
            frequency = ?meeting.recurrence_frequency,
            "🔁 Reunião recorrente criada"
        );

        let (occurrences, instructions) = self.materialize(&meeting, now).await?;

        Ok(RecurringMeetingDetail {
            meeting,
            occurrences,
            manual_instructions: instructions,
        })
    }

    pub async fn list_for_owner(&self, owner_id: Uuid) -> Result<Vec<RecurringMeeting>, AppError> {
        self.repo.list_for_owner(&self.pool, owner_id).await
    }

    pub async fn list_occurrences(&self, meeting_id: Uuid, claims: &Claims) -> Result<Vec<MeetingOccurrence>, AppError> {
        self.owned_meeting(meeting_id, claims).await?;
        self.repo.list_occurrences(&self.pool, meeting_id).await
    }

    // --- PAUSAR ---
    /// end_date = hoje; as futuras viram canceladas e seus eventos saem do calendário.
    pub async fn pause(&self, id: Uuid, claims: &Claims, now: DateTime<Utc>) -> Result<RecurringMeeting, AppError> {
        let today = self.settings.today(now);

        let mut tx = self.pool.begin().await?;
        acquire_xact_lock(&mut *tx, RECURRING_MEETING_LOCK, uuid_lock_key(id)).await?;

        let meeting = self
            .repo
            .find_meeting(&mut *tx, id)
            .await?
            .ok_or_else(|| AppError::NotFound("Reunião recorrente".to_string()))?;
        Self::ensure_owner(&meeting, claims)?;

        // Já encerrada antes de hoje: nada a fazer
        if meeting.end_date.is_some_and(|end| end <= today) {
            tx.commit().await?;
            return Ok(meeting);
        }

        let meeting = self.repo.set_end_date(&mut *tx, id, today).await?;
        let cancelled = self.repo.cancel_occurrences_after(&mut *tx, id, today).await?;
        tx.commit().await?;

        tracing::info!(meeting_id = %id, cancelled = cancelled.len(), "⏸️ Reunião recorrente pausada");

        for occurrence in &cancelled {
            if let Some(event_id) = &occurrence.external_event_id {
                let subject = SyncSubject::Occurrence(occurrence.id);
                if self.gateway.delete_event(subject, event_id).await.is_ok() {
                    if let Err(e) = self.repo.clear_occurrence_event(&self.pool, occurrence.id).await {
                        tracing::error!(occurrence_id = %occurrence.id, %event_id, "Evento removido mas o vínculo ficou: {}", e);
                    }
                }
            }
        }

        if !cancelled.is_empty() {
            let dates: Vec<_> = cancelled.iter().map(|o| o.scheduled_date).collect();
            self.notifier.enqueue(OutboundEmail {
                template: TemplateKey::OccurrenceCancelled,
                recipient: meeting.attendee_email.clone(),
                context: json!({
                    "meetingId": meeting.id,
                    "title": meeting.title,
                    "cancelledDates": dates,
                }),
            });
        }

        Ok(meeting)
    }

    // --- GERAR OCORRÊNCIAS ---
    /// Cria as próximas ocorrências (lote limitado ao horizonte) e sincroniza cada nova com o calendário.
    /// Rodar de novo sem mudança na regra não cria nada.
    pub async fn materialize(
        &self,
        meeting: &RecurringMeeting,
        now: DateTime<Utc>,
    ) -> Result<(Vec<MeetingOccurrence>, Option<ManualMeetingInstructions>), AppError> {
        let today = self.settings.today(now);
        let horizon = u64::try_from(self.settings.occurrence_horizon_days)
            .ok()
            .and_then(|days| today.checked_add_days(Days::new(days)))
            .unwrap_or(today);

        let mut tx = self.pool.begin().await?;
        acquire_xact_lock(&mut *tx, RECURRING_MEETING_LOCK, uuid_lock_key(meeting.id)).await?;

        // Relê dentro do lock: a regra pode ter sido pausada no meio do caminho
        let Some(current) = self.repo.find_meeting(&mut *tx, meeting.id).await? else {
            return Err(AppError::NotFound("Reunião recorrente".to_string()));
        };
        if !current.is_active {
            tx.commit().await?;
            return Ok((Vec::new(), None));
        }

        let dates: Vec<NaiveDate> =
            next_occurrences(&RecurrenceRule::from(&current), self.settings.occurrence_batch, today)
                .into_iter()
                .filter(|date| *date <= horizon)
                .collect();

        let mut created = Vec::new();
        for date in dates {
            if let Some(occurrence) = self
                .repo
                .insert_occurrence(&mut *tx, current.id, date, current.preferred_time)
                .await?
            {
                created.push(occurrence);
            }
        }
        tx.commit().await?;

        if created.is_empty() {
            return Ok((created, None));
        }

        tracing::info!(meeting_id = %current.id, created = created.len(), "Ocorrências geradas");

        // Calendário depois do commit, uma ocorrência por vez
        let mut instructions = None;
        for occurrence in created.iter_mut() {
            let request = occurrence_event_request(&current, occurrence, &self.settings)?;
            match self.gateway.create_event(SyncSubject::Occurrence(occurrence.id), &request).await {
                SyncOutcome::Synced(event) => self.attach_event(occurrence, event).await,
                SyncOutcome::Degraded(degraded) => {
                    instructions.get_or_insert(degraded.instructions);
                }
            }
        }

        let schedule: Vec<_> = created
            .iter()
            .map(|o| {
                json!({
                    "date": o.scheduled_date,
                    "time": o.scheduled_time,
                    "meetingLink": o.external_meeting_link,
                })
            })
            .collect();
        self.notifier.enqueue(OutboundEmail {
            template: TemplateKey::OccurrenceScheduled,
            recipient: current.attendee_email.clone(),
            context: json!({
                "meetingId": current.id,
                "title": current.title,
                "occurrences": schedule,
                "manualInstructions": instructions,
            }),
        });

        Ok((created, instructions))
    }

    /// Estende todas as regras ativas. Falha numa regra não derruba as outras.
    pub async fn materialize_all(&self, now: DateTime<Utc>) -> Result<MaterializeReport, AppError> {
        let today = self.settings.today(now);
        let meetings = self.repo.list_active(&self.pool, today).await?;

        let mut report = MaterializeReport::default();
        for meeting in &meetings {
            match self.materialize(meeting, now).await {
                Ok((created, _)) => {
                    report.meetings_processed += 1;
                    report.occurrences_created += created.len();
                    report.calendar_degraded += created.iter().filter(|o| o.external_event_id.is_none()).count();
                }
                Err(e) => {
                    tracing::error!(meeting_id = %meeting.id, "Falha ao gerar ocorrências: {}", e);
                }
            }
        }

        tracing::info!(
            meetings = report.meetings_processed,
            created = report.occurrences_created,
            degraded = report.calendar_degraded,
            "Rodada de ocorrências concluída"
        );
        Ok(report)
    }

    // --- REMARCAR / NOTAS ---
    /// Mesmo lock de pause/materialize: status conferido e gravado sem corrida.
    /// O calendário só é chamado depois do commit.
    pub async fn reschedule_occurrence(
        &self,
        occurrence_id: Uuid,
        claims: &Claims,
        payload: RescheduleOccurrenceRequest,
    ) -> Result<OccurrenceUpdateResult, AppError> {
        let existing = self
            .repo
            .find_occurrence(&self.pool, occurrence_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Ocorrência".to_string()))?;
        let meeting = self.owned_meeting(existing.recurring_meeting_id, claims).await?;

        let mut tx = self.pool.begin().await?;
        acquire_xact_lock(&mut *tx, RECURRING_MEETING_LOCK, uuid_lock_key(meeting.id)).await?;

        let current = self
            .repo
            .find_occurrence(&mut *tx, occurrence_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Ocorrência".to_string()))?;
        if current.status != OccurrenceStatus::Scheduled {
            return Err(ScheduleError::OccurrenceNotScheduled(current.status).into());
        }

        let new_time = payload.scheduled_time.unwrap_or(current.scheduled_time);
        let notes = payload.client_notes.as_deref().map(str::trim);
        let time_changed = new_time != current.scheduled_time;

        let mut occurrence = self
            .repo
            .update_occurrence(&mut *tx, occurrence_id, new_time, notes)
            .await?
            .ok_or(ScheduleError::OccurrenceNotScheduled(current.status))?;
        tx.commit().await?;

        let request = occurrence_event_request(&meeting, &occurrence, &self.settings)?;
        let subject = SyncSubject::Occurrence(occurrence.id);
        let outcome = match occurrence.external_event_id.clone() {
            Some(event_id) => self.gateway.update_event(subject, &event_id, &request).await,
            // Nunca chegou ao calendário: aproveita para tentar de novo
            None => self.gateway.create_event(subject, &request).await,
        };

        let mut instructions = None;
        match outcome {
            SyncOutcome::Synced(event) => {
                let meeting_link = event.meeting_link.or_else(|| occurrence.external_meeting_link.clone());
                let event = CalendarEvent { event_id: event.event_id, meeting_link };
                self.attach_event(&mut occurrence, event).await;
            }
            SyncOutcome::Degraded(degraded) => instructions = Some(degraded.instructions),
        }

        // Cancelada durante a sincronização: o aviso de pausa já cobre o cliente
        if time_changed && occurrence.status == OccurrenceStatus::Scheduled {
            self.notifier.enqueue(OutboundEmail {
                template: TemplateKey::OccurrenceUpdated,
                recipient: meeting.attendee_email.clone(),
                context: json!({
                    "meetingId": meeting.id,
                    "title": meeting.title,
                    "date": occurrence.scheduled_date,
                    "time": occurrence.scheduled_time,
                    "meetingLink": occurrence.external_meeting_link,
                    "manualInstructions": instructions,
                }),
            });
        }

        Ok(OccurrenceUpdateResult {
            occurrence,
            manual_instructions: instructions,
        })
    }
}
