// src/services/booking_lifecycle.rs

use std::sync::Arc;

use chrono::{DateTime, Datelike, Days, NaiveDate, Utc, Weekday};
use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::error::{AppError, ScheduleError},
    config::SchedulingSettings,
    db::BookingRepository,
    models::{
        booking::{
            AdminBookingView, Booking, BookingFilter, BookingStatus, BookingStatusChange, BookingTransitionResult,
            CreateBookingRequest, TransitionBookingRequest,
        },
        calendar::{CalendarEventRequest, ManualMeetingInstructions, SyncSubject},
    },
    services::{
        calendar::gateway::{CalendarSyncGateway, SyncOutcome},
        notifications::{NotificationSender, OutboundEmail, TemplateKey},
        slot_catalog::SlotCatalogService,
    },
};

// --- Máquina de estados ---

/// Destinos permitidos a partir de cada status. Vazio = terminal.
pub fn allowed_targets(status: BookingStatus) -> &'static [BookingStatus] {
    match status {
        BookingStatus::Pending => &[BookingStatus::Confirmed, BookingStatus::Cancelled],
        BookingStatus::Confirmed => &[BookingStatus::Completed, BookingStatus::Cancelled, BookingStatus::NoShow],
        BookingStatus::Completed | BookingStatus::Cancelled | BookingStatus::NoShow => &[],
    }
}

pub fn check_transition(current: BookingStatus, requested: BookingStatus) -> Result<(), ScheduleError> {
    if allowed_targets(current).contains(&requested) {
        Ok(())
    } else {
        Err(ScheduleError::IllegalTransition { current, requested })
    }
}

/// Próximo dia útil depois de `lead_days` (lembrete de sexta cai na segunda).
pub fn reminder_target_date(today: NaiveDate, lead_days: i64) -> NaiveDate {
    let mut date = u64::try_from(lead_days)
        .ok()
        .and_then(|days| today.checked_add_days(Days::new(days)))
        .unwrap_or(today);
    while matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
        date = date.succ_opt().unwrap_or(date);
    }
    date
}

fn event_request(booking: &Booking, settings: &SchedulingSettings) -> Result<CalendarEventRequest, AppError> {
    let start = settings
        .at_business_time(booking.preferred_date, booking.slot_start_time)
        .ok_or_else(|| anyhow::anyhow!("Horário inválido para a reserva {}", booking.id))?;
    let end = settings
        .at_business_time(booking.preferred_date, booking.slot_end_time)
        .ok_or_else(|| anyhow::anyhow!("Horário inválido para a reserva {}", booking.id))?;

    let mut description = format!("Empresa: {}", booking.business_name);
    if let Some(site) = &booking.business_website {
        description.push_str(&format!("\nSite: {site}"));
    }
    if let Some(message) = &booking.customer_message {
        description.push_str(&format!("\n\n{message}"));
    }

    Ok(CalendarEventRequest {
        summary: format!("Consultoria: {}", booking.customer_name),
        description,
        start,
        end,
        attendees: vec![booking.customer_email.clone()],
        request_id: format!("booking-{}", booking.id),
    })
}

fn email_context(booking: &Booking, instructions: Option<&ManualMeetingInstructions>) -> Value {
    json!({
        "bookingId": booking.id,
        "customerName": booking.customer_name,
        "businessName": booking.business_name,
        "date": booking.preferred_date,
        "startTime": booking.slot_start_time,
        "endTime": booking.slot_end_time,
        "status": booking.status,
        "meetingLink": booking.external_meeting_link,
        "manualInstructions": instructions,
    })
}

#[derive(Clone)]
pub struct BookingService {
    pool: PgPool,
    repo: BookingRepository,
    catalog: SlotCatalogService,
    gateway: CalendarSyncGateway,
    notifier: Arc<dyn NotificationSender>,
    settings: SchedulingSettings,
}

impl BookingService {
    pub fn new(
        pool: PgPool,
        repo: BookingRepository,
        catalog: SlotCatalogService,
        gateway: CalendarSyncGateway,
        notifier: Arc<dyn NotificationSender>,
        settings: SchedulingSettings,
    ) -> Self {
        Self { pool, repo, catalog, gateway, notifier, settings }
    }

    // --- CRIAR ---
    /// validação → transação (reserva de vaga + insert) → commit → e-mail.
    /// Se a vaga acabou entre a tela e o envio, nada é gravado.
    pub async fn create_booking(
        &self,
        customer_id: Uuid,
        payload: CreateBookingRequest,
        now: DateTime<Utc>,
    ) -> Result<Booking, AppError> {
        let date = payload.preferred_date;
        let slot = payload.preferred_time_slot;
        let window = self.catalog.check_booking_choice(date, &slot, now).await?;

        let mut tx = self.pool.begin().await?;

        let reserved = self
            .repo
            .reserve_capacity(&mut *tx, date, slot.start_time, slot.end_time, window.max_bookings)
            .await?;
        if reserved.is_none() {
            tracing::info!(%date, start = %slot.start_time, "Vaga esgotada durante a reserva");
            return Err(ScheduleError::CapacityExceeded { date, start: slot.start_time }.into());
        }

        let booking = self.repo.insert_pending(&mut *tx, customer_id, &payload).await?;
        self.repo
            .record_status_change(&mut *tx, booking.id, None, BookingStatus::Pending, None, Some(customer_id))
            .await?;

        tx.commit().await?;

        tracing::info!(booking_id = %booking.id, %date, start = %slot.start_time, "📝 Nova reserva recebida");

        self.notifier.enqueue(OutboundEmail {
            template: TemplateKey::BookingReceived,
            recipient: booking.customer_email.clone(),
            context: email_context(&booking, None),
        });

        Ok(booking)
    }

    // --- TRANSIÇÃO (admin) ---
    pub async fn transition(
        &self,
        id: Uuid,
        payload: TransitionBookingRequest,
        admin_id: Uuid,
    ) -> Result<BookingTransitionResult, AppError> {
        let requested = payload.status;
        let note = payload.admin_note.as_deref().map(str::trim).filter(|n| !n.is_empty());

        // 1. Status + nota + histórico (+ devolução da vaga) numa transação só
        let mut tx = self.pool.begin().await?;

        let current = self
            .repo
            .lock_by_id(&mut *tx, id)
            .await?
            .ok_or_else(|| AppError::NotFound("Reserva".to_string()))?;
        let previous = current.status;
        check_transition(previous, requested)?;

        let mut booking = self.repo.update_status(&mut *tx, id, requested, note).await?;
        self.repo
            .record_status_change(&mut *tx, id, Some(previous), requested, note, Some(admin_id))
            .await?;

        if requested == BookingStatus::Cancelled {
            self.repo
                .release_capacity(&mut *tx, booking.preferred_date, booking.slot_start_time, booking.slot_end_time)
                .await?;
        }

        tx.commit().await?;

        tracing::info!(booking_id = %id, from = %previous, to = %requested, "Status da reserva alterado");

        // 2/3. Calendário, sempre depois do commit e sem segurar transação
        let subject = SyncSubject::Booking(id);
        let mut instructions = None;
        let mut reauth_required = false;

        if requested == BookingStatus::Confirmed {
            let request = event_request(&booking, &self.settings)?;
            match self.gateway.create_event(subject, &request).await {
                SyncOutcome::Synced(event) => {
                    // A transição já foi gravada: falha aqui só vai para o log
                    if let Err(e) = self
                        .repo
                        .set_external_event(&self.pool, id, Some(&event.event_id), event.meeting_link.as_deref())
                        .await
                    {
                        tracing::error!(booking_id = %id, event_id = %event.event_id, "Evento criado mas não registrado: {}", e);
                    }
                    booking.external_event_id = Some(event.event_id);
                    booking.external_meeting_link = event.meeting_link;
                }
                SyncOutcome::Degraded(degraded) => {
                    reauth_required = degraded.refresh_token;
                    instructions = Some(degraded.instructions);
                }
            }
        }

        if previous == BookingStatus::Confirmed && requested == BookingStatus::Cancelled {
            if let Some(event_id) = booking.external_event_id.clone() {
                if self.gateway.delete_event(subject, &event_id).await.is_ok() {
                    if let Err(e) = self.repo.set_external_event(&self.pool, id, None, None).await {
                        tracing::error!(booking_id = %id, %event_id, "Evento removido mas o vínculo ficou: {}", e);
                    }
                    booking.external_event_id = None;
                    booking.external_meeting_link = None;
                }
            }
        }

        // 4. E-mail (dispara e esquece)
        if payload.notify_customer {
            self.notifier.enqueue(OutboundEmail {
                template: TemplateKey::for_booking_status(requested),
                recipient: booking.customer_email.clone(),
                context: email_context(&booking, instructions.as_ref()),
            });

            if requested == BookingStatus::Confirmed {
                match self.repo.mark_confirmation_sent(&self.pool, id).await {
                    Ok(()) => booking.confirmation_sent_at = Some(Utc::now()),
                    Err(e) => tracing::error!(booking_id = %id, "Confirmação enviada mas não marcada: {}", e),
                }
            }
        }

        Ok(BookingTransitionResult {
            booking: booking.into(),
            manual_instructions: instructions,
            calendar_reauth_required: reauth_required,
        })
    }

    // --- LEITURA ---

    pub async fn list_for_customer(&self, customer_id: Uuid) -> Result<Vec<Booking>, AppError> {
        self.repo.list_for_customer(&self.pool, customer_id).await
    }

    pub async fn list_for_admin(&self, filter: &BookingFilter) -> Result<Vec<AdminBookingView>, AppError> {
        let bookings = self.repo.list_filtered(&self.pool, filter).await?;
        Ok(bookings.into_iter().map(AdminBookingView::from).collect())
    }

    pub async fn history(&self, id: Uuid) -> Result<Vec<BookingStatusChange>, AppError> {
        if self.repo.find_by_id(&self.pool, id).await?.is_none() {
            return Err(AppError::NotFound("Reserva".to_string()));
        }
        self.repo.history(&self.pool, id).await
    }

    // --- LEMBRETES ---
    /// Lembrete para as confirmadas do próximo dia útil. Devolve quantos saíram.
    pub async fn send_due_reminders(&self, now: DateTime<Utc>) -> Result<usize, AppError> {
        let target = reminder_target_date(self.settings.today(now), self.settings.reminder_lead_days);
        let due = self.repo.list_due_reminders(&self.pool, target).await?;

        let mut sent = 0;
        for booking in due {
            // Marca antes de enfileirar: se outro worker ganhou, pula
            if !self.repo.mark_reminder_sent(&self.pool, booking.id).await? {
                continue;
            }
            self.notifier.enqueue(OutboundEmail {
                template: TemplateKey::BookingReminder,
                recipient: booking.customer_email.clone(),
                context: email_context(&booking, None),
            });
            sent += 1;
        }

        if sent > 0 {
            tracing::info!(%target, sent, "⏰ Lembretes de reunião enfileirados");
        }
        Ok(sent)
    }
}
