// src/services/jobs.rs

use std::time::Duration;

use chrono::Utc;
use tokio::{task::JoinHandle, time::MissedTickBehavior};

use crate::services::{booking_lifecycle::BookingService, recurrence::RecurringMeetingService};

/// Resultado de uma rodada manual ou periódica.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct JobRun {
    pub reminders_sent: usize,
    pub occurrences_created: usize,
}

/// Uma rodada: lembretes do dia + extensão das reuniões recorrentes.
/// Erros são logados e não interrompem a outra metade.
pub async fn run_once(bookings: &BookingService, recurring: &RecurringMeetingService) -> JobRun {
    let now = Utc::now();
    let mut run = JobRun::default();

    match bookings.send_due_reminders(now).await {
        Ok(sent) => run.reminders_sent = sent,
        Err(e) => tracing::error!("Falha no job de lembretes: {}", e),
    }

    match recurring.materialize_all(now).await {
        Ok(report) => run.occurrences_created = report.occurrences_created,
        Err(e) => tracing::error!("Falha no job de ocorrências: {}", e),
    }

    run
}

/// Sobe o laço periódico em background. Sem intervalo configurado, não faz nada.
pub fn spawn_periodic_jobs(
    interval: Option<Duration>,
    bookings: BookingService,
    recurring: RecurringMeetingService,
) -> Option<JoinHandle<()>> {
    let period = interval?;
    tracing::info!(every_secs = period.as_secs(), "⏱️ Jobs periódicos habilitados");

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        // Rodada atrasada não acumula: a próxima já cobre o mesmo dia
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            let run = run_once(&bookings, &recurring).await;
            tracing::debug!(
                reminders = run.reminders_sent,
                occurrences = run.occurrences_created,
                "Rodada periódica concluída"
            );
        }
    }))
}
