// src/db/recurring_repo.rs

use chrono::{NaiveDate, NaiveTime};
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::recurring::{CreateRecurringMeetingRequest, MeetingOccurrence, RecurringMeeting},
};

#[derive(Clone)]
pub struct RecurringRepository {
    pool: PgPool,
}

impl RecurringRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ---
    // Regras
    // ---

    pub async fn insert_meeting<'e, E>(
        &self,
        executor: E,
        owner_id: Uuid,
        payload: &CreateRecurringMeetingRequest,
    ) -> Result<RecurringMeeting, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let meeting = sqlx::query_as::<_, RecurringMeeting>(
            r#"
            INSERT INTO recurring_meetings (
                owner_id, title, attendee_email, recurrence_frequency,
                day_of_week, day_of_month, week_of_month,
                preferred_time, duration_minutes, start_date, end_date
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(owner_id)
        .bind(payload.title.trim())
        .bind(payload.attendee_email.trim())
        .bind(payload.recurrence_frequency)
        .bind(payload.day_of_week)
        .bind(payload.day_of_month)
        .bind(payload.week_of_month)
        .bind(payload.preferred_time)
        .bind(payload.duration_minutes)
        .bind(payload.start_date)
        .bind(payload.end_date)
        .fetch_one(executor)
        .await?;
        Ok(meeting)
    }

    pub async fn find_meeting<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<RecurringMeeting>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let meeting = sqlx::query_as::<_, RecurringMeeting>("SELECT * FROM recurring_meetings WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(meeting)
    }

    pub async fn list_for_owner<'e, E>(&self, executor: E, owner_id: Uuid) -> Result<Vec<RecurringMeeting>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let meetings = sqlx::query_as::<_, RecurringMeeting>(
            "SELECT * FROM recurring_meetings WHERE owner_id = $1 ORDER BY created_at DESC",
        )
        .bind(owner_id)
        .fetch_all(executor)
        .await?;
        Ok(meetings)
    }

    /// Regras que ainda podem gerar ocorrências a partir de `today`.
    pub async fn list_active<'e, E>(&self, executor: E, today: NaiveDate) -> Result<Vec<RecurringMeeting>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let meetings = sqlx::query_as::<_, RecurringMeeting>(
            r#"
            SELECT * FROM recurring_meetings
            WHERE is_active
              AND (end_date IS NULL OR end_date >= $1)
            ORDER BY created_at ASC
            "#,
        )
        .bind(today)
        .fetch_all(executor)
        .await?;
        Ok(meetings)
    }

    pub async fn set_end_date<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        end_date: NaiveDate,
    ) -> Result<RecurringMeeting, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let meeting = sqlx::query_as::<_, RecurringMeeting>(
            r#"
            UPDATE recurring_meetings
            SET end_date = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(end_date)
        .fetch_one(executor)
        .await?;
        Ok(meeting)
    }

    // ---
    // Ocorrências
    // ---

    /// `None` quando a data já existia para a regra (nunca duplica).
    pub async fn insert_occurrence<'e, E>(
        &self,
        executor: E,
        meeting_id: Uuid,
        date: NaiveDate,
        time: NaiveTime,
    ) -> Result<Option<MeetingOccurrence>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let occurrence = sqlx::query_as::<_, MeetingOccurrence>(
            r#"
            INSERT INTO meeting_occurrences (recurring_meeting_id, scheduled_date, scheduled_time)
            VALUES ($1, $2, $3)
            ON CONFLICT (recurring_meeting_id, scheduled_date) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(meeting_id)
        .bind(date)
        .bind(time)
        .fetch_optional(executor)
        .await?;
        Ok(occurrence)
    }

    pub async fn list_occurrences<'e, E>(
        &self,
        executor: E,
        meeting_id: Uuid,
    ) -> Result<Vec<MeetingOccurrence>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let occurrences = sqlx::query_as::<_, MeetingOccurrence>(
            r#"
            SELECT * FROM meeting_occurrences
            WHERE recurring_meeting_id = $1
            ORDER BY scheduled_date ASC
            "#,
        )
        .bind(meeting_id)
        .fetch_all(executor)
        .await?;
        Ok(occurrences)
    }

    pub async fn find_occurrence<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<MeetingOccurrence>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let occurrence = sqlx::query_as::<_, MeetingOccurrence>("SELECT * FROM meeting_occurrences WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(occurrence)
    }

    /// Só altera ocorrência ainda agendada; `None` se já foi cancelada ou concluída.
    pub async fn update_occurrence<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        scheduled_time: NaiveTime,
        client_notes: Option<&str>,
    ) -> Result<Option<MeetingOccurrence>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let occurrence = sqlx::query_as::<_, MeetingOccurrence>(
            r#"
            UPDATE meeting_occurrences
            SET scheduled_time = $2,
                client_notes = COALESCE($3, client_notes),
                updated_at = NOW()
            WHERE id = $1 AND status = 'scheduled'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(scheduled_time)
        .bind(client_notes)
        .fetch_optional(executor)
        .await?;
        Ok(occurrence)
    }

    pub async fn clear_occurrence_event<'e, E>(&self, executor: E, id: Uuid) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            UPDATE meeting_occurrences
            SET external_event_id = NULL, external_meeting_link = NULL, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Vincula o evento só se a ocorrência continua agendada.
    /// `false` = foi cancelada enquanto o calendário respondia; o evento precisa ser apagado.
    pub async fn attach_occurrence_event<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        event_id: &str,
        meeting_link: Option<&str>,
    ) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            r#"
            UPDATE meeting_occurrences
            SET external_event_id = $2, external_meeting_link = $3, updated_at = NOW()
            WHERE id = $1 AND status = 'scheduled'
            "#,
        )
        .bind(id)
        .bind(event_id)
        .bind(meeting_link)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Cancela as agendadas depois de `after` e devolve as linhas afetadas (para apagar os eventos).
    pub async fn cancel_occurrences_after<'e, E>(
        &self,
        executor: E,
        meeting_id: Uuid,
        after: NaiveDate,
    ) -> Result<Vec<MeetingOccurrence>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let cancelled = sqlx::query_as::<_, MeetingOccurrence>(
            r#"
            UPDATE meeting_occurrences
            SET status = 'cancelled', updated_at = NOW()
            WHERE recurring_meeting_id = $1
              AND scheduled_date > $2
              AND status = 'scheduled'
            RETURNING *
            "#,
        )
        .bind(meeting_id)
        .bind(after)
        .fetch_all(executor)
        .await?;
        Ok(cancelled)
    }
}
