// src/db/booking_repo.rs

use chrono::{NaiveDate, NaiveTime};
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::booking::{Booking, BookingFilter, BookingStatus, BookingStatusChange, CreateBookingRequest},
};

#[derive(Clone)]
pub struct BookingRepository {
    pool: PgPool,
}

impl BookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ---
    // Leitura
    // ---

    pub async fn find_by_id<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<Booking>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let booking = sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(booking)
    }

    /// Trava a linha até o fim da transação (duas transições simultâneas não se atropelam).
    pub async fn lock_by_id<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<Booking>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let booking = sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(booking)
    }

    pub async fn list_for_customer<'e, E>(&self, executor: E, customer_id: Uuid) -> Result<Vec<Booking>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let bookings = sqlx::query_as::<_, Booking>(
            r#"
            SELECT * FROM bookings
            WHERE customer_id = $1
            ORDER BY preferred_date DESC, slot_start_time DESC
            "#,
        )
        .bind(customer_id)
        .fetch_all(executor)
        .await?;
        Ok(bookings)
    }

    pub async fn list_filtered<'e, E>(&self, executor: E, filter: &BookingFilter) -> Result<Vec<Booking>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let bookings = sqlx::query_as::<_, Booking>(
            r#"
            SELECT * FROM bookings
            WHERE ($1::booking_status IS NULL OR status = $1)
              AND ($2::date IS NULL OR preferred_date >= $2)
              AND ($3::date IS NULL OR preferred_date <= $3)
            ORDER BY preferred_date ASC, slot_start_time ASC
            "#,
        )
        .bind(filter.status)
        .bind(filter.from)
        .bind(filter.to)
        .fetch_all(executor)
        .await?;
        Ok(bookings)
    }

    /// Confirmadas de uma data que ainda não receberam lembrete.
    pub async fn list_due_reminders<'e, E>(&self, executor: E, date: NaiveDate) -> Result<Vec<Booking>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let bookings = sqlx::query_as::<_, Booking>(
            r#"
            SELECT * FROM bookings
            WHERE status = 'confirmed'
              AND preferred_date = $1
              AND reminder_sent_at IS NULL
            ORDER BY slot_start_time ASC
            "#,
        )
        .bind(date)
        .fetch_all(executor)
        .await?;
        Ok(bookings)
    }

    pub async fn history<'e, E>(&self, executor: E, booking_id: Uuid) -> Result<Vec<BookingStatusChange>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let rows = sqlx::query_as::<_, BookingStatusChange>(
            "SELECT * FROM booking_status_history WHERE booking_id = $1 ORDER BY changed_at ASC",
        )
        .bind(booking_id)
        .fetch_all(executor)
        .await?;
        Ok(rows)
    }

    // ---
    // Escrita (transacional)
    // ---

    pub async fn insert_pending<'e, E>(
        &self,
        executor: E,
        customer_id: Uuid,
        payload: &CreateBookingRequest,
    ) -> Result<Booking, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let booking = sqlx::query_as::<_, Booking>(
            r#"
            INSERT INTO bookings (
                customer_id, customer_name, customer_email, customer_phone,
                business_name, business_website, customer_message,
                preferred_date, slot_start_time, slot_end_time, status
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, 'pending')
            RETURNING *
            "#,
        )
        .bind(customer_id)
        .bind(payload.customer_name.trim())
        .bind(payload.customer_email.trim())
        .bind(payload.customer_phone.as_deref())
        .bind(payload.business_name.trim())
        .bind(payload.business_website.as_deref())
        .bind(payload.customer_message.as_deref())
        .bind(payload.preferred_date)
        .bind(payload.preferred_time_slot.start_time)
        .bind(payload.preferred_time_slot.end_time)
        .fetch_one(executor)
        .await?;
        Ok(booking)
    }

    pub async fn update_status<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        status: BookingStatus,
        admin_note: Option<&str>,
    ) -> Result<Booking, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        // Nota nova substitui a antiga; sem nota, mantém o que havia
        let booking = sqlx::query_as::<_, Booking>(
            r#"
            UPDATE bookings
            SET status = $2,
                admin_notes = COALESCE($3, admin_notes),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(admin_note)
        .fetch_one(executor)
        .await?;
        Ok(booking)
    }

    pub async fn record_status_change<'e, E>(
        &self,
        executor: E,
        booking_id: Uuid,
        from: Option<BookingStatus>,
        to: BookingStatus,
        note: Option<&str>,
        changed_by: Option<Uuid>,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            INSERT INTO booking_status_history (booking_id, from_status, to_status, note, changed_by)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(booking_id)
        .bind(from)
        .bind(to)
        .bind(note)
        .bind(changed_by)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn set_external_event<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        event_id: Option<&str>,
        meeting_link: Option<&str>,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            UPDATE bookings
            SET external_event_id = $2, external_meeting_link = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(event_id)
        .bind(meeting_link)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn mark_confirmation_sent<'e, E>(&self, executor: E, id: Uuid) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("UPDATE bookings SET confirmation_sent_at = NOW(), updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(())
    }

    /// Devolve `false` se outro processo já marcou (o lembrete não sai duas vezes).
    pub async fn mark_reminder_sent<'e, E>(&self, executor: E, id: Uuid) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET reminder_sent_at = NOW(), updated_at = NOW()
            WHERE id = $1 AND reminder_sent_at IS NULL
            "#,
        )
        .bind(id)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    // ---
    // Capacidade
    // ---

    /// Checa e incrementa numa única instrução.
    /// Devolve a nova contagem, ou `None` quando a janela já está cheia.
    pub async fn reserve_capacity<'e, E>(
        &self,
        executor: E,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
        max_bookings: i32,
    ) -> Result<Option<i32>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let count = sqlx::query_scalar::<_, i32>(
            r#"
            INSERT INTO slot_reservations (booking_date, start_time, end_time, bookings_count)
            VALUES ($1, $2, $3, 1)
            ON CONFLICT (booking_date, start_time, end_time)
            DO UPDATE SET bookings_count = slot_reservations.bookings_count + 1
            WHERE slot_reservations.bookings_count < $4
            RETURNING bookings_count
            "#,
        )
        .bind(date)
        .bind(start)
        .bind(end)
        .bind(max_bookings)
        .fetch_optional(executor)
        .await?;
        Ok(count)
    }

    pub async fn release_capacity<'e, E>(
        &self,
        executor: E,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            UPDATE slot_reservations
            SET bookings_count = bookings_count - 1
            WHERE booking_date = $1 AND start_time = $2 AND end_time = $3 AND bookings_count > 0
            "#,
        )
        .bind(date)
        .bind(start)
        .bind(end)
        .execute(executor)
        .await?;
        Ok(())
    }
}
