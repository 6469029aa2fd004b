// src/db/slot_repo.rs

use chrono::NaiveDate;
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::availability::{AvailableTimeSlot, BlackoutDate, SlotReservation, UpsertSlotRequest},
};

#[derive(Clone)]
pub struct SlotRepository {
    pool: PgPool,
}

impl SlotRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ---
    // Grade semanal
    // ---

    pub async fn list_slots<'e, E>(&self, executor: E) -> Result<Vec<AvailableTimeSlot>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let slots = sqlx::query_as::<_, AvailableTimeSlot>(
            "SELECT * FROM available_time_slots ORDER BY day_of_week ASC, start_time ASC",
        )
        .fetch_all(executor)
        .await?;
        Ok(slots)
    }

    pub async fn list_slots_for_day<'e, E>(
        &self,
        executor: E,
        day_of_week: i16,
    ) -> Result<Vec<AvailableTimeSlot>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let slots = sqlx::query_as::<_, AvailableTimeSlot>(
            "SELECT * FROM available_time_slots WHERE day_of_week = $1 ORDER BY start_time ASC",
        )
        .bind(day_of_week)
        .fetch_all(executor)
        .await?;
        Ok(slots)
    }

    pub async fn find_slot<'e, E>(&self, executor: E, id: Uuid) -> Result<Option<AvailableTimeSlot>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let slot = sqlx::query_as::<_, AvailableTimeSlot>("SELECT * FROM available_time_slots WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await?;
        Ok(slot)
    }

    pub async fn insert_slot<'e, E>(&self, executor: E, slot: &UpsertSlotRequest) -> Result<AvailableTimeSlot, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let created = sqlx::query_as::<_, AvailableTimeSlot>(
            r#"
            INSERT INTO available_time_slots (day_of_week, start_time, end_time, max_bookings_per_slot, is_available)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(slot.day_of_week)
        .bind(slot.start_time)
        .bind(slot.end_time)
        .bind(slot.max_bookings_per_slot)
        .bind(slot.is_available)
        .fetch_one(executor)
        .await?;
        Ok(created)
    }

    pub async fn update_slot<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        slot: &UpsertSlotRequest,
    ) -> Result<Option<AvailableTimeSlot>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let updated = sqlx::query_as::<_, AvailableTimeSlot>(
            r#"
            UPDATE available_time_slots
            SET day_of_week = $2,
                start_time = $3,
                end_time = $4,
                max_bookings_per_slot = $5,
                is_available = $6,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(slot.day_of_week)
        .bind(slot.start_time)
        .bind(slot.end_time)
        .bind(slot.max_bookings_per_slot)
        .bind(slot.is_available)
        .fetch_optional(executor)
        .await?;
        Ok(updated)
    }

    /// Reservas guardam a própria data/horário, então apagar não mexe no histórico.
    pub async fn delete_slot<'e, E>(&self, executor: E, id: Uuid) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query("DELETE FROM available_time_slots WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ---
    // Bloqueios
    // ---

    pub async fn list_blackouts<'e, E>(
        &self,
        executor: E,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<BlackoutDate>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let blackouts = sqlx::query_as::<_, BlackoutDate>(
            r#"
            SELECT * FROM blackout_dates
            WHERE ($1::date IS NULL OR date >= $1)
              AND ($2::date IS NULL OR date <= $2)
            ORDER BY date ASC
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(executor)
        .await?;
        Ok(blackouts)
    }

    pub async fn insert_blackout<'e, E>(
        &self,
        executor: E,
        date: NaiveDate,
        reason: &str,
    ) -> Result<BlackoutDate, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query_as::<_, BlackoutDate>(
            "INSERT INTO blackout_dates (date, reason) VALUES ($1, $2) RETURNING *",
        )
        .bind(date)
        .bind(reason)
        .fetch_one(executor)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.is_unique_violation() {
                    return AppError::BlackoutAlreadyExists(date);
                }
            }
            e.into()
        })
    }

    pub async fn delete_blackout<'e, E>(&self, executor: E, id: Uuid) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query("DELETE FROM blackout_dates WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // ---
    // Ocupação (livro-razão de capacidade)
    // ---

    pub async fn reservations_between<'e, E>(
        &self,
        executor: E,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<SlotReservation>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let rows = sqlx::query_as::<_, SlotReservation>(
            r#"
            SELECT * FROM slot_reservations
            WHERE booking_date BETWEEN $1 AND $2
            ORDER BY booking_date ASC, start_time ASC
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(executor)
        .await?;
        Ok(rows)
    }

    /// Ocupação a partir de `from` nas datas que caem em `day_of_week` (0 = domingo).
    pub async fn future_reservations_for_day<'e, E>(
        &self,
        executor: E,
        day_of_week: i16,
        from: NaiveDate,
    ) -> Result<Vec<SlotReservation>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let rows = sqlx::query_as::<_, SlotReservation>(
            r#"
            SELECT * FROM slot_reservations
            WHERE booking_date >= $1
              AND EXTRACT(DOW FROM booking_date)::SMALLINT = $2
              AND bookings_count > 0
            ORDER BY booking_date ASC, start_time ASC
            "#,
        )
        .bind(from)
        .bind(day_of_week)
        .fetch_all(executor)
        .await?;
        Ok(rows)
    }
}
