// src/services/slot_catalog.rs

use chrono::{DateTime, Days, Duration, NaiveDate, NaiveTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{
    common::{
        db_utils::{acquire_xact_lock, SLOT_DAY_LOCK},
        error::{AppError, ScheduleError},
    },
    config::SchedulingSettings,
    db::SlotRepository,
    models::{
        availability::{
            AvailableTimeSlot, BlackoutDate, CreateBlackoutRequest, DayAvailability, SlotReservation, SlotWindow,
            UpsertSlotRequest,
        },
        booking::TimeSlot,
    },
    services::conflict_validator::{
        day_of_week_index, detect_reservation_conflict, detect_slot_overlap, is_weekend, validate_date_selection, validate_slot_times,
        validate_time_slot_choice, SlotTimes,
    },
};

/// "Agora" no fuso do negócio, já reduzido ao que o cálculo de janelas precisa.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusinessClock {
    pub today: NaiveDate,
    pub time: NaiveTime,
    pub min_notice_minutes: i64,
}

impl BusinessClock {
    pub fn from_settings(settings: &SchedulingSettings, now: DateTime<Utc>) -> Self {
        let local = settings.local_now(now);
        Self {
            today: local.date_naive(),
            time: local.time(),
            min_notice_minutes: settings.min_notice_minutes,
        }
    }

    /// Primeiro horário que ainda pode ser oferecido hoje.
    /// `None` quando a antecedência mínima já passa da meia-noite.
    fn earliest_start_today(&self) -> Option<NaiveTime> {
        let (earliest, wrapped) = self
            .time
            .overflowing_add_signed(Duration::minutes(self.min_notice_minutes.max(0)));
        (wrapped == 0).then_some(earliest)
    }
}

/// Janelas com vaga numa data. Sem I/O: recebe a grade, a ocupação e os bloqueios já carregados.
pub fn compute_windows(
    date: NaiveDate,
    slots: &[AvailableTimeSlot],
    reservations: &[SlotReservation],
    blackouts: &[BlackoutDate],
    clock: &BusinessClock,
) -> Vec<SlotWindow> {
    if date < clock.today || is_weekend(date) || blackouts.iter().any(|b| b.date == date) {
        return Vec::new();
    }

    let day = day_of_week_index(date);
    let earliest = if date == clock.today {
        match clock.earliest_start_today() {
            Some(t) => Some(t),
            None => return Vec::new(),
        }
    } else {
        None
    };

    let mut windows: Vec<SlotWindow> = slots
        .iter()
        .filter(|slot| slot.is_available && slot.day_of_week == day)
        .filter(|slot| earliest.is_none_or(|t| slot.start_time >= t))
        .filter_map(|slot| {
            let taken = reservations
                .iter()
                .find(|r| r.booking_date == date && r.start_time == slot.start_time && r.end_time == slot.end_time)
                .map_or(0, |r| r.bookings_count);
            let remaining = slot.max_bookings_per_slot - taken;

            (remaining > 0).then(|| SlotWindow {
                slot_id: slot.id,
                start_time: slot.start_time,
                end_time: slot.end_time,
                max_bookings: slot.max_bookings_per_slot,
                remaining,
            })
        })
        .collect();

    windows.sort_by_key(|w| w.start_time);
    windows
}

/// A janela existe e está ativa na grade, mas a ocupação da data já chegou ao máximo.
pub fn is_window_full(
    date: NaiveDate,
    slot: &TimeSlot,
    slots: &[AvailableTimeSlot],
    reservations: &[SlotReservation],
) -> bool {
    let day = day_of_week_index(date);
    let Some(grid) = slots.iter().find(|s| {
        s.is_available && s.day_of_week == day && s.start_time == slot.start_time && s.end_time == slot.end_time
    }) else {
        return false;
    };

    reservations
        .iter()
        .find(|r| r.booking_date == date && r.start_time == slot.start_time && r.end_time == slot.end_time)
        .is_some_and(|r| r.bookings_count >= grid.max_bookings_per_slot)
}

#[derive(Clone)]
pub struct SlotCatalogService {
    pool: PgPool,
    repo: SlotRepository,
    settings: SchedulingSettings,
}

impl SlotCatalogService {
    pub fn new(pool: PgPool, repo: SlotRepository, settings: SchedulingSettings) -> Self {
        Self { pool, repo, settings }
    }

    // --- GRADE ---

    pub async fn list_slots(&self) -> Result<Vec<AvailableTimeSlot>, AppError> {
        self.repo.list_slots(&self.pool).await
    }

    /// Cria (id = None) ou edita um horário.
    /// O advisory lock do dia torna "checar sobreposição + gravar" atômico contra outros admins.
    /// Janelas que cruzam reservas futuras de outra janela são recusadas.
    pub async fn upsert_slot(
        &self,
        id: Option<Uuid>,
        payload: UpsertSlotRequest,
        now: DateTime<Utc>,
    ) -> Result<AvailableTimeSlot, AppError> {
        validate_slot_times(payload.start_time, payload.end_time, self.settings.min_slot_minutes)?;

        let mut tx = self.pool.begin().await?;
        acquire_xact_lock(&mut *tx, SLOT_DAY_LOCK, i32::from(payload.day_of_week)).await?;

        if let Some(id) = id {
            if self.repo.find_slot(&mut *tx, id).await?.is_none() {
                return Err(AppError::NotFound("Horário".to_string()));
            }
        }

        // Horário inativo não oferece nada: não concorre com ninguém
        if payload.is_available {
            let candidate = SlotTimes {
                day_of_week: payload.day_of_week,
                start_time: payload.start_time,
                end_time: payload.end_time,
            };
            let same_day = self.repo.list_slots_for_day(&mut *tx, payload.day_of_week).await?;
            detect_slot_overlap(&candidate, &same_day, id)?;

            let reserved = self
                .repo
                .future_reservations_for_day(&mut *tx, payload.day_of_week, self.settings.today(now))
                .await?;
            if let Err(conflict) = detect_reservation_conflict(&candidate, &reserved) {
                tracing::info!(day_of_week = payload.day_of_week, "Alteração de grade recusada: {}", conflict);
                return Err(conflict.into());
            }
        }

        let slot = match id {
            Some(id) => self
                .repo
                .update_slot(&mut *tx, id, &payload)
                .await?
                .ok_or_else(|| AppError::NotFound("Horário".to_string()))?,
            None => self.repo.insert_slot(&mut *tx, &payload).await?,
        };

        tx.commit().await?;

        tracing::info!(
            slot_id = %slot.id,
            day_of_week = slot.day_of_week,
            start = %slot.start_time,
            end = %slot.end_time,
            "Horário da grade salvo"
        );
        Ok(slot)
    }

    pub async fn delete_slot(&self, id: Uuid) -> Result<(), AppError> {
        if !self.repo.delete_slot(&self.pool, id).await? {
            return Err(AppError::NotFound("Horário".to_string()));
        }
        tracing::info!(slot_id = %id, "Horário removido da grade");
        Ok(())
    }

    // --- BLOQUEIOS ---

    pub async fn list_blackouts(
        &self,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<BlackoutDate>, AppError> {
        self.repo.list_blackouts(&self.pool, from, to).await
    }

    pub async fn add_blackout(&self, payload: CreateBlackoutRequest) -> Result<BlackoutDate, AppError> {
        let blackout = self.repo.insert_blackout(&self.pool, payload.date, payload.reason.trim()).await?;
        tracing::info!(date = %blackout.date, reason = %blackout.reason, "Data bloqueada");
        Ok(blackout)
    }

    pub async fn remove_blackout(&self, id: Uuid) -> Result<(), AppError> {
        if !self.repo.delete_blackout(&self.pool, id).await? {
            return Err(AppError::NotFound("Bloqueio".to_string()));
        }
        Ok(())
    }

    // --- DISPONIBILIDADE ---

    pub async fn available_slots_for_date(
        &self,
        date: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<Vec<SlotWindow>, AppError> {
        let day = self.availability_between(date, date, now).await?;
        Ok(day.into_iter().next().map(|d| d.windows).unwrap_or_default())
    }

    pub async fn is_bookable(&self, date: NaiveDate, now: DateTime<Utc>) -> Result<bool, AppError> {
        let day = self.availability_between(date, date, now).await?;
        Ok(day.first().is_some_and(|d| d.bookable))
    }

    /// Visão por dia para o calendário do site. O intervalo é limitado à janela de reserva.
    pub async fn availability_between(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<Vec<DayAvailability>, AppError> {
        let clock = BusinessClock::from_settings(&self.settings, now);
        let horizon = u64::try_from(self.settings.max_days_ahead)
            .ok()
            .and_then(|days| clock.today.checked_add_days(Days::new(days)))
            .unwrap_or(clock.today);

        let from = from.max(clock.today);
        let to = to.min(horizon);
        if from > to {
            return Ok(Vec::new());
        }

        let slots = self.repo.list_slots(&self.pool).await?;
        let blackouts = self.repo.list_blackouts(&self.pool, Some(from), Some(to)).await?;
        let reservations = self.repo.reservations_between(&self.pool, from, to).await?;

        let days = from
            .iter_days()
            .take_while(|d| *d <= to)
            .map(|date| {
                let windows = compute_windows(date, &slots, &reservations, &blackouts, &clock);
                DayAvailability {
                    date,
                    bookable: !windows.is_empty(),
                    windows,
                }
            })
            .collect();

        Ok(days)
    }

    /// Revalida a escolha do cliente contra o estado atual e devolve a janela escolhida.
    pub async fn check_booking_choice(
        &self,
        date: NaiveDate,
        slot: &TimeSlot,
        now: DateTime<Utc>,
    ) -> Result<SlotWindow, AppError> {
        let clock = BusinessClock::from_settings(&self.settings, now);
        let blackouts = self.repo.list_blackouts(&self.pool, Some(date), Some(date)).await?;
        validate_date_selection(date, clock.today, &blackouts, self.settings.max_days_ahead)?;

        let windows = self.available_slots_for_date(date, now).await?;
        if let Err(missing) = validate_time_slot_choice(date, slot, &windows) {
            // Sumiu porque lotou: é a mesma disputa pela última vaga que o commit resolveria
            let slots = self.repo.list_slots_for_day(&self.pool, day_of_week_index(date)).await?;
            let reservations = self.repo.reservations_between(&self.pool, date, date).await?;
            if is_window_full(date, slot, &slots, &reservations) {
                return Err(ScheduleError::CapacityExceeded { date, start: slot.start_time }.into());
            }
            return Err(missing.into());
        }

        windows
            .into_iter()
            .find(|w| w.start_time == slot.start_time && w.end_time == slot.end_time)
            .ok_or_else(|| {
                ScheduleError::SlotNoLongerAvailable {
                    date,
                    start: slot.start_time,
                    end: slot.end_time,
                }
                .into()
            })
    }
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};

    use super::*;
    use crate::{
        config::testing::{booking_request, monday_morning, TestApp},
        services::calendar::testing::ScriptedProvider,
    };

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn slot(day_of_week: i16, start: NaiveTime, end: NaiveTime, max: i32) -> AvailableTimeSlot {
        AvailableTimeSlot {
            id: Uuid::new_v4(),
            day_of_week,
            start_time: start,
            end_time: end,
            max_bookings_per_slot: max,
            is_available: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn reservation(date: NaiveDate, start: NaiveTime, end: NaiveTime, count: i32) -> SlotReservation {
        SlotReservation { booking_date: date, start_time: start, end_time: end, bookings_count: count }
    }

    // Segunda-feira, 2026-10-19, 08:00 no fuso do negócio
    #[fixture]
    fn clock() -> BusinessClock {
        BusinessClock { today: d(2026, 10, 19), time: t(8, 0), min_notice_minutes: 60 }
    }

    #[fixture]
    fn tuesday_grid() -> Vec<AvailableTimeSlot> {
        vec![
            slot(2, t(14, 0), t(15, 0), 1),
            slot(2, t(9, 0), t(10, 0), 2),
            slot(3, t(9, 0), t(10, 0), 1),
        ]
    }

    #[rstest]
    fn windows_follow_weekday_and_are_sorted(clock: BusinessClock, tuesday_grid: Vec<AvailableTimeSlot>) {
        let windows = compute_windows(d(2026, 10, 20), &tuesday_grid, &[], &[], &clock);

        let starts: Vec<_> = windows.iter().map(|w| w.start_time).collect();
        assert_eq!(starts, vec![t(9, 0), t(14, 0)]);
        assert_eq!(windows[0].remaining, 2);
    }

    #[rstest]
    fn remaining_capacity_comes_from_reservations(clock: BusinessClock, tuesday_grid: Vec<AvailableTimeSlot>) {
        let date = d(2026, 10, 20);
        let reservations = vec![
            reservation(date, t(9, 0), t(10, 0), 1),
            reservation(date, t(14, 0), t(15, 0), 1),
            // outra data não conta
            reservation(d(2026, 10, 27), t(9, 0), t(10, 0), 2),
        ];

        let windows = compute_windows(date, &tuesday_grid, &reservations, &[], &clock);

        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].start_time, t(9, 0));
        assert_eq!(windows[0].remaining, 1);
    }

    #[rstest]
    fn blackout_weekend_and_past_days_have_no_windows(clock: BusinessClock) {
        let every_day: Vec<_> = (0..7).map(|dow| slot(dow, t(9, 0), t(10, 0), 1)).collect();
        let holiday = BlackoutDate {
            id: Uuid::new_v4(),
            date: d(2026, 11, 2),
            reason: "Finados".to_string(),
            created_at: Utc::now(),
        };

        assert!(compute_windows(d(2026, 11, 2), &every_day, &[], &[holiday], &clock).is_empty());
        assert!(compute_windows(d(2026, 10, 24), &every_day, &[], &[], &clock).is_empty()); // sábado
        assert!(compute_windows(d(2026, 10, 18), &every_day, &[], &[], &clock).is_empty()); // ontem
        assert_eq!(compute_windows(d(2026, 10, 21), &every_day, &[], &[], &clock).len(), 1);
    }

    #[rstest]
    fn same_day_windows_respect_minimum_notice(clock: BusinessClock) {
        let monday = vec![
            slot(1, t(8, 30), t(9, 0), 1),
            slot(1, t(9, 0), t(10, 0), 1),
            slot(1, t(11, 0), t(12, 0), 1),
        ];

        let windows = compute_windows(clock.today, &monday, &[], &[], &clock);
        let starts: Vec<_> = windows.iter().map(|w| w.start_time).collect();
        assert_eq!(starts, vec![t(9, 0), t(11, 0)]);
    }

    #[rstest]
    fn late_evening_offers_nothing_for_today() {
        let clock = BusinessClock { today: d(2026, 10, 19), time: t(23, 30), min_notice_minutes: 60 };
        let monday = vec![slot(1, t(23, 45), t(23, 59), 1)];
        assert!(compute_windows(clock.today, &monday, &[], &[], &clock).is_empty());
    }

    #[rstest]
    fn full_window_is_told_apart_from_a_missing_one(tuesday_grid: Vec<AvailableTimeSlot>) {
        let date = d(2026, 10, 20);
        let nine = TimeSlot { start_time: t(9, 0), end_time: t(10, 0) };
        let two = TimeSlot { start_time: t(14, 0), end_time: t(15, 0) };
        let reservations = vec![
            reservation(date, t(9, 0), t(10, 0), 1),
            reservation(date, t(14, 0), t(15, 0), 1),
        ];

        // 09:00 aceita 2, 14:00 aceita 1
        assert!(!is_window_full(date, &nine, &tuesday_grid, &reservations));
        assert!(is_window_full(date, &two, &tuesday_grid, &reservations));

        // fora da grade ou em outra data não é "lotado"
        let gone = TimeSlot { start_time: t(16, 0), end_time: t(17, 0) };
        assert!(!is_window_full(date, &gone, &tuesday_grid, &reservations));
        assert!(!is_window_full(d(2026, 10, 27), &two, &tuesday_grid, &reservations));
    }

    #[test]
    fn clock_uses_business_offset() {
        use chrono::TimeZone;
        let settings = SchedulingSettings::default();
        // 02:00 UTC de terça = 23:00 de segunda em -03:00
        let now = Utc.with_ymd_and_hms(2026, 10, 20, 2, 0, 0).unwrap();
        let clock = BusinessClock::from_settings(&settings, now);
        assert_eq!(clock.today, d(2026, 10, 19));
        assert_eq!(clock.time, t(23, 0));
    }

    #[sqlx::test(migrations = "./migrations")]
    #[ignore]
    async fn reshaping_a_booked_window_cannot_reset_its_occupancy(pool: PgPool) {
        let app = TestApp::new(pool, ScriptedProvider::default());
        let catalog = &app.state.slot_catalog;
        let tuesday = d(2026, 10, 27);

        let slot = app.open_slot(2, t(9, 0), t(10, 0), 1).await;
        app.state
            .booking_service
            .create_booking(Uuid::new_v4(), booking_request(tuesday, t(9, 0), t(10, 0)), monday_morning())
            .await
            .unwrap();

        let stretched = UpsertSlotRequest {
            day_of_week: 2,
            start_time: t(9, 0),
            end_time: t(10, 30),
            max_bookings_per_slot: 1,
            is_available: true,
        };
        let err = catalog
            .upsert_slot(Some(slot.id), stretched.clone(), monday_morning())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Schedule(ScheduleError::SlotHasReservations { .. })));
        assert!(catalog.available_slots_for_date(tuesday, monday_morning()).await.unwrap().is_empty());

        // Apagar e recriar maior também não zera a contagem
        catalog.delete_slot(slot.id).await.unwrap();
        let err = catalog.upsert_slot(None, stretched, monday_morning()).await.unwrap_err();
        assert!(matches!(err, AppError::Schedule(ScheduleError::SlotHasReservations { .. })));

        // A mesma janela de volta reaproveita a contagem
        app.open_slot(2, t(9, 0), t(10, 0), 1).await;
        assert!(catalog.available_slots_for_date(tuesday, monday_morning()).await.unwrap().is_empty());
        assert_eq!(catalog.available_slots_for_date(d(2026, 11, 3), monday_morning()).await.unwrap().len(), 1);
    }
}
