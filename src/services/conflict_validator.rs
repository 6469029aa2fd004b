// src/services/conflict_validator.rs
//
// Funções puras: nada de I/O aqui. Os serviços buscam os dados e chamam estas regras.

use chrono::{Datelike, Days, NaiveDate, NaiveTime, Weekday};
use uuid::Uuid;

use crate::{
    common::error::ScheduleError,
    models::{
        availability::{AvailableTimeSlot, BlackoutDate, SlotReservation, SlotWindow},
        booking::TimeSlot,
    },
};

/// Horário candidato (novo ou editado) antes de ir para o banco.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotTimes {
    pub day_of_week: i16,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

pub fn validate_slot_times(
    start: NaiveTime,
    end: NaiveTime,
    min_minutes: i64,
) -> Result<(), ScheduleError> {
    if start >= end {
        return Err(ScheduleError::InvalidRange { start, end });
    }

    let minutes = (end - start).num_minutes();
    if minutes < min_minutes {
        return Err(ScheduleError::TooShort { minutes, minimum: min_minutes });
    }

    Ok(())
}

/// Intervalos semiabertos [início, fim): encostar no limite não é conflito.
pub fn overlaps(a_start: NaiveTime, a_end: NaiveTime, b_start: NaiveTime, b_end: NaiveTime) -> bool {
    a_start < b_end && a_end > b_start
}

/// Só horários ativos (is_available) entram na comparação.
/// `exclude_id` é o próprio horário quando estamos editando.
pub fn detect_slot_overlap(
    candidate: &SlotTimes,
    existing: &[AvailableTimeSlot],
    exclude_id: Option<Uuid>,
) -> Result<(), ScheduleError> {
    let conflict = existing.iter().find(|slot| {
        slot.is_available
            && Some(slot.id) != exclude_id
            && slot.day_of_week == candidate.day_of_week
            && overlaps(candidate.start_time, candidate.end_time, slot.start_time, slot.end_time)
    });

    match conflict {
        Some(slot) => Err(ScheduleError::SlotOverlap {
            day_of_week: slot.day_of_week,
            start: slot.start_time,
            end: slot.end_time,
        }),
        None => Ok(()),
    }
}

/// A ocupação é contada por (data, início, fim) exatos. Oferecer uma janela que cruza
/// reservas futuras de outra janela no mesmo dia da semana zeraria a contagem
/// e deixaria vender a mesma hora de novo. Janela idêntica reaproveita a contagem.
pub fn detect_reservation_conflict(
    candidate: &SlotTimes,
    reservations: &[SlotReservation],
) -> Result<(), ScheduleError> {
    let conflict = reservations.iter().find(|r| {
        r.bookings_count > 0
            && day_of_week_index(r.booking_date) == candidate.day_of_week
            && (r.start_time, r.end_time) != (candidate.start_time, candidate.end_time)
            && overlaps(candidate.start_time, candidate.end_time, r.start_time, r.end_time)
    });

    match conflict {
        Some(r) => Err(ScheduleError::SlotHasReservations {
            date: r.booking_date,
            start: r.start_time,
            end: r.end_time,
        }),
        None => Ok(()),
    }
}

/// Índice do dia na convenção do banco (0 = domingo).
pub fn day_of_week_index(date: NaiveDate) -> i16 {
    date.weekday().num_days_from_sunday() as i16
}

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// A ordem das checagens garante que só um resultado vale para cada data:
/// passado, longe demais, bloqueada, fim de semana ou ok.
pub fn validate_date_selection(
    date: NaiveDate,
    today: NaiveDate,
    blackouts: &[BlackoutDate],
    max_days_ahead: i64,
) -> Result<(), ScheduleError> {
    if date < today {
        return Err(ScheduleError::PastDate(date));
    }

    let limit = u64::try_from(max_days_ahead)
        .ok()
        .and_then(|days| today.checked_add_days(Days::new(days)))
        .unwrap_or(today);
    if date > limit {
        return Err(ScheduleError::TooFarAhead { date, max_days_ahead });
    }

    if let Some(blackout) = blackouts.iter().find(|b| b.date == date) {
        return Err(ScheduleError::BlackedOut { date, reason: blackout.reason.clone() });
    }

    if is_weekend(date) {
        return Err(ScheduleError::Unavailable(date));
    }

    Ok(())
}

/// `available` precisa ser recalculado no momento do envio, não o que o cliente viu na tela.
pub fn validate_time_slot_choice(
    date: NaiveDate,
    slot: &TimeSlot,
    available: &[SlotWindow],
) -> Result<(), ScheduleError> {
    let still_there = available.iter().any(|window| {
        window.start_time == slot.start_time && window.end_time == slot.end_time && window.remaining > 0
    });

    if still_there {
        Ok(())
    } else {
        Err(ScheduleError::SlotNoLongerAvailable {
            date,
            start: slot.start_time,
            end: slot.end_time,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rstest::{fixture, rstest};

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn slot(day_of_week: i16, start: NaiveTime, end: NaiveTime) -> AvailableTimeSlot {
        AvailableTimeSlot {
            id: Uuid::new_v4(),
            day_of_week,
            start_time: start,
            end_time: end,
            max_bookings_per_slot: 1,
            is_available: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[fixture]
    fn monday_morning() -> Vec<AvailableTimeSlot> {
        vec![slot(1, t(9, 0), t(10, 0)), slot(1, t(10, 30), t(11, 30))]
    }

    #[rstest]
    #[case(t(10, 0), t(9, 0))]
    #[case(t(9, 0), t(9, 0))]
    fn rejects_inverted_or_empty_ranges(#[case] start: NaiveTime, #[case] end: NaiveTime) {
        assert!(matches!(
            validate_slot_times(start, end, 30),
            Err(ScheduleError::InvalidRange { .. })
        ));
    }

    #[test]
    fn rejects_slots_shorter_than_minimum() {
        assert_eq!(
            validate_slot_times(t(9, 0), t(9, 29), 30),
            Err(ScheduleError::TooShort { minutes: 29, minimum: 30 })
        );
        assert!(validate_slot_times(t(9, 0), t(9, 30), 30).is_ok());
    }

    #[rstest]
    #[case(t(9, 30), t(10, 30))]
    #[case(t(8, 0), t(12, 0))]
    #[case(t(9, 15), t(9, 45))]
    #[case(t(11, 0), t(12, 0))]
    fn overlapping_same_day_slots_conflict(
        monday_morning: Vec<AvailableTimeSlot>,
        #[case] start: NaiveTime,
        #[case] end: NaiveTime,
    ) {
        let candidate = SlotTimes { day_of_week: 1, start_time: start, end_time: end };
        assert!(matches!(
            detect_slot_overlap(&candidate, &monday_morning, None),
            Err(ScheduleError::SlotOverlap { day_of_week: 1, .. })
        ));
    }

    #[rstest]
    #[case(1, t(10, 0), t(10, 30))] // encosta nos dois vizinhos
    #[case(1, t(11, 30), t(12, 30))]
    #[case(1, t(7, 0), t(9, 0))]
    #[case(2, t(9, 0), t(10, 0))] // outro dia
    fn touching_or_other_day_slots_do_not_conflict(
        monday_morning: Vec<AvailableTimeSlot>,
        #[case] day: i16,
        #[case] start: NaiveTime,
        #[case] end: NaiveTime,
    ) {
        let candidate = SlotTimes { day_of_week: day, start_time: start, end_time: end };
        assert!(detect_slot_overlap(&candidate, &monday_morning, None).is_ok());
    }

    #[rstest]
    fn overlap_reports_first_conflicting_slot(monday_morning: Vec<AvailableTimeSlot>) {
        let candidate = SlotTimes { day_of_week: 1, start_time: t(9, 30), end_time: t(11, 0) };
        assert_eq!(
            detect_slot_overlap(&candidate, &monday_morning, None),
            Err(ScheduleError::SlotOverlap { day_of_week: 1, start: t(9, 0), end: t(10, 0) })
        );
    }

    #[rstest]
    fn editing_a_slot_ignores_itself(monday_morning: Vec<AvailableTimeSlot>) {
        let own = &monday_morning[0];
        let candidate = SlotTimes { day_of_week: 1, start_time: t(8, 30), end_time: t(10, 0) };
        assert!(detect_slot_overlap(&candidate, &monday_morning, Some(own.id)).is_ok());
    }

    #[rstest]
    fn inactive_slots_are_ignored(mut monday_morning: Vec<AvailableTimeSlot>) {
        monday_morning[0].is_available = false;
        let candidate = SlotTimes { day_of_week: 1, start_time: t(9, 0), end_time: t(10, 0) };
        assert!(detect_slot_overlap(&candidate, &monday_morning, None).is_ok());
    }

    fn reserved(date: NaiveDate, start: NaiveTime, end: NaiveTime, count: i32) -> SlotReservation {
        SlotReservation { booking_date: date, start_time: start, end_time: end, bookings_count: count }
    }

    // Uma reserva na terça 2026-10-27, 09:00-10:00
    #[fixture]
    fn tuesday_booked() -> Vec<SlotReservation> {
        vec![reserved(d(2026, 10, 27), t(9, 0), t(10, 0), 1)]
    }

    #[rstest]
    #[case(t(9, 0), t(10, 30))] // estica o fim
    #[case(t(8, 30), t(10, 0))]
    #[case(t(9, 30), t(10, 30))]
    fn reshaping_a_booked_window_is_rejected(
        tuesday_booked: Vec<SlotReservation>,
        #[case] start: NaiveTime,
        #[case] end: NaiveTime,
    ) {
        let candidate = SlotTimes { day_of_week: 2, start_time: start, end_time: end };
        assert_eq!(
            detect_reservation_conflict(&candidate, &tuesday_booked),
            Err(ScheduleError::SlotHasReservations { date: d(2026, 10, 27), start: t(9, 0), end: t(10, 0) })
        );
    }

    #[rstest]
    #[case(2, t(9, 0), t(10, 0))] // mesma janela: a contagem continua valendo
    #[case(2, t(10, 0), t(11, 0))] // encosta
    #[case(3, t(9, 0), t(10, 30))] // outro dia
    fn windows_that_keep_the_ledger_consistent_are_accepted(
        tuesday_booked: Vec<SlotReservation>,
        #[case] day: i16,
        #[case] start: NaiveTime,
        #[case] end: NaiveTime,
    ) {
        let candidate = SlotTimes { day_of_week: day, start_time: start, end_time: end };
        assert!(detect_reservation_conflict(&candidate, &tuesday_booked).is_ok());
    }

    #[test]
    fn fully_released_reservations_do_not_block() {
        let released = vec![reserved(d(2026, 10, 27), t(9, 0), t(10, 0), 0)];
        let candidate = SlotTimes { day_of_week: 2, start_time: t(9, 0), end_time: t(10, 30) };
        assert!(detect_reservation_conflict(&candidate, &released).is_ok());
    }

    fn blackout(date: NaiveDate, reason: &str) -> BlackoutDate {
        BlackoutDate {
            id: Uuid::new_v4(),
            date,
            reason: reason.to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn date_selection_outcomes_are_mutually_exclusive() {
        // 2026-10-19 é segunda-feira
        let today = d(2026, 10, 19);
        let holiday = d(2026, 11, 2);
        let blackouts = vec![blackout(holiday, "Finados")];
        let limit = today + Days::new(60);

        let mut date = today - Days::new(10);
        while date <= limit + Days::new(10) {
            let outcome = validate_date_selection(date, today, &blackouts, 60);

            assert_eq!(matches!(outcome, Err(ScheduleError::PastDate(_))), date < today);
            assert_eq!(matches!(outcome, Err(ScheduleError::TooFarAhead { .. })), date > limit);

            let in_window = date >= today && date <= limit;
            if in_window && date == holiday {
                assert!(matches!(outcome, Err(ScheduleError::BlackedOut { ref reason, .. }) if reason == "Finados"));
            } else if in_window && is_weekend(date) {
                assert_eq!(outcome, Err(ScheduleError::Unavailable(date)));
            } else if in_window {
                assert!(outcome.is_ok(), "{date} deveria estar livre");
            }

            date = date + Days::new(1);
        }
    }

    #[test]
    fn today_and_last_allowed_day_are_accepted() {
        let today = d(2026, 10, 19);
        assert!(validate_date_selection(today, today, &[], 60).is_ok());
        // 2026-12-18 é sexta-feira (hoje + 60)
        assert!(validate_date_selection(d(2026, 12, 18), today, &[], 60).is_ok());
        assert!(matches!(
            validate_date_selection(d(2026, 12, 19), today, &[], 60),
            Err(ScheduleError::TooFarAhead { max_days_ahead: 60, .. })
        ));
    }

    fn window(start: NaiveTime, end: NaiveTime, remaining: i32) -> SlotWindow {
        SlotWindow {
            slot_id: Uuid::new_v4(),
            start_time: start,
            end_time: end,
            max_bookings: 2,
            remaining,
        }
    }

    #[test]
    fn slot_choice_must_still_be_offered() {
        let date = d(2026, 10, 20);
        let available = vec![window(t(9, 0), t(10, 0), 1), window(t(14, 0), t(15, 0), 0)];

        let chosen = TimeSlot { start_time: t(9, 0), end_time: t(10, 0) };
        assert!(validate_time_slot_choice(date, &chosen, &available).is_ok());

        let full = TimeSlot { start_time: t(14, 0), end_time: t(15, 0) };
        assert!(matches!(
            validate_time_slot_choice(date, &full, &available),
            Err(ScheduleError::SlotNoLongerAvailable { .. })
        ));

        let vanished = TimeSlot { start_time: t(16, 0), end_time: t(17, 0) };
        assert!(validate_time_slot_choice(date, &vanished, &available).is_err());
    }
}
