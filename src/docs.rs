// src/docs.rs

use utoipa::OpenApi;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use crate::handlers;
use crate::models;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Availability ---
        handlers::availability::list_availability,
        handlers::availability::windows_for_date,

        // --- Admin: grade e bloqueios ---
        handlers::availability::list_slots,
        handlers::availability::create_slot,
        handlers::availability::update_slot,
        handlers::availability::delete_slot,
        handlers::availability::list_blackouts,
        handlers::availability::create_blackout,
        handlers::availability::delete_blackout,

        // --- Bookings ---
        handlers::bookings::create_booking,
        handlers::bookings::list_my_bookings,
        handlers::bookings::list_bookings,
        handlers::bookings::transition_booking,
        handlers::bookings::booking_history,

        // --- Recurring ---
        handlers::recurring::create_meeting,
        handlers::recurring::list_my_meetings,
        handlers::recurring::pause_meeting,
        handlers::recurring::list_occurrences,
        handlers::recurring::update_occurrence,

        // --- Jobs ---
        handlers::jobs::run_materialization,
        handlers::jobs::run_reminders,
    ),
    components(
        schemas(
            // --- Availability ---
            models::availability::AvailableTimeSlot,
            models::availability::BlackoutDate,
            models::availability::SlotWindow,
            models::availability::DayAvailability,
            models::availability::UpsertSlotRequest,
            models::availability::CreateBlackoutRequest,

            // --- Bookings ---
            models::booking::BookingStatus,
            models::booking::Booking,
            models::booking::AdminBookingView,
            models::booking::BookingTransitionResult,
            models::booking::TimeSlot,
            models::booking::BookingStatusChange,
            models::booking::CreateBookingRequest,
            models::booking::TransitionBookingRequest,

            // --- Recurring ---
            models::recurring::RecurrenceFrequency,
            models::recurring::OccurrenceStatus,
            models::recurring::RecurringMeeting,
            models::recurring::MeetingOccurrence,
            models::recurring::CreateRecurringMeetingRequest,
            models::recurring::RescheduleOccurrenceRequest,
            models::recurring::RecurringMeetingDetail,
            models::recurring::OccurrenceUpdateResult,
            models::recurring::MaterializeReport,

            // --- Calendar ---
            models::calendar::CalendarEvent,
            models::calendar::ManualMeetingInstructions,

            // --- Jobs ---
            handlers::jobs::ReminderRunResponse,
        )
    ),
    tags(
        (name = "Availability", description = "Horários livres para o site"),
        (name = "Bookings", description = "Pedidos de reunião do cliente"),
        (name = "Recurring Meetings", description = "Reuniões recorrentes (assinantes)"),
        (name = "Admin - Slots", description = "Grade semanal e datas bloqueadas"),
        (name = "Admin - Bookings", description = "Ciclo de vida das reservas"),
        (name = "Admin - Jobs", description = "Rodadas manuais de lembretes e ocorrências")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_jwt",
            SecurityScheme::Http(
                Http::new(HttpAuthScheme::Bearer)
            ),
        );
    }
}
