// src/config.rs

pub mod settings;

use std::{env, sync::Arc, time::Duration};

use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    db::{BookingRepository, RecurringRepository, SlotRepository},
    services::{
        booking_lifecycle::BookingService,
        calendar::{
            gateway::CalendarSyncGateway,
            google::GoogleCalendarProvider,
            CalendarProvider, UnconfiguredCalendar,
        },
        notifications::{AdminAlerter, LoggingAdminAlerter, LoggingNotificationSender, NotificationSender},
        recurrence::RecurringMeetingService,
        slot_catalog::SlotCatalogService,
    },
};
pub use settings::SchedulingSettings;

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub jwt_secret: String,
    pub settings: SchedulingSettings,
    pub slot_catalog: SlotCatalogService,
    pub booking_service: BookingService,
    pub recurring_service: RecurringMeetingService,
}

impl AppState {
    pub async fn new() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL deve ser definida"))?;
        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET deve ser definido"))?;
        let settings = SchedulingSettings::from_env()?;

        // Conecta ao banco de dados, usando '?' para propagar erros
        let db_pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&database_url)
            .await?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        let provider: Arc<dyn CalendarProvider> = match &settings.calendar.google {
            Some(google) => Arc::new(GoogleCalendarProvider::new(google.clone())?),
            None => {
                tracing::warn!("⚠️ Google Calendar não configurado: convites seguirão pelo fallback manual.");
                Arc::new(UnconfiguredCalendar)
            }
        };

        let notifier: Arc<dyn NotificationSender> = Arc::new(LoggingNotificationSender);
        let alerter: Arc<dyn AdminAlerter> = Arc::new(LoggingAdminAlerter);

        Ok(Self::assemble(db_pool, jwt_secret, settings, provider, notifier, alerter))
    }

    // --- Monta o gráfico de dependências ---
    pub fn assemble(
        db_pool: PgPool,
        jwt_secret: String,
        settings: SchedulingSettings,
        provider: Arc<dyn CalendarProvider>,
        notifier: Arc<dyn NotificationSender>,
        alerter: Arc<dyn AdminAlerter>,
    ) -> Self {
        let slot_repo = SlotRepository::new(db_pool.clone());
        let booking_repo = BookingRepository::new(db_pool.clone());
        let recurring_repo = RecurringRepository::new(db_pool.clone());

        let gateway = CalendarSyncGateway::new(provider, alerter, settings.calendar.clone());

        let slot_catalog = SlotCatalogService::new(db_pool.clone(), slot_repo, settings.clone());
        let booking_service = BookingService::new(
            db_pool.clone(),
            booking_repo,
            slot_catalog.clone(),
            gateway.clone(),
            notifier.clone(),
            settings.clone(),
        );
        let recurring_service = RecurringMeetingService::new(
            db_pool.clone(),
            recurring_repo,
            gateway,
            notifier,
            settings.clone(),
        );

        Self {
            db_pool,
            jwt_secret,
            settings,
            slot_catalog,
            booking_service,
            recurring_service,
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
    use sqlx::PgPool;

    use super::{AppState, SchedulingSettings};
    use crate::{
        models::{
            availability::{AvailableTimeSlot, UpsertSlotRequest},
            booking::{CreateBookingRequest, TimeSlot},
        },
        services::{
            calendar::CalendarProvider,
            notifications::{
                testing::{RecordingAlerter, RecordingNotifier},
                TemplateKey,
            },
        },
    };

    /// Segunda-feira 2026-10-19, 09:00 no fuso do negócio (-03:00).
    pub fn monday_morning() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap()
    }

    /// Estado montado pelo mesmo `assemble` da aplicação, com colaboradores que só gravam.
    pub struct TestApp<P> {
        pub state: AppState,
        pub provider: Arc<P>,
        pub notifier: Arc<RecordingNotifier>,
        pub alerter: Arc<RecordingAlerter>,
    }

    impl<P: CalendarProvider + 'static> TestApp<P> {
        pub fn new(pool: PgPool, provider: P) -> Self {
            let settings = SchedulingSettings { occurrence_batch: 3, ..SchedulingSettings::default() };
            let provider = Arc::new(provider);
            let notifier = Arc::new(RecordingNotifier::default());
            let alerter = Arc::new(RecordingAlerter::default());

            let state = AppState::assemble(
                pool,
                "segredo-de-teste".to_string(),
                settings,
                provider.clone(),
                notifier.clone(),
                alerter.clone(),
            );
            Self { state, provider, notifier, alerter }
        }

        pub fn templates(&self) -> Vec<TemplateKey> {
            self.notifier.sent.lock().unwrap().iter().map(|email| email.template).collect()
        }

        pub async fn open_slot(&self, day_of_week: i16, start: NaiveTime, end: NaiveTime, max: i32) -> AvailableTimeSlot {
            let payload = UpsertSlotRequest {
                day_of_week,
                start_time: start,
                end_time: end,
                max_bookings_per_slot: max,
                is_available: true,
            };
            self.state.slot_catalog.upsert_slot(None, payload, monday_morning()).await.unwrap()
        }
    }

    pub fn booking_request(date: NaiveDate, start: NaiveTime, end: NaiveTime) -> CreateBookingRequest {
        CreateBookingRequest {
            customer_name: "Maria Souza".to_string(),
            customer_email: "maria@empresa.com".to_string(),
            customer_phone: None,
            business_name: "Padaria Souza".to_string(),
            business_website: None,
            customer_message: Some("Quero vender online".to_string()),
            preferred_date: date,
            preferred_time_slot: TimeSlot { start_time: start, end_time: end },
        }
    }
}
