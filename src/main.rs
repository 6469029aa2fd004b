//src/main.rs

use axum::{
    routing::{get, patch, post, put},
    Router,
};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod common;
mod config;
mod db;
mod docs;
mod handlers;
mod middleware;
mod models;
mod services;

use crate::config::AppState;
use crate::docs::ApiDoc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // RUST_LOG controla o nível (padrão: info)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .compact()
        .init();

    // Se a configuração falhar, a aplicação não deve iniciar.
    let app_state = AppState::new().await?;

    // Faz o app rodar as migrações do SQLx na inicialização
    sqlx::migrate!().run(&app_state.db_pool).await?;
    tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

    services::jobs::spawn_periodic_jobs(
        app_state.settings.job_interval,
        app_state.booking_service.clone(),
        app_state.recurring_service.clone(),
    );

    // Rotas públicas (calendário do site)
    let availability_routes = Router::new()
        .route("/", get(handlers::availability::list_availability))
        .route("/{date}", get(handlers::availability::windows_for_date));

    // Rotas do cliente (AuthenticatedUser nos handlers)
    let booking_routes = Router::new()
        .route("/", post(handlers::bookings::create_booking))
        .route("/mine", get(handlers::bookings::list_my_bookings));

    let recurring_routes = Router::new()
        .route("/", post(handlers::recurring::create_meeting))
        .route("/mine", get(handlers::recurring::list_my_meetings))
        .route("/{id}/pause", post(handlers::recurring::pause_meeting))
        .route("/{id}/occurrences", get(handlers::recurring::list_occurrences));

    // Rotas do admin (AdminUser nos handlers)
    let admin_routes = Router::new()
        .route("/slots"
               ,post(handlers::availability::create_slot)
               .get(handlers::availability::list_slots)
        )
        .route("/slots/{id}"
               ,put(handlers::availability::update_slot)
               .delete(handlers::availability::delete_slot)
        )
        .route("/blackouts"
               ,post(handlers::availability::create_blackout)
               .get(handlers::availability::list_blackouts)
        )
        .route("/blackouts/{id}", axum::routing::delete(handlers::availability::delete_blackout))
        .route("/bookings", get(handlers::bookings::list_bookings))
        .route("/bookings/{id}/status", patch(handlers::bookings::transition_booking))
        .route("/bookings/{id}/history", get(handlers::bookings::booking_history))
        .route("/jobs/occurrences", post(handlers::jobs::run_materialization))
        .route("/jobs/reminders", post(handlers::jobs::run_reminders));

    // Combina tudo no router principal
    let app = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/api/health", get(|| async { "OK" }))
        .nest("/api/availability", availability_routes)
        .nest("/api/bookings", booking_routes)
        .nest("/api/recurring-meetings", recurring_routes)
        .route("/api/occurrences/{id}", patch(handlers::recurring::update_occurrence))
        .nest("/api/admin", admin_routes)
        .with_state(app_state);

    // Inicia o servidor
    let addr = "0.0.0.0:3000";
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("🚀 Servidor escutando em {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
