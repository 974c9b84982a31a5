use std::sync::Arc;

use meetloop_api::{build_router, state::AppState};
use meetloop_config::Settings;
use meetloop_db::{connect, indexes::ensure_indexes};
use meetloop_services::ReminderScheduler;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file (silently ignore if missing)
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "meetloop_api=debug,meetloop_services=debug,meetloop_db=debug,tower_http=debug".into()
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = Settings::load()?;
    info!(
        "Starting Meetloop API on {}:{}",
        settings.app.host, settings.app.port
    );

    let db = connect(&settings).await?;
    ensure_indexes(&db).await?;

    let app_state = AppState::new(db, settings.clone());

    // Pre-meeting invite reminders. The handle keeps the cron jobs alive.
    let _scheduler = if settings.scheduler.enabled {
        let reminders = Arc::new(ReminderScheduler::new(
            Arc::clone(&app_state.meetings),
            Arc::clone(&app_state.engagements),
            Arc::clone(&app_state.users),
            Arc::clone(&app_state.messenger),
            &settings.scheduler,
        ));
        Some(reminders.start().await?)
    } else {
        info!("Reminder scheduler disabled");
        None
    };

    let app = build_router(app_state);

    let addr = format!("{}:{}", settings.app.host, settings.app.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
