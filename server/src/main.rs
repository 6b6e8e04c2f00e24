use axum::{http::Method, middleware as axum_middleware};
use std::net::SocketAddr;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use queuedesk_server::{
    ami::ManagerClient,
    config::Config,
    db::connection::create_pool,
    events::EventBus,
    handlers, middleware,
    repositories::{PauseReasonRepository, PauseStore, PgPauseStore},
    services::{PauseCoordinator, PauseScheduler, UnpauseExecutor},
    state::AppState,
    utils::SystemClock,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "queuedesk_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::load()?;
    tracing::info!(
        database_url = %config.database_url,
        http_port = config.http_port,
        time_zone = %config.time_zone,
        ami_configured = config.ami.is_some(),
        sweep_interval_seconds = config.sweep_interval_seconds,
        "Loaded configuration from environment/.env"
    );

    // Initialize database
    let pool = create_pool(&config.database_url).await?;
    sqlx::migrate!("./migrations").run(pool.as_ref()).await?;

    let seeded = PauseReasonRepository::new()
        .seed_defaults(&pool, chrono::Utc::now())
        .await?;
    if seeded > 0 {
        tracing::info!(seeded, "Seeded default pause reasons");
    }

    // Wire the pause subsystem
    let ami = Arc::new(ManagerClient::new(config.ami.clone()));
    let store: Arc<dyn PauseStore> = Arc::new(PgPauseStore::new(pool.clone()));
    let events = EventBus::new(config.event_bus_capacity);
    let scheduler = PauseScheduler::new(Arc::new(SystemClock));
    let coordinator = Arc::new(PauseCoordinator::new(
        store.clone(),
        ami,
        events.clone(),
        scheduler.clone(),
        Arc::new(SystemClock),
    ));
    let executor: Weak<dyn UnpauseExecutor> = Arc::<PauseCoordinator>::downgrade(&coordinator);
    scheduler.bind_executor(executor);

    // Re-arm timers persisted by a previous run before accepting requests
    let restored = scheduler.restore(store.as_ref()).await?;
    tracing::info!(
        armed = restored.armed,
        expired = restored.expired,
        "Restored auto-unpause timers from the session log"
    );
    scheduler.spawn_sweeper(
        store.clone(),
        Duration::from_secs(config.sweep_interval_seconds),
    );

    let state = AppState::new(pool, config.clone(), coordinator, scheduler, events);

    // Compose app with shared layers (CORS/Trace) and shared state
    let app = handlers::routes()
        .layer(axum_middleware::from_fn(middleware::log_error_responses))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods([
                            Method::GET,
                            Method::POST,
                            Method::PUT,
                            Method::DELETE,
                            Method::OPTIONS,
                        ])
                        .allow_headers(Any)
                        .max_age(Duration::from_secs(24 * 60 * 60)),
                ),
        )
        .with_state(state);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    tracing::info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
