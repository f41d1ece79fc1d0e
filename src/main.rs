//! Livequiz Back binary entrypoint wiring REST, WebSocket, SSE and the event store.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use livequiz_back::{
    config::{AppConfig, StoreConfig},
    dao::{event_store::memory::MemoryEventStore, seed::SeedData},
    routes,
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(config.server().port);

    let app_state = build_state(config)?;
    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Install the configured store. MongoDB starts degraded and is connected by the supervisor.
fn build_state(config: AppConfig) -> anyhow::Result<SharedState> {
    match config.store().clone() {
        StoreConfig::Memory { seed_path } => {
            let store = match seed_path {
                Some(path) => {
                    let seed = SeedData::from_path(&path)
                        .with_context(|| format!("loading seed data from {}", path.display()))?;
                    info!(
                        path = %path.display(),
                        events = seed.events.len(),
                        activities = seed.activities.len(),
                        questions = seed.questions.len(),
                        "seed data loaded"
                    );
                    MemoryEventStore::from_seed(seed)
                }
                None => MemoryEventStore::new(),
            };
            Ok(AppState::with_store(config, Arc::new(store)))
        }
        StoreConfig::Mongodb { uri, database } => start_mongo(config, uri, database),
    }
}

#[cfg(feature = "mongo-store")]
fn start_mongo(
    config: AppConfig,
    uri: Option<String>,
    database: Option<String>,
) -> anyhow::Result<SharedState> {
    use livequiz_back::{
        dao::{
            event_store::{
                EventStore,
                mongodb::{MongoConfig, MongoEventStore},
            },
            storage::StorageError,
        },
        services::storage_supervisor,
    };

    let uri = uri
        .or_else(|| env::var("MONGO_URI").ok())
        .unwrap_or_else(|| "mongodb://localhost:27017".into());
    let database = database.or_else(|| env::var("MONGO_DB").ok());

    let app_state = AppState::new(config);
    tokio::spawn(storage_supervisor::run(app_state.clone(), move || {
        let uri = uri.clone();
        let database = database.clone();
        async move {
            let config = MongoConfig::from_uri(&uri, database.as_deref())
                .await
                .map_err(StorageError::from)?;
            let store = MongoEventStore::connect(config)
                .await
                .map_err(StorageError::from)?;
            Ok(Arc::new(store) as Arc<dyn EventStore>)
        }
    }));
    Ok(app_state)
}

#[cfg(not(feature = "mongo-store"))]
fn start_mongo(
    _config: AppConfig,
    _uri: Option<String>,
    _database: Option<String>,
) -> anyhow::Result<SharedState> {
    anyhow::bail!("the mongodb backend requires the `mongo-store` feature")
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
