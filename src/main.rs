//! Quiz Duel Back binary entrypoint wiring REST, WebSocket and collaborator stores.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quiz_duel_back::{
    config::AppConfig,
    dao::{
        identity::StaticIdentityProvider,
        profile_store::{ProfileStore, memory::InMemoryProfileStore},
        quiz_store::InMemoryQuizStore,
    },
    routes,
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();

    let quizzes = match config.quiz_path.as_deref() {
        Some(path) => InMemoryQuizStore::load(path).unwrap_or_else(|err| {
            warn!(path = %path.display(), error = %err, "failed to load quizzes; using samples");
            InMemoryQuizStore::with_samples()
        }),
        None => InMemoryQuizStore::with_samples(),
    };
    info!(quizzes = quizzes.len(), "quiz catalogue ready");

    let identity = StaticIdentityProvider::new(config.identities.clone(), config.allow_guests);
    let profiles = build_profile_store();

    let app_state = AppState::new(config, Arc::new(identity), Arc::new(quizzes), profiles);
    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

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

/// Pick the remote profile service when configured, the in-process store otherwise.
#[cfg(feature = "http-profile-store")]
fn build_profile_store() -> Arc<dyn ProfileStore> {
    use quiz_duel_back::dao::profile_store::http::{HttpProfileStore, ProfileServiceConfig};

    let config = match ProfileServiceConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            info!(reason = %err, "profile service not configured; keeping progress in memory");
            return Arc::new(InMemoryProfileStore::default());
        }
    };

    match HttpProfileStore::connect(config) {
        Ok(store) => {
            info!("using remote profile service");
            Arc::new(store)
        }
        Err(err) => {
            warn!(error = %err, "failed to build profile service client; keeping progress in memory");
            Arc::new(InMemoryProfileStore::default())
        }
    }
}

#[cfg(not(feature = "http-profile-store"))]
fn build_profile_store() -> Arc<dyn ProfileStore> {
    Arc::new(InMemoryProfileStore::default())
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
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler; waiting for Ctrl+C");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
