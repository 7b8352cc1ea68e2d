//! bock-back binary entrypoint wiring the document store, the presence mirror and HTTP.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bock_back::{
    AlarmPlaybackConfig,
    dao::document_store::{DocumentStore, memory::MemoryDocumentStore},
    routes,
    state::{AppState, SharedState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let alarm = AlarmPlaybackConfig::global();
    info!(
        videos = alarm.alarm_videos.len(),
        auto_dismiss_secs = alarm.auto_dismiss_after().as_secs(),
        "alarm configuration ready"
    );

    let store = connect_store().await?;
    let app_state = AppState::new(store, alarm);

    // A failed subscription is not fatal: the list can be reopened via POST /bock/subscribe.
    if let Err(err) = app_state.bock().subscribe().await {
        error!(error = %err, "initial bock presence subscription failed");
    }

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

/// Pick the document store from the environment, defaulting to the in-process store.
async fn connect_store() -> anyhow::Result<Arc<dyn DocumentStore>> {
    #[cfg(feature = "couch-store")]
    {
        use bock_back::dao::document_store::couchdb::{CouchConfig, CouchDocumentStore};

        if CouchConfig::requested() {
            let config = CouchConfig::from_env().context("reading CouchDB configuration")?;
            let database = config.database.clone();
            let store = CouchDocumentStore::connect(config)
                .await
                .context("connecting to CouchDB")?;
            info!(%database, "using CouchDB document store");
            return Ok(Arc::new(store));
        }
    }

    warn!("no remote document store configured; state lives in memory only");
    Ok(Arc::new(MemoryDocumentStore::new()))
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

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
