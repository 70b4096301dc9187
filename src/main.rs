use std::net::{Ipv4Addr, SocketAddr};

use social_login::config::{DEFAULT_PORT, SessionStore};
use social_login::{app, initialize_state, telemetry};
use tower_sessions::MemoryStore;
use tower_sessions_sqlx_store::PostgresStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    telemetry::init_subscriber().map_err(|err| err as Box<dyn std::error::Error>)?;

    let (state, db) = initialize_state().await?;
    let port = state.config.port.unwrap_or(DEFAULT_PORT);

    let router = match state.config.session.store {
        SessionStore::Memory => app(state, MemoryStore::default()),
        SessionStore::Postgres => {
            let store = PostgresStore::new(db.postgres.clone());
            store.migrate().await?;
            app(state, store)
        },
    };

    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "server started");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
