use crate::auth::JwtService;
use crate::config::Config;
use crate::models::MIGRATIONS;
use crate::routes::*;
use crate::store::{MemoryStore, PgStore, Store};
use axum::http::{Method, StatusCode, Uri};
use axum::routing::{get, post, put};
use axum::{http, Extension, Router};
use clap::Parser;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::PgConnection;
use diesel_migrations::MigrationHarness;
use log::{error, info, warn};
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::oneshot;
use tower_http::cors::{Any, CorsLayer};

mod auth;
mod config;
mod error;
mod ledger;
mod models;
mod odds;
mod routes;
mod store;

#[derive(Clone)]
pub struct State {
    pub store: Arc<dyn Store>,
    pub jwt: JwtService,
}

fn build_store(config: &Config) -> anyhow::Result<Arc<dyn Store>> {
    let Some(pg_url) = config.pg_url.as_deref() else {
        warn!("No Postgres url given, keeping all data in memory");
        return Ok(Arc::new(MemoryStore::new()));
    };

    // DB management
    let manager = ConnectionManager::<PgConnection>::new(pg_url);
    let db_pool = Pool::builder()
        .max_size(16)
        .test_on_check_out(true)
        .build(manager)?;

    // run migrations
    let mut conn = db_pool.get()?;
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|e| anyhow::anyhow!("migrations could not run: {e}"))?;
    drop(conn);

    Ok(Arc::new(PgStore::new(db_pool)))
}

pub fn app(state: State) -> Router {
    Router::new()
        .route("/health-check", get(health_check))
        .route("/sign-up/", post(register))
        .route("/token", post(login))
        .route("/user-options/", get(user_options))
        .route("/user-options/change-values/", post(change_user_values))
        .route("/sport-events/", get(list_sport_events))
        .route("/sport-events/:id", put(update_sport_event))
        .route("/sport-events/:id/bets", get(event_bets))
        .route("/sport-events/:id/settle", post(settle_sport_event))
        .route("/create-new-event/", post(create_event))
        .route("/new-bet/", post(new_bet))
        .route("/my-bets/", get(my_bets))
        .fallback(fallback)
        .layer(Extension(state))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(vec![http::header::CONTENT_TYPE, http::header::AUTHORIZATION])
                .allow_methods([Method::GET, Method::POST, Method::PUT]),
        )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pretty_env_logger::try_init()?;
    let config: Config = Config::parse();

    let state = State {
        store: build_store(&config)?,
        jwt: JwtService::new(&config.jwt_secret, config.token_expire_minutes),
    };

    let addr: std::net::SocketAddr = format!("{}:{}", config.bind, config.port).parse()?;

    info!("Webserver running on http://{addr}");

    let server_router = app(state);

    // Set up a oneshot channel to handle shutdown signal
    let (tx, rx) = oneshot::channel();

    let mut term_signal = signal(SignalKind::terminate())?;
    let mut int_signal = signal(SignalKind::interrupt())?;

    // Spawn a task to listen for shutdown signals
    tokio::spawn(async move {
        tokio::select! {
            _ = term_signal.recv() => {
                info!("Received SIGTERM");
            },
            _ = int_signal.recv() => {
                info!("Received SIGINT");
            },
        }

        let _ = tx.send(());
    });

    let server = axum::Server::bind(&addr).serve(server_router.into_make_service());

    let graceful = server.with_graceful_shutdown(async {
        let _ = rx.await;
    });

    // Await the server to receive the shutdown signal
    if let Err(e) = graceful.await {
        error!("shutdown error: {e}");
    }

    info!("Graceful shutdown complete");

    Ok(())
}

async fn fallback(uri: Uri) -> (StatusCode, String) {
    (StatusCode::NOT_FOUND, format!("No route for {uri}"))
}
