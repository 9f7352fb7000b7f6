use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser; // for cli
use tokio::net::TcpListener;
use tokio::signal::{self, ctrl_c};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

use feedback_relay::{
    FEEDBACK_PATH, build_router,
    clock::{Clock, SystemClock},
    config::{Args, FeedbackConfig},
    state::AppState,
    store::{MemoryStore, RedisStore, SubmissionStore, sweeper},
};

const SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);

// this is main async function with tokio
#[tokio::main]
async fn main() {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // parse cli arguments
    let args = Args::parse();
    let config = FeedbackConfig::from_args(&args);
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let store: Arc<dyn SubmissionStore> = match &args.redis_url {
        Some(url) => match RedisStore::connect(url).await {
            Ok(store) => Arc::new(store),
            Err(e) => {
                error!("Failed to connect to Redis: {e}");
                std::process::exit(1);
            }
        },
        None => {
            let store = Arc::new(MemoryStore::new(clock.clone()));
            tokio::spawn(sweeper(store.clone(), SWEEP_INTERVAL));
            store
        }
    };

    match &config.rate_limit {
        Some(policy) => info!(
            "Rate limit: {} submissions per {:?}, at least {:?} apart",
            policy.max_per_window, policy.window, policy.min_interval
        ),
        None => info!("Rate limit disabled"),
    }
    if config.origins.is_some() {
        info!("Origin allow-list: {}", args.allowed_origins);
    }

    let state = AppState::new(config, store, clock);
    let app = build_router(state);

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {addr}: {e}");
            std::process::exit(1);
        }
    };

    info!("Feedback relay running on http://localhost:{}{}", args.port, FEEDBACK_PATH);

    // peer addresses back the X-Forwarded-For fallback
    let served = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await;

    if let Err(e) = served {
        error!("Server error: {e}");
    }
    info!("Server shut down");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {e}");
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut term) => {
                term.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
