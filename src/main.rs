use axum::{routing::get, Router};
use omen::config::Config;
use omen::live::LiveFeed;
use omen::services::ChannelManager;
use omen::{api, websocket, AppState};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "omen=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Arc::new(Config::from_env());
    info!("Starting Omen server on {}:{}", config.host, config.port);

    // Create the streaming channel manager
    let manager = ChannelManager::new(&config);

    // Eagerly track boot-time markets so their channels exist before the
    // first live tick arrives
    for (market_id, platform) in &config.tracked_markets {
        manager.on_market_subscribed(market_id, *platform);
    }

    // Start the live push feed
    if let Some(ref url) = config.live_feed_url {
        let feed = LiveFeed::new(url.clone());
        let feed_manager = manager.clone();
        tokio::spawn(async move {
            if let Err(e) = feed.run(feed_manager).await {
                error!("live feed terminated: {}", e);
            }
        });
    } else {
        info!("LIVE_FEED_URL not set, running in polling-only mode");
    }

    let state = AppState {
        config: config.clone(),
        manager: manager.clone(),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .merge(api::router())
        .route("/ws", get(websocket::ws_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(manager))
        .await?;

    Ok(())
}

async fn shutdown_signal(manager: Arc<ChannelManager>) {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutting down");
    manager.destroy();
}
