use axum::Router;
use clap::Parser;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mediagetr::{
    Config, Scheme,
    handlers::{AppState, create_router},
    storage::{LocalStore, StoreRegistry},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Backend clients are built once here and shared read-only across
    // requests for the life of the process.
    let mut registry = StoreRegistry::new();
    registry.register(
        Scheme::Local,
        Arc::new(LocalStore::new(config.media_root.clone())),
    );

    #[cfg(feature = "s3")]
    {
        let s3 = mediagetr::storage::S3Store::new(
            config.s3_region.clone(),
            config.s3_endpoint.clone(),
        )
        .await?;
        registry.register(Scheme::S3, Arc::new(s3));
    }

    #[cfg(feature = "http")]
    {
        let http = mediagetr::storage::HttpStore::new(
            config.http_timeout(),
            config.max_idle_connections,
        )?;
        registry.register(Scheme::Http, Arc::new(http));
    }

    let state = AppState {
        registry: Arc::new(registry),
    };

    let app: Router = create_router(state).layer(TraceLayer::new_for_http());

    let app = if config.cors {
        app.layer(CorsLayer::permissive())
    } else {
        app
    };

    let addr = config.bind_addr();
    tracing::info!("Starting mediagetr server on {}", addr);
    tracing::info!("Media root: {:?}", config.media_root);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
