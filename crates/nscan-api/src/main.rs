//! Axum API server binary.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use nscan_api::{create_router, metrics, ApiConfig, AppState};
use nscan_artifact::{ensure_local, ArtifactSource};
use nscan_inference::{ClassifierConfig, ClassifierPipeline, ModelHandle};

#[tokio::main]
async fn main() {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with colored output for dev, JSON for production
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive("nscan=info".parse().unwrap());

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }

    info!("Starting nscan-api");

    // Load configuration
    let config = ApiConfig::from_env();
    let classifier_config = ClassifierConfig::from_env();
    info!(
        "API config: host={}, port={}, model={}",
        config.host,
        config.port,
        classifier_config.model_path.display()
    );

    // Fetch the model artifact if it is not cached yet. Startup errors are
    // fatal: the service must not come up without a complete model.
    let artifact = ArtifactSource::new(
        &classifier_config.model_url,
        &classifier_config.model_path,
    );
    if let Err(e) = ensure_local(&artifact).await {
        error!("Failed to fetch model artifact: {}", e);
        std::process::exit(1);
    }

    // Load the model exactly once for the process lifetime.
    let model = match ModelHandle::load(
        &classifier_config.model_path,
        classifier_config.packaging,
        &classifier_config.signature,
        &classifier_config.preprocess,
        classifier_config.labels.len(),
    ) {
        Ok(m) => m,
        Err(e) => {
            error!("Failed to load model: {}", e);
            std::process::exit(1);
        }
    };

    let pipeline = Arc::new(ClassifierPipeline::new(
        Arc::new(model),
        classifier_config.labels,
        classifier_config.preprocess,
    ));

    // Initialize metrics
    let metrics_handle = if config.metrics_enabled {
        info!("Prometheus metrics enabled at /metrics");
        Some(metrics::init_metrics())
    } else {
        None
    };

    // Create router
    let state = AppState::new(config.clone(), pipeline);
    let app = create_router(state, metrics_handle);

    // Bind and serve
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .expect("Invalid bind address");

    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap();

    info!("Server shutdown complete");
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C handler");
    info!("Received shutdown signal");
}
