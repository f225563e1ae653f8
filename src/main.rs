use api_rest::{AppState, router};
use reports_core::ConfigStore;
use reports_core::constants::{DEFAULT_CONFIG_PATH, DEFAULT_PORT};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the reports admin server
///
/// Loads the GitHub config, wires the reports manager into the REST router and serves it.
/// The server starts without a config; report routes answer `400` until one is saved through
/// `/api/config/save`.
///
/// # Environment Variables
/// - `REPORTS_CONFIG_PATH`: admin config file (default: `.env`)
/// - `REPORTS_REST_ADDR`: REST server address (default: `0.0.0.0:<PORT>`, `PORT` from the
///   config file, 3030 if unset)
///
/// # Errors
/// Returns an error if the config file cannot be parsed, the address cannot be bound, or the
/// HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("reports_run=info".parse()?)
                .add_directive("reports_core=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path =
        std::env::var("REPORTS_CONFIG_PATH").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
    let config_store = ConfigStore::new(&config_path);
    let port = config_store
        .get_config()?
        .map(|cfg| cfg.port)
        .unwrap_or(DEFAULT_PORT);
    let rest_addr =
        std::env::var("REPORTS_REST_ADDR").unwrap_or_else(|_| format!("0.0.0.0:{port}"));

    let state = AppState::new(config_store);
    if !state.reload().await? {
        tracing::info!("-- No complete GitHub config in {config_path}; waiting for /api/config/save");
    }

    tracing::info!("++ Starting reports admin REST on {}", rest_addr);
    tracing::info!("++ API docs at http://{}/swagger-ui", rest_addr);

    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, router(state)).await?;

    Ok(())
}
