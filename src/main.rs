use capability_dispatch_mcp::{
    build_app,
    config::{Config, Transport},
    domain::build_registry,
    logging, stdio, AppState,
};
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init_logging();

    let config = Config::from_env()?;
    let registry = build_registry()?;
    let state = AppState::new(registry, config.server_name.clone(), config.max_concurrency);

    match config.transport {
        Transport::Http => {
            let bind_socket = config.bind_socket()?;
            let app = build_app(state);
            let listener = tokio::net::TcpListener::bind(bind_socket).await?;

            info!(
                bind_addr = %config.bind_addr,
                bind_port = config.bind_port,
                max_concurrency = config.max_concurrency,
                "http server starting"
            );

            axum::serve(listener, app.into_make_service()).await?;
        }
        Transport::Stdio => {
            info!(max_concurrency = config.max_concurrency, "stdio server starting");
            stdio::serve_stdio(state).await?;
        }
    }

    Ok(())
}
