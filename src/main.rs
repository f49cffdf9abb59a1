mod cache;
mod config;
mod cookability;
mod db;
mod dense_embedder;
mod domain;
mod error;
mod http;
mod ingredient_resolver;
mod llm;
mod search;
mod sparse_embedder;
mod state;
mod substitution;
mod vector_index;

use std::net::SocketAddr;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use config::Config;
use state::AppState;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("pantry_engine=info".parse().unwrap()),
        )
        .init();

    let config = Config::from_env();
    let bind_addr: SocketAddr = config.bind_addr;

    let state = AppState::new(&config).await;

    let app = http::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods([
                    axum::http::Method::GET,
                    axum::http::Method::POST,
                    axum::http::Method::PUT,
                    axum::http::Method::DELETE,
                ])
                .allow_headers([axum::http::header::CONTENT_TYPE, axum::http::header::AUTHORIZATION]),
        );

    info!("pantry engine listening on http://{}", bind_addr);

    let listener = tokio::net::TcpListener::bind(bind_addr).await.expect("failed to bind listener");
    axum::serve(listener, app).await.expect("server error");
}
