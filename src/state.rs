//! Shared application state threaded through every axum handler, same
//! `#[derive(Clone)]` + `Arc`-wrapped-handles shape as the teacher's own
//! `AppState` in `main.rs`.

use std::sync::Arc;

use crate::cache::Cache;
use crate::config::Config;
use crate::db::Database;
use crate::dense_embedder::DenseEmbedder;
use crate::llm::LlmClient;
use crate::vector_index::VectorIndex;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub llm: Arc<LlmClient>,
    pub dense: Arc<DenseEmbedder>,
    pub vector_index: Arc<VectorIndex>,
    pub cache: Arc<Cache>,
}

impl AppState {
    pub async fn new(config: &Config) -> Self {
        let db = Database::new(&config.database_url)
            .await
            .expect("failed to initialize relational store");

        let llm = LlmClient::new(config);
        let dense = DenseEmbedder::new(llm.clone());
        dense.probe().await;

        let vector_index = VectorIndex::new(config, dense.dimension());
        vector_index.ensure_collection().await;

        let cache = Cache::new(config).await;

        Self {
            db: Arc::new(db),
            llm: Arc::new(llm),
            dense: Arc::new(dense),
            vector_index: Arc::new(vector_index),
            cache: Arc::new(cache),
        }
    }
}
