use std::env;
use std::net::SocketAddr;

/// Process-wide configuration, read once at startup from the environment.
///
/// Mirrors the teacher's pattern of hardcoding connection strings in `main()`
/// (`"sqlite:game.db?mode=rwc"`), generalized into a single typed struct so
/// every external collaborator's address lives in one place.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub database_url: String,

    pub llm_base_url: String,
    pub llm_api_key: String,
    pub llm_chat_model: String,
    pub llm_embed_model: String,
    pub llm_embed_dim: usize,

    pub vector_index_url: String,
    pub vector_index_api_key: Option<String>,

    pub cache_url: String,
    pub cache_ttl_seconds: u64,
}

impl Config {
    /// Loads configuration from the environment, falling back to a `.env`
    /// file if present. Unset knobs fall back to the defaults named in the
    /// spec rather than failing startup, since every external collaborator
    /// is allowed to be unavailable at runtime anyway.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            bind_addr: env::var("BIND_ADDR")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(|| "0.0.0.0:8080".parse().unwrap()),
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:recipes.db?mode=rwc".to_string()),

            llm_base_url: env::var("LLM_BASE_URL")
                .unwrap_or_else(|_| "http://localhost:11434".to_string()),
            llm_api_key: env::var("LLM_API_KEY").unwrap_or_default(),
            llm_chat_model: env::var("LLM_CHAT_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            llm_embed_model: env::var("LLM_EMBED_MODEL")
                .unwrap_or_else(|_| "text-embedding-3-small".to_string()),
            llm_embed_dim: env::var("LLM_EMBED_DIM")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(768),

            vector_index_url: env::var("VECTOR_INDEX_URL")
                .unwrap_or_else(|_| "http://localhost:6334".to_string()),
            vector_index_api_key: env::var("VECTOR_INDEX_API_KEY").ok(),

            cache_url: env::var("CACHE_URL").unwrap_or_else(|_| "redis://127.0.0.1/".to_string()),
            cache_ttl_seconds: env::var("CACHE_TTL_SECONDS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(3600),
        }
    }
}
