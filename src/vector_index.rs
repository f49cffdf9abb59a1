//! Vector Index (VI) client, §4.5. Talks to an external Qdrant-compatible
//! store holding one point per recipe with named `dense` and `sparse`
//! vectors plus a payload.
//!
//! All operations are best-effort: every branch logs and returns an empty
//! or default result rather than propagating, because search is a
//! degradable feature (§4.5, §7 Degraded). This mirrors the teacher's own
//! `Database` methods returning `Result<_, String>` for operations that
//! must never panic the caller — generalized here to "never even return
//! `Err`" since VI failures are allowed to be silently absorbed.

use std::sync::atomic::{AtomicBool, Ordering};

use qdrant_client::qdrant::value::Kind;
use qdrant_client::qdrant::{
    CreateCollectionBuilder, Distance, Fusion, Modifier, PointStruct, PrefetchQueryBuilder, Query,
    QueryPointsBuilder, SearchPointsBuilder, SparseVectorParamsBuilder, UpsertPointsBuilder,
    VectorParamsBuilder, Vector as QVector, NamedVectors,
};
use qdrant_client::Qdrant;
use serde_json::json;
use sha2::{Digest, Sha256};

use crate::config::Config;
use crate::domain::CuisineType;
use crate::sparse_embedder::SparseVector;

pub const COLLECTION_NAME: &str = "recipes_v2";
pub const DENSE_VECTOR_NAME: &str = "dense";
pub const SPARSE_VECTOR_NAME: &str = "sparse";
pub const PREFETCH_LIMIT: u64 = 50;

#[derive(Debug, Clone)]
pub struct RecipePayload {
    pub recipe_name: String,
    pub cuisine: CuisineType,
    pub ingredients: Vec<String>,
    pub model_version: String,
}

#[derive(Debug, Clone)]
pub struct SearchHit {
    pub recipe_name: String,
    pub score: f32,
    pub cuisine: CuisineType,
}

pub struct VectorIndex {
    client: Qdrant,
    available: AtomicBool,
    dense_dim: u64,
}

/// 63-bit deterministic point id derived from the recipe name (§3, §9
/// design notes on hash collision tolerance). Same function backs both
/// `upsert_recipe` and `delete_point`.
pub fn point_id(recipe_name: &str) -> u64 {
    let digest = Sha256::digest(recipe_name.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(bytes) & 0x7FFF_FFFF_FFFF_FFFF
}

impl VectorIndex {
    pub fn new(config: &Config, dense_dim: usize) -> Self {
        let mut builder = Qdrant::from_url(&config.vector_index_url);
        if let Some(api_key) = &config.vector_index_api_key {
            builder = builder.api_key(api_key.clone());
        }
        let client = builder.build().expect("failed to construct qdrant client");

        Self {
            client,
            available: AtomicBool::new(true),
            dense_dim: dense_dim as u64,
        }
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::Relaxed)
    }

    fn mark(&self, ok: bool) {
        self.available.store(ok, Ordering::Relaxed);
    }

    /// Idempotent create-if-missing at startup (§4.5).
    pub async fn ensure_collection(&self) {
        match self.client.collection_exists(COLLECTION_NAME).await {
            Ok(true) => {
                self.mark(true);
                return;
            }
            Ok(false) => {}
            Err(err) => {
                tracing::warn!(%err, "failed to check vector index collection existence");
                self.mark(false);
                return;
            }
        }

        let create = CreateCollectionBuilder::new(COLLECTION_NAME)
            .vectors_config(VectorParamsBuilder::new(self.dense_dim, Distance::Cosine))
            .sparse_vectors_config(SparseVectorParamsBuilder::default().modifier(Modifier::Idf));

        match self.client.create_collection(create).await {
            Ok(_) => {
                tracing::info!(collection = COLLECTION_NAME, "vector index collection created");
                self.mark(true);
            }
            Err(err) => {
                tracing::warn!(%err, "failed to create vector index collection");
                self.mark(false);
            }
        }
    }

    pub async fn upsert_recipe(&self, dense: Option<&[f32]>, sparse: &SparseVector, payload: RecipePayload) -> bool {
        let id = point_id(&payload.recipe_name);

        let mut vectors = NamedVectors::default();
        if let Some(dense) = dense {
            vectors = vectors.add_vector(DENSE_VECTOR_NAME, dense.to_vec());
        }
        if !sparse.is_empty() {
            vectors = vectors.add_vector(
                SPARSE_VECTOR_NAME,
                QVector::new_sparse(sparse.indices.clone(), sparse.values.clone()),
            );
        }

        let point = PointStruct::new(
            id,
            vectors,
            json!({
                "recipe_name": payload.recipe_name,
                "cuisine": payload.cuisine.as_str(),
                "ingredients": payload.ingredients,
                "model_version": payload.model_version,
            })
            .as_object()
            .cloned()
            .unwrap_or_default(),
        );

        let request = UpsertPointsBuilder::new(COLLECTION_NAME, vec![point]);
        match self.client.upsert_points(request).await {
            Ok(_) => {
                self.mark(true);
                true
            }
            Err(err) => {
                tracing::warn!(%err, recipe = %payload.recipe_name, "vector index upsert failed");
                self.mark(false);
                false
            }
        }
    }

    pub async fn delete_point(&self, recipe_name: &str) -> bool {
        let id = point_id(recipe_name);
        match self
            .client
            .delete_points(qdrant_client::qdrant::DeletePointsBuilder::new(COLLECTION_NAME).points(vec![id]))
            .await
        {
            Ok(_) => {
                self.mark(true);
                true
            }
            Err(err) => {
                tracing::warn!(%err, recipe = %recipe_name, "vector index delete failed");
                self.mark(false);
                false
            }
        }
    }

    /// Single-vector cosine search (§4.5 `simpleSearch`).
    pub async fn simple_search(&self, dense_vector: &[f32], top_k: u64, min_score: f32) -> Vec<SearchHit> {
        let request = SearchPointsBuilder::new(COLLECTION_NAME, dense_vector.to_vec(), top_k)
            .vector_name(DENSE_VECTOR_NAME)
            .score_threshold(min_score)
            .with_payload(true);

        match self.client.search_points(request).await {
            Ok(response) => {
                self.mark(true);
                response.result.into_iter().filter_map(scored_point_to_hit).collect()
            }
            Err(err) => {
                tracing::warn!(%err, "vector index simple search failed");
                self.mark(false);
                Vec::new()
            }
        }
    }

    /// Server-side RRF-fused hybrid query over dense and sparse prefetch
    /// sub-queries (§4.5 `hybridQuery`).
    pub async fn hybrid_query(
        &self,
        dense: Option<&[f32]>,
        sparse: Option<&SparseVector>,
        limit: u64,
    ) -> Vec<SearchHit> {
        let mut prefetches = Vec::new();
        if let Some(dense) = dense {
            prefetches.push(
                PrefetchQueryBuilder::default()
                    .query(Query::new_nearest(dense.to_vec()))
                    .using(DENSE_VECTOR_NAME)
                    .limit(PREFETCH_LIMIT)
                    .build(),
            );
        }
        if let Some(sparse) = sparse.filter(|s| !s.is_empty()) {
            prefetches.push(
                PrefetchQueryBuilder::default()
                    .query(Query::new_nearest(QVector::new_sparse(
                        sparse.indices.clone(),
                        sparse.values.clone(),
                    )))
                    .using(SPARSE_VECTOR_NAME)
                    .limit(PREFETCH_LIMIT)
                    .build(),
            );
        }

        if prefetches.is_empty() {
            return Vec::new();
        }

        let request = QueryPointsBuilder::new(COLLECTION_NAME)
            .add_prefetch_all(prefetches)
            .query(Query::new_fusion(Fusion::Rrf))
            .limit(limit)
            .with_payload(true);

        match self.client.query(request).await {
            Ok(response) => {
                self.mark(true);
                response.result.into_iter().filter_map(scored_point_to_hit).collect()
            }
            Err(err) => {
                tracing::warn!(%err, "vector index hybrid query failed");
                self.mark(false);
                Vec::new()
            }
        }
    }
}

fn scored_point_to_hit<P: ScoredPointLike>(point: P) -> Option<SearchHit> {
    let payload = point.payload();
    let recipe_name = payload.get("recipe_name")?.as_str()?.to_string();
    let cuisine = payload
        .get("cuisine")
        .and_then(|v| v.as_str())
        .map(CuisineType::parse)
        .unwrap_or(CuisineType::Other);
    Some(SearchHit {
        recipe_name,
        score: point.score(),
        cuisine,
    })
}

/// Thin adapter so `simple_search` (`ScoredPoint`) and `hybrid_query`
/// (`qdrant_client`'s fused-query result point) share one extraction path.
trait ScoredPointLike {
    fn payload(&self) -> std::collections::HashMap<String, serde_json::Value>;
    fn score(&self) -> f32;
}

impl ScoredPointLike for qdrant_client::qdrant::ScoredPoint {
    fn payload(&self) -> std::collections::HashMap<String, serde_json::Value> {
        self.payload
            .iter()
            .map(|(k, v)| (k.clone(), qdrant_value_to_json(v)))
            .collect()
    }

    fn score(&self) -> f32 {
        self.score
    }
}

fn qdrant_value_to_json(value: &qdrant_client::qdrant::Value) -> serde_json::Value {
    match &value.kind {
        Some(Kind::StringValue(s)) => json!(s),
        Some(Kind::IntegerValue(i)) => json!(i),
        Some(Kind::DoubleValue(d)) => json!(d),
        Some(Kind::BoolValue(b)) => json!(b),
        Some(Kind::NullValue(_)) | None => serde_json::Value::Null,
        Some(Kind::ListValue(list)) => {
            serde_json::Value::Array(list.values.iter().map(qdrant_value_to_json).collect())
        }
        Some(Kind::StructValue(obj)) => serde_json::Value::Object(
            obj.fields.iter().map(|(k, v)| (k.clone(), qdrant_value_to_json(v))).collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_id_is_deterministic_and_63_bit() {
        let a = point_id("Tomato Salad");
        let b = point_id("Tomato Salad");
        assert_eq!(a, b);
        assert!(a <= 0x7FFF_FFFF_FFFF_FFFF);
    }

    #[test]
    fn point_id_differs_across_names() {
        assert_ne!(point_id("sandwich"), point_id("burger"));
    }

    #[test]
    fn qdrant_value_to_json_extracts_string_not_debug_repr() {
        let value = qdrant_client::qdrant::Value {
            kind: Some(Kind::StringValue("chicken parmesan".to_string())),
        };
        assert_eq!(qdrant_value_to_json(&value), json!("chicken parmesan"));
    }
}
