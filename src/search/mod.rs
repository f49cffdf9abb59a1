//! Hybrid Search (HS), §4.7. Orchestrates DE, SE, VI and CL behind one
//! entry point; the only component that talks to all four. Also holds RS
//! (via `Database`) for the Kahn-cookable fallback it takes when VI is down.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::cache::Cache;
use crate::cookability;
use crate::db::Database;
use crate::dense_embedder::DenseEmbedder;
use crate::domain::{MatchType, SearchResult};
use crate::error::{AppError, AppResult};
use crate::ingredient_resolver::IngredientResolver;
use crate::sparse_embedder::{self, SparseVector};
use crate::vector_index::VectorIndex;

const DEFAULT_TOP_K: usize = 10;
const DEFAULT_THRESHOLD: f64 = 0.0;
const LEGACY_STOP_WORD_MIN_LEN: usize = 3;

#[derive(Debug, Clone, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub ingredients: Vec<String>,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default, rename = "limit")]
    pub top_k: Option<usize>,
    #[serde(default, rename = "threshold")]
    pub score_threshold: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
}

fn canonical_key(ingredients: &[String], query: &Option<String>, top_k: usize, threshold: f64) -> String {
    let mut sorted: Vec<String> = ingredients.iter().map(|s| s.trim().to_lowercase()).collect();
    sorted.sort();
    let query = query.as_deref().unwrap_or("").trim().to_lowercase();
    format!("ing:{}|q:{}|t:{}|s:{}", sorted.join(","), query, top_k, threshold)
}

/// §4.7 step 7's "important keywords" filter: tokens longer than 3, not a
/// stop word. Applied only on the legacy path.
fn important_keywords(text: &str) -> HashSet<String> {
    sparse_embedder::tokenize(text)
        .into_iter()
        .filter(|token| token.chars().count() > LEGACY_STOP_WORD_MIN_LEN)
        .collect()
}

fn matches_important_keywords(recipe_name: &str, keywords: &HashSet<String>) -> bool {
    if keywords.is_empty() {
        return true;
    }
    let name_tokens: HashSet<String> = sparse_embedder::tokenize(recipe_name).into_iter().collect();
    keywords.intersection(&name_tokens).next().is_some()
}

pub struct HybridSearch<'a> {
    db: &'a Database,
    dense: &'a DenseEmbedder,
    vector_index: &'a VectorIndex,
    cache: &'a Cache,
}

impl<'a> HybridSearch<'a> {
    pub fn new(db: &'a Database, dense: &'a DenseEmbedder, vector_index: &'a VectorIndex, cache: &'a Cache) -> Self {
        Self { db, dense, vector_index, cache }
    }

    pub async fn search(&self, request: SearchRequest) -> AppResult<SearchResponse> {
        if request.ingredients.is_empty() && request.query.as_deref().map(str::trim).unwrap_or("").is_empty() {
            return Err(AppError::InvalidArgument(
                "at least one of ingredients or query is required".to_string(),
            ));
        }

        let top_k = request.top_k.unwrap_or(DEFAULT_TOP_K).max(1);
        let threshold = request.score_threshold.unwrap_or(DEFAULT_THRESHOLD).clamp(0.0, 1.0);

        // §7 Degraded / S6: VI down means no ranked results are possible at
        // all, so fall back to the deterministic Kahn-cookable set instead
        // of an empty or stale-cached list. Not cached: it tracks the live
        // pantry, not the (ingredients, query) key.
        if !self.vector_index.is_available() {
            return Ok(SearchResponse { results: self.degraded_cookable_path(top_k).await });
        }

        let key = canonical_key(&request.ingredients, &request.query, top_k, threshold);

        if let Some(cached) = self.cache.get_search::<Vec<SearchResult>>(&key).await {
            return Ok(SearchResponse { results: cached });
        }

        let dense_vector = match &request.query {
            Some(query) if !query.trim().is_empty() => self.embed_cached(query).await,
            _ => None,
        };

        let sparse_vector = if request.ingredients.is_empty() {
            None
        } else {
            let vector = sparse_embedder::sparse_from_ingredients(&request.ingredients);
            if vector.is_empty() { None } else { Some(vector) }
        };

        let results = if dense_vector.is_some() || sparse_vector.is_some() {
            self.rrf_path(dense_vector.as_deref(), sparse_vector.as_ref(), top_k, threshold).await
        } else {
            self.legacy_path(&request, top_k, threshold).await
        };

        if !results.is_empty() {
            self.cache.set_search(&key, &results).await;
        }

        Ok(SearchResponse { results })
    }

    /// S6: with VI offline, return exactly the recipes Kahn propagation
    /// says are cookable from the current pantry, ignoring the requested
    /// ingredients/query (there is no ranking signal left to honor them).
    async fn degraded_cookable_path(&self, top_k: usize) -> Vec<SearchResult> {
        let pantry: Vec<String> = match self.db.list_pantry().await {
            Ok(items) => items.into_iter().map(|item| item.name).collect(),
            Err(err) => {
                tracing::warn!(%err, "failed to load pantry for degraded search fallback");
                return Vec::new();
            }
        };
        let recipes = match self.db.list_recipes().await {
            Ok(recipes) => recipes,
            Err(err) => {
                tracing::warn!(%err, "failed to load recipes for degraded search fallback");
                return Vec::new();
            }
        };

        let pairs: Vec<(String, Vec<String>)> =
            recipes.iter().map(|recipe| (recipe.name.clone(), recipe.ingredients.clone())).collect();
        let ir = IngredientResolver::new(self.db);
        let made = cookability::cookable(&ir, &pantry, &pairs).await;

        let cuisines: std::collections::HashMap<String, crate::domain::CuisineType> =
            recipes.into_iter().map(|recipe| (recipe.name, recipe.cuisine)).collect();

        made.into_iter()
            .take(top_k)
            .map(|name| {
                let cuisine_type = cuisines.get(&name).copied().unwrap_or(crate::domain::CuisineType::Other);
                SearchResult { recipe_name: name, score: 1.0, cuisine_type, match_type: MatchType::Ingredient }
            })
            .collect()
    }

    async fn embed_cached(&self, text: &str) -> Option<Vec<f32>> {
        if let Some(cached) = self.cache.get_embedding(text).await {
            return Some(cached);
        }
        let embedding = self.dense.embed(text).await?;
        self.cache.set_embedding(text, &embedding).await;
        Some(embedding)
    }

    /// §4.7 step 4: RRF-fused hybrid query, no keyword filter.
    async fn rrf_path(
        &self,
        dense: Option<&[f32]>,
        sparse: Option<&SparseVector>,
        top_k: usize,
        threshold: f64,
    ) -> Vec<SearchResult> {
        let limit = (2 * top_k).max(50) as u64;
        let hits = self.vector_index.hybrid_query(dense, sparse, limit).await;

        hits.into_iter()
            .filter(|hit| hit.score as f64 >= threshold)
            .take(top_k)
            .map(|hit| SearchResult {
                recipe_name: hit.recipe_name,
                score: hit.score as f64,
                cuisine_type: hit.cuisine,
                match_type: MatchType::HybridRrf,
            })
            .collect()
    }

    /// §4.7 step 5: independent simple searches over query text and the
    /// joined ingredient list, deduplicated first-occurrence-wins, filtered
    /// by important keywords, sorted and truncated.
    async fn legacy_path(&self, request: &SearchRequest, top_k: usize, threshold: f64) -> Vec<SearchResult> {
        let want = (2 * top_k) as u64;
        let mut ranked: Vec<(SearchResult, usize)> = Vec::new();
        let mut seen = HashSet::new();

        if let Some(query) = request.query.as_deref().filter(|q| !q.trim().is_empty()) {
            if let Some(vector) = self.embed_cached(query).await {
                let keywords = important_keywords(query);
                for hit in self.vector_index.simple_search(&vector, want, 0.0).await {
                    if !matches_important_keywords(&hit.recipe_name, &keywords) {
                        continue;
                    }
                    if seen.insert(hit.recipe_name.clone()) {
                        ranked.push((
                            SearchResult {
                                recipe_name: hit.recipe_name,
                                score: hit.score as f64,
                                cuisine_type: hit.cuisine,
                                match_type: MatchType::Semantic,
                            },
                            ranked.len(),
                        ));
                    }
                }
            }
        }

        if !request.ingredients.is_empty() {
            let joined = request.ingredients.join(", ");
            if let Some(vector) = self.embed_cached(&joined).await {
                let keywords = important_keywords(&joined);
                for hit in self.vector_index.simple_search(&vector, want, 0.0).await {
                    if !matches_important_keywords(&hit.recipe_name, &keywords) {
                        continue;
                    }
                    if seen.insert(hit.recipe_name.clone()) {
                        ranked.push((
                            SearchResult {
                                recipe_name: hit.recipe_name,
                                score: hit.score as f64,
                                cuisine_type: hit.cuisine,
                                match_type: MatchType::Ingredient,
                            },
                            ranked.len(),
                        ));
                    }
                }
            }
        }

        ranked.sort_by(|(a, ai), (b, bi)| {
            b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal).then(ai.cmp(bi))
        });

        ranked
            .into_iter()
            .map(|(result, _)| result)
            .filter(|result| result.score >= threshold)
            .take(top_k)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_key_is_order_independent_for_ingredients() {
        let a = canonical_key(&["Onion".to_string(), "Garlic".to_string()], &None, 10, 0.0);
        let b = canonical_key(&["garlic".to_string(), "onion".to_string()], &None, 10, 0.0);
        assert_eq!(a, b);
    }

    #[test]
    fn important_keywords_drops_short_tokens() {
        let keywords = important_keywords("a hot bowl of ramen");
        assert!(!keywords.contains("hot"));
        assert!(keywords.contains("ramen"));
    }

    #[test]
    fn empty_keywords_matches_everything() {
        let empty = HashSet::new();
        assert!(matches_important_keywords("anything", &empty));
    }
}
