//! HTTP Surface (API), §10 component 10. A thin adapter: parses requests,
//! calls the component layer, serializes its result or `AppError`. No
//! business logic lives here — same division of labor as the teacher's own
//! handler functions over `game.rs`/`db.rs`.

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::cookability;
use crate::domain::{CuisineType, PantryItem, Recipe};
use crate::error::{AppError, AppResult};
use crate::ingredient_resolver::IngredientResolver;
use crate::search::{HybridSearch, SearchRequest};
use crate::sparse_embedder;
use crate::state::AppState;
use crate::substitution::SubstitutionPlanner;
use crate::vector_index::RecipePayload;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/api", api_router())
        .with_state(state)
}

fn api_router() -> Router<AppState> {
    Router::new()
        .route("/recipes", get(list_recipes).post(create_recipe))
        .route("/recipes/:name", get(get_recipe).delete(delete_recipe))
        .route("/cuisines", get(list_cuisines))
        .route("/fridge", get(list_fridge).put(put_fridge_bulk))
        .route("/fridge/order", put(put_fridge_order))
        .route("/fridge/:item", post(add_fridge_item).put(set_fridge_item).delete(delete_fridge_item))
        .route("/generate", get(generate_from_pantry).post(generate_from_payload))
        .route("/recipes/search", get(legacy_search))
        .route("/recipes/hybrid-search", post(hybrid_search))
        .route("/recipes/almost-cookable", get(almost_cookable))
        .route("/search/index-all", post(index_all))
        .route("/search/stats", get(search_stats))
        .route("/recipes/:name/missing", get(missing_ingredients))
        .route("/recipes/:name/substitutions", get(substitutions))
        .route("/ingredients/:name/aliases", get(list_aliases))
        .route("/ingredients/:canonical/aliases", post(add_alias))
        .route("/ingredients/:name/generate-aliases", post(generate_aliases))
        .route("/ingredients/:name/resolve", get(resolve_ingredient))
        .route("/ingredients/seed-aliases", post(seed_aliases))
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

// --------------------------------------------------------------------
// Recipes
// --------------------------------------------------------------------

#[derive(Serialize)]
struct RecipeSummary {
    name: String,
    ingredients: Vec<String>,
    seasonings: Vec<String>,
}

impl From<Recipe> for RecipeSummary {
    fn from(recipe: Recipe) -> Self {
        Self {
            name: recipe.name,
            ingredients: recipe.ingredients,
            seasonings: recipe.seasonings,
        }
    }
}

async fn list_recipes(State(state): State<AppState>) -> AppResult<Json<HashMap<String, Vec<RecipeSummary>>>> {
    let recipes = state.db.list_recipes().await?;
    let mut grouped: HashMap<String, Vec<RecipeSummary>> = HashMap::new();
    for recipe in recipes {
        grouped.entry(recipe.cuisine.as_str().to_string()).or_default().push(recipe.into());
    }
    Ok(Json(grouped))
}

async fn get_recipe(State(state): State<AppState>, Path(name): Path<String>) -> AppResult<Json<Recipe>> {
    let recipe = state
        .db
        .get_recipe(&name)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("recipe '{name}' not found")))?;
    Ok(Json(recipe))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateRecipeRequest {
    name: String,
    ingredients: Vec<String>,
    #[serde(default)]
    seasonings: Vec<String>,
    #[serde(default)]
    cuisine_type: Option<String>,
    #[serde(default)]
    instructions: String,
    #[serde(default)]
    image_url: Option<String>,
}

async fn create_recipe(
    State(state): State<AppState>,
    Json(request): Json<CreateRecipeRequest>,
) -> AppResult<Json<Recipe>> {
    if request.name.trim().is_empty() {
        return Err(AppError::InvalidArgument("name is required".to_string()));
    }
    if request.ingredients.is_empty() {
        return Err(AppError::InvalidArgument("ingredients must be non-empty".to_string()));
    }

    let cuisine = request.cuisine_type.as_deref().map(CuisineType::parse).unwrap_or(CuisineType::Other);

    state
        .db
        .add_recipe(
            &request.name,
            &request.ingredients,
            &request.seasonings,
            cuisine,
            &request.instructions,
            request.image_url.as_deref(),
        )
        .await?;

    // §4.8: fire-and-log indexing side effect, never blocking or failing the write.
    let recipe = state.db.get_recipe(&request.name).await?.expect("just written");
    let dense = state.dense.embed_recipe(&recipe).await;
    let sparse = sparse_embedder::sparse_from_recipe(&recipe.name, &recipe.ingredients, recipe.cuisine);
    state
        .vector_index
        .upsert_recipe(
            dense.as_deref(),
            &sparse,
            RecipePayload {
                recipe_name: recipe.name.clone(),
                cuisine: recipe.cuisine,
                ingredients: recipe.ingredients.clone(),
                model_version: "v1".to_string(),
            },
        )
        .await;

    Ok(Json(recipe))
}

async fn delete_recipe(State(state): State<AppState>, Path(name): Path<String>) -> AppResult<Json<serde_json::Value>> {
    let existed = state.db.delete_recipe(&name).await?;
    state.vector_index.delete_point(&name).await;
    Ok(Json(json!({ "deleted": existed })))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CuisineEntry {
    name: &'static str,
    display_name: &'static str,
}

async fn list_cuisines() -> Json<Vec<CuisineEntry>> {
    Json(
        CuisineType::ALL
            .iter()
            .map(|c| CuisineEntry { name: c.as_str(), display_name: c.display_name() })
            .collect(),
    )
}

// --------------------------------------------------------------------
// Pantry ("fridge")
// --------------------------------------------------------------------

#[derive(Serialize)]
struct FridgeResponse {
    supplies: Vec<PantryItem>,
}

async fn list_fridge(State(state): State<AppState>) -> AppResult<Json<FridgeResponse>> {
    Ok(Json(FridgeResponse { supplies: state.db.list_pantry().await? }))
}

#[derive(Deserialize)]
struct CountQuery {
    #[serde(default)]
    count: Option<i64>,
}

async fn add_fridge_item(
    State(state): State<AppState>,
    Path(item): Path<String>,
    Query(query): Query<CountQuery>,
) -> AppResult<Json<serde_json::Value>> {
    let count = query.count.unwrap_or(1);
    if count < 1 {
        return Err(AppError::InvalidArgument("count must be >= 1".to_string()));
    }
    state.db.add_pantry_quantity(&item, count).await?;
    Ok(Json(json!({ "ok": true })))
}

#[derive(Deserialize)]
struct SetCountRequest {
    count: i64,
}

async fn set_fridge_item(
    State(state): State<AppState>,
    Path(item): Path<String>,
    Json(request): Json<SetCountRequest>,
) -> AppResult<Json<serde_json::Value>> {
    if request.count < 0 {
        return Err(AppError::InvalidArgument("count must be >= 0".to_string()));
    }
    state.db.set_pantry_quantity(&item, request.count).await?;
    Ok(Json(json!({ "ok": true })))
}

async fn delete_fridge_item(
    State(state): State<AppState>,
    Path(item): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    state.db.delete_pantry_item(&item).await?;
    Ok(Json(json!({ "ok": true })))
}

#[derive(Deserialize)]
struct BulkFridgeRequest {
    supplies: Vec<PantryItem>,
}

async fn put_fridge_bulk(
    State(state): State<AppState>,
    Json(request): Json<BulkFridgeRequest>,
) -> AppResult<Json<serde_json::Value>> {
    state.db.set_pantry_bulk(&request.supplies).await?;
    Ok(Json(json!({ "ok": true })))
}

#[derive(Deserialize)]
struct FridgeOrderRequest {
    items: Vec<String>,
}

async fn put_fridge_order(
    State(state): State<AppState>,
    Json(request): Json<FridgeOrderRequest>,
) -> AppResult<Json<serde_json::Value>> {
    state.db.set_pantry_order(&request.items).await?;
    Ok(Json(json!({ "ok": true })))
}

// --------------------------------------------------------------------
// Cookability
// --------------------------------------------------------------------

#[derive(Serialize)]
struct GenerateResponse {
    made: Vec<String>,
}

async fn generate_from_pantry(State(state): State<AppState>) -> AppResult<Json<GenerateResponse>> {
    let pantry: Vec<String> = state.db.list_pantry().await?.into_iter().map(|item| item.name).collect();
    let recipes = state.db.recipe_requirements().await?;
    let ir = IngredientResolver::new(&state.db);
    let made = cookability::cookable(&ir, &pantry, &recipes).await;
    Ok(Json(GenerateResponse { made }))
}

#[derive(Deserialize)]
struct GeneratePayloadRequest {
    recipes: Vec<String>,
    ingredients: Vec<Vec<String>>,
    supplies: Vec<String>,
}

async fn generate_from_payload(
    State(state): State<AppState>,
    Json(request): Json<GeneratePayloadRequest>,
) -> AppResult<Json<GenerateResponse>> {
    if request.recipes.len() != request.ingredients.len() {
        return Err(AppError::InvalidArgument("recipes and ingredients must have matching sizes".to_string()));
    }
    let pairs: Vec<(String, Vec<String>)> = request.recipes.into_iter().zip(request.ingredients).collect();
    let ir = IngredientResolver::new(&state.db);
    let made = cookability::cookable(&ir, &request.supplies, &pairs).await;
    Ok(Json(GenerateResponse { made }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AlmostCookableQuery {
    #[serde(default)]
    max_missing: Option<usize>,
}

async fn almost_cookable(
    State(state): State<AppState>,
    Query(query): Query<AlmostCookableQuery>,
) -> AppResult<Json<Vec<cookability::AlmostCookableResult>>> {
    let pantry: Vec<String> = state.db.list_pantry().await?.into_iter().map(|item| item.name).collect();
    let recipes = state.db.recipe_requirements().await?;
    let ir = IngredientResolver::new(&state.db);
    let results = cookability::almost_cookable(&ir, &pantry, &recipes, query.max_missing.unwrap_or(2)).await?;
    Ok(Json(results))
}

// --------------------------------------------------------------------
// Search
// --------------------------------------------------------------------

#[derive(Deserialize)]
struct LegacySearchQuery {
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    limit: Option<usize>,
}

async fn legacy_search(
    State(state): State<AppState>,
    Query(query): Query<LegacySearchQuery>,
) -> AppResult<Json<serde_json::Value>> {
    let hybrid = HybridSearch::new(&state.db, &state.dense, &state.vector_index, &state.cache);
    let response = hybrid
        .search(SearchRequest {
            ingredients: Vec::new(),
            query: query.query,
            top_k: query.limit,
            score_threshold: None,
        })
        .await?;
    Ok(Json(json!({ "results": response.results })))
}

async fn hybrid_search(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let hybrid = HybridSearch::new(&state.db, &state.dense, &state.vector_index, &state.cache);
    let response = hybrid.search(request).await?;

    let mut body = json!({ "results": response.results });
    if !state.vector_index.is_available() {
        body["warning"] = json!("vector index unavailable, results may be incomplete");
    }
    Ok(Json(body))
}

async fn index_all(State(state): State<AppState>) -> AppResult<Json<serde_json::Value>> {
    let recipes = state.db.list_recipes().await?;
    let mut indexed = 0usize;
    for recipe in &recipes {
        let dense = state.dense.embed_recipe(recipe).await;
        let sparse = sparse_embedder::sparse_from_recipe(&recipe.name, &recipe.ingredients, recipe.cuisine);
        let ok = state
            .vector_index
            .upsert_recipe(
                dense.as_deref(),
                &sparse,
                RecipePayload {
                    recipe_name: recipe.name.clone(),
                    cuisine: recipe.cuisine,
                    ingredients: recipe.ingredients.clone(),
                    model_version: "v1".to_string(),
                },
            )
            .await;
        if ok {
            indexed += 1;
        }
    }
    Ok(Json(json!({ "total": recipes.len(), "indexed": indexed })))
}

async fn search_stats(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "dense_embedder_available": state.dense.is_available(),
        "vector_index_available": state.vector_index.is_available(),
        "cache_available": state.cache.is_available(),
    }))
}

// --------------------------------------------------------------------
// Substitution
// --------------------------------------------------------------------

async fn missing_ingredients(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> AppResult<Json<crate::domain::MissingIngredientsReport>> {
    let ir = IngredientResolver::new(&state.db);
    let planner = SubstitutionPlanner::new(&state.db, &ir, &state.llm);
    Ok(Json(planner.missing_ingredients(&name).await?))
}

async fn substitutions(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let ir = IngredientResolver::new(&state.db);
    let planner = SubstitutionPlanner::new(&state.db, &ir, &state.llm);
    let suggestions = planner.suggest_substitutions(&name).await?;
    Ok(Json(json!({ "substitutions": suggestions })))
}

// --------------------------------------------------------------------
// Ingredient aliases
// --------------------------------------------------------------------

async fn list_aliases(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> AppResult<Json<Vec<crate::domain::AliasRecord>>> {
    Ok(Json(state.db.aliases_for_canonical(&name).await?))
}

#[derive(Deserialize)]
struct AddAliasRequest {
    alias: String,
}

async fn add_alias(
    State(state): State<AppState>,
    Path(canonical): Path<String>,
    Json(request): Json<AddAliasRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let ir = IngredientResolver::new(&state.db);
    ir.add_alias(&canonical, &request.alias).await?;
    Ok(Json(json!({ "ok": true })))
}

async fn generate_aliases(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> AppResult<Json<serde_json::Value>> {
    let ir = IngredientResolver::new(&state.db);
    let generated = ir.generate_aliases(&state.llm, &name).await;
    Ok(Json(json!({ "generated": generated })))
}

async fn resolve_ingredient(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Json<serde_json::Value> {
    let ir = IngredientResolver::new(&state.db);
    let canonical = ir.resolve(&name).await;
    Json(json!({ "canonical": canonical }))
}

async fn seed_aliases(State(state): State<AppState>) -> AppResult<Json<serde_json::Value>> {
    let ir = IngredientResolver::new(&state.db);
    ir.seed_common_aliases().await?;
    Ok(Json(json!({ "ok": true })))
}
