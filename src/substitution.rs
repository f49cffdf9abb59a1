//! Substitution Planner (SP), §4.9. Diffs a recipe's required ingredients
//! against the pantry, then asks the LLM for replacements per missing
//! ingredient, one request at a time so a single bad response never loses
//! the others.

use std::collections::{HashMap, HashSet};

use serde::Deserialize;

use crate::db::Database;
use crate::domain::{MissingIngredientsReport, SubstitutionSuggestion};
use crate::error::{AppError, AppResult};
use crate::ingredient_resolver::IngredientResolver;
use crate::llm::LlmClient;

#[derive(Debug, Deserialize)]
struct RawSuggestion {
    ingredient: String,
    confidence: f64,
    reasoning: String,
}

pub struct SubstitutionPlanner<'a> {
    db: &'a Database,
    ir: &'a IngredientResolver<'a>,
    llm: &'a LlmClient,
}

impl<'a> SubstitutionPlanner<'a> {
    pub fn new(db: &'a Database, ir: &'a IngredientResolver<'a>, llm: &'a LlmClient) -> Self {
        Self { db, ir, llm }
    }

    /// §4.9 steps 1-2: the recipe's required ingredients minus what the
    /// pantry already canonically covers.
    pub async fn missing_ingredients(&self, recipe_name: &str) -> AppResult<MissingIngredientsReport> {
        let recipe = self
            .db
            .get_recipe(recipe_name)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("recipe '{recipe_name}' not found")))?;

        let pantry = self.db.list_pantry().await?;
        let pantry_raw: HashSet<String> = pantry.iter().map(|item| item.name.trim().to_lowercase()).collect();
        let pantry_canonical: HashSet<String> = self
            .ir
            .resolve_to_set(pantry.iter().map(|item| item.name.as_str()))
            .await;

        let required: HashSet<String> = self.ir.resolve_all(&recipe.ingredients).await.into_iter().collect();
        let missing: Vec<String> = required
            .into_iter()
            .filter(|ingredient| !pantry_canonical.contains(ingredient) && !pantry_raw.contains(ingredient))
            .collect();

        Ok(MissingIngredientsReport::new(recipe.name, missing, recipe.ingredients.len()))
    }

    /// §4.9 steps 3-5: per missing ingredient, ask the LLM for ranked
    /// substitutes and annotate `inFridge`. A failure on one ingredient
    /// yields an empty list for that ingredient only.
    pub async fn suggest_substitutions(
        &self,
        recipe_name: &str,
    ) -> AppResult<HashMap<String, Vec<SubstitutionSuggestion>>> {
        let recipe = self
            .db
            .get_recipe(recipe_name)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("recipe '{recipe_name}' not found")))?;

        let pantry = self.db.list_pantry().await?;
        let pantry_raw: HashSet<String> = pantry.iter().map(|item| item.name.trim().to_lowercase()).collect();
        let pantry_canonical: HashSet<String> = self
            .ir
            .resolve_to_set(pantry.iter().map(|item| item.name.as_str()))
            .await;

        let report = self.missing_ingredients(recipe_name).await?;

        let mut result = HashMap::new();
        for missing in &report.missing_ingredients {
            let suggestions = self
                .suggest_for_ingredient(missing, &recipe, &pantry_raw, &pantry_canonical)
                .await;
            result.insert(missing.clone(), suggestions);
        }
        Ok(result)
    }

    async fn suggest_for_ingredient(
        &self,
        missing: &str,
        recipe: &crate::domain::Recipe,
        pantry_raw: &HashSet<String>,
        pantry_canonical: &HashSet<String>,
    ) -> Vec<SubstitutionSuggestion> {
        let system = "You are a culinary expert. Given a missing ingredient, the recipe's cuisine, its \
                      other ingredients, and what's in the pantry, suggest substitutes preferring items \
                      already in the pantry. Respond with a JSON array of objects, each with \
                      \"ingredient\", \"confidence\" (0 to 1), and \"reasoning\".";
        let user = format!(
            "Missing ingredient: {missing}\nCuisine: {}\nOther ingredients: {}\nPantry: {}",
            recipe.cuisine.display_name(),
            recipe.ingredients.join(", "),
            pantry_raw.iter().cloned().collect::<Vec<_>>().join(", "),
        );

        let value = match self.llm.chat_json(system, &user).await {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(%err, ingredient = missing, "substitution request failed");
                return Vec::new();
            }
        };

        let raw: Vec<RawSuggestion> = match extract_suggestions(&value) {
            Some(raw) => raw,
            None => {
                tracing::warn!(ingredient = missing, "substitution response was not the expected shape");
                return Vec::new();
            }
        };

        let mut suggestions = Vec::with_capacity(raw.len());
        for candidate in raw {
            let normalized = candidate.ingredient.trim().to_lowercase();
            if normalized.is_empty() {
                continue;
            }
            let canonical = self.ir.resolve(&normalized).await;
            let in_fridge = pantry_raw.contains(&normalized) || pantry_canonical.contains(&canonical);
            suggestions.push(SubstitutionSuggestion {
                ingredient: candidate.ingredient,
                confidence: candidate.confidence.clamp(0.0, 1.0),
                reasoning: candidate.reasoning,
                in_fridge,
            });
        }
        suggestions
    }
}

fn extract_suggestions(value: &serde_json::Value) -> Option<Vec<RawSuggestion>> {
    if let Some(array) = value.as_array() {
        return serde_json::from_value(serde_json::Value::Array(array.clone())).ok();
    }
    if let Some(object) = value.as_object() {
        for field in object.values() {
            if field.is_array() {
                if let Ok(parsed) = serde_json::from_value(field.clone()) {
                    return Some(parsed);
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CuisineType;

    #[tokio::test]
    async fn missing_ingredients_diffs_against_pantry() {
        let db = Database::new("sqlite::memory:").await.unwrap();
        db.add_recipe(
            "omelette",
            &["egg".to_string(), "milk".to_string()],
            &["salt".to_string()],
            CuisineType::French,
            "Whisk and cook.",
            None,
        )
        .await
        .unwrap();
        db.add_pantry_quantity("egg", 3).await.unwrap();

        let ir = IngredientResolver::new(&db);
        let llm = dummy_llm();
        let report = SubstitutionPlanner::new(&db, &ir, &llm)
            .missing_ingredients("omelette")
            .await
            .unwrap();

        assert_eq!(report.missing_ingredients, vec!["milk".to_string()]);
        assert_eq!(report.total_required, 2);
        assert!((report.coverage_percent - 50.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn missing_ingredients_reports_not_found() {
        let db = Database::new("sqlite::memory:").await.unwrap();
        let ir = IngredientResolver::new(&db);
        let result = SubstitutionPlanner::new(&db, &ir, &dummy_llm())
            .missing_ingredients("nonexistent")
            .await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    fn dummy_llm() -> LlmClient {
        LlmClient::new(&crate::config::Config {
            bind_addr: "0.0.0.0:8080".parse().unwrap(),
            database_url: "sqlite::memory:".to_string(),
            llm_base_url: "http://localhost:1".to_string(),
            llm_api_key: String::new(),
            llm_chat_model: "test-model".to_string(),
            llm_embed_model: "test-embed".to_string(),
            llm_embed_dim: 8,
            vector_index_url: "http://localhost:1".to_string(),
            vector_index_api_key: None,
            cache_url: "redis://127.0.0.1/".to_string(),
            cache_ttl_seconds: 60,
        })
    }
}
