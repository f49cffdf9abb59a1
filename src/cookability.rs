//! Cookability Resolver (CR), §4.2. Pure, deterministic, cache-free: a
//! Kahn-style topological propagation over a bipartite (pantry token →
//! recipe) graph.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::Serialize;

use crate::error::AppError;
use crate::ingredient_resolver::IngredientResolver;

/// Merges duplicate recipe names (union of ingredients) as required before
/// graph construction (§4.2 edge cases).
fn merge_duplicates(recipes: &[(String, Vec<String>)]) -> Vec<(String, Vec<String>)> {
    let mut order = Vec::new();
    let mut merged: HashMap<String, Vec<String>> = HashMap::new();
    for (name, ingredients) in recipes {
        if !merged.contains_key(name) {
            order.push(name.clone());
        }
        merged.entry(name.clone()).or_default().extend(ingredients.iter().cloned());
    }
    order.into_iter().map(|name| (name.clone(), merged.remove(&name).unwrap())).collect()
}

/// Canonicalizes pantry and every recipe's ingredients, then returns the
/// list of recipes reachable by Kahn propagation, in discovery order
/// (§4.2, §5 ordering guarantees).
pub async fn cookable(
    ir: &IngredientResolver<'_>,
    pantry: &[String],
    recipes: &[(String, Vec<String>)],
) -> Vec<String> {
    let recipes = merge_duplicates(recipes);
    if pantry.is_empty() || recipes.is_empty() {
        return Vec::new();
    }

    let pantry_canonical = ir.resolve_to_set(pantry.iter().map(|s| s.as_str())).await;

    // graph: canonical ingredient token -> recipes that require it.
    let mut graph: HashMap<String, Vec<String>> = HashMap::new();
    let mut in_degree: HashMap<String, usize> = HashMap::new();

    for (name, ingredients) in &recipes {
        let canonical_ingredients: HashSet<String> = {
            let mut set = HashSet::new();
            for ingredient in ir.resolve_all(ingredients).await {
                set.insert(ingredient);
            }
            set
        };
        in_degree.insert(name.clone(), canonical_ingredients.len());
        for ingredient in canonical_ingredients {
            graph.entry(ingredient).or_default().push(name.clone());
        }
    }

    let mut emitted = Vec::new();
    let mut emitted_set = HashSet::new();
    let mut queue: VecDeque<String> = VecDeque::new();
    let mut visited_tokens: HashSet<String> = HashSet::new();

    let mut emit = |recipe: &str, emitted: &mut Vec<String>, emitted_set: &mut HashSet<String>, queue: &mut VecDeque<String>| {
        if emitted_set.insert(recipe.to_string()) {
            emitted.push(recipe.to_string());
            queue.push_back(recipe.to_string());
        }
    };

    // Recipes with no requirements at all are trivially cookable.
    for (name, _) in &recipes {
        if in_degree.get(name).copied().unwrap_or(0) == 0 {
            emit(name, &mut emitted, &mut emitted_set, &mut queue);
        }
    }

    for token in &pantry_canonical {
        queue.push_back(token.clone());
    }

    while let Some(token) = queue.pop_front() {
        if !visited_tokens.insert(token.clone()) {
            continue;
        }
        let Some(dependents) = graph.get(&token) else { continue };
        for recipe in dependents.clone() {
            if let Some(degree) = in_degree.get_mut(&recipe) {
                if *degree > 0 {
                    *degree -= 1;
                    if *degree == 0 {
                        emit(&recipe, &mut emitted, &mut emitted_set, &mut queue);
                    }
                }
            }
        }
    }

    emitted
}

#[derive(Debug, Clone, Serialize)]
pub struct AlmostCookableResult {
    pub name: String,
    pub missing: Vec<String>,
}

/// §4.2 "almost cookable" extension. `max_missing` must be in `1..=5`.
pub async fn almost_cookable(
    ir: &IngredientResolver<'_>,
    pantry: &[String],
    recipes: &[(String, Vec<String>)],
    max_missing: usize,
) -> Result<Vec<AlmostCookableResult>, AppError> {
    if !(1..=5).contains(&max_missing) {
        return Err(AppError::InvalidArgument(
            "maxMissing must be between 1 and 5".to_string(),
        ));
    }

    let recipes = merge_duplicates(recipes);
    let pantry_canonical = ir.resolve_to_set(pantry.iter().map(|s| s.as_str())).await;

    let mut results = Vec::new();
    for (name, ingredients) in &recipes {
        let required: HashSet<String> = ir.resolve_all(ingredients).await.into_iter().collect();
        let missing: Vec<String> = required.difference(&pantry_canonical).cloned().collect();
        if missing.len() <= max_missing {
            results.push(AlmostCookableResult { name: name.clone(), missing });
        }
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    async fn resolver(db: &Database) -> IngredientResolver<'_> {
        IngredientResolver::new(db)
    }

    #[tokio::test]
    async fn s1_basic_kahn_cookability() {
        let db = Database::new("sqlite::memory:").await.unwrap();
        let ir = resolver(&db).await;
        let recipes = vec![
            ("sandwich".to_string(), vec!["bread".to_string(), "ham".to_string()]),
            (
                "burger".to_string(),
                vec!["bread".to_string(), "meat".to_string(), "sandwich".to_string()],
            ),
        ];
        let pantry = vec!["bread".to_string(), "ham".to_string(), "meat".to_string()];
        let made = cookable(&ir, &pantry, &recipes).await;
        assert_eq!(made, vec!["sandwich".to_string(), "burger".to_string()]);
    }

    #[tokio::test]
    async fn s2_missing_ingredient() {
        let db = Database::new("sqlite::memory:").await.unwrap();
        let ir = resolver(&db).await;
        let recipes = vec![("omelette".to_string(), vec!["egg".to_string(), "milk".to_string()])];
        let pantry = vec!["egg".to_string()];
        let made = cookable(&ir, &pantry, &recipes).await;
        assert!(made.is_empty());
    }

    #[tokio::test]
    async fn s3_seasonings_never_passed_in_never_affect_cookability() {
        let db = Database::new("sqlite::memory:").await.unwrap();
        let ir = resolver(&db).await;
        // Cookability only ever sees non-seasoning ingredients (caller's
        // responsibility per §4.2); a recipe whose seasonings the pantry
        // lacks is still cookable as long as its ingredients are present.
        let recipes = vec![(
            "carbonara".to_string(),
            vec!["pasta".to_string(), "egg".to_string(), "pancetta".to_string()],
        )];
        let pantry = vec!["pasta".to_string(), "egg".to_string(), "pancetta".to_string()];
        let made = cookable(&ir, &pantry, &recipes).await;
        assert_eq!(made, vec!["carbonara".to_string()]);
    }

    #[tokio::test]
    async fn s4_alias_resolution() {
        let db = Database::new("sqlite::memory:").await.unwrap();
        let ir = resolver(&db).await;
        ir.add_alias("tomato", "roma tomato").await.unwrap();
        let recipes = vec![("salad".to_string(), vec!["tomato".to_string(), "lettuce".to_string()])];
        let pantry = vec!["roma tomato".to_string(), "lettuce".to_string()];
        let made = cookable(&ir, &pantry, &recipes).await;
        assert_eq!(made, vec!["salad".to_string()]);
    }

    #[tokio::test]
    async fn self_satisfying_recipe_is_never_emitted() {
        let db = Database::new("sqlite::memory:").await.unwrap();
        let ir = resolver(&db).await;
        let recipes = vec![("weird".to_string(), vec!["weird".to_string(), "egg".to_string()])];
        let pantry = vec!["egg".to_string()];
        let made = cookable(&ir, &pantry, &recipes).await;
        assert!(made.is_empty());
    }

    #[tokio::test]
    async fn composite_recipe_becomes_cookable_via_intermediate() {
        let db = Database::new("sqlite::memory:").await.unwrap();
        let ir = resolver(&db).await;
        let recipes = vec![
            ("dough".to_string(), vec!["flour".to_string(), "water".to_string()]),
            ("pizza".to_string(), vec!["dough".to_string(), "cheese".to_string()]),
        ];
        let pantry = vec!["flour".to_string(), "water".to_string(), "cheese".to_string()];
        let made = cookable(&ir, &pantry, &recipes).await;
        assert_eq!(made, vec!["dough".to_string(), "pizza".to_string()]);
    }

    #[tokio::test]
    async fn duplicate_recipe_entries_are_merged() {
        let db = Database::new("sqlite::memory:").await.unwrap();
        let ir = resolver(&db).await;
        let recipes = vec![
            ("toast".to_string(), vec!["bread".to_string()]),
            ("toast".to_string(), vec!["butter".to_string()]),
        ];
        let pantry = vec!["bread".to_string(), "butter".to_string()];
        let made = cookable(&ir, &pantry, &recipes).await;
        assert_eq!(made, vec!["toast".to_string()]);
    }

    #[tokio::test]
    async fn empty_pantry_or_recipes_returns_empty() {
        let db = Database::new("sqlite::memory:").await.unwrap();
        let ir = resolver(&db).await;
        let recipes = vec![("toast".to_string(), vec!["bread".to_string()])];
        assert!(cookable(&ir, &[], &recipes).await.is_empty());
        assert!(cookable(&ir, &["bread".to_string()], &[]).await.is_empty());
    }

    #[tokio::test]
    async fn almost_cookable_rejects_out_of_range_bound() {
        let db = Database::new("sqlite::memory:").await.unwrap();
        let ir = resolver(&db).await;
        let result = almost_cookable(&ir, &[], &[], 0).await;
        assert!(result.is_err());
        let result = almost_cookable(&ir, &[], &[], 6).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn almost_cookable_s2() {
        let db = Database::new("sqlite::memory:").await.unwrap();
        let ir = resolver(&db).await;
        let recipes = vec![("omelette".to_string(), vec!["egg".to_string(), "milk".to_string()])];
        let pantry = vec!["egg".to_string()];
        let results = almost_cookable(&ir, &pantry, &recipes, 2).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].missing, vec!["milk".to_string()]);
    }
}
