//! Dense Embedder (DE), §4.3. Wraps the shared `LlmClient` with the
//! lifecycle-scoped "available" flag called out in §9 design notes: set at
//! startup probe, flipped by observation, read without a lock.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::domain::{CuisineType, Recipe};
use crate::llm::LlmClient;

pub struct DenseEmbedder {
    client: LlmClient,
    available: AtomicBool,
}

impl DenseEmbedder {
    pub fn new(client: LlmClient) -> Self {
        Self {
            client,
            available: AtomicBool::new(true),
        }
    }

    pub async fn probe(&self) {
        let available = self.client.probe_available().await;
        self.available.store(available, Ordering::Relaxed);
        tracing::info!(available, "dense embedder availability probed");
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::Relaxed)
    }

    pub fn dimension(&self) -> usize {
        self.client.embed_dim()
    }

    /// Empty/blank input returns `None` ("no embedding"); any other failure
    /// flips the availability flag and also returns `None` — callers never
    /// see an exception (§4.3, §7 Degraded).
    pub async fn embed(&self, text: &str) -> Option<Vec<f32>> {
        if text.trim().is_empty() {
            return None;
        }

        match self.client.embed(text).await {
            Ok(vector) => {
                self.available.store(true, Ordering::Relaxed);
                Some(vector)
            }
            Err(err) => {
                tracing::warn!(%err, "dense embedding failed, treating as degraded");
                self.available.store(false, Ordering::Relaxed);
                None
            }
        }
    }

    /// The canonical recipe text (§4.3): `"Recipe: <name>. Cuisine: <C>.
    /// Ingredients: <i1, i2, …>. Instructions: <first 500 chars, elided>"`,
    /// omitting any empty segment.
    pub fn canonical_recipe_text(recipe: &Recipe) -> String {
        canonical_recipe_text(&recipe.name, recipe.cuisine, &recipe.ingredients, &recipe.instructions)
    }

    pub async fn embed_recipe(&self, recipe: &Recipe) -> Option<Vec<f32>> {
        self.embed(&Self::canonical_recipe_text(recipe)).await
    }
}

pub fn canonical_recipe_text(name: &str, cuisine: CuisineType, ingredients: &[String], instructions: &str) -> String {
    let mut segments = Vec::new();

    if !name.trim().is_empty() {
        segments.push(format!("Recipe: {name}."));
    }
    segments.push(format!("Cuisine: {}.", cuisine.display_name()));
    if !ingredients.is_empty() {
        segments.push(format!("Ingredients: {}.", ingredients.join(", ")));
    }
    if !instructions.trim().is_empty() {
        let truncated = if instructions.chars().count() > 500 {
            let head: String = instructions.chars().take(500).collect();
            format!("{head}…")
        } else {
            instructions.to_string()
        };
        segments.push(format!("Instructions: {truncated}"));
    }

    segments.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composes_full_text() {
        let text = canonical_recipe_text(
            "Salad",
            CuisineType::Mediterranean,
            &["tomato".to_string(), "lettuce".to_string()],
            "Chop and toss.",
        );
        assert_eq!(
            text,
            "Recipe: Salad. Cuisine: Mediterranean. Ingredients: tomato, lettuce. Instructions: Chop and toss."
        );
    }

    #[test]
    fn omits_empty_segments() {
        let text = canonical_recipe_text("Mystery", CuisineType::Other, &[], "");
        assert_eq!(text, "Recipe: Mystery. Cuisine: Other.");
    }

    #[test]
    fn truncates_long_instructions_with_ellipsis() {
        let long = "x".repeat(600);
        let text = canonical_recipe_text("Thing", CuisineType::Other, &[], &long);
        assert!(text.ends_with('…'));
        assert_eq!(text.chars().filter(|c| *c == 'x').count(), 500);
    }
}
