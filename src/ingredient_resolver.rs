//! Ingredient Resolver (IR), §4.1. Token → canonical token, backed by the
//! `ingredient_aliases` table, with bulk and set-valued forms and an
//! LLM-assisted `generate_aliases`.

use std::collections::HashSet;

use crate::db::Database;
use crate::domain::AliasSource;
use crate::llm::LlmClient;

const SEED_ALIASES: &[&str] = &["tomato", "onion", "bell pepper", "potato", "chicken", "beef", "garlic"];
const SEED_CONFIDENCE: f64 = 0.9;
const MANUAL_CONFIDENCE: f64 = 1.0;
const AI_GENERATED_CONFIDENCE: f64 = 0.8;

pub struct IngredientResolver<'a> {
    db: &'a Database,
}

impl<'a> IngredientResolver<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// §4.1 resolve: empty/whitespace input passes through unchanged.
    /// Otherwise lowercase-trim and look up with precedence (1) canonical
    /// self-loop, (2) highest-confidence alias (ties by most recent), (3)
    /// the trimmed original.
    pub async fn resolve(&self, token: &str) -> String {
        if token.trim().is_empty() {
            return token.to_string();
        }

        let normalized = token.trim().to_lowercase();
        let matches = match self.db.find_alias_matches(&normalized).await {
            Ok(rows) => rows,
            Err(err) => {
                tracing::warn!(%err, token = %normalized, "alias lookup failed, falling back to identity");
                return normalized;
            }
        };

        if let Some(self_loop) = matches.iter().find(|record| record.canonical == record.alias) {
            return self_loop.canonical.clone();
        }

        // `matches` is already ordered confidence DESC, created_at DESC.
        match matches.first() {
            Some(record) => record.canonical.clone(),
            None => normalized,
        }
    }

    pub async fn resolve_all(&self, tokens: &[String]) -> Vec<String> {
        let mut resolved = Vec::with_capacity(tokens.len());
        for token in tokens {
            resolved.push(self.resolve(token).await);
        }
        resolved
    }

    /// Deduplicated canonicals, merging back the original strings so exact
    /// matches pre-resolution remain matchable (§4.1).
    pub async fn resolve_to_set<I, S>(&self, tokens: I) -> HashSet<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = HashSet::new();
        for token in tokens {
            let token = token.as_ref();
            set.insert(self.resolve(token).await);
            set.insert(token.trim().to_lowercase());
        }
        set
    }

    pub async fn add_alias(&self, canonical: &str, alias: &str) -> Result<(), crate::error::AppError> {
        let canonical = canonical.trim().to_lowercase();
        let alias = alias.trim().to_lowercase();
        self.db
            .upsert_alias(&canonical, &alias, MANUAL_CONFIDENCE, AliasSource::Manual)
            .await
    }

    pub async fn seed_common_aliases(&self) -> Result<(), crate::error::AppError> {
        for canonical in SEED_ALIASES {
            self.db
                .upsert_alias(canonical, canonical, SEED_CONFIDENCE, AliasSource::Seed)
                .await?;
        }
        Ok(())
    }

    /// Invokes the LLM for culinary variants/abbreviations/singular-plural
    /// forms of `token`. Failures are logged and produce an empty return;
    /// they are not fatal (§4.1, §7 Degraded).
    pub async fn generate_aliases(&self, llm: &LlmClient, token: &str) -> Vec<String> {
        let normalized = token.trim().to_lowercase();
        if normalized.is_empty() {
            return Vec::new();
        }

        let system = "You are a culinary expert. Given an ingredient name, return a JSON array of \
                      alternate spellings, abbreviations, and singular/plural variants. Exclude \
                      unrelated ingredients. Respond with a JSON array only.";
        let value = match llm.chat_json(system, &normalized).await {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(%err, token = %normalized, "alias generation failed");
                return Vec::new();
            }
        };

        let variants = extract_string_array(&value);
        let mut aliases = Vec::new();
        for variant in variants {
            let variant = variant.trim().to_lowercase();
            if variant.is_empty() || variant == normalized {
                continue;
            }
            if let Err(err) = self
                .db
                .upsert_alias(&normalized, &variant, AI_GENERATED_CONFIDENCE, AliasSource::AiGenerated)
                .await
            {
                tracing::warn!(%err, "failed to persist generated alias");
                continue;
            }
            aliases.push(variant);
        }

        if let Err(err) = self
            .db
            .upsert_alias(&normalized, &normalized, MANUAL_CONFIDENCE, AliasSource::AiGenerated)
            .await
        {
            tracing::warn!(%err, "failed to self-insert canonical after alias generation");
        }

        aliases
    }
}

/// Accepts either a bare JSON array or the first array-valued field of an
/// object (§4.1).
fn extract_string_array(value: &serde_json::Value) -> Vec<String> {
    if let Some(array) = value.as_array() {
        return array.iter().filter_map(|v| v.as_str().map(str::to_string)).collect();
    }
    if let Some(object) = value.as_object() {
        for field in object.values() {
            if let Some(array) = field.as_array() {
                return array.iter().filter_map(|v| v.as_str().map(str::to_string)).collect();
            }
        }
    }
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_bare_array() {
        let value = serde_json::json!(["roma tomato", "plum tomato"]);
        assert_eq!(extract_string_array(&value), vec!["roma tomato", "plum tomato"]);
    }

    #[test]
    fn extracts_first_array_field_of_object() {
        let value = serde_json::json!({"note": "ok", "variants": ["roma tomato"]});
        assert_eq!(extract_string_array(&value), vec!["roma tomato"]);
    }

    #[tokio::test]
    async fn resolve_passes_through_empty_input_unchanged() {
        let db = Database::new("sqlite::memory:").await.unwrap();
        let ir = IngredientResolver::new(&db);
        assert_eq!(ir.resolve("   ").await, "   ");
    }

    #[tokio::test]
    async fn resolve_is_idempotent() {
        let db = Database::new("sqlite::memory:").await.unwrap();
        let ir = IngredientResolver::new(&db);
        ir.add_alias("tomato", "roma tomato").await.unwrap();

        let once = ir.resolve("Roma Tomato").await;
        let twice = ir.resolve(&once).await;
        assert_eq!(once, "tomato");
        assert_eq!(once, twice);
    }

    #[tokio::test]
    async fn unknown_token_resolves_to_trimmed_self() {
        let db = Database::new("sqlite::memory:").await.unwrap();
        let ir = IngredientResolver::new(&db);
        assert_eq!(ir.resolve("  Quinoa  ").await, "quinoa");
    }

    #[tokio::test]
    async fn self_loop_wins_over_higher_or_equal_confidence_alias() {
        let db = Database::new("sqlite::memory:").await.unwrap();
        let ir = IngredientResolver::new(&db);
        // "tomato" is established as its own canonical...
        ir.add_alias("tomato", "tomato").await.unwrap();
        // ...even if another canonical also claims "tomato" as an alias.
        db.upsert_alias("vegetable", "tomato", 1.0, AliasSource::Manual)
            .await
            .unwrap();

        assert_eq!(ir.resolve("tomato").await, "tomato");
    }
}
