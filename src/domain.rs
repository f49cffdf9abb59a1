//! Shared data model (§3). Plain data; no component-specific logic lives here.

use serde::{Deserialize, Serialize};

/// Closed enum with a display-name field, same shape as the teacher's
/// `RecipeCategory` (`crafting/definition.rs`): a `#[serde(rename_all =
/// "snake_case")]` tag plus an `as_str`/`display_name` accessor instead of
/// open-ended string categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CuisineType {
    Chinese,
    Japanese,
    Italian,
    Mexican,
    Indian,
    Thai,
    Korean,
    French,
    American,
    Mediterranean,
    MiddleEastern,
    Other,
}

impl CuisineType {
    pub const ALL: [CuisineType; 12] = [
        CuisineType::Chinese,
        CuisineType::Japanese,
        CuisineType::Italian,
        CuisineType::Mexican,
        CuisineType::Indian,
        CuisineType::Thai,
        CuisineType::Korean,
        CuisineType::French,
        CuisineType::American,
        CuisineType::Mediterranean,
        CuisineType::MiddleEastern,
        CuisineType::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CuisineType::Chinese => "CHINESE",
            CuisineType::Japanese => "JAPANESE",
            CuisineType::Italian => "ITALIAN",
            CuisineType::Mexican => "MEXICAN",
            CuisineType::Indian => "INDIAN",
            CuisineType::Thai => "THAI",
            CuisineType::Korean => "KOREAN",
            CuisineType::French => "FRENCH",
            CuisineType::American => "AMERICAN",
            CuisineType::Mediterranean => "MEDITERRANEAN",
            CuisineType::MiddleEastern => "MIDDLE_EASTERN",
            CuisineType::Other => "OTHER",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            CuisineType::Chinese => "Chinese",
            CuisineType::Japanese => "Japanese",
            CuisineType::Italian => "Italian",
            CuisineType::Mexican => "Mexican",
            CuisineType::Indian => "Indian",
            CuisineType::Thai => "Thai",
            CuisineType::Korean => "Korean",
            CuisineType::French => "French",
            CuisineType::American => "American",
            CuisineType::Mediterranean => "Mediterranean",
            CuisineType::MiddleEastern => "Middle Eastern",
            CuisineType::Other => "Other",
        }
    }

    pub fn parse(s: &str) -> CuisineType {
        match s.trim().to_uppercase().replace([' ', '-'], "_").as_str() {
            "CHINESE" => CuisineType::Chinese,
            "JAPANESE" => CuisineType::Japanese,
            "ITALIAN" => CuisineType::Italian,
            "MEXICAN" => CuisineType::Mexican,
            "INDIAN" => CuisineType::Indian,
            "THAI" => CuisineType::Thai,
            "KOREAN" => CuisineType::Korean,
            "FRENCH" => CuisineType::French,
            "AMERICAN" => CuisineType::American,
            "MEDITERRANEAN" => CuisineType::Mediterranean,
            "MIDDLE_EASTERN" => CuisineType::MiddleEastern,
            _ => CuisineType::Other,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    pub name: String,
    pub ingredients: Vec<String>,
    pub seasonings: Vec<String>,
    pub cuisine: CuisineType,
    pub instructions: String,
    pub image_ref: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PantryItem {
    pub name: String,
    pub quantity: i64,
    pub sort_order: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AliasSource {
    Seed,
    Manual,
    AiGenerated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AliasRecord {
    pub canonical: String,
    pub alias: String,
    pub confidence: f64,
    pub source: AliasSource,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Tagged variant, not a subclass hierarchy (§9 design notes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    HybridRrf,
    Semantic,
    Ingredient,
}

impl MatchType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchType::HybridRrf => "hybrid_rrf",
            MatchType::Semantic => "semantic",
            MatchType::Ingredient => "ingredient",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub recipe_name: String,
    pub score: f64,
    pub cuisine_type: CuisineType,
    pub match_type: MatchType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubstitutionSuggestion {
    pub ingredient: String,
    pub confidence: f64,
    pub reasoning: String,
    pub in_fridge: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingIngredientsReport {
    pub recipe_name: String,
    pub missing_ingredients: Vec<String>,
    pub total_required: usize,
    pub coverage_percent: f64,
}

impl MissingIngredientsReport {
    pub fn new(recipe_name: String, missing_ingredients: Vec<String>, total_required: usize) -> Self {
        let coverage_percent = if total_required == 0 {
            100.0
        } else {
            100.0 * (total_required - missing_ingredients.len()) as f64 / total_required as f64
        };
        Self {
            recipe_name,
            missing_ingredients,
            total_required,
            coverage_percent,
        }
    }
}
