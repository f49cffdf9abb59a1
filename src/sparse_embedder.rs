//! Sparse Embedder (SE), §4.4. Purely local: tokenize, hash into a fixed
//! vocabulary, weight by field. No external collaborator, so no
//! availability flag — it can never degrade.

use std::collections::HashMap;

use sha2::{Digest, Sha256};

use crate::domain::CuisineType;

/// Fixed hash vocabulary size (§4.4).
pub const VOCAB_SIZE: u64 = 100_000;

const NAME_WEIGHT: f64 = 2.0;
const CUISINE_WEIGHT: f64 = 1.5;
const INGREDIENT_WEIGHT: f64 = 1.0;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparseVector {
    pub indices: Vec<u32>,
    pub values: Vec<f32>,
}

impl SparseVector {
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "had", "has", "have",
    "in", "is", "it", "of", "on", "or", "that", "the", "this", "to", "was", "were", "with",
];

fn is_stop_word(token: &str) -> bool {
    STOP_WORDS.contains(&token)
}

/// True for ASCII alphanumerics and the CJK ranges the spec calls out for
/// retention (Unified Ideographs, Hiragana, Katakana, Hangul syllables).
fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric()
        || ('\u{4E00}'..='\u{9FFF}').contains(&c) // CJK Unified Ideographs
        || ('\u{3040}'..='\u{309F}').contains(&c) // Hiragana
        || ('\u{30A0}'..='\u{30FF}').contains(&c) // Katakana
        || ('\u{AC00}'..='\u{D7A3}').contains(&c) // Hangul syllables
}

/// Lowercase; split on any run of non-word characters (retaining CJK); drop
/// tokens shorter than 2 and stop words; no stemming.
pub fn tokenize(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    lower
        .split(|c: char| !is_word_char(c))
        .filter(|token| !token.is_empty())
        .filter(|token| token.chars().count() >= 2)
        .filter(|token| !is_stop_word(token))
        .map(|token| token.to_string())
        .collect()
}

/// Stable hash mod V; collisions are accepted (§4.4 — this is a
/// bag-of-words surrogate, not a true vocabulary).
pub fn hash_token(token: &str) -> u32 {
    let digest = Sha256::digest(token.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    let value = u64::from_be_bytes(bytes);
    (value % VOCAB_SIZE) as u32
}

fn accumulate(weights: &mut HashMap<u32, f64>, tokens: &[String], weight: f64) {
    for token in tokens {
        *weights.entry(hash_token(token)).or_insert(0.0) += weight;
    }
}

fn weights_into_vector(weights: HashMap<u32, f64>) -> SparseVector {
    let mut entries: Vec<(u32, f64)> = weights.into_iter().collect();
    entries.sort_by_key(|(index, _)| *index);
    SparseVector {
        indices: entries.iter().map(|(index, _)| *index).collect(),
        values: entries.iter().map(|(_, value)| *value as f32).collect(),
    }
}

/// Query vector from a plain ingredient list; every token weighted +1.0.
pub fn sparse_from_ingredients(ingredients: &[String]) -> SparseVector {
    let mut weights = HashMap::new();
    for ingredient in ingredients {
        accumulate(&mut weights, &tokenize(ingredient), INGREDIENT_WEIGHT);
    }
    weights_into_vector(weights)
}

/// Recipe vector: name tokens +2.0, cuisine tokens +1.5, ingredient tokens
/// +1.0, duplicates accumulating (§4.4).
pub fn sparse_from_recipe(name: &str, ingredients: &[String], cuisine: CuisineType) -> SparseVector {
    let mut weights = HashMap::new();
    accumulate(&mut weights, &tokenize(name), NAME_WEIGHT);
    accumulate(&mut weights, &tokenize(cuisine.display_name()), CUISINE_WEIGHT);
    for ingredient in ingredients {
        accumulate(&mut weights, &tokenize(ingredient), INGREDIENT_WEIGHT);
    }
    weights_into_vector(weights)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_drops_short_and_stop_words() {
        let tokens = tokenize("The Roma Tomato is a 2-in-1 deal");
        assert!(!tokens.contains(&"is".to_string()));
        assert!(!tokens.contains(&"a".to_string()));
        assert!(tokens.contains(&"roma".to_string()));
        assert!(tokens.contains(&"tomato".to_string()));
    }

    #[test]
    fn tokenize_retains_cjk() {
        let tokens = tokenize("牛肉 and 麺");
        assert!(tokens.contains(&"牛肉".to_string()));
        assert!(tokens.contains(&"麺".to_string()));
    }

    #[test]
    fn hash_is_stable_and_bounded() {
        let a = hash_token("tomato");
        let b = hash_token("tomato");
        assert_eq!(a, b);
        assert!((a as u64) < VOCAB_SIZE);
    }

    #[test]
    fn recipe_vector_accumulates_duplicate_tokens() {
        let vector = sparse_from_recipe(
            "tomato soup",
            &["tomato".to_string(), "tomato".to_string()],
            CuisineType::Italian,
        );
        let tomato_index = hash_token("tomato");
        let position = vector.indices.iter().position(|i| *i == tomato_index).unwrap();
        // name occurrence (+2.0) + two ingredient occurrences (+1.0 each) = 4.0
        assert!((vector.values[position] - 4.0).abs() < 1e-6);
    }

    #[test]
    fn ingredient_query_vector_uses_unit_weight() {
        let vector = sparse_from_ingredients(&["chicken".to_string()]);
        assert_eq!(vector.values, vec![1.0]);
    }
}
