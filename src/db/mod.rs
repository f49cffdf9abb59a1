//! Relational Store (RS) — persistent source of truth for recipes, pantry
//! state, and ingredient aliases (§3, §6 "Persisted state").
//!
//! Follows the teacher's `db.rs`: a pooled `Database` struct, an idempotent
//! `migrate()` run once at startup (`CREATE TABLE IF NOT EXISTS`), and plain
//! `sqlx::query(...)` + `Row::get` rather than the compile-time-checked
//! `query!` macro, since the teacher never introduces a build-time database
//! dependency either.

use chrono::Utc;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::Row;

use crate::domain::{AliasRecord, AliasSource, CuisineType, PantryItem, Recipe};
use crate::error::AppError;

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        Self::migrate(&pool).await?;

        Ok(Self { pool })
    }

    async fn migrate(pool: &SqlitePool) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS food_items (
                name TEXT PRIMARY KEY
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS recipe_dependencies (
                recipe_name TEXT NOT NULL,
                ingredient_name TEXT NOT NULL,
                is_seasoning INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (recipe_name, ingredient_name)
            )
            "#,
        )
        .execute(pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_deps_recipe ON recipe_dependencies(recipe_name)")
            .execute(pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_deps_ingredient ON recipe_dependencies(ingredient_name)")
            .execute(pool)
            .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS recipe_details (
                recipe_name TEXT PRIMARY KEY,
                cuisine_type TEXT NOT NULL DEFAULT 'OTHER',
                instructions TEXT NOT NULL DEFAULT '',
                image_url TEXT
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS supplies (
                name TEXT PRIMARY KEY,
                quantity INTEGER NOT NULL DEFAULT 1,
                sort_order INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS ingredient_aliases (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                canonical_name TEXT NOT NULL,
                alias TEXT NOT NULL,
                confidence REAL NOT NULL DEFAULT 1.0,
                source TEXT NOT NULL DEFAULT 'manual',
                created_at TEXT NOT NULL,
                UNIQUE(canonical_name, alias)
            )
            "#,
        )
        .execute(pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_alias_canonical ON ingredient_aliases(canonical_name)")
            .execute(pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_alias_alias ON ingredient_aliases(alias)")
            .execute(pool)
            .await?;

        tracing::info!("database migrations complete");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Recipes
    // ------------------------------------------------------------------

    /// Transactional upsert of a recipe: food tokens for name + ingredients +
    /// seasonings, dependency edges tagged `is_seasoning`, and the detail
    /// row. Mutated only by delete-and-re-add per §3 lifecycle.
    pub async fn add_recipe(
        &self,
        name: &str,
        ingredients: &[String],
        seasonings: &[String],
        cuisine: CuisineType,
        instructions: &str,
        image_ref: Option<&str>,
    ) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("INSERT INTO food_items (name) VALUES (?) ON CONFLICT(name) DO NOTHING")
            .bind(name)
            .execute(&mut *tx)
            .await?;

        for ingredient in ingredients.iter().chain(seasonings.iter()) {
            sqlx::query("INSERT INTO food_items (name) VALUES (?) ON CONFLICT(name) DO NOTHING")
                .bind(ingredient)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query("DELETE FROM recipe_dependencies WHERE recipe_name = ?")
            .bind(name)
            .execute(&mut *tx)
            .await?;

        for ingredient in ingredients {
            sqlx::query(
                "INSERT INTO recipe_dependencies (recipe_name, ingredient_name, is_seasoning) VALUES (?, ?, 0)
                 ON CONFLICT(recipe_name, ingredient_name) DO UPDATE SET is_seasoning = 0",
            )
            .bind(name)
            .bind(ingredient)
            .execute(&mut *tx)
            .await?;
        }
        for seasoning in seasonings {
            sqlx::query(
                "INSERT INTO recipe_dependencies (recipe_name, ingredient_name, is_seasoning) VALUES (?, ?, 1)
                 ON CONFLICT(recipe_name, ingredient_name) DO UPDATE SET is_seasoning = 1",
            )
            .bind(name)
            .bind(seasoning)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            r#"
            INSERT INTO recipe_details (recipe_name, cuisine_type, instructions, image_url)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(recipe_name) DO UPDATE SET
                cuisine_type = excluded.cuisine_type,
                instructions = excluded.instructions,
                image_url = excluded.image_url
            "#,
        )
        .bind(name)
        .bind(cuisine.as_str())
        .bind(instructions)
        .bind(image_ref)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(recipe = name, "recipe upserted");
        Ok(())
    }

    /// Transactional delete of details and edges. Orphan food tokens remain
    /// (§3 invariants). Returns whether a recipe actually existed.
    pub async fn delete_recipe(&self, name: &str) -> Result<bool, AppError> {
        let mut tx = self.pool.begin().await?;

        let existed = sqlx::query("SELECT 1 FROM recipe_details WHERE recipe_name = ?")
            .bind(name)
            .fetch_optional(&mut *tx)
            .await?
            .is_some();

        sqlx::query("DELETE FROM recipe_dependencies WHERE recipe_name = ?")
            .bind(name)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM recipe_details WHERE recipe_name = ?")
            .bind(name)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(existed)
    }

    pub async fn get_recipe(&self, name: &str) -> Result<Option<Recipe>, AppError> {
        let detail_row = sqlx::query(
            "SELECT recipe_name, cuisine_type, instructions, image_url FROM recipe_details WHERE recipe_name = ?",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        let Some(detail_row) = detail_row else {
            return Ok(None);
        };

        let dep_rows = sqlx::query(
            "SELECT ingredient_name, is_seasoning FROM recipe_dependencies WHERE recipe_name = ? ORDER BY rowid",
        )
        .bind(name)
        .fetch_all(&self.pool)
        .await?;

        let mut ingredients = Vec::new();
        let mut seasonings = Vec::new();
        for row in dep_rows {
            let ingredient: String = row.get("ingredient_name");
            let is_seasoning: i64 = row.get("is_seasoning");
            if is_seasoning != 0 {
                seasonings.push(ingredient);
            } else {
                ingredients.push(ingredient);
            }
        }

        Ok(Some(Recipe {
            name: detail_row.get("recipe_name"),
            ingredients,
            seasonings,
            cuisine: CuisineType::parse(detail_row.get::<String, _>("cuisine_type").as_str()),
            instructions: detail_row.get("instructions"),
            image_ref: detail_row.get("image_url"),
        }))
    }

    pub async fn list_recipes(&self) -> Result<Vec<Recipe>, AppError> {
        let names: Vec<String> = sqlx::query("SELECT recipe_name FROM recipe_details ORDER BY recipe_name")
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(|row| row.get("recipe_name"))
            .collect();

        let mut recipes = Vec::with_capacity(names.len());
        for name in names {
            if let Some(recipe) = self.get_recipe(&name).await? {
                recipes.push(recipe);
            }
        }
        Ok(recipes)
    }

    /// Non-seasoning ingredient multimap feeding the Cookability Resolver
    /// (§4.2): recipe name paired with its *required* (non-seasoning)
    /// ingredients only.
    pub async fn recipe_requirements(&self) -> Result<Vec<(String, Vec<String>)>, AppError> {
        let rows = sqlx::query(
            "SELECT recipe_name, ingredient_name FROM recipe_dependencies WHERE is_seasoning = 0 ORDER BY recipe_name, rowid",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: Vec<(String, Vec<String>)> = Vec::new();
        for row in rows {
            let recipe_name: String = row.get("recipe_name");
            let ingredient: String = row.get("ingredient_name");
            match grouped.last_mut() {
                Some((name, ingredients)) if name == &recipe_name => ingredients.push(ingredient),
                _ => grouped.push((recipe_name, vec![ingredient])),
            }
        }

        // Recipes with zero required ingredients never show up in the join
        // above; they are trivially cookable (empty requirement set), so
        // surface them too.
        let all_names: Vec<String> = sqlx::query("SELECT recipe_name FROM recipe_details")
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(|row| row.get("recipe_name"))
            .collect();
        for name in all_names {
            if !grouped.iter().any(|(n, _)| n == &name) {
                grouped.push((name, Vec::new()));
            }
        }

        Ok(grouped)
    }

    // ------------------------------------------------------------------
    // Pantry
    // ------------------------------------------------------------------

    pub async fn list_pantry(&self) -> Result<Vec<PantryItem>, AppError> {
        let rows = sqlx::query("SELECT name, quantity, sort_order FROM supplies ORDER BY sort_order, name")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| PantryItem {
                name: row.get("name"),
                quantity: row.get("quantity"),
                sort_order: row.get("sort_order"),
            })
            .collect())
    }

    /// Adds `count` to the item's quantity, inserting it at the end of the
    /// sort order if new.
    pub async fn add_pantry_quantity(&self, name: &str, count: i64) -> Result<(), AppError> {
        let next_order: i64 = sqlx::query("SELECT COALESCE(MAX(sort_order), -1) + 1 AS next FROM supplies")
            .fetch_one(&self.pool)
            .await?
            .get("next");

        sqlx::query(
            "INSERT INTO supplies (name, quantity, sort_order) VALUES (?, ?, ?)
             ON CONFLICT(name) DO UPDATE SET quantity = quantity + excluded.quantity",
        )
        .bind(name)
        .bind(count)
        .bind(next_order)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn set_pantry_quantity(&self, name: &str, count: i64) -> Result<(), AppError> {
        let next_order: i64 = sqlx::query("SELECT COALESCE(MAX(sort_order), -1) + 1 AS next FROM supplies")
            .fetch_one(&self.pool)
            .await?
            .get("next");

        sqlx::query(
            "INSERT INTO supplies (name, quantity, sort_order) VALUES (?, ?, ?)
             ON CONFLICT(name) DO UPDATE SET quantity = excluded.quantity",
        )
        .bind(name)
        .bind(count)
        .bind(next_order)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn set_pantry_bulk(&self, items: &[PantryItem]) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        for item in items {
            sqlx::query(
                "INSERT INTO supplies (name, quantity, sort_order) VALUES (?, ?, ?)
                 ON CONFLICT(name) DO UPDATE SET quantity = excluded.quantity, sort_order = excluded.sort_order",
            )
            .bind(&item.name)
            .bind(item.quantity)
            .bind(item.sort_order)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn set_pantry_order(&self, ordered_names: &[String]) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;
        for (index, name) in ordered_names.iter().enumerate() {
            sqlx::query("UPDATE supplies SET sort_order = ? WHERE name = ?")
                .bind(index as i64)
                .bind(name)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn delete_pantry_item(&self, name: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM supplies WHERE name = ?")
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Ingredient aliases
    // ------------------------------------------------------------------

    pub async fn aliases_for_canonical(&self, canonical: &str) -> Result<Vec<AliasRecord>, AppError> {
        let rows = sqlx::query(
            "SELECT canonical_name, alias, confidence, source, created_at FROM ingredient_aliases
             WHERE canonical_name = ? ORDER BY confidence DESC, created_at DESC",
        )
        .bind(canonical)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(row_to_alias).collect())
    }

    /// All alias rows matching `token` as *either* a canonical self-loop or
    /// an alias, most-confident and most-recent first — the precedence
    /// order IR.resolve needs (§4.1).
    pub async fn find_alias_matches(&self, token: &str) -> Result<Vec<AliasRecord>, AppError> {
        let rows = sqlx::query(
            "SELECT canonical_name, alias, confidence, source, created_at FROM ingredient_aliases
             WHERE alias = ? ORDER BY confidence DESC, created_at DESC",
        )
        .bind(token)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(row_to_alias).collect())
    }

    pub async fn upsert_alias(
        &self,
        canonical: &str,
        alias: &str,
        confidence: f64,
        source: AliasSource,
    ) -> Result<(), AppError> {
        let source_str = match source {
            AliasSource::Seed => "seed",
            AliasSource::Manual => "manual",
            AliasSource::AiGenerated => "ai_generated",
        };
        sqlx::query(
            "INSERT INTO ingredient_aliases (canonical_name, alias, confidence, source, created_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(canonical_name, alias) DO UPDATE SET
                confidence = excluded.confidence,
                source = excluded.source,
                created_at = excluded.created_at",
        )
        .bind(canonical)
        .bind(alias)
        .bind(confidence)
        .bind(source_str)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn row_to_alias(row: sqlx::sqlite::SqliteRow) -> AliasRecord {
    let source = match row.get::<String, _>("source").as_str() {
        "seed" => AliasSource::Seed,
        "ai_generated" => AliasSource::AiGenerated,
        _ => AliasSource::Manual,
    };
    let created_at: String = row.get("created_at");
    AliasRecord {
        canonical: row.get("canonical_name"),
        alias: row.get("alias"),
        confidence: row.get("confidence"),
        source,
        created_at: chrono::DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    }
}
