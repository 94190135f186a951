//! SQLite-backed recipe storage and eager graph loading.
//!
//! [`Database::fetch_recipes`] materializes the whole recipe graph in a fixed
//! number of round-trips: one query for recipes, one for all of their
//! ingredients, one for every food those ingredients reference. Related rows
//! are loaded in bulk, never one row at a time: the parent ids travel as a
//! single JSON array parameter expanded with `json_each`, so neither the
//! round-trip count nor the number of bound variables grows with the data.
//!
//! Every statement a fetch executes is recorded into a caller-supplied
//! [`QueryLog`].

use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::{Connection, params};
use thiserror::Error;

use crate::model::{Amount, Food, Ingredient, Recipe};

mod query_log;
mod seed;

pub use query_log::QueryLog;
pub use seed::seed_demo;

/// Errors produced by the database layer.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("database connection lock was poisoned")]
    Poisoned,

    #[error("ingredient {ingredient_id} references missing food {food_id}")]
    DanglingFood { ingredient_id: i64, food_id: i64 },

    #[error("ingredient {ingredient_id} has an out-of-range amount ({raw} thousandths)")]
    InvalidAmount { ingredient_id: i64, raw: u32 },

    #[error("failed to encode id list: {0}")]
    IdList(#[from] serde_json::Error),

    #[error("invalid seed data: {0}")]
    InvalidSeed(String),
}

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS food (
        id   INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL CHECK (length(name) <= 255)
    );
    CREATE TABLE IF NOT EXISTS recipe (
        id   INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL CHECK (length(name) <= 255)
    );
    CREATE TABLE IF NOT EXISTS ingredient (
        id              INTEGER PRIMARY KEY AUTOINCREMENT,
        recipe_id       INTEGER NOT NULL REFERENCES recipe (id) ON DELETE CASCADE,
        food_id         INTEGER NOT NULL REFERENCES food (id) ON DELETE CASCADE,
        amount          INTEGER NOT NULL CHECK (amount BETWEEN 0 AND 999999),
        unit_of_measure TEXT NOT NULL CHECK (length(unit_of_measure) <= 255)
    );
    CREATE INDEX IF NOT EXISTS ingredient_recipe_id ON ingredient (recipe_id);
    CREATE INDEX IF NOT EXISTS ingredient_food_id ON ingredient (food_id);
";

const SELECT_RECIPES: &str = "SELECT id, name FROM recipe ORDER BY id";

const SELECT_INGREDIENTS: &str = "SELECT id, recipe_id, food_id, amount, unit_of_measure \
     FROM ingredient WHERE recipe_id IN (SELECT value FROM json_each(?1)) ORDER BY id";

const SELECT_FOODS: &str =
    "SELECT id, name FROM food WHERE id IN (SELECT value FROM json_each(?1)) ORDER BY id";

// Raw ingredient row before its food is resolved.
struct IngredientRow {
    id: i64,
    recipe_id: i64,
    food_id: i64,
    amount: u32,
    unit_of_measure: String,
}

/// Handle to the recipe database.
///
/// Cheap to clone; all clones share one connection. Methods block the calling
/// thread, so async callers should run them on the blocking pool.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Opens (or creates) the database file at `path` and applies the schema.
    ///
    /// SQLite's `:memory:` path yields a private in-memory database.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DatabaseError> {
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, DatabaseError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, DatabaseError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.migrate()?;
        Ok(db)
    }

    /// Creates the `food`, `recipe` and `ingredient` tables if they are missing.
    pub fn migrate(&self) -> Result<(), DatabaseError> {
        self.lock()?.execute_batch(SCHEMA)?;
        Ok(())
    }

    pub fn insert_food(&self, name: &str) -> Result<Food, DatabaseError> {
        let conn = self.lock()?;
        conn.execute("INSERT INTO food (name) VALUES (?1)", params![name])?;
        Ok(Food {
            id: conn.last_insert_rowid(),
            name: name.to_owned(),
        })
    }

    /// Inserts a recipe with no ingredients and returns its id.
    pub fn insert_recipe(&self, name: &str) -> Result<i64, DatabaseError> {
        let conn = self.lock()?;
        conn.execute("INSERT INTO recipe (name) VALUES (?1)", params![name])?;
        Ok(conn.last_insert_rowid())
    }

    /// Adds an ingredient line to a recipe and returns its id.
    pub fn insert_ingredient(
        &self,
        recipe_id: i64,
        food_id: i64,
        amount: Amount,
        unit_of_measure: &str,
    ) -> Result<i64, DatabaseError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO ingredient (recipe_id, food_id, amount, unit_of_measure)
             VALUES (?1, ?2, ?3, ?4)",
            params![recipe_id, food_id, amount.thousandths(), unit_of_measure],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn count_recipes(&self) -> Result<usize, DatabaseError> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM recipe", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }

    /// Loads every recipe with its ingredients and their foods.
    ///
    /// Returns the graph together with the number of round-trips this call
    /// made. Each statement is also recorded into `log`.
    ///
    /// With at least one recipe and one ingredient this is always three
    /// round-trips. Stages with no parent rows are skipped, so an empty
    /// recipe table costs a single query.
    ///
    /// # Errors
    ///
    /// Any SQLite failure is returned as-is; nothing is retried.
    pub fn fetch_recipes(&self, log: &QueryLog) -> Result<(Vec<Recipe>, usize), DatabaseError> {
        let conn = self.lock()?;
        let mut round_trips = 0;

        let mut stmt = conn.prepare(SELECT_RECIPES)?;
        let recipe_rows = stmt
            .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        log.record(SELECT_RECIPES);
        round_trips += 1;

        if recipe_rows.is_empty() {
            return Ok((Vec::new(), round_trips));
        }

        let recipe_ids: Vec<i64> = recipe_rows.iter().map(|(id, _)| *id).collect();
        let mut stmt = conn.prepare(SELECT_INGREDIENTS)?;
        let ingredient_rows = stmt
            .query_map(params![serde_json::to_string(&recipe_ids)?], |row| {
                Ok(IngredientRow {
                    id: row.get(0)?,
                    recipe_id: row.get(1)?,
                    food_id: row.get(2)?,
                    amount: row.get(3)?,
                    unit_of_measure: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        log.record(SELECT_INGREDIENTS);
        round_trips += 1;

        let food_ids: BTreeSet<i64> = ingredient_rows.iter().map(|row| row.food_id).collect();
        let mut foods: HashMap<i64, Arc<Food>> = HashMap::with_capacity(food_ids.len());
        if !food_ids.is_empty() {
            let mut stmt = conn.prepare(SELECT_FOODS)?;
            let rows = stmt.query_map(params![serde_json::to_string(&food_ids)?], |row| {
                Ok(Food {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })?;
            for food in rows {
                let food = food?;
                foods.insert(food.id, Arc::new(food));
            }
            log.record(SELECT_FOODS);
            round_trips += 1;
        }

        let mut by_recipe: HashMap<i64, Vec<Ingredient>> = HashMap::new();
        for row in ingredient_rows {
            let food = foods
                .get(&row.food_id)
                .cloned()
                .ok_or(DatabaseError::DanglingFood {
                    ingredient_id: row.id,
                    food_id: row.food_id,
                })?;
            let amount = Amount::from_thousandths(row.amount).ok_or(DatabaseError::InvalidAmount {
                ingredient_id: row.id,
                raw: row.amount,
            })?;
            by_recipe.entry(row.recipe_id).or_default().push(Ingredient {
                id: row.id,
                food,
                amount,
                unit_of_measure: row.unit_of_measure,
            });
        }

        let recipes = recipe_rows
            .into_iter()
            .map(|(id, name)| Recipe {
                id,
                name,
                ingredients: by_recipe.remove(&id).unwrap_or_default(),
            })
            .collect();

        Ok((recipes, round_trips))
    }

    #[cfg(test)]
    pub(crate) fn execute_raw(&self, sql: &str) -> Result<(), DatabaseError> {
        self.lock()?.execute_batch(sql)?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, DatabaseError> {
        self.conn.lock().map_err(|_| DatabaseError::Poisoned)
    }
}
