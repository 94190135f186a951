//! Demo data: two recipes whose ingredients share foods.

use super::{Database, DatabaseError};
use crate::model::Amount;

const FOODS: &[&str] = &["Flour", "Sugar", "Salt", "Butter", "Milk", "Eggs"];

const RECIPES: &[RecipeData] = &[
    (
        "Pancakes",
        &[
            ("Flour", "1.5", "cup"),
            ("Sugar", "2", "tbsp"),
            ("Salt", "0.5", "tsp"),
            ("Milk", "1.25", "cup"),
            ("Eggs", "1", "whole"),
        ],
    ),
    (
        "Shortbread",
        &[
            ("Flour", "2", "cup"),
            ("Sugar", "0.5", "cup"),
            ("Salt", "0.125", "tsp"),
            ("Butter", "1", "cup"),
        ],
    ),
];

// (recipe, [(food, amount, unit)])
type RecipeData = (&'static str, &'static [(&'static str, &'static str, &'static str)]);

/// Seeds the demo cookbook unless the store already holds recipes.
///
/// Returns the number of recipes inserted.
pub fn seed_demo(db: &Database) -> Result<usize, DatabaseError> {
    seed_with(db, FOODS, RECIPES)
}

// A line naming an unlisted food or carrying a malformed amount is an error.
fn seed_with(
    db: &Database,
    foods: &[&str],
    recipes: &[RecipeData],
) -> Result<usize, DatabaseError> {
    if db.count_recipes()? > 0 {
        tracing::debug!("recipes already present, skipping demo seed");
        return Ok(0);
    }

    let mut inserted = Vec::with_capacity(foods.len());
    for name in foods {
        inserted.push(db.insert_food(name)?);
    }

    for (recipe, lines) in recipes {
        let recipe_id = db.insert_recipe(recipe)?;
        for (food_name, amount, unit) in *lines {
            let food = inserted
                .iter()
                .find(|food| food.name == *food_name)
                .ok_or_else(|| {
                    DatabaseError::InvalidSeed(format!("{recipe} uses unknown food {food_name:?}"))
                })?;
            let amount: Amount = amount.parse().map_err(|e| {
                DatabaseError::InvalidSeed(format!("{recipe}: {food_name} amount {amount:?}: {e}"))
            })?;
            db.insert_ingredient(recipe_id, food.id, amount, unit)?;
        }
    }

    tracing::info!(recipes = recipes.len(), foods = foods.len(), "seeded demo cookbook");
    Ok(recipes.len())
}
