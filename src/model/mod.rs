//! Cookbook domain types: [`Recipe`], [`Ingredient`], [`Food`] and the
//! [`IngredientLine`] display form.
//!
//! A recipe exclusively owns its ingredients. Each ingredient points at a
//! [`Food`] through an [`Arc`], so every ingredient referring to the same food
//! within one fetched graph shares a single allocation. Equality is by value,
//! which is what a snapshot read back from the cache is compared on.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

mod amount;

pub use amount::{Amount, AmountError};

/// A named lookup entity referenced by many ingredients.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Food {
    pub id: i64,
    pub name: String,
}

impl fmt::Display for Food {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// One line of a recipe: a quantity of a food.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ingredient {
    pub id: i64,
    pub food: Arc<Food>,
    pub amount: Amount,
    /// Free-form unit, e.g. `tsp`, `tbsp`, `cup`.
    pub unit_of_measure: String,
}

impl fmt::Display for Ingredient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.amount, self.unit_of_measure, self.food)
    }
}

/// A named recipe and its ingredients, ordered by ingredient id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: i64,
    pub name: String,
    pub ingredients: Vec<Ingredient>,
}

impl Recipe {
    /// Ingredient lines that name their recipe, e.g. `Pancakes: 1.500 cup Flour`.
    pub fn lines(&self) -> impl Iterator<Item = IngredientLine<'_>> {
        self.ingredients.iter().map(move |ingredient| IngredientLine {
            recipe: self,
            ingredient,
        })
    }
}

impl fmt::Display for Recipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// An [`Ingredient`] shown together with the recipe that owns it.
#[derive(Debug, Clone, Copy)]
pub struct IngredientLine<'a> {
    pub recipe: &'a Recipe,
    pub ingredient: &'a Ingredient,
}

impl fmt::Display for IngredientLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.recipe, self.ingredient)
    }
}
