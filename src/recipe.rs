// 📖 Recipes & Meal Plans - the shapes other subsystems hand us
// Recipes come either with structured ingredients or only raw text lines

use crate::error::{GroceryError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

// ============================================================================
// RECIPES
// ============================================================================

/// Structured ingredient as exposed by the recipe subsystem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    pub name: String,
    #[serde(default)]
    pub quantity: String,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub category: String,
}

impl Ingredient {
    pub fn new(name: &str, quantity: &str, unit: &str) -> Self {
        Ingredient {
            name: name.to_string(),
            quantity: quantity.to_string(),
            unit: unit.to_string(),
            category: String::new(),
        }
    }
}

/// What a recipe can tell us about its ingredients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecipeIngredients {
    /// `get_ingredients()` is available
    Structured(Vec<Ingredient>),

    /// Only `ingredients_raw` lines, to be parsed
    RawText(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RecipeRecord", into = "RecipeRecord")]
pub struct Recipe {
    pub name: String,
    pub ingredients: RecipeIngredients,
}

impl Recipe {
    pub fn structured(name: &str, ingredients: Vec<Ingredient>) -> Self {
        Recipe {
            name: name.to_string(),
            ingredients: RecipeIngredients::Structured(ingredients),
        }
    }

    pub fn raw(name: &str, lines: &[&str]) -> Self {
        Recipe {
            name: name.to_string(),
            ingredients: RecipeIngredients::RawText(
                lines.iter().map(|l| l.to_string()).collect(),
            ),
        }
    }

    pub fn ingredient_count(&self) -> usize {
        match &self.ingredients {
            RecipeIngredients::Structured(list) => list.len(),
            RecipeIngredients::RawText(lines) => lines.len(),
        }
    }
}

/// On-disk recipe shape: structured `ingredients` win over `ingredients_raw`
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RecipeRecord {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ingredients: Option<Vec<Ingredient>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    ingredients_raw: Vec<String>,
}

impl From<RecipeRecord> for Recipe {
    fn from(record: RecipeRecord) -> Self {
        let ingredients = match record.ingredients {
            Some(list) if !list.is_empty() => RecipeIngredients::Structured(list),
            _ => RecipeIngredients::RawText(record.ingredients_raw),
        };
        Recipe {
            name: record.name,
            ingredients,
        }
    }
}

impl From<Recipe> for RecipeRecord {
    fn from(recipe: Recipe) -> Self {
        match recipe.ingredients {
            RecipeIngredients::Structured(list) => RecipeRecord {
                name: recipe.name,
                ingredients: Some(list),
                ingredients_raw: Vec::new(),
            },
            RecipeIngredients::RawText(lines) => RecipeRecord {
                name: recipe.name,
                ingredients: None,
                ingredients_raw: lines,
            },
        }
    }
}

// ============================================================================
// RESOLUTION
// ============================================================================

/// RecipeResolver - the recipe subsystem as seen from here
pub trait RecipeResolver: Send + Sync {
    /// Fully resolve a recipe by name, `None` if unknown
    fn resolve(&self, name: &str) -> Option<Recipe>;
}

/// In-memory recipe store keyed by case-insensitive name
#[derive(Debug, Clone, Default)]
pub struct RecipeBook {
    recipes: HashMap<String, Recipe>,
}

impl RecipeBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_recipes(recipes: Vec<Recipe>) -> Self {
        let mut book = RecipeBook::new();
        for recipe in recipes {
            book.insert(recipe);
        }
        book
    }

    /// Load a JSON array of recipes
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        let recipes: Vec<Recipe> = serde_json::from_str(&content)?;
        Ok(RecipeBook::from_recipes(recipes))
    }

    pub fn insert(&mut self, recipe: Recipe) {
        self.recipes
            .insert(recipe.name.trim().to_lowercase(), recipe);
    }

    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }
}

impl RecipeResolver for RecipeBook {
    fn resolve(&self, name: &str) -> Option<Recipe> {
        self.recipes.get(&name.trim().to_lowercase()).cloned()
    }
}

// ============================================================================
// MEAL PLANS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedMeal {
    pub date: NaiveDate,
    #[serde(default)]
    pub meal_type: String,
    pub recipe_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealPlan {
    pub id: String,
    pub week_identifier: String,
    pub meals: Vec<PlannedMeal>,
}

impl MealPlan {
    /// How many planned meals use this recipe
    pub fn occurrences_of(&self, recipe_name: &str) -> usize {
        let wanted = recipe_name.trim().to_lowercase();
        self.meals
            .iter()
            .filter(|m| m.recipe_name.trim().to_lowercase() == wanted)
            .count()
    }
}

#[derive(Debug, Deserialize)]
struct PlannedMealRow {
    date: String,
    #[serde(default)]
    meal_type: String,
    recipe: String,
}

/// Load a meal plan from CSV with header `date,meal_type,recipe`
pub fn load_meal_plan_csv(csv_path: &Path, plan_id: &str, week_identifier: &str) -> Result<MealPlan> {
    let mut rdr = csv::Reader::from_path(csv_path)?;

    let mut meals = Vec::new();

    for result in rdr.deserialize() {
        let row: PlannedMealRow = result?;

        let date = NaiveDate::parse_from_str(row.date.trim(), "%Y-%m-%d").map_err(|e| {
            GroceryError::Config {
                message: format!("Invalid date '{}' in meal plan: {}", row.date, e),
            }
        })?;

        if row.recipe.trim().is_empty() {
            continue;
        }

        meals.push(PlannedMeal {
            date,
            meal_type: row.meal_type.trim().to_string(),
            recipe_name: row.recipe.trim().to_string(),
        });
    }

    Ok(MealPlan {
        id: plan_id.to_string(),
        week_identifier: week_identifier.to_string(),
        meals,
    })
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_recipe_json_prefers_structured() {
        let json = r#"[
            {"name": "Tacos",
             "ingredients": [{"name": "ground beef", "quantity": "1", "unit": "lb"}],
             "ingredients_raw": ["1 lb ground beef"]},
            {"name": "Salad", "ingredients_raw": ["1 head lettuce"]},
            {"name": "Toast", "ingredients": [], "ingredients_raw": ["2 slices bread"]}
        ]"#;

        let recipes: Vec<Recipe> = serde_json::from_str(json).unwrap();

        assert!(matches!(recipes[0].ingredients, RecipeIngredients::Structured(_)));
        assert!(matches!(recipes[1].ingredients, RecipeIngredients::RawText(_)));
        // Empty structured list falls back to raw lines
        assert_eq!(
            recipes[2].ingredients,
            RecipeIngredients::RawText(vec!["2 slices bread".to_string()])
        );
    }

    #[test]
    fn test_recipe_book_resolves_case_insensitively() {
        let book = RecipeBook::from_recipes(vec![Recipe::raw("Chicken Curry", &["1 lb chicken"])]);

        assert!(book.resolve("chicken curry").is_some());
        assert!(book.resolve("  CHICKEN CURRY ").is_some());
        assert!(book.resolve("Pad Thai").is_none());
        assert_eq!(book.len(), 1);
    }

    #[test]
    fn test_load_meal_plan_csv() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "date,meal_type,recipe").unwrap();
        writeln!(file, "2025-11-04,dinner,Tacos").unwrap();
        writeln!(file, "2025-11-05,dinner,").unwrap();
        writeln!(file, "2025-11-06,lunch,Tacos").unwrap();

        let plan = load_meal_plan_csv(file.path(), "plan-1", "2025-11-04").unwrap();

        assert_eq!(plan.meals.len(), 2);
        assert_eq!(plan.meals[0].recipe_name, "Tacos");
        assert_eq!(plan.occurrences_of("tacos"), 2);
    }

    #[test]
    fn test_load_meal_plan_csv_rejects_bad_date() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "date,meal_type,recipe").unwrap();
        writeln!(file, "11/04/2025,dinner,Tacos").unwrap();

        let err = load_meal_plan_csv(file.path(), "plan-1", "2025-11-04").unwrap_err();
        assert!(matches!(err, GroceryError::Config { .. }));
    }
}
