// 🧮 Consolidation Engine - merge recipe ingredients into one shopping list
//
// Summation is the only mutation: adding a recipe appends contributions,
// removing it deletes exactly those contributions again. An add followed by
// a remove under the same source name restores the list, in any order.

use crate::grocery::{GroceryItem, GroceryList, IngredientContribution, USER_SOURCE};
use crate::parser::{parse_ingredient_line, split_leading_quantity};
use crate::recipe::{Recipe, RecipeIngredients};
use crate::rules::{Categorizer, DEFAULT_CATEGORY};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A user-entered item for `extra_items`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtraItemRequest {
    pub name: String,
    #[serde(default)]
    pub quantity: String,
    #[serde(default)]
    pub category: Option<String>,
}

impl ExtraItemRequest {
    pub fn new(name: &str, quantity: &str) -> Self {
        ExtraItemRequest {
            name: name.to_string(),
            quantity: quantity.to_string(),
            category: None,
        }
    }

    pub fn with_category(mut self, category: &str) -> Self {
        self.category = Some(category.to_string());
        self
    }
}

/// One ingredient line, whichever way the recipe exposed it
#[derive(Debug, Clone)]
struct IngredientLine {
    name: String,
    quantity: String,
    unit: String,
    category_hint: Option<String>,
}

fn ingredient_lines(recipe: &Recipe) -> Vec<IngredientLine> {
    match &recipe.ingredients {
        RecipeIngredients::Structured(ingredients) => ingredients
            .iter()
            .filter(|i| !i.name.trim().is_empty())
            .map(|i| IngredientLine {
                name: i.name.trim().to_string(),
                quantity: i.quantity.trim().to_string(),
                unit: i.unit.trim().to_string(),
                category_hint: Some(i.category.trim().to_lowercase())
                    .filter(|c| !c.is_empty()),
            })
            .collect(),
        RecipeIngredients::RawText(lines) => lines
            .iter()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                let parsed = parse_ingredient_line(line);
                IngredientLine {
                    name: parsed.name,
                    quantity: parsed.quantity,
                    unit: parsed.unit,
                    category_hint: None,
                }
            })
            .collect(),
    }
}

// ============================================================================
// CONSOLIDATION ENGINE
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct ConsolidationEngine {
    categorizer: Categorizer,
}

impl ConsolidationEngine {
    pub fn new(categorizer: Categorizer) -> Self {
        ConsolidationEngine { categorizer }
    }

    pub fn categorizer(&self) -> &Categorizer {
        &self.categorizer
    }

    /// Category for a brand new item. Recipe hints only fill in for "other".
    fn category_for(&self, name: &str, hint: Option<&str>) -> String {
        let category = self.categorizer.categorize(name);
        match hint {
            Some(hint) if category == DEFAULT_CATEGORY => hint.to_string(),
            _ => category,
        }
    }

    /// Add a recipe's ingredients under the recipe's own name
    pub fn add_recipe_ingredients(&self, list: &mut GroceryList, recipe: &Recipe) -> usize {
        self.add_recipe_ingredients_as(list, recipe, &recipe.name)
    }

    /// Add a recipe's ingredients under an explicit source name.
    ///
    /// Returns the number of contributions appended.
    pub fn add_recipe_ingredients_as(
        &self,
        list: &mut GroceryList,
        recipe: &Recipe,
        source_name: &str,
    ) -> usize {
        let lines = ingredient_lines(recipe);

        let added = list.edit_items(|items| {
            let mut added = 0;
            for line in &lines {
                let contribution = IngredientContribution::new(source_name, &line.quantity, &line.unit);

                match items.iter_mut().find(|item| item.matches_name(&line.name)) {
                    Some(item) => item.add_contribution(contribution),
                    None => {
                        let category = self.category_for(&line.name, line.category_hint.as_deref());
                        let mut item = GroceryItem::new(&line.name, &category);
                        item.add_contribution(contribution);
                        items.push(item);
                    }
                }
                added += 1;
            }
            added
        });

        debug!(source = source_name, contributions = added, "added recipe ingredients");
        added
    }

    /// Remove every contribution made under `source_name`.
    ///
    /// Items left without contributions disappear. Returns the number of
    /// contributions removed; zero when the source never contributed.
    pub fn remove_recipe_ingredients(&self, list: &mut GroceryList, source_name: &str) -> usize {
        let removed = list.edit_items(|items| {
            items
                .iter_mut()
                .map(|item| item.remove_source(source_name))
                .sum::<usize>()
        });

        debug!(source = source_name, contributions = removed, "removed recipe ingredients");
        removed
    }

    /// Append a user item to `extra_items`, merging by name.
    ///
    /// Returns false for a blank name.
    pub fn add_extra_item(&self, list: &mut GroceryList, request: &ExtraItemRequest) -> bool {
        let name = request.name.trim();
        if name.is_empty() {
            return false;
        }

        let quantity = request.quantity.trim();
        let (quantity, unit) = match split_leading_quantity(quantity) {
            Some((q, u, rest)) if rest.is_empty() => (q, u),
            _ => (quantity.to_string(), String::new()),
        };
        let contribution = IngredientContribution::new(USER_SOURCE, &quantity, &unit);

        list.edit_extra_items(|extra| {
            match extra.iter_mut().find(|item| item.matches_name(name)) {
                Some(item) => item.add_contribution(contribution),
                None => {
                    let category = match &request.category {
                        Some(c) if !c.trim().is_empty() => c.trim().to_string(),
                        _ => self.categorizer.categorize(name),
                    };
                    let mut item = GroceryItem::new(name, &category);
                    item.add_contribution(contribution);
                    extra.push(item);
                }
            }
        });

        true
    }

    /// Delete a user item by name. Returns whether one was found.
    pub fn remove_extra_item(&self, list: &mut GroceryList, name: &str) -> bool {
        list.edit_extra_items(|extra| {
            let before = extra.len();
            extra.retain(|item| !item.matches_name(name));
            extra.len() != before
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::Ingredient;

    fn recipe_a() -> Recipe {
        Recipe::raw("RecipeA", &["2 lbs chicken breast", "1 tbsp olive oil"])
    }

    fn recipe_b() -> Recipe {
        Recipe::raw("RecipeB", &["1 lb pasta", "1 tbsp olive oil"])
    }

    #[test]
    fn test_weekly_scenario() {
        let engine = ConsolidationEngine::default();
        let mut list = GroceryList::new("2025-11-04");

        engine.add_recipe_ingredients(&mut list, &recipe_a());
        engine.add_recipe_ingredients(&mut list, &recipe_b());

        assert_eq!(list.items().len(), 3);

        let chicken = list.find_item("chicken breast").unwrap();
        assert_eq!(chicken.display_quantity, "2 lbs");
        assert_eq!(chicken.contributions.len(), 1);
        assert_eq!(chicken.category, "meat");

        let oil = list.find_item("olive oil").unwrap();
        assert_eq!(oil.display_quantity, "2 tbsp");
        assert_eq!(oil.contributions.len(), 2);
        assert_eq!(oil.category, "pantry");

        let pasta = list.find_item("pasta").unwrap();
        assert_eq!(pasta.display_quantity, "1 lb");
        assert_eq!(pasta.contributions.len(), 1);

        let removed = engine.remove_recipe_ingredients(&mut list, "RecipeA");
        assert_eq!(removed, 2);

        assert!(list.find_item("chicken breast").is_none());
        let oil = list.find_item("olive oil").unwrap();
        assert_eq!(oil.display_quantity, "1 tbsp");
        assert_eq!(oil.recipe_sources, vec!["RecipeB"]);
        assert_eq!(list.find_item("pasta").unwrap().display_quantity, "1 lb");
        assert_eq!(list.items().len(), 2);

        println!("✅ Weekly consolidation scenario PASSED");
    }

    #[test]
    fn test_add_then_remove_restores_list() {
        let engine = ConsolidationEngine::default();
        let mut list = GroceryList::new("2025-11-04");
        engine.add_recipe_ingredients(&mut list, &recipe_b());
        engine.add_extra_item(&mut list, &ExtraItemRequest::new("paper towels", "1"));
        let before = list.clone();

        engine.add_recipe_ingredients_as(&mut list, &recipe_a(), "Tuesday dinner");
        assert_ne!(list, before);

        engine.remove_recipe_ingredients(&mut list, "Tuesday dinner");
        assert_eq!(list, before);
    }

    #[test]
    fn test_remove_unknown_source_is_noop() {
        let engine = ConsolidationEngine::default();
        let mut list = GroceryList::new("2025-11-04");
        engine.add_recipe_ingredients(&mut list, &recipe_a());
        let before = list.clone();

        assert_eq!(engine.remove_recipe_ingredients(&mut list, "Nobody"), 0);
        assert_eq!(list, before);
    }

    #[test]
    fn test_names_merge_case_insensitively() {
        let engine = ConsolidationEngine::default();
        let mut list = GroceryList::new("2025-11-04");

        engine.add_recipe_ingredients(&mut list, &Recipe::raw("A", &["1 cup Olive  Oil"]));
        engine.add_recipe_ingredients(&mut list, &Recipe::raw("B", &["1 cup olive oil "]));

        assert_eq!(list.items().len(), 1);
        // First spelling wins
        assert_eq!(list.items()[0].name, "Olive Oil");
        assert_eq!(list.items()[0].display_quantity, "2 cup");
    }

    #[test]
    fn test_cross_unit_contributions_count() {
        let engine = ConsolidationEngine::default();
        let mut list = GroceryList::new("2025-11-04");

        engine.add_recipe_ingredients(&mut list, &Recipe::raw("Bread", &["2 cups flour"]));
        engine.add_recipe_ingredients(&mut list, &Recipe::raw("Cake", &["100 g flour"]));

        assert_eq!(list.find_item("flour").unwrap().display_quantity, "2x");
    }

    #[test]
    fn test_category_fixed_at_creation() {
        let engine = ConsolidationEngine::new(Categorizer::from_rules(vec![]));
        let mut list = GroceryList::new("2025-11-04");

        let first = Recipe::structured(
            "Stir fry",
            vec![Ingredient {
                category: "International".to_string(),
                ..Ingredient::new("tofu", "1", "block")
            }],
        );
        let second = Recipe::structured(
            "Soup",
            vec![Ingredient {
                category: "refrigerated".to_string(),
                ..Ingredient::new("tofu", "1", "block")
            }],
        );

        engine.add_recipe_ingredients(&mut list, &first);
        engine.add_recipe_ingredients(&mut list, &second);

        let tofu = list.find_item("tofu").unwrap();
        assert_eq!(tofu.category, "international");
        assert_eq!(tofu.display_quantity, "2 block");
    }

    #[test]
    fn test_structured_ingredients_skip_parsing() {
        let engine = ConsolidationEngine::default();
        let mut list = GroceryList::new("2025-11-04");
        let recipe = Recipe::structured(
            "Smoothie",
            vec![
                Ingredient::new("banana", "1 1/2", ""),
                Ingredient::new("  ", "1", "cup"),
            ],
        );

        assert_eq!(engine.add_recipe_ingredients(&mut list, &recipe), 1);
        let banana = list.find_item("banana").unwrap();
        assert_eq!(banana.contributions[0].numeric_amount, 1.5);
        assert_eq!(banana.category, "produce");
    }

    #[test]
    fn test_degraded_lines_still_contribute() {
        let engine = ConsolidationEngine::default();
        let mut list = GroceryList::new("2025-11-04");

        engine.add_recipe_ingredients(&mut list, &Recipe::raw("A", &["salt to taste", ""]));
        engine.add_recipe_ingredients(&mut list, &Recipe::raw("B", &["salt to taste"]));

        let salt = list.find_item("salt to taste").unwrap();
        assert_eq!(salt.contributions.len(), 2);
        assert_eq!(salt.display_quantity, "2x");
        assert_eq!(salt.category, "spices");
    }

    #[test]
    fn test_extra_items_are_separate_from_recipes() {
        let engine = ConsolidationEngine::default();
        let mut list = GroceryList::new("2025-11-04");

        engine.add_recipe_ingredients(&mut list, &recipe_a());
        assert!(engine.add_extra_item(&mut list, &ExtraItemRequest::new("olive oil", "1 bottle")));
        assert!(engine.add_extra_item(
            &mut list,
            &ExtraItemRequest::new("dish soap", "").with_category("cleaning")
        ));
        assert!(!engine.add_extra_item(&mut list, &ExtraItemRequest::new("  ", "1")));

        engine.remove_recipe_ingredients(&mut list, "RecipeA");

        assert!(list.items().is_empty());
        assert_eq!(list.extra_items().len(), 2);
        let oil = list.find_extra_item("olive oil").unwrap();
        assert_eq!(oil.display_quantity, "1 bottle");
        assert_eq!(oil.recipe_sources, vec![USER_SOURCE]);
        assert_eq!(list.find_extra_item("dish soap").unwrap().category, "cleaning");
        assert!(list.store_sections().contains_key("cleaning"));

        assert!(engine.remove_extra_item(&mut list, "OLIVE OIL"));
        assert!(!engine.remove_extra_item(&mut list, "olive oil"));
        assert_eq!(list.extra_items().len(), 1);
    }

    #[test]
    fn test_store_sections_follow_mutations() {
        let engine = ConsolidationEngine::default();
        let mut list = GroceryList::new("2025-11-04");

        engine.add_recipe_ingredients(&mut list, &recipe_a());
        assert!(list.store_sections().contains_key("meat"));

        engine.remove_recipe_ingredients(&mut list, "RecipeA");
        assert!(list.store_sections().is_empty());
    }
}
