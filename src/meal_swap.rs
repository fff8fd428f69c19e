// 🔁 Meal Swap - incremental grocery list updates
//
// A swap removes the old recipe's contributions and adds the new one's.
// Every other recipe's contributions stay exactly as they were. Each
// load → mutate → save cycle runs as the only one for its week's list.

use crate::consolidation::{ConsolidationEngine, ExtraItemRequest};
use crate::coordinator::GenerationCoordinator;
use crate::db::GroceryStore;
use crate::error::{GroceryError, Result};
use crate::grocery::{normalize_name, GroceryList};
use crate::recipe::{MealPlan, Recipe, RecipeResolver};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

// ============================================================================
// SWAP EVENT
// ============================================================================

/// A meal-plan mutation replacing one date's recipe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealSwap {
    pub meal_plan_id: String,
    pub week_identifier: String,

    /// `None` when the slot was empty
    #[serde(default)]
    pub old_recipe: Option<String>,

    pub new_recipe: String,

    pub affected_date: NaiveDate,

    /// Other dates in the plan still using the old recipe
    #[serde(default)]
    pub old_recipe_remaining: usize,
}

/// Contribution counts a swap produced
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SwapOutcome {
    /// `None` when the week has no list yet
    pub list_id: Option<String>,
    pub removed: usize,
    pub added: usize,
    pub persisted: bool,
}

/// Apply a swap to a list in memory.
///
/// `old` is removed by name, re-added `old_remaining` times for the dates
/// that keep it, then `new` is added. Returns `(removed, added)`.
pub fn apply_swap(
    engine: &ConsolidationEngine,
    list: &mut GroceryList,
    old: Option<&Recipe>,
    new: &Recipe,
    old_remaining: usize,
) -> (usize, usize) {
    let mut removed = 0;
    let mut added = 0;

    if let Some(old) = old {
        removed = engine.remove_recipe_ingredients(list, &old.name);
        for _ in 0..old_remaining {
            let readded = engine.add_recipe_ingredients(list, old);
            removed = removed.saturating_sub(readded);
        }
    }

    added += engine.add_recipe_ingredients(list, new);
    (removed, added)
}

/// The source name a recipe's contributions were recorded under, ignoring
/// case and spacing
fn stored_source_name(list: &GroceryList, name: &str) -> Option<String> {
    let wanted = normalize_name(name);
    list.items()
        .iter()
        .flat_map(|item| item.recipe_sources.iter())
        .find(|source| normalize_name(source) == wanted)
        .cloned()
}

// ============================================================================
// SERVICE
// ============================================================================

/// Builds, swaps and edits persisted grocery lists
pub struct GroceryListService {
    store: GroceryStore,
    coordinator: GenerationCoordinator,
    engine: ConsolidationEngine,
    resolver: Box<dyn RecipeResolver>,
}

impl GroceryListService {
    pub fn new(
        store: GroceryStore,
        engine: ConsolidationEngine,
        resolver: Box<dyn RecipeResolver>,
    ) -> Self {
        GroceryListService {
            store,
            coordinator: GenerationCoordinator::new(),
            engine,
            resolver,
        }
    }

    pub fn store(&self) -> &GroceryStore {
        &self.store
    }

    pub fn coordinator(&self) -> &GenerationCoordinator {
        &self.coordinator
    }

    pub fn engine(&self) -> &ConsolidationEngine {
        &self.engine
    }

    /// Build the week's list from every planned meal and persist it.
    ///
    /// The id and user items of an existing list for the week are kept.
    /// Meals whose recipe cannot be resolved are skipped.
    pub fn generate_grocery_list(&self, plan: &MealPlan) -> Result<GroceryList> {
        self.coordinator.try_run(&plan.week_identifier, || {
            let recipes: Vec<Recipe> = plan
                .meals
                .iter()
                .filter_map(|meal| {
                    let recipe = self.resolver.resolve(&meal.recipe_name);
                    if recipe.is_none() {
                        warn!(recipe = %meal.recipe_name, date = %meal.date, "skipping unresolved recipe");
                    }
                    recipe
                })
                .collect();

            let mut list = GroceryList::new(&plan.week_identifier);
            if let Some(existing) = self.store.latest_for_week(&plan.week_identifier)? {
                list.id = existing.id.clone();
                list.created_at = existing.created_at;
                list.estimated_total = existing.estimated_total;
                list.adopt_extra_items(existing.extra_items().to_vec());
            }
            list.meal_plan_id = Some(plan.id.clone());

            for recipe in &recipes {
                self.engine.add_recipe_ingredients(&mut list, recipe);
            }

            self.store.save(&mut list, "generated")?;

            info!(
                meal_plan_id = %plan.id,
                week = %plan.week_identifier,
                recipes = recipes.len(),
                items = list.items().len(),
                "generated grocery list"
            );
            Ok(list)
        })
    }

    /// Apply one meal swap to the week's persisted list.
    ///
    /// Fails with `RecipeUnresolved` before touching anything when the new
    /// recipe (or an old recipe that must be re-added) is unknown. A week
    /// without a list succeeds without writing.
    pub fn apply_meal_swap(&self, swap: &MealSwap) -> Result<SwapOutcome> {
        self.coordinator.try_run(&swap.week_identifier, || {
            let new_recipe = self.resolver.resolve(&swap.new_recipe).ok_or_else(|| {
                GroceryError::RecipeUnresolved {
                    recipe: swap.new_recipe.clone(),
                }
            })?;

            let (old_recipe, old_unresolved) = match swap.old_recipe.as_deref() {
                None => (None, None),
                Some(name) => match self.resolver.resolve(name) {
                    Some(recipe) => (Some(recipe), None),
                    None if swap.old_recipe_remaining > 0 => {
                        return Err(GroceryError::RecipeUnresolved {
                            recipe: name.to_string(),
                        });
                    }
                    None => (None, Some(name)),
                },
            };

            let Some(mut list) = self.store.latest_for_week(&swap.week_identifier)? else {
                info!(week = %swap.week_identifier, "no grocery list yet, nothing to update");
                return Ok(SwapOutcome::default());
            };

            // Its contributions are still removable by the name they carry
            let old_recipe = match old_unresolved {
                Some(name) => {
                    let source = stored_source_name(&list, name)
                        .unwrap_or_else(|| name.trim().to_string());
                    warn!(recipe = name, source = %source, "old recipe unresolved, removing by name");
                    Some(Recipe::raw(&source, &[]))
                }
                None => old_recipe,
            };

            let (removed, added) = apply_swap(
                &self.engine,
                &mut list,
                old_recipe.as_ref(),
                &new_recipe,
                swap.old_recipe_remaining,
            );
            if removed == 0 && swap.old_recipe_remaining == 0 {
                if let Some(old) = swap.old_recipe.as_deref() {
                    warn!(recipe = old, list_id = %list.id, "old recipe had no contributions on the list");
                }
            }
            list.meal_plan_id = Some(swap.meal_plan_id.clone());

            let persisted = self.store.save(&mut list, "meal_swap")?;

            info!(
                list_id = %list.id,
                date = %swap.affected_date,
                old = swap.old_recipe.as_deref().unwrap_or("-"),
                new = %swap.new_recipe,
                removed,
                added,
                "applied meal swap"
            );

            Ok(SwapOutcome {
                list_id: Some(list.id),
                removed,
                added,
                persisted,
            })
        })
    }

    /// Load a list and find the key its mutations are serialized under.
    ///
    /// Swaps and generation address lists by week, so every writer locks
    /// the week.
    fn lock_key_for(&self, list_id: &str) -> Result<String> {
        let list = self.store.load(list_id)?.ok_or_else(|| GroceryError::ListNotFound {
            id: list_id.to_string(),
        })?;
        Ok(list.week_identifier)
    }

    /// Run a read-modify-write on one list under its week's lock
    fn edit_list<T>(
        &self,
        list_id: &str,
        reason: &str,
        edit: impl FnOnce(&mut GroceryList) -> T,
    ) -> Result<(GroceryList, T)> {
        let key = self.lock_key_for(list_id)?;

        self.coordinator.try_run(&key, || {
            let mut list = self.store.load(list_id)?.ok_or_else(|| GroceryError::ListNotFound {
                id: list_id.to_string(),
            })?;
            let result = edit(&mut list);
            self.store.save(&mut list, reason)?;
            Ok((list, result))
        })
    }

    /// Add a user item to a persisted list
    pub fn add_extra_item(&self, list_id: &str, request: &ExtraItemRequest) -> Result<GroceryList> {
        let (list, _) = self.edit_list(list_id, "extra_item_added", |list| {
            self.engine.add_extra_item(list, request)
        })?;
        Ok(list)
    }

    /// Remove a user item from a persisted list. Returns whether it existed.
    pub fn remove_extra_item(&self, list_id: &str, name: &str) -> Result<bool> {
        let (_, removed) = self.edit_list(list_id, "extra_item_removed", |list| {
            self.engine.remove_extra_item(list, name)
        })?;
        Ok(removed)
    }

    pub fn get_list(&self, id: &str) -> Result<Option<GroceryList>> {
        self.store.load(id)
    }

    pub fn latest_for_week(&self, week_identifier: &str) -> Result<Option<GroceryList>> {
        self.store.latest_for_week(week_identifier)
    }
}

// ============================================================================
// TESTS
// ============================================================================
