// Grocery List - Core Library
// Meal plan → consolidated, store-organized shopping list with per-recipe provenance

pub mod error;
pub mod parser;
pub mod rules;          // Ingredient → store section
pub mod recipe;
pub mod grocery;        // Contribution ledger + list model
pub mod consolidation;
pub mod meal_swap;      // Incremental updates + generation
pub mod coordinator;
pub mod db;
pub mod config;
pub mod logging;

// Re-export commonly used types
pub use error::{GroceryError, Result};
pub use parser::{parse_amount, parse_ingredient_line, ParsedIngredient};
pub use rules::{categorize, section_rank, Categorizer, CategoryRule, DEFAULT_CATEGORY};
pub use recipe::{
    load_meal_plan_csv, Ingredient, MealPlan, PlannedMeal,
    Recipe, RecipeBook, RecipeIngredients, RecipeResolver,
};
pub use grocery::{
    aggregate_quantity, format_amount,
    GroceryItem, GroceryList, IngredientContribution,
    LEGACY_SOURCE, USER_SOURCE,
};
pub use consolidation::{ConsolidationEngine, ExtraItemRequest};
pub use meal_swap::{apply_swap, GroceryListService, MealSwap, SwapOutcome};
pub use coordinator::GenerationCoordinator;
pub use db::{
    Event, GroceryStore,
    setup_database, save_grocery_list, get_grocery_list,
    get_latest_grocery_list_for_week, migrate_legacy_lists,
    insert_event, get_events_for_entity,
};
pub use config::{GroceryConfig, LogConfig};
pub use logging::init_logger;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
