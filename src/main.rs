use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use std::env;
use std::path::Path;

use grocery_list::{
    init_logger, load_meal_plan_csv, Categorizer, ConsolidationEngine, ExtraItemRequest,
    GroceryConfig, GroceryList, GroceryListService, GroceryStore, MealSwap, RecipeBook,
};

const USAGE: &str = "\
Usage:
  grocery-list generate <plan.csv> <recipes.json> <week> <plan-id>
  grocery-list swap <plan.csv> <recipes.json> <week> <plan-id> <date> <new-recipe>
  grocery-list show <week>
  grocery-list add-extra <list-id> <name> <quantity> [category]
  grocery-list remove-extra <list-id> <name>
  grocery-list migrate";

fn main() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    let config = GroceryConfig::load().context("Failed to load configuration")?;
    init_logger(&config.logging);

    match args.get(1).map(String::as_str) {
        Some("generate") if args.len() == 6 => {
            run_generate(&config, &args[2], &args[3], &args[4], &args[5])
        }
        Some("swap") if args.len() == 8 => run_swap(&config, &args[2..]),
        Some("show") if args.len() == 3 => run_show(&config, &args[2]),
        Some("add-extra") if args.len() == 5 || args.len() == 6 => {
            let mut request = ExtraItemRequest::new(&args[3], &args[4]);
            if let Some(category) = args.get(5) {
                request = request.with_category(category);
            }
            run_add_extra(&config, &args[2], &request)
        }
        Some("remove-extra") if args.len() == 4 => run_remove_extra(&config, &args[2], &args[3]),
        Some("migrate") => run_migrate(&config),
        _ => {
            eprintln!("{}", USAGE);
            std::process::exit(2);
        }
    }
}

fn open_service(config: &GroceryConfig, recipes: RecipeBook) -> Result<GroceryListService> {
    let db_path = &config.storage.database_path;
    let store = GroceryStore::open(db_path)
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;

    let categorizer = match &config.categories.rules_path {
        Some(path) => Categorizer::from_file(path)
            .with_context(|| format!("Failed to load category rules {}", path.display()))?,
        None => Categorizer::with_defaults(),
    };

    Ok(GroceryListService::new(
        store,
        ConsolidationEngine::new(categorizer),
        Box::new(recipes),
    ))
}

fn load_recipes(path: &str) -> Result<RecipeBook> {
    let recipes = RecipeBook::from_file(path)
        .with_context(|| format!("Failed to load recipes from {}", path))?;
    println!("✓ Loaded {} recipes", recipes.len());
    Ok(recipes)
}

fn run_generate(
    config: &GroceryConfig,
    plan_csv: &str,
    recipes_json: &str,
    week: &str,
    plan_id: &str,
) -> Result<()> {
    println!("🛒 Generating grocery list for week {}", week);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let plan = load_meal_plan_csv(Path::new(plan_csv), plan_id, week)
        .with_context(|| format!("Failed to load meal plan {}", plan_csv))?;
    println!("✓ Loaded {} planned meals", plan.meals.len());

    let service = open_service(config, load_recipes(recipes_json)?)?;
    let list = service.generate_grocery_list(&plan)?;

    print_list(&list);
    Ok(())
}

fn run_swap(config: &GroceryConfig, args: &[String]) -> Result<()> {
    let [plan_csv, recipes_json, week, plan_id, date, new_recipe] = args else {
        bail!("swap takes six arguments");
    };

    let affected_date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .with_context(|| format!("Invalid date {}", date))?;

    // The plan on disk is the state before the swap
    let plan = load_meal_plan_csv(Path::new(plan_csv), plan_id, week)
        .with_context(|| format!("Failed to load meal plan {}", plan_csv))?;
    let old_recipe = plan
        .meals
        .iter()
        .find(|meal| meal.date == affected_date)
        .map(|meal| meal.recipe_name.clone());
    let old_recipe_remaining = old_recipe
        .as_deref()
        .map(|name| plan.occurrences_of(name).saturating_sub(1))
        .unwrap_or(0);

    println!(
        "🔁 Swapping {} on {}: {} → {}",
        week,
        affected_date,
        old_recipe.as_deref().unwrap_or("(empty)"),
        new_recipe
    );

    let service = open_service(config, load_recipes(recipes_json)?)?;
    let outcome = service.apply_meal_swap(&MealSwap {
        meal_plan_id: plan_id.clone(),
        week_identifier: week.clone(),
        old_recipe,
        new_recipe: new_recipe.clone(),
        affected_date,
        old_recipe_remaining,
    })?;

    match outcome.list_id {
        None => println!("ℹ️  No grocery list for week {} yet, nothing to update", week),
        Some(id) => {
            println!("✓ Removed {} contributions, added {}", outcome.removed, outcome.added);
            if let Some(list) = service.get_list(&id)? {
                print_list(&list);
            }
        }
    }
    Ok(())
}

fn run_show(config: &GroceryConfig, week: &str) -> Result<()> {
    let service = open_service(config, RecipeBook::new())?;
    match service.latest_for_week(week)? {
        Some(list) => print_list(&list),
        None => println!("❌ No grocery list for week {}", week),
    }
    Ok(())
}

fn run_add_extra(config: &GroceryConfig, list_id: &str, request: &ExtraItemRequest) -> Result<()> {
    let service = open_service(config, RecipeBook::new())?;
    let list = service.add_extra_item(list_id, request)?;
    println!("✓ Added {} to list {}", request.name, list_id);
    print_list(&list);
    Ok(())
}

fn run_remove_extra(config: &GroceryConfig, list_id: &str, name: &str) -> Result<()> {
    let service = open_service(config, RecipeBook::new())?;
    if service.remove_extra_item(list_id, name)? {
        println!("✓ Removed {} from list {}", name, list_id);
    } else {
        println!("ℹ️  {} was not on list {}", name, list_id);
    }
    Ok(())
}

fn run_migrate(config: &GroceryConfig) -> Result<()> {
    println!("🔧 Migrating legacy grocery lists...");
    let service = open_service(config, RecipeBook::new())?;
    let migrated = service.store().migrate_legacy()?;
    println!("✓ Migrated {} lists", migrated);
    Ok(())
}

fn print_list(list: &GroceryList) {
    println!("\n📋 Grocery list {} (week {})", list.id, list.week_identifier);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    for (section, items) in list.sections_in_aisle_order() {
        println!("\n{}", section.to_uppercase());
        for item in items {
            let sources = item.recipe_sources.join(", ");
            if item.display_quantity.is_empty() {
                println!("  • {}  [{}]", item.name, sources);
            } else {
                println!("  • {} {}  [{}]", item.display_quantity, item.name, sources);
            }
        }
    }

    let total = list.items().len() + list.extra_items().len();
    println!("\n✅ {} items", total);
}
