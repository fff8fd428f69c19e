// 🛒 Grocery List Model - items with a per-recipe contribution ledger
//
// Contributions are the only stored truth. Everything else on an item
// (display quantity, recipe sources) and on a list (store sections) is
// recomputed from them after every mutation.

use crate::parser::{parse_amount, split_leading_quantity};
use crate::rules::{categorize, section_rank, DEFAULT_CATEGORY};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Source name for items the user adds by hand
pub const USER_SOURCE: &str = "user";

/// Source name synthesized for legacy items that recorded no recipe
pub const LEGACY_SOURCE: &str = "legacy";

/// Canonical form used to match ingredient names
pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

// ============================================================================
// CONTRIBUTION LEDGER
// ============================================================================

/// One recipe's (or the user's) quantity of a single ingredient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngredientContribution {
    pub source_name: String,

    /// Quantity as written, e.g. "1 1/2"
    #[serde(default)]
    pub display_quantity: String,

    #[serde(default)]
    pub unit: String,

    /// Parsed amount; 0.0 when the quantity could not be read
    #[serde(default)]
    pub numeric_amount: f64,
}

impl IngredientContribution {
    /// Build a contribution, parsing the amount best-effort
    pub fn new(source_name: &str, quantity: &str, unit: &str) -> Self {
        IngredientContribution {
            source_name: source_name.to_string(),
            display_quantity: quantity.trim().to_string(),
            unit: unit.trim().to_string(),
            numeric_amount: parse_amount(quantity).unwrap_or(0.0),
        }
    }

    /// Whether the amount was actually parsed
    pub fn is_measured(&self) -> bool {
        self.numeric_amount > 0.0
    }

    /// "2 lbs", "3", "" ...
    pub fn display(&self) -> String {
        format!("{} {}", self.display_quantity, self.unit)
            .trim()
            .to_string()
    }
}

/// Render an amount: whole numbers without decimals, others to two places
pub fn format_amount(amount: f64) -> String {
    let rounded = (amount * 100.0).round() / 100.0;
    if rounded.fract() == 0.0 {
        format!("{}", rounded as i64)
    } else {
        format!("{}", rounded)
    }
}

/// Quantity aggregation rule.
///
/// - one contribution: shown verbatim
/// - several, all measured, all in one non-empty unit: summed
/// - anything else: "{count}x", never a converted or guessed sum
pub fn aggregate_quantity(contributions: &[IngredientContribution]) -> String {
    match contributions {
        [] => String::new(),
        [single] => single.display(),
        many => {
            let unit = many[0].unit.trim();
            let same_unit = !unit.is_empty()
                && many.iter().all(|c| c.unit.trim().eq_ignore_ascii_case(unit));
            let all_measured = many.iter().all(IngredientContribution::is_measured);

            if same_unit && all_measured {
                let total: f64 = many.iter().map(|c| c.numeric_amount).sum();
                format!("{} {}", format_amount(total), unit)
            } else {
                format!("{}x", many.len())
            }
        }
    }
}

// ============================================================================
// GROCERY ITEM
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "GroceryItemRecord")]
pub struct GroceryItem {
    pub name: String,

    /// Derived from `contributions`
    pub display_quantity: String,

    /// Assigned once, when the item is created
    pub category: String,

    /// Derived: distinct contribution sources in first-seen order
    pub recipe_sources: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,

    pub contributions: Vec<IngredientContribution>,
}

impl GroceryItem {
    /// Empty item; gets its first contribution right after
    pub fn new(name: &str, category: &str) -> Self {
        GroceryItem {
            name: name.trim().to_string(),
            display_quantity: String::new(),
            category: category.to_string(),
            recipe_sources: Vec::new(),
            notes: None,
            contributions: Vec::new(),
        }
    }

    pub fn matches_name(&self, name: &str) -> bool {
        normalize_name(&self.name) == normalize_name(name)
    }

    pub fn add_contribution(&mut self, contribution: IngredientContribution) {
        self.contributions.push(contribution);
        self.recompute();
    }

    /// Drop every contribution from `source_name`, returning how many went
    pub fn remove_source(&mut self, source_name: &str) -> usize {
        let before = self.contributions.len();
        self.contributions.retain(|c| c.source_name != source_name);
        let removed = before - self.contributions.len();
        if removed > 0 {
            self.recompute();
        }
        removed
    }

    pub fn contributions_from<'a>(
        &'a self,
        source_name: &'a str,
    ) -> impl Iterator<Item = &'a IngredientContribution> + 'a {
        self.contributions
            .iter()
            .filter(move |c| c.source_name == source_name)
    }

    pub fn is_empty(&self) -> bool {
        self.contributions.is_empty()
    }

    /// Rebuild derived fields from the ledger
    pub fn recompute(&mut self) {
        let mut sources: Vec<String> = Vec::new();
        for c in &self.contributions {
            if !sources.contains(&c.source_name) {
                sources.push(c.source_name.clone());
            }
        }
        self.recipe_sources = sources;
        self.display_quantity = aggregate_quantity(&self.contributions);
    }
}

/// Stored item shape, current or pre-ledger.
///
/// Every field is optional so a malformed legacy record still loads.
#[derive(Debug, Deserialize)]
struct GroceryItemRecord {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    display_quantity: Option<serde_json::Value>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    recipe_sources: Option<Vec<String>>,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default)]
    contributions: Option<Vec<IngredientContribution>>,
}

fn lenient_string(value: Option<serde_json::Value>) -> String {
    match value {
        Some(serde_json::Value::String(s)) => s,
        Some(serde_json::Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

/// One contribution per legacy source, each carrying the old aggregate
/// quantity but no numeric amount: the per-recipe split is unrecoverable.
fn synthesize_legacy_contributions(
    display_quantity: &str,
    recipe_sources: &[String],
) -> Vec<IngredientContribution> {
    let display_quantity = display_quantity.trim();
    let (quantity, unit) = match split_leading_quantity(display_quantity) {
        Some((q, u, rest)) if rest.is_empty() => (q, u),
        _ => (display_quantity.to_string(), String::new()),
    };

    let mut sources: Vec<&str> = Vec::new();
    for source in recipe_sources {
        let source = source.as_str();
        if !source.trim().is_empty() && !sources.contains(&source) {
            sources.push(source);
        }
    }
    if sources.is_empty() {
        sources.push(LEGACY_SOURCE);
    }

    sources
        .into_iter()
        .map(|source| IngredientContribution {
            source_name: source.to_string(),
            display_quantity: quantity.clone(),
            unit: unit.clone(),
            numeric_amount: 0.0,
        })
        .collect()
}

impl From<GroceryItemRecord> for GroceryItem {
    fn from(record: GroceryItemRecord) -> Self {
        let name = record.name.unwrap_or_default().trim().to_string();
        let display_quantity = lenient_string(record.display_quantity);

        let contributions = match record.contributions {
            Some(contributions) => contributions,
            None => synthesize_legacy_contributions(
                &display_quantity,
                &record.recipe_sources.unwrap_or_default(),
            ),
        };

        let category = match record.category {
            Some(c) if !c.trim().is_empty() => c,
            _ => categorize(&name),
        };

        let mut item = GroceryItem {
            name,
            display_quantity,
            category,
            recipe_sources: Vec::new(),
            notes: record.notes,
            contributions,
        };
        item.recompute();
        item
    }
}

// ============================================================================
// GROCERY LIST
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "GroceryListRecord")]
pub struct GroceryList {
    pub id: String,

    pub week_identifier: String,

    /// Plan that last built this list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meal_plan_id: Option<String>,

    items: Vec<GroceryItem>,

    /// User-added entries; recipe consolidation never touches these
    extra_items: Vec<GroceryItem>,

    /// Derived view, keyed by category
    store_sections: BTreeMap<String, Vec<GroceryItem>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_total: Option<f64>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl GroceryList {
    /// Create an empty list for a week
    pub fn new(week_identifier: &str) -> Self {
        let now = Utc::now();
        GroceryList {
            id: uuid::Uuid::new_v4().to_string(),
            week_identifier: week_identifier.to_string(),
            meal_plan_id: None,
            items: Vec::new(),
            extra_items: Vec::new(),
            store_sections: BTreeMap::new(),
            estimated_total: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Rebuild a list from stored parts; derived fields are recomputed
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_stored(
        id: String,
        week_identifier: String,
        meal_plan_id: Option<String>,
        items: Vec<GroceryItem>,
        extra_items: Vec<GroceryItem>,
        estimated_total: Option<f64>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        let mut list = GroceryList {
            id,
            week_identifier,
            meal_plan_id,
            items,
            extra_items,
            store_sections: BTreeMap::new(),
            estimated_total,
            created_at,
            updated_at,
        };
        list.refresh();
        list
    }

    pub fn items(&self) -> &[GroceryItem] {
        &self.items
    }

    pub fn extra_items(&self) -> &[GroceryItem] {
        &self.extra_items
    }

    pub fn store_sections(&self) -> &BTreeMap<String, Vec<GroceryItem>> {
        &self.store_sections
    }

    /// Store sections in aisle order
    pub fn sections_in_aisle_order(&self) -> Vec<(&str, &[GroceryItem])> {
        let mut sections: Vec<(&str, &[GroceryItem])> = self
            .store_sections
            .iter()
            .map(|(category, items)| (category.as_str(), items.as_slice()))
            .collect();
        sections.sort_by_key(|(category, _)| section_rank(category));
        sections
    }

    /// Recipe-sourced item by name
    pub fn find_item(&self, name: &str) -> Option<&GroceryItem> {
        self.items.iter().find(|item| item.matches_name(name))
    }

    pub fn find_extra_item(&self, name: &str) -> Option<&GroceryItem> {
        self.extra_items.iter().find(|item| item.matches_name(name))
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.extra_items.is_empty()
    }

    /// Carry user-added items over from another list for the same week
    pub fn adopt_extra_items(&mut self, extra_items: Vec<GroceryItem>) {
        self.extra_items = extra_items;
        self.refresh();
    }

    /// Mutate recipe-sourced items; derived fields are rebuilt afterwards
    pub(crate) fn edit_items<R>(&mut self, edit: impl FnOnce(&mut Vec<GroceryItem>) -> R) -> R {
        let result = edit(&mut self.items);
        self.refresh();
        result
    }

    /// Mutate user-added items; derived fields are rebuilt afterwards
    pub(crate) fn edit_extra_items<R>(
        &mut self,
        edit: impl FnOnce(&mut Vec<GroceryItem>) -> R,
    ) -> R {
        let result = edit(&mut self.extra_items);
        self.refresh();
        result
    }

    /// Recompute every derived field. Items without contributions are dropped.
    pub fn refresh(&mut self) {
        for item in self.items.iter_mut().chain(self.extra_items.iter_mut()) {
            item.recompute();
        }
        self.items.retain(|item| !item.is_empty());
        self.extra_items.retain(|item| !item.is_empty());

        let mut sections: BTreeMap<String, Vec<GroceryItem>> = BTreeMap::new();
        for item in self.items.iter().chain(self.extra_items.iter()) {
            let category = if item.category.trim().is_empty() {
                DEFAULT_CATEGORY.to_string()
            } else {
                item.category.clone()
            };
            sections.entry(category).or_default().push(item.clone());
        }
        self.store_sections = sections;
    }

    /// SHA-256 over the contribution ledger and user items.
    ///
    /// Derived fields are left out; they follow from what is hashed.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.week_identifier.as_bytes());
        hasher.update(self.meal_plan_id.as_deref().unwrap_or("").as_bytes());

        for (tag, items) in [("items", &self.items), ("extra", &self.extra_items)] {
            hasher.update(tag.as_bytes());
            for item in items {
                hasher.update(format!(
                    "\u{1f}{}\u{1f}{}\u{1f}{}",
                    item.name,
                    item.category,
                    item.notes.as_deref().unwrap_or("")
                ));
                for c in &item.contributions {
                    hasher.update(format!(
                        "\u{1e}{}\u{1e}{}\u{1e}{}\u{1e}{}",
                        c.source_name,
                        c.display_quantity,
                        c.unit,
                        c.numeric_amount.to_bits()
                    ));
                }
            }
        }

        if let Some(total) = self.estimated_total {
            hasher.update(total.to_bits().to_be_bytes());
        }

        format!("{:x}", hasher.finalize())
    }
}

/// Stored list shape; `store_sections` is ignored and rebuilt
#[derive(Debug, Deserialize)]
struct GroceryListRecord {
    #[serde(default = "new_list_id")]
    id: String,
    #[serde(default)]
    week_identifier: String,
    #[serde(default)]
    meal_plan_id: Option<String>,
    #[serde(default)]
    items: Vec<GroceryItem>,
    #[serde(default)]
    extra_items: Vec<GroceryItem>,
    #[serde(default)]
    estimated_total: Option<f64>,
    #[serde(default = "now")]
    created_at: DateTime<Utc>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
}

fn new_list_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn now() -> DateTime<Utc> {
    Utc::now()
}

impl From<GroceryListRecord> for GroceryList {
    fn from(record: GroceryListRecord) -> Self {
        let updated_at = record.updated_at.unwrap_or(record.created_at);
        GroceryList::from_stored(
            record.id,
            record.week_identifier,
            record.meal_plan_id,
            record.items,
            record.extra_items,
            record.estimated_total,
            record.created_at,
            updated_at,
        )
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn contribution(source: &str, quantity: &str, unit: &str) -> IngredientContribution {
        IngredientContribution::new(source, quantity, unit)
    }

    #[test]
    fn test_single_contribution_is_verbatim() {
        assert_eq!(aggregate_quantity(&[contribution("A", "1 1/2", "cups")]), "1 1/2 cups");
        assert_eq!(aggregate_quantity(&[contribution("A", "3", "")]), "3");
        assert_eq!(aggregate_quantity(&[contribution("A", "", "")]), "");
    }

    #[test]
    fn test_same_unit_sums() {
        let contributions = vec![contribution("A", "1", "tbsp"), contribution("B", "1", "tbsp")];
        assert_eq!(aggregate_quantity(&contributions), "2 tbsp");

        let contributions = vec![
            contribution("A", "0.5", "gallons"),
            contribution("B", "0.3", "gallons"),
        ];
        assert_eq!(aggregate_quantity(&contributions), "0.8 gallons");

        // Unit comparison ignores case
        let contributions = vec![contribution("A", "1", "Cup"), contribution("B", "1/2", "cup")];
        assert_eq!(aggregate_quantity(&contributions), "1.5 Cup");
    }

    #[test]
    fn test_cross_unit_falls_back_to_count() {
        let contributions = vec![contribution("A", "2", "cups"), contribution("B", "100", "g")];
        assert_eq!(aggregate_quantity(&contributions), "2x");

        // Empty units never sum
        let contributions = vec![contribution("A", "2", ""), contribution("B", "3", "")];
        assert_eq!(aggregate_quantity(&contributions), "2x");

        // Unparsed amounts never sum
        let contributions = vec![contribution("A", "some", "cups"), contribution("B", "1", "cups")];
        assert_eq!(aggregate_quantity(&contributions), "2x");
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(3.0), "3");
        assert_eq!(format_amount(0.1 + 0.2), "0.3");
        assert_eq!(format_amount(1.0 / 3.0), "0.33");
    }

    #[test]
    fn test_item_sources_are_distinct_in_first_seen_order() {
        let mut item = GroceryItem::new("olive oil", "pantry");
        item.add_contribution(contribution("B", "1", "tbsp"));
        item.add_contribution(contribution("A", "1", "tbsp"));
        item.add_contribution(contribution("B", "2", "tbsp"));

        assert_eq!(item.recipe_sources, vec!["B", "A"]);
        assert_eq!(item.display_quantity, "4 tbsp");

        assert_eq!(item.remove_source("B"), 2);
        assert_eq!(item.recipe_sources, vec!["A"]);
        assert_eq!(item.display_quantity, "1 tbsp");
        assert_eq!(item.remove_source("missing"), 0);
    }

    #[test]
    fn test_legacy_item_synthesizes_one_contribution_per_source() {
        let json = r#"{
            "name": "flour",
            "display_quantity": "3 cups",
            "category": "pantry",
            "recipe_sources": ["Pancakes", "Cookies"]
        }"#;

        let mut item: GroceryItem = serde_json::from_str(json).unwrap();

        assert_eq!(item.contributions.len(), 2);
        assert_eq!(item.contributions[0].source_name, "Pancakes");
        assert_eq!(item.contributions[1].source_name, "Cookies");
        assert_eq!(item.contributions[0].display_quantity, "3");
        assert_eq!(item.contributions[0].unit, "cups");
        assert_eq!(item.contributions[0].numeric_amount, 0.0);
        assert_eq!(item.recipe_sources, vec!["Pancakes", "Cookies"]);

        item.remove_source("Pancakes");
        assert_eq!(item.recipe_sources, vec!["Cookies"]);
        assert_eq!(item.display_quantity, "3 cups");
    }

    #[test]
    fn test_malformed_legacy_item_still_loads() {
        let json = r#"{"name": "Bananas", "display_quantity": 6, "recipe_sources": null}"#;
        let item: GroceryItem = serde_json::from_str(json).unwrap();

        assert_eq!(item.contributions.len(), 1);
        assert_eq!(item.contributions[0].source_name, LEGACY_SOURCE);
        assert_eq!(item.display_quantity, "6");
        assert_eq!(item.category, "produce");
    }

    #[test]
    fn test_list_refresh_drops_empty_items_and_rebuilds_sections() {
        let mut list = GroceryList::new("2025-11-04");
        list.edit_items(|items| {
            let mut oil = GroceryItem::new("olive oil", "pantry");
            oil.add_contribution(contribution("A", "1", "tbsp"));
            items.push(oil);
            items.push(GroceryItem::new("ghost", "other"));
        });

        assert_eq!(list.items().len(), 1);
        assert_eq!(list.store_sections().len(), 1);
        assert_eq!(list.store_sections()["pantry"][0].name, "olive oil");
    }

    #[test]
    fn test_list_json_round_trip() {
        let mut list = GroceryList::new("2025-11-04");
        list.edit_items(|items| {
            let mut chicken = GroceryItem::new("chicken breast", "meat");
            chicken.add_contribution(contribution("RecipeA", "2", "lbs"));
            items.push(chicken);
        });

        let json = serde_json::to_string(&list).unwrap();
        assert!(json.contains("store_sections"));

        let loaded: GroceryList = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded, list);
    }

    #[test]
    fn test_fingerprint_tracks_ledger_changes() {
        let mut list = GroceryList::new("2025-11-04");
        let empty = list.fingerprint();

        list.edit_items(|items| {
            let mut pasta = GroceryItem::new("pasta", "pantry");
            pasta.add_contribution(contribution("RecipeB", "1", "lb"));
            items.push(pasta);
        });
        let filled = list.fingerprint();

        assert_ne!(empty, filled);
        assert_eq!(filled, list.clone().fingerprint());
        assert_eq!(filled.len(), 64);
    }
}
