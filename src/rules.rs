// 🏷️ Category Rules - Rules as Data
// Ordered keyword → store section table; first match at a word start wins

use crate::error::{GroceryError, Result};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Fallback section for anything no rule matches
pub const DEFAULT_CATEGORY: &str = "other";

/// Aisle order used when presenting store sections
pub const SECTION_ORDER: &[&str] = &[
    "produce",
    "meat",
    "seafood",
    "dairy",
    "bakery",
    "frozen",
    "pantry",
    "spices",
    "beverages",
    "household",
    "other",
];

// ============================================================================
// RULE DEFINITION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRule {
    /// Lowercase text looked for at a word start in the ingredient name
    pub keyword: String,

    /// Store section to assign
    pub category: String,
}

impl CategoryRule {
    pub fn new(keyword: &str, category: &str) -> Self {
        CategoryRule {
            keyword: keyword.to_lowercase(),
            category: category.to_string(),
        }
    }

    /// Match at the start of a word: "oil" hits "olive oil" but not "foil",
    /// "egg" hits "eggs"
    pub fn matches(&self, name_lower: &str) -> bool {
        if self.keyword.is_empty() {
            return false;
        }
        name_lower
            .match_indices(self.keyword.as_str())
            .any(|(start, _)| {
                name_lower[..start]
                    .chars()
                    .next_back()
                    .map_or(true, |c| !c.is_alphanumeric())
            })
    }
}

// A keyword must come before any shorter keyword found at one of its word
// starts ("peanut butter" before "butter", "broth" before "chicken").
const DEFAULT_RULES: &[(&str, &str)] = &[
    ("green beans", "produce"),
    ("green onion", "produce"),
    // Pantry items that would otherwise hit meat/dairy/produce keywords
    ("peanut butter", "pantry"),
    ("almond butter", "pantry"),
    ("coconut milk", "pantry"),
    ("broth", "pantry"),
    ("stock", "pantry"),
    ("bouillon", "pantry"),
    ("tomato paste", "pantry"),
    ("tomato sauce", "pantry"),
    ("canned", "pantry"),
    ("beans", "pantry"),
    ("garlic powder", "spices"),
    ("onion powder", "spices"),
    ("ice cream", "frozen"),
    ("frozen", "frozen"),
    ("eggplant", "produce"),
    ("breadcrumb", "pantry"),
    // Meat
    ("chicken", "meat"),
    ("beef", "meat"),
    ("pork", "meat"),
    ("bacon", "meat"),
    ("sausage", "meat"),
    ("turkey", "meat"),
    ("lamb", "meat"),
    ("ham", "meat"),
    ("steak", "meat"),
    ("prosciutto", "meat"),
    // Seafood
    ("salmon", "seafood"),
    ("shrimp", "seafood"),
    ("tuna", "seafood"),
    ("cod", "seafood"),
    ("tilapia", "seafood"),
    ("fish", "seafood"),
    ("scallop", "seafood"),
    // Dairy
    ("milk", "dairy"),
    ("cheese", "dairy"),
    ("parmesan", "dairy"),
    ("mozzarella", "dairy"),
    ("butter", "dairy"),
    ("cream", "dairy"),
    ("yogurt", "dairy"),
    ("egg", "dairy"),
    // Produce
    ("lettuce", "produce"),
    ("spinach", "produce"),
    ("kale", "produce"),
    ("tomato", "produce"),
    ("onion", "produce"),
    ("garlic", "produce"),
    ("shallot", "produce"),
    ("pepper flakes", "spices"),
    ("bell pepper", "produce"),
    ("jalapeno", "produce"),
    ("carrot", "produce"),
    ("celery", "produce"),
    ("potato", "produce"),
    ("broccoli", "produce"),
    ("zucchini", "produce"),
    ("mushroom", "produce"),
    ("cucumber", "produce"),
    ("avocado", "produce"),
    ("lemon", "produce"),
    ("lime", "produce"),
    ("apple", "produce"),
    ("banana", "produce"),
    ("berries", "produce"),
    ("cilantro", "produce"),
    ("parsley", "produce"),
    ("basil", "produce"),
    ("ginger", "produce"),
    ("scallion", "produce"),
    // Bakery
    ("bread", "bakery"),
    ("tortilla", "bakery"),
    ("bun", "bakery"),
    ("bagel", "bakery"),
    ("pita", "bakery"),
    // Pantry
    ("oil", "pantry"),
    ("vinegar", "pantry"),
    ("pasta", "pantry"),
    ("spaghetti", "pantry"),
    ("noodle", "pantry"),
    ("rice", "pantry"),
    ("flour", "pantry"),
    ("sugar", "pantry"),
    ("honey", "pantry"),
    ("oats", "pantry"),
    ("soy sauce", "pantry"),
    ("sauce", "pantry"),
    ("lentil", "pantry"),
    ("quinoa", "pantry"),
    ("baking", "pantry"),
    ("vanilla", "pantry"),
    ("chocolate", "pantry"),
    ("nuts", "pantry"),
    // Spices
    ("salt", "spices"),
    ("pepper", "spices"),
    ("cumin", "spices"),
    ("paprika", "spices"),
    ("oregano", "spices"),
    ("cinnamon", "spices"),
    ("chili powder", "spices"),
    ("thyme", "spices"),
    ("rosemary", "spices"),
    // Beverages
    ("coffee", "beverages"),
    ("tea", "beverages"),
    ("juice", "beverages"),
    ("wine", "beverages"),
    ("beer", "beverages"),
    // Household
    ("paper towel", "household"),
    ("foil", "household"),
    ("soap", "household"),
];

// ============================================================================
// CATEGORIZER
// ============================================================================

#[derive(Debug, Clone)]
pub struct Categorizer {
    rules: Vec<CategoryRule>,
}

impl Categorizer {
    /// Create a categorizer from rules in priority order
    pub fn from_rules(rules: Vec<CategoryRule>) -> Self {
        let rules = rules
            .into_iter()
            .map(|r| CategoryRule::new(&r.keyword, &r.category))
            .collect();
        Categorizer { rules }
    }

    /// Built-in keyword table
    pub fn with_defaults() -> Self {
        Categorizer {
            rules: DEFAULT_RULES
                .iter()
                .map(|(keyword, category)| CategoryRule::new(keyword, category))
                .collect(),
        }
    }

    /// Load rules from a JSON file: `[{"keyword": "...", "category": "..."}]`
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| GroceryError::Config {
            message: format!("Failed to read category rules {:?}: {}", path.as_ref(), e),
        })?;

        let rules: Vec<CategoryRule> = serde_json::from_str(&content)?;
        Ok(Categorizer::from_rules(rules))
    }

    /// Map an ingredient name to its store section
    pub fn categorize(&self, name: &str) -> String {
        let name_lower = name.trim().to_lowercase();

        self.rules
            .iter()
            .find(|rule| rule.matches(&name_lower))
            .map(|rule| rule.category.clone())
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string())
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }
}

impl Default for Categorizer {
    fn default() -> Self {
        Self::with_defaults()
    }
}

static DEFAULT_CATEGORIZER: Lazy<Categorizer> = Lazy::new(Categorizer::with_defaults);

/// Categorize with the built-in table
pub fn categorize(name: &str) -> String {
    DEFAULT_CATEGORIZER.categorize(name)
}

/// Sort key for store sections: known aisles first, in aisle order,
/// then anything else alphabetically.
pub fn section_rank(category: &str) -> (usize, String) {
    let lower = category.to_lowercase();
    let rank = SECTION_ORDER
        .iter()
        .position(|s| *s == lower)
        .unwrap_or(SECTION_ORDER.len());
    (rank, lower)
}

// ============================================================================
// TESTS
// ============================================================================
