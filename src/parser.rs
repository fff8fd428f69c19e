// 🥕 Ingredient Parser - free-text line → (quantity, unit, name)
// Never fails: anything it cannot read degrades to a bare name

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

// ============================================================================
// CORE TYPES
// ============================================================================

/// ParsedIngredient - Output of parse_ingredient_line()
///
/// `quantity` and `unit` are either both meaningful or the line degraded,
/// in which case both are empty and `name` carries the cleaned line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedIngredient {
    pub quantity: String,
    pub unit: String,
    pub name: String,
}

impl ParsedIngredient {
    fn degraded(name: String) -> Self {
        ParsedIngredient {
            quantity: String::new(),
            unit: String::new(),
            name,
        }
    }

    /// True when neither quantity nor unit could be identified
    pub fn is_degraded(&self) -> bool {
        self.quantity.is_empty() && self.unit.is_empty()
    }
}

// ============================================================================
// VOCABULARY
// ============================================================================

/// Units recognised directly after a quantity. Matched lowercase,
/// without a trailing period.
const UNITS: &[&str] = &[
    // Volume
    "cup", "cups", "c",
    "tbsp", "tbsps", "tablespoon", "tablespoons", "tbs", "tbl",
    "tsp", "tsps", "teaspoon", "teaspoons",
    "ml", "milliliter", "milliliters", "l", "liter", "liters", "litre", "litres",
    "gallon", "gallons", "gal", "quart", "quarts", "qt", "pint", "pints", "pt",
    "fl oz",
    // Weight
    "lb", "lbs", "pound", "pounds",
    "oz", "ounce", "ounces",
    "g", "gram", "grams", "kg", "kilogram", "kilograms",
    // Count-ish
    "clove", "cloves", "can", "cans", "jar", "jars", "bottle", "bottles",
    "package", "packages", "pkg", "pkgs", "box", "boxes", "bag", "bags",
    "bunch", "bunches", "head", "heads", "stalk", "stalks",
    "slice", "slices", "piece", "pieces", "sprig", "sprigs",
    "pinch", "pinches", "dash", "dashes", "handful", "handfuls",
    "stick", "sticks", "dozen",
];

const VULGAR_FRACTIONS: &[(char, f64)] = &[
    ('½', 0.5),
    ('⅓', 1.0 / 3.0),
    ('⅔', 2.0 / 3.0),
    ('¼', 0.25),
    ('¾', 0.75),
    ('⅛', 0.125),
    ('⅜', 0.375),
    ('⅝', 0.625),
    ('⅞', 0.875),
];

static PARENTHETICAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\([^()]*\)").expect("parenthetical pattern")
});

// Order matters: mixed numbers before bare integers, ranges folded into the
// decimal branch.
static LEADING_QUANTITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?P<qty>\d+\s+\d+/\d+|\d+\s*[½⅓⅔¼¾⅛⅜⅝⅞]|\d+/\d+|\d+(?:\.\d+)?(?:\s*(?:-|–|to)\s*\d+(?:\.\d+)?)?|\.\d+|[½⅓⅔¼¾⅛⅜⅝⅞])(?P<rest>.*)$",
    )
    .expect("quantity pattern")
});

fn is_unit(token: &str) -> bool {
    UNITS.contains(&token)
}

fn normalize_unit_token(token: &str) -> String {
    token
        .trim_end_matches(|c: char| c == '.' || c == ',')
        .to_lowercase()
}

// ============================================================================
// PARSING
// ============================================================================

/// Drop bullets and parenthetical asides, collapse whitespace
fn clean_line(raw: &str) -> String {
    let trimmed = raw
        .trim()
        .trim_start_matches(|c: char| c == '-' || c == '*' || c == '•')
        .trim();
    let without_asides = PARENTHETICAL.replace_all(trimmed, " ");
    without_asides.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split a leading quantity and optional unit from `text`.
///
/// Returns `(quantity, unit, rest)`. `None` when `text` does not start with
/// a quantity, or starts with one glued to a word that is not a unit
/// (`"3eggs"`).
pub(crate) fn split_leading_quantity(text: &str) -> Option<(String, String, String)> {
    let caps = LEADING_QUANTITY.captures(text)?;
    let quantity = caps.name("qty")?.as_str().trim().to_string();
    let rest = caps.name("rest").map(|m| m.as_str()).unwrap_or("");

    // "2lb chicken": unit glued to the number
    if rest.starts_with(|c: char| c.is_alphabetic()) {
        let glued: String = rest.chars().take_while(|c| c.is_alphabetic()).collect();
        let candidate = normalize_unit_token(&glued);
        if !is_unit(&candidate) {
            return None;
        }
        let after = rest[glued.len()..].trim_start_matches('.').trim().to_string();
        return Some((quantity, candidate, after));
    }

    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return None;
    }

    let rest = rest.trim();
    let mut tokens = rest.splitn(2, ' ');
    let first = tokens.next().unwrap_or("");
    let remainder = tokens.next().unwrap_or("").trim();

    // Two-word unit
    if first.eq_ignore_ascii_case("fl") {
        let mut inner = remainder.splitn(2, ' ');
        let second = normalize_unit_token(inner.next().unwrap_or(""));
        if second == "oz" {
            let after = inner.next().unwrap_or("").trim().to_string();
            return Some((quantity, "fl oz".to_string(), after));
        }
    }

    let candidate = normalize_unit_token(first);
    if is_unit(&candidate) {
        Some((quantity, candidate, remainder.to_string()))
    } else {
        Some((quantity, String::new(), rest.to_string()))
    }
}

/// Parse a raw ingredient line such as `"1 1/2 cups flour (sifted)"`.
///
/// # Examples:
/// ```text
/// "2 lbs chicken breast"   → ("2", "lbs", "chicken breast")
/// "1 tbsp olive oil"       → ("1", "tbsp", "olive oil")
/// "3 eggs"                 → ("3", "", "eggs")
/// "salt and pepper"        → ("", "", "salt and pepper")
/// ```
pub fn parse_ingredient_line(raw: &str) -> ParsedIngredient {
    let cleaned = clean_line(raw);

    let Some((quantity, unit, rest)) = split_leading_quantity(&cleaned) else {
        debug!(line = %cleaned, "no leading quantity, keeping whole line as name");
        return ParsedIngredient::degraded(cleaned);
    };

    let rest = if !unit.is_empty() {
        rest.strip_prefix("of ").unwrap_or(&rest).to_string()
    } else {
        rest
    };

    // Preparation notes after the first comma are not part of the name
    let name = rest.split(',').next().unwrap_or("").trim().to_string();

    if name.is_empty() {
        debug!(line = %cleaned, "quantity without a name, degrading");
        return ParsedIngredient::degraded(cleaned);
    }

    ParsedIngredient { quantity, unit, name }
}

// ============================================================================
// NUMERIC AMOUNTS
// ============================================================================

fn vulgar_value(c: char) -> Option<f64> {
    VULGAR_FRACTIONS
        .iter()
        .find(|(f, _)| *f == c)
        .map(|(_, v)| *v)
}

fn parse_simple_amount(token: &str) -> Option<f64> {
    if token.is_empty() {
        return None;
    }

    if let Some((num, den)) = token.split_once('/') {
        let num: f64 = num.trim().parse().ok()?;
        let den: f64 = den.trim().parse().ok()?;
        if den == 0.0 {
            return None;
        }
        return Some(num / den);
    }

    // "1½"
    if let Some(last) = token.chars().last() {
        if let Some(fraction) = vulgar_value(last) {
            let whole = &token[..token.len() - last.len_utf8()];
            let whole: f64 = if whole.trim().is_empty() {
                0.0
            } else {
                whole.trim().parse().ok()?
            };
            return Some(whole + fraction);
        }
    }

    token.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Best-effort numeric reading of a quantity string.
///
/// Ranges read as their lower bound (`"2-3"` → 2.0). Mixed numbers add
/// up (`"1 1/2"` → 1.5). Anything else that does not parse is `None`.
pub fn parse_amount(quantity: &str) -> Option<f64> {
    let quantity = quantity.trim();
    if quantity.is_empty() {
        return None;
    }

    let lower_bound = quantity
        .split(|c: char| c == '-' || c == '–')
        .next()
        .unwrap_or(quantity)
        .split(" to ")
        .next()
        .unwrap_or(quantity)
        .trim();

    let mut total = 0.0;
    let mut parts = 0;
    for part in lower_bound.split_whitespace() {
        total += parse_simple_amount(part)?;
        parts += 1;
    }

    if parts == 0 {
        None
    } else {
        Some(total)
    }
}

// ============================================================================
// TESTS
// ============================================================================
