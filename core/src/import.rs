use std::collections::{HashMap, HashSet};
use std::io::Read;

use anyhow::{Context, Result, bail};
use serde::Serialize;
use tracing::info;

use crate::models::{Ingredient, Measurement, Recipe, RecipeLine, validate_recipe_lines};
use crate::store::DocumentStore;

/// Spreadsheet cells that mean "no ingredient here".
const PLACEHOLDER_NAMES: &[&str] = &["none", "as usual"];

/// Keyword → category rules, checked in order. First hit wins.
const CATEGORY_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "Vegetables",
        &[
            "tomato", "potato", "onion", "carrot", "lettuce", "spinach", "cucumber", "pepper",
            "cabbage", "broccoli", "zucchini", "eggplant", "celery", "radish", "garlic", "leek",
            "parsley", "cilantro", "kale", "chard", "beet",
        ],
    ),
    (
        "Fruits",
        &[
            "apple", "banana", "orange", "grape", "berry", "melon", "peach", "pear", "mango",
            "strawberry", "blueberry", "raspberry", "lemon", "lime", "pineapple",
        ],
    ),
    (
        "Meat",
        &[
            "beef", "chicken", "pork", "lamb", "turkey", "fish", "salmon", "tuna", "steak",
            "bacon", "sausage", "ham", "meat", "fleisch",
        ],
    ),
    (
        "Dairy",
        &[
            "milk", "cheese", "yogurt", "butter", "cream", "eggs", "egg", "ei", "käse", "milch",
            "sahne",
        ],
    ),
    (
        "Grains",
        &[
            "rice", "pasta", "bread", "flour", "oats", "quinoa", "wheat", "noodle", "spaghetti",
            "couscous", "bulgur", "reis", "mehl",
        ],
    ),
    (
        "Spices",
        &[
            "salt", "pepper", "curry", "paprika", "cumin", "oregano", "basil", "thyme",
            "rosemary", "sage", "cinnamon", "turmeric", "salz", "pfeffer",
        ],
    ),
    (
        "Beverages",
        &[
            "water", "juice", "coffee", "tea", "soda", "wine", "beer", "wasser", "saft", "wein",
        ],
    ),
    ("Canned Goods", &["canned", "tinned", "jar", "dose"]),
    ("Frozen", &["frozen", "tiefkühl", "tk"]),
];

/// A single ingredient row from a spreadsheet export.
#[derive(Debug, Clone)]
pub struct IngredientRow {
    pub name: String,
    pub unit: String,
    pub category: Option<String>,
}

/// A single recipe line from a spreadsheet export, already scaled to grams.
#[derive(Debug, Clone)]
pub struct RecipeRow {
    pub recipe: String,
    pub ingredient: String,
    pub grams_per_person: f64,
    pub comments: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IngredientImportSummary {
    pub rows_parsed: usize,
    pub created: Vec<String>,
    pub skipped_existing: Vec<String>,
    pub categories_added: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RecipeImportSummary {
    pub rows_parsed: usize,
    pub created: Vec<String>,
    pub skipped_existing: Vec<String>,
    /// Recipes where no ingredient could be matched.
    pub skipped_empty: Vec<String>,
    /// Ingredient names that had no match, across all recipes.
    pub unmatched_ingredients: usize,
}

fn is_placeholder(name: &str) -> bool {
    let lower = name.trim().to_lowercase();
    lower.is_empty() || PLACEHOLDER_NAMES.contains(&lower.as_str())
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Map a spreadsheet unit onto a measurement. Blank and unknown units are
/// counted in pieces.
#[must_use]
pub fn map_unit_to_measurement(unit: &str) -> Measurement {
    Measurement::from_legacy_unit(unit).0
}

/// Guess a category from keywords in the ingredient name.
#[must_use]
pub fn guess_category(name: &str) -> &'static str {
    let lower = name.to_lowercase();
    CATEGORY_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
        .map_or("Other", |(category, _)| *category)
}

/// Parse an ingredient list from any reader.
///
/// Expected header: `Name,Unit,Category`. Only `Name` is required. Names are
/// deduplicated case-insensitively, keeping the first occurrence.
pub fn parse_ingredient_csv<R: Read>(reader: R) -> Result<Vec<IngredientRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers().context("Failed to read CSV headers")?.clone();
    let col =
        |name: &str| -> Option<usize> { headers.iter().position(|h| h.eq_ignore_ascii_case(name)) };

    let Some(idx_name) = col("Name") else {
        bail!("Missing required column: Name");
    };
    let idx_unit = col("Unit");
    let idx_category = col("Category");

    let mut rows = Vec::new();
    let mut seen = HashSet::new();

    for (line_num, result) in rdr.records().enumerate() {
        let record = result.with_context(|| format!("Failed to parse CSV row {}", line_num + 2))?;
        let name = field(&record, Some(idx_name));
        if is_placeholder(name) || !seen.insert(normalize(name)) {
            continue;
        }
        let category = field(&record, idx_category);

        rows.push(IngredientRow {
            name: name.to_string(),
            unit: field(&record, idx_unit).to_string(),
            category: (!category.is_empty()).then(|| category.to_string()),
        });
    }

    Ok(rows)
}

fn field(record: &csv::StringRecord, idx: Option<usize>) -> &str {
    idx.and_then(|i| record.get(i)).unwrap_or("").trim()
}

/// Per-person grams from the meat and vegetarian portion columns (in kg).
///
/// Both present: their average. One present: that one. Neither (or both
/// zero): `None`. Negative or non-finite portions are an error.
pub fn per_person_grams(meat_kg: Option<f64>, vegi_kg: Option<f64>) -> Result<Option<f64>> {
    for v in [meat_kg, vegi_kg].into_iter().flatten() {
        if !v.is_finite() || v < 0.0 {
            bail!("portion must be a non-negative number of kg (got {v})");
        }
    }
    let nonzero = |v: Option<f64>| v.filter(|x| *x != 0.0);
    let kg = match (nonzero(meat_kg), nonzero(vegi_kg)) {
        (Some(m), Some(v)) => (m + v) / 2.0,
        (Some(m), None) => m,
        (None, Some(v)) => v,
        (None, None) => return Ok(None),
    };
    let grams = (kg * 10_000.0).round() / 10.0;
    if !grams.is_finite() {
        bail!("portion of {kg} kg is too large");
    }
    Ok(Some(grams))
}

/// Read a portion cell. Blank means absent; anything else must be a number,
/// with either `.` or `,` as the decimal separator.
fn portion_cell(record: &csv::StringRecord, idx: Option<usize>, column: &str) -> Result<Option<f64>> {
    let raw = field(record, idx);
    if raw.is_empty() {
        return Ok(None);
    }
    let value = raw
        .replace(',', ".")
        .parse::<f64>()
        .with_context(|| format!("invalid value '{raw}' in column {column}"))?;
    Ok(Some(value))
}

/// Parse recipe lines from any reader.
///
/// Expected header: `Recipe,Ingredient,Meat (kg),Vegi (kg),Comments`.
/// `Comments` is optional. Rows with both portions blank or zero are skipped;
/// a portion that is not a non-negative number fails with the row number.
pub fn parse_recipe_csv<R: Read>(reader: R) -> Result<Vec<RecipeRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers().context("Failed to read CSV headers")?.clone();

    let required = ["Recipe", "Ingredient", "Meat (kg)", "Vegi (kg)"];
    for name in &required {
        if !headers.iter().any(|h| h.eq_ignore_ascii_case(name)) {
            bail!("Missing required column: {name}");
        }
    }

    let col =
        |name: &str| -> Option<usize> { headers.iter().position(|h| h.eq_ignore_ascii_case(name)) };
    let idx_recipe = col("Recipe").context("Missing 'Recipe' column")?;
    let idx_ingredient = col("Ingredient").context("Missing 'Ingredient' column")?;
    let idx_meat = col("Meat (kg)");
    let idx_vegi = col("Vegi (kg)");
    let idx_comments = col("Comments");

    let mut rows = Vec::new();

    for (line_num, result) in rdr.records().enumerate() {
        let record = result.with_context(|| format!("Failed to parse CSV row {}", line_num + 2))?;

        let recipe = record.get(idx_recipe).unwrap_or("").trim();
        let ingredient = record.get(idx_ingredient).unwrap_or("").trim();
        if recipe.is_empty() || is_placeholder(ingredient) {
            continue;
        }

        let row_num = line_num + 2;
        let meat = portion_cell(&record, idx_meat, "Meat (kg)")
            .with_context(|| format!("CSV row {row_num}"))?;
        let vegi = portion_cell(&record, idx_vegi, "Vegi (kg)")
            .with_context(|| format!("CSV row {row_num}"))?;
        let Some(grams) =
            per_person_grams(meat, vegi).with_context(|| format!("CSV row {row_num}"))?
        else {
            continue;
        };

        let comments = idx_comments
            .and_then(|i| record.get(i))
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(ToString::to_string);

        rows.push(RecipeRow {
            recipe: recipe.to_string(),
            ingredient: ingredient.to_string(),
            grams_per_person: grams,
            comments,
        });
    }

    Ok(rows)
}

/// Add parsed ingredient rows to the store.
///
/// Names already stored (case-insensitive) are skipped. New ingredients start
/// with an amount of 1. When `dry_run` is true, no data is written.
pub fn import_ingredients(
    store: &dyn DocumentStore,
    rows: &[IngredientRow],
    dry_run: bool,
) -> Result<IngredientImportSummary> {
    let mut doc = store.load()?;
    let mut summary = IngredientImportSummary {
        rows_parsed: rows.len(),
        ..Default::default()
    };

    let mut known: HashSet<String> = doc.ingredients.iter().map(|i| normalize(&i.name)).collect();

    for row in rows {
        if !known.insert(normalize(&row.name)) {
            summary.skipped_existing.push(row.name.clone());
            continue;
        }

        let category = row
            .category
            .clone()
            .unwrap_or_else(|| guess_category(&row.name).to_string());
        if doc.ensure_category(&category) {
            summary.categories_added.push(category.clone());
        }

        let ingredient = Ingredient {
            id: doc.next_ingredient_id(),
            name: row.name.clone(),
            category,
            measurement: map_unit_to_measurement(&row.unit),
            amount: 1.0,
        };
        summary.created.push(ingredient.name.clone());
        doc.ingredients.push(ingredient);
    }

    if !dry_run && !summary.created.is_empty() {
        store.save(&doc)?;
    }
    info!(
        dry_run,
        created = summary.created.len(),
        skipped = summary.skipped_existing.len(),
        "ingredient import finished"
    );
    Ok(summary)
}

/// Add parsed recipe rows to the store, grouped by recipe name.
///
/// Ingredients are matched by case-insensitive name. Unmatched names are
/// noted in the recipe comments. Recipes with no matched line, and names
/// already stored, are skipped. When `dry_run` is true, no data is written.
pub fn import_recipes(
    store: &dyn DocumentStore,
    rows: &[RecipeRow],
    dry_run: bool,
) -> Result<RecipeImportSummary> {
    let mut doc = store.load()?;
    let mut summary = RecipeImportSummary {
        rows_parsed: rows.len(),
        ..Default::default()
    };

    // Group in first-seen order.
    let mut order: Vec<&str> = Vec::new();
    let mut groups: HashMap<String, Vec<&RecipeRow>> = HashMap::new();
    for row in rows {
        let key = normalize(&row.recipe);
        if !groups.contains_key(&key) {
            order.push(&row.recipe);
        }
        groups.entry(key).or_default().push(row);
    }

    let ingredient_ids: HashMap<String, i64> = doc
        .ingredients
        .iter()
        .map(|i| (normalize(&i.name), i.id))
        .collect();
    let mut existing: HashSet<String> = doc.recipes.iter().map(|r| normalize(&r.name)).collect();

    for name in order {
        let key = normalize(name);
        if existing.contains(&key) {
            summary.skipped_existing.push(name.to_string());
            continue;
        }

        let mut lines = Vec::new();
        let mut missing: Vec<&str> = Vec::new();
        let mut notes: Option<&str> = None;
        for row in groups.get(&key).into_iter().flatten() {
            if notes.is_none() {
                notes = row.comments.as_deref();
            }
            match ingredient_ids.get(&normalize(&row.ingredient)) {
                Some(&ingredient_id) => lines.push(RecipeLine {
                    ingredient_id,
                    quantity_grams: row.grams_per_person,
                }),
                None => missing.push(&row.ingredient),
            }
        }
        summary.unmatched_ingredients += missing.len();

        if lines.is_empty() {
            summary.skipped_empty.push(name.to_string());
            continue;
        }
        validate_recipe_lines(&lines).with_context(|| format!("Recipe '{name}'"))?;

        let mut comments = notes.unwrap_or_default().to_string();
        if !missing.is_empty() {
            if !comments.is_empty() {
                comments.push('\n');
            }
            comments.push_str("Missing ingredients not in database: ");
            comments.push_str(&missing.join(", "));
        }

        doc.recipes.push(Recipe {
            id: doc.next_recipe_id(),
            name: name.to_string(),
            comments,
            ingredients: lines,
            vegie: None,
            tag: None,
        });
        existing.insert(key);
        summary.created.push(name.to_string());
    }

    if !dry_run && !summary.created.is_empty() {
        store.save(&doc)?;
    }
    info!(
        dry_run,
        created = summary.created.len(),
        skipped = summary.skipped_existing.len() + summary.skipped_empty.len(),
        unmatched = summary.unmatched_ingredients,
        "recipe import finished"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewIngredient;
    use crate::repository::IngredientRepository;
    use crate::store::MemoryStore;

    const INGREDIENTS_CSV: &str = "\
Name,Unit,Category
Rice,kg,
Milk,l,Dairy
Chickpeas canned,cans,
rice,g,
None,,
as usual,,
Fresh basil,,
";

    const RECIPES_CSV: &str = "\
Recipe,Ingredient,Meat (kg),Vegi (kg),Comments
Curry,Rice,0.1,0.08,Family favourite
Curry,Chickpeas canned,,0.12,
Curry,Lemongrass,0.01,,
Curry,Chicken,0.15,,
Rice pudding,Rice,0.05,0.05,
Rice pudding,Milk,0.2,,
Mystery stew,Unobtainium,0.3,,
Empty,Rice,,,
";

    fn stocked_store() -> MemoryStore {
        let store = MemoryStore::new();
        let rows = parse_ingredient_csv(INGREDIENTS_CSV.as_bytes()).unwrap();
        import_ingredients(&store, &rows, false).unwrap();
        store
    }

    #[test]
    fn test_parse_ingredient_csv() {
        let rows = parse_ingredient_csv(INGREDIENTS_CSV.as_bytes()).unwrap();
        let names: Vec<_> = rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Rice", "Milk", "Chickpeas canned", "Fresh basil"]);
        assert_eq!(rows[1].category.as_deref(), Some("Dairy"));
        assert!(rows[0].category.is_none());
    }

    #[test]
    fn test_parse_ingredient_csv_missing_name_column() {
        let result = parse_ingredient_csv("Unit,Category\nkg,Grains\n".as_bytes());
        assert!(result.unwrap_err().to_string().contains("Name"));
    }

    #[test]
    fn test_map_unit_to_measurement() {
        assert_eq!(map_unit_to_measurement("Kilogram"), Measurement::Kg);
        assert_eq!(map_unit_to_measurement("grams"), Measurement::Kg);
        assert_eq!(map_unit_to_measurement("Litre"), Measurement::Liter);
        assert_eq!(map_unit_to_measurement("stück"), Measurement::Pieces);
        assert_eq!(map_unit_to_measurement(""), Measurement::Pieces);
    }

    #[test]
    fn test_guess_category() {
        assert_eq!(guess_category("Red onions"), "Vegetables");
        assert_eq!(guess_category("Chicken breast"), "Meat");
        assert_eq!(guess_category("Basmati Rice"), "Grains");
        assert_eq!(guess_category("Frozen peas"), "Frozen");
        assert_eq!(guess_category("Xanthan"), "Other");
    }

    #[test]
    fn test_import_ingredients() {
        let store = stocked_store();
        let list = IngredientRepository::new(&store).list(None).unwrap();
        assert_eq!(list.len(), 4);

        let rice = &list[0];
        assert_eq!(rice.id, 1);
        assert_eq!(rice.category, "Grains");
        assert_eq!(rice.measurement, Measurement::Kg);
        assert!((rice.amount - 1.0).abs() < f64::EPSILON);

        let chickpeas = &list[2];
        assert_eq!(chickpeas.measurement, Measurement::Pieces);
        assert_eq!(chickpeas.category, "Canned Goods");
    }

    #[test]
    fn test_import_ingredients_skips_existing() {
        let store = MemoryStore::new();
        IngredientRepository::new(&store)
            .add(&NewIngredient {
                name: "MILK".to_string(),
                category: "Dairy".to_string(),
                measurement: Measurement::Liter,
                amount: 2.0,
            })
            .unwrap();

        let rows = parse_ingredient_csv(INGREDIENTS_CSV.as_bytes()).unwrap();
        let summary = import_ingredients(&store, &rows, false).unwrap();
        assert_eq!(summary.created.len(), 3);
        assert_eq!(summary.skipped_existing, vec!["Milk"]);
    }

    #[test]
    fn test_import_ingredients_dry_run() {
        let store = MemoryStore::new();
        let rows = parse_ingredient_csv(INGREDIENTS_CSV.as_bytes()).unwrap();
        let summary = import_ingredients(&store, &rows, true).unwrap();
        assert_eq!(summary.created.len(), 4);
        assert_eq!(store.saves(), 0);
        assert!(store.load().unwrap().ingredients.is_empty());
    }

    #[test]
    fn test_import_ingredients_adds_unknown_category() {
        let store = MemoryStore::new();
        let rows = parse_ingredient_csv("Name,Unit,Category\nMillet,kg,Side dish\n".as_bytes())
            .unwrap();
        let summary = import_ingredients(&store, &rows, false).unwrap();
        assert_eq!(summary.categories_added, vec!["Side dish"]);
        assert!(
            store
                .load()
                .unwrap()
                .categories
                .contains(&"Side dish".to_string())
        );
    }

    #[test]
    fn test_per_person_grams() {
        assert!((per_person_grams(Some(0.1), Some(0.08)).unwrap().unwrap() - 90.0).abs() < 1e-9);
        assert!((per_person_grams(None, Some(0.12)).unwrap().unwrap() - 120.0).abs() < 1e-9);
        assert!((per_person_grams(Some(0.0333), None).unwrap().unwrap() - 33.3).abs() < 1e-9);
        assert!(per_person_grams(None, None).unwrap().is_none());
        assert!(per_person_grams(Some(0.0), None).unwrap().is_none());
    }

    #[test]
    fn test_per_person_grams_rejects_bad_portions() {
        assert!(per_person_grams(Some(-0.2), None).is_err());
        assert!(per_person_grams(Some(0.1), Some(-0.1)).is_err());
        assert!(per_person_grams(Some(f64::INFINITY), None).is_err());
        assert!(per_person_grams(None, Some(f64::NAN)).is_err());
        assert!(per_person_grams(Some(f64::MAX), None).is_err());
    }

    #[test]
    fn test_parse_recipe_csv_rejects_non_finite_and_negative_cells() {
        for cell in ["inf", "nan", "1e400", "-0.2", "abc"] {
            let csv = format!("Recipe,Ingredient,Meat (kg),Vegi (kg)\nStew,Rice,0.1,\nStew,Rice,{cell},\n");
            let err = parse_recipe_csv(csv.as_bytes()).unwrap_err();
            assert!(format!("{err:#}").contains("row 3"), "{cell}: {err:#}");
        }
    }

    #[test]
    fn test_import_recipes_rejects_invalid_lines_without_saving() {
        let store = stocked_store();
        let saves = store.saves();
        let rows = vec![RecipeRow {
            recipe: "Stew".to_string(),
            ingredient: "Rice".to_string(),
            grams_per_person: f64::NAN,
            comments: None,
        }];
        assert!(import_recipes(&store, &rows, false).is_err());
        assert_eq!(store.saves(), saves);
        assert!(store.load().unwrap().recipes.is_empty());
    }

    #[test]
    fn test_parse_recipe_csv() {
        let rows = parse_recipe_csv(RECIPES_CSV.as_bytes()).unwrap();
        // "Empty,Rice,," has no portion.
        assert_eq!(rows.len(), 7);
        assert_eq!(rows[0].recipe, "Curry");
        assert!((rows[0].grams_per_person - 90.0).abs() < 1e-9);
        assert_eq!(rows[0].comments.as_deref(), Some("Family favourite"));
        assert!(rows[1].comments.is_none());
    }

    #[test]
    fn test_parse_recipe_csv_missing_column() {
        let result = parse_recipe_csv("Recipe,Ingredient,Meat (kg)\nA,B,0.1\n".as_bytes());
        assert!(result.unwrap_err().to_string().contains("Vegi (kg)"));
    }

    #[test]
    fn test_import_recipes() {
        let store = stocked_store();
        let rows = parse_recipe_csv(RECIPES_CSV.as_bytes()).unwrap();
        let summary = import_recipes(&store, &rows, false).unwrap();

        assert_eq!(summary.created, vec!["Curry", "Rice pudding"]);
        assert_eq!(summary.skipped_empty, vec!["Mystery stew"]);
        assert_eq!(summary.unmatched_ingredients, 3);

        let doc = store.load().unwrap();
        let curry = &doc.recipes[0];
        assert_eq!(curry.id, 1);
        assert_eq!(curry.ingredients.len(), 2);
        assert_eq!(
            curry.comments,
            "Family favourite\nMissing ingredients not in database: Lemongrass, Chicken"
        );
        let pudding = &doc.recipes[1];
        assert_eq!(pudding.id, 2);
        assert!(pudding.comments.is_empty());
        assert!((pudding.ingredients[1].quantity_grams - 200.0).abs() < 1e-9);
    }

    #[test]
    fn test_import_recipes_skips_existing_names() {
        let store = stocked_store();
        let rows = parse_recipe_csv(RECIPES_CSV.as_bytes()).unwrap();
        import_recipes(&store, &rows, false).unwrap();
        let again = import_recipes(&store, &rows, false).unwrap();
        assert!(again.created.is_empty());
        assert_eq!(again.skipped_existing, vec!["Curry", "Rice pudding"]);
        assert_eq!(store.load().unwrap().recipes.len(), 2);
    }

    #[test]
    fn test_import_recipes_dry_run() {
        let store = stocked_store();
        let saves = store.saves();
        let rows = parse_recipe_csv(RECIPES_CSV.as_bytes()).unwrap();
        let summary = import_recipes(&store, &rows, true).unwrap();
        assert_eq!(summary.created.len(), 2);
        assert_eq!(store.saves(), saves);
    }
}
