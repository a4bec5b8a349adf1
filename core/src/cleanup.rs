//! Merges duplicate ingredients and corrects categories.
//!
//! Spreadsheet imports leave behind misspellings and translations of the same
//! ingredient ("Carottes", "Carotts", "Carrots"). An [`AliasTable`] lists which
//! names belong together and which category a name should end up in.
//! Planning is pure; applying keeps ingredient ids stable and re-points recipe
//! lines from merged records to the record that was kept.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::models::{Ingredient, Measurement, RecipeLine};
use crate::store::{Document, DocumentStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeRule {
    pub keep: String,
    #[serde(default)]
    pub aliases: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryFix {
    pub name: String,
    pub category: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasTable {
    #[serde(default)]
    pub merges: Vec<MergeRule>,
    #[serde(default)]
    pub category_fixes: Vec<CategoryFix>,
}

const DEFAULT_MERGES: &[(&str, &[&str])] = &[
    ("Carrots", &["Carottes", "Carotts"]),
    ("Carrots julienne", &["Carotts julienne", "carottes cujulienne"]),
    ("Carrot cubes", &["Karotten cut cubes"]),
    ("Celery", &[]),
    ("Celery julienne", &["Sellerie julienne", "cellery julienne"]),
    ("Coconut milk", &["Coconutmilk", "Kokosnussmilch"]),
    ("Onions", &[]),
    ("Onions TK", &["Onion TK", "Zwiebeln tk"]),
    ("Potatoes", &[]),
    ("Potatoes peeled", &["Potatoe peeled"]),
    ("Sweet potatoes", &["Sweet potatoe cut"]),
    ("Rice", &["Reis"]),
    ("Minced meat", &["minced meat Beef"]),
    ("Red Wine", &["redwine"]),
    ("Red Pepper", &["Paprika (rot/gelb) fresh", "red and yellow pepper"]),
    ("Quinoa", &["quiona"]),
    ("Coriander fresh", &["Koriander fresh", "coriander fresh"]),
    ("Chickpeas canned", &["Chickpeas in can"]),
    ("Sour cream", &["sourcream plain", "Sour Cream Eßlöffel"]),
    ("Leek", &["Leach", "Lauch cut"]),
];

const DEFAULT_CATEGORY_FIXES: &[(&str, &[&str])] = &[
    (
        "Side dish",
        &[
            "Rice",
            "Reis",
            "Millet",
            "Quinoa",
            "Kidney Beans",
            "White Beans",
            "Red lentils",
        ],
    ),
    (
        "Vegetables",
        &[
            "Carrots",
            "Carottes",
            "Carotts",
            "Carrots julienne",
            "Carotts julienne",
            "Karotten cut cubes",
            "carottes cujulienne",
            "Celery",
            "Celery julienne",
            "Sellerie julienne",
            "cellery julienne",
            "Leek",
            "Leach",
            "Lauch cut",
            "Cauliflower fresh",
            "Mushrooms fresh",
            "Red Pepper",
            "Paprika (rot/gelb) fresh",
            "red and yellow pepper",
            "Parsley",
        ],
    ),
    (
        "Dairy",
        &[
            "Feta",
            "Joghurt",
            "Parmesan grinded",
            "Coconut milk",
            "Coconutmilk",
            "Kokosnussmilch",
            "Sour cream",
            "sourcream plain",
            "Sour Cream Eßlöffel",
        ],
    ),
    (
        "Spices",
        &[
            "!!!Tandoori masala spice!!!",
            "Ginger paste",
            "Ginger",
            "spice mixture",
            "piment",
            "laurel",
            "juniper",
            "Coriander fresh",
            "Koriander fresh",
            "coriander fresh",
        ],
    ),
    ("Canned Goods", &["Chickpeas canned", "Chickpeas in can"]),
    ("Breakfast", &["Oatmeal (Haferflocken)"]),
    (
        "Other",
        &["olive oil for dressing, lemon juice, mustard, apple juice, honey"],
    ),
];

impl AliasTable {
    /// The merge and category rules for the bundled recipe spreadsheet.
    #[must_use]
    pub fn default_table() -> Self {
        let merges = DEFAULT_MERGES
            .iter()
            .map(|(keep, aliases)| MergeRule {
                keep: (*keep).to_string(),
                aliases: aliases.iter().map(ToString::to_string).collect(),
            })
            .collect();
        let category_fixes = DEFAULT_CATEGORY_FIXES
            .iter()
            .flat_map(|(category, names)| {
                names.iter().map(move |name| CategoryFix {
                    name: (*name).to_string(),
                    category: (*category).to_string(),
                })
            })
            .collect();
        Self {
            merges,
            category_fixes,
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Invalid alias table JSON")
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read alias table: {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("in {}", path.display()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Merge {
    pub from_id: i64,
    pub from_name: String,
    pub into_id: i64,
    pub into_name: String,
    /// Stock of the merged record that cannot be pooled because the keeper
    /// uses a different measurement. It is lost when the plan is applied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dropped: Option<DroppedStock>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DroppedStock {
    pub amount: f64,
    pub measurement: Measurement,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rename {
    pub id: i64,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryChange {
    pub id: i64,
    pub name: String,
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CleanupPlan {
    pub renames: Vec<Rename>,
    pub merges: Vec<Merge>,
    pub category_changes: Vec<CategoryChange>,
}

impl CleanupPlan {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.renames.is_empty() && self.merges.is_empty() && self.category_changes.is_empty()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CleanupSummary {
    pub plan: CleanupPlan,
    pub ingredients_before: usize,
    pub ingredients_after: usize,
    pub recipe_lines_repointed: usize,
    pub categories_added: Vec<String>,
    pub dry_run: bool,
}

fn normalize(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Work out what cleaning `doc` with `table` would change.
///
/// For each merge rule the keeper is the first record named like the rule's
/// keep-name, or failing that the first record under one of its aliases
/// (which is then renamed). Every other record under the keep-name or an
/// alias merges into the keeper. Category fixes match the final name exactly.
#[must_use]
pub fn plan_cleanup(doc: &Document, table: &AliasTable) -> CleanupPlan {
    let mut by_name: HashMap<String, Vec<&Ingredient>> = HashMap::new();
    for ing in &doc.ingredients {
        by_name.entry(normalize(&ing.name)).or_default().push(ing);
    }

    let mut plan = CleanupPlan::default();
    let mut keepers: HashSet<i64> = HashSet::new();
    let mut merged: HashSet<i64> = HashSet::new();
    let mut final_names: HashMap<i64, String> = HashMap::new();
    let available = |id: i64, keepers: &HashSet<i64>, merged: &HashSet<i64>| {
        !keepers.contains(&id) && !merged.contains(&id)
    };

    for rule in &table.merges {
        let keep_key = normalize(&rule.keep);
        let mut keeper = by_name
            .get(&keep_key)
            .and_then(|list| list.iter().find(|i| available(i.id, &keepers, &merged)))
            .copied();

        if keeper.is_none() {
            keeper = rule
                .aliases
                .iter()
                .filter_map(|alias| by_name.get(&normalize(alias)))
                .flatten()
                .find(|i| available(i.id, &keepers, &merged))
                .copied();
            if let Some(k) = keeper {
                plan.renames.push(Rename {
                    id: k.id,
                    from: k.name.clone(),
                    to: rule.keep.clone(),
                });
                final_names.insert(k.id, rule.keep.clone());
            }
        }

        let Some(keeper) = keeper else {
            continue;
        };
        keepers.insert(keeper.id);

        let mut names = vec![keep_key];
        names.extend(rule.aliases.iter().map(|a| normalize(a)));
        for key in &names {
            for dup in by_name.get(key).into_iter().flatten() {
                if !available(dup.id, &keepers, &merged) {
                    continue;
                }
                merged.insert(dup.id);
                let dropped = (dup.measurement != keeper.measurement && dup.amount != 0.0)
                    .then_some(DroppedStock {
                        amount: dup.amount,
                        measurement: dup.measurement,
                    });
                plan.merges.push(Merge {
                    from_id: dup.id,
                    from_name: dup.name.clone(),
                    into_id: keeper.id,
                    into_name: rule.keep.clone(),
                    dropped,
                });
            }
        }
    }

    let fixes: HashMap<&str, &str> = table
        .category_fixes
        .iter()
        .map(|f| (f.name.as_str(), f.category.as_str()))
        .collect();
    for ing in doc.ingredients.iter().filter(|i| !merged.contains(&i.id)) {
        let name = final_names.get(&ing.id).unwrap_or(&ing.name);
        if let Some(&category) = fixes.get(name.as_str()) {
            if ing.category != category {
                plan.category_changes.push(CategoryChange {
                    id: ing.id,
                    name: name.clone(),
                    from: ing.category.clone(),
                    to: category.to_string(),
                });
            }
        }
    }

    plan
}

/// Apply `plan` to `doc` in memory.
///
/// Merged stock is added to the keeper when both use the same measurement.
/// Recipe lines pointing at a merged record are re-pointed to the keeper; two
/// lines that end up on the same ingredient are combined.
/// Returns the number of re-pointed lines and the categories added to the
/// category list.
pub fn apply_plan(doc: &mut Document, plan: &CleanupPlan) -> (usize, Vec<String>) {
    for rename in &plan.renames {
        if let Some(ing) = doc.ingredients.iter_mut().find(|i| i.id == rename.id) {
            ing.name.clone_from(&rename.to);
        }
    }

    let redirect: HashMap<i64, i64> = plan.merges.iter().map(|m| (m.from_id, m.into_id)).collect();
    for merge in &plan.merges {
        let Some(from) = doc.ingredient(merge.from_id).cloned() else {
            continue;
        };
        if let Some(keeper) = doc.ingredients.iter_mut().find(|i| i.id == merge.into_id) {
            if keeper.measurement == from.measurement {
                keeper.amount += from.amount;
            } else if let Some(dropped) = merge.dropped {
                warn!(
                    from = %from.name,
                    into = %keeper.name,
                    amount = dropped.amount,
                    measurement = %dropped.measurement,
                    "Dropping stock with a different measurement"
                );
            }
        }
    }
    doc.ingredients.retain(|i| !redirect.contains_key(&i.id));

    let mut repointed = 0;
    for recipe in &mut doc.recipes {
        if !recipe
            .ingredients
            .iter()
            .any(|l| redirect.contains_key(&l.ingredient_id))
        {
            continue;
        }
        let mut lines: Vec<RecipeLine> = Vec::with_capacity(recipe.ingredients.len());
        for line in &recipe.ingredients {
            let id = match redirect.get(&line.ingredient_id) {
                Some(&to) => {
                    repointed += 1;
                    to
                }
                None => line.ingredient_id,
            };
            match lines.iter_mut().find(|l| l.ingredient_id == id) {
                Some(existing) => existing.quantity_grams += line.quantity_grams,
                None => lines.push(RecipeLine {
                    ingredient_id: id,
                    quantity_grams: line.quantity_grams,
                }),
            }
        }
        recipe.ingredients = lines;
    }

    let mut categories_added = Vec::new();
    for change in &plan.category_changes {
        if let Some(ing) = doc.ingredients.iter_mut().find(|i| i.id == change.id) {
            ing.category.clone_from(&change.to);
        }
        if doc.ensure_category(&change.to) {
            categories_added.push(change.to.clone());
        }
    }

    (repointed, categories_added)
}

/// Plan and apply a cleanup, saving once. With `dry_run` nothing is written.
pub fn apply_cleanup(
    store: &dyn DocumentStore,
    table: &AliasTable,
    dry_run: bool,
) -> Result<CleanupSummary> {
    let mut doc = store.load()?;
    let ingredients_before = doc.ingredients.len();
    let plan = plan_cleanup(&doc, table);
    let (recipe_lines_repointed, categories_added) = apply_plan(&mut doc, &plan);

    if !dry_run && !plan.is_empty() {
        store.save(&doc)?;
    }
    info!(
        dry_run,
        merged = plan.merges.len(),
        renamed = plan.renames.len(),
        recategorized = plan.category_changes.len(),
        recipe_lines_repointed,
        "ingredient cleanup finished"
    );

    Ok(CleanupSummary {
        ingredients_after: doc.ingredients.len(),
        ingredients_before,
        recipe_lines_repointed,
        categories_added,
        plan,
        dry_run,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Measurement, Recipe};
    use crate::store::MemoryStore;

    fn ing(id: i64, name: &str, category: &str, measurement: Measurement, amount: f64) -> Ingredient {
        Ingredient {
            id,
            name: name.to_string(),
            category: category.to_string(),
            measurement,
            amount,
        }
    }

    fn messy_doc() -> Document {
        let mut doc = Document::default();
        doc.ingredients = vec![
            ing(1, "Carottes", "Other", Measurement::Kg, 0.5),
            ing(2, "Carrots", "Other", Measurement::Kg, 1.0),
            ing(3, "Carotts", "Vegetables", Measurement::Pieces, 4.0),
            ing(4, "Reis", "Grains", Measurement::Kg, 2.0),
            ing(5, "Feta", "Other", Measurement::Kg, 0.2),
            ing(6, "Tofu", "Other", Measurement::Kg, 0.4),
        ];
        doc.recipes = vec![Recipe {
            id: 1,
            name: "Carrot rice".to_string(),
            comments: String::new(),
            ingredients: vec![
                RecipeLine {
                    ingredient_id: 1,
                    quantity_grams: 50.0,
                },
                RecipeLine {
                    ingredient_id: 2,
                    quantity_grams: 30.0,
                },
                RecipeLine {
                    ingredient_id: 4,
                    quantity_grams: 120.0,
                },
            ],
            vegie: None,
            tag: None,
        }];
        doc
    }

    #[test]
    fn test_default_table_has_rules() {
        let table = AliasTable::default_table();
        assert_eq!(table.merges.len(), 20);
        let rice = table.merges.iter().find(|m| m.keep == "Rice").unwrap();
        assert_eq!(rice.aliases, vec!["Reis"]);
        assert!(
            table
                .category_fixes
                .iter()
                .any(|f| f.name == "Oatmeal (Haferflocken)" && f.category == "Breakfast")
        );
    }

    #[test]
    fn test_alias_table_from_json() {
        let table = AliasTable::from_json(
            r#"{"merges": [{"keep": "Leek", "aliases": ["Lauch"]}, {"keep": "Celery"}]}"#,
        )
        .unwrap();
        assert_eq!(table.merges.len(), 2);
        assert!(table.merges[1].aliases.is_empty());
        assert!(table.category_fixes.is_empty());
        assert!(AliasTable::from_json("[1, 2]").is_err());
    }

    #[test]
    fn test_plan_prefers_existing_keep_name() {
        let plan = plan_cleanup(&messy_doc(), &AliasTable::default_table());
        let carrot_merges: Vec<_> = plan.merges.iter().filter(|m| m.into_id == 2).collect();
        assert_eq!(carrot_merges.len(), 2);
        assert!(carrot_merges.iter().any(|m| m.from_id == 1));
        assert!(carrot_merges.iter().any(|m| m.from_id == 3));
    }

    #[test]
    fn test_plan_renames_alias_when_keep_name_missing() {
        let plan = plan_cleanup(&messy_doc(), &AliasTable::default_table());
        assert_eq!(
            plan.renames,
            vec![Rename {
                id: 4,
                from: "Reis".to_string(),
                to: "Rice".to_string(),
            }]
        );
        // The renamed record picks up the fix for its new name.
        assert!(
            plan.category_changes
                .iter()
                .any(|c| c.id == 4 && c.name == "Rice" && c.to == "Side dish")
        );
    }

    #[test]
    fn test_plan_is_pure() {
        let doc = messy_doc();
        let before = doc.clone();
        let _ = plan_cleanup(&doc, &AliasTable::default_table());
        assert_eq!(doc, before);
    }

    #[test]
    fn test_apply_repoints_recipe_lines() {
        let store = MemoryStore::with_document(messy_doc());
        let summary = apply_cleanup(&store, &AliasTable::default_table(), false).unwrap();
        assert_eq!(summary.ingredients_before, 6);
        assert_eq!(summary.ingredients_after, 4);
        assert_eq!(summary.recipe_lines_repointed, 1);
        assert_eq!(store.saves(), 1);

        let doc = store.load().unwrap();
        let ids: Vec<i64> = doc.ingredients.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![2, 4, 5, 6]);

        let carrots = doc.ingredient(2).unwrap();
        assert_eq!(carrots.category, "Vegetables");
        // Same-measurement stock is pooled; the pieces record is not.
        assert!((carrots.amount - 1.5).abs() < 1e-9);

        let recipe = &doc.recipes[0];
        assert_eq!(recipe.ingredients.len(), 2);
        assert_eq!(recipe.ingredients[0].ingredient_id, 2);
        assert!((recipe.ingredients[0].quantity_grams - 80.0).abs() < 1e-9);
        assert_eq!(recipe.ingredients[1].ingredient_id, 4);

        assert_eq!(doc.ingredient(4).unwrap().name, "Rice");
        assert_eq!(doc.ingredient(5).unwrap().category, "Dairy");
        assert_eq!(doc.ingredient(6).unwrap().category, "Other");
        assert!(doc.categories.contains(&"Side dish".to_string()));
        assert_eq!(summary.categories_added, vec!["Side dish"]);
    }

    #[test]
    fn test_plan_reports_stock_lost_to_measurement_mismatch() {
        let plan = plan_cleanup(&messy_doc(), &AliasTable::default_table());
        let pieces = plan.merges.iter().find(|m| m.from_id == 3).unwrap();
        assert_eq!(
            pieces.dropped,
            Some(DroppedStock {
                amount: 4.0,
                measurement: Measurement::Pieces,
            })
        );
        let pooled = plan.merges.iter().find(|m| m.from_id == 1).unwrap();
        assert_eq!(pooled.dropped, None);

        let value = serde_json::to_value(&plan).unwrap();
        let merges = value["merges"].as_array().unwrap();
        assert!(merges.iter().any(|m| m["dropped"]["measurement"] == "pieces"));
        assert!(merges.iter().any(|m| m.get("dropped").is_none()));
    }

    #[test]
    fn test_apply_leaves_untouched_recipes_alone() {
        let mut doc = messy_doc();
        doc.recipes.push(Recipe {
            id: 2,
            name: "Tofu twice".to_string(),
            comments: String::new(),
            ingredients: vec![
                RecipeLine {
                    ingredient_id: 6,
                    quantity_grams: 100.0,
                },
                RecipeLine {
                    ingredient_id: 6,
                    quantity_grams: 50.0,
                },
            ],
            vegie: None,
            tag: None,
        });
        let store = MemoryStore::with_document(doc);
        let summary = apply_cleanup(&store, &AliasTable::default_table(), false).unwrap();
        assert_eq!(summary.recipe_lines_repointed, 1);

        let doc = store.load().unwrap();
        let tofu = doc.recipe(2).unwrap();
        assert_eq!(tofu.ingredients.len(), 2);
        assert!((tofu.ingredients[0].quantity_grams - 100.0).abs() < 1e-9);
        assert!((tofu.ingredients[1].quantity_grams - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_apply_dry_run_writes_nothing() {
        let store = MemoryStore::with_document(messy_doc());
        let summary = apply_cleanup(&store, &AliasTable::default_table(), true).unwrap();
        assert!(summary.dry_run);
        assert_eq!(summary.plan.merges.len(), 2);
        assert_eq!(store.saves(), 0);
        assert_eq!(store.load().unwrap(), messy_doc());
    }

    #[test]
    fn test_cleanup_is_idempotent() {
        let store = MemoryStore::with_document(messy_doc());
        let table = AliasTable::default_table();
        apply_cleanup(&store, &table, false).unwrap();
        let second = apply_cleanup(&store, &table, false).unwrap();
        assert!(second.plan.is_empty());
        assert_eq!(store.saves(), 1);
    }
}
