//! Scales a recipe to a head count and checks it against stock.
//!
//! Recipe lines are per-person grams. Stock is compared in grams: kilograms
//! convert exactly, liters assume water density, pieces cannot be compared.

use anyhow::Result;
use serde::Serialize;
use tracing::debug;

use crate::models::{Ingredient, Measurement, Recipe};
use crate::store::{Document, DocumentStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LineStatus {
    Sufficient,
    Missing,
    NeedsManualCheck,
}

impl LineStatus {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Sufficient => "ok",
            Self::Missing => "missing",
            Self::NeedsManualCheck => "check",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RequirementLine {
    pub ingredient_id: i64,
    pub name: String,
    pub category: String,
    pub measurement: Measurement,
    pub required_quantity: f64,
    pub available_quantity: f64,
    pub unit: &'static str,
    pub can_compare: bool,
    /// Stock was converted from liters assuming water density.
    pub approximate: bool,
    pub is_sufficient: bool,
    pub shortfall: f64,
    pub status: LineStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct RequirementReport {
    pub recipe_id: i64,
    pub recipe_name: String,
    pub num_people: u32,
    pub lines: Vec<RequirementLine>,
}

impl RequirementReport {
    pub fn sufficient(&self) -> impl Iterator<Item = &RequirementLine> {
        self.with_status(LineStatus::Sufficient)
    }

    pub fn missing(&self) -> impl Iterator<Item = &RequirementLine> {
        self.with_status(LineStatus::Missing)
    }

    pub fn needs_manual_check(&self) -> impl Iterator<Item = &RequirementLine> {
        self.with_status(LineStatus::NeedsManualCheck)
    }

    /// What to buy: the missing lines with their shortfall in grams.
    /// Piece-counted lines are left to [`Self::needs_manual_check`].
    pub fn shopping_list(&self) -> impl Iterator<Item = (&str, f64)> {
        self.missing().map(|l| (l.name.as_str(), l.shortfall))
    }

    #[must_use]
    pub fn all_sufficient(&self) -> bool {
        self.lines.iter().all(|l| l.status == LineStatus::Sufficient)
    }

    fn with_status(&self, status: LineStatus) -> impl Iterator<Item = &RequirementLine> {
        self.lines.iter().filter(move |l| l.status == status)
    }
}

/// Compute the requirement line for one ingredient at `per_person_grams`.
#[must_use]
pub fn requirement_line(
    ingredient: &Ingredient,
    per_person_grams: f64,
    num_people: u32,
) -> RequirementLine {
    let required = per_person_grams * f64::from(num_people);

    let (available, can_compare, approximate) =
        match ingredient.measurement.to_grams(ingredient.amount) {
            Some((grams, approx)) => (grams, true, approx),
            None => (0.0, false, false),
        };

    let (is_sufficient, shortfall, status) = if can_compare {
        let shortfall = (required - available).max(0.0);
        if available >= required {
            (true, shortfall, LineStatus::Sufficient)
        } else {
            (false, shortfall, LineStatus::Missing)
        }
    } else {
        (false, required, LineStatus::NeedsManualCheck)
    };

    RequirementLine {
        ingredient_id: ingredient.id,
        name: ingredient.name.clone(),
        category: ingredient.category.clone(),
        measurement: ingredient.measurement,
        required_quantity: required,
        available_quantity: available,
        unit: "g",
        can_compare,
        approximate,
        is_sufficient,
        shortfall,
        status,
    }
}

/// Build the report for `recipe` against the ingredients in `doc`.
///
/// Lines whose ingredient no longer exists are dropped.
#[must_use]
pub fn build_report(doc: &Document, recipe: &Recipe, num_people: u32) -> RequirementReport {
    let mut lines = Vec::with_capacity(recipe.ingredients.len());
    for line in &recipe.ingredients {
        match doc.ingredient(line.ingredient_id) {
            Some(ingredient) => {
                lines.push(requirement_line(ingredient, line.quantity_grams, num_people));
            }
            None => {
                debug!(
                    recipe_id = recipe.id,
                    ingredient_id = line.ingredient_id,
                    "skipping recipe line for missing ingredient"
                );
            }
        }
    }
    RequirementReport {
        recipe_id: recipe.id,
        recipe_name: recipe.name.clone(),
        num_people,
        lines,
    }
}

/// Load the document once and report what `recipe_id` needs for
/// `num_people`. `None` when the recipe does not exist.
pub fn compute(
    store: &dyn DocumentStore,
    recipe_id: i64,
    num_people: u32,
) -> Result<Option<RequirementReport>> {
    let doc = store.load()?;
    Ok(doc
        .recipe(recipe_id)
        .map(|recipe| build_report(&doc, recipe, num_people)))
}
