use std::fmt;
use std::str::FromStr;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

/// How the on-hand amount of an ingredient is counted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Measurement {
    Kg,
    Liter,
    Pieces,
}

impl Measurement {
    pub const ALL: [Measurement; 3] = [Measurement::Kg, Measurement::Liter, Measurement::Pieces];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Kg => "kg",
            Self::Liter => "liter",
            Self::Pieces => "pieces",
        }
    }

    /// Convert a stored amount to grams.
    ///
    /// Returns `(grams, is_approximate)`. Liters assume water density
    /// (1 l = 1000 g), so they are flagged approximate. Pieces have no mass and
    /// return `None`.
    #[must_use]
    pub fn to_grams(self, amount: f64) -> Option<(f64, bool)> {
        match self {
            Self::Kg => Some((amount * 1000.0, false)),
            Self::Liter => Some((amount * 1000.0, true)),
            Self::Pieces => None,
        }
    }

    /// Map a free-form spreadsheet/legacy unit onto a measurement.
    ///
    /// Returns the measurement plus the factor that converts a quantity in the
    /// given unit into that measurement (`g` → kg is 0.001). Unknown and
    /// container units (cans, bottles, ...) count as pieces.
    #[must_use]
    pub fn from_legacy_unit(unit: &str) -> (Self, f64) {
        match unit.trim().to_lowercase().as_str() {
            "kg" | "kilogram" | "kilograms" => (Self::Kg, 1.0),
            "g" | "gram" | "grams" => (Self::Kg, 0.001),
            "l" | "liter" | "liters" | "litre" | "litres" => (Self::Liter, 1.0),
            "ml" | "milliliter" | "milliliters" | "millilitre" | "millilitres" => {
                (Self::Liter, 0.001)
            }
            _ => (Self::Pieces, 1.0),
        }
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Measurement {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "kg" => Ok(Self::Kg),
            "liter" | "litre" | "l" => Ok(Self::Liter),
            "pieces" | "piece" | "pcs" => Ok(Self::Pieces),
            _ => bail!(
                "Invalid measurement '{s}'. Must be one of: {}",
                DEFAULT_MEASUREMENTS.join(", ")
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    pub id: i64,
    pub name: String,
    pub category: String,
    pub measurement: Measurement,
    pub amount: f64,
}

#[derive(Debug, Clone)]
pub struct NewIngredient {
    pub name: String,
    pub category: String,
    pub measurement: Measurement,
    pub amount: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateIngredient {
    pub name: Option<String>,
    pub category: Option<String>,
    pub measurement: Option<Measurement>,
    pub amount: Option<f64>,
}

impl UpdateIngredient {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.category.is_none()
            && self.measurement.is_none()
            && self.amount.is_none()
    }

    pub(crate) fn apply_to(&self, ingredient: &mut Ingredient) {
        if let Some(name) = &self.name {
            ingredient.name.clone_from(name);
        }
        if let Some(category) = &self.category {
            ingredient.category.clone_from(category);
        }
        if let Some(measurement) = self.measurement {
            ingredient.measurement = measurement;
        }
        if let Some(amount) = self.amount {
            ingredient.amount = amount;
        }
    }
}

/// One line of a recipe: how much of an ingredient a single person eats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeLine {
    pub ingredient_id: i64,
    pub quantity_grams: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub comments: String,
    #[serde(default)]
    pub ingredients: Vec<RecipeLine>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vegie: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct NewRecipe {
    pub name: String,
    pub comments: String,
    pub ingredients: Vec<RecipeLine>,
    pub vegie: Option<String>,
    pub tag: Option<String>,
}

#[derive(Debug, Clone, Default)]
#[allow(clippy::option_option)]
pub struct UpdateRecipe {
    pub name: Option<String>,
    pub comments: Option<String>,
    pub ingredients: Option<Vec<RecipeLine>>,
    pub vegie: Option<Option<String>>,
    pub tag: Option<Option<String>>,
}

impl UpdateRecipe {
    pub(crate) fn apply_to(&self, recipe: &mut Recipe) {
        if let Some(name) = &self.name {
            recipe.name.clone_from(name);
        }
        if let Some(comments) = &self.comments {
            recipe.comments.clone_from(comments);
        }
        if let Some(lines) = &self.ingredients {
            recipe.ingredients.clone_from(lines);
        }
        if let Some(vegie) = &self.vegie {
            recipe.vegie.clone_from(vegie);
        }
        if let Some(tag) = &self.tag {
            recipe.tag.clone_from(tag);
        }
    }
}

pub const DEFAULT_CATEGORIES: &[&str] = &[
    "Vegetables",
    "Fruits",
    "Meat",
    "Dairy",
    "Grains",
    "Spices",
    "Beverages",
    "Canned Goods",
    "Frozen",
    "Other",
];

pub const DEFAULT_MEASUREMENTS: &[&str] = &["kg", "liter", "pieces"];

pub fn validate_name(kind: &str, name: &str) -> Result<()> {
    if name.trim().is_empty() {
        bail!("{kind} name must not be empty");
    }
    Ok(())
}

/// Stock amounts must be finite and non-negative.
pub fn validate_amount(amount: f64) -> Result<()> {
    if !amount.is_finite() {
        bail!("amount must be a finite number");
    }
    if amount < 0.0 {
        bail!("amount must not be negative (got {amount})");
    }
    Ok(())
}

pub fn validate_recipe_lines(lines: &[RecipeLine]) -> Result<()> {
    for line in lines {
        let q = line.quantity_grams;
        if !q.is_finite() || q < 0.0 {
            bail!(
                "quantity_grams for ingredient {} must be a non-negative number (got {q})",
                line.ingredient_id
            );
        }
    }
    Ok(())
}

pub fn validate_ingredient(ingredient: &Ingredient) -> Result<()> {
    validate_name("Ingredient", &ingredient.name)?;
    validate_amount(ingredient.amount)
}

pub fn validate_recipe(recipe: &Recipe) -> Result<()> {
    validate_name("Recipe", &recipe.name)?;
    validate_recipe_lines(&recipe.ingredients)
}
