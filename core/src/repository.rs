//! CRUD over the ingredient and recipe collections of the document.
//!
//! Every operation loads the document, applies one change and saves it back.
//! Lookups that miss return `None`/`false` and never write.

use anyhow::Result;
use tracing::debug;

use crate::models::{
    DEFAULT_CATEGORIES, DEFAULT_MEASUREMENTS, Ingredient, NewIngredient, NewRecipe, Recipe,
    UpdateIngredient, UpdateRecipe, validate_ingredient, validate_name, validate_recipe,
};
use crate::store::DocumentStore;

pub struct IngredientRepository<'a> {
    store: &'a dyn DocumentStore,
}

impl<'a> IngredientRepository<'a> {
    pub fn new(store: &'a dyn DocumentStore) -> Self {
        Self { store }
    }

    pub fn add(&self, new: &NewIngredient) -> Result<Ingredient> {
        let mut doc = self.store.load()?;
        let ingredient = Ingredient {
            id: doc.next_ingredient_id(),
            name: new.name.trim().to_string(),
            category: new.category.clone(),
            measurement: new.measurement,
            amount: new.amount,
        };
        validate_ingredient(&ingredient)?;
        doc.ingredients.push(ingredient.clone());
        self.store.save(&doc)?;
        debug!(id = ingredient.id, name = %ingredient.name, "added ingredient");
        Ok(ingredient)
    }

    pub fn get(&self, id: i64) -> Result<Option<Ingredient>> {
        Ok(self.store.load()?.ingredient(id).cloned())
    }

    /// Merge the given fields into the ingredient. Ids never change.
    pub fn update(&self, id: i64, update: &UpdateIngredient) -> Result<Option<Ingredient>> {
        let mut doc = self.store.load()?;
        let Some(existing) = doc.ingredients.iter_mut().find(|i| i.id == id) else {
            return Ok(None);
        };
        let mut updated = existing.clone();
        update.apply_to(&mut updated);
        updated.name = updated.name.trim().to_string();
        validate_ingredient(&updated)?;
        *existing = updated.clone();
        self.store.save(&doc)?;
        debug!(id, "updated ingredient");
        Ok(Some(updated))
    }

    /// Remove the ingredient. Recipe lines that point at it are left in place.
    pub fn delete(&self, id: i64) -> Result<bool> {
        let mut doc = self.store.load()?;
        let before = doc.ingredients.len();
        doc.ingredients.retain(|i| i.id != id);
        if doc.ingredients.len() == before {
            return Ok(false);
        }
        self.store.save(&doc)?;
        debug!(id, "deleted ingredient");
        Ok(true)
    }

    /// All ingredients in stored order, optionally limited to one category
    /// (exact match).
    pub fn list(&self, category: Option<&str>) -> Result<Vec<Ingredient>> {
        let doc = self.store.load()?;
        Ok(doc
            .ingredients
            .into_iter()
            .filter(|i| category.is_none_or(|c| i.category == c))
            .collect())
    }
}

pub struct RecipeRepository<'a> {
    store: &'a dyn DocumentStore,
}

impl<'a> RecipeRepository<'a> {
    pub fn new(store: &'a dyn DocumentStore) -> Self {
        Self { store }
    }

    pub fn add(&self, new: &NewRecipe) -> Result<Recipe> {
        let mut doc = self.store.load()?;
        let recipe = Recipe {
            id: doc.next_recipe_id(),
            name: new.name.trim().to_string(),
            comments: new.comments.clone(),
            ingredients: new.ingredients.clone(),
            vegie: new.vegie.clone(),
            tag: new.tag.clone(),
        };
        validate_recipe(&recipe)?;
        doc.recipes.push(recipe.clone());
        self.store.save(&doc)?;
        debug!(id = recipe.id, name = %recipe.name, lines = recipe.ingredients.len(), "added recipe");
        Ok(recipe)
    }

    pub fn get(&self, id: i64) -> Result<Option<Recipe>> {
        Ok(self.store.load()?.recipe(id).cloned())
    }

    pub fn update(&self, id: i64, update: &UpdateRecipe) -> Result<Option<Recipe>> {
        let mut doc = self.store.load()?;
        let Some(existing) = doc.recipes.iter_mut().find(|r| r.id == id) else {
            return Ok(None);
        };
        let mut updated = existing.clone();
        update.apply_to(&mut updated);
        updated.name = updated.name.trim().to_string();
        validate_recipe(&updated)?;
        *existing = updated.clone();
        self.store.save(&doc)?;
        debug!(id, "updated recipe");
        Ok(Some(updated))
    }

    pub fn delete(&self, id: i64) -> Result<bool> {
        let mut doc = self.store.load()?;
        let before = doc.recipes.len();
        doc.recipes.retain(|r| r.id != id);
        if doc.recipes.len() == before {
            return Ok(false);
        }
        self.store.save(&doc)?;
        debug!(id, "deleted recipe");
        Ok(true)
    }

    pub fn list(&self) -> Result<Vec<Recipe>> {
        Ok(self.store.load()?.recipes)
    }
}

/// The category and measurement lists shown to users.
///
/// An empty or missing list in the document reads as the built-in defaults.
pub struct ReferenceLists<'a> {
    store: &'a dyn DocumentStore,
}

impl<'a> ReferenceLists<'a> {
    pub fn new(store: &'a dyn DocumentStore) -> Self {
        Self { store }
    }

    pub fn categories(&self) -> Result<Vec<String>> {
        let doc = self.store.load()?;
        Ok(or_defaults(doc.categories, DEFAULT_CATEGORIES))
    }

    pub fn measurements(&self) -> Result<Vec<String>> {
        let doc = self.store.load()?;
        Ok(or_defaults(doc.measurements, DEFAULT_MEASUREMENTS))
    }

    /// Append a category if it is not already listed. Returns whether the
    /// list changed.
    pub fn add_category(&self, name: &str) -> Result<bool> {
        let name = name.trim();
        validate_name("Category", name)?;
        let mut doc = self.store.load()?;
        if !doc.ensure_category(name) {
            return Ok(false);
        }
        self.store.save(&doc)?;
        Ok(true)
    }
}

fn or_defaults(list: Vec<String>, defaults: &[&str]) -> Vec<String> {
    if list.is_empty() {
        defaults.iter().map(ToString::to_string).collect()
    } else {
        list
    }
}
