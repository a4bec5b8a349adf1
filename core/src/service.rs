use std::path::Path;

use anyhow::Result;

use crate::cleanup::{self, AliasTable, CleanupSummary};
use crate::import::{self, IngredientImportSummary, RecipeImportSummary};
use crate::models::{
    Ingredient, NewIngredient, NewRecipe, Recipe, RecipeLine, UpdateIngredient, UpdateRecipe,
};
use crate::planner::{self, RequirementReport};
use crate::repository::{IngredientRepository, RecipeRepository, ReferenceLists};
use crate::store::{Document, DocumentStore, JsonFileStore, MemoryStore};

/// Entry point for frontends. Owns the document store and hands out the
/// repositories and calculator over it.
pub struct PantryService {
    store: Box<dyn DocumentStore>,
}

impl PantryService {
    pub fn new(data_path: &Path) -> Self {
        Self::with_store(Box::new(JsonFileStore::new(data_path)))
    }

    #[must_use]
    pub fn new_in_memory() -> Self {
        Self::with_store(Box::new(MemoryStore::new()))
    }

    #[must_use]
    pub fn with_store(store: Box<dyn DocumentStore>) -> Self {
        Self { store }
    }

    #[must_use]
    pub fn ingredients(&self) -> IngredientRepository<'_> {
        IngredientRepository::new(self.store.as_ref())
    }

    #[must_use]
    pub fn recipes(&self) -> RecipeRepository<'_> {
        RecipeRepository::new(self.store.as_ref())
    }

    #[must_use]
    pub fn reference_lists(&self) -> ReferenceLists<'_> {
        ReferenceLists::new(self.store.as_ref())
    }

    pub fn document(&self) -> Result<Document> {
        self.store.load()
    }

    // --- Ingredients ---

    pub fn add_ingredient(&self, new: &NewIngredient) -> Result<Ingredient> {
        self.ingredients().add(new)
    }

    pub fn get_ingredient(&self, id: i64) -> Result<Option<Ingredient>> {
        self.ingredients().get(id)
    }

    pub fn update_ingredient(
        &self,
        id: i64,
        update: &UpdateIngredient,
    ) -> Result<Option<Ingredient>> {
        self.ingredients().update(id, update)
    }

    pub fn delete_ingredient(&self, id: i64) -> Result<bool> {
        self.ingredients().delete(id)
    }

    pub fn list_ingredients(&self, category: Option<&str>) -> Result<Vec<Ingredient>> {
        self.ingredients().list(category)
    }

    // --- Recipes ---

    pub fn add_recipe(&self, new: &NewRecipe) -> Result<Recipe> {
        self.recipes().add(new)
    }

    pub fn get_recipe(&self, id: i64) -> Result<Option<Recipe>> {
        self.recipes().get(id)
    }

    pub fn update_recipe(&self, id: i64, update: &UpdateRecipe) -> Result<Option<Recipe>> {
        self.recipes().update(id, update)
    }

    pub fn delete_recipe(&self, id: i64) -> Result<bool> {
        self.recipes().delete(id)
    }

    pub fn list_recipes(&self) -> Result<Vec<Recipe>> {
        self.recipes().list()
    }

    /// Append a line to a recipe, or replace the quantity if the recipe
    /// already uses that ingredient. `None` when the recipe does not exist.
    pub fn set_recipe_line(
        &self,
        recipe_id: i64,
        ingredient_id: i64,
        quantity_grams: f64,
    ) -> Result<Option<Recipe>> {
        let Some(recipe) = self.get_recipe(recipe_id)? else {
            return Ok(None);
        };
        let mut lines = recipe.ingredients;
        match lines.iter_mut().find(|l| l.ingredient_id == ingredient_id) {
            Some(line) => line.quantity_grams = quantity_grams,
            None => lines.push(RecipeLine {
                ingredient_id,
                quantity_grams,
            }),
        }
        self.update_recipe(
            recipe_id,
            &UpdateRecipe {
                ingredients: Some(lines),
                ..Default::default()
            },
        )
    }

    // --- Requirements ---

    pub fn compute_requirements(
        &self,
        recipe_id: i64,
        num_people: u32,
    ) -> Result<Option<RequirementReport>> {
        planner::compute(self.store.as_ref(), recipe_id, num_people)
    }

    // --- Reference lists ---

    pub fn categories(&self) -> Result<Vec<String>> {
        self.reference_lists().categories()
    }

    pub fn measurements(&self) -> Result<Vec<String>> {
        self.reference_lists().measurements()
    }

    pub fn add_category(&self, name: &str) -> Result<bool> {
        self.reference_lists().add_category(name)
    }

    // --- Bulk import ---

    pub fn import_ingredients_csv(
        &self,
        csv_data: &str,
        dry_run: bool,
    ) -> Result<IngredientImportSummary> {
        let rows = import::parse_ingredient_csv(csv_data.as_bytes())?;
        import::import_ingredients(self.store.as_ref(), &rows, dry_run)
    }

    pub fn import_recipes_csv(&self, csv_data: &str, dry_run: bool) -> Result<RecipeImportSummary> {
        let rows = import::parse_recipe_csv(csv_data.as_bytes())?;
        import::import_recipes(self.store.as_ref(), &rows, dry_run)
    }

    // --- Cleanup ---

    pub fn cleanup(&self, table: &AliasTable, dry_run: bool) -> Result<CleanupSummary> {
        cleanup::apply_cleanup(self.store.as_ref(), table, dry_run)
    }
}
