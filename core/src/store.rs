//! Persistence for the pantry document.
//!
//! The whole pantry (ingredients, recipes and reference lists) lives in one
//! JSON document. Every mutation is load, change, save.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::migrate::{self, CURRENT_SCHEMA_VERSION, MigrationOutcome};
use crate::models::{DEFAULT_CATEGORIES, DEFAULT_MEASUREMENTS, Ingredient, Recipe};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub schema_version: u32,
    #[serde(default)]
    pub ingredients: Vec<Ingredient>,
    #[serde(default)]
    pub recipes: Vec<Recipe>,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default, alias = "units")]
    pub measurements: Vec<String>,
}

impl Default for Document {
    /// The document used when no data file exists yet.
    fn default() -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            ingredients: Vec::new(),
            recipes: Vec::new(),
            categories: DEFAULT_CATEGORIES.iter().map(ToString::to_string).collect(),
            measurements: DEFAULT_MEASUREMENTS.iter().map(ToString::to_string).collect(),
        }
    }
}

impl Document {
    #[must_use]
    pub fn ingredient(&self, id: i64) -> Option<&Ingredient> {
        self.ingredients.iter().find(|i| i.id == id)
    }

    #[must_use]
    pub fn recipe(&self, id: i64) -> Option<&Recipe> {
        self.recipes.iter().find(|r| r.id == id)
    }

    /// One more than the largest ingredient id, or 1 when empty.
    #[must_use]
    pub fn next_ingredient_id(&self) -> i64 {
        self.ingredients.iter().map(|i| i.id).max().unwrap_or(0) + 1
    }

    #[must_use]
    pub fn next_recipe_id(&self) -> i64 {
        self.recipes.iter().map(|r| r.id).max().unwrap_or(0) + 1
    }

    /// Append `name` to the category list unless it is already there.
    /// An empty list stands for the defaults, so those are written out first.
    pub fn ensure_category(&mut self, name: &str) -> bool {
        if self.categories.is_empty() {
            self.categories = DEFAULT_CATEGORIES.iter().map(ToString::to_string).collect();
        }
        if self.categories.iter().any(|c| c == name) {
            return false;
        }
        self.categories.push(name.to_string());
        true
    }
}

/// Where the pantry document is kept.
///
/// Implementations must hand back exactly what was last saved. The store does
/// not lock: two writers interleaving load/save will lose one update.
pub trait DocumentStore: Send + Sync {
    fn load(&self) -> Result<Document>;
    fn save(&self, doc: &Document) -> Result<()>;
}

/// A migration that was applied while reading a data file.
#[derive(Debug, Clone, Serialize)]
pub struct AppliedMigration {
    pub outcome: MigrationOutcome,
    pub backup: PathBuf,
}

/// Stores the document as pretty-printed JSON in a single file.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the document, upgrading the file on disk if it is in an older
    /// schema. The old file is copied aside first; if that copy fails the
    /// file is left untouched and the error is returned.
    pub fn load_migrated(&self) -> Result<(Document, Option<AppliedMigration>)> {
        self.load_migrated_with(migrate::write_backup)
    }

    fn load_migrated_with(
        &self,
        backup: impl FnOnce(&Path) -> Result<PathBuf>,
    ) -> Result<(Document, Option<AppliedMigration>)> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "data file missing, using defaults");
            return Ok((Document::default(), None));
        }

        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read data file: {}", self.path.display()))?;
        let mut value: serde_json::Value = serde_json::from_str(&raw)
            .with_context(|| format!("Data file is not valid JSON: {}", self.path.display()))?;

        let outcome = migrate::migrate(&mut value)?;
        let doc: Document = serde_json::from_value(value)
            .with_context(|| format!("Data file has an invalid shape: {}", self.path.display()))?;

        if !outcome.changed() {
            return Ok((doc, None));
        }

        let backup = backup(&self.path)?;
        self.save(&doc)?;
        Ok((doc, Some(AppliedMigration { outcome, backup })))
    }
}

impl DocumentStore for JsonFileStore {
    fn load(&self) -> Result<Document> {
        self.load_migrated().map(|(doc, _)| doc)
    }

    fn save(&self, doc: &Document) -> Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create data directory: {}", dir.display()))?;

        // Write next to the target so the rename stays on one filesystem.
        let mut tmp = NamedTempFile::new_in(&dir)
            .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
        serde_json::to_writer_pretty(&mut tmp, doc)?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)
            .map_err(|e| e.error)
            .with_context(|| format!("Failed to write data file: {}", self.path.display()))?;

        info!(
            path = %self.path.display(),
            ingredients = doc.ingredients.len(),
            recipes = doc.recipes.len(),
            "saved data file"
        );
        Ok(())
    }
}

/// Keeps the document in memory. Used by tests and `--dry-run` style callers.
#[derive(Default)]
pub struct MemoryStore {
    doc: Mutex<Option<Document>>,
    saves: Mutex<usize>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_document(doc: Document) -> Self {
        Self {
            doc: Mutex::new(Some(doc)),
            saves: Mutex::new(0),
        }
    }

    /// Number of times [`DocumentStore::save`] has been called.
    #[must_use]
    pub fn saves(&self) -> usize {
        *self.saves.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DocumentStore for MemoryStore {
    fn load(&self) -> Result<Document> {
        let doc = self.doc.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(doc.clone().unwrap_or_default())
    }

    fn save(&self, doc: &Document) -> Result<()> {
        *self.doc.lock().unwrap_or_else(PoisonError::into_inner) = Some(doc.clone());
        *self.saves.lock().unwrap_or_else(PoisonError::into_inner) += 1;
        Ok(())
    }
}
