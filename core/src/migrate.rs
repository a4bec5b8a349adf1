//! Schema upgrades for the pantry document.
//!
//! Documents carry a `schema_version`. A document without one predates
//! versioning and is treated as version 0. Each upgrade step runs on the raw
//! JSON value so that old shapes never need a Rust type of their own.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::Local;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::models::Measurement;

pub const CURRENT_SCHEMA_VERSION: u32 = 2;

/// Ingredient fields from the pre-versioned stock layout.
const LEGACY_STOCK_FIELDS: &[&str] = &["unit", "weight_per_unit", "num_units", "quantity"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MigrationOutcome {
    pub from: u32,
    pub to: u32,
    pub applied: Vec<&'static str>,
}

impl MigrationOutcome {
    #[must_use]
    pub fn changed(&self) -> bool {
        !self.applied.is_empty()
    }
}

/// Read the schema version of a raw document. Missing means 0.
pub fn schema_version(doc: &Value) -> Result<u32> {
    match doc.get("schema_version") {
        None | Some(Value::Null) => Ok(0),
        Some(v) => v
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .with_context(|| format!("Invalid schema_version: {v}")),
    }
}

/// Upgrade `doc` in place to [`CURRENT_SCHEMA_VERSION`].
///
/// Running this on an already current document is a no-op.
pub fn migrate(doc: &mut Value) -> Result<MigrationOutcome> {
    let version = schema_version(doc)?;
    if version > CURRENT_SCHEMA_VERSION {
        bail!(
            "Data file has schema version {version}, newer than supported version {CURRENT_SCHEMA_VERSION}. Upgrade pantry to read it."
        );
    }

    let obj = doc
        .as_object_mut()
        .context("Data file must contain a JSON object at the top level")?;
    let mut applied = Vec::new();

    if version < 1 {
        let converted = split_legacy_stock(obj)?;
        debug!(converted, "converted legacy stock fields");
        obj.insert("schema_version".to_string(), Value::from(1));
        applied.push("legacy stock fields to measurement/amount");
    }

    if version < 2 {
        rename_units_list(obj);
        obj.insert("schema_version".to_string(), Value::from(2));
        applied.push("units list renamed to measurements");
    }

    if !applied.is_empty() {
        info!(
            from = version,
            to = CURRENT_SCHEMA_VERSION,
            steps = applied.len(),
            "migrated data document"
        );
    }

    Ok(MigrationOutcome {
        from: version,
        to: CURRENT_SCHEMA_VERSION,
        applied,
    })
}

/// Replace `unit`/`weight_per_unit`/`num_units`/`quantity` with
/// `measurement`/`amount`. Returns how many ingredients were converted.
fn split_legacy_stock(doc: &mut Map<String, Value>) -> Result<usize> {
    let Some(ingredients) = doc.get_mut("ingredients") else {
        return Ok(0);
    };
    let ingredients = ingredients
        .as_array_mut()
        .context("'ingredients' must be a JSON array")?;

    let mut converted = 0;
    for item in ingredients {
        let Some(record) = item.as_object_mut() else {
            continue;
        };
        if !LEGACY_STOCK_FIELDS.iter().any(|f| record.contains_key(*f)) {
            continue;
        }

        let unit = record
            .get("unit")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let num_units = number_field(record, "num_units");
        let total = number_field(record, "quantity").or_else(|| {
            let per_unit = number_field(record, "weight_per_unit")?;
            Some(per_unit * num_units?)
        });

        let (measurement, factor) = Measurement::from_legacy_unit(&unit);
        let amount = match measurement {
            Measurement::Pieces => num_units.or(total).unwrap_or(0.0),
            Measurement::Kg | Measurement::Liter => total.unwrap_or(0.0) * factor,
        };

        if !record.contains_key("measurement") {
            record.insert(
                "measurement".to_string(),
                Value::from(measurement.as_str()),
            );
        }
        if !record.contains_key("amount") {
            record.insert("amount".to_string(), Value::from(amount.max(0.0)));
        }
        for field in LEGACY_STOCK_FIELDS {
            record.remove(*field);
        }
        converted += 1;
    }
    Ok(converted)
}

fn number_field(record: &Map<String, Value>, key: &str) -> Option<f64> {
    match record.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Move the old `units` list to `measurements`, normalized to the measurement
/// names and deduplicated. An explicit `measurements` list wins.
fn rename_units_list(doc: &mut Map<String, Value>) {
    let legacy = doc.remove("units");
    if doc.contains_key("measurements") {
        return;
    }
    let Some(Value::Array(units)) = legacy else {
        return;
    };

    let mut names: Vec<&'static str> = Vec::new();
    for unit in units.iter().filter_map(Value::as_str) {
        let name = Measurement::from_legacy_unit(unit).0.as_str();
        if !names.contains(&name) {
            names.push(name);
        }
    }
    doc.insert(
        "measurements".to_string(),
        Value::from(names.into_iter().map(Value::from).collect::<Vec<_>>()),
    );
}

/// `storage_data.json` → `storage_data.backup-20240101093000.json`
#[must_use]
pub fn backup_path(path: &Path, stamp: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .map_or_else(|| "data".into(), |s| s.to_string_lossy());
    let ext = path
        .extension()
        .map_or_else(|| "json".into(), |s| s.to_string_lossy());
    path.with_file_name(format!("{stem}.backup-{stamp}.{ext}"))
}

/// Copy the current file aside before it is rewritten in a newer schema.
pub fn write_backup(path: &Path) -> Result<PathBuf> {
    let stamp = Local::now().format("%Y%m%d%H%M%S").to_string();
    let mut target = backup_path(path, &stamp);
    let mut n = 1;
    while target.exists() {
        target = backup_path(path, &format!("{stamp}-{n}"));
        n += 1;
    }
    fs::copy(path, &target).with_context(|| {
        format!(
            "Failed to back up {} to {} before migrating",
            path.display(),
            target.display()
        )
    })?;
    info!(backup = %target.display(), "wrote pre-migration backup");
    Ok(target)
}
