use std::path::Path;

use anyhow::{Context, Result};

use pantry_core::service::PantryService;

use super::helpers::exit_not_found;

fn read_csv(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read file: {}", path.display()))
}

pub(crate) fn cmd_import_ingredients(
    svc: &PantryService,
    path: &Path,
    dry_run: bool,
    json: bool,
) -> Result<()> {
    let summary = svc.import_ingredients_csv(&read_csv(path)?, dry_run)?;
    if summary.rows_parsed == 0 {
        exit_not_found("No ingredient rows found in CSV file", json);
    }

    if json {
        let mut value = serde_json::to_value(&summary)?;
        value["dry_run"] = dry_run.into();
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    if dry_run {
        println!("Dry run, no changes made.\n");
        println!("  Rows parsed:          {}", summary.rows_parsed);
        println!("  Ingredients to add:   {}", summary.created.len());
    } else {
        println!("Import complete.\n");
        println!("  Rows parsed:          {}", summary.rows_parsed);
        println!("  Ingredients added:    {}", summary.created.len());
    }
    println!("  Already in pantry:    {}", summary.skipped_existing.len());
    if !summary.categories_added.is_empty() {
        println!("  New categories:       {}", summary.categories_added.join(", "));
    }
    Ok(())
}

pub(crate) fn cmd_import_recipes(
    svc: &PantryService,
    path: &Path,
    dry_run: bool,
    json: bool,
) -> Result<()> {
    let summary = svc.import_recipes_csv(&read_csv(path)?, dry_run)?;
    if summary.rows_parsed == 0 {
        exit_not_found("No recipe rows found in CSV file", json);
    }

    if json {
        let mut value = serde_json::to_value(&summary)?;
        value["dry_run"] = dry_run.into();
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    if dry_run {
        println!("Dry run, no changes made.\n");
        println!("  Rows parsed:            {}", summary.rows_parsed);
        println!("  Recipes to add:         {}", summary.created.len());
    } else {
        println!("Import complete.\n");
        println!("  Rows parsed:            {}", summary.rows_parsed);
        println!("  Recipes added:          {}", summary.created.len());
    }
    println!("  Already in pantry:      {}", summary.skipped_existing.len());
    println!("  Skipped (no matches):   {}", summary.skipped_empty.len());
    println!("  Unmatched ingredients:  {}", summary.unmatched_ingredients);
    Ok(())
}
