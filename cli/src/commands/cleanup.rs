use std::path::Path;

use anyhow::Result;

use pantry_core::cleanup::AliasTable;
use pantry_core::service::PantryService;

pub(crate) fn cmd_cleanup(
    svc: &PantryService,
    aliases: Option<&Path>,
    dry_run: bool,
    json: bool,
) -> Result<()> {
    let table = match aliases {
        Some(path) => AliasTable::from_file(path)?,
        None => AliasTable::default_table(),
    };

    let summary = svc.cleanup(&table, dry_run)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    let plan = &summary.plan;
    if plan.is_empty() {
        println!("Nothing to clean up.");
        return Ok(());
    }

    for r in &plan.renames {
        println!("Rename:   '{}' (ID {}) -> '{}'", r.from, r.id, r.to);
    }
    for m in &plan.merges {
        println!(
            "Merge:    '{}' (ID {}) -> '{}' (ID {})",
            m.from_name, m.from_id, m.into_name, m.into_id
        );
        if let Some(d) = m.dropped {
            println!(
                "          stock of {} {} is dropped (different measurement)",
                d.amount, d.measurement
            );
        }
    }
    for c in &plan.category_changes {
        println!("Category: '{}' {} -> {}", c.name, c.from, c.to);
    }

    println!();
    if dry_run {
        println!("Dry run, no changes made.");
    }
    println!(
        "Ingredients: {} -> {}",
        summary.ingredients_before, summary.ingredients_after
    );
    println!("Recipe lines re-pointed: {}", summary.recipe_lines_repointed);
    if !summary.categories_added.is_empty() {
        println!("New categories: {}", summary.categories_added.join(", "));
    }
    Ok(())
}
