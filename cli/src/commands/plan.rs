use anyhow::Result;

use pantry_core::service::PantryService;

use super::helpers::{exit_not_found, print_requirement_table, truncate};

pub(crate) fn cmd_plan(svc: &PantryService, recipe_id: i64, people: u32, json: bool) -> Result<()> {
    let Some(report) = svc.compute_requirements(recipe_id, people)? else {
        exit_not_found(&format!("Recipe {recipe_id} not found"), json);
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let name = &report.recipe_name;
    println!("=== {name} for {people} ===\n");

    if report.lines.is_empty() {
        println!("  This recipe has no ingredients in the pantry.");
        return Ok(());
    }

    print_requirement_table(&report);

    if report.all_sufficient() {
        println!("\nEverything is in stock.");
        return Ok(());
    }

    let shopping: Vec<_> = report.shopping_list().collect();
    if !shopping.is_empty() {
        println!("\nSHOPPING LIST:");
        for (item, grams) in shopping {
            println!("  {} - {grams:.1}g", truncate(item, 35));
        }
    }

    let manual: Vec<_> = report.needs_manual_check().collect();
    if !manual.is_empty() {
        let doc = svc.document()?;
        println!("\nCHECK BY HAND (counted in pieces):");
        for line in manual {
            let pieces = doc.ingredient(line.ingredient_id).map_or(0.0, |i| i.amount);
            println!(
                "  {} - {:.1}g needed, {pieces:.0} pcs in stock",
                truncate(&line.name, 35),
                line.required_quantity,
            );
        }
    }

    if report.lines.iter().any(|l| l.approximate) {
        println!("\n~ liters converted to grams assuming water density");
    }
    Ok(())
}
