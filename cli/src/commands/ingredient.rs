use anyhow::{Result, bail};

use pantry_core::models::{Measurement, NewIngredient, UpdateIngredient};
use pantry_core::service::PantryService;

use super::helpers::{exit_not_found, format_stock, parse_amount, print_ingredient_table};

pub(crate) fn cmd_ingredient_add(
    svc: &PantryService,
    name: &str,
    category: &str,
    measurement: &str,
    amount: &str,
    json: bool,
) -> Result<()> {
    let measurement: Measurement = measurement.parse()?;
    let ingredient = svc.add_ingredient(&NewIngredient {
        name: name.to_string(),
        category: category.to_string(),
        measurement,
        amount: parse_amount(amount)?,
    })?;

    if json {
        println!("{}", serde_json::to_string_pretty(&ingredient)?);
    } else {
        let id = ingredient.id;
        let stock = format_stock(ingredient.measurement, ingredient.amount);
        println!("Added ingredient: {} (id: {id}, {stock})", ingredient.name);
        if !svc.categories()?.contains(&ingredient.category) {
            eprintln!(
                "Note: category '{}' is not in the category list. Add it with: pantry categories --add \"{}\"",
                ingredient.category, ingredient.category
            );
        }
    }
    Ok(())
}

pub(crate) fn cmd_ingredient_list(
    svc: &PantryService,
    category: Option<&str>,
    json: bool,
) -> Result<()> {
    let ingredients = svc.list_ingredients(category)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&ingredients)?);
        return Ok(());
    }

    if ingredients.is_empty() {
        match category {
            Some(c) => eprintln!("No ingredients in category '{c}'."),
            None => eprintln!("No ingredients yet. Add one with: pantry ingredient add <name>"),
        }
        return Ok(());
    }

    print_ingredient_table(&ingredients);
    Ok(())
}

pub(crate) fn cmd_ingredient_show(svc: &PantryService, id: i64, json: bool) -> Result<()> {
    let Some(ingredient) = svc.get_ingredient(id)? else {
        exit_not_found(&format!("Ingredient {id} not found"), json);
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&ingredient)?);
        return Ok(());
    }

    println!("=== {} ===", ingredient.name);
    println!("  ID:       {}", ingredient.id);
    println!("  Category: {}", ingredient.category);
    println!(
        "  Stock:    {}",
        format_stock(ingredient.measurement, ingredient.amount)
    );

    let used_in: Vec<String> = svc
        .list_recipes()?
        .into_iter()
        .filter(|r| r.ingredients.iter().any(|l| l.ingredient_id == id))
        .map(|r| r.name)
        .collect();
    if !used_in.is_empty() {
        println!("  Used in:  {}", used_in.join(", "));
    }
    Ok(())
}

pub(crate) fn cmd_ingredient_update(
    svc: &PantryService,
    id: i64,
    update: &UpdateIngredient,
    json: bool,
) -> Result<()> {
    if update.is_empty() {
        bail!("Nothing to update. Pass at least one of --name, --category, --measurement, --amount");
    }

    let Some(ingredient) = svc.update_ingredient(id, update)? else {
        exit_not_found(&format!("Ingredient {id} not found"), json);
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&ingredient)?);
    } else {
        let stock = format_stock(ingredient.measurement, ingredient.amount);
        println!(
            "Updated ingredient {id}: {} [{}] {stock}",
            ingredient.name, ingredient.category
        );
    }
    Ok(())
}

pub(crate) fn cmd_ingredient_delete(svc: &PantryService, id: i64, json: bool) -> Result<()> {
    if !svc.delete_ingredient(id)? {
        exit_not_found(&format!("Ingredient {id} not found"), json);
    }

    if json {
        println!("{}", serde_json::json!({ "deleted": id }));
    } else {
        println!("Deleted ingredient {id}");
    }
    Ok(())
}
