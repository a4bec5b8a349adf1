use anyhow::{Result, bail};

use pantry_core::models::{NewRecipe, UpdateRecipe};
use pantry_core::service::PantryService;

use super::helpers::{
    exit_not_found, format_stock, parse_grams, parse_line_spec, print_recipe_table, truncate,
};

pub(crate) fn cmd_recipe_add(
    svc: &PantryService,
    name: &str,
    comments: Option<String>,
    lines: &[String],
    vegie: Option<String>,
    tag: Option<String>,
    json: bool,
) -> Result<()> {
    let ingredients = lines
        .iter()
        .map(|l| parse_line_spec(l))
        .collect::<Result<Vec<_>>>()?;

    let recipe = svc.add_recipe(&NewRecipe {
        name: name.to_string(),
        comments: comments.unwrap_or_default(),
        ingredients,
        vegie,
        tag,
    })?;

    if json {
        println!("{}", serde_json::to_string_pretty(&recipe)?);
    } else {
        let id = recipe.id;
        println!("Created recipe: {} (id: {id})", recipe.name);
        if recipe.ingredients.is_empty() {
            println!("Add ingredients with: pantry recipe add-line {id} <ingredient_id> <grams>");
        }
    }
    Ok(())
}

pub(crate) fn cmd_recipe_add_line(
    svc: &PantryService,
    recipe_id: i64,
    ingredient_id: i64,
    quantity: &str,
    json: bool,
) -> Result<()> {
    let grams = parse_grams(quantity)?;
    let Some(ingredient) = svc.get_ingredient(ingredient_id)? else {
        bail!("Ingredient {ingredient_id} does not exist");
    };
    let Some(recipe) = svc.set_recipe_line(recipe_id, ingredient_id, grams)? else {
        exit_not_found(&format!("Recipe {recipe_id} not found"), json);
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&recipe)?);
    } else {
        println!(
            "{}: {grams}g of {} per person",
            recipe.name, ingredient.name
        );
    }
    Ok(())
}

pub(crate) fn cmd_recipe_list(svc: &PantryService, json: bool) -> Result<()> {
    let recipes = svc.list_recipes()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&recipes)?);
        return Ok(());
    }

    if recipes.is_empty() {
        eprintln!("No recipes yet. Create one with: pantry recipe add <name>");
        return Ok(());
    }

    print_recipe_table(&recipes);
    Ok(())
}

pub(crate) fn cmd_recipe_show(svc: &PantryService, id: i64, json: bool) -> Result<()> {
    let doc = svc.document()?;
    let Some(recipe) = doc.recipe(id) else {
        exit_not_found(&format!("Recipe {id} not found"), json);
    };

    if json {
        println!("{}", serde_json::to_string_pretty(recipe)?);
        return Ok(());
    }

    println!("=== {} ===", recipe.name);
    if let Some(vegie) = &recipe.vegie {
        println!("  Vegetarian option: {vegie}");
    }
    if let Some(tag) = &recipe.tag {
        println!("  Tag: {tag}");
    }
    if !recipe.comments.is_empty() {
        println!("  {}", recipe.comments.replace('\n', "\n  "));
    }

    println!("\n  PER PERSON:");
    if recipe.ingredients.is_empty() {
        println!("    (no ingredients)");
    }
    for line in &recipe.ingredients {
        let qty = line.quantity_grams;
        match doc.ingredient(line.ingredient_id) {
            Some(ing) => println!(
                "    {} - {qty:.1}g (stock: {})",
                truncate(&ing.name, 35),
                format_stock(ing.measurement, ing.amount)
            ),
            None => println!(
                "    (deleted ingredient #{}) - {qty:.1}g",
                line.ingredient_id
            ),
        }
    }
    Ok(())
}

pub(crate) fn cmd_recipe_update(
    svc: &PantryService,
    id: i64,
    update: &UpdateRecipe,
    json: bool,
) -> Result<()> {
    let Some(recipe) = svc.update_recipe(id, update)? else {
        exit_not_found(&format!("Recipe {id} not found"), json);
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&recipe)?);
    } else {
        println!("Updated recipe {id}: {}", recipe.name);
    }
    Ok(())
}

pub(crate) fn cmd_recipe_delete(svc: &PantryService, id: i64, json: bool) -> Result<()> {
    if !svc.delete_recipe(id)? {
        exit_not_found(&format!("Recipe {id} not found"), json);
    }

    if json {
        println!("{}", serde_json::json!({ "deleted": id }));
    } else {
        println!("Deleted recipe {id}");
    }
    Ok(())
}
