use anyhow::{Context, Result, bail};
use serde::Serialize;
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use pantry_core::models::{Ingredient, Measurement, Recipe, RecipeLine};
use pantry_core::planner::RequirementReport;

/// Parse a per-person quantity like "150", "150g" or "0.15kg" into grams.
pub(crate) fn parse_grams(s: &str) -> Result<f64> {
    let s = s.trim();
    let lower = s.to_lowercase();
    let (number, factor) = if let Some(kg) = lower.strip_suffix("kg") {
        (kg, 1000.0)
    } else if let Some(g) = lower.strip_suffix('g') {
        (g, 1.0)
    } else {
        (lower.as_str(), 1.0)
    };
    let value: f64 = number.trim().parse().with_context(|| {
        format!("Invalid quantity: '{s}'. Use a number like '150', '150g' or '0.15kg'")
    })?;
    if !value.is_finite() || value <= 0.0 {
        bail!("Quantity must be greater than 0");
    }
    Ok(value * factor)
}

/// Parse a recipe line given as `<ingredient_id>:<quantity>`, e.g. `3:150g`.
pub(crate) fn parse_line_spec(s: &str) -> Result<RecipeLine> {
    let Some((id, quantity)) = s.split_once(':') else {
        bail!("Invalid line '{s}'. Use '<ingredient_id>:<grams>' (e.g. '3:150g')");
    };
    let ingredient_id: i64 = id
        .trim()
        .parse()
        .with_context(|| format!("Invalid ingredient id in '{s}'"))?;
    Ok(RecipeLine {
        ingredient_id,
        quantity_grams: parse_grams(quantity)?,
    })
}

pub(crate) fn parse_amount(s: &str) -> Result<f64> {
    let value: f64 = s
        .trim()
        .parse()
        .with_context(|| format!("Invalid amount: '{s}'"))?;
    Ok(value)
}

/// Print a not-found message in the requested format and exit with status 2.
pub(crate) fn exit_not_found(message: &str, json: bool) -> ! {
    if json {
        println!("{}", json_error(message));
    } else {
        eprintln!("{message}");
    }
    process::exit(2);
}

pub(crate) fn format_stock(measurement: Measurement, amount: f64) -> String {
    match measurement {
        Measurement::Kg => format!("{amount:.2} kg"),
        Measurement::Liter => format!("{amount:.2} l"),
        Measurement::Pieces => format!("{amount:.0} pcs"),
    }
}

pub(crate) fn print_ingredient_table(ingredients: &[Ingredient]) {
    #[derive(Tabled)]
    struct IngredientRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Category")]
        category: String,
        #[tabled(rename = "Stock")]
        stock: String,
    }

    let rows: Vec<IngredientRow> = ingredients
        .iter()
        .map(|i| IngredientRow {
            id: i.id,
            name: truncate(&i.name, 35),
            category: truncate(&i.category, 20),
            stock: format_stock(i.measurement, i.amount),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(3..4)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

pub(crate) fn print_recipe_table(recipes: &[Recipe]) {
    #[derive(Tabled)]
    struct RecipeRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Lines")]
        lines: usize,
        #[tabled(rename = "g/person")]
        grams: String,
        #[tabled(rename = "Tag")]
        tag: String,
    }

    let rows: Vec<RecipeRow> = recipes
        .iter()
        .map(|r| RecipeRow {
            id: r.id,
            name: truncate(&r.name, 35),
            lines: r.ingredients.len(),
            grams: {
                let total: f64 = r.ingredients.iter().map(|l| l.quantity_grams).sum();
                format!("{total:.0}")
            },
            tag: r.tag.clone().unwrap_or_default(),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..4)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

pub(crate) fn print_requirement_table(report: &RequirementReport) {
    #[derive(Tabled)]
    struct LineRow {
        #[tabled(rename = "Ingredient")]
        name: String,
        #[tabled(rename = "Need (g)")]
        required: String,
        #[tabled(rename = "Have (g)")]
        available: String,
        #[tabled(rename = "Short (g)")]
        shortfall: String,
        #[tabled(rename = "Status")]
        status: String,
    }

    let rows: Vec<LineRow> = report
        .lines
        .iter()
        .map(|l| LineRow {
            name: truncate(&l.name, 35),
            required: format!("{:.1}", no_neg_zero(l.required_quantity)),
            available: if l.can_compare {
                let prefix = if l.approximate { "~" } else { "" };
                format!("{prefix}{:.1}", no_neg_zero(l.available_quantity))
            } else {
                "-".to_string()
            },
            shortfall: format!("{:.1}", no_neg_zero(l.shortfall)),
            status: l.status.label().to_string(),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..4)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

pub(crate) fn json_error(message: &str) -> String {
    #[derive(Serialize)]
    struct CliError<'a> {
        error: &'a str,
    }
    serde_json::to_string(&CliError { error: message })
        .unwrap_or_else(|_| format!("{{\"error\":\"{message}\"}}"))
}

pub(crate) fn no_neg_zero(v: f64) -> f64 {
    if v == 0.0 { 0.0 } else { v }
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}
