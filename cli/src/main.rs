mod commands;
mod config;
mod server;

use std::path::PathBuf;
use std::process;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::commands::{
    cmd_categories, cmd_cleanup, cmd_import_ingredients, cmd_import_recipes, cmd_ingredient_add,
    cmd_ingredient_delete, cmd_ingredient_list, cmd_ingredient_show, cmd_ingredient_update,
    cmd_measurements, cmd_migrate, cmd_plan, cmd_recipe_add, cmd_recipe_add_line,
    cmd_recipe_delete, cmd_recipe_list, cmd_recipe_show, cmd_recipe_update, parse_line_spec,
};
use crate::config::Config;
use pantry_core::models::{UpdateIngredient, UpdateRecipe};
use pantry_core::service::PantryService;

#[derive(Parser)]
#[command(
    name = "pantry",
    version,
    about = "Track what is in the pantry and what a recipe still needs"
)]
struct Cli {
    /// Path to the pantry data file (overrides PANTRY_DATA)
    #[arg(long, global = true)]
    data: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage pantry ingredients
    Ingredient {
        #[command(subcommand)]
        command: IngredientCommands,
    },
    /// Manage recipes
    Recipe {
        #[command(subcommand)]
        command: RecipeCommands,
    },
    /// Check stock against a recipe for a number of people
    Plan {
        /// Recipe ID
        recipe_id: i64,
        /// Number of people to cook for
        #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        people: u32,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List categories, or add one
    Categories {
        /// Category to add
        #[arg(long)]
        add: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the supported measurements
    Measurements {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Import ingredients or recipes from CSV spreadsheets
    Import {
        #[command(subcommand)]
        command: ImportCommands,
    },
    /// Merge misspelled ingredients and fix their categories
    Cleanup {
        /// JSON alias table (defaults to the built-in table)
        #[arg(long)]
        aliases: Option<PathBuf>,
        /// Preview changes without writing them
        #[arg(long)]
        dry_run: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Upgrade the data file to the current schema version
    Migrate {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Start the local JSON API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value_t = 8080)]
        port: u16,
        /// Address to bind to
        #[arg(short, long, default_value = "127.0.0.1")]
        bind: String,
    },
}

#[derive(Subcommand)]
enum IngredientCommands {
    /// Add an ingredient to the pantry
    Add {
        /// Ingredient name
        name: String,
        /// Category (e.g. "Grains", "Dairy")
        #[arg(short, long, default_value = "Other")]
        category: String,
        /// Measurement: kg, liter or pieces
        #[arg(short, long, default_value = "kg")]
        measurement: String,
        /// Amount in stock, in the chosen measurement
        #[arg(short, long, default_value = "0")]
        amount: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List ingredients
    List {
        /// Only show this category
        #[arg(short, long)]
        category: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one ingredient
    Show {
        /// Ingredient ID
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Update fields of an ingredient
    Update {
        /// Ingredient ID
        id: i64,
        /// New name
        #[arg(long)]
        name: Option<String>,
        /// New category
        #[arg(long)]
        category: Option<String>,
        /// New measurement: kg, liter or pieces
        #[arg(long)]
        measurement: Option<String>,
        /// New amount in stock
        #[arg(long)]
        amount: Option<f64>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete an ingredient
    Delete {
        /// Ingredient ID
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum RecipeCommands {
    /// Create a recipe
    Add {
        /// Recipe name
        name: String,
        /// Free-text notes
        #[arg(long)]
        comments: Option<String>,
        /// Ingredient line as <ingredient_id>:<grams per person> (repeatable)
        #[arg(short, long = "line")]
        lines: Vec<String>,
        /// Vegetarian marker
        #[arg(long)]
        vegie: Option<String>,
        /// Free-form tag
        #[arg(long)]
        tag: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Set how much of an ingredient one person eats in a recipe
    AddLine {
        /// Recipe ID
        recipe_id: i64,
        /// Ingredient ID
        ingredient_id: i64,
        /// Quantity per person (e.g. "150", "150g", "0.15kg")
        quantity: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List all recipes
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a recipe with its ingredients
    Show {
        /// Recipe ID
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Update fields of a recipe
    Update {
        /// Recipe ID
        id: i64,
        /// New name
        #[arg(long)]
        name: Option<String>,
        /// New notes
        #[arg(long)]
        comments: Option<String>,
        /// Replace all ingredient lines (repeatable, <ingredient_id>:<grams>)
        #[arg(short, long = "line")]
        lines: Vec<String>,
        /// Set the vegetarian marker
        #[arg(long, conflicts_with = "clear_vegie")]
        vegie: Option<String>,
        /// Remove the vegetarian marker
        #[arg(long)]
        clear_vegie: bool,
        /// Set the tag
        #[arg(long, conflicts_with = "clear_tag")]
        tag: Option<String>,
        /// Remove the tag
        #[arg(long)]
        clear_tag: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a recipe
    Delete {
        /// Recipe ID
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ImportCommands {
    /// Import ingredients from a CSV with Name, Unit and optional Category columns
    Ingredients {
        /// Path to the CSV file
        file: PathBuf,
        /// Preview import without writing to the data file
        #[arg(long)]
        dry_run: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Import recipes from a CSV with Recipe, Ingredient, Meat (kg) and Vegi (kg) columns
    Recipes {
        /// Path to the CSV file
        file: PathBuf,
        /// Preview import without writing to the data file
        #[arg(long)]
        dry_run: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn optional_value(value: Option<String>, clear: bool) -> Option<Option<String>> {
    if clear { Some(None) } else { value.map(Some) }
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

#[allow(clippy::too_many_lines)]
async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.data)?;
    let svc = PantryService::new(&config.data_path);

    match cli.command {
        Commands::Ingredient { command } => match command {
            IngredientCommands::Add {
                name,
                category,
                measurement,
                amount,
                json,
            } => cmd_ingredient_add(&svc, &name, &category, &measurement, &amount, json),
            IngredientCommands::List { category, json } => {
                cmd_ingredient_list(&svc, category.as_deref(), json)
            }
            IngredientCommands::Show { id, json } => cmd_ingredient_show(&svc, id, json),
            IngredientCommands::Update {
                id,
                name,
                category,
                measurement,
                amount,
                json,
            } => {
                let update = UpdateIngredient {
                    name,
                    category,
                    measurement: measurement.as_deref().map(str::parse).transpose()?,
                    amount,
                };
                cmd_ingredient_update(&svc, id, &update, json)
            }
            IngredientCommands::Delete { id, json } => cmd_ingredient_delete(&svc, id, json),
        },
        Commands::Recipe { command } => match command {
            RecipeCommands::Add {
                name,
                comments,
                lines,
                vegie,
                tag,
                json,
            } => cmd_recipe_add(&svc, &name, comments, &lines, vegie, tag, json),
            RecipeCommands::AddLine {
                recipe_id,
                ingredient_id,
                quantity,
                json,
            } => cmd_recipe_add_line(&svc, recipe_id, ingredient_id, &quantity, json),
            RecipeCommands::List { json } => cmd_recipe_list(&svc, json),
            RecipeCommands::Show { id, json } => cmd_recipe_show(&svc, id, json),
            RecipeCommands::Update {
                id,
                name,
                comments,
                lines,
                vegie,
                clear_vegie,
                tag,
                clear_tag,
                json,
            } => {
                let ingredients = if lines.is_empty() {
                    None
                } else {
                    Some(
                        lines
                            .iter()
                            .map(|l| parse_line_spec(l))
                            .collect::<Result<Vec<_>>>()?,
                    )
                };
                let update = UpdateRecipe {
                    name,
                    comments,
                    ingredients,
                    vegie: optional_value(vegie, clear_vegie),
                    tag: optional_value(tag, clear_tag),
                };
                cmd_recipe_update(&svc, id, &update, json)
            }
            RecipeCommands::Delete { id, json } => cmd_recipe_delete(&svc, id, json),
        },
        Commands::Plan {
            recipe_id,
            people,
            json,
        } => cmd_plan(&svc, recipe_id, people, json),
        Commands::Categories { add, json } => cmd_categories(&svc, add.as_deref(), json),
        Commands::Measurements { json } => cmd_measurements(&svc, json),
        Commands::Import { command } => match command {
            ImportCommands::Ingredients {
                file,
                dry_run,
                json,
            } => cmd_import_ingredients(&svc, &file, dry_run, json),
            ImportCommands::Recipes {
                file,
                dry_run,
                json,
            } => cmd_import_recipes(&svc, &file, dry_run, json),
        },
        Commands::Cleanup {
            aliases,
            dry_run,
            json,
        } => {
            let aliases = aliases.or_else(|| config.alias_file());
            cmd_cleanup(&svc, aliases.as_deref(), dry_run, json)
        }
        Commands::Migrate { json } => cmd_migrate(&config.data_path, json),
        Commands::Serve { port, bind } => server::start_server(svc, port, &bind).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn plan_rejects_zero_people() {
        let result = Cli::try_parse_from(["pantry", "plan", "1", "--people", "0"]);
        assert!(result.is_err());
    }

    #[test]
    fn data_flag_is_global() {
        let cli = Cli::try_parse_from(["pantry", "ingredient", "list", "--data", "/tmp/p.json"])
            .unwrap();
        assert_eq!(cli.data, Some(PathBuf::from("/tmp/p.json")));
    }

    #[test]
    fn clear_flag_wins_over_missing_value() {
        assert_eq!(optional_value(None, true), Some(None));
        assert_eq!(optional_value(Some("x".into()), false), Some(Some("x".into())));
        assert_eq!(optional_value(None, false), None);
    }
}
