mod cleanup;
mod helpers;
mod import;
mod ingredient;
mod migrate;
mod plan;
mod recipe;
mod reference;

pub(crate) use cleanup::cmd_cleanup;
pub(crate) use helpers::parse_line_spec;
pub(crate) use import::{cmd_import_ingredients, cmd_import_recipes};
pub(crate) use ingredient::{
    cmd_ingredient_add, cmd_ingredient_delete, cmd_ingredient_list, cmd_ingredient_show,
    cmd_ingredient_update,
};
pub(crate) use migrate::cmd_migrate;
pub(crate) use plan::cmd_plan;
pub(crate) use recipe::{
    cmd_recipe_add, cmd_recipe_add_line, cmd_recipe_delete, cmd_recipe_list, cmd_recipe_show,
    cmd_recipe_update,
};
pub(crate) use reference::{cmd_categories, cmd_measurements};
