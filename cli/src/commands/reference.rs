use anyhow::Result;

use pantry_core::service::PantryService;

pub(crate) fn cmd_categories(svc: &PantryService, add: Option<&str>, json: bool) -> Result<()> {
    if let Some(name) = add {
        let added = svc.add_category(name)?;
        if json {
            println!(
                "{}",
                serde_json::json!({ "category": name.trim(), "added": added })
            );
        } else if added {
            println!("Added category: {}", name.trim());
        } else {
            println!("Category '{}' already exists", name.trim());
        }
        return Ok(());
    }

    let categories = svc.categories()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&categories)?);
    } else {
        for c in &categories {
            println!("{c}");
        }
    }
    Ok(())
}

pub(crate) fn cmd_measurements(svc: &PantryService, json: bool) -> Result<()> {
    let measurements = svc.measurements()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&measurements)?);
    } else {
        for m in &measurements {
            println!("{m}");
        }
    }
    Ok(())
}
