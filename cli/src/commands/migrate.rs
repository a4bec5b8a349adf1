use std::path::Path;

use anyhow::Result;

use pantry_core::migrate::CURRENT_SCHEMA_VERSION;
use pantry_core::store::JsonFileStore;

pub(crate) fn cmd_migrate(data_path: &Path, json: bool) -> Result<()> {
    let store = JsonFileStore::new(data_path);
    let exists = data_path.exists();
    let (_, applied) = store.load_migrated()?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "path": data_path.display().to_string(),
                "exists": exists,
                "schema_version": CURRENT_SCHEMA_VERSION,
                "migration": applied,
            })
        );
        return Ok(());
    }

    if !exists {
        println!(
            "No data file at {} yet; it will be created at schema version {CURRENT_SCHEMA_VERSION}.",
            data_path.display()
        );
        return Ok(());
    }

    match applied {
        Some(m) => {
            println!(
                "Migrated {} from schema version {} to {}.",
                data_path.display(),
                m.outcome.from,
                m.outcome.to
            );
            for step in &m.outcome.applied {
                println!("  - {step}");
            }
            println!("Backup written to {}", m.backup.display());
        }
        None => println!(
            "{} is already at schema version {CURRENT_SCHEMA_VERSION}.",
            data_path.display()
        ),
    }
    Ok(())
}
