use super::App;
use anyhow::{Context, Result};
use linkapp_application::SearchService;
use linkapp_core::import::sniff_link_app_text;
use linkapp_core::search::EntryType;
use std::fs;
use std::path::Path;

pub fn search(app: &App, query: &str, limit: usize) -> bool {
    let service = SearchService::with_limit(&app.store, limit);
    let hits = service.search(query);
    if hits.is_empty() {
        println!("No matches for \"{}\"", query.trim());
    }
    for hit in &hits {
        let kind = match hit.entry_type {
            EntryType::Section => "§",
            EntryType::Button => "•",
        };
        if hit.link.is_empty() {
            println!("{kind} {}", hit.path);
        } else {
            println!("{kind} {}  {}", hit.path, hit.link);
        }
    }
    true
}

pub fn export(app: &App, output: Option<&Path>) -> Result<bool> {
    let Some(text) = app.store.export_snapshot() else {
        return Ok(false);
    };
    match output {
        Some(path) => {
            fs::write(path, text + "\n").with_context(|| format!("Failed to write {}", path.display()))?;
            println!("✅ Exported to {}", path.display());
        }
        None => println!("{text}"),
    }
    Ok(true)
}

pub fn import(app: &App, file: &Path) -> Result<bool> {
    let text = fs::read_to_string(file).with_context(|| format!("Failed to read {}", file.display()))?;
    if !sniff_link_app_text(&text) {
        tracing::warn!(file = %file.display(), "File does not look like a LinkApp export");
    }
    let imported = app.store.import_snapshot(&text);
    if imported {
        println!("✅ Imported {}", file.display());
    }
    Ok(imported)
}

pub fn repair(app: &App) -> bool {
    let changed = app.store.migrate();
    if changed {
        app.store.save();
        println!("✅ Document repaired");
    } else {
        println!("Nothing to repair");
    }
    true
}

pub fn reset(app: &App) -> bool {
    app.store.reset();
    true
}
