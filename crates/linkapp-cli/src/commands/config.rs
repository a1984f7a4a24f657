use super::App;
use anyhow::{Context, Result};
use clap::Subcommand;
use linkapp_core::config::Theme;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the current preferences and file locations
    Show,
    /// Set a preference, e.g. `autosave false`
    Set { key: String, value: String },
    /// Switch theme (system, light, sea, dark)
    Theme { theme: String },
}

pub fn run(app: &App, action: ConfigAction) -> Result<bool> {
    match action {
        ConfigAction::Show => {
            let config = app.config.get();
            let text = toml::to_string_pretty(&config).context("Failed to render config")?;
            println!("# {}", app.paths.config_file().display());
            println!("# data: {}", app.paths.data_dir().display());
            print!("{text}");
            Ok(true)
        }
        ConfigAction::Set { key, value } => {
            app.config
                .set(&key, &value)
                .with_context(|| format!("Failed to set {key}"))?;
            println!("✅ {key} = {}", value.trim());
            Ok(true)
        }
        ConfigAction::Theme { theme } => {
            let theme: Theme = theme.parse().map_err(anyhow::Error::msg)?;
            app.config.set_theme(theme).context("Failed to save theme")?;
            println!("✅ Theme set to {theme}");
            Ok(true)
        }
    }
}
