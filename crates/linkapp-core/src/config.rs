//! User preferences.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Color theme. Anything unrecognized reads as [`Theme::System`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Theme {
    System,
    Light,
    Sea,
    Dark,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Light => "light",
            Self::Sea => "sea",
            Self::Dark => "dark",
        }
    }

    /// Lenient parse used for stored values.
    pub fn parse_or_system(value: &str) -> Self {
        value.parse().unwrap_or(Self::System)
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "system" => Ok(Self::System),
            "light" => Ok(Self::Light),
            "sea" => Ok(Self::Sea),
            "dark" => Ok(Self::Dark),
            other => Err(format!("unknown theme '{other}'")),
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Theme {
    fn from(value: String) -> Self {
        Self::parse_or_system(&value)
    }
}

impl From<Theme> for String {
    fn from(theme: Theme) -> Self {
        theme.as_str().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OnboardingConfig {
    /// "Don't show again" on the template chooser
    #[serde(default, alias = "skipTemplateChooser")]
    pub skip_template_chooser: bool,
    #[serde(default, alias = "forceTemplateChooserOnce")]
    pub force_template_chooser_once: bool,
}

/// Persisted application preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_theme")]
    pub theme: Theme,
    #[serde(default = "default_view_mode", alias = "viewMode")]
    pub view_mode: String,
    #[serde(default = "default_autosave")]
    pub autosave: bool,
    #[serde(default)]
    pub onboarding: OnboardingConfig,
    /// Browser used to open links; the system default when unset
    #[serde(default, alias = "defaultBrowser", skip_serializing_if = "Option::is_none")]
    pub default_browser: Option<String>,
}

fn default_language() -> String {
    "en".to_string()
}

fn default_theme() -> Theme {
    Theme::Dark
}

fn default_view_mode() -> String {
    "tiles".to_string()
}

fn default_autosave() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            language: default_language(),
            theme: default_theme(),
            view_mode: default_view_mode(),
            autosave: default_autosave(),
            onboarding: OnboardingConfig::default(),
            default_browser: None,
        }
    }
}

impl AppConfig {
    /// Sets a preference by its key as shown to users.
    pub fn set_value(&mut self, key: &str, value: &str) -> crate::Result<()> {
        let invalid = |what: &str| crate::LinkAppError::config(format!("invalid {what}: '{value}'"));
        match key {
            "language" => self.language = value.trim().to_string(),
            "theme" => self.theme = value.parse().map_err(crate::LinkAppError::config)?,
            "view_mode" | "viewMode" => self.view_mode = value.trim().to_string(),
            "autosave" => self.autosave = value.trim().parse().map_err(|_| invalid("boolean"))?,
            "onboarding.skip_template_chooser" => {
                self.onboarding.skip_template_chooser =
                    value.trim().parse().map_err(|_| invalid("boolean"))?
            }
            "onboarding.force_template_chooser_once" => {
                self.onboarding.force_template_chooser_once =
                    value.trim().parse().map_err(|_| invalid("boolean"))?
            }
            "default_browser" | "defaultBrowser" => {
                let v = value.trim();
                self.default_browser = (!v.is_empty()).then(|| v.to_string());
            }
            other => return Err(crate::LinkAppError::config(format!("unknown key '{other}'"))),
        }
        Ok(())
    }
}
