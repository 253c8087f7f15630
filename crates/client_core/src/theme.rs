use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

pub const THEME_STORAGE_KEY: &str = "poke-a-nose-theme";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    /// Custom body color only applies in light mode.
    pub fn body_text_color<'a>(self, configured: &'a str) -> Option<&'a str> {
        match self {
            Theme::Light if !configured.is_empty() => Some(configured),
            _ => None,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ThemeFile {
    #[serde(rename = "poke-a-nose-theme", default)]
    theme: Theme,
}

/// Theme preference persisted as JSON on disk.
#[derive(Debug, Clone)]
pub struct ThemeStore {
    path: PathBuf,
}

impl ThemeStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn default_location() -> Option<Self> {
        dirs::config_dir().map(|dir| Self::new(dir.join("presskit").join("theme.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing or unreadable files fall back to light mode.
    pub fn load(&self) -> Theme {
        let Ok(raw) = fs::read_to_string(&self.path) else {
            return Theme::default();
        };
        match serde_json::from_str::<ThemeFile>(&raw) {
            Ok(file) => file.theme,
            Err(error) => {
                warn!(path = %self.path.display(), %error, "theme: ignoring unreadable preference");
                Theme::default()
            }
        }
    }

    pub fn save(&self, theme: Theme) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create theme directory '{}'", parent.display())
            })?;
        }
        let raw = serde_json::to_string_pretty(&ThemeFile { theme })?;
        fs::write(&self.path, raw)
            .with_context(|| format!("failed to write theme file '{}'", self.path.display()))?;
        Ok(())
    }

    pub fn toggle(&self) -> Result<Theme> {
        let next = self.load().toggled();
        self.save(next)?;
        Ok(next)
    }
}
