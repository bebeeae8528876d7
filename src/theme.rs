/*!
    Light and dark color presets for the list view, and the sidecar
    file that remembers which one was picked last.
!*/
use std::fs;
use std::path::Path;

use log::warn;
use ratatui::style::Color;
use serde::{Deserialize, Serialize};

use crate::tasklet::Error;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub primary: Color,
    pub success: Color,
    pub warning: Color,
    pub danger: Color,
    pub background: Color,
    pub surface: Color,
    pub text: Color,
    pub disabled: Color,
}

const LIGHT: Palette = Palette {
    primary: Color::Rgb(51, 153, 230),
    success: Color::Rgb(51, 204, 102),
    warning: Color::Rgb(255, 153, 51),
    danger: Color::Rgb(230, 77, 77),
    background: Color::Rgb(242, 242, 247),
    surface: Color::Rgb(255, 255, 255),
    text: Color::Rgb(0, 0, 0),
    disabled: Color::Rgb(179, 179, 179),
};

const DARK: Palette = Palette {
    primary: Color::Rgb(77, 179, 255),
    success: Color::Rgb(77, 230, 128),
    warning: Color::Rgb(255, 179, 77),
    danger: Color::Rgb(255, 102, 102),
    background: Color::Rgb(26, 26, 38),
    surface: Color::Rgb(51, 51, 64),
    text: Color::Rgb(255, 255, 255),
    disabled: Color::Rgb(128, 128, 128),
};

#[derive(Debug, Serialize, Deserialize)]
struct ThemeFile {
    theme: Theme,
}

impl Theme {
    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }

    pub fn palette(self) -> Palette {
        match self {
            Theme::Light => LIGHT,
            Theme::Dark => DARK,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    /// Reads the saved theme. A missing or unreadable file yields the
    /// light theme.
    pub fn load(path: &Path) -> Self {
        if !path.exists() {
            return Theme::default();
        }
        let parsed = fs::read_to_string(path)
            .map_err(Error::from)
            .and_then(|text| Ok(serde_json::from_str::<ThemeFile>(&text)?));
        match parsed {
            Ok(file) => file.theme,
            Err(e) => {
                warn!("Error loading theme from {}: {e}", path.display());
                Theme::default()
            }
        }
    }

    pub fn save(self, path: &Path) -> Result<(), Error> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string(&ThemeFile { theme: self })?;
        fs::write(path, text)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn missing_file_is_light() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(Theme::load(&dir.path().join("theme.json")), Theme::Light);
    }

    #[test]
    fn malformed_file_is_light() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("theme.json");
        fs::write(&path, r#"{"theme":"sepia"}"#).unwrap();
        assert_eq!(Theme::load(&path), Theme::Light);
    }

    #[test]
    fn toggle_round_trips_through_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("theme.json");

        let theme = Theme::load(&path).toggled();
        theme.save(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), r#"{"theme":"dark"}"#);
        assert_eq!(Theme::load(&path), Theme::Dark);

        Theme::Dark.toggled().save(&path).unwrap();
        assert_eq!(Theme::load(&path), Theme::Light);
    }

    #[test]
    fn palettes_differ() {
        assert_ne!(Theme::Light.palette(), Theme::Dark.palette());
        assert_eq!(Theme::Dark.palette().text, Color::Rgb(255, 255, 255));
    }
}
