//! Notepad settings persistence.
//!
//! Stores user preferences (data directory, autosave, markup conventions) in a
//! JSON file at an OS-appropriate location.

use crate::{NotepadError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Markup dialect of note content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentFormat {
    /// Raw HTML as produced by a rich-text widget.
    #[default]
    Html,
    /// CommonMark.
    Markdown,
}

/// Markup used when splicing an attachment reference into content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferenceSyntax {
    /// `<img src="id:...">`, `<video controls src="id:...">`, `<audio controls src="id:...">`.
    #[default]
    Html,
    /// `![name](id:...)` for images, `[name](id:...)` otherwise.
    Markdown,
}

/// Persisted Notepad settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NotepadSettings {
    /// Directory holding the notes database.
    pub data_directory: String,
    /// Directory exported artifacts are written to.
    pub export_directory: String,
    pub autosave_enabled: bool,
    pub autosave_interval_secs: u64,
    pub content_format: ContentFormat,
    pub reference_syntax: ReferenceSyntax,
}

impl Default for NotepadSettings {
    fn default() -> Self {
        Self {
            data_directory: default_data_directory().to_string_lossy().to_string(),
            export_directory: default_export_directory().to_string_lossy().to_string(),
            autosave_enabled: true,
            autosave_interval_secs: 3,
            content_format: ContentFormat::Html,
            reference_syntax: ReferenceSyntax::Html,
        }
    }
}

impl NotepadSettings {
    /// Checks values that would make the session misbehave.
    pub fn validate(&self) -> Result<()> {
        if self.autosave_interval_secs == 0 {
            return Err(NotepadError::InvalidSettings(
                "Autosave interval must be at least one second".to_string(),
            ));
        }
        if self.data_directory.trim().is_empty() {
            return Err(NotepadError::InvalidSettings(
                "Data directory must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn autosave_interval_millis(&self) -> i64 {
        i64::try_from(self.autosave_interval_secs.saturating_mul(1000)).unwrap_or(i64::MAX)
    }
}

/// Returns the path to the settings JSON file.
///
/// - macOS / Linux: `~/.config/simos-notes/settings.json`
/// - Windows: `%APPDATA%/SimOS Notes/settings.json`
pub fn settings_file_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        let base = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
        base.join("SimOS Notes").join("settings.json")
    }
    #[cfg(not(target_os = "windows"))]
    {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(".config").join("simos-notes").join("settings.json")
    }
}

/// Returns the default data directory, e.g. `~/.local/share/simos-notes`.
pub fn default_data_directory() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("simos-notes")
}

/// Returns the default export directory: the user's downloads folder.
pub fn default_export_directory() -> PathBuf {
    dirs::download_dir().unwrap_or_else(|| {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("Downloads")
    })
}

/// Loads settings from the default location; returns defaults if the file is missing or corrupt.
pub fn load_settings() -> NotepadSettings {
    load_settings_from(&settings_file_path())
}

/// Loads settings from `path`; returns defaults if the file is missing or corrupt.
pub fn load_settings_from(path: &Path) -> NotepadSettings {
    match fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
            log::warn!("Ignoring corrupt settings file {}: {e}", path.display());
            NotepadSettings::default()
        }),
        Err(_) => NotepadSettings::default(),
    }
}

/// Saves settings to the default location, creating parent directories as needed.
pub fn save_settings(settings: &NotepadSettings) -> Result<()> {
    save_settings_to(&settings_file_path(), settings)
}

/// Saves settings to `path`, creating parent directories as needed.
pub fn save_settings_to(path: &Path, settings: &NotepadSettings) -> Result<()> {
    settings.validate()?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(settings)?;
    fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let settings = NotepadSettings::default();
        assert!(settings.autosave_enabled);
        assert_eq!(settings.autosave_interval_secs, 3);
        assert_eq!(settings.autosave_interval_millis(), 3000);
        assert_eq!(settings.content_format, ContentFormat::Html);
        settings.validate().unwrap();
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let settings = NotepadSettings {
            autosave_enabled: false,
            content_format: ContentFormat::Markdown,
            reference_syntax: ReferenceSyntax::Markdown,
            ..NotepadSettings::default()
        };

        save_settings_to(&path, &settings).unwrap();
        let raw = fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"contentFormat\": \"markdown\""));

        assert_eq!(load_settings_from(&path), settings);
    }

    #[test]
    fn test_corrupt_or_partial_file_falls_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");

        fs::write(&path, "{ not json").unwrap();
        assert_eq!(load_settings_from(&path), NotepadSettings::default());

        fs::write(&path, r#"{"autosaveEnabled": false}"#).unwrap();
        let loaded = load_settings_from(&path);
        assert!(!loaded.autosave_enabled);
        assert_eq!(loaded.autosave_interval_secs, 3);
    }

    #[test]
    fn test_zero_interval_rejected() {
        let dir = tempdir().unwrap();
        let settings = NotepadSettings {
            autosave_interval_secs: 0,
            ..NotepadSettings::default()
        };
        let result = save_settings_to(&dir.path().join("s.json"), &settings);
        assert!(matches!(result, Err(NotepadError::InvalidSettings(_))));
    }
}
