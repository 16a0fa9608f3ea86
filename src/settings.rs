use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::fetcher::DEFAULT_PAGE_SIZE;
use crate::importer::{self, RawLayout};
use crate::models::Credential;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub data_dir: String,
    /// Identity records are stored under. Empty means not signed in.
    #[serde(default)]
    pub user: String,
    #[serde(default = "default_format")]
    pub default_format: String,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_top_categories")]
    pub top_categories: usize,
}

fn default_format() -> String {
    "cap1".to_string()
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

fn default_top_categories() -> usize {
    5
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir().to_string_lossy().to_string(),
            user: String::new(),
            default_format: default_format(),
            page_size: default_page_size(),
            top_categories: default_top_categories(),
        }
    }
}

impl Settings {
    pub fn credential(&self) -> Option<Credential> {
        Credential::new(self.user.clone())
    }

    /// Layout used when a file can't be detected. Unknown keys fall back to Capital One.
    pub fn fallback_layout(&self) -> RawLayout {
        importer::get_by_key(&self.default_format).unwrap_or(RawLayout::CapitalOne)
    }

    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir).join("tally.db")
    }
}

fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("tally")
}

fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".local")
        .join("share")
        .join("tally")
}

pub fn load_settings() -> Settings {
    let path = settings_path();
    if path.exists() {
        let content = std::fs::read_to_string(&path).unwrap_or_default();
        serde_json::from_str(&content).unwrap_or_default()
    } else {
        Settings::default()
    }
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir)?;
    let json = serde_json::to_string_pretty(settings)?;
    std::fs::write(settings_path(), format!("{json}\n"))?;
    Ok(())
}

pub fn shellexpand_path(path: &str) -> String {
    if path.starts_with('~') {
        if let Some(home) = dirs::home_dir() {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    std::fs::canonicalize(path)
        .unwrap_or_else(|_| PathBuf::from(path))
        .to_string_lossy()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TallyError;

    #[test]
    fn test_serde_errors_become_json_errors() {
        let err: TallyError = serde_json::from_str::<Settings>("{").unwrap_err().into();
        assert!(matches!(err, TallyError::Json(_)));
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let settings = Settings {
            data_dir: "/tmp/test".to_string(),
            user: "alice".to_string(),
            default_format: "rbc".to_string(),
            page_size: 50,
            top_categories: 3,
        };
        let json = serde_json::to_string_pretty(&settings).unwrap();
        std::fs::write(&path, &json).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        let loaded: Settings = serde_json::from_str(&content).unwrap();
        assert_eq!(loaded.user, "alice");
        assert_eq!(loaded.data_dir, "/tmp/test");
        assert_eq!(loaded.fallback_layout(), RawLayout::Rbc);
        assert_eq!(loaded.page_size, 50);
    }

    #[test]
    fn test_defaults_are_signed_out() {
        let s = Settings::default();
        assert!(s.user.is_empty());
        assert!(s.credential().is_none());
        assert_eq!(s.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(s.top_categories, 5);
        assert!(!s.data_dir.is_empty());
    }

    #[test]
    fn test_load_merges_with_defaults() {
        let json = r#"{"data_dir": "/tmp/test", "user": "bob"}"#;
        let s: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(s.default_format, "cap1");
        assert_eq!(s.credential().unwrap().as_str(), "bob");
        assert!(s.db_path().ends_with("tally.db"));
    }

    #[test]
    fn test_unknown_default_format_falls_back() {
        let s = Settings {
            default_format: "mint".to_string(),
            ..Settings::default()
        };
        assert_eq!(s.fallback_layout(), RawLayout::CapitalOne);
    }
}
