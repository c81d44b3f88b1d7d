use std::fs;
use std::path::{Path, PathBuf};

use directories::{BaseDirs, ProjectDirs};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;

pub const DEFAULT_OUTPUT_DIR: &str = "~/Documents/Invoices";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Where saved invoices go; `~` is expanded.
    pub output_dir: String,
    pub typst_bin: String,
    /// Reveal the PDF in the file manager after saving.
    pub open_after_save: bool,
    /// Custom `.typ.tera` template replacing the built-in one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output_dir: DEFAULT_OUTPUT_DIR.to_string(),
            typst_bin: "typst".to_string(),
            open_after_save: true,
            template: None,
        }
    }
}

impl Settings {
    /// Reads settings, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!(path = %path.display(), "no settings file, using defaults");
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source: std::io::Error| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        fs::write(path, toml::to_string_pretty(self)?).map_err(io_err)
    }

    pub fn output_dir(&self) -> PathBuf {
        PathBuf::from(expand_home_dir(&self.output_dir))
    }

    pub fn template_path(&self) -> Option<PathBuf> {
        self.template
            .as_deref()
            .map(|t| PathBuf::from(expand_home_dir(t)))
    }
}

/// `settings.toml` in the platform config directory, or the working
/// directory when no home directory can be determined.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "invoice-wizard", "app")
        .map(|dirs| dirs.config_dir().join("settings.toml"))
        .unwrap_or_else(|| PathBuf::from("settings.toml"))
}

pub fn expand_home_dir(path: &str) -> String {
    if let Some(rest) = path.strip_prefix('~') {
        if let Some(base_dirs) = BaseDirs::new() {
            return format!("{}{}", base_dirs.home_dir().to_string_lossy(), rest);
        }
    }
    path.to_string()
}
