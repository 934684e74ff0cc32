//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$MAILPRESS_CONFIG` (environment variable)
//! 2. `~/.config/mailpress/config.toml` (Linux/macOS)
//!    `%APPDATA%\mailpress\config.toml` (Windows)
//! 3. Built-in defaults
//!
//! Nothing reads the configuration globally: the CLI turns it into a
//! [`PipelineOptions`] and a [`RunRequest`](crate::pipeline::RunRequest).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::convert::RenderOptions;
use crate::export::archive::DEFAULT_DATE_FORMAT;
use crate::pdf::layout::PageSize;
use crate::pipeline::PipelineOptions;

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Default run parameters.
    pub pipeline: PipelineConfig,
    /// Page layout of generated PDFs.
    pub render: RenderConfig,
    /// Office document conversion.
    pub office: OfficeConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Override cache directory for logs.
    pub cache_dir: Option<PathBuf>,
    /// `strftime` format string for dates on archive pages.
    pub date_format: String,
}

/// Default run parameters. Every field can be overridden on the command line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Root directory of the mail store.
    pub store_root: Option<PathBuf>,
    /// Folder to process.
    pub folder: String,
    /// Folder archived messages are moved to.
    pub destination: Option<String>,
    /// Directory receiving the PDFs.
    pub output_dir: Option<PathBuf>,
    /// Subject keywords (any one must match).
    pub keywords: Vec<String>,
    /// Category applied to archived messages.
    pub success_category: Option<String>,
    /// Category applied to messages that could not be archived.
    pub error_category: Option<String>,
    /// Only select messages that are still unread.
    pub unread_only: bool,
    /// Mark archived messages as read before moving them.
    pub mark_read: bool,
}

/// Page layout of generated PDFs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// "a4" or "letter".
    pub page_size: PageSize,
    /// Characters per line for text attachments and message bodies.
    pub text_wrap_width: usize,
    /// Font size for monospace text, in points.
    pub text_font_size: f32,
    /// Resolution used to size image pages.
    pub image_dpi: f32,
}

/// Office document conversion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OfficeConfig {
    /// Office suite binary run headless (e.g. "soffice"). Unset disables
    /// office conversion.
    pub command: Option<String>,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            cache_dir: None,
            date_format: DEFAULT_DATE_FORMAT.to_string(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            store_root: None,
            folder: "Inbox".to_string(),
            destination: None,
            output_dir: None,
            keywords: Vec::new(),
            success_category: Some("Archived".to_string()),
            error_category: Some("Archive Error".to_string()),
            unread_only: false,
            mark_read: true,
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        let render = RenderOptions::default();
        Self {
            page_size: render.page_size,
            text_wrap_width: render.text_wrap_width,
            text_font_size: render.text_font_size,
            image_dpi: render.image_dpi,
        }
    }
}

impl RenderConfig {
    /// Layout options, with out-of-range values clamped to usable ones.
    pub fn options(&self) -> RenderOptions {
        let defaults = RenderOptions::default();
        RenderOptions {
            page_size: self.page_size,
            text_wrap_width: self.text_wrap_width.clamp(20, 200),
            text_font_size: if self.text_font_size.is_finite() && self.text_font_size >= 4.0 {
                self.text_font_size.min(24.0)
            } else {
                defaults.text_font_size
            },
            image_dpi: if self.image_dpi.is_finite() && self.image_dpi > 0.0 {
                self.image_dpi
            } else {
                defaults.image_dpi
            },
        }
    }
}

impl Config {
    /// Pipeline options derived from this configuration.
    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            render: self.render.options(),
            date_format: self.general.date_format.clone(),
            create_output_dir: true,
        }
    }
}

// ── Load / save ─────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    match config_file_path() {
        Some(path) => load_config_from(&path),
        None => Config::default(),
    }
}

/// Load configuration from an explicit file, falling back to defaults.
pub fn load_config_from(path: &std::path::Path) -> Config {
    if !path.exists() {
        return Config::default();
    }
    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str::<Config>(&contents) {
            Ok(cfg) => {
                tracing::info!(path = %path.display(), "Loaded config");
                cfg
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to parse config, using defaults"
                );
                Config::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "Failed to read config file, using defaults"
            );
            Config::default()
        }
    }
}

/// Save configuration to the standard location.
pub fn save_config(config: &Config) -> anyhow::Result<PathBuf> {
    let path = config_file_path()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config file path"))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(&path, contents)?;
    tracing::info!(path = %path.display(), "Saved config");
    Ok(path)
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("MAILPRESS_CONFIG") {
        return Some(PathBuf::from(env_path));
    }
    dirs::config_dir().map(|d| d.join("mailpress").join("config.toml"))
}

/// Return the cache directory for logs.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mailpress")
}

/// Return the log file path.
pub fn log_file_path(config: &Config) -> PathBuf {
    cache_dir(config).join("mailpress.log")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.general.log_level, "warn");
        assert_eq!(cfg.pipeline.folder, "Inbox");
        assert_eq!(cfg.pipeline.success_category.as_deref(), Some("Archived"));
        assert_eq!(cfg.render.page_size, PageSize::A4);
        assert!(cfg.office.command.is_none());
    }

    #[test]
    fn test_serialize_deserialize_roundtrip() {
        let mut cfg = Config::default();
        cfg.pipeline.keywords = vec!["invoice".into(), "receipt".into()];
        cfg.office.command = Some("soffice".into());
        let toml_str = toml::to_string_pretty(&cfg).expect("serialize");
        let parsed: Config = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let partial = r#"
[pipeline]
folder = "Receipts"
keywords = ["invoice"]

[render]
page_size = "letter"
"#;
        let cfg: Config = toml::from_str(partial).expect("parse partial");
        assert_eq!(cfg.pipeline.folder, "Receipts");
        assert_eq!(cfg.pipeline.keywords, vec!["invoice"]);
        assert_eq!(cfg.render.page_size, PageSize::Letter);
        // Other fields use defaults
        assert_eq!(cfg.render.text_wrap_width, 90);
        assert!(!cfg.pipeline.unread_only);
        assert!(cfg.pipeline.mark_read);
        assert_eq!(cfg.general.date_format, DEFAULT_DATE_FORMAT);
    }

    #[test]
    fn test_render_options_are_clamped() {
        let render = RenderConfig {
            page_size: PageSize::A4,
            text_wrap_width: 5,
            text_font_size: f32::NAN,
            image_dpi: -3.0,
        };
        let options = render.options();
        assert_eq!(options.text_wrap_width, 20);
        assert_eq!(options.text_font_size, RenderOptions::default().text_font_size);
        assert_eq!(options.image_dpi, 96.0);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let cfg = load_config_from(std::path::Path::new("/nonexistent/mailpress.toml"));
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn test_invalid_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "this is = = not toml").unwrap();
        assert_eq!(load_config_from(&path), Config::default());
    }
}
