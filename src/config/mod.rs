//! Configuration for tgam-link
//!
//! All settings live in one TOML file. Every field has a serde default, so a
//! partial file (or none at all) yields a working configuration.
//!
//! # Location
//!
//! - **Linux**: `~/.config/tgam-link/config.toml`
//! - **macOS**: `~/Library/Application Support/tgam-link/config.toml`
//! - **Windows**: `%APPDATA%\tgam-link\config.toml`
//!
//! # Example
//!
//! ```toml
//! [persistence]
//! format = "csv"
//! filter = "all_numeric"
//!
//! [visualization]
//! window = 4096
//! ```

use crate::analysis::{SpectrumConfig, WindowFunction};
use crate::error::{Result, TgamError};
use crate::sink::{PersistFilter, RecordFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application identifier for config and log directories
pub const APP_ID: &str = "tgam-link";

/// Config filename
pub const CONFIG_FILE: &str = "config.toml";

/// Nominal TGAM raw sample rate in Hz
pub const DEFAULT_SAMPLE_RATE_HZ: f64 = 512.0;

// ==================== Directories ====================

/// Platform config directory for this application
pub fn config_dir() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_ID))
}

/// Default path of the config file
pub fn default_config_path() -> Option<PathBuf> {
    config_dir().map(|p| p.join(CONFIG_FILE))
}

/// Default directory for rolling log files
pub fn default_log_dir() -> Option<PathBuf> {
    dirs_next::data_local_dir().map(|p| p.join(APP_ID).join("logs"))
}

// ==================== Sections ====================

/// Byte link and reader task settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Bytes requested per read
    pub read_chunk_size: usize,
    /// Chunks buffered between reader and decoder
    pub byte_queue_capacity: usize,
    /// Session events buffered before new ones are dropped
    pub event_queue_capacity: usize,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            read_chunk_size: 256,
            byte_queue_capacity: 1024,
            event_queue_capacity: 1024,
        }
    }
}

/// Persistence sink settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Record file; `None` disables persistence
    pub output_path: Option<PathBuf>,
    pub format: RecordFormat,
    pub filter: PersistFilter,
    /// Samples buffered between decoder and writer
    pub queue_capacity: usize,
    /// Longest the decoder waits on a full queue
    pub enqueue_timeout_ms: u64,
    /// Flush after this many records even if the queue never drains
    pub flush_every: usize,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            output_path: None,
            format: RecordFormat::Decimal,
            filter: PersistFilter::RawOnly,
            queue_capacity: 4096,
            enqueue_timeout_ms: 2000,
            flush_every: 512,
        }
    }
}

impl PersistenceConfig {
    pub fn enqueue_timeout(&self) -> Duration {
        Duration::from_millis(self.enqueue_timeout_ms)
    }
}

/// Visualization buffer and refresh settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualizationConfig {
    /// Samples retained for the chart
    pub window: usize,
    pub refresh_interval_ms: u64,
}

impl Default for VisualizationConfig {
    fn default() -> Self {
        Self {
            window: 2048,
            refresh_interval_ms: 500,
        }
    }
}

impl VisualizationConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }
}

/// Band analysis settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub enabled: bool,
    pub sample_rate_hz: f64,
    pub fft_size: usize,
    pub window_function: WindowFunction,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sample_rate_hz: DEFAULT_SAMPLE_RATE_HZ,
            fft_size: 512,
            window_function: WindowFunction::Hann,
        }
    }
}

impl AnalysisConfig {
    pub fn spectrum_config(&self) -> SpectrumConfig {
        SpectrumConfig {
            window: self.window_function,
            fft_size: self.fft_size,
            remove_dc: true,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub filter: String,
    /// Also write a daily rolling log file
    pub file_logging: bool,
    /// Log directory; platform data dir when unset
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info,tgam_link=debug".to_string(),
            file_logging: false,
            log_dir: None,
        }
    }
}

impl LoggingConfig {
    pub fn resolved_log_dir(&self) -> Option<PathBuf> {
        self.log_dir.clone().or_else(default_log_dir)
    }
}

// ==================== App Config ====================

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub link: LinkConfig,
    pub persistence: PersistenceConfig,
    pub visualization: VisualizationConfig,
    pub analysis: AnalysisConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load and validate a config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            TgamError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| {
            TgamError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file, returning defaults if it is missing or invalid
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!("No config at {:?}, using defaults", path);
            return Self::default();
        }
        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save as TOML, creating parent directories
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                TgamError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| TgamError::Serialization(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content).map_err(|e| {
            TgamError::Config(format!("Failed to write config file {:?}: {}", path, e))
        })
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        let non_zero = [
            ("link.read_chunk_size", self.link.read_chunk_size),
            ("link.byte_queue_capacity", self.link.byte_queue_capacity),
            ("link.event_queue_capacity", self.link.event_queue_capacity),
            ("persistence.queue_capacity", self.persistence.queue_capacity),
            ("persistence.flush_every", self.persistence.flush_every),
            ("visualization.window", self.visualization.window),
            ("analysis.fft_size", self.analysis.fft_size),
        ];
        if let Some((name, _)) = non_zero.iter().find(|(_, v)| *v == 0) {
            return Err(TgamError::Config(format!("{} must be non-zero", name)));
        }
        if self.visualization.refresh_interval_ms == 0 {
            return Err(TgamError::Config(
                "visualization.refresh_interval_ms must be non-zero".to_string(),
            ));
        }
        let rate = self.analysis.sample_rate_hz;
        if rate.is_nan() || rate <= 0.0 {
            return Err(TgamError::Config(
                "analysis.sample_rate_hz must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

// ==================== Tests ====================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.link.read_chunk_size, 256);
        assert_eq!(config.persistence.queue_capacity, 4096);
        assert_eq!(config.persistence.enqueue_timeout(), Duration::from_millis(2000));
        assert_eq!(config.visualization.refresh_interval(), Duration::from_millis(500));
        assert_eq!(config.analysis.sample_rate_hz, 512.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [persistence]
            format = "csv"

            [visualization]
            window = 100
            "#,
        )
        .unwrap();
        assert_eq!(config.persistence.format, RecordFormat::Csv);
        assert_eq!(config.persistence.flush_every, 512);
        assert_eq!(config.visualization.window, 100);
        assert_eq!(config.visualization.refresh_interval_ms, 500);
        assert_eq!(config.link, LinkConfig::default());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);

        let mut config = AppConfig::default();
        config.persistence.output_path = Some(PathBuf::from("eeg.txt"));
        config.persistence.filter = PersistFilter::AllNumeric;
        config.analysis.window_function = WindowFunction::Blackman;
        config.save(&path).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let mut config = AppConfig::default();
        config.persistence.queue_capacity = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("persistence.queue_capacity"));
    }

    #[test]
    fn test_validate_rejects_bad_sample_rate() {
        let mut config = AppConfig::default();
        config.analysis.sample_rate_hz = 0.0;
        assert!(config.validate().is_err());
        config.analysis.sample_rate_hz = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_or_default_on_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "this is [not toml").unwrap();
        assert_eq!(AppConfig::load_or_default(&path), AppConfig::default());
        assert_eq!(
            AppConfig::load_or_default(dir.path().join("missing.toml")),
            AppConfig::default()
        );
    }
}
