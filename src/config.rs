use crate::engine::{EngineKind, MAX_POLL_FPS};
use crate::mode::ScanMode;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ScannerConfig {
    pub camera: CameraConfig,
    pub engine: EngineConfig,
    pub reporter: ReporterConfig,
    pub system: SystemConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CameraConfig {
    /// Device index to start on instead of the rear-camera heuristic
    #[serde(default)]
    pub preferred_index: Option<usize>,

    /// Scan mode used when none is given on the command line
    #[serde(default = "default_scan_mode")]
    pub default_mode: ScanMode,

    /// Delay after opening a stream so autofocus can settle
    #[serde(default = "default_focus_settle_ms")]
    pub focus_settle_ms: u64,

    /// Switch the torch on after open when the camera supports it
    #[serde(default = "default_auto_torch")]
    pub auto_torch: bool,

    /// Retry without resolution floors when the device cannot meet them
    #[serde(default = "default_relax_constraints")]
    pub relax_constraints: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct EngineConfig {
    /// Decode engine driving detection
    #[serde(default = "default_engine_kind")]
    pub kind: EngineKind,

    /// Spend extra passes (rotation, full frame) on every decode
    #[serde(default = "default_try_harder")]
    pub try_harder: bool,

    /// Rows sampled per image by the 1-D decoders
    #[serde(default = "default_linear_scan_rows")]
    pub linear_scan_rows: usize,

    /// Override of the mode's sampling rate
    #[serde(default)]
    pub poll_fps: Option<u32>,

    /// Consecutive frame failures before the engine reports degradation
    #[serde(default = "default_degraded_after_errors")]
    pub degraded_after_errors: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ReporterConfig {
    /// Backend URL receiving `POST {"code": ...}`
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Shown when the backend accepts a code without a message
    #[serde(default = "default_success_message")]
    pub success_message: String,

    /// Shown when the backend cannot be reached
    #[serde(default = "default_failure_message")]
    pub failure_message: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SystemConfig {
    /// Event bus capacity
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,
}

impl ScannerConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("codescan.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            // Start with default values
            .set_default("camera.default_mode", default_scan_mode().as_str())?
            .set_default("camera.focus_settle_ms", default_focus_settle_ms())?
            .set_default("camera.auto_torch", default_auto_torch())?
            .set_default("camera.relax_constraints", default_relax_constraints())?
            .set_default("engine.kind", default_engine_kind().as_str())?
            .set_default("engine.try_harder", default_try_harder())?
            .set_default(
                "engine.linear_scan_rows",
                default_linear_scan_rows() as i64,
            )?
            .set_default(
                "engine.degraded_after_errors",
                default_degraded_after_errors(),
            )?
            .set_default("reporter.endpoint", default_endpoint())?
            .set_default("reporter.timeout_ms", default_timeout_ms())?
            .set_default("reporter.success_message", default_success_message())?
            .set_default("reporter.failure_message", default_failure_message())?
            .set_default(
                "system.event_bus_capacity",
                default_event_bus_capacity() as i64,
            )?
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // SCANNER_<SECTION>__<KEY>, e.g. SCANNER_CAMERA__FOCUS_SETTLE_MS
            .add_source(
                Environment::with_prefix("SCANNER")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: ScannerConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.linear_scan_rows == 0 {
            return Err(ConfigError::Message(
                "Engine linear_scan_rows must be greater than 0".to_string(),
            ));
        }

        if let Some(fps) = self.engine.poll_fps {
            if fps == 0 || fps > MAX_POLL_FPS {
                return Err(ConfigError::Message(format!(
                    "Engine poll_fps must be between 1 and {} when set",
                    MAX_POLL_FPS
                )));
            }
        }

        if self.engine.degraded_after_errors == 0 {
            return Err(ConfigError::Message(
                "Engine degraded_after_errors must be greater than 0".to_string(),
            ));
        }

        if !(self.reporter.endpoint.starts_with("http://")
            || self.reporter.endpoint.starts_with("https://"))
        {
            return Err(ConfigError::Message(format!(
                "Reporter endpoint must be an http(s) URL, got '{}'",
                self.reporter.endpoint
            )));
        }

        if self.reporter.timeout_ms == 0 {
            return Err(ConfigError::Message(
                "Reporter timeout_ms must be greater than 0".to_string(),
            ));
        }

        if self.system.event_bus_capacity == 0 {
            return Err(ConfigError::Message(
                "Event bus capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            camera: CameraConfig::default(),
            engine: EngineConfig::default(),
            reporter: ReporterConfig::default(),
            system: SystemConfig {
                event_bus_capacity: default_event_bus_capacity(),
            },
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            preferred_index: None,
            default_mode: default_scan_mode(),
            focus_settle_ms: default_focus_settle_ms(),
            auto_torch: default_auto_torch(),
            relax_constraints: default_relax_constraints(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            kind: default_engine_kind(),
            try_harder: default_try_harder(),
            linear_scan_rows: default_linear_scan_rows(),
            poll_fps: None,
            degraded_after_errors: default_degraded_after_errors(),
        }
    }
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_ms: default_timeout_ms(),
            success_message: default_success_message(),
            failure_message: default_failure_message(),
        }
    }
}

// Default value functions
fn default_scan_mode() -> ScanMode {
    ScanMode::BarcodeEan
}
fn default_focus_settle_ms() -> u64 {
    1500
}
fn default_auto_torch() -> bool {
    false
}
fn default_relax_constraints() -> bool {
    true
}

fn default_engine_kind() -> EngineKind {
    EngineKind::Continuous
}
fn default_try_harder() -> bool {
    false
}
fn default_linear_scan_rows() -> usize {
    15
}
fn default_degraded_after_errors() -> u32 {
    30
}

fn default_endpoint() -> String {
    "http://127.0.0.1:8080/scan-code".to_string()
}
fn default_timeout_ms() -> u64 {
    10_000
}
fn default_success_message() -> String {
    "Code processed successfully".to_string()
}
fn default_failure_message() -> String {
    "Could not connect to the server".to_string()
}

fn default_event_bus_capacity() -> usize {
    100
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = ScannerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.camera.focus_settle_ms, 1500);
        assert_eq!(config.camera.default_mode, ScanMode::BarcodeEan);
        assert_eq!(config.engine.kind, EngineKind::Continuous);
        assert_eq!(config.camera.preferred_index, None);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[camera]
preferred_index = 1
default_mode = "qrcode"

[engine]
kind = "still"
poll_fps = 5

[reporter]
endpoint = "https://scan.example.com/codes"
"#
        )
        .unwrap();

        let config = ScannerConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.camera.preferred_index, Some(1));
        assert_eq!(config.camera.default_mode, ScanMode::QrCode);
        assert_eq!(config.engine.kind, EngineKind::Still);
        assert_eq!(config.engine.poll_fps, Some(5));
        assert_eq!(config.reporter.endpoint, "https://scan.example.com/codes");
        assert_eq!(config.reporter.timeout_ms, 10_000);
    }

    #[test]
    fn test_environment_variable_override() {
        env::set_var("SCANNER_CAMERA__FOCUS_SETTLE_MS", "250");
        env::set_var("SCANNER_ENGINE__TRY_HARDER", "true");

        let result = ScannerConfig::load_from_file("/nonexistent/codescan.toml");

        env::remove_var("SCANNER_CAMERA__FOCUS_SETTLE_MS");
        env::remove_var("SCANNER_ENGINE__TRY_HARDER");

        let config = result.unwrap();
        assert_eq!(config.camera.focus_settle_ms, 250);
        assert!(config.engine.try_harder);
    }

    #[test]
    fn test_config_validation() {
        let mut config = ScannerConfig::default();

        config.reporter.endpoint = "ftp://example.com".to_string();
        assert!(config.validate().is_err());

        config.reporter.endpoint = default_endpoint();
        config.engine.poll_fps = Some(0);
        assert!(config.validate().is_err());

        config.engine.poll_fps = Some(15);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_poll_fps_upper_bound() {
        let mut config = ScannerConfig::default();

        config.engine.poll_fps = Some(MAX_POLL_FPS);
        assert!(config.validate().is_ok());

        config.engine.poll_fps = Some(2000);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("poll_fps"));
    }

    #[test]
    fn test_round_trips_through_toml() {
        let config = ScannerConfig::default();
        let rendered = toml::to_string_pretty(&config).unwrap();
        assert!(rendered.contains("focus_settle_ms = 1500"));
        let parsed: ScannerConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, config);
    }
}
