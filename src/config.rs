use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SnapcamConfig {
    pub timing: TimingConfig,
    pub capture: CaptureConfig,
    pub library: LibraryConfig,
    pub settings: SettingsConfig,
    pub system: SystemConfig,
}

/// Delays driving the view-state machine, in milliseconds
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct TimingConfig {
    /// Welcome splash duration before the main screen appears
    #[serde(default = "default_welcome_ms")]
    pub welcome_ms: u64,

    /// Value the countdown counter is reset to on entry
    #[serde(default = "default_countdown_start")]
    pub countdown_start: u8,

    /// Interval between countdown decrements
    #[serde(default = "default_countdown_tick_ms")]
    pub countdown_tick_ms: u64,

    /// Delay between entering the capture screen and issuing the photo
    #[serde(default = "default_photo_capture_delay_ms")]
    pub photo_capture_delay_ms: u64,

    /// Delay between entering the capture screen and returning to main after a photo
    #[serde(default = "default_photo_return_ms")]
    pub photo_return_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CaptureConfig {
    /// Directory holding in-progress recordings
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: String,

    /// File extension for scratch recordings
    #[serde(default = "default_video_extension")]
    pub video_extension: String,

    /// Timezone used when stamping scratch file names
    #[serde(default = "default_timestamp_timezone")]
    pub timestamp_timezone: String,

    /// Largest thumbnail requested from the library (width, height)
    #[serde(default = "default_thumbnail_max_size")]
    pub thumbnail_max_size: (u32, u32),

    /// Remove recordings left behind by a previous run
    #[serde(default = "default_clean_scratch_on_start")]
    pub clean_scratch_on_start: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LibraryConfig {
    /// Directory backing the filesystem media library
    #[serde(default = "default_library_path")]
    pub path: String,

    /// Write a JSON sidecar next to every saved asset
    #[serde(default = "default_save_metadata")]
    pub save_metadata: bool,
}

/// Launch values for the capture settings panel
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SettingsConfig {
    #[serde(default = "default_photo_count")]
    pub photo_count: i64,

    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: i64,

    #[serde(default = "default_exposure_compensation")]
    pub exposure_compensation: f64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SystemConfig {
    /// Event bus capacity
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,

    /// Depth of the session and view command queues
    #[serde(default = "default_command_queue_capacity")]
    pub command_queue_capacity: usize,
}

impl TimingConfig {
    pub fn welcome(&self) -> Duration {
        Duration::from_millis(self.welcome_ms)
    }

    pub fn countdown_tick(&self) -> Duration {
        Duration::from_millis(self.countdown_tick_ms)
    }

    pub fn photo_capture_delay(&self) -> Duration {
        Duration::from_millis(self.photo_capture_delay_ms)
    }

    pub fn photo_return(&self) -> Duration {
        Duration::from_millis(self.photo_return_ms)
    }
}

impl CaptureConfig {
    pub fn scratch_path(&self) -> PathBuf {
        PathBuf::from(&self.scratch_dir)
    }
}

impl SnapcamConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("snapcam.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("timing.welcome_ms", default_welcome_ms() as i64)?
            .set_default("timing.countdown_start", default_countdown_start() as i64)?
            .set_default("timing.countdown_tick_ms", default_countdown_tick_ms() as i64)?
            .set_default(
                "timing.photo_capture_delay_ms",
                default_photo_capture_delay_ms() as i64,
            )?
            .set_default("timing.photo_return_ms", default_photo_return_ms() as i64)?
            .set_default("capture.scratch_dir", default_scratch_dir())?
            .set_default("capture.video_extension", default_video_extension())?
            .set_default("capture.timestamp_timezone", default_timestamp_timezone())?
            .set_default(
                "capture.thumbnail_max_size",
                vec![
                    default_thumbnail_max_size().0,
                    default_thumbnail_max_size().1,
                ],
            )?
            .set_default(
                "capture.clean_scratch_on_start",
                default_clean_scratch_on_start(),
            )?
            .set_default("library.path", default_library_path())?
            .set_default("library.save_metadata", default_save_metadata())?
            .set_default("settings.photo_count", default_photo_count())?
            .set_default("settings.interval_seconds", default_interval_seconds())?
            .set_default(
                "settings.exposure_compensation",
                default_exposure_compensation(),
            )?
            .set_default(
                "system.event_bus_capacity",
                default_event_bus_capacity() as i64,
            )?
            .set_default(
                "system.command_queue_capacity",
                default_command_queue_capacity() as i64,
            )?
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // SNAPCAM_TIMING__WELCOME_MS=500 overrides timing.welcome_ms
            .add_source(
                Environment::with_prefix("SNAPCAM")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: SnapcamConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Render as a TOML document, as accepted by [`SnapcamConfig::load_from_file`]
    pub fn to_toml(&self) -> crate::error::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        let timing = &self.timing;

        if timing.countdown_start == 0 || timing.countdown_start > 9 {
            return Err(ConfigError::Message(
                "Countdown start must be between 1 and 9".to_string(),
            ));
        }

        for (name, value) in [
            ("welcome_ms", timing.welcome_ms),
            ("countdown_tick_ms", timing.countdown_tick_ms),
            ("photo_capture_delay_ms", timing.photo_capture_delay_ms),
            ("photo_return_ms", timing.photo_return_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::Message(format!(
                    "Timing {} must be greater than 0",
                    name
                )));
            }
        }

        if timing.photo_capture_delay_ms >= timing.photo_return_ms {
            return Err(ConfigError::Message(
                "Photo capture delay must be shorter than the photo return delay".to_string(),
            ));
        }

        if self.capture.scratch_dir.trim().is_empty() {
            return Err(ConfigError::Message(
                "Capture scratch_dir must not be empty".to_string(),
            ));
        }

        if same_dir(&self.capture.scratch_path(), Path::new(&self.library.path)) {
            return Err(ConfigError::Message(
                "Capture scratch_dir must differ from the library path".to_string(),
            ));
        }

        if self.capture.thumbnail_max_size.0 == 0 || self.capture.thumbnail_max_size.1 == 0 {
            return Err(ConfigError::Message(
                "Thumbnail size must be greater than 0".to_string(),
            ));
        }

        if self.system.event_bus_capacity == 0 {
            return Err(ConfigError::Message(
                "Event bus capacity must be greater than 0".to_string(),
            ));
        }

        if self.system.command_queue_capacity == 0 {
            return Err(ConfigError::Message(
                "Command queue capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Component-wise comparison that ignores `.` segments
fn same_dir(a: &Path, b: &Path) -> bool {
    fn significant(path: &Path) -> Vec<Component<'_>> {
        path.components()
            .filter(|c| !matches!(c, Component::CurDir))
            .collect::<Vec<_>>()
    }
    significant(a) == significant(b)
}

impl Default for SnapcamConfig {
    fn default() -> Self {
        Self {
            timing: TimingConfig {
                welcome_ms: default_welcome_ms(),
                countdown_start: default_countdown_start(),
                countdown_tick_ms: default_countdown_tick_ms(),
                photo_capture_delay_ms: default_photo_capture_delay_ms(),
                photo_return_ms: default_photo_return_ms(),
            },
            capture: CaptureConfig {
                scratch_dir: default_scratch_dir(),
                video_extension: default_video_extension(),
                timestamp_timezone: default_timestamp_timezone(),
                thumbnail_max_size: default_thumbnail_max_size(),
                clean_scratch_on_start: default_clean_scratch_on_start(),
            },
            library: LibraryConfig {
                path: default_library_path(),
                save_metadata: default_save_metadata(),
            },
            settings: SettingsConfig {
                photo_count: default_photo_count(),
                interval_seconds: default_interval_seconds(),
                exposure_compensation: default_exposure_compensation(),
            },
            system: SystemConfig {
                event_bus_capacity: default_event_bus_capacity(),
                command_queue_capacity: default_command_queue_capacity(),
            },
        }
    }
}

// Default value functions
fn default_welcome_ms() -> u64 {
    2000
}
fn default_countdown_start() -> u8 {
    3
}
fn default_countdown_tick_ms() -> u64 {
    1000
}
fn default_photo_capture_delay_ms() -> u64 {
    500
}
fn default_photo_return_ms() -> u64 {
    2000
}

fn default_scratch_dir() -> String {
    std::env::temp_dir()
        .join("snapcam")
        .to_string_lossy()
        .into_owned()
}
fn default_video_extension() -> String {
    "mov".to_string()
}
fn default_timestamp_timezone() -> String {
    "UTC".to_string()
}
fn default_thumbnail_max_size() -> (u32, u32) {
    (200, 200)
}
fn default_clean_scratch_on_start() -> bool {
    true
}

fn default_library_path() -> String {
    "./library".to_string()
}
fn default_save_metadata() -> bool {
    false
}

fn default_photo_count() -> i64 {
    1
}
fn default_interval_seconds() -> i64 {
    1
}
fn default_exposure_compensation() -> f64 {
    0.0
}

fn default_event_bus_capacity() -> usize {
    100
}
fn default_command_queue_capacity() -> usize {
    32
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = SnapcamConfig::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.timing.welcome(), Duration::from_secs(2));
        assert_eq!(config.timing.countdown_start, 3);
        assert_eq!(config.timing.photo_capture_delay(), Duration::from_millis(500));
    }

    #[test]
    fn test_load_from_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[timing]\nwelcome_ms = 750\ncountdown_start = 5\n\n[library]\npath = \"/tmp/snaps\"\n"
        )
        .unwrap();

        let config = SnapcamConfig::load_from_file(file.path()).unwrap();

        assert_eq!(config.timing.welcome_ms, 750);
        assert_eq!(config.timing.countdown_start, 5);
        assert_eq!(config.timing.countdown_tick_ms, 1000);
        assert_eq!(config.library.path, "/tmp/snaps");
        assert_eq!(config.capture.thumbnail_max_size, (200, 200));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = SnapcamConfig::load_from_file("/nonexistent/snapcam-test-config").unwrap();
        assert_eq!(config.timing, SnapcamConfig::default().timing);
    }

    #[test]
    fn test_config_validation() {
        let mut config = SnapcamConfig::default();

        config.timing.countdown_start = 0;
        assert!(config.validate().is_err());
        config.timing.countdown_start = 3;

        config.timing.photo_capture_delay_ms = 2500;
        assert!(config.validate().is_err());
        config.timing.photo_capture_delay_ms = 500;

        config.system.command_queue_capacity = 0;
        assert!(config.validate().is_err());
        config.system.command_queue_capacity = 8;

        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_scratch_dir_shared_with_library_is_rejected() {
        let mut config = SnapcamConfig::default();
        config.library.path = "./media".to_string();

        config.capture.scratch_dir = "media/".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("scratch_dir"));

        config.capture.scratch_dir = "media/scratch".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_config_renders_as_toml() {
        let rendered = SnapcamConfig::default().to_toml().unwrap();
        assert!(rendered.contains("[timing]"));
        assert!(rendered.contains("welcome_ms = 2000"));
    }
}
