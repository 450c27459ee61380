use std::{fs, path::Path, path::PathBuf, time::Duration};

use serde::Deserialize;

use crate::error::ConfigError;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BoothConfig {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub gesture: GestureConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub pose: PoseConfig,
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub score: ScoreConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_max_tries")]
    pub max_tries: u32,
    #[serde(default = "default_start_hold_frames")]
    pub start_hold_frames: u32,
    #[serde(default)]
    pub score_entry: ScoreEntryMode,
    #[serde(default = "default_start_click_x")]
    pub start_click_x: i32,
    #[serde(default = "default_start_click_y")]
    pub start_click_y: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoreEntryMode {
    #[default]
    Always,
    Operator,
    Never,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GestureConfig {
    #[serde(default = "default_hands_joined_threshold_px")]
    pub hands_joined_threshold_px: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_freeze_duration_ms")]
    pub freeze_duration_ms: u64,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_stop_timeout_ms")]
    pub stop_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_csv_path")]
    pub csv_path: PathBuf,
    #[serde(default = "default_leaderboard_top_n")]
    pub leaderboard_top_n: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PoseConfig {
    #[serde(default)]
    pub camera_index: u32,
    #[serde(default = "default_capture_width")]
    pub width: u32,
    #[serde(default = "default_capture_height")]
    pub height: u32,
    #[serde(default = "default_helper_program")]
    pub helper_program: String,
    #[serde(default = "default_helper_args")]
    pub helper_args: Vec<String>,
    #[serde(default)]
    pub replay_path: Option<PathBuf>,
    #[serde(default = "default_replay_frame_ms")]
    pub replay_frame_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InputConfig {
    #[serde(default = "default_input_program")]
    pub program: String,
    #[serde(default)]
    pub dry_run: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScoreConfig {
    #[serde(default)]
    pub sampler_program: Option<String>,
    #[serde(default)]
    pub sampler_args: Vec<String>,
}

fn default_max_tries() -> u32 { 3 }
fn default_start_hold_frames() -> u32 { 10 }
fn default_start_click_x() -> i32 { 1300 }
fn default_start_click_y() -> i32 { 800 }
fn default_hands_joined_threshold_px() -> i32 { 130 }
fn default_poll_interval_ms() -> u64 { 300 }
fn default_freeze_duration_ms() -> u64 { 5_000 }
fn default_timeout_ms() -> u64 { 180_000 }
fn default_stop_timeout_ms() -> u64 { 2_000 }
fn default_csv_path() -> PathBuf { PathBuf::from("scores.csv") }
fn default_leaderboard_top_n() -> usize { 3 }
fn default_capture_width() -> u32 { 1280 }
fn default_capture_height() -> u32 { 960 }
fn default_helper_program() -> String { "python3".to_string() }
fn default_helper_args() -> Vec<String> { vec!["scripts/pose_helper.py".to_string()] }
fn default_replay_frame_ms() -> u64 { 33 }
fn default_input_program() -> String { "xdotool".to_string() }

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_tries: default_max_tries(),
            start_hold_frames: default_start_hold_frames(),
            score_entry: ScoreEntryMode::default(),
            start_click_x: default_start_click_x(),
            start_click_y: default_start_click_y(),
        }
    }
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            hands_joined_threshold_px: default_hands_joined_threshold_px(),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            freeze_duration_ms: default_freeze_duration_ms(),
            timeout_ms: default_timeout_ms(),
            stop_timeout_ms: default_stop_timeout_ms(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            csv_path: default_csv_path(),
            leaderboard_top_n: default_leaderboard_top_n(),
        }
    }
}

impl Default for PoseConfig {
    fn default() -> Self {
        Self {
            camera_index: 0,
            width: default_capture_width(),
            height: default_capture_height(),
            helper_program: default_helper_program(),
            helper_args: default_helper_args(),
            replay_path: None,
            replay_frame_ms: default_replay_frame_ms(),
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            program: default_input_program(),
            dry_run: false,
        }
    }
}

impl MonitorConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    pub fn freeze_polls(&self) -> u32 {
        polls_for(self.freeze_duration_ms, self.poll_interval_ms)
    }

    pub fn failure_ceiling(&self) -> u32 {
        polls_for(self.timeout_ms, self.poll_interval_ms)
    }
}

fn polls_for(duration_ms: u64, poll_interval_ms: u64) -> u32 {
    let polls = duration_ms / poll_interval_ms.max(1);
    polls.clamp(1, u32::MAX as u64) as u32
}

impl BoothConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: BoothConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Falls back to defaults when the file is missing. A file that exists but
    /// does not parse or validate is still an error.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            log::info!("no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.session.max_tries == 0 {
            return Err(ConfigError::Invalid("session.max_tries must be at least 1".into()));
        }
        if self.session.start_hold_frames == 0 {
            return Err(ConfigError::Invalid(
                "session.start_hold_frames must be at least 1".into(),
            ));
        }
        if self.monitor.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid("monitor.poll_interval_ms must be positive".into()));
        }
        if self.gesture.hands_joined_threshold_px <= 0 {
            return Err(ConfigError::Invalid(
                "gesture.hands_joined_threshold_px must be positive".into(),
            ));
        }
        Ok(())
    }
}
