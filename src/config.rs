use crate::session::SessionConfig;
use crate::staircase::Staircase;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Milliseconds per host tick; playback, cues, and the reward overlay all
/// advance on this clock.
const DEFAULT_TICK_RATE_MS: u64 = 100;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub voice: String,
    pub game_length: usize,
    pub min_practice_rounds: usize,
    pub reward_hits: u32,
    pub selection_options: usize,
    pub start_snr_db: f32,
    pub on_hit_db: f32,
    pub on_miss_db: f32,
    pub on_unsure_db: f32,
    pub practice_step_db: f32,
    #[serde(default = "default_tick_rate_ms")]
    pub tick_rate_ms: u64,
}

fn default_tick_rate_ms() -> u64 {
    DEFAULT_TICK_RATE_MS
}

impl Default for Config {
    fn default() -> Self {
        let session = SessionConfig::default();
        Self {
            voice: "female".to_string(),
            game_length: session.game_length,
            min_practice_rounds: session.min_practice_rounds,
            reward_hits: session.reward_hits,
            selection_options: session.selection_options,
            start_snr_db: session.start_snr_db,
            on_hit_db: session.staircase.on_hit_db,
            on_miss_db: session.staircase.on_miss_db,
            on_unsure_db: session.staircase.on_unsure_db,
            practice_step_db: session.staircase.practice_step_db,
            tick_rate_ms: DEFAULT_TICK_RATE_MS,
        }
    }
}

impl Config {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_rate_ms.max(1))
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            game_length: self.game_length,
            min_practice_rounds: self.min_practice_rounds,
            reward_hits: self.reward_hits,
            selection_options: self.selection_options,
            start_snr_db: self.start_snr_db,
            staircase: Staircase {
                on_hit_db: self.on_hit_db,
                on_miss_db: self.on_miss_db,
                on_unsure_db: self.on_unsure_db,
                practice_step_db: self.practice_step_db,
            },
        }
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new() -> Self {
        let path = if let Some(pd) = ProjectDirs::from("", "", "lisn") {
            pd.config_dir().join("config.json")
        } else {
            PathBuf::from("lisn_config.json")
        };
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        if let Ok(bytes) = fs::read(&self.path) {
            if let Ok(cfg) = serde_json::from_slice::<Config>(&bytes) {
                return cfg;
            }
        }
        Config::default()
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg).unwrap_or_default();
        fs::write(&self.path, data)
    }
}
