use anyhow::{Context, Result};
use directories::ProjectDirs;
use facematch_vision::{model::DEFAULT_MODEL_PATH, PixelScale, SessionConfig};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub static CONFIG_PATH: Lazy<&'static Path> = Lazy::new(|| {
    Path::new(option_env!("FACEMATCH_CONFIG_PATH").unwrap_or("/usr/local/etc/facematch/config.toml"))
});

pub const DEFAULT_THRESHOLD: f32 = 0.6;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Minimum cosine similarity counted as the same person.
    pub threshold: f32,
    pub model_path: PathBuf,
    pub intra_threads: usize,
    pub inter_threads: usize,
    pub pixel_scale: PixelScale,
    pub store_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            intra_threads: 1,
            inter_threads: 1,
            pixel_scale: PixelScale::default(),
            store_dir: None,
        }
    }
}

impl Config {
    pub fn session(&self) -> SessionConfig {
        SessionConfig {
            model_path: self.model_path.clone(),
            intra_threads: self.intra_threads,
            inter_threads: self.inter_threads,
        }
    }

    pub fn store_dir(&self) -> PathBuf {
        if let Some(dir) = &self.store_dir {
            return dir.clone();
        }
        ProjectDirs::from("", "", "facematch")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("data"))
    }

    fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.threshold.is_finite() && (-1.0..=1.0).contains(&self.threshold),
            "threshold must be within [-1, 1], got {}",
            self.threshold
        );
        anyhow::ensure!(
            self.intra_threads > 0 && self.inter_threads > 0,
            "thread counts must be positive"
        );
        Ok(())
    }
}

pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = path.unwrap_or(&CONFIG_PATH);
    if !path.exists() {
        return Ok(Config::default());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config at {}", path.display()))?;
    let cfg: Config =
        toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("validating config {}", path.display()))?;
    Ok(cfg)
}

pub fn save_config(cfg: &Config, path: Option<&Path>) -> Result<()> {
    let path = path.unwrap_or(&CONFIG_PATH);
    let data = toml::to_string_pretty(cfg)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, data)?;
    Ok(())
}
