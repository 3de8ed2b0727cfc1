use anyhow::Context;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::export::SubtitleFormat;
use crate::lyrics::MatchOptions;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub provider: ProviderConfig,
    pub sync: SyncConfig,
    pub export: ExportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// API root of the music generation provider.
    pub base_url: String,
    /// Bearer token; falls back to `LYRICSYNC_API_KEY` when unset.
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Provider tokens that may be joined to spell one lyric word
    pub max_split_tokens: usize,
    /// Songs whose offsets are remembered
    pub offset_capacity: usize,
    /// Skip section markers when highlighting
    pub skip_markers: bool,
    /// Pause before auto-scroll resumes after a manual scroll
    pub scroll_cooldown_ms: u64,
    /// Playback clock resolution for `follow`
    pub tick_ms: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub format: SubtitleFormat,
    /// Where exported files go (current directory when unset)
    pub output_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            paths: PathsConfig::default(),
            provider: ProviderConfig::default(),
            sync: SyncConfig::default(),
            export: ExportConfig::default(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        let proj = ProjectDirs::from("dev", "lyricsync", "lyricsync");
        let data_dir = proj
            .as_ref()
            .map(|p| p.data_dir().to_path_buf())
            .unwrap_or_else(|| std::env::temp_dir().join("lyricsync"));
        Self { data_dir }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.sunoapi.org/api/v1".to_string(),
            api_key: None,
            timeout_secs: 30,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_split_tokens: crate::lyrics::matcher::DEFAULT_MAX_SPLIT_TOKENS,
            offset_capacity: crate::sync::offset::DEFAULT_OFFSET_CAPACITY,
            skip_markers: true,
            scroll_cooldown_ms: 3000,
            tick_ms: 100,
        }
    }
}

impl SyncConfig {
    pub fn match_options(&self) -> MatchOptions {
        MatchOptions {
            max_split_tokens: self.max_split_tokens,
        }
    }
}

impl Config {
    pub fn db_path(&self) -> PathBuf {
        self.paths.data_dir.join("lyricsync.sqlite3")
    }

    /// Configured key, else the environment.
    pub fn api_key(&self) -> Option<String> {
        self.provider
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var("LYRICSYNC_API_KEY").ok())
    }
}

#[allow(dead_code)]
pub fn save(cfg: &Config, override_path: Option<&Path>) -> anyhow::Result<()> {
    let path = match override_path {
        Some(p) => p.to_path_buf(),
        None => default_config_path()?,
    };
    write_config(cfg, &path)
}

fn write_config(cfg: &Config, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create dir {}", parent.display()))?;
    }
    let raw = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(path, raw).with_context(|| format!("write {}", path.display()))?;
    #[cfg(unix)]
    {
        // May hold an API key
        use std::os::unix::fs::PermissionsExt;
        let _ = fs::set_permissions(path, fs::Permissions::from_mode(0o600));
    }
    Ok(())
}

pub fn default_config_path() -> anyhow::Result<PathBuf> {
    let proj = ProjectDirs::from("dev", "lyricsync", "lyricsync").context("ProjectDirs unavailable")?;
    Ok(proj.config_dir().join("config.toml"))
}

pub fn load(override_path: Option<&Path>) -> anyhow::Result<Config> {
    let path = match override_path {
        Some(p) => p.to_path_buf(),
        None => default_config_path()?,
    };

    if !path.exists() {
        let cfg = Config::default();
        write_config(&cfg, &path).context("write default config")?;
        return Ok(cfg);
    }

    let raw = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    let cfg = toml::from_str::<Config>(&raw).with_context(|| format!("parse {}", path.display()))?;
    Ok(cfg)
}
