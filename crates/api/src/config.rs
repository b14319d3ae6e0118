//! Service Configuration
//!
//! Layered with the `config` crate: built-in defaults, an optional TOML
//! file, then `ATTENTION_`-prefixed environment variables using `__` as the
//! section separator (e.g. `ATTENTION_SERVER__BIND_ADDR`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use attention_engine::AnalysisConfig;
use eye_tracker::TrackerConfig;
use frame_capture::CaptureConfig;
use plot_render::PlotConfig;
use serde::{Deserialize, Serialize};
use storage::StorageConfig;

/// Default config file looked up when none is given
pub const DEFAULT_CONFIG_FILE: &str = "attention.toml";

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Multipart upload limit
    pub max_upload_bytes: usize,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:5000".to_string(),
            max_upload_bytes: 512 * 1024 * 1024,
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
        }
    }
}

/// Best-effort re-encoding of uploads before analysis
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscodeConfig {
    /// Transcode every upload, not only when the request asks for it
    pub always: bool,
}

/// Annotated frame output
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotateConfig {
    /// Directory for annotated frames; disabled when unset
    pub dir: Option<PathBuf>,
    pub every: u32,
    /// Stop sampling after this many frames while annotating
    pub max_frames: Option<usize>,
}

impl Default for AnnotateConfig {
    fn default() -> Self {
        Self {
            dir: None,
            every: 30,
            max_frames: None,
        }
    }
}

/// Chat-completion proxy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    pub api_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
    /// Read from `OPENAI_API_KEY`, never from files
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4".to_string(),
            max_tokens: 500,
            temperature: 0.7,
            timeout_secs: 30,
            api_key: None,
        }
    }
}

impl AssistantConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }
}

/// Complete service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub capture: CaptureConfig,
    pub detector: TrackerConfig,
    pub analysis: AnalysisConfig,
    pub render: PlotConfig,
    pub transcode: TranscodeConfig,
    pub annotate: AnnotateConfig,
    pub assistant: AssistantConfig,
}

impl AppConfig {
    /// Load configuration
    ///
    /// An explicit `path` must exist; otherwise [`DEFAULT_CONFIG_FILE`] is
    /// read when present.
    pub fn load(path: Option<&Path>) -> Result<Self, config::ConfigError> {
        let file = match path {
            Some(p) => config::File::from(p).required(true),
            None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let mut cfg: AppConfig = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix("ATTENTION")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        cfg.assistant.api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());
        Ok(cfg)
    }
}
