use std::path::PathBuf;

use anyhow::Context;
use serde::Deserialize;

/// Environment variable naming an optional YAML config file.
pub const CONFIG_ENV: &str = "RAWHTTP_CONFIG";
/// Environment variable overriding the listen port.
pub const PORT_ENV: &str = "PORT";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Config {
    /// TCP port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Base URL `/httpbin/...` requests are forwarded to
    #[serde(default = "default_upstream")]
    pub upstream: String,

    /// File streamed by `/video`
    #[serde(default = "default_video_path")]
    pub video_path: PathBuf,
}

fn default_port() -> u16 {
    42069
}

fn default_upstream() -> String {
    "http://httpbin.org".to_string()
}

fn default_video_path() -> PathBuf {
    PathBuf::from("assets/vim.mp4")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            upstream: default_upstream(),
            video_path: default_video_path(),
        }
    }
}

impl Config {
    /// Loads the YAML file named by `RAWHTTP_CONFIG` (defaults if unset),
    /// then applies a `PORT` override.
    pub fn load() -> anyhow::Result<Self> {
        let mut cfg = match std::env::var(CONFIG_ENV) {
            Ok(path) => {
                let raw = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read config file {}", path))?;
                Self::from_yaml(&raw).with_context(|| format!("Invalid config file {}", path))?
            }
            Err(_) => Self::default(),
        };

        if let Ok(port) = std::env::var(PORT_ENV) {
            cfg.port = port
                .parse()
                .with_context(|| format!("Invalid {} value '{}'", PORT_ENV, port))?;
        }

        Ok(cfg)
    }

    pub fn from_yaml(raw: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(raw)?)
    }
}
