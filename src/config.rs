use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;

/// Config file picked up from the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "ai-helper.yaml";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<String>,

    /// Base URL of the server hosting the assistant endpoint
    #[arg(long, env = "ASSISTANT_BASE_URL")]
    pub base_url: Option<String>,

    /// Path of the JSON file used as persistent storage
    #[arg(long, env = "ASSISTANT_STORAGE")]
    pub storage: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON")]
    pub log_json: Option<bool>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub endpoint: EndpointConfig,
    pub storage: StorageConfig,
    pub timing: TimingConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EndpointConfig {
    pub base_url: String,
    pub ask_path: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub path: PathBuf,
}

/// Delays driving the widget's transient UI.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct TimingConfig {
    /// How long a key-status notice stays visible.
    pub notice_ms: u64,
    /// Delay between saving a key and showing the chat.
    pub chat_switch_ms: u64,
    /// Delay between a credential failure and showing the key form again.
    pub rekey_ms: u64,
    /// Loading indicator tick.
    pub indicator_tick_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    pub json: bool,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            notice_ms: 3000,
            chat_switch_ms: 1000,
            rekey_ms: 2000,
            indicator_tick_ms: 500,
        }
    }
}

impl TimingConfig {
    #[must_use]
    pub fn notice(&self) -> Duration {
        Duration::from_millis(self.notice_ms)
    }

    #[must_use]
    pub fn chat_switch(&self) -> Duration {
        Duration::from_millis(self.chat_switch_ms)
    }

    #[must_use]
    pub fn rekey(&self) -> Duration {
        Duration::from_millis(self.rekey_ms)
    }

    #[must_use]
    pub fn indicator_tick(&self) -> Duration {
        Duration::from_millis(self.indicator_tick_ms.max(1))
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from_args(std::env::args())
    }

    pub fn load_from_args<I, T>(args: I) -> Result<Self, config::ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli =
            Cli::try_parse_from(args).map_err(|e| config::ConfigError::Message(e.to_string()))?;

        let timing = TimingConfig::default();
        let mut builder = Config::builder()
            .set_default("endpoint.base_url", "http://127.0.0.1:5000")?
            .set_default("endpoint.ask_path", "/ai/ask")?
            .set_default("endpoint.timeout_secs", 60)?
            .set_default("storage.path", "ai-helper-storage.json")?
            .set_default("timing.notice_ms", timing.notice_ms)?
            .set_default("timing.chat_switch_ms", timing.chat_switch_ms)?
            .set_default("timing.rekey_ms", timing.rekey_ms)?
            .set_default("timing.indicator_tick_ms", timing.indicator_tick_ms)?
            .set_default("logging.json", false)?;

        // An explicit file must exist; the working-directory fallback is optional.
        match cli.config.as_deref() {
            Some(path) => {
                builder = builder.add_source(File::from(Path::new(path)).required(true));
            }
            None => {
                builder =
                    builder.add_source(File::from(Path::new(DEFAULT_CONFIG_FILE)).required(false));
            }
        }

        // AI_HELPER_ENDPOINT__BASE_URL=http://... etc.
        builder = builder.add_source(
            Environment::with_prefix("AI_HELPER")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        // CLI flags (and their clap env fallbacks) win over everything else.
        if let Some(base_url) = cli.base_url {
            builder = builder.set_override("endpoint.base_url", base_url)?;
        }
        if let Some(storage) = cli.storage {
            builder = builder.set_override("storage.path", storage)?;
        }
        if let Some(json) = cli.log_json {
            builder = builder.set_override("logging.json", json)?;
        }

        let cfg = builder.build()?;
        cfg.try_deserialize()
    }
}
