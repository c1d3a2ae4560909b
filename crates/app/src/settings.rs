use std::path::{Path, PathBuf};
use std::time::Duration;

use curator_state::title::{
    DEFAULT_CARD_TITLE_MAX_CHARS, DEFAULT_ELLIPSIS, DEFAULT_TITLE_MAX_CHARS,
    DEFAULT_TITLE_MAX_WORDS,
};
use curator_state::{TitleRules, WorkspaceConfig};
use figment::{
    Figment,
    providers::{Env, Format, Json, Serialized},
};
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, Snafu};

pub const SETTINGS_DIRECTORY_NAME: &str = "curator";
pub const SETTINGS_FILE_NAME: &str = "settings.json";
pub const SETTINGS_ENV_PREFIX: &str = "CURATOR_";
pub const DEFAULT_RETITLE_DELAY_MS: u64 = 100;
pub const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TitleSettings {
    #[serde(default = "default_title_max_words")]
    pub max_words: usize,
    #[serde(default = "default_title_max_chars")]
    pub max_chars: usize,
    #[serde(default = "default_ellipsis")]
    pub ellipsis: String,
}

impl Default for TitleSettings {
    fn default() -> Self {
        Self {
            max_words: default_title_max_words(),
            max_chars: default_title_max_chars(),
            ellipsis: default_ellipsis(),
        }
    }
}

impl TitleSettings {
    pub fn to_rules(&self) -> TitleRules {
        TitleRules {
            max_words: self.max_words,
            max_chars: self.max_chars,
            ellipsis: self.ellipsis.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CuratorSettings {
    #[serde(default = "default_retitle_delay_ms")]
    pub retitle_delay_ms: u64,
    #[serde(default)]
    pub title: TitleSettings,
    #[serde(default = "default_card_title_max_chars")]
    pub card_title_max_chars: usize,
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

impl Default for CuratorSettings {
    fn default() -> Self {
        Self {
            retitle_delay_ms: default_retitle_delay_ms(),
            title: TitleSettings::default(),
            card_title_max_chars: default_card_title_max_chars(),
            log_filter: default_log_filter(),
        }
    }
}

impl CuratorSettings {
    pub fn retitle_delay(&self) -> Duration {
        Duration::from_millis(self.retitle_delay_ms)
    }

    pub fn workspace_config(&self) -> WorkspaceConfig {
        WorkspaceConfig {
            title_rules: self.title.to_rules(),
            card_title_max_chars: self.card_title_max_chars,
        }
    }

    pub fn normalized(mut self) -> Self {
        // Zero limits would turn every title into a bare ellipsis.
        if self.title.max_words == 0 {
            self.title.max_words = default_title_max_words();
        }
        if self.title.max_chars == 0 {
            self.title.max_chars = default_title_max_chars();
        }
        if self.card_title_max_chars == 0 {
            self.card_title_max_chars = default_card_title_max_chars();
        }

        self.log_filter = if self.log_filter.trim().is_empty() {
            default_log_filter()
        } else {
            self.log_filter.trim().to_string()
        };

        self
    }
}

/// Settings layers, lowest first: built-in defaults, the JSON file, `CURATOR_*` env.
#[derive(Debug, Clone)]
pub struct SettingsSource {
    config_path: PathBuf,
}

impl SettingsSource {
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .map(|path| path.join(SETTINGS_DIRECTORY_NAME))
            .unwrap_or_else(|| PathBuf::from(".curator"))
    }

    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join(SETTINGS_FILE_NAME)
    }

    pub fn new(config_path: PathBuf) -> Self {
        Self { config_path }
    }

    pub fn at_default_path() -> Self {
        Self::new(Self::default_config_path())
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Merges every layer and normalizes the result.
    ///
    /// A missing file only contributes nothing; a file or env value that does not fit
    /// [`CuratorSettings`] is an error.
    pub fn load(&self) -> Result<CuratorSettings, SettingsError> {
        if !self.config_path.exists() {
            tracing::info!(
                "settings file not found at {:?}, using defaults and environment",
                self.config_path
            );
        }

        let settings = Figment::from(Serialized::defaults(CuratorSettings::default()))
            .merge(Json::file(&self.config_path))
            .merge(Env::prefixed(SETTINGS_ENV_PREFIX).split("__"))
            .extract::<CuratorSettings>()
            .map_err(Box::new)
            .context(ExtractSnafu {
                stage: "extract-settings",
                path: self.config_path.clone(),
            })?
            .normalized();

        tracing::debug!("loaded settings {:?}", settings);
        Ok(settings)
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SettingsError {
    #[snafu(display("invalid settings layered over {path:?} on `{stage}`: {source}"))]
    Extract {
        stage: &'static str,
        path: PathBuf,
        source: Box<figment::Error>,
    },
}

fn default_retitle_delay_ms() -> u64 {
    DEFAULT_RETITLE_DELAY_MS
}

fn default_title_max_words() -> usize {
    DEFAULT_TITLE_MAX_WORDS
}

fn default_title_max_chars() -> usize {
    DEFAULT_TITLE_MAX_CHARS
}

fn default_ellipsis() -> String {
    DEFAULT_ELLIPSIS.to_string()
}

fn default_card_title_max_chars() -> usize {
    DEFAULT_CARD_TITLE_MAX_CHARS
}

fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}
