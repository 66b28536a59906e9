use crate::error::ConfigError;
use anyhow::{Context, Result};
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Top-level configuration, loaded once per process from `moltbot.toml`.
///
/// The decision pipeline reads configuration once per cycle and never mutates
/// it; durable counters and tables live in the state store instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Workspace directory - computed from home, not serialized
    #[serde(skip)]
    pub workspace_dir: PathBuf,
    /// Path to moltbot.toml - computed from home, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,

    #[serde(default)]
    pub topics: TopicsConfig,

    #[serde(default)]
    pub signals: SignalsConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicsConfig {
    /// Seed topic used until the adaptive history has anything to say.
    #[serde(default = "default_topic")]
    pub default_topic: String,

    /// Exploration pool for the adaptive topic selector; also the community
    /// pools the publisher fetches targets from. Underscores read as spaces.
    #[serde(default)]
    pub exploration_pool: Vec<String>,

    /// Safe fallback topics when the exploration pool is empty.
    #[serde(default = "default_evergreen_topics")]
    pub evergreen_topics: Vec<String>,

    /// Any topic containing one of these substrings has its effective score
    /// capped at zero and is excluded from postable-topic selection.
    #[serde(default = "default_blocked_keywords")]
    pub blocked_keywords: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalsConfig {
    /// RSS feed URLs polled for fact-pack grounding. Only the first feed is
    /// consulted each cycle.
    #[serde(default)]
    pub rss_feeds: Vec<String>,

    #[serde(default = "default_rss_item_limit")]
    pub rss_item_limit: usize,

    #[serde(default = "default_search_result_limit")]
    pub search_result_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Base generation cadence before the adaptive multiplier is applied.
    #[serde(default = "default_base_interval_mins")]
    pub base_interval_mins: u64,

    /// Hard ceiling on the effective cadence.
    #[serde(default = "default_max_interval_mins")]
    pub max_interval_mins: u64,

    /// When false the pipeline generates candidates but never publishes.
    #[serde(default)]
    pub autonomous_mode: bool,

    /// Kill switch: generation may run, publishing is refused outright.
    #[serde(default)]
    pub emergency_stop: bool,

    /// Minimum safety confidence for autonomous publishing.
    #[serde(default = "default_auto_post_confidence_min")]
    pub auto_post_confidence_min: u8,
}

fn default_topic() -> String {
    "background task scheduling".to_string()
}

fn default_evergreen_topics() -> Vec<String> {
    [
        "development best practices",
        "language tips and idioms",
        "productivity systems for engineers",
        "reading habits for developers",
        "learning new programming concepts",
        "debugging techniques",
        "writing clear technical documentation",
        "code review and collaboration",
        "app performance optimization",
        "healthy habits for focused work",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

fn default_blocked_keywords() -> Vec<String> {
    [
        "politics", "political", "war", "hate", "sex", "sexual", "breaking", "today", "price",
        "election", "ceo", "lawsuit",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

fn default_rss_item_limit() -> usize {
    5
}

fn default_search_result_limit() -> usize {
    5
}

fn default_base_interval_mins() -> u64 {
    45
}

fn default_max_interval_mins() -> u64 {
    360
}

fn default_auto_post_confidence_min() -> u8 {
    80
}

impl Default for TopicsConfig {
    fn default() -> Self {
        Self {
            default_topic: default_topic(),
            exploration_pool: Vec::new(),
            evergreen_topics: default_evergreen_topics(),
            blocked_keywords: default_blocked_keywords(),
        }
    }
}

impl Default for SignalsConfig {
    fn default() -> Self {
        Self {
            rss_feeds: Vec::new(),
            rss_item_limit: default_rss_item_limit(),
            search_result_limit: default_search_result_limit(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            base_interval_mins: default_base_interval_mins(),
            max_interval_mins: default_max_interval_mins(),
            autonomous_mode: false,
            emergency_stop: false,
            auto_post_confidence_min: default_auto_post_confidence_min(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace_dir: PathBuf::new(),
            config_path: PathBuf::new(),
            topics: TopicsConfig::default(),
            signals: SignalsConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl Config {
    /// Load `~/.moltbot/moltbot.toml`, writing a default file on first run.
    pub fn load_or_init() -> Result<Self> {
        let workspace_dir = workspace_dir()?;
        let config_path = workspace_dir.join("moltbot.toml");

        let mut config: Self = if config_path.exists() {
            let raw = fs::read_to_string(&config_path)
                .with_context(|| format!("reading {}", config_path.display()))?;
            toml::from_str(&raw).with_context(|| format!("parsing {}", config_path.display()))?
        } else {
            let config = Self::default();
            fs::create_dir_all(&workspace_dir)
                .with_context(|| format!("creating {}", workspace_dir.display()))?;
            fs::write(&config_path, toml::to_string_pretty(&config)?)
                .with_context(|| format!("writing {}", config_path.display()))?;
            config
        };

        config.workspace_dir = workspace_dir;
        config.config_path = config_path;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.scheduler.base_interval_mins == 0 {
            return Err(ConfigError::Validation(
                "scheduler.base_interval_mins must be at least 1".to_string(),
            ));
        }
        if self.scheduler.max_interval_mins < self.scheduler.base_interval_mins {
            return Err(ConfigError::Validation(
                "scheduler.max_interval_mins must not be below base_interval_mins".to_string(),
            ));
        }
        if self.scheduler.auto_post_confidence_min > 100 {
            return Err(ConfigError::Validation(
                "scheduler.auto_post_confidence_min must be within 0..=100".to_string(),
            ));
        }
        Ok(())
    }

    /// Path of the durable state file shared by all stateful components.
    pub fn state_path(&self) -> PathBuf {
        self.workspace_dir.join("state.json")
    }
}

fn workspace_dir() -> Result<PathBuf> {
    let dirs = UserDirs::new().context("cannot determine home directory")?;
    Ok(dirs.home_dir().join(".moltbot"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn zero_base_interval_is_rejected() {
        let mut config = Config::default();
        config.scheduler.base_interval_mins = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn ceiling_below_base_is_rejected() {
        let mut config = Config::default();
        config.scheduler.base_interval_mins = 60;
        config.scheduler.max_interval_mins = 30;
        assert!(config.validate().is_err());
    }

    #[test]
    fn config_round_trips_through_toml() {
        let mut config = Config::default();
        config.topics.exploration_pool = vec!["rust_dev".to_string(), "askprogramming".to_string()];
        config.scheduler.autonomous_mode = true;

        let raw = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&raw).unwrap();

        assert_eq!(
            parsed.topics.exploration_pool,
            config.topics.exploration_pool
        );
        assert!(parsed.scheduler.autonomous_mode);
        assert_eq!(parsed.scheduler.base_interval_mins, 45);
    }

    #[test]
    fn blocked_keywords_default_covers_politics() {
        let config = Config::default();
        assert!(
            config
                .topics
                .blocked_keywords
                .iter()
                .any(|k| k == "politics")
        );
    }
}
