//! Slideshow configuration.
//!
//! Resolved once at startup from an optional TOML file layered under
//! `SLIDESHOW_*` environment variables, then validated.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

pub const DEFAULT_API_URL: &str = "https://photorankapi-a.akamaihd.net";
const ENV_PREFIX: &str = "SLIDESHOW";

/// Title and body shown by the intro or outro section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectionContent {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: Option<String>,
}

/// What to do when a single uploader lookup fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrichPolicy {
    /// Substitute a placeholder uploader and keep going.
    #[default]
    BestEffort,
    /// Fail the whole page on the first failed lookup.
    FailFast,
}

/// Immutable slideshow configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlideshowConfig {
    #[serde(default)]
    pub auth_token: String,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_items_per_page")]
    pub items_per_page: usize,
    #[serde(default = "default_number_of_pages")]
    pub number_of_pages: usize,
    /// Stagger between consecutive items of a page.
    #[serde(default = "default_sequence_interval_ms")]
    pub sequence_interval_ms: u64,
    /// How long a fully revealed page stays on screen.
    #[serde(default = "default_page_persistence_ms")]
    pub page_persistence_ms: u64,
    #[serde(default = "default_section_length_ms")]
    pub intro_length_ms: u64,
    #[serde(default = "default_section_length_ms")]
    pub outro_length_ms: u64,
    #[serde(default)]
    pub intro: SectionContent,
    #[serde(default)]
    pub outro: SectionContent,
    /// Upper bound for fetching and enriching one page.
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,
    #[serde(default)]
    pub enrich_policy: EnrichPolicy,
    /// Where to write the rendered document after each visual change.
    #[serde(default)]
    pub output_path: Option<PathBuf>,
    /// Directory with `gallery.html`, `page.html`, `intro.html`, `outro.html`.
    #[serde(default)]
    pub template_dir: Option<PathBuf>,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_items_per_page() -> usize {
    6
}

fn default_number_of_pages() -> usize {
    3
}

fn default_sequence_interval_ms() -> u64 {
    250
}

fn default_page_persistence_ms() -> u64 {
    5_000
}

fn default_section_length_ms() -> u64 {
    3_000
}

fn default_fetch_timeout_ms() -> u64 {
    15_000
}

impl SlideshowConfig {
    /// Create a configuration with defaults for everything but the token.
    pub fn new(auth_token: impl Into<String>) -> Self {
        Self {
            auth_token: auth_token.into(),
            api_url: default_api_url(),
            items_per_page: default_items_per_page(),
            number_of_pages: default_number_of_pages(),
            sequence_interval_ms: default_sequence_interval_ms(),
            page_persistence_ms: default_page_persistence_ms(),
            intro_length_ms: default_section_length_ms(),
            outro_length_ms: default_section_length_ms(),
            intro: SectionContent::default(),
            outro: SectionContent::default(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
            enrich_policy: EnrichPolicy::default(),
            output_path: None,
            template_dir: None,
        }
    }

    /// Load from an optional TOML file plus `SLIDESHOW_*` environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| Error::config(e.to_string()))?;

        Self::from_settings(settings)
    }

    /// Parse a TOML document without consulting the environment.
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()
            .map_err(|e| Error::config(e.to_string()))?;

        Self::from_settings(settings)
    }

    fn from_settings(settings: config::Config) -> Result<Self> {
        let cfg: Self = settings
            .try_deserialize()
            .map_err(|e| Error::config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check the invariants every other component relies on.
    pub fn validate(&self) -> Result<()> {
        if self.auth_token.trim().is_empty() {
            return Err(Error::config("Photorank authentication token not provided"));
        }
        if self.items_per_page == 0 {
            return Err(Error::config("items_per_page must be at least 1"));
        }
        if self.number_of_pages == 0 {
            return Err(Error::config("number_of_pages must be at least 1"));
        }
        let url = Url::parse(&self.api_url)
            .map_err(|e| Error::config(format!("invalid api_url {:?}: {}", self.api_url, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::config(format!(
                "api_url must be http or https, got {}",
                url.scheme()
            )));
        }
        Ok(())
    }

    pub fn sequence_interval(&self) -> Duration {
        Duration::from_millis(self.sequence_interval_ms)
    }

    pub fn page_persistence(&self) -> Duration {
        Duration::from_millis(self.page_persistence_ms)
    }

    pub fn intro_length(&self) -> Duration {
        Duration::from_millis(self.intro_length_ms)
    }

    pub fn outro_length(&self) -> Duration {
        Duration::from_millis(self.outro_length_ms)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }
}
