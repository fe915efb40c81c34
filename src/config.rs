//! Settings loaded from `config.yaml` with environment overrides for secrets.
//!
//! The YAML file describes which sources run, size limits, prompt location,
//! output directories, and an ordered list of fallback model providers. The
//! environment supplies credentials: `MODELSCOPE_*` for the primary provider,
//! `FALLBACK_*` for an optional second one, and `SYFT_*` for the curated feed.
//!
//! A missing config file is not an error; every field has a default.

use serde::Deserialize;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::summarizer::ProviderCandidate;

pub const DEFAULT_BASE_URL: &str = "https://api-inference.modelscope.cn/v1";
pub const DEFAULT_MODEL: &str = "ZhipuAI/GLM-4.7";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("invalid value for {key}: {value}")]
    Env { key: String, value: String },
}

/// YAML layout after the `sources` mapping has been flattened.
#[derive(Debug, Default)]
struct FileConfig {
    sources: Vec<SourceToggle>,
    limits: LimitsSection,
    summarize: SummarizeSection,
    output: OutputSection,
}

#[derive(Debug)]
struct SourceToggle {
    name: String,
    enabled: bool,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct LimitsSection {
    max_articles: usize,
}

impl Default for LimitsSection {
    fn default() -> Self {
        Self { max_articles: 14 }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct SummarizeSection {
    prompt_path: String,
    max_output: u32,
    offline_on_failure: bool,
    compress: CompressSection,
    providers: Vec<ProviderEntry>,
}

impl Default for SummarizeSection {
    fn default() -> Self {
        Self {
            prompt_path: "prompts/daily.md".to_string(),
            max_output: 2000,
            offline_on_failure: false,
            compress: CompressSection::default(),
            providers: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct CompressSection {
    title_max: usize,
    desc_max: usize,
}

impl Default for CompressSection {
    fn default() -> Self {
        Self {
            title_max: 150,
            desc_max: 300,
        }
    }
}

/// One provider entry under `summarize.providers`.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ProviderEntry {
    name: String,
    base_url: String,
    api_key: String,
    /// Name of an environment variable holding the key, so secrets can stay
    /// out of the YAML file.
    api_key_env: String,
    model: String,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
struct OutputSection {
    json_dir: String,
    md_dir: String,
}

impl Default for OutputSection {
    fn default() -> Self {
        Self {
            json_dir: "data".to_string(),
            md_dir: "content".to_string(),
        }
    }
}

/// Validated settings consumed by the pipeline.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Source name to enabled flag, in file order.
    pub sources: Vec<(String, bool)>,
    pub max_articles: usize,
    pub title_max: usize,
    pub desc_max: usize,
    pub prompt_path: String,
    pub max_output: u32,
    /// Whether `auto` mode also downgrades to offline when every provider fails.
    pub offline_on_failure: bool,
    pub json_dir: String,
    pub md_dir: String,
    pub syft_web_app_url: String,
    pub syft_secret_key: String,
    /// Ordered provider candidates: primary first, fallbacks after.
    pub providers: Vec<ProviderCandidate>,
}

impl Settings {
    /// Load settings from `path` and the process environment.
    #[instrument(level = "info", skip_all, fields(%path))]
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let yaml = if Path::new(path).exists() {
            let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.to_string(),
                source,
            })?;
            info!("Loaded configuration file");
            Some(text)
        } else {
            warn!("Config file not found; using defaults");
            None
        };
        Self::from_sources(yaml.as_deref(), path, |key| std::env::var(key).ok())
    }

    /// Build settings from optional YAML text and an environment lookup.
    pub fn from_sources<F>(yaml: Option<&str>, path: &str, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file = match yaml {
            Some(text) if !text.trim().is_empty() => {
                let raw: RawFileConfig =
                    serde_yaml::from_str(text).map_err(|source| ConfigError::Yaml {
                        path: path.to_string(),
                        source,
                    })?;
                raw.into_file_config()
            }
            _ => FileConfig::default(),
        };
        Self::resolve(file, env)
    }

    fn resolve<F>(file: FileConfig, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env_or = |key: &str, default: &str| -> String {
            env(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let max_output = match env("MODELSCOPE_MAX_OUTPUT").filter(|v| !v.trim().is_empty()) {
            Some(value) => value.trim().parse().map_err(|_| ConfigError::Env {
                key: "MODELSCOPE_MAX_OUTPUT".to_string(),
                value,
            })?,
            None => file.summarize.max_output,
        };

        let mut providers = Vec::new();
        providers.push(ProviderCandidate {
            name: "modelscope".to_string(),
            base_url: env_or("MODELSCOPE_BASE_URL", DEFAULT_BASE_URL),
            api_key: env_or("MODELSCOPE_API_KEY", ""),
            model: env_or("MODELSCOPE_MODEL", DEFAULT_MODEL),
        });
        providers.push(ProviderCandidate {
            name: "fallback".to_string(),
            base_url: env_or("FALLBACK_BASE_URL", DEFAULT_BASE_URL),
            api_key: env_or("FALLBACK_API_KEY", ""),
            model: env_or("FALLBACK_MODEL", DEFAULT_MODEL),
        });
        for (i, entry) in file.summarize.providers.into_iter().enumerate() {
            let api_key = if entry.api_key.trim().is_empty() && !entry.api_key_env.is_empty() {
                env_or(&entry.api_key_env, "")
            } else {
                entry.api_key
            };
            providers.push(ProviderCandidate {
                name: if entry.name.is_empty() {
                    format!("provider-{}", i + 1)
                } else {
                    entry.name
                },
                base_url: if entry.base_url.is_empty() {
                    DEFAULT_BASE_URL.to_string()
                } else {
                    entry.base_url
                },
                api_key,
                model: if entry.model.is_empty() {
                    DEFAULT_MODEL.to_string()
                } else {
                    entry.model
                },
            });
        }
        providers.retain(|p| !p.api_key.trim().is_empty());
        debug!(
            providers = ?providers.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(),
            "Resolved provider candidates"
        );

        Ok(Self {
            sources: file
                .sources
                .into_iter()
                .map(|toggle| (toggle.name, toggle.enabled))
                .collect(),
            max_articles: file.limits.max_articles.max(1),
            title_max: file.summarize.compress.title_max,
            desc_max: file.summarize.compress.desc_max,
            prompt_path: file.summarize.prompt_path,
            max_output,
            offline_on_failure: file.summarize.offline_on_failure,
            json_dir: file.output.json_dir,
            md_dir: file.output.md_dir,
            syft_web_app_url: env_or("SYFT_WEB_APP_URL", ""),
            syft_secret_key: env_or("SYFT_SECRET_KEY", ""),
            providers,
        })
    }

    pub fn is_source_enabled(&self, name: &str) -> bool {
        self.sources
            .iter()
            .any(|(source, enabled)| source == name && *enabled)
    }
}

/// Intermediate form where `sources` is still a raw YAML mapping.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawFileConfig {
    sources: serde_yaml::Mapping,
    limits: LimitsSection,
    summarize: SummarizeSection,
    output: OutputSection,
}

impl RawFileConfig {
    fn into_file_config(self) -> FileConfig {
        let sources = self
            .sources
            .into_iter()
            .filter_map(|(k, v)| {
                Some(SourceToggle {
                    name: k.as_str()?.to_string(),
                    enabled: v.as_bool().unwrap_or(false),
                })
            })
            .collect();
        FileConfig {
            sources,
            limits: self.limits,
            summarize: self.summarize,
            output: self.output,
        }
    }
}
