use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::Config;
use crate::extract::Strategy;

/// On-disk TOML configuration structure.
/// All fields are optional so partial configs work (merge with defaults).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    pub fetch: Option<FetchConfig>,
    pub oracle: Option<OracleConfig>,
    pub extraction: Option<ExtractionConfig>,
    pub concurrency: Option<ConcurrencyConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FetchConfig {
    pub article_url_format: Option<String>,
    pub user_agent: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OracleConfig {
    pub url: Option<String>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionConfig {
    pub strategy: Option<Strategy>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConcurrencyConfig {
    pub max_concurrent_normalizations: Option<usize>,
}

/// Platform config directory path: `<config_dir>/pmcparse/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("pmcparse").join("config.toml"))
}

/// Load config by cascading CWD `.pmcparse.toml` over platform config.
/// CWD values override platform values.
pub fn load_config() -> ConfigFile {
    let platform = config_path().and_then(|p| load_from_path(&p));
    let cwd = load_from_path(Path::new(".pmcparse.toml"));

    match (platform, cwd) {
        (None, None) => ConfigFile::default(),
        (Some(p), None) => p,
        (None, Some(c)) => c,
        (Some(p), Some(c)) => merge(p, c),
    }
}

/// Load a config from a specific path. Returns `None` if the file doesn't
/// exist or can't be parsed.
pub fn load_from_path(path: &Path) -> Option<ConfigFile> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring unparsable config file");
            None
        }
    }
}

/// Merge two configs: `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    ConfigFile {
        fetch: Some(FetchConfig {
            article_url_format: overlay
                .fetch
                .as_ref()
                .and_then(|f| f.article_url_format.clone())
                .or_else(|| {
                    base.fetch
                        .as_ref()
                        .and_then(|f| f.article_url_format.clone())
                }),
            user_agent: overlay
                .fetch
                .as_ref()
                .and_then(|f| f.user_agent.clone())
                .or_else(|| base.fetch.as_ref().and_then(|f| f.user_agent.clone())),
            timeout_secs: overlay
                .fetch
                .as_ref()
                .and_then(|f| f.timeout_secs)
                .or_else(|| base.fetch.as_ref().and_then(|f| f.timeout_secs)),
        }),
        oracle: Some(OracleConfig {
            url: overlay
                .oracle
                .as_ref()
                .and_then(|o| o.url.clone())
                .or_else(|| base.oracle.as_ref().and_then(|o| o.url.clone())),
            timeout_secs: overlay
                .oracle
                .as_ref()
                .and_then(|o| o.timeout_secs)
                .or_else(|| base.oracle.as_ref().and_then(|o| o.timeout_secs)),
        }),
        extraction: Some(ExtractionConfig {
            strategy: overlay
                .extraction
                .as_ref()
                .and_then(|e| e.strategy)
                .or_else(|| base.extraction.as_ref().and_then(|e| e.strategy)),
        }),
        concurrency: Some(ConcurrencyConfig {
            max_concurrent_normalizations: overlay
                .concurrency
                .as_ref()
                .and_then(|c| c.max_concurrent_normalizations)
                .or_else(|| {
                    base.concurrency
                        .as_ref()
                        .and_then(|c| c.max_concurrent_normalizations)
                }),
        }),
    }
}

/// Copy every value the file sets onto `config`.
pub fn apply_to(file: &ConfigFile, config: &mut Config) {
    if let Some(fetch) = &file.fetch {
        if let Some(format) = &fetch.article_url_format {
            config.article_url_format = format.clone();
        }
        if let Some(agent) = &fetch.user_agent {
            config.user_agent = agent.clone();
        }
        if let Some(secs) = fetch.timeout_secs {
            config.fetch_timeout_secs = secs;
        }
    }
    if let Some(oracle) = &file.oracle {
        if let Some(url) = &oracle.url {
            config.oracle_url = Some(url.clone());
        }
        if let Some(secs) = oracle.timeout_secs {
            config.oracle_timeout_secs = secs;
        }
    }
    if let Some(strategy) = file.extraction.as_ref().and_then(|e| e.strategy) {
        config.strategy = strategy;
    }
    if let Some(n) = file
        .concurrency
        .as_ref()
        .and_then(|c| c.max_concurrent_normalizations)
    {
        config.max_concurrent_normalizations = n;
    }
}
