// src/config/mod.rs
//! Immutable application configuration, built once at start-up.
//!
//! Sources, later wins:
//! 1) TOML file: `$DEALS_CONFIG_PATH`, else `config/deals.toml` if present
//! 2) environment variables (`.env` is loaded by the binaries)

use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::dedup::DedupStrategy;
use crate::notify::telegram::DEFAULT_API_BASE;

pub const ENV_CONFIG_PATH: &str = "DEALS_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/deals.toml";

const DEFAULT_STATE_PATH: &str = "state/dedup.json";
const DEFAULT_STATE_KEY: &str = "primezone";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
    pub api_base: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub path: PathBuf,
    pub key: String,
    pub strategy: DedupStrategy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub site_url: String,
    pub auth_token: Option<String>,
    pub listing_pages: u32,
    /// `None` only in dry-run mode.
    pub telegram: Option<TelegramConfig>,
    pub store: StoreConfig,
    pub run_interval_secs: u64,
    pub http_timeout_secs: u64,
    pub dry_run: bool,
}

impl AppConfig {
    /// File (if any) overlaid with the process environment.
    pub fn load() -> Result<Self> {
        let file = match std::env::var(ENV_CONFIG_PATH) {
            Ok(p) => {
                let pb = PathBuf::from(p);
                if !pb.exists() {
                    bail!("{ENV_CONFIG_PATH} points to non-existent path {}", pb.display());
                }
                FileConfig::from_path(&pb)?
            }
            Err(_) => {
                let p = Path::new(DEFAULT_CONFIG_PATH);
                if p.exists() {
                    FileConfig::from_path(p)?
                } else {
                    FileConfig::default()
                }
            }
        };
        Self::resolve(file, |k| std::env::var(k).ok())
    }

    /// Merge `file` with values from `env` (env wins) and validate.
    pub fn resolve<F>(file: FileConfig, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |k: &str| env(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let tg = file.telegram.unwrap_or_default();
        let st = file.store.unwrap_or_default();

        let site_url = env("SITE_URL")
            .or(file.site_url)
            .ok_or_else(|| anyhow!("SITE_URL is required"))?;
        if !(site_url.starts_with("http://") || site_url.starts_with("https://")) {
            bail!("SITE_URL must be an http(s) URL, got `{site_url}`");
        }

        let dry_run = match env("DRY_RUN") {
            Some(v) => parse_bool(&v).context("parsing DRY_RUN")?,
            None => file.dry_run.unwrap_or(false),
        };

        let bot_token = env("TELEGRAM_BOT_TOKEN").or(tg.bot_token);
        let chat_id = env("TELEGRAM_CHAT_ID").or(tg.chat_id);
        let telegram = match (bot_token, chat_id) {
            (Some(bot_token), Some(chat_id)) => Some(TelegramConfig {
                bot_token,
                chat_id,
                api_base: env("TELEGRAM_API_BASE")
                    .or(tg.api_base)
                    .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            }),
            _ if dry_run => None,
            (None, _) => bail!("TELEGRAM_BOT_TOKEN is required"),
            (_, None) => bail!("TELEGRAM_CHAT_ID is required"),
        };

        let strategy = match env("DEDUP_STRATEGY") {
            Some(v) => v.parse().context("parsing DEDUP_STRATEGY")?,
            None => st.strategy.unwrap_or_default(),
        };

        let listing_pages = parse_num(env("LISTING_PAGES"), file.listing_pages, 1, "LISTING_PAGES")?;
        if listing_pages == 0 {
            bail!("LISTING_PAGES must be >= 1");
        }
        let run_interval_secs =
            parse_num(env("RUN_INTERVAL_SECS"), file.run_interval_secs, 900, "RUN_INTERVAL_SECS")?;
        if run_interval_secs == 0 {
            bail!("RUN_INTERVAL_SECS must be >= 1");
        }
        let http_timeout_secs =
            parse_num(env("HTTP_TIMEOUT_SECS"), file.http_timeout_secs, 15, "HTTP_TIMEOUT_SECS")?;
        if http_timeout_secs == 0 {
            bail!("HTTP_TIMEOUT_SECS must be >= 1");
        }

        Ok(Self {
            site_url,
            auth_token: env("AUTH_TOKEN").or(file.auth_token),
            listing_pages,
            telegram,
            store: StoreConfig {
                path: env("STATE_PATH")
                    .map(PathBuf::from)
                    .or(st.path)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_PATH)),
                key: env("STATE_KEY")
                    .or(st.key)
                    .unwrap_or_else(|| DEFAULT_STATE_KEY.to_string()),
                strategy,
            },
            run_interval_secs,
            http_timeout_secs,
            dry_run,
        })
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

/// Optional TOML layer; every field may be overridden from the environment.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub site_url: Option<String>,
    pub auth_token: Option<String>,
    pub listing_pages: Option<u32>,
    pub run_interval_secs: Option<u64>,
    pub http_timeout_secs: Option<u64>,
    pub dry_run: Option<bool>,
    pub telegram: Option<FileTelegramSection>,
    pub store: Option<FileStoreSection>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileTelegramSection {
    pub bot_token: Option<String>,
    pub chat_id: Option<String>,
    pub api_base: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileStoreSection {
    pub path: Option<PathBuf>,
    pub key: Option<String>,
    pub strategy: Option<DedupStrategy>,
}

impl FileConfig {
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn from_toml(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }
}

fn parse_num<T>(env_val: Option<String>, file_val: Option<T>, default: T, key: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env_val {
        Some(v) => v.parse().with_context(|| format!("parsing {key}=`{v}`")),
        None => Ok(file_val.unwrap_or(default)),
    }
}

fn parse_bool(v: &str) -> Result<bool> {
    match v.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("expected a boolean, got `{other}`"),
    }
}
