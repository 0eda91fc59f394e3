use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct BoardConfig {
    pub api_port: u16,
    pub paths: BoardPaths,
    pub listing: ListingConfig,
    pub session: SessionConfig,
}

impl BoardConfig {
    pub fn from_env() -> Result<Self> {
        let paths = match env::var("MINIREDDIT_HOME") {
            Ok(raw) if !raw.trim().is_empty() => BoardPaths::from_base_dir(raw.trim())?,
            _ => BoardPaths::discover()?,
        };
        let api_port = env::var("MINIREDDIT_API_PORT")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(9000);
        Ok(Self {
            api_port,
            paths,
            listing: ListingConfig::from_env(),
            session: SessionConfig::from_env(),
        })
    }

    pub fn new(api_port: u16, paths: BoardPaths) -> Self {
        Self {
            api_port,
            paths,
            listing: ListingConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ListingConfig {
    pub page_size: usize,
    pub search_page_size: usize,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            page_size: 20,
            search_page_size: 50,
        }
    }
}

impl ListingConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let page_size = env::var("MINIREDDIT_PAGE_SIZE")
            .ok()
            .and_then(|raw| raw.parse::<usize>().ok())
            .filter(|size| *size > 0)
            .unwrap_or(defaults.page_size);
        let search_page_size = env::var("MINIREDDIT_SEARCH_PAGE_SIZE")
            .ok()
            .and_then(|raw| raw.parse::<usize>().ok())
            .filter(|size| *size > 0)
            .unwrap_or(defaults.search_page_size);
        Self {
            page_size,
            search_page_size,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub cookie_name: String,
    pub ttl_hours: i64,
    pub secure_cookie: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "minireddit_session".into(),
            ttl_hours: 24 * 7,
            secure_cookie: false,
        }
    }
}

impl SessionConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let ttl_hours = env::var("MINIREDDIT_SESSION_TTL_HOURS")
            .ok()
            .and_then(|raw| raw.parse::<i64>().ok())
            .filter(|hours| *hours > 0)
            .unwrap_or(defaults.ttl_hours);
        // Plain HTTP by default; set to 1/true behind TLS
        let secure_cookie = env::var("MINIREDDIT_COOKIE_SECURE")
            .ok()
            .map(|v| v == "1" || v.to_lowercase() == "true")
            .unwrap_or(false);
        Self {
            cookie_name: defaults.cookie_name,
            ttl_hours,
            secure_cookie,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct BoardPaths {
    pub base: PathBuf,
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
}

impl BoardPaths {
    pub fn discover() -> Result<Self> {
        let exe_path = std::env::current_exe()
            .map_err(|err| anyhow!("failed to resolve current executable: {err}"))?;
        let base = exe_path
            .parent()
            .ok_or_else(|| anyhow!("executable path missing parent"))?
            .to_path_buf();
        Self::from_base_dir(base)
    }

    pub fn from_base_dir<P: AsRef<Path>>(base: P) -> Result<Self> {
        let base = base.as_ref().to_path_buf();
        let data_dir = base.join("data");
        let db_path = data_dir.join("minireddit.db");

        Ok(Self {
            base,
            data_dir,
            db_path,
        })
    }
}
