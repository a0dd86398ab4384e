use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::admin::AdminList;

const DEFAULT_STATS_FILE: &str = "bot_stats.json";
const DEFAULT_DOWNLOAD_DIR: &str = "downloads";
const DEFAULT_INSTALOADER_BIN: &str = "instaloader";
const DEFAULT_BROADCAST_DELAY_MS: u64 = 300;

pub struct Config {
    pub token: String,
    pub admins: AdminList,
    pub stats_file: PathBuf,
    pub download_dir: PathBuf,
    pub instaloader_bin: PathBuf,
    pub broadcast_delay: Duration,
}

impl Config {
    pub fn from_env() -> Result<Config> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Config> {
        let token = match lookup("BOT_TOKEN").or_else(|| lookup("TELOXIDE_TOKEN")) {
            Some(token) if !token.trim().is_empty() => token.trim().to_string(),
            _ => bail!("BOT_TOKEN must be set"),
        };

        let admins = AdminList::parse(&lookup("ADMINS").unwrap_or_default());

        let broadcast_delay = match lookup("BROADCAST_DELAY_MS") {
            Some(raw) => Duration::from_millis(
                raw.trim()
                    .parse()
                    .with_context(|| format!("BROADCAST_DELAY_MS is not a number: {:?}", raw))?,
            ),
            None => Duration::from_millis(DEFAULT_BROADCAST_DELAY_MS),
        };

        Ok(Config {
            token,
            admins,
            stats_file: lookup("STATS_FILE")
                .unwrap_or_else(|| DEFAULT_STATS_FILE.to_string())
                .into(),
            download_dir: lookup("DOWNLOAD_DIR")
                .unwrap_or_else(|| DEFAULT_DOWNLOAD_DIR.to_string())
                .into(),
            instaloader_bin: lookup("INSTALOADER_BIN")
                .unwrap_or_else(|| DEFAULT_INSTALOADER_BIN.to_string())
                .into(),
            broadcast_delay,
        })
    }
}
