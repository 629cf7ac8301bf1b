use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{errors::Error, Result};

/// Typed configuration for the bot.
///
/// Threshold defaults mirror the original deployment: archive after 7 days of
/// inactivity, delete 30 days after archiving, 24h bump cooldown, hourly sweep.
#[derive(Clone, Debug)]
pub struct Config {
    // Core
    pub bot_token: String,
    pub forum_channel_id: u64,
    pub create_channel_id: u64,
    pub staff_log_channel_id: Option<u64>,

    // Lifecycle thresholds
    pub archive_after: Duration,
    pub delete_after: Duration,
    pub bump_cooldown: Duration,
    pub sweep_interval: Duration,

    // Storage
    pub db_path: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let bot_token = env_str("DISCORD_BOT_TOKEN").unwrap_or_default();
        if bot_token.trim().is_empty() {
            return Err(Error::Config(
                "DISCORD_BOT_TOKEN environment variable is required".to_string(),
            ));
        }

        let forum_channel_id = env_u64("FORUM_CHANNEL_ID").ok_or_else(|| {
            Error::Config("FORUM_CHANNEL_ID environment variable is required".to_string())
        })?;
        let create_channel_id = env_u64("CREATE_CHANNEL_ID").ok_or_else(|| {
            Error::Config("CREATE_CHANNEL_ID environment variable is required".to_string())
        })?;
        let staff_log_channel_id = env_u64("STAFF_LOG_CHANNEL_ID");

        let archive_after_days = env_u64("ARCHIVE_AFTER_DAYS").unwrap_or(7);
        let delete_after_days = env_u64("DELETE_AFTER_DAYS").unwrap_or(30);
        let bump_cooldown_hours = env_u64("BUMP_COOLDOWN_HOURS").unwrap_or(24);
        let sweep_interval_secs = env_u64("SWEEP_INTERVAL_SECS").unwrap_or(3600);

        let db_path =
            PathBuf::from(env_str("DB_PATH").unwrap_or_else(|| "data.sqlite".to_string()));

        Ok(Self {
            bot_token,
            forum_channel_id,
            create_channel_id,
            staff_log_channel_id,
            archive_after: Duration::from_secs(archive_after_days * 24 * 3600),
            delete_after: Duration::from_secs(delete_after_days * 24 * 3600),
            bump_cooldown: Duration::from_secs(bump_cooldown_hours * 3600),
            sweep_interval: Duration::from_secs(sweep_interval_secs.max(1)),
            db_path,
        })
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.trim().is_empty())
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        env::set_var(key, val);
    }
}
