//! Environment-sourced configuration (see spec §6).
//!
//! Every key is read from the process environment; there is no config file.
//! `RelayConfig::load` is the only fallible entry point — a missing required
//! key surfaces as `RelayError::ConfigMissing`, which is fatal at startup.

use figment::{providers::Env, Figment};
use serde::{Deserialize, Serialize};

use crate::error::{RelayError, Result};

fn default_db_dir() -> String {
    "databases".to_string()
}
fn default_sessions_dir() -> String {
    "sessions".to_string()
}
fn default_trial_days() -> i64 {
    7
}
fn default_tick_secs() -> u64 {
    15
}
fn default_zero_u32() -> u32 {
    0
}

/// Top-level daemon configuration, assembled from environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Bot API credential (required).
    pub bot_token: String,
    /// Upstream reader app credentials (required).
    pub api_id: i32,
    pub api_hash: String,
    /// Admin user ids, comma-separated in the environment.
    #[serde(default)]
    pub admin_ids: Vec<i64>,

    #[serde(default = "default_db_dir")]
    pub db_dir: String,
    #[serde(default = "default_sessions_dir")]
    pub sessions_dir: String,
    #[serde(default = "default_trial_days")]
    pub trial_days: i64,

    #[serde(default = "default_tick_secs")]
    pub post_check_interval: u64,
    #[serde(default = "default_tick_secs")]
    pub periodic_check_interval: u64,
    #[serde(default = "default_tick_secs")]
    pub donor_check_interval: u64,
    #[serde(default = "default_tick_secs")]
    pub random_post_check_interval: u64,

    /// 0 disables the spacing cap.
    #[serde(default = "default_zero_u32")]
    pub min_seconds_between_posts_per_channel: u32,
    /// 0 disables the daily cap.
    #[serde(default = "default_zero_u32")]
    pub max_posts_per_channel_per_day: u32,
}

/// Raw shape as it appears on the wire (env vars are all strings), before
/// `ADMIN_IDS` and friends are parsed into their final types.
#[derive(Debug, Clone, Deserialize)]
struct RawConfig {
    bot_token: Option<String>,
    api_id: Option<i32>,
    api_hash: Option<String>,
    #[serde(default)]
    admin_ids: Option<String>,
    #[serde(default = "default_db_dir")]
    db_dir: String,
    #[serde(default = "default_sessions_dir")]
    sessions_dir: String,
    #[serde(default = "default_trial_days")]
    trial_days: i64,
    #[serde(default = "default_tick_secs")]
    post_check_interval: u64,
    #[serde(default = "default_tick_secs")]
    periodic_check_interval: u64,
    #[serde(default = "default_tick_secs")]
    donor_check_interval: u64,
    #[serde(default = "default_tick_secs")]
    random_post_check_interval: u64,
    #[serde(default = "default_zero_u32")]
    min_seconds_between_posts_per_channel: u32,
    #[serde(default = "default_zero_u32")]
    max_posts_per_channel_per_day: u32,
}

impl RelayConfig {
    /// Load configuration from the process environment.
    ///
    /// `BOT_TOKEN`, `API_ID`, `API_HASH`, and `ADMIN_IDS` are required; every
    /// other key has the default listed in spec §6.
    pub fn load() -> Result<Self> {
        let raw: RawConfig = Figment::new()
            .merge(Env::raw())
            .extract()
            .map_err(|e| RelayError::ConfigMissing(e.to_string()))?;

        let bot_token = raw
            .bot_token
            .ok_or_else(|| RelayError::ConfigMissing("BOT_TOKEN".to_string()))?;
        let api_id = raw
            .api_id
            .ok_or_else(|| RelayError::ConfigMissing("API_ID".to_string()))?;
        let api_hash = raw
            .api_hash
            .ok_or_else(|| RelayError::ConfigMissing("API_HASH".to_string()))?;
        let admin_ids_raw = raw
            .admin_ids
            .ok_or_else(|| RelayError::ConfigMissing("ADMIN_IDS".to_string()))?;
        let admin_ids = parse_csv_i64(&admin_ids_raw)?;

        Ok(Self {
            bot_token,
            api_id,
            api_hash,
            admin_ids,
            db_dir: raw.db_dir,
            sessions_dir: raw.sessions_dir,
            trial_days: raw.trial_days,
            post_check_interval: raw.post_check_interval,
            periodic_check_interval: raw.periodic_check_interval,
            donor_check_interval: raw.donor_check_interval,
            random_post_check_interval: raw.random_post_check_interval,
            min_seconds_between_posts_per_channel: raw.min_seconds_between_posts_per_channel,
            max_posts_per_channel_per_day: raw.max_posts_per_channel_per_day,
        })
    }
}

fn parse_csv_i64(raw: &str) -> Result<Vec<i64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .map_err(|_| RelayError::ConfigMissing(format!("ADMIN_IDS: not an int: {s}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_csv_ids() {
        assert_eq!(parse_csv_i64("1, 2,3").unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn rejects_non_numeric_id() {
        assert!(parse_csv_i64("1,x").is_err());
    }
}
