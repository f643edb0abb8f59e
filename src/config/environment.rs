use std::env;

use crate::services::sync::retry::PollPolicy;

/// Environment configuration
/// Loads and validates environment variables
pub struct Config {
    pub portal_base_url: String,
    pub mirror_path: String,
    pub poll_interval_secs: u64,
    pub refresh_lead_secs: u64,
    pub fetch_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        dotenvy::dotenv().ok();

        let portal_base_url =
            env::var("PORTAL_BASE_URL").map_err(|_| "PORTAL_BASE_URL must be set".to_string())?;

        let mirror_path =
            env::var("MIRROR_PATH").unwrap_or_else(|_| "telecare-mirror.json".to_string());

        let poll_interval_secs = parse_secs("POLL_INTERVAL_SECS", 15)?;
        let refresh_lead_secs = parse_secs("REFRESH_LEAD_SECS", 300)?;
        let fetch_timeout_secs = parse_secs("FETCH_TIMEOUT_SECS", 10)?;

        Ok(Self {
            portal_base_url,
            mirror_path,
            poll_interval_secs,
            refresh_lead_secs,
            fetch_timeout_secs,
        })
    }

    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy {
            interval_secs: self.poll_interval_secs,
            refresh_lead_secs: self.refresh_lead_secs,
            fetch_timeout_secs: self.fetch_timeout_secs,
            ..PollPolicy::default()
        }
    }
}

fn parse_secs(name: &str, default: u64) -> Result<u64, String> {
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| format!("{name} must be a number of seconds")),
        Err(_) => Ok(default),
    }
}
