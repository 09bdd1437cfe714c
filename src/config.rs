use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DbConfig,
    pub api: ApiConfig,
    /// When present, discovery is set up against this broker at boot.
    #[serde(default)]
    pub mqtt: Option<MqttConfig>,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub alerts: Option<AlertsConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbConfig {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_host")]
    pub host: String,
    #[serde(default = "default_api_port")]
    pub port: u16,
}

fn default_api_host() -> String {
    "0.0.0.0".into()
}

fn default_api_port() -> u16 {
    8080
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub topic_filter: String,
    pub keep_alive_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_current_ttl_secs")]
    pub current_ttl_secs: u64,
}

fn default_current_ttl_secs() -> u64 {
    60
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            current_ttl_secs: default_current_ttl_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertsConfig {
    #[serde(default = "default_alerts_enabled")]
    pub enabled: bool,
    #[serde(default = "default_sweep_interval_minutes")]
    pub interval_minutes: u64,
    #[serde(default = "default_inactive_limit_minutes")]
    pub default_inactive_limit_minutes: i64,
    #[serde(default = "default_low_battery_threshold")]
    pub low_battery_threshold: f64,
    #[serde(default)]
    pub recipients: Vec<String>,
    pub smtp: SmtpConfig,
}

fn default_alerts_enabled() -> bool {
    true
}

fn default_sweep_interval_minutes() -> u64 {
    20
}

fn default_inactive_limit_minutes() -> i64 {
    120
}

fn default_low_battery_threshold() -> f64 {
    15.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    #[serde(default = "default_smtp_port")]
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from: String,
}

fn default_smtp_port() -> u16 {
    587
}

impl Config {
    /// Load YAML from disk, substitute $(VAR)/${VAR} with env vars, then parse.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, anyhow::Error> {
        let raw = std::fs::read_to_string(path)?;
        let expanded = expand_env_placeholders(&raw)?;
        let mut cfg: Self = serde_yaml::from_str(&expanded)?;

        // Optional: allow DATABASE_URL env to override whatever YAML had
        if let Ok(url) = std::env::var("DATABASE_URL") {
            cfg.database.url = url;
        }

        if let Some(alerts) = &cfg.alerts {
            if alerts.enabled {
                anyhow::ensure!(
                    !alerts.recipients.is_empty(),
                    "alerts are enabled but no recipients are configured"
                );
                anyhow::ensure!(
                    alerts.recipients.iter().all(|r| r.contains('@')),
                    "alert recipient list contains an invalid address"
                );
                anyhow::ensure!(
                    alerts.interval_minutes >= 1,
                    "alert sweep interval must be at least one minute"
                );
                anyhow::ensure!(
                    alerts.default_inactive_limit_minutes >= 1,
                    "default inactive limit must be at least one minute"
                );
            }
        }

        Ok(cfg)
    }
}

/// Expand $(VAR) and ${VAR} placeholders using environment variables.
/// "$$" is an escape for a literal "$".
fn expand_env_placeholders(input: &str) -> Result<String, anyhow::Error> {
    use anyhow::Context;

    let mut out = String::with_capacity(input.len());
    let mut it = input.chars().peekable();

    while let Some(c) = it.next() {
        if c != '$' {
            out.push(c);
            continue;
        }
        let close = match it.peek().copied() {
            Some('$') => {
                it.next();
                out.push('$');
                continue;
            }
            Some('(') => ')',
            Some('{') => '}',
            _ => {
                out.push('$');
                continue;
            }
        };
        it.next(); // consume the opening delimiter
        let var = read_until(&mut it, close)
            .with_context(|| format!("unterminated env placeholder: missing '{}'", close))?;
        let val = std::env::var(&var)
            .with_context(|| format!("missing environment variable: {}", var))?;
        out.push_str(&val);
    }

    Ok(out)
}

/// Read characters until `end`, consuming the delimiter.
fn read_until<I>(it: &mut std::iter::Peekable<I>, end: char) -> Option<String>
where
    I: Iterator<Item = char>,
{
    let mut buf = String::new();
    for ch in it.by_ref() {
        if ch == end {
            return Some(buf);
        }
        buf.push(ch);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn expands_both_placeholder_styles() {
        std::env::set_var("SENSOR_HUB_TEST_VAR", "value");
        let out = expand_env_placeholders("a $(SENSOR_HUB_TEST_VAR) b ${SENSOR_HUB_TEST_VAR} c")
            .unwrap();
        assert_eq!(out, "a value b value c");
    }

    #[test]
    fn dollar_escape_and_plain_dollar() {
        let out = expand_env_placeholders("cost $$5, path $.time").unwrap();
        assert_eq!(out, "cost $5, path $.time");
    }

    #[test]
    fn missing_variable_is_an_error() {
        assert!(expand_env_placeholders("$(SENSOR_HUB_DOES_NOT_EXIST)").is_err());
    }
}
