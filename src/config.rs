//! Runtime configuration
//!
//! Values come from `INYEAR_*` environment variables; the CLI overrides them
//! with flags.

use crate::error::HealthError;
use crate::slots::ResponsePolicy;
use crate::source::Platform;
use chrono::{FixedOffset, Local, Offset, Utc};

pub const ENV_TIMEZONE: &str = "INYEAR_TIMEZONE";
pub const ENV_RESPONSE_POLICY: &str = "INYEAR_RESPONSE_POLICY";
pub const ENV_PLATFORM: &str = "INYEAR_PLATFORM";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Offset used to resolve local calendar days
    pub timezone: FixedOffset,
    pub response_policy: ResponsePolicy,
    pub platform: Platform,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timezone: Utc.fix(),
            response_policy: ResponsePolicy::default(),
            platform: Platform::Ios,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, HealthError> {
        Self::from_env_with(|k| std::env::var(k).ok())
    }

    /// Read configuration through `get`, so tests need not touch the process environment
    pub fn from_env_with<F>(mut get: F) -> Result<Self, HealthError>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(tz) = get(ENV_TIMEZONE) {
            config.timezone = parse_timezone(&tz)?;
        }
        if let Some(policy) = get(ENV_RESPONSE_POLICY) {
            config.response_policy = policy.parse()?;
        }
        if let Some(platform) = get(ENV_PLATFORM) {
            config.platform = platform.parse()?;
        }
        Ok(config)
    }
}

/// Parse `UTC`, `local`, or a `±HH:MM` / `±HHMM` offset
pub fn parse_timezone(raw: &str) -> Result<FixedOffset, HealthError> {
    let trimmed = raw.trim();
    match trimmed.to_ascii_lowercase().as_str() {
        "utc" | "z" | "gmt" => return Ok(Utc.fix()),
        "local" => return Ok(Local::now().offset().fix()),
        _ => {}
    }

    let invalid = || HealthError::InvalidTimezone(raw.to_string());
    let (sign, rest) = if let Some(rest) = trimmed.strip_prefix('+') {
        (1, rest)
    } else if let Some(rest) = trimmed.strip_prefix('-') {
        (-1, rest)
    } else {
        return Err(invalid());
    };
    let digits: String = rest.chars().filter(|c| *c != ':').collect();
    if digits.len() != 4 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    let hours: i32 = digits[..2].parse().map_err(|_| invalid())?;
    let minutes: i32 = digits[2..].parse().map_err(|_| invalid())?;
    if minutes >= 60 {
        return Err(invalid());
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_env() {
        let config = Config::from_env_with(|_| None).unwrap();
        assert_eq!(config.timezone.local_minus_utc(), 0);
        assert_eq!(config.response_policy, ResponsePolicy::DropSuperseded);
        assert_eq!(config.platform, Platform::Ios);
    }

    #[test]
    fn test_reads_values() {
        let get = |k: &str| match k {
            ENV_TIMEZONE => Some("-05:00".into()),
            ENV_RESPONSE_POLICY => Some("last_arrival_wins".into()),
            ENV_PLATFORM => Some("android".into()),
            _ => None,
        };
        let config = Config::from_env_with(get).unwrap();
        assert_eq!(config.timezone.local_minus_utc(), -5 * 3600);
        assert_eq!(config.response_policy, ResponsePolicy::LastArrivalWins);
        assert_eq!(config.platform, Platform::Android);
    }

    #[test]
    fn test_invalid_timezone() {
        let get = |k: &str| (k == ENV_TIMEZONE).then(|| "Mars/Olympus".to_string());
        assert!(matches!(
            Config::from_env_with(get),
            Err(HealthError::InvalidTimezone(_))
        ));
    }

    #[test]
    fn test_parse_timezone_forms() {
        assert_eq!(parse_timezone("UTC").unwrap().local_minus_utc(), 0);
        assert_eq!(parse_timezone("+0530").unwrap().local_minus_utc(), 5 * 3600 + 1800);
        assert_eq!(parse_timezone("+09:00").unwrap().local_minus_utc(), 9 * 3600);
        assert!(parse_timezone("+25:00").is_err());
        assert!(parse_timezone("+01:75").is_err());
        assert!(parse_timezone("0100").is_err());
    }
}
