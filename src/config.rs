use chrono::{NaiveTime, Weekday};
use chrono_tz::Tz;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::poll::ResetPolicy;
use crate::schedule::{Clock, DailySchedule, DEFAULT_CATCH_UP_DELAY};

const PREFIX: &str = "LUNCH_VOTING_BOT_";

/// Upper bound for the catch-up delay: one day.
const MAX_CATCH_UP_SECONDS: u64 = 86_400;

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// A required variable is not set.
    Missing(&'static str),
    /// A variable is set but cannot be parsed.
    Invalid { key: &'static str, value: String, reason: String },
    /// Validation error.
    Validation(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing(key) => write!(f, "{}{} is required", PREFIX, key),
            Self::Invalid { key, value, reason } => {
                write!(f, "invalid {}{} '{}': {}", PREFIX, key, value, reason)
            }
            Self::Validation(msg) => write!(f, "config validation error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

pub struct Config {
    pub telegram_bot_token: String,
    /// The only chat the bot listens to and announces in. `None` fails closed.
    pub chat_id: Option<i64>,
    pub schedule: DailySchedule,
    /// Advisory only, never enforced on votes.
    pub max_delay: u32,
    pub reset_policy: ResetPolicy,
    pub clock: Clock,
    pub catch_up_delay: Duration,
    /// Directory for the log file. Stdout only when unset.
    pub log_dir: Option<PathBuf>,
}

impl Config {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`, which receives full variable names.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(&format!("{PREFIX}{key}"))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let telegram_bot_token = get("SECRET_TOKEN").ok_or(ConfigError::Missing("SECRET_TOKEN"))?;
        // Telegram tokens are formatted as {bot_id}:{secret} where bot_id is numeric
        let token_parts: Vec<&str> = telegram_bot_token.split(':').collect();
        if token_parts.len() != 2 || token_parts[0].parse::<u64>().is_err() || token_parts[1].is_empty() {
            return Err(ConfigError::Validation(
                "secret token appears invalid (expected format: 123456789:ABCdefGHI...)".into(),
            ));
        }

        let chat_id = get("CHAT_ID")
            .map(|v| parse_number::<i64>("CHAT_ID", v))
            .transpose()?;

        let open_time = parse_time("OPEN_TIME", get("OPEN_TIME"), default_open_time())?;
        let close_time = parse_time("LUNCH_TIME", get("LUNCH_TIME"), default_lunch_time())?;
        if open_time >= close_time {
            return Err(ConfigError::Validation(format!(
                "open time {} must be before lunch time {}",
                open_time.format("%H:%M"),
                close_time.format("%H:%M")
            )));
        }

        let remind_lead_minutes = get("REMIND_MINUTES")
            .map(|v| parse_number("REMIND_MINUTES", v))
            .transpose()?
            .unwrap_or(30);

        let weekdays = match get("WEEKDAYS") {
            Some(v) => parse_weekdays(&v)?,
            None => default_weekdays(),
        };

        let max_delay = get("MAX_DELAY")
            .map(|v| parse_number("MAX_DELAY", v))
            .transpose()?
            .unwrap_or(30);

        let reset_on_open = get("RESET_ON_OPEN")
            .map(|v| parse_bool("RESET_ON_OPEN", v))
            .transpose()?
            .unwrap_or(false);
        let reset_policy = if reset_on_open {
            ResetPolicy::ClearOnOpen
        } else {
            ResetPolicy::Keep
        };

        let clock = match get("TIMEZONE") {
            Some(name) => {
                let tz: Tz = name.parse().map_err(|e| ConfigError::Invalid {
                    key: "TIMEZONE",
                    value: name.clone(),
                    reason: format!("{e}"),
                })?;
                Clock::Zone(tz)
            }
            None => Clock::Local,
        };

        let catch_up_delay = match get("CATCH_UP_SECONDS") {
            Some(v) => {
                let secs: u64 = parse_number("CATCH_UP_SECONDS", v.clone())?;
                if secs > MAX_CATCH_UP_SECONDS {
                    return Err(ConfigError::Invalid {
                        key: "CATCH_UP_SECONDS",
                        value: v,
                        reason: format!("must be at most {MAX_CATCH_UP_SECONDS}"),
                    });
                }
                Duration::from_secs(secs)
            }
            None => DEFAULT_CATCH_UP_DELAY,
        };

        Ok(Self {
            telegram_bot_token,
            chat_id,
            schedule: DailySchedule {
                open_time,
                close_time,
                remind_lead_minutes,
                weekdays,
            },
            max_delay,
            reset_policy,
            clock,
            catch_up_delay,
            log_dir: get("LOG_DIR").map(PathBuf::from),
        })
    }
}

fn default_open_time() -> NaiveTime {
    NaiveTime::from_hms_opt(8, 0, 0).unwrap_or_default()
}

fn default_lunch_time() -> NaiveTime {
    NaiveTime::from_hms_opt(12, 0, 0).unwrap_or_default()
}

fn default_weekdays() -> Vec<Weekday> {
    vec![Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri]
}

fn parse_number<T>(key: &'static str, value: String) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    value.parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        reason: e.to_string(),
        value,
    })
}

fn parse_bool(key: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            value,
            reason: "expected true or false".into(),
        }),
    }
}

/// "HH:MM" on a 24-hour clock.
fn parse_time(key: &'static str, value: Option<String>, default: NaiveTime) -> Result<NaiveTime, ConfigError> {
    match value {
        Some(v) => NaiveTime::parse_from_str(&v, "%H:%M").map_err(|e| ConfigError::Invalid {
            key,
            reason: e.to_string(),
            value: v,
        }),
        None => Ok(default),
    }
}

/// Comma-separated indices (0 = Monday) or English day names.
fn parse_weekdays(value: &str) -> Result<Vec<Weekday>, ConfigError> {
    let mut days = Vec::new();
    for part in value.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let day = match part.parse::<u8>() {
            Ok(n) => Weekday::try_from(n).map_err(|_| ConfigError::Invalid {
                key: "WEEKDAYS",
                value: value.to_string(),
                reason: format!("weekday index {n} out of range 0-6"),
            })?,
            Err(_) => part.parse::<Weekday>().map_err(|_| ConfigError::Invalid {
                key: "WEEKDAYS",
                value: value.to_string(),
                reason: format!("unknown weekday '{part}'"),
            })?,
        };
        if !days.contains(&day) {
            days.push(day);
        }
    }
    if days.is_empty() {
        return Err(ConfigError::Validation("weekdays must contain at least one day".into()));
    }
    Ok(days)
}
