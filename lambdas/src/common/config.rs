use chrono_tz::Tz;

use crate::common::errors::Error;
use crate::common::{BUCKET_NAME_DEFAULT, EXPIRY_TIME_ZONE_DEFAULT, TABLE_NAME_DEFAULT};

/// Settings shared by every function, read once at cold start.
#[derive(Debug, Clone)]
pub struct Settings {
    pub table_name: String,
    pub queue_url: String,
    pub bucket_name: String,
    pub snapshot_prefix: String,
    pub expiry_time_zone: Tz,
}

impl Settings {
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or(default.into());

        let zone_name = var("EXPIRY_TIME_ZONE", EXPIRY_TIME_ZONE_DEFAULT);
        let expiry_time_zone = zone_name
            .parse::<Tz>()
            .map_err(|err| Error::Validation(format!("EXPIRY_TIME_ZONE: {err}")))?;

        Ok(Self {
            table_name: var("TABLE_NAME", TABLE_NAME_DEFAULT),
            queue_url: var("QUEUE_URL", ""),
            bucket_name: var("BUCKET_NAME", BUCKET_NAME_DEFAULT),
            snapshot_prefix: var("SNAPSHOT_PREFIX", ""),
            expiry_time_zone,
        })
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            table_name: TABLE_NAME_DEFAULT.into(),
            queue_url: String::new(),
            bucket_name: BUCKET_NAME_DEFAULT.into(),
            snapshot_prefix: String::new(),
            expiry_time_zone: chrono_tz::Asia::Kolkata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_apply_when_unset() {
        let settings = Settings::from_lookup(|_| None).unwrap();

        assert_eq!(settings.table_name, "UserData");
        assert_eq!(settings.queue_url, "");
        assert_eq!(settings.bucket_name, BUCKET_NAME_DEFAULT);
        assert_eq!(settings.expiry_time_zone, chrono_tz::Asia::Kolkata);
    }

    #[test]
    fn overrides_are_read() {
        let env = HashMap::from([
            ("TABLE_NAME", "records"),
            ("QUEUE_URL", "https://sqs.eu-west-1.amazonaws.com/1/q"),
            ("SNAPSHOT_PREFIX", "snapshots/"),
            ("EXPIRY_TIME_ZONE", "Europe/Berlin"),
        ]);
        let settings = Settings::from_lookup(|key| env.get(key).map(|v| v.to_string())).unwrap();

        assert_eq!(settings.table_name, "records");
        assert_eq!(settings.queue_url, "https://sqs.eu-west-1.amazonaws.com/1/q");
        assert_eq!(settings.snapshot_prefix, "snapshots/");
        assert_eq!(settings.expiry_time_zone, chrono_tz::Europe::Berlin);
    }

    #[test]
    fn unknown_time_zone_is_rejected() {
        let result = Settings::from_lookup(|key| (key == "EXPIRY_TIME_ZONE").then(|| "Mars/Olympus".into()));
        assert!(result.is_err());
    }
}
