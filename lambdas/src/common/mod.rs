pub mod config;
pub mod errors;
pub mod utils;

use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use crate::common::errors::Error;

pub const TABLE_NAME_DEFAULT: &str = "UserData";
pub const BUCKET_NAME_DEFAULT: &str = "wandu-record-snapshots";
pub const EXPIRY_TIME_ZONE_DEFAULT: &str = "Asia/Kolkata";

/// Offset-less layouts, read as UTC. The slash forms are what older rows carry in `Time`.
const NAIVE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %H:%M:%S",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Status {
    #[default]
    New,
    Created,
    Updated,
    UpdateCompleted,
    Deleted,
    Failed,
}

impl Status {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Status::New => "NEW",
            Status::Created => "CREATED",
            Status::Updated => "UPDATED",
            Status::UpdateCompleted => "UPDATE_COMPLETED",
            Status::Deleted => "DELETED",
            Status::Failed => "FAILED",
        }
    }

    /// The spelling older writers stored for this status, if it differs.
    pub const fn legacy_label(&self) -> Option<&'static str> {
        match self {
            Status::Updated => Some("Updated"),
            Status::Deleted => Some("Removed"),
            _ => None,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = Error;

    /// Case-insensitive. `Removed` is the legacy label for `DELETED`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let status = match s.trim().to_ascii_uppercase().as_str() {
            "NEW" => Status::New,
            "CREATED" => Status::Created,
            "UPDATED" => Status::Updated,
            "UPDATE_COMPLETED" | "UPDATECOMPLETED" => Status::UpdateCompleted,
            "DELETED" | "REMOVED" => Status::Deleted,
            "FAILED" => Status::Failed,
            _ => return Err(Error::Validation(format!("Unknown status: {s}"))),
        };

        Ok(status)
    }
}

impl Serialize for Status {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Status {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = Cow::<str>::deserialize(deserializer)?;
        label.parse().map_err(serde::de::Error::custom)
    }
}

/// RFC 3339, or one of the offset-less layouts taken as UTC.
pub fn parse_time(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(time) = DateTime::parse_from_rfc3339(s) {
        return Some(time.with_timezone(&Utc));
    }

    NAIVE_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(s, format).ok())
        .map(|naive| naive.and_utc())
}

fn deserialize_time<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
    let raw = Cow::<str>::deserialize(deserializer)?;
    parse_time(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}")))
}

/// A Wandu record, as stored in the table and carried on the queue.
///
/// A missing `time` is filled with the time it was decoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    #[serde(alias = "Id")]
    pub id: i64,
    #[serde(alias = "Status", default)]
    pub status: Status,
    #[serde(alias = "Time", default = "Utc::now", deserialize_with = "deserialize_time")]
    pub time: DateTime<Utc>,
    #[serde(alias = "Expiry", default, skip_serializing_if = "Option::is_none")]
    pub expiry: Option<DateTime<FixedOffset>>,
}

impl Record {
    pub fn new(id: i64, status: Status, time: DateTime<Utc>) -> Self {
        Self {
            id,
            status,
            time,
            expiry: None,
        }
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn status_parses_legacy_labels() {
        assert_eq!("Updated".parse::<Status>().unwrap(), Status::Updated);
        assert_eq!("Removed".parse::<Status>().unwrap(), Status::Deleted);
        assert_eq!("update_completed".parse::<Status>().unwrap(), Status::UpdateCompleted);
        assert!("Archived".parse::<Status>().is_err());
    }

    #[test]
    fn status_decodes_in_any_case() {
        for (label, expected) in [
            ("new", Status::New),
            ("New", Status::New),
            ("uPdAtEd", Status::Updated),
            ("failed", Status::Failed),
            ("removed", Status::Deleted),
        ] {
            let status: Status = serde_json::from_value(serde_json::json!(label)).unwrap();
            assert_eq!(status, expected, "{label}");
        }

        assert!(serde_json::from_value::<Status>(serde_json::json!("archived")).is_err());
    }

    #[test]
    fn record_accepts_capitalised_fields_and_defaults_status() {
        let record: Record =
            serde_json::from_str(r#"{"Id": 7, "Time": "2024-03-01T10:00:00Z"}"#).unwrap();

        assert_eq!(record.id, 7);
        assert_eq!(record.status, Status::New);
        assert_eq!(record.time, Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap());
        assert_eq!(record.expiry, None);
    }

    #[test]
    fn missing_time_defaults_to_now() {
        let before = Utc::now();
        let record: Record = serde_json::from_str(r#"{"id": 1}"#).unwrap();

        assert!(record.time >= before && record.time <= Utc::now());
    }

    #[test]
    fn naive_and_legacy_times_are_read_as_utc() {
        assert_eq!(parse_time("2024-06-01T12:00:00"), Some(noon()));
        assert_eq!(parse_time("2024-06-01 12:00:00.000"), Some(noon()));
        assert_eq!(parse_time("6/1/2024 12:00:00 PM"), Some(noon()));
        assert_eq!(parse_time("06/01/2024 12:00:00"), Some(noon()));
        assert_eq!(parse_time("2024-06-01T17:30:00+05:30"), Some(noon()));
        assert_eq!(parse_time("yesterday"), None);

        let record: Record =
            serde_json::from_str(r#"{"id": 1, "time": "2024-06-01T12:00:00"}"#).unwrap();
        assert_eq!(record.time, noon());
    }

    #[test]
    fn record_serializes_canonical_labels_without_empty_expiry() {
        let record = Record::new(3, Status::UpdateCompleted, noon());

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"id": 3, "status": "UPDATE_COMPLETED", "time": "2024-06-01T12:00:00Z"})
        );
    }

    #[test]
    fn queue_message_with_legacy_status_decodes() {
        let record: Record = serde_json::from_str(
            r#"{"Id": 2, "Status": "Removed", "Time": "2024-03-01T10:00:00Z"}"#,
        )
        .unwrap();

        assert_eq!(record.status, Status::Deleted);
    }
}
