//! Viewing history kept on the user object.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::UserSession;

/// One viewed item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    #[serde(with = "leancloud_date")]
    pub time: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn new(id: impl Into<String>, time: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            time,
        }
    }
}

/// LeanCloud stores dates as `{"__type": "Date", "iso": "..."}`; plain RFC 3339
/// strings and epoch milliseconds are accepted on read as well.
mod leancloud_date {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize)]
    struct TypedDate {
        #[serde(rename = "__type")]
        kind: &'static str,
        iso: String,
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawDate {
        Typed { iso: String },
        Plain(String),
        Millis(i64),
    }

    pub fn serialize<S: Serializer>(time: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        TypedDate {
            kind: "Date",
            iso: time.to_rfc3339_opts(SecondsFormat::Millis, true),
        }
        .serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let iso = match RawDate::deserialize(deserializer)? {
            RawDate::Typed { iso } | RawDate::Plain(iso) => iso,
            RawDate::Millis(millis) => {
                return DateTime::from_timestamp_millis(millis).ok_or_else(|| {
                    serde::de::Error::custom(format!("timestamp out of range: {}", millis))
                })
            }
        };
        DateTime::parse_from_rfc3339(&iso)
            .map(|t| t.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

/// The session's readable history entries, or none when the field is unset
/// or not a list.
pub fn read_history(session: &UserSession) -> Vec<HistoryEntry> {
    match session.history() {
        Ok(history) => history,
        Err(e) => {
            tracing::warn!(
                user = %session.object_id,
                error = %e,
                "Unreadable history on user object, starting from empty"
            );
            Vec::new()
        }
    }
}

/// Most recent view first.
pub fn sort_by_time_desc(history: &mut [HistoryEntry]) {
    history.sort_by(|a, b| b.time.cmp(&a.time));
}

pub fn contains(history: &[HistoryEntry], id: &str) -> bool {
    history.iter().any(|entry| entry.id == id)
}

pub fn read_ids(history: &[HistoryEntry]) -> HashSet<&str> {
    history.iter().map(|entry| entry.id.as_str()).collect()
}
