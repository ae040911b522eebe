use std::fmt;
use std::str::FromStr;

use chrono::{Local, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::TypeError;

const FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Local wall-clock time at second resolution, as written to the logs
/// (`YYYY-MM-DD HH:MM:SS`).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Timestamp(NaiveDateTime);

impl Timestamp {
    /// The current local time, truncated to whole seconds.
    pub fn now() -> Self {
        let now = Local::now().naive_local();
        Self(now.with_nanosecond(0).unwrap_or(now))
    }

    pub fn from_naive(value: NaiveDateTime) -> Self {
        Self(value)
    }

    pub fn as_naive(&self) -> NaiveDateTime {
        self.0
    }
}

impl FromStr for Timestamp {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDateTime::parse_from_str(s, FORMAT)
            .map(Self)
            .map_err(|e| TypeError::malformed(format!("bad timestamp {s:?}: {e}")))
    }
}

impl TryFrom<String> for Timestamp {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Timestamp> for String {
    fn from(ts: Timestamp) -> Self {
        ts.to_string()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(FORMAT))
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_log_format() {
        let ts: Timestamp = "2024-03-09 07:05:01".parse().unwrap();
        assert_eq!(ts.to_string(), "2024-03-09 07:05:01");
    }

    #[test]
    fn now_has_whole_seconds() {
        let ts = Timestamp::now();
        assert_eq!(ts.as_naive().nanosecond(), 0);
        let reparsed: Timestamp = ts.to_string().parse().unwrap();
        assert_eq!(reparsed, ts);
    }

    #[test]
    fn rejects_other_formats() {
        assert!("2024-03-09T07:05:01".parse::<Timestamp>().is_err());
        assert!("yesterday".parse::<Timestamp>().is_err());
    }
}
