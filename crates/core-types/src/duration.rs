//! Serde adapters for `std::time::Duration` written as humantime strings
//! (`10s`, `5m`, `24h`).
//!
//! Use with `#[serde(with = "autoheal_core_types::duration")]`. Bare
//! integers are still accepted on input and read as milliseconds.

use std::time::Duration;

use serde::de::{self, Deserializer, Visitor};
use serde::Serializer;

pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&humantime::format_duration(*value).to_string())
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(DurationVisitor)
}

struct DurationVisitor;

impl<'de> Visitor<'de> for DurationVisitor {
    type Value = Duration;

    fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str("a duration such as \"10s\" or a number of milliseconds")
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Duration, E> {
        humantime::parse_duration(value.trim())
            .map_err(|err| E::custom(format!("invalid duration '{value}': {err}")))
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<Duration, E> {
        Ok(Duration::from_millis(value))
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<Duration, E> {
        u64::try_from(value)
            .map(Duration::from_millis)
            .map_err(|_| E::custom("duration cannot be negative"))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize)]
    struct Holder {
        #[serde(with = "crate::duration")]
        timeout: Duration,
    }

    #[test]
    fn test_parses_humantime_and_millis() {
        let h: Holder = serde_json::from_str(r#"{"timeout":"5m"}"#).unwrap();
        assert_eq!(h.timeout, Duration::from_secs(300));
        let h: Holder = serde_json::from_str(r#"{"timeout":1500}"#).unwrap();
        assert_eq!(h.timeout, Duration::from_millis(1500));
        assert!(serde_json::from_str::<Holder>(r#"{"timeout":"soon"}"#).is_err());
    }

    #[test]
    fn test_serializes_as_humantime() {
        let json = serde_json::to_string(&Holder {
            timeout: Duration::from_secs(7200),
        })
        .unwrap();
        assert_eq!(json, r#"{"timeout":"2h"}"#);
    }
}
