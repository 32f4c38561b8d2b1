//! Engine runtime settings.

use std::time::Duration;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Tunables shared by every engine operation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Reference timezone for daily and weekly boundaries.
    pub timezone: Tz,
    /// Besitos credited by each daily gift claim.
    pub daily_gift_besitos: i64,
    /// How long a write waits for the user's lock before failing with `Busy`.
    #[serde(with = "duration_ms")]
    pub lock_timeout: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            timezone: chrono_tz::UTC,
            daily_gift_besitos: 10,
            lock_timeout: Duration::from_secs(5),
        }
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_utc_and_ten_besitos() {
        let settings = EngineSettings::default();
        assert_eq!(settings.timezone, chrono_tz::UTC);
        assert_eq!(settings.daily_gift_besitos, 10);
        assert_eq!(settings.lock_timeout, Duration::from_secs(5));
    }

    #[test]
    fn timeout_is_serialized_in_milliseconds() {
        let settings = EngineSettings {
            timezone: chrono_tz::America::Mexico_City,
            daily_gift_besitos: 15,
            lock_timeout: Duration::from_millis(250),
        };
        let json = serde_json::to_value(&settings).unwrap();
        assert_eq!(json["lock_timeout"], 250);
        assert_eq!(json["timezone"], "America/Mexico_City");

        let back: EngineSettings = serde_json::from_value(json).unwrap();
        assert_eq!(back, settings);
    }
}
