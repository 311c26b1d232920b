// SPDX-FileCopyrightText: 2024 Mathieu Fenniak <mathieu@fenniak.net>
//
// SPDX-License-Identifier: GPL-3.0-or-later

use std::{fmt, time::Duration};

use serde::{
    Deserializer, Serializer,
    de::{self, Visitor},
};

pub fn duration_to_seconds<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_f64(duration.as_secs_f64())
}

/// Deserializes a non-negative number of seconds, integral or fractional, into a Duration.
pub fn seconds_to_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    struct SecondsVisitor;

    impl Visitor<'_> for SecondsVisitor {
        type Value = Duration;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a non-negative number of seconds")
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Duration::from_secs(value))
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            u64::try_from(value)
                .map(Duration::from_secs)
                .map_err(|_| E::custom("negative duration"))
        }

        fn visit_f64<E>(self, value: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Duration::try_from_secs_f64(value).map_err(E::custom)
        }
    }

    deserializer.deserialize_any(SecondsVisitor)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde::{Deserialize, Serialize};

    use super::{duration_to_seconds, seconds_to_duration};

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct Timed {
        #[serde(
            serialize_with = "duration_to_seconds",
            deserialize_with = "seconds_to_duration"
        )]
        duration: Duration,
    }

    #[test]
    fn seconds() {
        let timed = Timed {
            duration: Duration::from_millis(1500),
        };
        assert_eq!(serde_json::to_string(&timed).unwrap(), r#"{"duration":1.5}"#);
        assert_eq!(
            serde_json::from_str::<Timed>(r#"{"duration":1.5}"#).unwrap(),
            timed
        );
        assert_eq!(
            serde_json::from_str::<Timed>(r#"{"duration":3}"#)
                .unwrap()
                .duration,
            Duration::from_secs(3)
        );
        assert!(serde_json::from_str::<Timed>(r#"{"duration":-1}"#).is_err());
        assert!(serde_json::from_str::<Timed>(r#"{"duration":"soon"}"#).is_err());
    }
}
