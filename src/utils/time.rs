/// Serde adapter for optional timestamps carried as milliseconds since the Unix epoch.
///
/// Use with `#[serde(default, with = "crate::utils::time::millis")]`.
pub mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use time::OffsetDateTime;

    /// Deserialize epoch milliseconds into an OffsetDateTime.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<OffsetDateTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let Some(millis) = Option::<i64>::deserialize(deserializer)? else {
            return Ok(None);
        };
        OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000)
            .map(Some)
            .map_err(serde::de::Error::custom)
    }

    /// Serialize an OffsetDateTime as epoch milliseconds.
    pub fn serialize<S>(datetime: &Option<OffsetDateTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match datetime {
            Some(datetime) => {
                let millis = datetime.unix_timestamp_nanos() / 1_000_000;
                let millis = i64::try_from(millis).map_err(serde::ser::Error::custom)?;
                serializer.serialize_i64(millis)
            }
            None => serializer.serialize_none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};
    use time::OffsetDateTime;

    #[derive(Serialize, Deserialize)]
    struct Stamped {
        #[serde(default, with = "super::millis")]
        at: Option<OffsetDateTime>,
    }

    #[test]
    fn millis_roundtrip() {
        let parsed: Stamped = serde_json::from_str(r#"{"at":1700000000123}"#).unwrap();
        let at = parsed.at.unwrap();
        assert_eq!(at.unix_timestamp(), 1_700_000_000);
        assert_eq!(at.millisecond(), 123);
        assert_eq!(
            serde_json::to_string(&parsed).unwrap(),
            r#"{"at":1700000000123}"#
        );
    }

    #[test]
    fn millis_missing_or_null() {
        let parsed: Stamped = serde_json::from_str("{}").unwrap();
        assert!(parsed.at.is_none());
        let parsed: Stamped = serde_json::from_str(r#"{"at":null}"#).unwrap();
        assert!(parsed.at.is_none());
    }
}
