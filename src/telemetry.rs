use std::fmt;
use std::str;

/// Topic namespace the bridge listens under: `arpa/<measurement>/<location>`.
pub const TOPIC_NAMESPACE: &str = "arpa";

/// Measurement kind that is received but never persisted.
const EXCLUDED_MEASUREMENT: &str = "status";

/// One decoded sensor reading, ready to be written to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorReading {
    pub location: String,
    pub measurement: String,
    pub value: f64,
}

/// The payload of a measurement topic was not a number.
#[derive(Debug, Clone, PartialEq)]
pub struct PayloadError {
    pub topic: String,
    pub payload: String,
}

impl PayloadError {
    fn new(topic: &str, payload: &[u8]) -> Self {
        Self {
            topic: topic.to_string(),
            payload: String::from_utf8_lossy(payload).into_owned(),
        }
    }
}

impl fmt::Display for PayloadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "payload not as expected on {}: {:?}",
            self.topic, self.payload
        )
    }
}

impl std::error::Error for PayloadError {}

/// Split a topic into `(measurement, location)`.
///
/// Returns `None` unless the topic is the namespace prefix followed by
/// exactly two non-empty segments.
pub fn parse_topic(topic: &str) -> Option<(&str, &str)> {
    let rest = topic.strip_prefix(TOPIC_NAMESPACE)?.strip_prefix('/')?;
    let mut segments = rest.split('/');
    let measurement = segments.next()?;
    let location = segments.next()?;
    if measurement.is_empty() || location.is_empty() || segments.next().is_some() {
        return None;
    }
    Some((measurement, location))
}

/// Decode one inbound message into a reading.
///
/// `Ok(None)` means the message is not ours to persist: either the topic
/// does not name a measurement, or its kind is `status` (received for the
/// dashboard's benefit, intentionally not stored).
pub fn decode(topic: &str, payload: &[u8]) -> Result<Option<SensorReading>, PayloadError> {
    let Some((measurement, location)) = parse_topic(topic) else {
        return Ok(None);
    };
    if measurement == EXCLUDED_MEASUREMENT {
        return Ok(None);
    }

    let text = str::from_utf8(payload).map_err(|_| PayloadError::new(topic, payload))?;
    let value: f64 = text
        .trim()
        .parse()
        .map_err(|_| PayloadError::new(topic, payload))?;

    Ok(Some(SensorReading {
        location: location.to_string(),
        measurement: measurement.to_string(),
        value,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_topic() {
        assert_eq!(parse_topic("arpa/temperature/3"), Some(("temperature", "3")));
        assert_eq!(parse_topic("arpa/gas/kitchen"), Some(("gas", "kitchen")));
    }

    #[test]
    fn test_parse_topic_wrong_namespace() {
        assert_eq!(parse_topic("other/temperature/3"), None);
        assert_eq!(parse_topic("arpanet/temperature/3"), None);
    }

    #[test]
    fn test_parse_topic_wrong_shape() {
        assert_eq!(parse_topic("arpa"), None);
        assert_eq!(parse_topic("arpa/temperature"), None);
        assert_eq!(parse_topic("arpa/temperature/3/extra"), None);
        assert_eq!(parse_topic("arpa//3"), None);
        assert_eq!(parse_topic("arpa/temperature/"), None);
    }

    #[test]
    fn test_decode_reading() {
        let reading = decode("arpa/temperature/3", b"22.05").unwrap().unwrap();
        assert_eq!(
            reading,
            SensorReading {
                location: "3".to_string(),
                measurement: "temperature".to_string(),
                value: 22.05,
            }
        );
    }

    #[test]
    fn test_decode_trims_whitespace() {
        let reading = decode("arpa/gas/7", b" 1.5\n").unwrap().unwrap();
        assert_eq!(reading.value, 1.5);
    }

    #[test]
    fn test_decode_status_is_skipped() {
        assert_eq!(decode("arpa/status/3", b"1").unwrap(), None);
        // Skipped before the payload is even looked at.
        assert_eq!(decode("arpa/status/3", b"not a number").unwrap(), None);
    }

    #[test]
    fn test_decode_foreign_topic_is_skipped() {
        assert_eq!(decode("other/temperature/3", b"22.05").unwrap(), None);
    }

    #[test]
    fn test_decode_bad_payload() {
        let err = decode("arpa/gas/7", b"abc").unwrap_err();
        assert_eq!(err.topic, "arpa/gas/7");
        assert_eq!(err.payload, "abc");

        assert!(decode("arpa/gas/7", b"").is_err());
        assert!(decode("arpa/gas/7", b"1.2.3").is_err());
        assert!(decode("arpa/gas/7", &[0xff, 0xfe]).is_err());
    }
}
