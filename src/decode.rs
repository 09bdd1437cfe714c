use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("payload is not a JSON object")]
    NotAnObject,
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("unparseable time value: {0}")]
    BadTime(String),
}

/// A normalized sensor reading decoded from one MQTT message, not yet tied to
/// a registered device.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadingCandidate {
    pub time: DateTime<Utc>,
    pub model: String,
    pub sensor_id: String,
    pub temperature_c: Option<f64>,
    pub humidity: Option<f64>,
    pub battery_level: Option<f64>,
    pub status: Option<String>,
    /// Some firmwares self-report a location name; discovery uses it to
    /// create the location registry entry.
    pub location: Option<String>,
}

impl ReadingCandidate {
    /// Human-readable name for a newly discovered device.
    pub fn display_name(&self) -> String {
        format!("{} {}", self.model, self.sensor_id)
    }
}

/// Decode one raw MQTT payload into a normalized reading.
///
/// Tolerant by design: numeric fields may arrive as JSON strings, optional
/// fields (humidity, battery, status) may be absent, and unknown extra fields
/// are ignored. `time`, `model` and the sensor `id` are required; the
/// optionals degrade to `None`.
pub fn decode(_topic: &str, raw: &[u8]) -> Result<ReadingCandidate, DecodeError> {
    let json: Value = serde_json::from_slice(raw)?;
    let obj = json.as_object().ok_or(DecodeError::NotAnObject)?;

    let time_value = obj.get("time").ok_or(DecodeError::MissingField("time"))?;
    let time = parse_time(time_value)?;
    let model = coerce_string(obj.get("model")).ok_or(DecodeError::MissingField("model"))?;
    let sensor_id = coerce_string(obj.get("id")).ok_or(DecodeError::MissingField("id"))?;

    let battery_level = coerce_f64(obj.get("battery"))
        .or_else(|| coerce_f64(obj.get("battery_level")))
        .or_else(|| coerce_f64(obj.get("battery_ok")).map(|ok| ok * 100.0));

    let candidate = ReadingCandidate {
        time,
        model,
        sensor_id,
        temperature_c: coerce_f64(obj.get("temperature_C"))
            .or_else(|| coerce_f64(obj.get("temperature_c"))),
        humidity: coerce_f64(obj.get("humidity")),
        battery_level,
        status: coerce_string(obj.get("status")),
        location: coerce_string(obj.get("location")),
    };
    Ok(candidate)
}

/// Accept RFC 3339 as well as the naive timestamp formats common in sensor
/// firmwares ("2024-01-01 12:00:00", with or without a 'T' separator and
/// fractional seconds). Naive timestamps are taken as UTC.
fn parse_time(v: &Value) -> Result<DateTime<Utc>, DecodeError> {
    let s = match v {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => {
            // Unix seconds
            let secs = n
                .as_i64()
                .ok_or_else(|| DecodeError::BadTime(n.to_string()))?;
            return DateTime::from_timestamp(secs, 0)
                .ok_or_else(|| DecodeError::BadTime(n.to_string()));
        }
        other => return Err(DecodeError::BadTime(other.to_string())),
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(&s) {
        return Ok(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&s, fmt) {
            return Ok(DateTime::from_naive_utc_and_offset(naive, Utc));
        }
    }
    Err(DecodeError::BadTime(s))
}

/// Numeric coercion: JSON numbers pass through, numeric strings are parsed,
/// anything else counts as absent.
fn coerce_f64(v: Option<&Value>) -> Option<f64> {
    match v? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn coerce_string(v: Option<&Value>) -> Option<String> {
    match v? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn full_payload_decodes() {
        let raw = br#"{
            "time": "2024-01-01 00:00:00",
            "model": "Acurite-Tower",
            "id": 1234,
            "temperature_C": 21.5,
            "humidity": 40,
            "battery_ok": 1,
            "status": "OK",
            "mic": "CHECKSUM"
        }"#;
        let r = decode("rtl_433/Acurite-Tower/1234", raw).unwrap();
        assert_eq!(r.model, "Acurite-Tower");
        assert_eq!(r.sensor_id, "1234");
        assert_eq!(r.temperature_c, Some(21.5));
        assert_eq!(r.humidity, Some(40.0));
        assert_eq!(r.battery_level, Some(100.0));
        assert_eq!(r.status.as_deref(), Some("OK"));
    }

    #[test]
    fn numeric_fields_as_strings_are_equivalent() {
        let as_number = decode(
            "sensor/livingroom",
            br#"{"time":"2024-01-01T00:00:00Z","model":"THGR122N","id":91,"temperature_C":21.5,"battery":85}"#,
        )
        .unwrap();
        let as_string = decode(
            "sensor/livingroom",
            br#"{"time":"2024-01-01T00:00:00Z","model":"THGR122N","id":"91","temperature_C":"21.5","battery":"85"}"#,
        )
        .unwrap();
        assert_eq!(as_number, as_string);
    }

    #[test]
    fn string_temperature_is_coerced() {
        let r = decode(
            "sensor/livingroom",
            br#"{"time":"2024-01-01T00:00:00Z","model":"THGR122N","id":91,"temperature_C":"21.5"}"#,
        )
        .unwrap();
        assert_eq!(r.temperature_c, Some(21.5));
    }

    #[test]
    fn missing_optionals_decode_to_none() {
        let r = decode(
            "sensor/attic",
            br#"{"time":"2024-01-01T00:00:00Z","model":"THGR122N","id":91}"#,
        )
        .unwrap();
        assert_eq!(r.temperature_c, None);
        assert_eq!(r.humidity, None);
        assert_eq!(r.battery_level, None);
        assert_eq!(r.status, None);
    }

    #[test]
    fn missing_model_is_a_decode_error() {
        assert!(matches!(
            decode(
                "sensor/attic",
                br#"{"time":"2024-01-01T00:00:00Z","id":91,"temperature_C":21.5}"#
            ),
            Err(DecodeError::MissingField("model"))
        ));
    }

    #[test]
    fn missing_sensor_id_is_a_decode_error() {
        assert!(matches!(
            decode(
                "sensor/attic",
                br#"{"time":"2024-01-01T00:00:00Z","model":"THGR122N","temperature_C":21.5}"#
            ),
            Err(DecodeError::MissingField("id"))
        ));
    }

    #[test]
    fn invalid_json_is_a_decode_error() {
        assert!(matches!(
            decode("sensor/attic", b"{not json"),
            Err(DecodeError::Json(_))
        ));
    }

    #[test]
    fn missing_time_is_a_decode_error() {
        assert!(matches!(
            decode("sensor/attic", br#"{"temperature_C":21.5}"#),
            Err(DecodeError::MissingField("time"))
        ));
    }

    #[test]
    fn non_object_payload_is_a_decode_error() {
        assert!(matches!(
            decode("sensor/attic", b"[1,2,3]"),
            Err(DecodeError::NotAnObject)
        ));
    }

    #[test]
    fn time_formats_are_parsed_permissively() {
        for s in [
            "2024-01-01T00:00:00Z",
            "2024-01-01T00:00:00+00:00",
            "2024-01-01 00:00:00",
            "2024-01-01 00:00:00.123",
            "2024-01-01T00:00:00",
        ] {
            let raw = format!(r#"{{"time":"{}","model":"THGR122N","id":91}}"#, s);
            let r = decode("t", raw.as_bytes()).unwrap();
            assert_eq!(r.time.date_naive().to_string(), "2024-01-01");
        }
    }

    #[test]
    fn unparseable_time_is_a_decode_error() {
        assert!(matches!(
            decode("t", br#"{"time":"yesterday"}"#),
            Err(DecodeError::BadTime(_))
        ));
    }

    #[test]
    fn display_name_combines_model_and_sensor_id() {
        let r = decode(
            "sensor/livingroom",
            br#"{"time":"2024-01-01T00:00:00Z","model":"Acurite-Tower","id":1234}"#,
        )
        .unwrap();
        assert_eq!(r.display_name(), "Acurite-Tower 1234");
    }
}
