use serde::{Deserialize, Deserializer};
use uuid::Uuid;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScheduleJourney {
    pub child_id: Uuid,
    pub start_location: String,
    pub end_location: String,
    pub duration_minutes: i32,
}

/// Child start request: `journey_id` starts a scheduled journey, otherwise
/// the locations describe a new ad-hoc one.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StartJourney {
    pub journey_id: Option<Uuid>,
    pub start_location: Option<String>,
    pub end_location: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SosRequest {
    pub message: Option<String>,
    #[serde(default, deserialize_with = "parse_f64_option")]
    pub latitude: Option<f64>,
    #[serde(default, deserialize_with = "parse_f64_option")]
    pub longitude: Option<f64>,
    pub location_address: Option<String>,
}

impl SosRequest {
    /// Both coordinates, or nothing.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.latitude.zip(self.longitude)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LocationPing {
    #[serde(deserialize_with = "parse_f64")]
    pub latitude: f64,
    #[serde(deserialize_with = "parse_f64")]
    pub longitude: f64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrFloat {
    String(String),
    Float(f64),
}

fn parse_f64_option<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let v: Option<StringOrFloat> = Option::deserialize(deserializer)?;
    match v {
        Some(StringOrFloat::Float(f)) => Ok(Some(f)),
        Some(StringOrFloat::String(s)) => {
            if s.trim().is_empty() {
                Ok(None)
            } else {
                s.trim().parse::<f64>().map(Some).map_err(serde::de::Error::custom)
            }
        }
        None => Ok(None),
    }
}

fn parse_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    parse_f64_option(deserializer)?
        .ok_or_else(|| serde::de::Error::custom("expected a number"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sos_payload_with_string_coordinates() {
        let payload = r#"
        {
            "message": "Help",
            "latitude": "+28.6139",
            "longitude": "77.2090",
            "location_address": "New Delhi, India"
        }
        "#;

        let req: SosRequest = serde_json::from_str(payload).unwrap();
        assert_eq!(req.coordinates(), Some((28.6139, 77.2090)));
        assert_eq!(req.message.as_deref(), Some("Help"));
    }

    #[test]
    fn test_sos_payload_with_blank_or_missing_coordinates() {
        let req: SosRequest = serde_json::from_str(r#"{"latitude": "", "longitude": 12.5}"#).unwrap();
        assert_eq!(req.latitude, None);
        assert_eq!(req.coordinates(), None);

        let req: SosRequest = serde_json::from_str("{}").unwrap();
        assert!(req.message.is_none());
        assert_eq!(req.coordinates(), None);
    }

    #[test]
    fn test_malformed_coordinate_is_rejected() {
        assert!(serde_json::from_str::<SosRequest>(r#"{"latitude": "north"}"#).is_err());
        assert!(serde_json::from_str::<LocationPing>(r#"{"latitude": "", "longitude": 1}"#).is_err());

        let ping: LocationPing =
            serde_json::from_str(r#"{"latitude": 19.076, "longitude": "72.8777"}"#).unwrap();
        assert_eq!(ping.longitude, 72.8777);
    }
}
