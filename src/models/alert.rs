use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Marker carried by every alert raised by the overdue sweep.
pub const OVERDUE_MARKER: &str = "Overdue";

pub const OVERDUE_MESSAGE: &str =
    "SOS: Journey Overdue! Child did not complete the journey on time.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertType {
    Sos,
}

impl AlertType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sos => "sos",
        }
    }
}

impl TryFrom<String> for AlertType {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.as_str() {
            "sos" => Ok(Self::Sos),
            _ => Err(format!("Unknown alert type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Alert {
    pub id: Uuid,
    pub journey_id: Option<Uuid>,
    pub child_id: Uuid,
    #[sqlx(try_from = "String")]
    pub alert_type: AlertType,
    pub message: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub location_address: Option<String>,
    pub created_at: NaiveDateTime,
}

impl Alert {
    pub fn is_overdue_for(&self, journey_id: Uuid) -> bool {
        self.journey_id == Some(journey_id)
            && self.alert_type == AlertType::Sos
            && self.message.contains(OVERDUE_MARKER)
    }
}

#[derive(Debug, Clone)]
pub struct NewAlert {
    pub journey_id: Option<Uuid>,
    pub child_id: Uuid,
    pub alert_type: AlertType,
    pub message: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub location_address: Option<String>,
}

impl NewAlert {
    pub fn overdue(journey_id: Uuid, child_id: Uuid) -> Self {
        Self {
            journey_id: Some(journey_id),
            child_id,
            alert_type: AlertType::Sos,
            message: OVERDUE_MESSAGE.to_string(),
            latitude: None,
            longitude: None,
            location_address: None,
        }
    }
}
