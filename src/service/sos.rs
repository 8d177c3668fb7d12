use super::{coordinate_field, require_role, JourneyService};
use crate::error::JourneyResult;
use crate::models::request::SosRequest;
use crate::models::{Actor, Alert, AlertType, NewAlert, Role};
use crate::providers::SosLocation;
use tracing::{info, warn};

pub const CAPTURED_ADDRESS: &str = "Location captured";

impl JourneyService {
    /// Child raises an SOS. Always records exactly one alert, tied to the
    /// child's started journey when there is one.
    pub async fn raise_sos(&self, actor: &Actor, req: SosRequest) -> JourneyResult<Alert> {
        require_role(actor, Role::Child)?;
        if let Some(latitude) = req.latitude {
            coordinate_field("latitude", latitude)?;
        }
        if let Some(longitude) = req.longitude {
            coordinate_field("longitude", longitude)?;
        }

        let journey = self.store.active_journey(actor.id).await?;

        let location = match req.coordinates() {
            Some((latitude, longitude)) => Some(SosLocation {
                latitude,
                longitude,
                address: req
                    .location_address
                    .clone()
                    .filter(|a| !a.trim().is_empty())
                    .unwrap_or_else(|| CAPTURED_ADDRESS.to_string()),
            }),
            None => match self.locations.locate(actor.id, journey.as_ref()).await {
                Ok(found) => found,
                Err(e) => {
                    warn!("No SOS location for child {}: {}", actor.id, e);
                    None
                }
            },
        };

        let message = req
            .message
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| self.messages.message());

        let alert = self
            .store
            .insert_alert(
                &NewAlert {
                    journey_id: journey.as_ref().map(|j| j.id),
                    child_id: actor.id,
                    alert_type: AlertType::Sos,
                    message,
                    latitude: location.as_ref().map(|l| l.latitude),
                    longitude: location.as_ref().map(|l| l.longitude),
                    location_address: location.map(|l| l.address),
                },
                self.clock.now(),
            )
            .await?;

        info!(
            "SOS {} raised by child {} (journey {:?})",
            alert.id, actor.id, alert.journey_id
        );
        Ok(alert)
    }
}
