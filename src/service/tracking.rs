use super::{coordinate_field, require_role, JourneyService};
use crate::error::{JourneyError, JourneyResult};
use crate::models::request::LocationPing;
use crate::models::{Actor, Location, NewLocation, Role};
use tracing::debug;
use uuid::Uuid;

impl JourneyService {
    /// Appends the child's position to their started journey.
    pub async fn record_location(
        &self,
        actor: &Actor,
        ping: LocationPing,
    ) -> JourneyResult<Location> {
        require_role(actor, Role::Child)?;
        let latitude = coordinate_field("latitude", ping.latitude)?;
        let longitude = coordinate_field("longitude", ping.longitude)?;

        let journey = self
            .store
            .active_journey(actor.id)
            .await?
            .ok_or(JourneyError::NotFound("active journey"))?;

        let location = self
            .store
            .insert_location(&NewLocation {
                journey_id: journey.id,
                latitude,
                longitude,
                recorded_at: self.clock.now(),
            })
            .await?;

        debug!(
            "Recorded position {} for journey {} ({}, {})",
            location.id, journey.id, latitude, longitude
        );
        Ok(location)
    }

    /// Recorded positions of a journey, oldest first.
    pub async fn journey_trail(
        &self,
        actor: &Actor,
        journey_id: Uuid,
    ) -> JourneyResult<Vec<Location>> {
        let journey = self.visible_journey(actor, journey_id).await?;
        Ok(self.store.journey_locations(journey.id).await?)
    }
}
