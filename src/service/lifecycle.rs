use super::{duration_field, require_role, text_field, JourneyService};
use crate::error::{JourneyError, JourneyResult};
use crate::models::journey::expected_end;
use crate::models::request::{ScheduleJourney, StartJourney};
use crate::models::{Actor, Journey, JourneyFilter, JourneyPatch, JourneyStatus, NewJourney, Role};
use tracing::{info, warn};
use uuid::Uuid;

const ALREADY_ACTIVE: &str = "You already have an active journey";

impl JourneyService {
    /// Parent schedules a journey for one of their linked children.
    pub async fn create_scheduled_journey(
        &self,
        actor: &Actor,
        req: ScheduleJourney,
    ) -> JourneyResult<Journey> {
        require_role(actor, Role::Parent)?;
        let start_location = text_field("start_location", &req.start_location)?;
        let end_location = text_field("end_location", &req.end_location)?;
        let duration_minutes = duration_field(req.duration_minutes)?;

        let linked = self
            .store
            .get_user(req.child_id)
            .await?
            .is_some_and(|child| child.role == Role::Child && child.parent_id == Some(actor.id));
        if !linked {
            return Err(JourneyError::Unauthorized);
        }

        // expected_end_time is only known once the child starts.
        let journey = self
            .store
            .insert_journey(
                &NewJourney {
                    child_id: req.child_id,
                    parent_id: actor.id,
                    start_location,
                    end_location,
                    status: JourneyStatus::Scheduled,
                    started_at: None,
                    expected_end_time: None,
                    duration_minutes: Some(duration_minutes),
                },
                self.clock.now(),
            )
            .await?;

        info!(
            "Scheduled journey {} for child {} ({} min)",
            journey.id, journey.child_id, duration_minutes
        );
        Ok(journey)
    }

    /// Child starts a new journey on the spot.
    pub async fn create_ad_hoc_journey(
        &self,
        actor: &Actor,
        start_location: &str,
        end_location: &str,
    ) -> JourneyResult<Journey> {
        require_role(actor, Role::Child)?;
        let start_location = text_field("start_location", start_location)?;
        let end_location = text_field("end_location", end_location)?;

        let child = self
            .store
            .get_user(actor.id)
            .await?
            .ok_or(JourneyError::NotFound("user"))?;
        let Some(parent_id) = child.parent_id else {
            return Err(JourneyError::validation(
                "parent_id",
                "account is not linked to a parent",
            ));
        };

        let now = self.clock.now();
        let journey = self
            .store
            .insert_started_journey(
                &NewJourney {
                    child_id: child.id,
                    parent_id,
                    start_location,
                    end_location,
                    status: JourneyStatus::Started,
                    started_at: Some(now),
                    expected_end_time: None,
                    duration_minutes: None,
                },
                now,
            )
            .await?
            .ok_or_else(|| JourneyError::conflict(ALREADY_ACTIVE))?;

        info!("Started ad-hoc journey {} for child {}", journey.id, child.id);
        Ok(journey)
    }

    /// Child starts a scheduled journey, or an ad-hoc one when no id is given.
    pub async fn start_journey(&self, actor: &Actor, req: StartJourney) -> JourneyResult<Journey> {
        require_role(actor, Role::Child)?;

        let Some(journey_id) = req.journey_id else {
            let start = req
                .start_location
                .ok_or_else(|| JourneyError::validation("start_location", "is required"))?;
            let end = req
                .end_location
                .ok_or_else(|| JourneyError::validation("end_location", "is required"))?;
            return self.create_ad_hoc_journey(actor, &start, &end).await;
        };

        if let Some(active) = self.store.active_journey(actor.id).await? {
            info!(
                "Child {} tried to start {} while {} is active",
                actor.id, journey_id, active.id
            );
            return Err(JourneyError::conflict(ALREADY_ACTIVE));
        }

        let journey = self
            .store
            .get_journey(journey_id)
            .await?
            .filter(|j| j.child_id == actor.id)
            .ok_or(JourneyError::NotFound("journey"))?;
        if journey.status != JourneyStatus::Scheduled {
            return Err(JourneyError::conflict(
                "Only scheduled journeys can be started",
            ));
        }

        let now = self.clock.now();
        let expected_end_time = expected_end(now, journey.duration_minutes);
        let started = self
            .store
            .start_scheduled_journey(journey.id, actor.id, now, expected_end_time)
            .await?
            // Lost a race with another start for this child.
            .ok_or_else(|| JourneyError::conflict(ALREADY_ACTIVE))?;

        info!(
            "Started journey {} for child {}, expected end {:?}",
            started.id, actor.id, started.expected_end_time
        );
        Ok(started)
    }

    /// Child stops their current journey.
    pub async fn stop_journey(&self, actor: &Actor) -> JourneyResult<Journey> {
        require_role(actor, Role::Child)?;

        let active = self
            .store
            .active_journey(actor.id)
            .await?
            .ok_or(JourneyError::NotFound("active journey"))?;

        let now = self.clock.now();
        let ended_at = active.started_at.map_or(now, |started| started.max(now));
        let patch = JourneyPatch {
            status: Some(JourneyStatus::Stopped),
            ended_at: Some(ended_at),
            ..JourneyPatch::default()
        };
        let stopped = self
            .store
            .update_journey(active.id, Some(JourneyStatus::Started), &patch)
            .await?
            .ok_or(JourneyError::NotFound("active journey"))?;

        info!("Stopped journey {} for child {}", stopped.id, actor.id);
        Ok(stopped)
    }

    /// Parent edits route or time budget of a journey that has not started.
    pub async fn update_scheduled_journey(
        &self,
        actor: &Actor,
        journey_id: Uuid,
        fields: JourneyPatch,
    ) -> JourneyResult<Journey> {
        require_role(actor, Role::Parent)?;

        let journey = self
            .store
            .get_journey(journey_id)
            .await?
            .filter(|j| j.parent_id == actor.id)
            .ok_or(JourneyError::NotFound("journey"))?;
        if journey.status != JourneyStatus::Scheduled {
            return Err(JourneyError::conflict(
                "Only scheduled journeys can be edited",
            ));
        }

        let patch = editable_fields(&fields)?;
        if patch.is_empty() {
            return Ok(journey);
        }

        self.store
            .update_journey(journey.id, Some(JourneyStatus::Scheduled), &patch)
            .await?
            .ok_or_else(|| JourneyError::conflict("Only scheduled journeys can be edited"))
    }

    /// Admin override. Sets status and fields with no transition checks, so
    /// it can leave a child with several started journeys.
    pub async fn admin_set_journey(
        &self,
        actor: &Actor,
        journey_id: Uuid,
        fields: JourneyPatch,
    ) -> JourneyResult<Journey> {
        require_role(actor, Role::Admin)?;

        let mut patch = editable_fields(&fields)?;
        patch.status = fields.status;

        let journey = self
            .store
            .update_journey(journey_id, None, &patch)
            .await?
            .ok_or(JourneyError::NotFound("journey"))?;

        info!(
            "Admin {} set journey {} (status {})",
            actor.id, journey.id, journey.status
        );
        if journey.status == JourneyStatus::Started {
            let started = self
                .store
                .count_journeys(
                    &JourneyFilter::for_child(journey.child_id)
                        .with_statuses(&[JourneyStatus::Started]),
                )
                .await?;
            if started > 1 {
                warn!(
                    "Child {} now has {} started journeys after admin edit of {}",
                    journey.child_id, started, journey.id
                );
            }
        }
        Ok(journey)
    }

    /// Owning parent, owning child or an admin removes a journey in any state.
    pub async fn delete_journey(&self, actor: &Actor, journey_id: Uuid) -> JourneyResult<()> {
        let journey = self.visible_journey(actor, journey_id).await?;

        if !self.store.delete_journey(journey.id).await? {
            return Err(JourneyError::NotFound("journey"));
        }
        if let Some(path) = &journey.document_path {
            self.remove_document(path).await;
        }

        info!("Journey {} deleted by {} {}", journey.id, actor.role, actor.id);
        Ok(())
    }

    /// Records the stored document for a journey, replacing any previous one.
    pub async fn attach_document(
        &self,
        actor: &Actor,
        journey_id: Uuid,
        path: &str,
    ) -> JourneyResult<Journey> {
        let journey = self.visible_journey(actor, journey_id).await?;
        let path = path.trim();
        if path.is_empty() {
            return Err(JourneyError::validation("document_path", "must not be blank"));
        }

        let patch = JourneyPatch {
            document_path: Some(path.to_string()),
            ..JourneyPatch::default()
        };
        let updated = self
            .store
            .update_journey(journey.id, None, &patch)
            .await?
            .ok_or(JourneyError::NotFound("journey"))?;

        if let Some(previous) = journey.document_path.as_deref().filter(|p| *p != path) {
            self.remove_document(previous).await;
        }
        Ok(updated)
    }

    pub(super) async fn remove_document(&self, path: &str) {
        if let Err(e) = self.documents.delete(path).await {
            warn!("Failed to delete journey document {}: {}", path, e);
        }
    }
}

/// Route and time budget from `fields`, validated. Everything else is dropped.
fn editable_fields(fields: &JourneyPatch) -> JourneyResult<JourneyPatch> {
    Ok(JourneyPatch {
        start_location: fields
            .start_location
            .as_deref()
            .map(|v| text_field("start_location", v))
            .transpose()?,
        end_location: fields
            .end_location
            .as_deref()
            .map(|v| text_field("end_location", v))
            .transpose()?,
        duration_minutes: fields.duration_minutes.map(duration_field).transpose()?,
        ..JourneyPatch::default()
    })
}
