use crate::clock::Clock;
use crate::db::JourneyStore;
use crate::documents::DocumentStore;
use crate::error::{JourneyError, JourneyResult};
use crate::models::{Actor, Journey, Role};
use crate::providers::{
    CannedMessages, DemoLocations, FallbackLocations, LastKnownLocation, LocationProvider,
    MessageProvider,
};
use std::sync::Arc;

mod accounts;
mod dashboard;
mod history;
mod lifecycle;
mod overdue;
mod sos;
mod tracking;

#[cfg(test)]
mod testing;

pub use dashboard::{
    AdminDashboard, ChildDetails, ChildStats, ChildSummary, JourneyCounts, ParentDashboard,
    ParentSummary,
};
pub use history::{JourneyPage, ParentJourneyQuery, PER_PAGE};
pub use overdue::SweepReport;

const MAX_TEXT_LEN: usize = 255;

/// Journey lifecycle, SOS and overdue handling over a shared store.
///
/// Every operation takes the acting user; resolving who that is belongs to
/// the caller.
pub struct JourneyService {
    store: Arc<dyn JourneyStore>,
    clock: Arc<dyn Clock>,
    documents: Arc<dyn DocumentStore>,
    locations: Arc<dyn LocationProvider>,
    messages: Arc<dyn MessageProvider>,
}

impl JourneyService {
    /// Uses the last recorded position for SOS alerts, falling back to the
    /// demo city table.
    pub fn new(
        store: Arc<dyn JourneyStore>,
        clock: Arc<dyn Clock>,
        documents: Arc<dyn DocumentStore>,
    ) -> Self {
        let locations = Arc::new(FallbackLocations::new(
            Arc::new(LastKnownLocation::new(store.clone())),
            Arc::new(DemoLocations),
        ));
        Self {
            store,
            clock,
            documents,
            locations,
            messages: Arc::new(CannedMessages),
        }
    }

    pub fn with_location_provider(mut self, locations: Arc<dyn LocationProvider>) -> Self {
        self.locations = locations;
        self
    }

    pub fn with_message_provider(mut self, messages: Arc<dyn MessageProvider>) -> Self {
        self.messages = messages;
        self
    }

    /// Journey the actor may see, or `NotFound` whether it is missing or
    /// belongs to someone else.
    async fn visible_journey(&self, actor: &Actor, id: uuid::Uuid) -> JourneyResult<Journey> {
        let journey = self
            .store
            .get_journey(id)
            .await?
            .ok_or(JourneyError::NotFound("journey"))?;

        let visible = match actor.role {
            Role::Admin => true,
            Role::Parent => journey.parent_id == actor.id,
            Role::Child => journey.child_id == actor.id,
        };
        if visible {
            Ok(journey)
        } else {
            Err(JourneyError::NotFound("journey"))
        }
    }
}

fn require_role(actor: &Actor, role: Role) -> JourneyResult<()> {
    if actor.role == role {
        Ok(())
    } else {
        Err(JourneyError::Unauthorized)
    }
}

fn text_field(field: &'static str, value: &str) -> JourneyResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(JourneyError::validation(field, "must not be blank"));
    }
    if value.chars().count() > MAX_TEXT_LEN {
        return Err(JourneyError::validation(
            field,
            format!("must be at most {} characters", MAX_TEXT_LEN),
        ));
    }
    Ok(value.to_string())
}

fn email_field(value: &str) -> JourneyResult<String> {
    let value = text_field("email", value)?;
    let well_formed = value
        .split_once('@')
        .is_some_and(|(user, domain)| {
            !user.is_empty() && !domain.is_empty() && !domain.contains('@')
        })
        && !value.chars().any(char::is_whitespace);
    if !well_formed {
        return Err(JourneyError::validation("email", "must be a valid email address"));
    }
    Ok(value)
}

fn duration_field(minutes: i32) -> JourneyResult<i32> {
    if minutes < 1 {
        return Err(JourneyError::validation(
            "duration_minutes",
            "must be at least 1",
        ));
    }
    Ok(minutes)
}

fn coordinate_field(field: &'static str, value: f64) -> JourneyResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(JourneyError::validation(field, "must be a finite number"))
    }
}
