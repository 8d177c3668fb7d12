use crate::models::{
    Alert, Journey, JourneyFilter, JourneyPatch, JourneyStatus, Location, NewAlert, NewJourney,
    NewLocation, NewUser, Role, User, UserPatch,
};
use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JourneyOrder {
    /// Newest created first.
    CreatedDesc,
    /// Most recently started first; never-started journeys last.
    StartedDesc,
}

/// Persistence for users, journeys, alerts and recorded locations.
///
/// Services never hold rows between calls: "the active journey" and similar
/// lookups are re-queried every time. The two guarded writes
/// (`insert_started_journey`, `start_scheduled_journey`) and
/// `insert_overdue_alert` must perform their existence check and write as one
/// unit against concurrent callers.
#[async_trait]
pub trait JourneyStore: Send + Sync {
    // ── Users ──

    async fn get_user(&self, id: Uuid) -> Result<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn insert_user(&self, user: &NewUser, created_at: NaiveDateTime) -> Result<User>;
    async fn children_of(&self, parent_id: Uuid) -> Result<Vec<User>>;
    async fn users_with_role(&self, role: Role) -> Result<Vec<User>>;
    async fn count_users(&self, role: Option<Role>) -> Result<i64>;
    /// Returns `None` if the user does not exist. Fails on a duplicate email.
    async fn update_user(&self, id: Uuid, patch: &UserPatch) -> Result<Option<User>>;
    /// Returns false if the user does not exist.
    async fn set_parent(&self, child_id: Uuid, parent_id: Option<Uuid>) -> Result<bool>;
    /// Removes the user. Their journeys, alerts and locations go with them and
    /// any children are unlinked.
    async fn delete_user(&self, id: Uuid) -> Result<bool>;

    // ── Journeys ──

    async fn get_journey(&self, id: Uuid) -> Result<Option<Journey>>;
    async fn insert_journey(&self, journey: &NewJourney, created_at: NaiveDateTime)
        -> Result<Journey>;
    /// Inserts a journey in `started` state unless the child already has one.
    /// Returns `None` when the child was busy.
    async fn insert_started_journey(
        &self,
        journey: &NewJourney,
        created_at: NaiveDateTime,
    ) -> Result<Option<Journey>>;
    /// Moves a scheduled journey owned by `child_id` to `started` unless the
    /// child already has a started journey. Returns `None` when the guard fails.
    async fn start_scheduled_journey(
        &self,
        id: Uuid,
        child_id: Uuid,
        started_at: NaiveDateTime,
        expected_end_time: Option<NaiveDateTime>,
    ) -> Result<Option<Journey>>;
    /// Applies `patch`, optionally only while the journey is in
    /// `required_status`. Returns `None` if no row matched.
    async fn update_journey(
        &self,
        id: Uuid,
        required_status: Option<JourneyStatus>,
        patch: &JourneyPatch,
    ) -> Result<Option<Journey>>;
    /// Drops the journey and its locations. Its alerts stay, detached.
    async fn delete_journey(&self, id: Uuid) -> Result<bool>;
    /// The child's most recently started journey still in `started`.
    async fn active_journey(&self, child_id: Uuid) -> Result<Option<Journey>>;
    async fn list_journeys(
        &self,
        filter: &JourneyFilter,
        order: JourneyOrder,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Journey>>;
    async fn count_journeys(&self, filter: &JourneyFilter) -> Result<i64>;
    /// Started journeys whose expected end is strictly before `now`.
    async fn overdue_journeys(&self, now: NaiveDateTime) -> Result<Vec<Journey>>;

    // ── Alerts ──

    async fn get_alert(&self, id: Uuid) -> Result<Option<Alert>>;
    async fn insert_alert(&self, alert: &NewAlert, created_at: NaiveDateTime) -> Result<Alert>;
    /// Inserts the overdue alert for `journey` unless one already exists.
    async fn insert_overdue_alert(
        &self,
        journey: &Journey,
        created_at: NaiveDateTime,
    ) -> Result<Option<Alert>>;
    /// Newest first. `None` means every child.
    async fn list_alerts(&self, child_ids: Option<&[Uuid]>, limit: i64) -> Result<Vec<Alert>>;
    async fn count_alerts(&self, child_ids: Option<&[Uuid]>) -> Result<i64>;

    // ── Locations ──

    async fn insert_location(&self, location: &NewLocation) -> Result<Location>;
    /// Oldest first.
    async fn journey_locations(&self, journey_id: Uuid) -> Result<Vec<Location>>;
    async fn latest_location(&self, journey_id: Uuid) -> Result<Option<Location>>;
}
