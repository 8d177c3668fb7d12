use crate::db::store::{JourneyOrder, JourneyStore};
use crate::models::{
    Alert, Journey, JourneyFilter, JourneyPatch, JourneyStatus, Location, NewAlert, NewJourney,
    NewLocation, NewUser, Role, User, UserPatch,
};
use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use std::cmp::Reverse;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

#[derive(Debug, Default)]
struct Tables {
    users: Vec<User>,
    journeys: Vec<Journey>,
    alerts: Vec<Alert>,
    locations: Vec<Location>,
    next_location_id: i64,
}

impl Tables {
    fn has_started(&self, child_id: Uuid) -> bool {
        self.journeys
            .iter()
            .any(|j| j.child_id == child_id && j.status == JourneyStatus::Started)
    }

    fn journey_matches(&self, filter: &JourneyFilter, journey: &Journey) -> bool {
        if !filter.matches(journey) {
            return false;
        }
        let Some(fragment) = &filter.child_name else {
            return true;
        };
        let fragment = fragment.to_lowercase();
        self.users
            .iter()
            .any(|u| u.id == journey.child_id && u.name.to_lowercase().contains(&fragment))
    }

    fn drop_journeys<F: Fn(&Journey) -> bool>(&mut self, doomed: F) {
        let ids: Vec<Uuid> = self
            .journeys
            .iter()
            .filter(|j| doomed(j))
            .map(|j| j.id)
            .collect();
        self.journeys.retain(|j| !ids.contains(&j.id));
        // Alerts outlive their journey.
        for alert in self
            .alerts
            .iter_mut()
            .filter(|a| a.journey_id.is_some_and(|id| ids.contains(&id)))
        {
            alert.journey_id = None;
        }
        self.locations.retain(|l| !ids.contains(&l.journey_id));
    }
}

fn build_journey(journey: &NewJourney, created_at: NaiveDateTime) -> Journey {
    Journey {
        id: Uuid::new_v4(),
        child_id: journey.child_id,
        parent_id: journey.parent_id,
        start_location: journey.start_location.clone(),
        end_location: journey.end_location.clone(),
        status: journey.status,
        started_at: journey.started_at,
        ended_at: None,
        expected_end_time: journey.expected_end_time,
        duration_minutes: journey.duration_minutes,
        document_path: None,
        created_at,
    }
}

fn build_alert(alert: &NewAlert, created_at: NaiveDateTime) -> Alert {
    Alert {
        id: Uuid::new_v4(),
        journey_id: alert.journey_id,
        child_id: alert.child_id,
        alert_type: alert.alert_type,
        message: alert.message.clone(),
        latitude: alert.latitude,
        longitude: alert.longitude,
        location_address: alert.location_address.clone(),
        created_at,
    }
}

fn sort_journeys(journeys: &mut [Journey], order: JourneyOrder) {
    match order {
        JourneyOrder::CreatedDesc => journeys.sort_by_key(|j| Reverse(j.created_at)),
        JourneyOrder::StartedDesc => journeys.sort_by_key(|j| {
            // None sorts before Some, so never-started journeys land last.
            (Reverse(j.started_at), Reverse(j.created_at))
        }),
    }
}

fn child_filter(child_ids: Option<&[Uuid]>, child_id: Uuid) -> bool {
    child_ids.map_or(true, |ids| ids.contains(&child_id))
}

/// Process-local store. One mutex over every table, so each call is atomic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl JourneyStore for MemoryStore {
    async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        Ok(self.lock().users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self.lock().users.iter().find(|u| u.email == email).cloned())
    }

    async fn update_user(&self, id: Uuid, patch: &UserPatch) -> Result<Option<User>> {
        let mut tables = self.lock();
        if let Some(email) = &patch.email {
            if tables.users.iter().any(|u| u.id != id && &u.email == email) {
                bail!("duplicate email: {}", email);
            }
        }
        let Some(user) = tables.users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        if let Some(name) = &patch.name {
            user.name = name.clone();
        }
        if let Some(email) = &patch.email {
            user.email = email.clone();
        }
        Ok(Some(user.clone()))
    }

    async fn insert_user(&self, user: &NewUser, created_at: NaiveDateTime) -> Result<User> {
        let mut tables = self.lock();
        if tables.users.iter().any(|u| u.email == user.email) {
            bail!("duplicate email: {}", user.email);
        }
        let row = User {
            id: Uuid::new_v4(),
            name: user.name.clone(),
            email: user.email.clone(),
            password_hash: user.password_hash.clone(),
            role: user.role,
            parent_id: user.parent_id,
            created_at,
        };
        tables.users.push(row.clone());
        Ok(row)
    }

    async fn children_of(&self, parent_id: Uuid) -> Result<Vec<User>> {
        Ok(self
            .lock()
            .users
            .iter()
            .filter(|u| u.role == Role::Child && u.parent_id == Some(parent_id))
            .cloned()
            .collect())
    }

    async fn users_with_role(&self, role: Role) -> Result<Vec<User>> {
        Ok(self
            .lock()
            .users
            .iter()
            .filter(|u| u.role == role)
            .cloned()
            .collect())
    }

    async fn count_users(&self, role: Option<Role>) -> Result<i64> {
        let tables = self.lock();
        let count = tables
            .users
            .iter()
            .filter(|u| role.map_or(true, |r| u.role == r))
            .count();
        Ok(count as i64)
    }

    async fn set_parent(&self, child_id: Uuid, parent_id: Option<Uuid>) -> Result<bool> {
        let mut tables = self.lock();
        match tables.users.iter_mut().find(|u| u.id == child_id) {
            Some(user) => {
                user.parent_id = parent_id;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool> {
        let mut tables = self.lock();
        let before = tables.users.len();
        tables.users.retain(|u| u.id != id);
        if tables.users.len() == before {
            return Ok(false);
        }
        for user in tables.users.iter_mut().filter(|u| u.parent_id == Some(id)) {
            user.parent_id = None;
        }
        tables.drop_journeys(|j| j.child_id == id || j.parent_id == id);
        tables.alerts.retain(|a| a.child_id != id);
        Ok(true)
    }

    async fn get_journey(&self, id: Uuid) -> Result<Option<Journey>> {
        Ok(self.lock().journeys.iter().find(|j| j.id == id).cloned())
    }

    async fn insert_journey(
        &self,
        journey: &NewJourney,
        created_at: NaiveDateTime,
    ) -> Result<Journey> {
        let row = build_journey(journey, created_at);
        self.lock().journeys.push(row.clone());
        Ok(row)
    }

    async fn insert_started_journey(
        &self,
        journey: &NewJourney,
        created_at: NaiveDateTime,
    ) -> Result<Option<Journey>> {
        let mut tables = self.lock();
        if tables.has_started(journey.child_id) {
            return Ok(None);
        }
        let row = build_journey(journey, created_at);
        tables.journeys.push(row.clone());
        Ok(Some(row))
    }

    async fn start_scheduled_journey(
        &self,
        id: Uuid,
        child_id: Uuid,
        started_at: NaiveDateTime,
        expected_end_time: Option<NaiveDateTime>,
    ) -> Result<Option<Journey>> {
        let mut tables = self.lock();
        if tables.has_started(child_id) {
            return Ok(None);
        }
        let Some(journey) = tables.journeys.iter_mut().find(|j| {
            j.id == id && j.child_id == child_id && j.status == JourneyStatus::Scheduled
        }) else {
            return Ok(None);
        };
        journey.status = JourneyStatus::Started;
        journey.started_at = Some(started_at);
        journey.expected_end_time = expected_end_time;
        Ok(Some(journey.clone()))
    }

    async fn update_journey(
        &self,
        id: Uuid,
        required_status: Option<JourneyStatus>,
        patch: &JourneyPatch,
    ) -> Result<Option<Journey>> {
        let mut tables = self.lock();
        let Some(journey) = tables
            .journeys
            .iter_mut()
            .find(|j| j.id == id && required_status.map_or(true, |s| j.status == s))
        else {
            return Ok(None);
        };
        patch.apply(journey);
        Ok(Some(journey.clone()))
    }

    async fn delete_journey(&self, id: Uuid) -> Result<bool> {
        let mut tables = self.lock();
        let existed = tables.journeys.iter().any(|j| j.id == id);
        tables.drop_journeys(|j| j.id == id);
        Ok(existed)
    }

    async fn active_journey(&self, child_id: Uuid) -> Result<Option<Journey>> {
        Ok(self
            .lock()
            .journeys
            .iter()
            .filter(|j| j.child_id == child_id && j.status == JourneyStatus::Started)
            .max_by_key(|j| (j.started_at, j.created_at))
            .cloned())
    }

    async fn list_journeys(
        &self,
        filter: &JourneyFilter,
        order: JourneyOrder,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Journey>> {
        let mut journeys: Vec<Journey> = {
            let tables = self.lock();
            tables
                .journeys
                .iter()
                .filter(|j| tables.journey_matches(filter, j))
                .cloned()
                .collect()
        };
        sort_journeys(&mut journeys, order);
        Ok(journeys
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn count_journeys(&self, filter: &JourneyFilter) -> Result<i64> {
        let tables = self.lock();
        let count = tables
            .journeys
            .iter()
            .filter(|j| tables.journey_matches(filter, j))
            .count();
        Ok(count as i64)
    }

    async fn overdue_journeys(&self, now: NaiveDateTime) -> Result<Vec<Journey>> {
        let mut journeys: Vec<Journey> = self
            .lock()
            .journeys
            .iter()
            .filter(|j| j.is_overdue_at(now))
            .cloned()
            .collect();
        journeys.sort_by_key(|j| j.expected_end_time);
        Ok(journeys)
    }

    async fn get_alert(&self, id: Uuid) -> Result<Option<Alert>> {
        Ok(self.lock().alerts.iter().find(|a| a.id == id).cloned())
    }

    async fn insert_alert(&self, alert: &NewAlert, created_at: NaiveDateTime) -> Result<Alert> {
        let row = build_alert(alert, created_at);
        self.lock().alerts.push(row.clone());
        Ok(row)
    }

    async fn insert_overdue_alert(
        &self,
        journey: &Journey,
        created_at: NaiveDateTime,
    ) -> Result<Option<Alert>> {
        let mut tables = self.lock();
        if tables.alerts.iter().any(|a| a.is_overdue_for(journey.id)) {
            return Ok(None);
        }
        let row = build_alert(&NewAlert::overdue(journey.id, journey.child_id), created_at);
        tables.alerts.push(row.clone());
        Ok(Some(row))
    }

    async fn list_alerts(&self, child_ids: Option<&[Uuid]>, limit: i64) -> Result<Vec<Alert>> {
        let mut alerts: Vec<Alert> = self
            .lock()
            .alerts
            .iter()
            .filter(|a| child_filter(child_ids, a.child_id))
            .cloned()
            .collect();
        // Later inserts win ties on created_at.
        alerts.reverse();
        alerts.sort_by_key(|a| Reverse(a.created_at));
        alerts.truncate(limit.max(0) as usize);
        Ok(alerts)
    }

    async fn count_alerts(&self, child_ids: Option<&[Uuid]>) -> Result<i64> {
        let count = self
            .lock()
            .alerts
            .iter()
            .filter(|a| child_filter(child_ids, a.child_id))
            .count();
        Ok(count as i64)
    }

    async fn insert_location(&self, location: &NewLocation) -> Result<Location> {
        let mut tables = self.lock();
        if !tables.journeys.iter().any(|j| j.id == location.journey_id) {
            bail!("journey {} does not exist", location.journey_id);
        }
        tables.next_location_id += 1;
        let row = Location {
            id: tables.next_location_id,
            journey_id: location.journey_id,
            latitude: location.latitude,
            longitude: location.longitude,
            recorded_at: location.recorded_at,
        };
        tables.locations.push(row.clone());
        Ok(row)
    }

    async fn journey_locations(&self, journey_id: Uuid) -> Result<Vec<Location>> {
        let mut rows: Vec<Location> = self
            .lock()
            .locations
            .iter()
            .filter(|l| l.journey_id == journey_id)
            .cloned()
            .collect();
        rows.sort_by_key(|l| (l.recorded_at, l.id));
        Ok(rows)
    }

    async fn latest_location(&self, journey_id: Uuid) -> Result<Option<Location>> {
        Ok(self
            .lock()
            .locations
            .iter()
            .filter(|l| l.journey_id == journey_id)
            .max_by_key(|l| (l.recorded_at, l.id))
            .cloned())
    }
}
