use crate::db::queries;
use crate::db::store::{JourneyOrder, JourneyStore};
use crate::db::DbPool;
use crate::models::alert::OVERDUE_MARKER;
use crate::models::{
    Alert, Journey, JourneyFilter, JourneyPatch, JourneyStatus, Location, NewAlert,
    NewJourney, NewLocation, NewUser, Role, User, UserPatch,
};
use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::{Postgres, Transaction};
use tracing::debug;
use uuid::Uuid;

/// Postgres-backed store. Guarded writes lock the child's user row (or an
/// advisory key per journey) for the length of the check and the write.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Locks the child and reports whether they already have a started journey.
    async fn lock_child(tx: &mut Transaction<'_, Postgres>, child_id: Uuid) -> Result<bool> {
        sqlx::query(queries::LOCK_CHILD)
            .bind(child_id)
            .fetch_optional(&mut **tx)
            .await?;

        let busy = sqlx::query_scalar::<_, bool>(queries::CHILD_HAS_STARTED_JOURNEY)
            .bind(child_id)
            .fetch_one(&mut **tx)
            .await?;
        Ok(busy)
    }
}

fn advisory_key(id: Uuid) -> i64 {
    let (hi, lo) = id.as_u64_pair();
    (hi ^ lo) as i64
}

fn new_journey_query<'q>(
    id: Uuid,
    journey: &'q NewJourney,
    created_at: NaiveDateTime,
) -> sqlx::query::QueryAs<'q, Postgres, Journey, sqlx::postgres::PgArguments> {
    sqlx::query_as::<_, Journey>(queries::INSERT_JOURNEY)
        .bind(id)
        .bind(journey.child_id)
        .bind(journey.parent_id)
        .bind(&journey.start_location)
        .bind(&journey.end_location)
        .bind(journey.status.as_str())
        .bind(journey.started_at)
        .bind(journey.expected_end_time)
        .bind(journey.duration_minutes)
        .bind(created_at)
}

fn new_alert_query<'q>(
    id: Uuid,
    alert: &'q NewAlert,
    created_at: NaiveDateTime,
) -> sqlx::query::QueryAs<'q, Postgres, Alert, sqlx::postgres::PgArguments> {
    sqlx::query_as::<_, Alert>(queries::INSERT_ALERT)
        .bind(id)
        .bind(alert.journey_id)
        .bind(alert.child_id)
        .bind(alert.alert_type.as_str())
        .bind(&alert.message)
        .bind(alert.latitude)
        .bind(alert.longitude)
        .bind(&alert.location_address)
        .bind(created_at)
}

#[async_trait]
impl JourneyStore for PgStore {
    async fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(queries::SELECT_USER)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(queries::SELECT_USER_BY_EMAIL)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn update_user(&self, id: Uuid, patch: &UserPatch) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(queries::UPDATE_USER_PROFILE)
            .bind(id)
            .bind(&patch.name)
            .bind(&patch.email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn insert_user(&self, user: &NewUser, created_at: NaiveDateTime) -> Result<User> {
        let user = sqlx::query_as::<_, User>(queries::INSERT_USER)
            .bind(Uuid::new_v4())
            .bind(&user.name)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.role.as_str())
            .bind(user.parent_id)
            .bind(created_at)
            .fetch_one(&self.pool)
            .await?;
        Ok(user)
    }

    async fn children_of(&self, parent_id: Uuid) -> Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(queries::SELECT_CHILDREN)
            .bind(parent_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    async fn users_with_role(&self, role: Role) -> Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>(queries::SELECT_USERS_WITH_ROLE)
            .bind(role.as_str())
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    async fn count_users(&self, role: Option<Role>) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(queries::COUNT_USERS)
            .bind(role.map(|r| r.as_str()))
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn set_parent(&self, child_id: Uuid, parent_id: Option<Uuid>) -> Result<bool> {
        let result = sqlx::query(queries::UPDATE_USER_PARENT)
            .bind(child_id)
            .bind(parent_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_user(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query(queries::DELETE_USER)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_journey(&self, id: Uuid) -> Result<Option<Journey>> {
        let journey = sqlx::query_as::<_, Journey>(queries::SELECT_JOURNEY)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(journey)
    }

    async fn insert_journey(
        &self,
        journey: &NewJourney,
        created_at: NaiveDateTime,
    ) -> Result<Journey> {
        let row = new_journey_query(Uuid::new_v4(), journey, created_at)
            .fetch_one(&self.pool)
            .await?;
        Ok(row)
    }

    async fn insert_started_journey(
        &self,
        journey: &NewJourney,
        created_at: NaiveDateTime,
    ) -> Result<Option<Journey>> {
        let mut tx = self.pool.begin().await?;

        if Self::lock_child(&mut tx, journey.child_id).await? {
            debug!("Child {} already has a started journey", journey.child_id);
            tx.rollback().await?;
            return Ok(None);
        }

        let row = new_journey_query(Uuid::new_v4(), journey, created_at)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(row))
    }

    async fn start_scheduled_journey(
        &self,
        id: Uuid,
        child_id: Uuid,
        started_at: NaiveDateTime,
        expected_end_time: Option<NaiveDateTime>,
    ) -> Result<Option<Journey>> {
        let mut tx = self.pool.begin().await?;

        if Self::lock_child(&mut tx, child_id).await? {
            debug!("Child {} already has a started journey", child_id);
            tx.rollback().await?;
            return Ok(None);
        }

        let row = sqlx::query_as::<_, Journey>(queries::START_SCHEDULED_JOURNEY)
            .bind(id)
            .bind(child_id)
            .bind(started_at)
            .bind(expected_end_time)
            .fetch_optional(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(row)
    }

    async fn update_journey(
        &self,
        id: Uuid,
        required_status: Option<JourneyStatus>,
        patch: &JourneyPatch,
    ) -> Result<Option<Journey>> {
        let row = sqlx::query_as::<_, Journey>(queries::UPDATE_JOURNEY)
            .bind(id)
            .bind(&patch.start_location)
            .bind(&patch.end_location)
            .bind(patch.duration_minutes)
            .bind(patch.status.map(|s| s.as_str()))
            .bind(patch.ended_at)
            .bind(&patch.document_path)
            .bind(required_status.map(|s| s.as_str()))
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn delete_journey(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query(queries::DELETE_JOURNEY)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn active_journey(&self, child_id: Uuid) -> Result<Option<Journey>> {
        let journey = sqlx::query_as::<_, Journey>(queries::SELECT_ACTIVE_JOURNEY)
            .bind(child_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(journey)
    }

    async fn list_journeys(
        &self,
        filter: &JourneyFilter,
        order: JourneyOrder,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Journey>> {
        let sql = match order {
            JourneyOrder::CreatedDesc => queries::SELECT_JOURNEYS_BY_CREATED,
            JourneyOrder::StartedDesc => queries::SELECT_JOURNEYS_BY_STARTED,
        };
        let journeys = sqlx::query_as::<_, Journey>(sql)
            .bind(&filter.child_ids)
            .bind(filter.parent_id)
            .bind(filter.status_names())
            .bind(&filter.child_name)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
        Ok(journeys)
    }

    async fn count_journeys(&self, filter: &JourneyFilter) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(queries::COUNT_JOURNEYS)
            .bind(&filter.child_ids)
            .bind(filter.parent_id)
            .bind(filter.status_names())
            .bind(&filter.child_name)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn overdue_journeys(&self, now: NaiveDateTime) -> Result<Vec<Journey>> {
        let journeys = sqlx::query_as::<_, Journey>(queries::SELECT_OVERDUE_JOURNEYS)
            .bind(now)
            .fetch_all(&self.pool)
            .await?;
        Ok(journeys)
    }

    async fn get_alert(&self, id: Uuid) -> Result<Option<Alert>> {
        let alert = sqlx::query_as::<_, Alert>(queries::SELECT_ALERT)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(alert)
    }

    async fn insert_alert(&self, alert: &NewAlert, created_at: NaiveDateTime) -> Result<Alert> {
        let row = new_alert_query(Uuid::new_v4(), alert, created_at)
            .fetch_one(&self.pool)
            .await?;
        Ok(row)
    }

    async fn insert_overdue_alert(
        &self,
        journey: &Journey,
        created_at: NaiveDateTime,
    ) -> Result<Option<Alert>> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(queries::LOCK_OVERDUE_JOURNEY)
            .bind(advisory_key(journey.id))
            .execute(&mut *tx)
            .await?;

        let already_alerted = sqlx::query_scalar::<_, bool>(queries::OVERDUE_ALERT_EXISTS)
            .bind(journey.id)
            .bind(OVERDUE_MARKER)
            .fetch_one(&mut *tx)
            .await?;

        if already_alerted {
            tx.rollback().await?;
            return Ok(None);
        }

        let alert = NewAlert::overdue(journey.id, journey.child_id);
        let row = new_alert_query(Uuid::new_v4(), &alert, created_at)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(row))
    }

    async fn list_alerts(&self, child_ids: Option<&[Uuid]>, limit: i64) -> Result<Vec<Alert>> {
        let alerts = sqlx::query_as::<_, Alert>(queries::SELECT_ALERTS)
            .bind(child_ids.map(|ids| ids.to_vec()))
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        Ok(alerts)
    }

    async fn count_alerts(&self, child_ids: Option<&[Uuid]>) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(queries::COUNT_ALERTS)
            .bind(child_ids.map(|ids| ids.to_vec()))
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn insert_location(&self, location: &NewLocation) -> Result<Location> {
        let row = sqlx::query_as::<_, Location>(queries::INSERT_LOCATION)
            .bind(location.journey_id)
            .bind(location.latitude)
            .bind(location.longitude)
            .bind(location.recorded_at)
            .fetch_one(&self.pool)
            .await?;
        Ok(row)
    }

    async fn journey_locations(&self, journey_id: Uuid) -> Result<Vec<Location>> {
        let rows = sqlx::query_as::<_, Location>(queries::SELECT_JOURNEY_LOCATIONS)
            .bind(journey_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn latest_location(&self, journey_id: Uuid) -> Result<Option<Location>> {
        let row = sqlx::query_as::<_, Location>(queries::SELECT_LATEST_LOCATION)
            .bind(journey_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }
}
