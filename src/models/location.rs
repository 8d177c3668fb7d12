use chrono::NaiveDateTime;
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Location {
    pub id: i64, // bigserial
    pub journey_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    pub recorded_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct NewLocation {
    pub journey_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    pub recorded_at: NaiveDateTime,
}
