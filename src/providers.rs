//! Where an SOS gets its position and wording when the child sends neither.

use crate::db::JourneyStore;
use crate::models::Journey;
use anyhow::Result;
use async_trait::async_trait;
use rand::seq::SliceRandom;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct SosLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub address: String,
}

#[async_trait]
pub trait LocationProvider: Send + Sync {
    /// Best known position of the child, if this source has one.
    async fn locate(&self, child_id: Uuid, journey: Option<&Journey>)
        -> Result<Option<SosLocation>>;
}

pub trait MessageProvider: Send + Sync {
    fn message(&self) -> String;
}

pub const LAST_KNOWN_ADDRESS: &str = "Last recorded position";

/// Latest position recorded on the child's started journey.
pub struct LastKnownLocation {
    store: Arc<dyn JourneyStore>,
}

impl LastKnownLocation {
    pub fn new(store: Arc<dyn JourneyStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl LocationProvider for LastKnownLocation {
    async fn locate(
        &self,
        _child_id: Uuid,
        journey: Option<&Journey>,
    ) -> Result<Option<SosLocation>> {
        let Some(journey) = journey else {
            return Ok(None);
        };
        let latest = self.store.latest_location(journey.id).await?;
        Ok(latest.map(|l| SosLocation {
            latitude: l.latitude,
            longitude: l.longitude,
            address: LAST_KNOWN_ADDRESS.to_string(),
        }))
    }
}

pub const DEMO_LOCATIONS: [(f64, f64, &str); 10] = [
    (28.6139, 77.2090, "New Delhi, India"),
    (19.0760, 72.8777, "Mumbai, Maharashtra"),
    (12.9716, 77.5946, "Bangalore, Karnataka"),
    (13.0827, 80.2707, "Chennai, Tamil Nadu"),
    (22.5726, 88.3639, "Kolkata, West Bengal"),
    (17.3850, 78.4867, "Hyderabad, Telangana"),
    (23.0225, 72.5714, "Ahmedabad, Gujarat"),
    (26.9124, 75.7873, "Jaipur, Rajasthan"),
    (18.5204, 73.8567, "Pune, Maharashtra"),
    (11.0168, 76.9558, "Coimbatore, Tamil Nadu"),
];

/// Demo scaffolding: a random city from a fixed table. Never a real fix.
#[derive(Debug, Default, Clone, Copy)]
pub struct DemoLocations;

#[async_trait]
impl LocationProvider for DemoLocations {
    async fn locate(
        &self,
        _child_id: Uuid,
        _journey: Option<&Journey>,
    ) -> Result<Option<SosLocation>> {
        let picked = DEMO_LOCATIONS.choose(&mut rand::thread_rng()).map(
            |&(latitude, longitude, address)| SosLocation {
                latitude,
                longitude,
                address: address.to_string(),
            },
        );
        Ok(picked)
    }
}

/// Asks `primary` first and `fallback` when it has nothing or fails.
pub struct FallbackLocations {
    primary: Arc<dyn LocationProvider>,
    fallback: Arc<dyn LocationProvider>,
}

impl FallbackLocations {
    pub fn new(primary: Arc<dyn LocationProvider>, fallback: Arc<dyn LocationProvider>) -> Self {
        Self { primary, fallback }
    }
}

#[async_trait]
impl LocationProvider for FallbackLocations {
    async fn locate(
        &self,
        child_id: Uuid,
        journey: Option<&Journey>,
    ) -> Result<Option<SosLocation>> {
        match self.primary.locate(child_id, journey).await {
            Ok(Some(found)) => return Ok(Some(found)),
            Ok(None) => {}
            Err(e) => warn!("Primary location source failed for child {}: {}", child_id, e),
        }
        self.fallback.locate(child_id, journey).await
    }
}

pub const DEFAULT_SOS_MESSAGES: [&str; 5] = [
    "SOS! I need help immediately!",
    "I am in danger, please assist!",
    "Emergency! Child is in trouble!",
    "Help! I am unsafe!",
    "Alert! Child needs urgent help!",
];

#[derive(Debug, Default, Clone, Copy)]
pub struct CannedMessages;

impl MessageProvider for CannedMessages {
    fn message(&self) -> String {
        DEFAULT_SOS_MESSAGES
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(DEFAULT_SOS_MESSAGES[0])
            .to_string()
    }
}
