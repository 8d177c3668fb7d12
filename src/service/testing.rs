use super::JourneyService;
use crate::clock::FixedClock;
use crate::db::{JourneyStore, MemoryStore};
use crate::documents::{DocumentError, DocumentStore};
use crate::models::request::ScheduleJourney;
use crate::models::{Actor, Journey, NewUser, Role};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Remembers which documents were deleted.
#[derive(Default)]
pub(crate) struct RecordingDocuments {
    pub deleted: Mutex<Vec<String>>,
}

#[async_trait]
impl DocumentStore for RecordingDocuments {
    async fn delete(&self, path: &str) -> Result<(), DocumentError> {
        self.deleted.lock().unwrap().push(path.to_string());
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool, DocumentError> {
        Ok(!self.deleted.lock().unwrap().iter().any(|p| p == path))
    }
}

pub(crate) fn t0() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 2, 9)
        .unwrap()
        .and_hms_opt(8, 0, 0)
        .unwrap()
}

pub(crate) fn minutes(n: i64) -> chrono::Duration {
    chrono::Duration::minutes(n)
}

pub(crate) struct Fixture {
    pub service: JourneyService,
    pub store: Arc<MemoryStore>,
    pub clock: Arc<FixedClock>,
    pub docs: Arc<RecordingDocuments>,
    pub admin: Actor,
    pub parent: Actor,
    pub child: Actor,
}

impl Fixture {
    pub async fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(FixedClock::new(t0()));
        let docs = Arc::new(RecordingDocuments::default());
        let service = JourneyService::new(store.clone(), clock.clone(), docs.clone());

        let admin = add_user(&store, "Admin", Role::Admin, None).await;
        let parent = add_user(&store, "Priya", Role::Parent, None).await;
        let child = add_user(&store, "Chintu", Role::Child, Some(parent.id)).await;

        Self {
            service,
            store,
            clock,
            docs,
            admin,
            parent,
            child,
        }
    }

    pub async fn add_user(&self, name: &str, role: Role, parent_id: Option<Uuid>) -> Actor {
        add_user(&self.store, name, role, parent_id).await
    }

    /// Home → School scheduled by the fixture parent for the fixture child.
    pub async fn schedule(&self, duration_minutes: i32) -> Journey {
        self.service
            .create_scheduled_journey(
                &self.parent,
                ScheduleJourney {
                    child_id: self.child.id,
                    start_location: "Home".to_string(),
                    end_location: "School".to_string(),
                    duration_minutes,
                },
            )
            .await
            .unwrap()
    }

    pub async fn journey(&self, id: Uuid) -> Option<Journey> {
        self.store.get_journey(id).await.unwrap()
    }
}

async fn add_user(store: &MemoryStore, name: &str, role: Role, parent_id: Option<Uuid>) -> Actor {
    let user = store
        .insert_user(
            &NewUser {
                name: name.to_string(),
                email: format!("{}-{}@example.com", name.to_lowercase(), Uuid::new_v4()),
                password_hash: "$2y$10$hash".to_string(),
                role,
                parent_id,
            },
            t0(),
        )
        .await
        .unwrap();
    user.actor()
}
