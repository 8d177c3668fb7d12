use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JourneyStatus {
    Scheduled,
    Started,
    Completed,
    Stopped,
}

impl JourneyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Started => "started",
            Self::Completed => "completed",
            Self::Stopped => "stopped",
        }
    }
}

impl std::fmt::Display for JourneyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for JourneyStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "scheduled" => Ok(Self::Scheduled),
            // Older rows written by the parent quick-start path used "active".
            "started" | "active" => Ok(Self::Started),
            "completed" => Ok(Self::Completed),
            "stopped" => Ok(Self::Stopped),
            _ => Err(format!("Unknown journey status: {}", s)),
        }
    }
}

impl TryFrom<String> for JourneyStatus {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Journey {
    pub id: Uuid,
    pub child_id: Uuid,
    pub parent_id: Uuid,
    pub start_location: String,
    pub end_location: String,
    #[sqlx(try_from = "String")]
    pub status: JourneyStatus,
    pub started_at: Option<NaiveDateTime>,
    pub ended_at: Option<NaiveDateTime>,
    pub expected_end_time: Option<NaiveDateTime>,
    pub duration_minutes: Option<i32>,
    pub document_path: Option<String>,
    pub created_at: NaiveDateTime,
}

impl Journey {
    pub fn is_overdue_at(&self, now: NaiveDateTime) -> bool {
        self.status == JourneyStatus::Started
            && self.expected_end_time.is_some_and(|end| end < now)
    }
}

/// Expected end of a journey that starts at `started_at` with an optional
/// time budget.
pub fn expected_end(started_at: NaiveDateTime, duration_minutes: Option<i32>) -> Option<NaiveDateTime> {
    duration_minutes.map(|minutes| started_at + Duration::minutes(i64::from(minutes)))
}

#[derive(Debug, Clone)]
pub struct NewJourney {
    pub child_id: Uuid,
    pub parent_id: Uuid,
    pub start_location: String,
    pub end_location: String,
    pub status: JourneyStatus,
    pub started_at: Option<NaiveDateTime>,
    pub expected_end_time: Option<NaiveDateTime>,
    pub duration_minutes: Option<i32>,
}

/// Field changes applied to a journey row. `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct JourneyPatch {
    pub start_location: Option<String>,
    pub end_location: Option<String>,
    pub duration_minutes: Option<i32>,
    pub status: Option<JourneyStatus>,
    #[serde(skip)]
    pub ended_at: Option<NaiveDateTime>,
    #[serde(skip)]
    pub document_path: Option<String>,
}

impl JourneyPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn apply(&self, journey: &mut Journey) {
        if let Some(start) = &self.start_location {
            journey.start_location = start.clone();
        }
        if let Some(end) = &self.end_location {
            journey.end_location = end.clone();
        }
        if let Some(minutes) = self.duration_minutes {
            journey.duration_minutes = Some(minutes);
        }
        if let Some(status) = self.status {
            journey.status = status;
        }
        if let Some(ended_at) = self.ended_at {
            journey.ended_at = Some(ended_at);
        }
        if let Some(path) = &self.document_path {
            journey.document_path = Some(path.clone());
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct JourneyFilter {
    pub child_ids: Option<Vec<Uuid>>,
    pub parent_id: Option<Uuid>,
    pub statuses: Option<Vec<JourneyStatus>>,
    /// Case-insensitive fragment of the child's name. Needs the users table,
    /// so `matches` leaves it to the store.
    pub child_name: Option<String>,
}

impl JourneyFilter {
    pub fn for_child(child_id: Uuid) -> Self {
        Self {
            child_ids: Some(vec![child_id]),
            ..Self::default()
        }
    }

    pub fn with_statuses(mut self, statuses: &[JourneyStatus]) -> Self {
        self.statuses = Some(statuses.to_vec());
        self
    }

    pub fn matches(&self, journey: &Journey) -> bool {
        self.child_ids
            .as_ref()
            .map_or(true, |ids| ids.contains(&journey.child_id))
            && self.parent_id.map_or(true, |id| journey.parent_id == id)
            && self
                .statuses
                .as_ref()
                .map_or(true, |statuses| statuses.contains(&journey.status))
    }

    /// Column values to match, including the legacy "active" spelling.
    pub(crate) fn status_names(&self) -> Option<Vec<String>> {
        self.statuses.as_ref().map(|statuses| {
            let mut names: Vec<String> =
                statuses.iter().map(|s| s.as_str().to_string()).collect();
            if statuses.contains(&JourneyStatus::Started) {
                names.push("active".to_string());
            }
            names
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 2, 9)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn legacy_active_spelling_reads_as_started() {
        assert_eq!("active".parse::<JourneyStatus>(), Ok(JourneyStatus::Started));
        assert_eq!(
            JourneyStatus::try_from("stopped".to_string()),
            Ok(JourneyStatus::Stopped)
        );
        assert!("paused".parse::<JourneyStatus>().is_err());
        assert_eq!(JourneyStatus::Started.as_str(), "started");
    }

    #[test]
    fn expected_end_adds_duration() {
        assert_eq!(expected_end(at(8, 0), Some(30)), Some(at(8, 30)));
        assert_eq!(expected_end(at(8, 0), None), None);
    }

    #[test]
    fn patch_from_json_ignores_server_side_fields() {
        let patch: JourneyPatch =
            serde_json::from_str(r#"{"status":"completed","duration_minutes":15}"#).unwrap();
        assert_eq!(patch.status, Some(JourneyStatus::Completed));
        assert_eq!(patch.duration_minutes, Some(15));
        assert!(patch.ended_at.is_none());
        assert!(!patch.is_empty());
        assert!(JourneyPatch::default().is_empty());
    }
}
