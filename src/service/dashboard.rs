use super::{require_role, JourneyService};
use crate::db::JourneyOrder;
use crate::error::{JourneyError, JourneyResult};
use crate::models::{Actor, Alert, Journey, JourneyFilter, JourneyStatus, Role, User};
use serde::Serialize;
use uuid::Uuid;

const FINISHED: [JourneyStatus; 2] = [JourneyStatus::Completed, JourneyStatus::Stopped];
const DETAIL_LIMIT: i64 = 5;

#[derive(Debug, Clone, Serialize)]
pub struct ParentDashboard {
    pub total_children: usize,
    pub active_journeys: i64,
    pub completed_journeys: i64,
    pub sos_alerts: i64,
    pub children: Vec<User>,
    /// Drives the parent's alert popup.
    pub latest_alert: Option<Alert>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChildStats {
    pub total_journeys: i64,
    pub completed_journeys: i64,
    pub alerts: i64,
    pub has_active_journey: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdminDashboard {
    pub total_users: i64,
    pub total_children: i64,
    pub total_journeys: i64,
    pub active_journeys: i64,
    pub completed_journeys: i64,
    pub sos_alerts: i64,
    pub latest_alert: Option<Alert>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JourneyCounts {
    pub total_journeys: i64,
    pub active_journeys: i64,
    pub completed_journeys: i64,
    pub alerts: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChildDetails {
    pub profile: User,
    pub stats: JourneyCounts,
    pub recent_journeys: Vec<Journey>,
    pub recent_alerts: Vec<Alert>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChildSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub parent_name: Option<String>,
    pub total_journeys: i64,
    pub sos_alerts: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParentSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub total_children: usize,
}

impl JourneyService {
    pub async fn parent_dashboard(&self, actor: &Actor) -> JourneyResult<ParentDashboard> {
        require_role(actor, Role::Parent)?;

        let children = self.store.children_of(actor.id).await?;
        let child_ids: Vec<Uuid> = children.iter().map(|c| c.id).collect();
        let family = JourneyFilter {
            child_ids: Some(child_ids.clone()),
            ..JourneyFilter::default()
        };

        let active_journeys = self
            .store
            .count_journeys(&family.clone().with_statuses(&[JourneyStatus::Started]))
            .await?;
        let completed_journeys = self
            .store
            .count_journeys(&family.with_statuses(&FINISHED))
            .await?;
        let sos_alerts = self.store.count_alerts(Some(child_ids.as_slice())).await?;
        let latest_alert = self
            .store
            .list_alerts(Some(child_ids.as_slice()), 1)
            .await?
            .into_iter()
            .next();

        Ok(ParentDashboard {
            total_children: children.len(),
            active_journeys,
            completed_journeys,
            sos_alerts,
            children,
            latest_alert,
        })
    }

    pub async fn child_stats(&self, actor: &Actor) -> JourneyResult<ChildStats> {
        require_role(actor, Role::Child)?;

        let own = JourneyFilter::for_child(actor.id);
        Ok(ChildStats {
            total_journeys: self.store.count_journeys(&own).await?,
            completed_journeys: self
                .store
                .count_journeys(&own.clone().with_statuses(&[JourneyStatus::Completed]))
                .await?,
            alerts: self.store.count_alerts(Some(&[actor.id][..])).await?,
            has_active_journey: self.store.active_journey(actor.id).await?.is_some(),
        })
    }

    /// A child's profile and activity, for their parent or an admin.
    pub async fn child_details(&self, actor: &Actor, child_id: Uuid) -> JourneyResult<ChildDetails> {
        let child = self
            .store
            .get_user(child_id)
            .await?
            .filter(|u| u.role == Role::Child)
            .ok_or(JourneyError::NotFound("child"))?;
        let allowed = match actor.role {
            Role::Admin => true,
            Role::Parent => child.parent_id == Some(actor.id),
            Role::Child => false,
        };
        if !allowed {
            return Err(JourneyError::Unauthorized);
        }

        let own = JourneyFilter::for_child(child.id);
        let stats = JourneyCounts {
            total_journeys: self.store.count_journeys(&own).await?,
            active_journeys: self
                .store
                .count_journeys(&own.clone().with_statuses(&[JourneyStatus::Started]))
                .await?,
            completed_journeys: self
                .store
                .count_journeys(&own.clone().with_statuses(&[JourneyStatus::Completed]))
                .await?,
            alerts: self.store.count_alerts(Some(&[child.id][..])).await?,
        };
        let recent_journeys = self
            .store
            .list_journeys(&own, JourneyOrder::CreatedDesc, DETAIL_LIMIT, 0)
            .await?;
        let recent_alerts = self
            .store
            .list_alerts(Some(&[child.id][..]), DETAIL_LIMIT)
            .await?;

        Ok(ChildDetails {
            profile: child,
            stats,
            recent_journeys,
            recent_alerts,
        })
    }

    pub async fn admin_dashboard(&self, actor: &Actor) -> JourneyResult<AdminDashboard> {
        require_role(actor, Role::Admin)?;

        let all = JourneyFilter::default();
        Ok(AdminDashboard {
            total_users: self.store.count_users(None).await?,
            total_children: self.store.count_users(Some(Role::Child)).await?,
            total_journeys: self.store.count_journeys(&all).await?,
            active_journeys: self
                .store
                .count_journeys(&all.clone().with_statuses(&[JourneyStatus::Started]))
                .await?,
            completed_journeys: self
                .store
                .count_journeys(&all.with_statuses(&FINISHED))
                .await?,
            sos_alerts: self.store.count_alerts(None).await?,
            latest_alert: self.store.list_alerts(None, 1).await?.into_iter().next(),
        })
    }

    pub async fn children_overview(&self, actor: &Actor) -> JourneyResult<Vec<ChildSummary>> {
        require_role(actor, Role::Admin)?;

        let parents = self.store.users_with_role(Role::Parent).await?;
        let mut summaries = Vec::new();
        for child in self.store.users_with_role(Role::Child).await? {
            let parent_name = child
                .parent_id
                .and_then(|id| parents.iter().find(|p| p.id == id))
                .map(|p| p.name.clone());
            summaries.push(ChildSummary {
                total_journeys: self
                    .store
                    .count_journeys(&JourneyFilter::for_child(child.id))
                    .await?,
                sos_alerts: self.store.count_alerts(Some(&[child.id][..])).await?,
                id: child.id,
                name: child.name,
                email: child.email,
                parent_name,
            });
        }
        Ok(summaries)
    }

    pub async fn parents_overview(&self, actor: &Actor) -> JourneyResult<Vec<ParentSummary>> {
        require_role(actor, Role::Admin)?;

        let mut summaries = Vec::new();
        for parent in self.store.users_with_role(Role::Parent).await? {
            summaries.push(ParentSummary {
                total_children: self.store.children_of(parent.id).await?.len(),
                id: parent.id,
                name: parent.name,
                email: parent.email,
            });
        }
        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{minutes, Fixture};
    use super::*;
    use crate::models::request::{SosRequest, StartJourney};

    async fn busy_family(fx: &Fixture) {
        let done = fx.schedule(10).await;
        fx.service
            .start_journey(
                &fx.child,
                StartJourney {
                    journey_id: Some(done.id),
                    ..StartJourney::default()
                },
            )
            .await
            .unwrap();
        fx.service.stop_journey(&fx.child).await.unwrap();
        fx.clock.advance(minutes(1));
        fx.service
            .create_ad_hoc_journey(&fx.child, "Home", "Friend's house")
            .await
            .unwrap();
        fx.clock.advance(minutes(1));
        fx.service
            .raise_sos(
                &fx.child,
                SosRequest {
                    message: Some("Phone battery low".into()),
                    ..SosRequest::default()
                },
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn parent_dashboard_counts_family_activity() {
        let fx = Fixture::new().await;
        busy_family(&fx).await;

        let dash = fx.service.parent_dashboard(&fx.parent).await.unwrap();
        assert_eq!(dash.total_children, 1);
        assert_eq!(dash.active_journeys, 1);
        assert_eq!(dash.completed_journeys, 1);
        assert_eq!(dash.sos_alerts, 1);
        assert_eq!(
            dash.latest_alert.map(|a| a.message).as_deref(),
            Some("Phone battery low")
        );

        let lonely = fx.add_user("Ravi", Role::Parent, None).await;
        let dash = fx.service.parent_dashboard(&lonely).await.unwrap();
        assert_eq!(dash.total_children, 0);
        assert_eq!(dash.sos_alerts, 0);
        assert!(dash.latest_alert.is_none());
    }

    #[tokio::test]
    async fn child_stats_and_details() {
        let fx = Fixture::new().await;
        busy_family(&fx).await;

        let stats = fx.service.child_stats(&fx.child).await.unwrap();
        assert_eq!(stats.total_journeys, 2);
        assert_eq!(stats.completed_journeys, 0);
        assert_eq!(stats.alerts, 1);
        assert!(stats.has_active_journey);

        let details = fx.service.child_details(&fx.parent, fx.child.id).await.unwrap();
        assert_eq!(details.stats.total_journeys, 2);
        assert_eq!(details.stats.active_journeys, 1);
        assert_eq!(details.recent_journeys.len(), 2);
        assert_eq!(details.recent_alerts.len(), 1);

        let stranger = fx.add_user("Ravi", Role::Parent, None).await;
        assert!(matches!(
            fx.service.child_details(&stranger, fx.child.id).await,
            Err(JourneyError::Unauthorized)
        ));
        assert!(fx.service.child_details(&fx.admin, fx.child.id).await.is_ok());
    }

    #[tokio::test]
    async fn admin_overviews() {
        let fx = Fixture::new().await;
        busy_family(&fx).await;
        fx.add_user("Solo", Role::Child, None).await;

        let dash = fx.service.admin_dashboard(&fx.admin).await.unwrap();
        assert_eq!(dash.total_users, 4);
        assert_eq!(dash.total_children, 2);
        assert_eq!(dash.total_journeys, 2);
        assert_eq!(dash.active_journeys, 1);
        assert_eq!(dash.completed_journeys, 1);
        assert_eq!(dash.sos_alerts, 1);

        let children = fx.service.children_overview(&fx.admin).await.unwrap();
        let linked = children.iter().find(|c| c.id == fx.child.id).unwrap();
        assert_eq!(linked.parent_name.as_deref(), Some("Priya"));
        assert_eq!(linked.total_journeys, 2);
        assert_eq!(linked.sos_alerts, 1);
        assert!(children.iter().any(|c| c.parent_name.is_none()));

        let parents = fx.service.parents_overview(&fx.admin).await.unwrap();
        assert_eq!(parents.len(), 1);
        assert_eq!(parents[0].total_children, 1);

        assert!(matches!(
            fx.service.admin_dashboard(&fx.parent).await,
            Err(JourneyError::Unauthorized)
        ));
    }
}
