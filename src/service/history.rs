use super::{require_role, JourneyService};
use crate::db::JourneyOrder;
use crate::error::{JourneyError, JourneyResult};
use crate::models::{Actor, Alert, Journey, JourneyFilter, JourneyStatus, Role};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const PER_PAGE: i64 = 10;
const RECENT_LIMIT: i64 = 10;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ParentJourneyQuery {
    pub status: Option<JourneyStatus>,
    pub child_id: Option<Uuid>,
    /// Matches any part of the child's name, ignoring case.
    pub search: Option<String>,
    /// 1-based.
    pub page: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct JourneyPage {
    pub items: Vec<Journey>,
    pub current_page: i64,
    pub last_page: i64,
    pub per_page: i64,
    pub total: i64,
}

impl JourneyService {
    /// Every journey of the child, newest created first.
    pub async fn child_journeys(&self, actor: &Actor) -> JourneyResult<Vec<Journey>> {
        require_role(actor, Role::Child)?;
        let journeys = self
            .store
            .list_journeys(
                &JourneyFilter::for_child(actor.id),
                JourneyOrder::CreatedDesc,
                i64::MAX,
                0,
            )
            .await?;
        Ok(journeys)
    }

    /// Journeys the parent scheduled or their children started, most
    /// recently started first, a page at a time.
    pub async fn parent_journeys(
        &self,
        actor: &Actor,
        query: ParentJourneyQuery,
    ) -> JourneyResult<JourneyPage> {
        require_role(actor, Role::Parent)?;

        let filter = JourneyFilter {
            child_ids: query.child_id.map(|id| vec![id]),
            parent_id: Some(actor.id),
            statuses: query.status.map(|s| vec![s]),
            child_name: query
                .search
                .map(|term| term.trim().to_string())
                .filter(|term| !term.is_empty()),
        };
        let current_page = query.page.unwrap_or(1).max(1);

        let total = self.store.count_journeys(&filter).await?;
        let items = self
            .store
            .list_journeys(
                &filter,
                JourneyOrder::StartedDesc,
                PER_PAGE,
                (current_page - 1).saturating_mul(PER_PAGE),
            )
            .await?;

        Ok(JourneyPage {
            items,
            current_page,
            last_page: ((total + PER_PAGE - 1) / PER_PAGE).max(1),
            per_page: PER_PAGE,
            total,
        })
    }

    pub async fn recent_journeys(&self, actor: &Actor) -> JourneyResult<Vec<Journey>> {
        require_role(actor, Role::Admin)?;
        let journeys = self
            .store
            .list_journeys(
                &JourneyFilter::default(),
                JourneyOrder::CreatedDesc,
                RECENT_LIMIT,
                0,
            )
            .await?;
        Ok(journeys)
    }

    pub async fn recent_alerts(&self, actor: &Actor) -> JourneyResult<Vec<Alert>> {
        require_role(actor, Role::Admin)?;
        Ok(self.store.list_alerts(None, RECENT_LIMIT).await?)
    }

    pub async fn journey_details(&self, actor: &Actor, journey_id: Uuid) -> JourneyResult<Journey> {
        require_role(actor, Role::Admin)?;
        self.visible_journey(actor, journey_id).await
    }

    pub async fn alert_details(&self, actor: &Actor, alert_id: Uuid) -> JourneyResult<Alert> {
        require_role(actor, Role::Admin)?;
        self.store
            .get_alert(alert_id)
            .await?
            .ok_or(JourneyError::NotFound("alert"))
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{minutes, Fixture};
    use super::*;
    use crate::models::request::StartJourney;

    #[tokio::test]
    async fn child_sees_own_journeys_newest_first() {
        let fx = Fixture::new().await;
        let first = fx.schedule(10).await;
        fx.clock.advance(minutes(1));
        let second = fx.schedule(20).await;

        let journeys = fx.service.child_journeys(&fx.child).await.unwrap();
        let ids: Vec<Uuid> = journeys.iter().map(|j| j.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);

        let err = fx.service.child_journeys(&fx.parent).await.unwrap_err();
        assert!(matches!(err, JourneyError::Unauthorized));
    }

    #[tokio::test]
    async fn parent_listing_filters_and_paginates() {
        let fx = Fixture::new().await;
        for _ in 0..12 {
            fx.clock.advance(minutes(1));
            fx.schedule(15).await;
        }
        let started = fx.schedule(15).await;
        fx.service
            .start_journey(
                &fx.child,
                StartJourney {
                    journey_id: Some(started.id),
                    ..StartJourney::default()
                },
            )
            .await
            .unwrap();

        let page = fx
            .service
            .parent_journeys(&fx.parent, ParentJourneyQuery::default())
            .await
            .unwrap();
        assert_eq!(page.total, 13);
        assert_eq!(page.last_page, 2);
        assert_eq!(page.items.len(), 10);
        assert_eq!(page.items[0].id, started.id);

        let page = fx
            .service
            .parent_journeys(
                &fx.parent,
                ParentJourneyQuery {
                    page: Some(2),
                    ..ParentJourneyQuery::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(page.items.len(), 3);

        let page = fx
            .service
            .parent_journeys(
                &fx.parent,
                ParentJourneyQuery {
                    status: Some(JourneyStatus::Started),
                    child_id: Some(fx.child.id),
                    ..ParentJourneyQuery::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.last_page, 1);

        let stranger = fx.add_user("Ravi", Role::Parent, None).await;
        let page = fx
            .service
            .parent_journeys(&stranger, ParentJourneyQuery::default())
            .await
            .unwrap();
        assert_eq!(page.total, 0);
        assert_eq!(page.last_page, 1);
    }

    #[tokio::test]
    async fn admin_lookups() {
        let fx = Fixture::new().await;
        let journey = fx.schedule(10).await;
        let alert = fx
            .service
            .raise_sos(&fx.child, Default::default())
            .await
            .unwrap();

        assert_eq!(fx.service.recent_journeys(&fx.admin).await.unwrap().len(), 1);
        assert_eq!(fx.service.recent_alerts(&fx.admin).await.unwrap()[0].id, alert.id);
        assert_eq!(
            fx.service.journey_details(&fx.admin, journey.id).await.unwrap().id,
            journey.id
        );
        assert_eq!(fx.service.alert_details(&fx.admin, alert.id).await.unwrap().id, alert.id);
        assert!(matches!(
            fx.service.alert_details(&fx.admin, Uuid::new_v4()).await,
            Err(JourneyError::NotFound("alert"))
        ));
        assert!(matches!(
            fx.service.recent_alerts(&fx.parent).await,
            Err(JourneyError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn parent_listing_searches_child_names() {
        let fx = Fixture::new().await;
        let sibling = fx.add_user("Munni", Role::Child, Some(fx.parent.id)).await;
        let chintu_journey = fx.schedule(15).await;
        fx.service
            .create_ad_hoc_journey(&sibling, "Home", "Tuition")
            .await
            .unwrap();

        let search = |term: &str| ParentJourneyQuery {
            search: Some(term.to_string()),
            ..ParentJourneyQuery::default()
        };

        let page = fx.service.parent_journeys(&fx.parent, search("chin")).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].id, chintu_journey.id);

        let page = fx.service.parent_journeys(&fx.parent, search("UNN")).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].child_id, sibling.id);

        let page = fx.service.parent_journeys(&fx.parent, search("zzz")).await.unwrap();
        assert_eq!(page.total, 0);
        assert!(page.items.is_empty());

        let page = fx.service.parent_journeys(&fx.parent, search("  ")).await.unwrap();
        assert_eq!(page.total, 2);
    }
}
