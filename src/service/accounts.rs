use super::{email_field, require_role, text_field, JourneyService};
use crate::db::JourneyOrder;
use crate::error::{JourneyError, JourneyResult};
use crate::models::{Actor, JourneyFilter, Role, User, UserPatch};
use tracing::info;
use uuid::Uuid;

impl JourneyService {
    /// Links an unlinked child account to the acting parent.
    pub async fn link_child(&self, actor: &Actor, child_id: Uuid) -> JourneyResult<User> {
        require_role(actor, Role::Parent)?;
        if child_id == actor.id {
            return Err(JourneyError::validation("child_id", "cannot link to yourself"));
        }
        let child = self.store.get_user(child_id).await?;
        self.link(actor, child).await
    }

    /// Same as [`link_child`](Self::link_child), finding the child by the
    /// email they registered with.
    pub async fn link_child_by_email(&self, actor: &Actor, email: &str) -> JourneyResult<User> {
        require_role(actor, Role::Parent)?;
        let email = email_field(email)?;
        let child = self.store.find_user_by_email(&email).await?;
        self.link(actor, child).await
    }

    async fn link(&self, actor: &Actor, child: Option<User>) -> JourneyResult<User> {
        let mut child = child
            .filter(|u| u.role == Role::Child)
            .ok_or(JourneyError::NotFound("child"))?;
        if let Some(current) = child.parent_id {
            if current == actor.id {
                return Ok(child);
            }
            return Err(JourneyError::conflict(
                "Child is already linked to another parent",
            ));
        }

        if !self.store.set_parent(child.id, Some(actor.id)).await? {
            return Err(JourneyError::NotFound("child"));
        }
        child.parent_id = Some(actor.id);
        info!("Linked child {} to parent {}", child.id, actor.id);
        Ok(child)
    }

    /// Renames a linked child or changes their email.
    pub async fn update_child(
        &self,
        actor: &Actor,
        child_id: Uuid,
        patch: UserPatch,
    ) -> JourneyResult<User> {
        require_role(actor, Role::Parent)?;
        let changes = UserPatch {
            name: patch.name.as_deref().map(|n| text_field("name", n)).transpose()?,
            email: patch.email.as_deref().map(email_field).transpose()?,
        };

        let child = self.linked_child(actor, child_id).await?;
        if changes.is_empty() {
            return Ok(child);
        }

        if let Some(email) = changes.email.as_deref().filter(|e| *e != child.email) {
            let taken = self
                .store
                .find_user_by_email(email)
                .await?
                .is_some_and(|owner| owner.id != child.id);
            if taken {
                return Err(JourneyError::conflict("Email already in use"));
            }
        }

        let updated = self
            .store
            .update_user(child.id, &changes)
            .await?
            .ok_or(JourneyError::NotFound("child"))?;
        info!("Parent {} updated child {}", actor.id, updated.id);
        Ok(updated)
    }

    async fn linked_child(&self, actor: &Actor, child_id: Uuid) -> JourneyResult<User> {
        self.store
            .get_user(child_id)
            .await?
            .filter(|u| u.role == Role::Child && u.parent_id == Some(actor.id))
            .ok_or(JourneyError::NotFound("child"))
    }

    /// Detaches one of the acting parent's children.
    pub async fn unlink_child(&self, actor: &Actor, child_id: Uuid) -> JourneyResult<()> {
        require_role(actor, Role::Parent)?;
        let child = self.linked_child(actor, child_id).await?;

        self.store.set_parent(child.id, None).await?;
        info!("Unlinked child {} from parent {}", child.id, actor.id);
        Ok(())
    }

    /// Removes a parent or child account with everything it owns. Children of
    /// a deleted parent stay, unlinked. Admin accounts cannot be deleted.
    pub async fn admin_delete_user(&self, actor: &Actor, user_id: Uuid) -> JourneyResult<()> {
        require_role(actor, Role::Admin)?;

        let user = self
            .store
            .get_user(user_id)
            .await?
            .ok_or(JourneyError::NotFound("user"))?;
        if user.role == Role::Admin {
            return Err(JourneyError::Unauthorized);
        }

        let owned = match user.role {
            Role::Parent => JourneyFilter {
                parent_id: Some(user.id),
                ..JourneyFilter::default()
            },
            _ => JourneyFilter::for_child(user.id),
        };
        let documents: Vec<String> = self
            .store
            .list_journeys(&owned, JourneyOrder::CreatedDesc, i64::MAX, 0)
            .await?
            .into_iter()
            .filter_map(|j| j.document_path)
            .collect();

        if !self.store.delete_user(user.id).await? {
            return Err(JourneyError::NotFound("user"));
        }
        for path in &documents {
            self.remove_document(path).await;
        }

        info!(
            "Admin {} deleted {} {} ({} documents removed)",
            actor.id,
            user.role,
            user.id,
            documents.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::Fixture;
    use super::*;
    use crate::db::JourneyStore;
    use crate::models::request::SosRequest;

    #[tokio::test]
    async fn linking_respects_existing_parents() {
        let fx = Fixture::new().await;
        let orphan = fx.add_user("Solo", Role::Child, None).await;
        let other_parent = fx.add_user("Ravi", Role::Parent, None).await;

        let linked = fx.service.link_child(&other_parent, orphan.id).await.unwrap();
        assert_eq!(linked.parent_id, Some(other_parent.id));

        let err = fx.service.link_child(&fx.parent, orphan.id).await.unwrap_err();
        assert!(matches!(err, JourneyError::Conflict(_)));

        let err = fx.service.link_child(&fx.parent, other_parent.id).await.unwrap_err();
        assert!(matches!(err, JourneyError::NotFound("child")));

        let err = fx.service.link_child(&fx.parent, fx.parent.id).await.unwrap_err();
        assert!(matches!(err, JourneyError::Validation { .. }));
    }

    #[tokio::test]
    async fn unlinked_child_cannot_start_ad_hoc() {
        let fx = Fixture::new().await;
        fx.service.unlink_child(&fx.parent, fx.child.id).await.unwrap();

        let err = fx
            .service
            .create_ad_hoc_journey(&fx.child, "Home", "Park")
            .await
            .unwrap_err();
        assert!(matches!(err, JourneyError::Validation { field: "parent_id", .. }));

        let err = fx.service.unlink_child(&fx.parent, fx.child.id).await.unwrap_err();
        assert!(matches!(err, JourneyError::NotFound(_)));
    }

    #[tokio::test]
    async fn deleting_a_parent_unlinks_children_and_drops_journeys() {
        let fx = Fixture::new().await;
        let journey = fx.schedule(20).await;
        fx.service
            .attach_document(&fx.parent, journey.id, "journey_documents/route.pdf")
            .await
            .unwrap();

        fx.service.admin_delete_user(&fx.admin, fx.parent.id).await.unwrap();

        let child = fx.store.get_user(fx.child.id).await.unwrap().unwrap();
        assert_eq!(child.parent_id, None);
        assert!(fx.journey(journey.id).await.is_none());
        assert_eq!(
            fx.docs.deleted.lock().unwrap().as_slice(),
            ["journey_documents/route.pdf".to_string()]
        );
    }

    #[tokio::test]
    async fn deleting_a_child_drops_their_alerts() {
        let fx = Fixture::new().await;
        fx.service
            .raise_sos(&fx.child, SosRequest::default())
            .await
            .unwrap();

        fx.service.admin_delete_user(&fx.admin, fx.child.id).await.unwrap();
        assert_eq!(fx.store.count_alerts(None).await.unwrap(), 0);
        assert!(fx.store.get_user(fx.child.id).await.unwrap().is_none());

        let err = fx
            .service
            .admin_delete_user(&fx.admin, fx.admin.id)
            .await
            .unwrap_err();
        assert!(matches!(err, JourneyError::Unauthorized));
    }

    #[tokio::test]
    async fn linking_by_email() {
        let fx = Fixture::new().await;
        let orphan = fx.add_user("Solo", Role::Child, None).await;
        let email = fx.store.get_user(orphan.id).await.unwrap().unwrap().email;

        let linked = fx
            .service
            .link_child_by_email(&fx.parent, &format!("  {}  ", email))
            .await
            .unwrap();
        assert_eq!(linked.id, orphan.id);
        assert_eq!(linked.parent_id, Some(fx.parent.id));

        let other_parent = fx.add_user("Ravi", Role::Parent, None).await;
        let err = fx
            .service
            .link_child_by_email(&other_parent, &email)
            .await
            .unwrap_err();
        assert!(matches!(err, JourneyError::Conflict(_)));

        let parent_email = fx.store.get_user(other_parent.id).await.unwrap().unwrap().email;
        let err = fx
            .service
            .link_child_by_email(&fx.parent, &parent_email)
            .await
            .unwrap_err();
        assert!(matches!(err, JourneyError::NotFound("child")));

        let err = fx
            .service
            .link_child_by_email(&fx.parent, "nobody@example.com")
            .await
            .unwrap_err();
        assert!(matches!(err, JourneyError::NotFound("child")));

        let err = fx
            .service
            .link_child_by_email(&fx.parent, "not-an-email")
            .await
            .unwrap_err();
        assert!(matches!(err, JourneyError::Validation { field: "email", .. }));
    }

    #[tokio::test]
    async fn parent_updates_a_linked_child() {
        let fx = Fixture::new().await;
        let updated = fx
            .service
            .update_child(
                &fx.parent,
                fx.child.id,
                UserPatch {
                    name: Some(" Chintu Sharma ".into()),
                    email: Some("chintu@example.com".into()),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Chintu Sharma");
        assert_eq!(updated.email, "chintu@example.com");

        // Keeping the current email is not a clash with itself.
        let same = fx
            .service
            .update_child(
                &fx.parent,
                fx.child.id,
                UserPatch {
                    email: Some("chintu@example.com".into()),
                    ..UserPatch::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(same.name, "Chintu Sharma");

        let unchanged = fx
            .service
            .update_child(&fx.parent, fx.child.id, UserPatch::default())
            .await
            .unwrap();
        assert_eq!(unchanged.email, "chintu@example.com");
    }

    #[tokio::test]
    async fn child_update_rejects_taken_email_and_strangers() {
        let fx = Fixture::new().await;
        let taken = fx.store.get_user(fx.parent.id).await.unwrap().unwrap().email;

        let err = fx
            .service
            .update_child(
                &fx.parent,
                fx.child.id,
                UserPatch {
                    email: Some(taken),
                    ..UserPatch::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, JourneyError::Conflict(_)));

        let err = fx
            .service
            .update_child(
                &fx.parent,
                fx.child.id,
                UserPatch {
                    name: Some("   ".into()),
                    ..UserPatch::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, JourneyError::Validation { field: "name", .. }));

        let stranger = fx.add_user("Ravi", Role::Parent, None).await;
        let err = fx
            .service
            .update_child(
                &stranger,
                fx.child.id,
                UserPatch {
                    name: Some("Bunty".into()),
                    ..UserPatch::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, JourneyError::NotFound("child")));

        let child = fx.store.get_user(fx.child.id).await.unwrap().unwrap();
        assert_eq!(child.name, "Chintu");
    }
}
