//! Seat ledger.
//!
//! Adds and removes passengers while keeping `available_seats` equal to
//! capacity minus the passenger count. The counter itself is moved by the
//! carpool repository inside the same transaction as the passenger row.

use crate::services::notification::{FanOutEvent, NotificationService};
use crate::services::realtime::{RealtimeService, carpool_room, events};
use crate::services::roles::RoleService;
use crate::services::roster::{PassengerEntry, RosterResolver};
use carpool_common::{AppError, AppResult, IdGenerator};
use carpool_db::{
    entities::{carpool, child, passenger::Occupant, user},
    repositories::{ActivityRepository, CarpoolRepository, ChildRepository},
};
use serde::Serialize;
use serde_json::json;

/// Who an add request seats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OccupantSelection {
    /// A specific child of the caller.
    Child(String),
    /// The caller, riding directly.
    Caller,
    /// The caller's one child holding the activity's target role.
    Default,
}

impl OccupantSelection {
    /// Build a selection from request fields.
    pub fn from_request(child_id: Option<String>, add_self: bool) -> AppResult<Self> {
        match (child_id, add_self) {
            (Some(_), true) => Err(AppError::Validation(
                "Pass either child_id or add_self, not both".to_string(),
            )),
            (Some(id), false) => Ok(Self::Child(id)),
            (None, true) => Ok(Self::Caller),
            (None, false) => Ok(Self::Default),
        }
    }
}

/// Result of a seat change.
#[derive(Debug, Clone, Serialize)]
pub struct SeatChange {
    pub carpool_id: String,
    pub available_seats: i32,
    pub occupant: Occupant,
}

/// Caller's children eligible for a carpool.
#[derive(Debug, Clone, Serialize)]
pub struct EligibleChildren {
    pub multiple: bool,
    pub children: Vec<EligibleChild>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EligibleChild {
    pub child_id: String,
    pub name: String,
}

/// Whether the caller's household already rides in a carpool.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct JoinStatus {
    /// True when every eligible child is a passenger (vacuously true with none).
    pub all_children_joined: bool,
    pub user_already_joined: bool,
}

/// Seat ledger service.
#[derive(Clone)]
pub struct SeatLedger {
    carpool_repo: CarpoolRepository,
    activity_repo: ActivityRepository,
    child_repo: ChildRepository,
    roles: RoleService,
    roster: RosterResolver,
    notifications: Option<NotificationService>,
    realtime: Option<RealtimeService>,
    id_gen: IdGenerator,
}

impl SeatLedger {
    /// Create a new seat ledger.
    #[must_use]
    pub const fn new(
        carpool_repo: CarpoolRepository,
        activity_repo: ActivityRepository,
        child_repo: ChildRepository,
        roles: RoleService,
        roster: RosterResolver,
    ) -> Self {
        Self {
            carpool_repo,
            activity_repo,
            child_repo,
            roles,
            roster,
            notifications: None,
            realtime: None,
            id_gen: IdGenerator::new(),
        }
    }

    /// Set the notification service used for fan-out.
    pub fn set_notifications(&mut self, notifications: NotificationService) {
        self.notifications = Some(notifications);
    }

    /// Set the realtime transport.
    pub fn set_realtime(&mut self, realtime: RealtimeService) {
        self.realtime = Some(realtime);
    }

    /// Seat an occupant chosen by `selection` on behalf of `actor`.
    pub async fn add_passenger(
        &self,
        actor: &user::Model,
        carpool_id: &str,
        selection: OccupantSelection,
    ) -> AppResult<SeatChange> {
        let occupant = match selection {
            OccupantSelection::Caller => Occupant::DirectUser(actor.id.clone()),
            OccupantSelection::Child(child_id) => {
                if !self.child_repo.is_guardian(&actor.id, &child_id).await? {
                    return Err(AppError::Forbidden(
                        "You are not a guardian of this child".to_string(),
                    ));
                }
                Occupant::Child(child_id)
            }
            OccupantSelection::Default => {
                let (_, mut children) = self.eligible(&actor.id, carpool_id).await?;
                match children.len() {
                    0 => {
                        return Err(AppError::NotFound(
                            "No child with the activity's role".to_string(),
                        ));
                    }
                    1 => Occupant::Child(children.remove(0).id),
                    _ => return Err(AppError::AmbiguousOccupant),
                }
            }
        };

        let (carpool, _) = self
            .carpool_repo
            .add_passenger(&self.id_gen.generate(), carpool_id, &occupant)
            .await?;

        tracing::info!(
            carpool_id = %carpool.id,
            actor_id = %actor.id,
            occupant = ?occupant,
            available_seats = carpool.available_seats,
            "Passenger added"
        );

        self.after_change(&carpool, &actor.id, FanOutEvent::PassengerAdded)
            .await;

        Ok(SeatChange {
            carpool_id: carpool.id,
            available_seats: carpool.available_seats,
            occupant,
        })
    }

    /// Release an occupant's seat.
    ///
    /// Allowed for the occupant themselves, a guardian of a child occupant,
    /// the driver and admins.
    pub async fn remove_passenger(
        &self,
        actor: &user::Model,
        carpool_id: &str,
        occupant: Occupant,
    ) -> AppResult<SeatChange> {
        let carpool = self.carpool_repo.get_by_id(carpool_id).await?;

        let allowed = carpool.driver_id.as_deref() == Some(actor.id.as_str())
            || match &occupant {
                Occupant::DirectUser(user_id) => *user_id == actor.id,
                Occupant::Child(child_id) => {
                    self.child_repo.is_guardian(&actor.id, child_id).await?
                }
            }
            || self.roles.is_admin(&actor.id).await?;
        if !allowed {
            return Err(AppError::Forbidden(
                "You cannot remove this passenger".to_string(),
            ));
        }

        let carpool = self
            .carpool_repo
            .remove_passenger(carpool_id, &occupant)
            .await?;

        tracing::info!(
            carpool_id = %carpool.id,
            actor_id = %actor.id,
            occupant = ?occupant,
            available_seats = carpool.available_seats,
            "Passenger removed"
        );

        self.after_change(
            &carpool,
            &actor.id,
            FanOutEvent::PassengerRemoved(occupant.clone()),
        )
        .await;

        Ok(SeatChange {
            carpool_id: carpool.id,
            available_seats: carpool.available_seats,
            occupant,
        })
    }

    /// Caller's children that hold the activity's target role.
    pub async fn eligible_children(
        &self,
        actor_id: &str,
        carpool_id: &str,
    ) -> AppResult<EligibleChildren> {
        let (_, children) = self.eligible(actor_id, carpool_id).await?;

        Ok(EligibleChildren {
            multiple: children.len() > 1,
            children: children
                .into_iter()
                .map(|c| EligibleChild {
                    name: c.full_name(),
                    child_id: c.id,
                })
                .collect(),
        })
    }

    /// Whether the caller and all their eligible children already ride.
    pub async fn join_status(&self, actor_id: &str, carpool_id: &str) -> AppResult<JoinStatus> {
        let (carpool, children) = self.eligible(actor_id, carpool_id).await?;
        let occupants: Vec<Occupant> = self
            .carpool_repo
            .find_passengers(&carpool.id)
            .await?
            .iter()
            .filter_map(|p| p.occupant())
            .collect();

        Ok(JoinStatus {
            all_children_joined: children
                .iter()
                .all(|c| occupants.contains(&Occupant::Child(c.id.clone()))),
            user_already_joined: occupants.contains(&Occupant::DirectUser(actor_id.to_string())),
        })
    }

    /// Current passenger list of a carpool.
    pub async fn passengers(&self, carpool_id: &str) -> AppResult<Vec<PassengerEntry>> {
        self.carpool_repo.get_by_id(carpool_id).await?;
        self.roster.passenger_list(carpool_id).await
    }

    async fn eligible(
        &self,
        actor_id: &str,
        carpool_id: &str,
    ) -> AppResult<(carpool::Model, Vec<child::Model>)> {
        let carpool = self.carpool_repo.get_by_id(carpool_id).await?;
        let activity = self.activity_repo.get_by_id(&carpool.activity_id).await?;
        let Some(role_id) = activity.role_id else {
            return Err(AppError::NotFound(format!(
                "Activity {} has no target role",
                activity.id
            )));
        };

        let children = self
            .child_repo
            .find_children_of(actor_id, Some(&role_id))
            .await?;
        Ok((carpool, children))
    }

    /// Broadcast the new passenger list and fan out. Failures are logged;
    /// the seat change stands.
    async fn after_change(&self, carpool: &carpool::Model, actor_id: &str, event: FanOutEvent) {
        if let Some(ref realtime) = self.realtime {
            match self.roster.passenger_list(&carpool.id).await {
                Ok(passengers) => {
                    let payload = json!({
                        "carpool_id": carpool.id,
                        "available_seats": carpool.available_seats,
                        "passengers": passengers,
                    });
                    if let Err(e) = realtime
                        .emit(&carpool_room(&carpool.id), events::PASSENGERS_UPDATED, payload)
                        .await
                    {
                        tracing::warn!(error = %e, "Failed to publish passengers_updated");
                    }
                }
                Err(e) => tracing::warn!(error = %e, "Failed to load passenger list"),
            }
        }

        if let Some(ref notifications) = self.notifications {
            let notifications = notifications.clone();
            let carpool_id = carpool.id.clone();
            let actor_id = actor_id.to_string();
            tokio::spawn(async move {
                if let Err(e) = notifications.fan_out(&carpool_id, &actor_id, &event).await {
                    tracing::warn!(error = %e, carpool_id = %carpool_id, "Passenger fan-out failed");
                }
            });
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::roles::RoleRegistry;
    use crate::services::testing;
    use carpool_db::{
        entities::{parent_child_link, passenger, user_role},
        repositories::{RoleRepository, UserRepository},
    };
    use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase, MockExecResult};
    use std::sync::Arc;

    fn ledger(db: DatabaseConnection) -> SeatLedger {
        let db = Arc::new(db);
        let roster = RosterResolver::new(
            CarpoolRepository::new(db.clone()),
            ChildRepository::new(db.clone()),
            UserRepository::new(db.clone()),
        );
        SeatLedger::new(
            CarpoolRepository::new(db.clone()),
            ActivityRepository::new(db.clone()),
            ChildRepository::new(db.clone()),
            RoleService::new(RoleRepository::new(db), RoleRegistry::default()),
            roster,
        )
    }

    fn link(user_id: &str, child_id: &str) -> parent_child_link::Model {
        parent_child_link::Model {
            user_id: user_id.to_string(),
            child_id: child_id.to_string(),
        }
    }

    fn exec(rows: u64) -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected: rows,
        }
    }

    #[test]
    fn test_selection_from_request() {
        assert_eq!(
            OccupantSelection::from_request(Some("k".to_string()), false).unwrap(),
            OccupantSelection::Child("k".to_string())
        );
        assert_eq!(
            OccupantSelection::from_request(None, true).unwrap(),
            OccupantSelection::Caller
        );
        assert_eq!(
            OccupantSelection::from_request(None, false).unwrap(),
            OccupantSelection::Default
        );
        assert!(matches!(
            OccupantSelection::from_request(Some("k".to_string()), true),
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_add_self() {
        let occupant = Occupant::DirectUser("u1".to_string());
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[testing::carpool("c1", Some("d"), 3, 3)]])
            .append_query_results([Vec::<passenger::Model>::new()])
            .append_query_results([[testing::passenger("p1", "c1", &occupant)]])
            .append_query_results([[testing::carpool("c1", Some("d"), 3, 2)]])
            .append_exec_results([exec(1)])
            .into_connection();

        let change = ledger(db)
            .add_passenger(&testing::user("u1"), "c1", OccupantSelection::Caller)
            .await
            .unwrap();

        assert_eq!(change.available_seats, 2);
        assert_eq!(change.occupant, occupant);
    }

    #[tokio::test]
    async fn test_add_full_carpool() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[testing::carpool("c1", Some("d"), 3, 0)]])
            .append_query_results([Vec::<passenger::Model>::new()])
            .into_connection();

        let result = ledger(db)
            .add_passenger(&testing::user("u1"), "c1", OccupantSelection::Caller)
            .await;

        assert!(matches!(result, Err(AppError::SeatsExhausted(_))));
    }

    #[tokio::test]
    async fn test_add_someone_elses_child() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<parent_child_link::Model>::new()])
            .into_connection();

        let result = ledger(db)
            .add_passenger(
                &testing::user("u1"),
                "c1",
                OccupantSelection::Child("kid".to_string()),
            )
            .await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_default_selection_ambiguous() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[testing::carpool("c1", Some("d"), 3, 3)]])
            .append_query_results([[testing::activity("act1", Some("r-tumlare"))]])
            .append_query_results([[
                maplit::btreemap! { "child_id" => sea_orm::Value::from("k1") },
                maplit::btreemap! { "child_id" => sea_orm::Value::from("k2") },
            ]])
            .append_query_results([[
                testing::child("k1", Some("r-tumlare")),
                testing::child("k2", Some("r-tumlare")),
            ]])
            .into_connection();

        let result = ledger(db)
            .add_passenger(&testing::user("g1"), "c1", OccupantSelection::Default)
            .await;

        assert!(matches!(result, Err(AppError::AmbiguousOccupant)));
    }

    #[tokio::test]
    async fn test_default_selection_without_children() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[testing::carpool("c1", Some("d"), 3, 3)]])
            .append_query_results([[testing::activity("act1", Some("r-tumlare"))]])
            .append_query_results([Vec::<std::collections::BTreeMap<&str, sea_orm::Value>>::new()])
            .into_connection();

        let result = ledger(db)
            .add_passenger(&testing::user("g1"), "c1", OccupantSelection::Default)
            .await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_remove_by_stranger_forbidden() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[testing::carpool("c1", Some("d"), 3, 2)]])
            .append_query_results([Vec::<user_role::Model>::new()])
            .into_connection();

        let result = ledger(db)
            .remove_passenger(
                &testing::user("stranger"),
                "c1",
                Occupant::DirectUser("u1".to_string()),
            )
            .await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_guardian_removes_child() {
        let occupant = Occupant::Child("kid".to_string());
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[testing::carpool("c1", Some("d"), 3, 2)]])
            .append_query_results([[link("g1", "kid")]])
            .append_query_results([[testing::passenger("p1", "c1", &occupant)]])
            .append_query_results([[testing::carpool("c1", Some("d"), 3, 3)]])
            .append_exec_results([exec(1), exec(1)])
            .into_connection();

        let change = ledger(db)
            .remove_passenger(&testing::user("g1"), "c1", occupant)
            .await
            .unwrap();

        assert_eq!(change.available_seats, 3);
    }

    #[tokio::test]
    async fn test_join_status() {
        let kid = Occupant::Child("k1".to_string());
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[testing::carpool("c1", Some("d"), 3, 2)]])
            .append_query_results([[testing::activity("act1", Some("r-tumlare"))]])
            .append_query_results([[
                maplit::btreemap! { "child_id" => sea_orm::Value::from("k1") },
            ]])
            .append_query_results([[testing::child("k1", Some("r-tumlare"))]])
            .append_query_results([[testing::passenger("p1", "c1", &kid)]])
            .into_connection();

        let status = ledger(db).join_status("g1", "c1").await.unwrap();

        assert!(status.all_children_joined);
        assert!(!status.user_already_joined);
    }
}
