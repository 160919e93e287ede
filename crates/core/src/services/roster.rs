//! Roster resolution.
//!
//! Works out who has an interest in a carpool: the driver, every direct
//! passenger and every guardian of every child passenger.

use carpool_common::AppResult;
use carpool_db::{
    entities::{carpool, passenger::Occupant, user},
    repositories::{CarpoolRepository, ChildRepository, UserRepository},
};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Interested parties of a carpool.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Roster {
    pub driver_id: Option<String>,
    /// Users reached through passengers, in passenger insertion order.
    /// Deduplicated, actor not removed.
    pub passenger_user_ids: Vec<String>,
    /// Driver first, then passenger users. Deduplicated, actor removed.
    pub recipients: Vec<String>,
}

/// Order, deduplicate and drop the actor.
#[must_use]
pub fn collect_recipients(
    driver_id: Option<&str>,
    passenger_user_ids: &[String],
    actor_id: Option<&str>,
) -> Vec<String> {
    let mut seen = HashSet::new();
    driver_id
        .into_iter()
        .chain(passenger_user_ids.iter().map(String::as_str))
        .filter(|id| Some(*id) != actor_id)
        .filter(|id| seen.insert(*id))
        .map(str::to_string)
        .collect()
}

/// A guardian shown next to a child passenger.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct GuardianEntry {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
}

impl From<&user::Model> for GuardianEntry {
    fn from(u: &user::Model) -> Self {
        Self {
            id: u.id.clone(),
            first_name: u.first_name.clone(),
            last_name: u.last_name.clone(),
            phone: u.phone.clone(),
        }
    }
}

/// One displayable passenger.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PassengerEntry {
    pub passenger_id: String,
    /// `child` or `user`
    pub kind: &'static str,
    /// Child ID or user ID
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub guardians: Vec<GuardianEntry>,
}

/// Resolves rosters and passenger lists.
#[derive(Clone)]
pub struct RosterResolver {
    carpool_repo: CarpoolRepository,
    child_repo: ChildRepository,
    user_repo: UserRepository,
}

impl RosterResolver {
    #[must_use]
    pub const fn new(
        carpool_repo: CarpoolRepository,
        child_repo: ChildRepository,
        user_repo: UserRepository,
    ) -> Self {
        Self {
            carpool_repo,
            child_repo,
            user_repo,
        }
    }

    /// Interested parties of a carpool, excluding the actor.
    ///
    /// `departed` is an occupant whose row was just deleted. Its user or
    /// guardians still count as interested in that change.
    pub async fn resolve(
        &self,
        carpool: &carpool::Model,
        actor_id: Option<&str>,
        departed: Option<&Occupant>,
    ) -> AppResult<Roster> {
        let passengers = self.carpool_repo.find_passengers(&carpool.id).await?;

        let mut occupants = Vec::with_capacity(passengers.len() + 1);
        for row in &passengers {
            match row.occupant() {
                Some(occupant) => occupants.push(occupant),
                None => {
                    tracing::warn!(passenger_id = %row.id, "Passenger row without occupant");
                }
            }
        }
        occupants.extend(departed.cloned());

        let mut seen = HashSet::new();
        let mut passenger_user_ids = Vec::new();
        for occupant in &occupants {
            for user_id in self.occupant_user_ids(occupant).await? {
                if seen.insert(user_id.clone()) {
                    passenger_user_ids.push(user_id);
                }
            }
        }

        let recipients =
            collect_recipients(carpool.driver_id.as_deref(), &passenger_user_ids, actor_id);

        Ok(Roster {
            driver_id: carpool.driver_id.clone(),
            passenger_user_ids,
            recipients,
        })
    }

    /// Users reached through one occupant.
    async fn occupant_user_ids(&self, occupant: &Occupant) -> AppResult<Vec<String>> {
        match occupant {
            Occupant::Child(child_id) => Ok(self
                .child_repo
                .find_guardians(child_id)
                .await?
                .into_iter()
                .map(|g| g.id)
                .collect()),
            Occupant::DirectUser(user_id) => Ok(vec![user_id.clone()]),
        }
    }

    /// Displayable passengers in insertion order.
    pub async fn passenger_list(&self, carpool_id: &str) -> AppResult<Vec<PassengerEntry>> {
        let passengers = self.carpool_repo.find_passengers(carpool_id).await?;

        let occupants: Vec<(String, Occupant)> = passengers
            .iter()
            .filter_map(|p| p.occupant().map(|o| (p.id.clone(), o)))
            .collect();

        let child_ids: Vec<String> = occupants
            .iter()
            .filter_map(|(_, o)| match o {
                Occupant::Child(id) => Some(id.clone()),
                Occupant::DirectUser(_) => None,
            })
            .collect();
        let user_ids: Vec<String> = occupants
            .iter()
            .filter_map(|(_, o)| match o {
                Occupant::DirectUser(id) => Some(id.clone()),
                Occupant::Child(_) => None,
            })
            .collect();

        let children: HashMap<String, _> = self
            .child_repo
            .find_by_ids(&child_ids)
            .await?
            .into_iter()
            .map(|c| (c.id.clone(), c))
            .collect();
        let users: HashMap<String, _> = self
            .user_repo
            .find_by_ids(&user_ids)
            .await?
            .into_iter()
            .map(|u| (u.id.clone(), u))
            .collect();

        let mut entries = Vec::with_capacity(occupants.len());
        for (passenger_id, occupant) in occupants {
            match occupant {
                Occupant::Child(id) => {
                    let Some(child) = children.get(&id) else {
                        continue;
                    };
                    let guardians = self.child_repo.find_guardians(&id).await?;
                    entries.push(PassengerEntry {
                        passenger_id,
                        kind: "child",
                        id,
                        first_name: child.first_name.clone(),
                        last_name: child.last_name.clone(),
                        phone: child.phone.clone(),
                        guardians: guardians.iter().map(GuardianEntry::from).collect(),
                    });
                }
                Occupant::DirectUser(id) => {
                    let Some(user) = users.get(&id) else {
                        continue;
                    };
                    entries.push(PassengerEntry {
                        passenger_id,
                        kind: "user",
                        id,
                        first_name: user.first_name.clone(),
                        last_name: user.last_name.clone(),
                        phone: user.phone.clone(),
                        guardians: vec![],
                    });
                }
            }
        }

        Ok(entries)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::testing;
    use carpool_db::entities::{parent_child_link, passenger};
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::sync::Arc;

    fn ids(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| (*s).to_string()).collect()
    }

    fn link(user_id: &str, child_id: &str) -> parent_child_link::Model {
        parent_child_link::Model {
            user_id: user_id.to_string(),
            child_id: child_id.to_string(),
        }
    }

    #[test]
    fn test_driver_first_then_passengers() {
        let r = collect_recipients(Some("d"), &ids(&["a", "b"]), None);
        assert_eq!(r, ids(&["d", "a", "b"]));
    }

    #[test]
    fn test_dedup_keeps_first_position() {
        // Driver is also a guardian of a child passenger
        let r = collect_recipients(Some("d"), &ids(&["a", "d", "a", "b"]), None);
        assert_eq!(r, ids(&["d", "a", "b"]));
    }

    #[test]
    fn test_actor_excluded() {
        let r = collect_recipients(Some("d"), &ids(&["g1", "g2"]), Some("g1"));
        assert_eq!(r, ids(&["d", "g2"]));

        let r = collect_recipients(Some("d"), &ids(&["g1"]), Some("d"));
        assert_eq!(r, ids(&["g1"]));
    }

    #[test]
    fn test_no_driver() {
        let r = collect_recipients(None, &ids(&["a"]), None);
        assert_eq!(r, ids(&["a"]));
    }

    #[tokio::test]
    async fn test_child_with_two_guardians() {
        let carpool = testing::carpool("c1", Some("driver"), 4, 3);
        let row = testing::passenger("p1", "c1", &Occupant::Child("kid".to_string()));

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[row]])
                .append_query_results([[
                    parent_child_link::Model {
                        user_id: "g1".to_string(),
                        child_id: "kid".to_string(),
                    },
                    parent_child_link::Model {
                        user_id: "g2".to_string(),
                        child_id: "kid".to_string(),
                    },
                ]])
                .append_query_results([[testing::user("g1"), testing::user("g2")]])
                .into_connection(),
        );

        let resolver = RosterResolver::new(
            CarpoolRepository::new(db.clone()),
            ChildRepository::new(db.clone()),
            UserRepository::new(db),
        );
        let roster = resolver.resolve(&carpool, Some("g1"), None).await.unwrap();

        assert_eq!(roster.passenger_user_ids, ids(&["g1", "g2"]));
        assert_eq!(roster.recipients, ids(&["driver", "g2"]));
    }

    #[tokio::test]
    async fn test_empty_carpool_notifies_driver_only() {
        let carpool = testing::carpool("c1", Some("driver"), 4, 4);

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<passenger::Model>::new()])
                .into_connection(),
        );

        let resolver = RosterResolver::new(
            CarpoolRepository::new(db.clone()),
            ChildRepository::new(db.clone()),
            UserRepository::new(db),
        );
        let roster = resolver.resolve(&carpool, Some("someone"), None).await.unwrap();

        assert_eq!(roster.recipients, ids(&["driver"]));
    }

    #[tokio::test]
    async fn test_shared_guardian_listed_once() {
        let carpool = testing::carpool("c1", Some("driver"), 4, 2);
        let first = testing::passenger("p1", "c1", &Occupant::Child("k1".to_string()));
        let second = testing::passenger("p2", "c1", &Occupant::Child("k2".to_string()));

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[first, second]])
                .append_query_results([[link("g1", "k1"), link("g2", "k1")]])
                .append_query_results([[testing::user("g1"), testing::user("g2")]])
                .append_query_results([[link("g1", "k2")]])
                .append_query_results([[testing::user("g1")]])
                .into_connection(),
        );

        let resolver = RosterResolver::new(
            CarpoolRepository::new(db.clone()),
            ChildRepository::new(db.clone()),
            UserRepository::new(db),
        );
        let roster = resolver.resolve(&carpool, None, None).await.unwrap();

        assert_eq!(roster.passenger_user_ids, ids(&["g1", "g2"]));
        assert_eq!(roster.recipients, ids(&["driver", "g1", "g2"]));
    }

    #[tokio::test]
    async fn test_departed_child_guardians_included() {
        let carpool = testing::carpool("c1", Some("driver"), 4, 4);

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<passenger::Model>::new()])
                .append_query_results([[link("g1", "kid"), link("g2", "kid")]])
                .append_query_results([[testing::user("g1"), testing::user("g2")]])
                .into_connection(),
        );

        let resolver = RosterResolver::new(
            CarpoolRepository::new(db.clone()),
            ChildRepository::new(db.clone()),
            UserRepository::new(db),
        );
        let departed = Occupant::Child("kid".to_string());
        let roster = resolver
            .resolve(&carpool, Some("driver"), Some(&departed))
            .await
            .unwrap();

        assert_eq!(roster.recipients, ids(&["g1", "g2"]));
    }
}
