//! Carpool service.

use crate::services::roles::RoleService;
use crate::services::roster::{PassengerEntry, RosterResolver};
use chrono::Utc;
use carpool_common::{AppError, AppResult, IdGenerator};
use carpool_db::{
    entities::{activity, car, carpool, carpool::CarpoolType},
    repositories::{ActivityRepository, CarRepository, CarpoolRepository, UserRepository},
};
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use validator::{Validate, ValidationError};

/// Input for offering a carpool.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCarpoolInput {
    pub activity_id: String,
    pub car_id: Option<String>,
    #[validate(range(min = 1, max = 64))]
    pub capacity: i32,
    pub carpool_type: CarpoolType,
    #[validate(custom(function = "not_blank"))]
    pub departure_address: String,
    #[validate(custom(function = "not_blank"))]
    pub departure_postcode: String,
    #[validate(custom(function = "not_blank"))]
    pub departure_city: String,
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

/// A carpool in an activity listing.
#[derive(Debug, Clone, Serialize)]
pub struct CarpoolSummary {
    #[serde(flatten)]
    pub carpool: carpool::Model,
    pub car_model_name: Option<String>,
    pub passengers: Vec<PassengerEntry>,
}

/// Contact details of a driver.
#[derive(Debug, Clone, Serialize)]
pub struct DriverContact {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
}

/// Everything shown on a carpool page.
#[derive(Debug, Clone, Serialize)]
pub struct CarpoolDetails {
    #[serde(flatten)]
    pub carpool: carpool::Model,
    pub activity: activity::Model,
    pub driver: Option<DriverContact>,
    pub car: Option<car::Model>,
    pub passengers: Vec<PassengerEntry>,
}

/// Carpool service.
#[derive(Clone)]
pub struct CarpoolService {
    carpool_repo: CarpoolRepository,
    activity_repo: ActivityRepository,
    car_repo: CarRepository,
    user_repo: UserRepository,
    roster: RosterResolver,
    roles: RoleService,
    id_gen: IdGenerator,
}

impl CarpoolService {
    /// Create a new carpool service.
    #[must_use]
    pub const fn new(
        carpool_repo: CarpoolRepository,
        activity_repo: ActivityRepository,
        car_repo: CarRepository,
        user_repo: UserRepository,
        roster: RosterResolver,
        roles: RoleService,
    ) -> Self {
        Self {
            carpool_repo,
            activity_repo,
            car_repo,
            user_repo,
            roster,
            roles,
            id_gen: IdGenerator::new(),
        }
    }

    /// Offer a carpool as driver. All seats start free.
    pub async fn create(
        &self,
        driver_id: &str,
        input: CreateCarpoolInput,
    ) -> AppResult<carpool::Model> {
        input.validate()?;

        let activity = self.activity_repo.get_by_id(&input.activity_id).await?;
        if !activity.is_visible {
            return Err(AppError::NotFound(format!("Activity {}", activity.id)));
        }

        if let Some(ref car_id) = input.car_id {
            let car = self
                .car_repo
                .find_by_id(car_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Car {car_id}")))?;
            if car.owner_id.as_deref() != Some(driver_id) {
                return Err(AppError::Forbidden("You do not own this car".to_string()));
            }
        }

        let model = carpool::ActiveModel {
            id: Set(self.id_gen.generate()),
            activity_id: Set(activity.id),
            driver_id: Set(Some(driver_id.to_string())),
            car_id: Set(input.car_id),
            capacity: Set(input.capacity),
            available_seats: Set(input.capacity),
            carpool_type: Set(input.carpool_type),
            departure_address: Set(input.departure_address.trim().to_string()),
            departure_postcode: Set(input.departure_postcode.trim().to_string()),
            departure_city: Set(input.departure_city.trim().to_string()),
            created_at: Set(Utc::now().into()),
        };

        let carpool = self.carpool_repo.create(model).await?;
        tracing::info!(
            carpool_id = %carpool.id,
            driver_id = %driver_id,
            capacity = carpool.capacity,
            "Carpool created"
        );
        Ok(carpool)
    }

    /// Visible activities, soonest first.
    pub async fn activities(&self) -> AppResult<Vec<activity::Model>> {
        self.activity_repo.find_visible().await
    }

    /// Carpools of an activity with car model and passengers.
    pub async fn list_by_activity(&self, activity_id: &str) -> AppResult<Vec<CarpoolSummary>> {
        let carpools = self.carpool_repo.find_by_activity(activity_id).await?;

        let car_ids: Vec<String> = carpools.iter().filter_map(|c| c.car_id.clone()).collect();
        let models: HashMap<String, Option<String>> = self
            .car_repo
            .find_by_ids(&car_ids)
            .await?
            .into_iter()
            .map(|c| (c.id, c.model_name))
            .collect();

        let mut summaries = Vec::with_capacity(carpools.len());
        for carpool in carpools {
            let passengers = self.roster.passenger_list(&carpool.id).await?;
            let car_model_name = carpool
                .car_id
                .as_ref()
                .and_then(|id| models.get(id).cloned().flatten());
            summaries.push(CarpoolSummary {
                carpool,
                car_model_name,
                passengers,
            });
        }

        Ok(summaries)
    }

    /// Carpool with activity, driver contact, car and passengers.
    pub async fn details(&self, carpool_id: &str) -> AppResult<CarpoolDetails> {
        let carpool = self.carpool_repo.get_by_id(carpool_id).await?;
        let activity = self.activity_repo.get_by_id(&carpool.activity_id).await?;

        let driver = match carpool.driver_id {
            Some(ref id) => self.user_repo.find_by_id(id).await?.map(|u| DriverContact {
                id: u.id,
                first_name: u.first_name,
                last_name: u.last_name,
                email: u.email,
                phone: u.phone,
            }),
            None => None,
        };

        let car = match carpool.car_id {
            Some(ref id) => self.car_repo.find_by_id(id).await?,
            None => None,
        };

        let passengers = self.roster.passenger_list(&carpool.id).await?;

        Ok(CarpoolDetails {
            carpool,
            activity,
            driver,
            car,
            passengers,
        })
    }

    /// Delete a carpool with everything hanging off it. Driver or admin only.
    pub async fn delete(&self, actor_id: &str, carpool_id: &str) -> AppResult<()> {
        let carpool = self.carpool_repo.get_by_id(carpool_id).await?;

        let is_driver = carpool.driver_id.as_deref() == Some(actor_id);
        if !is_driver && !self.roles.is_admin(actor_id).await? {
            return Err(AppError::Forbidden(
                "Only the driver or an admin can delete a carpool".to_string(),
            ));
        }

        self.carpool_repo.delete_aggregate(&carpool.id).await?;
        tracing::info!(carpool_id = %carpool.id, actor_id = %actor_id, "Carpool deleted");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::roles::RoleRegistry;
    use crate::services::testing;
    use carpool_db::entities::{passenger, role, role::RoleKind, user_role};
    use carpool_db::repositories::{ChildRepository, RoleRepository};
    use sea_orm::{DatabaseBackend, DatabaseConnection, MockDatabase, MockExecResult};
    use std::sync::Arc;

    fn service(db: DatabaseConnection, registry: RoleRegistry) -> CarpoolService {
        let db = Arc::new(db);
        CarpoolService::new(
            CarpoolRepository::new(db.clone()),
            ActivityRepository::new(db.clone()),
            CarRepository::new(db.clone()),
            UserRepository::new(db.clone()),
            RosterResolver::new(
                CarpoolRepository::new(db.clone()),
                ChildRepository::new(db.clone()),
                UserRepository::new(db.clone()),
            ),
            RoleService::new(RoleRepository::new(db), registry),
        )
    }

    fn input(capacity: i32, address: &str) -> CreateCarpoolInput {
        CreateCarpoolInput {
            activity_id: "act1".to_string(),
            car_id: None,
            capacity,
            carpool_type: CarpoolType::Both,
            departure_address: address.to_string(),
            departure_postcode: "11122".to_string(),
            departure_city: "Stockholm".to_string(),
        }
    }

    fn car(id: &str, owner: &str) -> car::Model {
        car::Model {
            id: id.to_string(),
            owner_id: Some(owner.to_string()),
            reg_number: "ABC123".to_string(),
            fuel_type: Some("el".to_string()),
            model_name: Some("Volvo XC40".to_string()),
            consumption: Some(1.8),
        }
    }

    #[test]
    fn test_input_validation() {
        assert!(input(0, "Storgatan 1").validate().is_err());
        assert!(input(4, "   ").validate().is_err());
        assert!(input(4, "Storgatan 1").validate().is_ok());
    }

    #[tokio::test]
    async fn test_create_sets_available_to_capacity() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[testing::activity("act1", None)]])
            .append_query_results([[testing::carpool("new", Some("d"), 4, 4)]])
            .into_connection();

        let created = service(db, RoleRegistry::default())
            .create("d", input(4, "Storgatan 1"))
            .await
            .unwrap();

        assert_eq!(created.available_seats, created.capacity);
    }

    #[tokio::test]
    async fn test_create_for_hidden_activity() {
        let mut hidden = testing::activity("act1", None);
        hidden.is_visible = false;
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[hidden]])
            .into_connection();

        let result = service(db, RoleRegistry::default())
            .create("d", input(4, "Storgatan 1"))
            .await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_create_with_someone_elses_car() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[testing::activity("act1", None)]])
            .append_query_results([[car("car1", "other")]])
            .into_connection();

        let mut req = input(4, "Storgatan 1");
        req.car_id = Some("car1".to_string());
        let result = service(db, RoleRegistry::default()).create("d", req).await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_list_includes_car_model() {
        let mut pool = testing::carpool("c1", Some("d"), 3, 3);
        pool.car_id = Some("car1".to_string());
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[pool]])
            .append_query_results([[car("car1", "d")]])
            .append_query_results([Vec::<passenger::Model>::new()])
            .into_connection();

        let list = service(db, RoleRegistry::default())
            .list_by_activity("act1")
            .await
            .unwrap();

        assert_eq!(list.len(), 1);
        assert_eq!(list[0].car_model_name.as_deref(), Some("Volvo XC40"));
        assert!(list[0].passengers.is_empty());
    }

    #[tokio::test]
    async fn test_delete_by_non_driver_forbidden() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[testing::carpool("c1", Some("d"), 3, 3)]])
            .append_query_results([Vec::<user_role::Model>::new()])
            .into_connection();

        let result = service(db, RoleRegistry::default()).delete("u1", "c1").await;

        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn test_admin_deletes_carpool() {
        let registry = RoleRegistry::from_rows([role::Model {
            id: "r-admin".to_string(),
            name: RoleKind::Admin,
        }]);
        let exec = MockExecResult {
            last_insert_id: 0,
            rows_affected: 1,
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[testing::carpool("c1", Some("d"), 3, 3)]])
            .append_query_results([[user_role::Model {
                user_id: "admin".to_string(),
                role_id: "r-admin".to_string(),
            }]])
            .append_exec_results([exec.clone(), exec.clone(), exec.clone(), exec])
            .into_connection();

        service(db, registry).delete("admin", "c1").await.unwrap();
    }
}
