//! Role registry.
//!
//! The role set is fixed. It is seeded once at startup (missing rows are
//! inserted) and then looked up by kind or by stored ID everywhere else.

use carpool_common::{AppResult, IdGenerator};
use carpool_db::{
    entities::{role, role::RoleKind},
    repositories::RoleRepository,
};
use std::collections::HashMap;
use std::sync::Arc;

/// Immutable mapping between role kinds and their stored IDs.
#[derive(Debug, Clone, Default)]
pub struct RoleRegistry {
    ids: Arc<HashMap<RoleKind, String>>,
    kinds: Arc<HashMap<String, RoleKind>>,
}

impl RoleRegistry {
    /// Build a registry from stored rows.
    #[must_use]
    pub fn from_rows(rows: impl IntoIterator<Item = role::Model>) -> Self {
        let mut ids = HashMap::new();
        let mut kinds = HashMap::new();
        for row in rows {
            kinds.insert(row.id.clone(), row.name);
            ids.insert(row.name, row.id);
        }
        Self {
            ids: Arc::new(ids),
            kinds: Arc::new(kinds),
        }
    }

    /// Seed missing roles and load the registry.
    pub async fn load(repo: &RoleRepository, id_gen: &IdGenerator) -> AppResult<Self> {
        let mut rows = repo.find_all().await?;

        for kind in RoleKind::ALL {
            if rows.iter().any(|r| r.name == kind) {
                continue;
            }
            let created = repo.create(&id_gen.generate(), kind).await?;
            tracing::info!(role = ?kind, id = %created.id, "Seeded role");
            rows.push(created);
        }

        Ok(Self::from_rows(rows))
    }

    /// Stored ID of a role.
    #[must_use]
    pub fn id_of(&self, kind: RoleKind) -> Option<&str> {
        self.ids.get(&kind).map(String::as_str)
    }

    /// Role kind for a stored ID.
    #[must_use]
    pub fn kind_of(&self, id: &str) -> Option<RoleKind> {
        self.kinds.get(id).copied()
    }
}

/// Role checks for users.
#[derive(Clone)]
pub struct RoleService {
    role_repo: RoleRepository,
    registry: RoleRegistry,
}

impl RoleService {
    #[must_use]
    pub const fn new(role_repo: RoleRepository, registry: RoleRegistry) -> Self {
        Self {
            role_repo,
            registry,
        }
    }

    #[must_use]
    pub const fn registry(&self) -> &RoleRegistry {
        &self.registry
    }

    /// Roles held by a user.
    pub async fn roles_of(&self, user_id: &str) -> AppResult<Vec<RoleKind>> {
        let ids = self.role_repo.role_ids_of_user(user_id).await?;
        Ok(ids
            .iter()
            .filter_map(|id| self.registry.kind_of(id))
            .collect())
    }

    /// Whether the user holds the admin role.
    pub async fn is_admin(&self, user_id: &str) -> AppResult<bool> {
        Ok(self.roles_of(user_id).await?.contains(&RoleKind::Admin))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use carpool_db::entities::user_role;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn row(id: &str, name: RoleKind) -> role::Model {
        role::Model {
            id: id.to_string(),
            name,
        }
    }

    #[test]
    fn test_registry_lookups() {
        let registry = RoleRegistry::from_rows([
            row("r1", RoleKind::Guardian),
            row("r2", RoleKind::Tumlare),
        ]);

        assert_eq!(registry.id_of(RoleKind::Tumlare), Some("r2"));
        assert_eq!(registry.kind_of("r1"), Some(RoleKind::Guardian));
        assert_eq!(registry.id_of(RoleKind::Admin), None);
        assert_eq!(registry.kind_of("zz"), None);
    }

    #[tokio::test]
    async fn test_load_seeds_missing_roles() {
        let existing: Vec<role::Model> = RoleKind::ALL
            .into_iter()
            .filter(|k| *k != RoleKind::Rover)
            .enumerate()
            .map(|(i, k)| row(&format!("r{i}"), k))
            .collect();

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([existing])
                .append_query_results([[row("r-rover", RoleKind::Rover)]])
                .into_connection(),
        );

        let registry = RoleRegistry::load(&RoleRepository::new(db), &IdGenerator::new())
            .await
            .unwrap();

        assert_eq!(registry.id_of(RoleKind::Rover), Some("r-rover"));
        assert!(registry.id_of(RoleKind::Admin).is_some());
    }

    #[tokio::test]
    async fn test_is_admin() {
        let registry =
            RoleRegistry::from_rows([row("r-admin", RoleKind::Admin), row("r-g", RoleKind::Guardian)]);

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[user_role::Model {
                    user_id: "u1".to_string(),
                    role_id: "r-admin".to_string(),
                }]])
                .append_query_results([[user_role::Model {
                    user_id: "u2".to_string(),
                    role_id: "r-g".to_string(),
                }]])
                .into_connection(),
        );

        let service = RoleService::new(RoleRepository::new(db), registry);
        assert!(service.is_admin("u1").await.unwrap());
        assert!(!service.is_admin("u2").await.unwrap());
    }
}
