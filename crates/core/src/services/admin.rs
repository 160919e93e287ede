//! Admin cleanup service.

use crate::services::roles::RoleService;
use carpool_common::{AppError, AppResult};
use carpool_db::repositories::UserRepository;

/// Admin-only account cleanup.
#[derive(Clone)]
pub struct AdminService {
    user_repo: UserRepository,
    roles: RoleService,
}

impl AdminService {
    /// Create a new admin service.
    #[must_use]
    pub const fn new(user_repo: UserRepository, roles: RoleService) -> Self {
        Self { user_repo, roles }
    }

    /// Delete a user and everything that depends on them.
    ///
    /// Carpools they drive go with them; seats they or their orphaned
    /// children held are given back.
    pub async fn delete_user(&self, admin_id: &str, user_id: &str) -> AppResult<()> {
        if !self.roles.is_admin(admin_id).await? {
            return Err(AppError::Forbidden("Admin role required".to_string()));
        }
        if admin_id == user_id {
            return Err(AppError::BadRequest(
                "Admins cannot delete their own account here".to_string(),
            ));
        }

        let target = self.user_repo.get_by_id(user_id).await?;
        self.user_repo.delete_with_dependents(&target.id).await?;

        tracing::info!(admin_id = %admin_id, user_id = %target.id, "User deleted by admin");
        Ok(())
    }
}
