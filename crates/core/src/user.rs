use crate::id::{OrganizationId, UserId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn is_admin(self) -> bool {
        matches!(self, Role::Admin)
    }
}

/// `(id, organization, username, role)`. An admin is scoped to their own
/// organization — there is no platform-admin concept in this subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub organization_id: OrganizationId,
    pub username: String,
    pub role: Role,
    /// Argon2 PHC string. Never serialized back out over the wire.
    #[serde(skip_serializing)]
    pub password_hash: String,
}

impl User {
    pub fn can_administer(&self) -> bool {
        self.role.is_admin()
    }
}
