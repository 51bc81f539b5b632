use potion::HtmlError;
use serde::{Deserialize, Serialize};

use crate::schema::{User, UserRole, Uuid};

use super::permissions::ActionType;

/// Identity of the user performing an action, as handed over by whatever
/// layer authenticated the request.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionData {
    pub user_id: Uuid,
    pub username: String,
    pub user_role: UserRole,
}

impl SessionData {
    pub fn new(user_id: Uuid, username: String, user_role: UserRole) -> Self {
        Self {
            user_id,
            username,
            user_role,
        }
    }

    pub fn authenticate(&self, action: ActionType) -> Result<(), potion::Error> {
        if !action.authenticate(self) {
            return Err(
                HtmlError::Unauthorized.new("You don't have permission to perform this action")
            );
        }
        Ok(())
    }

    /// Whether this session may change an object owned by `owner_id`.
    pub fn can_manage(&self, owner_id: Uuid, own: ActionType, all: ActionType) -> bool {
        if all.authenticate(self) {
            return true;
        }
        own.authenticate(self) && owner_id == self.user_id
    }
}

impl From<&User> for SessionData {
    fn from(user: &User) -> Self {
        Self::new(user.id, user.username.to_owned(), user.role.to_owned())
    }
}
