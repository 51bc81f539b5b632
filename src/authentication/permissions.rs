use crate::{schema::UserRole, session::SessionData};

const ACTION_TABLE: &[(UserRole, &[ActionType])] = &[
    (
        UserRole::User,
        &[
            ActionType::CreateRecipes,
            ActionType::ManageOwnRecipes,
            ActionType::ManageOwnMarks,
            ActionType::ManageOwnSubscriptions,
        ],
    ),
    (
        UserRole::Admin,
        &[
            ActionType::CreateRecipes,
            ActionType::ManageOwnRecipes,
            ActionType::ManageOwnMarks,
            ActionType::ManageOwnSubscriptions,
            ActionType::ManageAllRecipes,
            ActionType::ManageTags,
            ActionType::ManageIngredients,
        ],
    ),
];

#[derive(Hash, PartialEq, Eq, PartialOrd, Ord, Debug, Clone, Copy)]
pub enum ActionType {
    CreateRecipes,

    ManageOwnRecipes,
    ManageOwnMarks,
    ManageOwnSubscriptions,

    ManageAllRecipes,
    ManageTags,
    ManageIngredients,
}

impl ActionType {
    pub fn authenticate(self, session: &SessionData) -> bool {
        let user_role = &session.user_role;

        ACTION_TABLE
            .iter()
            .find_map(|(role, actions)| {
                if user_role != role {
                    return None;
                }

                Some(actions.contains(&self))
            })
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(id: i32, role: UserRole) -> SessionData {
        SessionData::new(id, format!("user{id}"), role)
    }

    #[test]
    fn users_cannot_manage_reference_data() {
        let user = session(1, UserRole::User);
        assert!(ActionType::CreateRecipes.authenticate(&user));
        assert!(!ActionType::ManageTags.authenticate(&user));
        assert!(!ActionType::ManageIngredients.authenticate(&user));
        assert!(user.authenticate(ActionType::ManageAllRecipes).is_err());
    }

    #[test]
    fn authors_manage_only_their_own_recipes() {
        let user = session(1, UserRole::User);
        assert!(user.can_manage(1, ActionType::ManageOwnRecipes, ActionType::ManageAllRecipes));
        assert!(!user.can_manage(2, ActionType::ManageOwnRecipes, ActionType::ManageAllRecipes));
    }

    #[test]
    fn admins_manage_every_recipe() {
        let admin = session(9, UserRole::Admin);
        assert!(admin.can_manage(2, ActionType::ManageOwnRecipes, ActionType::ManageAllRecipes));
    }
}
