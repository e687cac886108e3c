use crate::{jwt::SessionData, schema::UserRole};

const ACTION_TABLE: &[(UserRole, &[ActionType])] = &[
    (
        UserRole::User,
        &[
            ActionType::CreateRecipes,
            ActionType::ManageOwnRecipes,
            ActionType::ManageOwnRelations,
        ],
    ),
    (
        UserRole::Admin,
        &[
            ActionType::CreateRecipes,
            ActionType::ManageOwnRecipes,
            ActionType::ManageOwnRelations,
            ActionType::ManageAllRecipes,
            ActionType::ManageUsers,
        ],
    ),
];

#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum ActionType {
    CreateRecipes,

    ManageOwnRecipes,
    ManageOwnRelations,

    ManageUsers,
    ManageAllRecipes,
}

impl ActionType {
    pub fn authenticate(&self, session: &SessionData) -> bool {
        ACTION_TABLE
            .iter()
            .find_map(|(role, actions)| {
                if &session.role != role {
                    return None;
                }

                Some(actions.contains(self))
            })
            .unwrap_or(false)
    }
}
