use sqlx::{Pool, Postgres};

use crate::{
    authentication::permissions::ActionType,
    constants::RECIPE_COUNT_PER_PAGE,
    error::{Error, ValidationError},
    jwt::SessionData,
    pagination::PageContext,
    schema::{Id, RecipeRow},
};

/// The three user-to-target relation tables. Each is a unique
/// (user, target) pair; Follow additionally forbids self-loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    Follow,
    Favorite,
    ShoppingCart,
}

impl RelationKind {
    pub fn table(self) -> &'static str {
        match self {
            RelationKind::Follow => "follows",
            RelationKind::Favorite => "favorites",
            RelationKind::ShoppingCart => "shopping_cart",
        }
    }

    pub fn target_column(self) -> &'static str {
        match self {
            RelationKind::Follow => "author_id",
            RelationKind::Favorite => "recipe_id",
            RelationKind::ShoppingCart => "recipe_id",
        }
    }
}

fn check_self_reference(kind: RelationKind, user_id: Id, target_id: Id) -> Result<(), ValidationError> {
    if kind == RelationKind::Follow && user_id == target_id {
        return Err(ValidationError::SelfReferenceNotAllowed);
    }
    Ok(())
}

/// Creates the join row if absent. The table's uniqueness constraint is the
/// authoritative race guard: two concurrent adds for the same pair leave one
/// row, and the loser observes `AlreadyExists` through zero affected rows.
pub async fn add_relation(
    kind: RelationKind,
    user_id: Id,
    target_id: Id,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    check_self_reference(kind, user_id, target_id)?;

    let result = sqlx::query(&format!(
        "INSERT INTO {} (user_id, {}) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        kind.table(),
        kind.target_column()
    ))
    .bind(user_id)
    .bind(target_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::AlreadyExists);
    }

    Ok(())
}

pub async fn remove_relation(
    kind: RelationKind,
    user_id: Id,
    target_id: Id,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    let result = sqlx::query(&format!(
        "DELETE FROM {} WHERE user_id = $1 AND {} = $2",
        kind.table(),
        kind.target_column()
    ))
    .bind(user_id)
    .bind(target_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Pure predicate behind the `is_subscribed` / `is_favorited` /
/// `is_in_shopping_cart` view flags.
pub async fn relation_exists(
    kind: RelationKind,
    user_id: Id,
    target_id: Id,
    pool: &Pool<Postgres>,
) -> Result<bool, Error> {
    let row: Option<(i32,)> = sqlx::query_as(&format!(
        "SELECT 1 FROM {} WHERE user_id = $1 AND {} = $2",
        kind.table(),
        kind.target_column()
    ))
    .bind(user_id)
    .bind(target_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.is_some())
}

// The wrappers mutate the acting user's own relation rows, so they take the
// session and gate on ManageOwnRelations before touching the store.

pub async fn follow_user(
    session: &SessionData,
    author_id: Id,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    session.authenticate(ActionType::ManageOwnRelations)?;
    add_relation(RelationKind::Follow, session.user_id, author_id, pool).await
}

pub async fn unfollow_user(
    session: &SessionData,
    author_id: Id,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    session.authenticate(ActionType::ManageOwnRelations)?;
    remove_relation(RelationKind::Follow, session.user_id, author_id, pool).await
}

pub async fn add_to_favorites(
    session: &SessionData,
    recipe_id: Id,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    session.authenticate(ActionType::ManageOwnRelations)?;
    add_relation(RelationKind::Favorite, session.user_id, recipe_id, pool).await
}

pub async fn remove_from_favorites(
    session: &SessionData,
    recipe_id: Id,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    session.authenticate(ActionType::ManageOwnRelations)?;
    remove_relation(RelationKind::Favorite, session.user_id, recipe_id, pool).await
}

pub async fn add_to_shopping_cart(
    session: &SessionData,
    recipe_id: Id,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    session.authenticate(ActionType::ManageOwnRelations)?;
    add_relation(RelationKind::ShoppingCart, session.user_id, recipe_id, pool).await
}

pub async fn remove_from_shopping_cart(
    session: &SessionData,
    recipe_id: Id,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    session.authenticate(ActionType::ManageOwnRelations)?;
    remove_relation(RelationKind::ShoppingCart, session.user_id, recipe_id, pool).await
}

pub async fn fetch_favorites(
    user_id: Id,
    offset: i64,
    pool: &Pool<Postgres>,
) -> Result<PageContext<RecipeRow>, Error> {
    let rows: Vec<RecipeRow> = sqlx::query_as(
        "
        SELECT r.*, COUNT(*) OVER() AS count
        FROM favorites f
        INNER JOIN recipes r ON r.id = f.recipe_id
        WHERE f.user_id = $1
        ORDER BY r.pub_date DESC
        LIMIT $2 OFFSET $3
    ",
    )
    .bind(user_id)
    .bind(RECIPE_COUNT_PER_PAGE)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    let total_count = rows.first().map(|r| r.count).unwrap_or(0);
    Ok(PageContext::from_rows(
        rows,
        total_count,
        RECIPE_COUNT_PER_PAGE,
        offset,
    ))
}

#[cfg(test)]
mod tests {
    use sqlx::postgres::PgPoolOptions;

    use crate::schema::UserRole;

    use super::*;

    fn session(user_id: Id) -> SessionData {
        SessionData {
            user_id,
            username: String::from("alice"),
            role: UserRole::User,
            is_admin: false,
        }
    }

    fn lazy_pool() -> Pool<Postgres> {
        PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap()
    }

    #[tokio::test]
    async fn follow_user_rejects_self_before_any_query() {
        let err = follow_user(&session(7), 7, &lazy_pool()).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Validation(ValidationError::SelfReferenceNotAllowed)
        ));
    }

    #[test]
    fn follow_rejects_self_reference_before_the_store_is_touched() {
        assert_eq!(
            check_self_reference(RelationKind::Follow, 7, 7),
            Err(ValidationError::SelfReferenceNotAllowed)
        );
        assert!(check_self_reference(RelationKind::Follow, 7, 8).is_ok());
    }

    #[test]
    fn recipe_relations_allow_matching_ids() {
        // A user id equal to a recipe id is a coincidence, not a self-loop.
        assert!(check_self_reference(RelationKind::Favorite, 7, 7).is_ok());
        assert!(check_self_reference(RelationKind::ShoppingCart, 7, 7).is_ok());
    }

    #[test]
    fn kinds_map_to_their_tables() {
        assert_eq!(RelationKind::Follow.table(), "follows");
        assert_eq!(RelationKind::Follow.target_column(), "author_id");
        assert_eq!(RelationKind::Favorite.table(), "favorites");
        assert_eq!(RelationKind::ShoppingCart.table(), "shopping_cart");
        assert_eq!(RelationKind::ShoppingCart.target_column(), "recipe_id");
    }
}
