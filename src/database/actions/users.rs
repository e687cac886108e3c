use sqlx::{Pool, Postgres};

use crate::{
    authentication::{
        cryptography,
        jwt::{generate_jwt_session, SessionData},
        permissions::ActionType,
    },
    constants::{MAX_EMAIL_LENGTH, MAX_USERNAME_LENGTH},
    error::{Error, ValidationError},
    media::decode_data_uri,
    schema::{Id, User, UserView},
};

use super::relations::{relation_exists, RelationKind};

pub async fn get_user(pool: &Pool<Postgres>, email: &str) -> Result<Option<User>, Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

pub async fn get_user_by_id(pool: &Pool<Postgres>, user_id: Id) -> Result<Option<User>, Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

/// Registers a user; the password is stored hashed. Uniqueness of both email
/// and username is enforced by the store and surfaced as `AlreadyExists`.
pub async fn register_user(
    username: &str,
    email: &str,
    first_name: &str,
    last_name: &str,
    password: &str,
    pool: &Pool<Postgres>,
) -> Result<User, Error> {
    if username.trim().is_empty() || username.chars().count() > MAX_USERNAME_LENGTH {
        return Err(ValidationError::InvalidUsername.into());
    }
    if !email.contains('@') || email.chars().count() > MAX_EMAIL_LENGTH {
        return Err(ValidationError::InvalidEmail.into());
    }

    let hash = cryptography::hash_password(password)
        .map_err(|_| Error::Query(String::from("password hashing failed")))?;

    let user: Option<User> = sqlx::query_as(
        "
        INSERT INTO users (username, email, first_name, last_name, password)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT DO NOTHING
        RETURNING *
    ",
    )
    .bind(username)
    .bind(email)
    .bind(first_name)
    .bind(last_name)
    .bind(hash)
    .fetch_optional(pool)
    .await?;

    user.ok_or(Error::AlreadyExists)
}

/// Verifies credentials and issues a bearer token.
pub async fn login_user(
    email: &str,
    password: &str,
    pool: &Pool<Postgres>,
) -> Result<String, Error> {
    let user = get_user(pool, email)
        .await?
        .ok_or(Error::InvalidSession("invalid credentials"))?;

    let authenticated = cryptography::verify_password(password, &user.password)
        .map_err(|_| Error::InvalidSession("invalid credentials"))?;
    if !authenticated {
        return Err(Error::InvalidSession("invalid credentials"));
    }

    generate_jwt_session(&user)
}

pub async fn get_user_view(
    user_id: Id,
    viewer: Option<Id>,
    pool: &Pool<Postgres>,
) -> Result<UserView, Error> {
    let user = get_user_by_id(pool, user_id).await?.ok_or(Error::NotFound)?;

    let is_subscribed = match viewer {
        Some(viewer_id) => {
            relation_exists(RelationKind::Follow, viewer_id, user_id, pool).await?
        }
        None => false,
    };

    Ok(UserView::from_user(user, is_subscribed))
}

/// Stores a validated avatar payload on the user row.
pub async fn set_avatar(user_id: Id, payload: &str, pool: &Pool<Postgres>) -> Result<(), Error> {
    decode_data_uri(payload)?;

    let result = sqlx::query("UPDATE users SET avatar = $1 WHERE id = $2")
        .bind(payload)
        .bind(user_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

pub async fn clear_avatar(user_id: Id, pool: &Pool<Postgres>) -> Result<(), Error> {
    let result = sqlx::query("UPDATE users SET avatar = NULL WHERE id = $1")
        .bind(user_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound);
    }

    Ok(())
}

/// Removes a user together with everything hanging off them: relation rows in
/// both directions, the ingredient lines and tag links of owned recipes, the
/// relation rows pointing at those recipes, the recipes, and finally the user
/// row itself. One transaction; a failure partway leaves no orphans.
/// Users may delete their own account; any other account requires the
/// `ManageUsers` action.
pub async fn delete_user(
    user_id: Id,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    if session.user_id != user_id {
        session.authenticate(ActionType::ManageUsers)?;
    }

    let mut tr = pool.begin().await?;

    sqlx::query("DELETE FROM follows WHERE user_id = $1 OR author_id = $1")
        .bind(user_id)
        .execute(&mut *tr)
        .await?;

    sqlx::query(
        "
        DELETE FROM favorites
        WHERE user_id = $1
           OR recipe_id IN (SELECT id FROM recipes WHERE author_id = $1)
    ",
    )
    .bind(user_id)
    .execute(&mut *tr)
    .await?;

    sqlx::query(
        "
        DELETE FROM shopping_cart
        WHERE user_id = $1
           OR recipe_id IN (SELECT id FROM recipes WHERE author_id = $1)
    ",
    )
    .bind(user_id)
    .execute(&mut *tr)
    .await?;

    sqlx::query(
        "DELETE FROM ingredient_lines WHERE recipe_id IN (SELECT id FROM recipes WHERE author_id = $1)",
    )
    .bind(user_id)
    .execute(&mut *tr)
    .await?;

    sqlx::query(
        "DELETE FROM recipe_tags WHERE recipe_id IN (SELECT id FROM recipes WHERE author_id = $1)",
    )
    .bind(user_id)
    .execute(&mut *tr)
    .await?;

    sqlx::query("DELETE FROM recipes WHERE author_id = $1")
        .bind(user_id)
        .execute(&mut *tr)
        .await?;

    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user_id)
        .execute(&mut *tr)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::NotFound);
    }

    tr.commit().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use sqlx::postgres::PgPoolOptions;

    use crate::schema::UserRole;

    use super::*;

    fn session(user_id: Id, role: UserRole) -> SessionData {
        SessionData {
            user_id,
            username: String::from("alice"),
            is_admin: role == UserRole::Admin,
            role,
        }
    }

    #[tokio::test]
    async fn deleting_someone_elses_account_requires_the_admin_action() {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap();

        let result = delete_user(2, &session(1, UserRole::User), &pool).await;
        assert!(matches!(result, Err(Error::Forbidden)));
    }

    #[tokio::test]
    async fn registration_guards_fire_before_any_query() {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap();

        let result = register_user("", "a@b.c", "A", "B", "pw", &pool).await;
        assert!(matches!(
            result,
            Err(Error::Validation(ValidationError::InvalidUsername))
        ));

        let result = register_user("alice", "not-an-email", "A", "B", "pw", &pool).await;
        assert!(matches!(
            result,
            Err(Error::Validation(ValidationError::InvalidEmail))
        ));
    }
}
