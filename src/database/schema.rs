use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type Id = i32;

#[derive(
    Clone, Debug, PartialEq, PartialOrd, sqlx::Type, Serialize, Eq, Ord, Hash, Deserialize,
)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    User,
    Admin,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct User {
    pub id: Id,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub avatar: Option<String>,
    pub role: UserRole,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct Tag {
    pub id: Id,
    pub name: String,
    pub slug: String,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct Ingredient {
    pub id: Id,
    pub name: String,
    pub measurement_unit: String,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct Recipe {
    pub id: Id,
    pub author_id: Id,
    pub name: String,
    pub text: String,
    pub image: Option<String>,
    pub cooking_time: i32,
    pub pub_date: DateTime<Utc>,
}

/// Recipe row joined with the window total for paginated fetches.
#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct RecipeRow {
    pub id: Id,
    pub author_id: Id,
    pub name: String,
    pub text: String,
    pub image: Option<String>,
    pub cooking_time: i32,
    pub pub_date: DateTime<Utc>,

    pub count: i64,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct IngredientLine {
    pub recipe_id: Id,
    pub ingredient_id: Id,
    pub amount: i32,
}

/// One ingredient line of a recipe with the catalog columns resolved.
#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct RecipeIngredientLine {
    pub ingredient_id: Id,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

// Read projections rendered to clients. A write returns an entity; these are
// produced by a separate projection step with the viewer's relation flags.

#[derive(Debug, Clone, Serialize)]
pub struct UserView {
    pub id: Id,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub avatar: Option<String>,
    pub is_subscribed: bool,
}

impl UserView {
    pub fn from_user(user: User, is_subscribed: bool) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            avatar: user.avatar,
            is_subscribed,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ShortRecipeView {
    pub id: Id,
    pub name: String,
    pub image: Option<String>,
    pub cooking_time: i32,
}

impl From<Recipe> for ShortRecipeView {
    fn from(recipe: Recipe) -> Self {
        Self {
            id: recipe.id,
            name: recipe.name,
            image: recipe.image,
            cooking_time: recipe.cooking_time,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RecipeView {
    pub id: Id,
    pub author: UserView,
    pub name: String,
    pub text: String,
    pub image: Option<String>,
    pub cooking_time: i32,
    pub pub_date: DateTime<Utc>,
    pub tags: Vec<Tag>,
    pub ingredients: Vec<RecipeIngredientLine>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
}

/// Followed author row with the per-author recipe total and the window total.
#[derive(sqlx::FromRow, Debug, Clone)]
pub struct FollowedAuthorRow {
    pub id: Id,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub avatar: Option<String>,
    pub recipes_count: i64,
    pub count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FollowedAuthorView {
    #[serde(flatten)]
    pub user: UserView,
    pub recipes: Vec<ShortRecipeView>,
    pub recipes_count: i64,
}
