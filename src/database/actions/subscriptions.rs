use std::collections::HashMap;

use sqlx::{Pool, Postgres};

use crate::{
    constants::{MAX_PAGE_SIZE, USER_COUNT_PER_PAGE},
    error::Error,
    pagination::PageContext,
    schema::{FollowedAuthorRow, FollowedAuthorView, Id, Recipe, ShortRecipeView, UserView},
};

/// Every author followed by `user_id`, annotated with their total recipe
/// count and their most recently published recipes. `recipes_limit` caps the
/// recipes carried per author; `None` means all of them.
pub async fn list_subscriptions(
    user_id: Id,
    recipes_limit: Option<usize>,
    offset: i64,
    pool: &Pool<Postgres>,
) -> Result<PageContext<FollowedAuthorView>, Error> {
    let recipes_limit = recipes_limit.map(|limit| limit.min(MAX_PAGE_SIZE as usize));

    let authors: Vec<FollowedAuthorRow> = sqlx::query_as(
        "
        SELECT u.id, u.username, u.email, u.first_name, u.last_name, u.avatar,
            (SELECT COUNT(*) FROM recipes r WHERE r.author_id = u.id) AS recipes_count,
            COUNT(*) OVER() AS count
        FROM follows f
        INNER JOIN users u ON u.id = f.author_id
        WHERE f.user_id = $1
        ORDER BY u.username
        LIMIT $2 OFFSET $3
    ",
    )
    .bind(user_id)
    .bind(USER_COUNT_PER_PAGE)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    if authors.is_empty() {
        return Ok(PageContext::no_rows());
    }

    let author_ids: Vec<Id> = authors.iter().map(|a| a.id).collect();
    let recipes: Vec<Recipe> = sqlx::query_as(
        "SELECT * FROM recipes WHERE author_id = ANY($1) ORDER BY pub_date DESC",
    )
    .bind(author_ids)
    .fetch_all(pool)
    .await?;

    let mut by_author: HashMap<Id, Vec<ShortRecipeView>> = HashMap::new();
    for recipe in recipes {
        by_author
            .entry(recipe.author_id)
            .or_default()
            .push(recipe.into());
    }

    let total_count = authors.first().map(|a| a.count).unwrap_or(0);

    let views = authors
        .into_iter()
        .map(|author| {
            let mut recipes = by_author.remove(&author.id).unwrap_or_default();
            if let Some(limit) = recipes_limit {
                recipes.truncate(limit);
            }
            FollowedAuthorView {
                user: UserView {
                    id: author.id,
                    username: author.username,
                    email: author.email,
                    first_name: author.first_name,
                    last_name: author.last_name,
                    avatar: author.avatar,
                    // followed by construction of the query
                    is_subscribed: true,
                },
                recipes,
                recipes_count: author.recipes_count,
            }
        })
        .collect();

    Ok(PageContext::from_rows(
        views,
        total_count,
        USER_COUNT_PER_PAGE,
        offset,
    ))
}
