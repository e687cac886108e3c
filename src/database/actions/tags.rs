use sqlx::{Pool, Postgres};

use crate::{
    error::Error,
    schema::{Id, Tag},
};

// Tags are immutable reference data loaded out of band; only reads live here.

pub async fn list_tags(pool: &Pool<Postgres>) -> Result<Vec<Tag>, Error> {
    let list: Vec<Tag> = sqlx::query_as("SELECT * FROM tags ORDER BY name")
        .fetch_all(pool)
        .await?;

    Ok(list)
}

pub async fn get_tag(id: Id, pool: &Pool<Postgres>) -> Result<Option<Tag>, Error> {
    let tag: Option<Tag> = sqlx::query_as("SELECT * FROM tags WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(tag)
}

pub async fn find_tag_by_slug(slug: &str, pool: &Pool<Postgres>) -> Result<Option<Tag>, Error> {
    let tag: Option<Tag> = sqlx::query_as("SELECT * FROM tags WHERE slug = $1")
        .bind(slug)
        .fetch_optional(pool)
        .await?;

    Ok(tag)
}

pub async fn list_recipe_tags(recipe_id: Id, pool: &Pool<Postgres>) -> Result<Vec<Tag>, Error> {
    let list: Vec<Tag> = sqlx::query_as(
        "
        SELECT t.*
        FROM recipe_tags m
        INNER JOIN tags t ON t.id = m.tag_id
        WHERE m.recipe_id = $1
        ORDER BY t.name
    ",
    )
    .bind(recipe_id)
    .fetch_all(pool)
    .await?;

    Ok(list)
}
