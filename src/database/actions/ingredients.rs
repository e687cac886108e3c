use sqlx::{Pool, Postgres};

use crate::{
    error::Error,
    schema::{Id, Ingredient},
};

pub async fn get_ingredient(id: Id, pool: &Pool<Postgres>) -> Result<Option<Ingredient>, Error> {
    let ingredient: Option<Ingredient> =
        sqlx::query_as("SELECT * FROM ingredients WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;

    Ok(ingredient)
}

/// Catalog lookup with a case-insensitive name-prefix filter; an empty prefix
/// lists everything.
pub async fn fetch_ingredients(
    prefix: &str,
    pool: &Pool<Postgres>,
) -> Result<Vec<Ingredient>, Error> {
    let list: Vec<Ingredient> = sqlx::query_as(
        "SELECT * FROM ingredients WHERE name ILIKE $1 || '%' ORDER BY name, measurement_unit",
    )
    .bind(prefix)
    .fetch_all(pool)
    .await?;

    Ok(list)
}
