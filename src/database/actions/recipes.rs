use sqlx::{Pool, Postgres, QueryBuilder, Transaction};

use crate::{
    authentication::permissions::ActionType,
    constants::{RECIPE_COUNT_PER_PAGE, SHORT_LINK_SEGMENT},
    drafts::{IngredientAmount, RecipeDraft, RecipePatch},
    error::Error,
    jwt::SessionData,
    pagination::PageContext,
    schema::{Id, Recipe, RecipeIngredientLine, RecipeRow, RecipeView, UserView},
};

use super::{
    relations::{relation_exists, RelationKind},
    tags::list_recipe_tags,
    users::get_user_by_id,
};

pub async fn get_recipe(id: Id, pool: &Pool<Postgres>) -> Result<Option<Recipe>, Error> {
    let row: Option<Recipe> = sqlx::query_as("SELECT * FROM recipes WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

/// Resolves a recipe for mutation. Admins may touch any recipe, everyone else
/// only their own.
pub async fn get_recipe_mut(
    id: Id,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<Recipe, Error> {
    let recipe = get_recipe(id, pool).await?.ok_or(Error::NotFound)?;
    session.authenticate(ActionType::ManageOwnRecipes)?;

    match session.authenticate(ActionType::ManageAllRecipes) {
        Ok(_) => Ok(recipe),
        Err(_) => {
            if recipe.author_id != session.user_id {
                Err(Error::Forbidden)
            } else {
                Ok(recipe)
            }
        }
    }
}

pub async fn list_ingredient_lines(
    recipe_id: Id,
    pool: &Pool<Postgres>,
) -> Result<Vec<RecipeIngredientLine>, Error> {
    let rows: Vec<RecipeIngredientLine> = sqlx::query_as(
        "
        SELECT l.ingredient_id, i.name, i.measurement_unit, l.amount
        FROM ingredient_lines l
        INNER JOIN ingredients i ON i.id = l.ingredient_id
        WHERE l.recipe_id = $1
        ORDER BY i.name
    ",
    )
    .bind(recipe_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Materializes a recipe for rendering: author, tags, ingredient lines and
/// the viewer's relation flags resolved.
pub async fn get_recipe_view(
    id: Id,
    viewer: Option<Id>,
    pool: &Pool<Postgres>,
) -> Result<RecipeView, Error> {
    let recipe = get_recipe(id, pool).await?.ok_or(Error::NotFound)?;
    let author = get_user_by_id(pool, recipe.author_id)
        .await?
        .ok_or(Error::NotFound)?;

    let tags = list_recipe_tags(id, pool).await?;
    let ingredients = list_ingredient_lines(id, pool).await?;

    let (is_favorited, is_in_shopping_cart, is_subscribed) = match viewer {
        Some(viewer_id) => (
            relation_exists(RelationKind::Favorite, viewer_id, id, pool).await?,
            relation_exists(RelationKind::ShoppingCart, viewer_id, id, pool).await?,
            relation_exists(RelationKind::Follow, viewer_id, recipe.author_id, pool).await?,
        ),
        None => (false, false, false),
    };

    Ok(RecipeView {
        id: recipe.id,
        author: UserView::from_user(author, is_subscribed),
        name: recipe.name,
        text: recipe.text,
        image: recipe.image,
        cooking_time: recipe.cooking_time,
        pub_date: recipe.pub_date,
        tags,
        ingredients,
        is_favorited,
        is_in_shopping_cart,
    })
}

/// Validates the draft, then persists the recipe row, its tag links and its
/// ingredient lines as one transaction. Nothing is stored when any step
/// fails.
pub async fn create_recipe(
    session: &SessionData,
    draft: RecipeDraft,
    pool: &Pool<Postgres>,
) -> Result<RecipeView, Error> {
    session.authenticate(ActionType::CreateRecipes)?;
    draft.validate()?;

    let mut tr = pool.begin().await?;

    let recipe: Recipe = sqlx::query_as(
        "
        INSERT INTO recipes (author_id, name, text, image, cooking_time)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING *
    ",
    )
    .bind(session.user_id)
    .bind(&draft.name)
    .bind(&draft.text)
    .bind(&draft.image)
    .bind(draft.cooking_time)
    .fetch_one(&mut *tr)
    .await?;

    insert_tag_links(&mut tr, recipe.id, &draft.tags).await?;
    insert_ingredient_lines(&mut tr, recipe.id, &draft.ingredients).await?;

    tr.commit().await?;

    get_recipe_view(recipe.id, Some(session.user_id), pool).await
}

/// Applies a partial update. Supplied association sets replace the stored
/// ones; everything happens in one transaction together with the field
/// changes.
pub async fn update_recipe(
    id: Id,
    session: &SessionData,
    patch: RecipePatch,
    pool: &Pool<Postgres>,
) -> Result<RecipeView, Error> {
    let recipe = get_recipe_mut(id, session, pool).await?;
    patch.validate()?;

    let mut tr = pool.begin().await?;

    sqlx::query("UPDATE recipes SET name = $1, text = $2, image = $3, cooking_time = $4 WHERE id = $5")
        .bind(patch.name.as_deref().unwrap_or(&recipe.name))
        .bind(patch.text.as_deref().unwrap_or(&recipe.text))
        .bind(patch.image.as_deref().or(recipe.image.as_deref()))
        .bind(patch.cooking_time.unwrap_or(recipe.cooking_time))
        .bind(recipe.id)
        .execute(&mut *tr)
        .await?;

    if let Some(tags) = &patch.tags {
        sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
            .bind(recipe.id)
            .execute(&mut *tr)
            .await?;
        insert_tag_links(&mut tr, recipe.id, tags).await?;
    }

    if let Some(ingredients) = &patch.ingredients {
        replace_ingredient_lines(&mut tr, recipe.id, ingredients).await?;
    }

    tr.commit().await?;

    get_recipe_view(recipe.id, Some(session.user_id), pool).await
}

/// Removes a recipe with its lines, tag links and relation rows.
pub async fn delete_recipe(
    id: Id,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    let recipe = get_recipe_mut(id, session, pool).await?;

    let mut tr = pool.begin().await?;

    sqlx::query("DELETE FROM ingredient_lines WHERE recipe_id = $1")
        .bind(recipe.id)
        .execute(&mut *tr)
        .await?;

    sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
        .bind(recipe.id)
        .execute(&mut *tr)
        .await?;

    sqlx::query("DELETE FROM favorites WHERE recipe_id = $1")
        .bind(recipe.id)
        .execute(&mut *tr)
        .await?;

    sqlx::query("DELETE FROM shopping_cart WHERE recipe_id = $1")
        .bind(recipe.id)
        .execute(&mut *tr)
        .await?;

    sqlx::query("DELETE FROM recipes WHERE id = $1")
        .bind(recipe.id)
        .execute(&mut *tr)
        .await?;

    tr.commit().await?;

    Ok(())
}

async fn insert_tag_links(
    tr: &mut Transaction<'_, Postgres>,
    recipe_id: Id,
    tags: &[Id],
) -> Result<(), Error> {
    let mut query_builder: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO recipe_tags (recipe_id, tag_id) ");

    query_builder.push_values(tags, |mut b, tag_id| {
        b.push_bind(recipe_id).push_bind(*tag_id);
    });

    query_builder.build().execute(&mut **tr).await?;

    Ok(())
}

async fn insert_ingredient_lines(
    tr: &mut Transaction<'_, Postgres>,
    recipe_id: Id,
    lines: &[IngredientAmount],
) -> Result<(), Error> {
    let mut query_builder: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO ingredient_lines (recipe_id, ingredient_id, amount) ");

    query_builder.push_values(lines, |mut b, line| {
        b.push_bind(recipe_id)
            .push_bind(line.ingredient_id)
            .push_bind(line.amount);
    });

    query_builder.build().execute(&mut **tr).await?;

    Ok(())
}

/// Replace-set semantics for an update: lines absent from the new set are
/// deleted, overlapping lines keep their row and get the new amount, new
/// lines are inserted.
async fn replace_ingredient_lines(
    tr: &mut Transaction<'_, Postgres>,
    recipe_id: Id,
    lines: &[IngredientAmount],
) -> Result<(), Error> {
    let keep: Vec<Id> = lines.iter().map(|line| line.ingredient_id).collect();

    sqlx::query("DELETE FROM ingredient_lines WHERE recipe_id = $1 AND ingredient_id <> ALL($2)")
        .bind(recipe_id)
        .bind(keep)
        .execute(&mut **tr)
        .await?;

    let mut query_builder: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO ingredient_lines (recipe_id, ingredient_id, amount) ");

    query_builder.push_values(lines, |mut b, line| {
        b.push_bind(recipe_id)
            .push_bind(line.ingredient_id)
            .push_bind(line.amount);
    });
    query_builder.push(" ON CONFLICT (recipe_id, ingredient_id) DO UPDATE SET amount = EXCLUDED.amount");

    query_builder.build().execute(&mut **tr).await?;

    Ok(())
}

pub async fn fetch_recipes(
    author: Option<Id>,
    tag_slug: Option<&str>,
    search: String,
    offset: i64,
    pool: &Pool<Postgres>,
) -> Result<PageContext<RecipeRow>, Error> {
    const TAG_FILTER: &str = "AND EXISTS (
        SELECT 1 FROM recipe_tags m
        INNER JOIN tags t ON t.id = m.tag_id
        WHERE m.recipe_id = r.id AND t.slug = $4
    )";

    let rows: Vec<RecipeRow> = match (author, tag_slug) {
        (Some(author), Some(tag_slug)) => {
            sqlx::query_as(&format!(
                "SELECT r.*, COUNT(*) OVER() AS count FROM recipes r WHERE r.author_id = $1 AND r.name ILIKE $2 {TAG_FILTER} ORDER BY r.pub_date DESC LIMIT $3 OFFSET $5"
            ))
            .bind(author)
            .bind(search)
            .bind(RECIPE_COUNT_PER_PAGE)
            .bind(tag_slug)
            .bind(offset)
            .fetch_all(pool)
            .await?
        }
        (Some(author), None) => {
            sqlx::query_as(
                "SELECT r.*, COUNT(*) OVER() AS count FROM recipes r WHERE r.author_id = $1 AND r.name ILIKE $2 ORDER BY r.pub_date DESC LIMIT $3 OFFSET $4",
            )
            .bind(author)
            .bind(search)
            .bind(RECIPE_COUNT_PER_PAGE)
            .bind(offset)
            .fetch_all(pool)
            .await?
        }
        (None, Some(tag_slug)) => {
            sqlx::query_as(&format!(
                "SELECT r.*, COUNT(*) OVER() AS count FROM recipes r WHERE r.name ILIKE $1 {TAG_FILTER} ORDER BY r.pub_date DESC LIMIT $2 OFFSET $3"
            ))
            .bind(search)
            .bind(RECIPE_COUNT_PER_PAGE)
            .bind(offset)
            .bind(tag_slug)
            .fetch_all(pool)
            .await?
        }
        (None, None) => {
            sqlx::query_as(
                "SELECT r.*, COUNT(*) OVER() AS count FROM recipes r WHERE r.name ILIKE $1 ORDER BY r.pub_date DESC LIMIT $2 OFFSET $3",
            )
            .bind(search)
            .bind(RECIPE_COUNT_PER_PAGE)
            .bind(offset)
            .fetch_all(pool)
            .await?
        }
    };

    let total_count = rows.first().map(|r| r.count).unwrap_or(0);
    Ok(PageContext::from_rows(
        rows,
        total_count,
        RECIPE_COUNT_PER_PAGE,
        offset,
    ))
}

/// `{base}/r/{id}/`, the shareable short form of a recipe URL.
pub fn short_link(base_url: &str, id: Id) -> String {
    format!(
        "{}/{}/{}/",
        base_url.trim_end_matches('/'),
        SHORT_LINK_SEGMENT,
        id
    )
}

pub async fn recipe_short_link(
    base_url: &str,
    id: Id,
    pool: &Pool<Postgres>,
) -> Result<String, Error> {
    if get_recipe(id, pool).await?.is_none() {
        return Err(Error::NotFound);
    }

    Ok(short_link(base_url, id))
}
