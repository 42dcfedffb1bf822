use std::collections::HashMap;

use sqlx::{Pool, Postgres, QueryBuilder, Transaction};

use crate::{
    error::{Error, QueryError},
    schema::{RecipeTagRow, Tag, Uuid},
};

pub async fn list_tags(pool: &Pool<Postgres>) -> Result<Vec<Tag>, Error> {
    let rows: Vec<Tag> = sqlx::query_as("SELECT * FROM tags ORDER BY name")
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(rows)
}

pub async fn get_tag(id: Uuid, pool: &Pool<Postgres>) -> Result<Option<Tag>, Error> {
    let row: Option<Tag> = sqlx::query_as("SELECT * FROM tags WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn list_tags_by_ids(ids: &[Uuid], pool: &Pool<Postgres>) -> Result<Vec<Tag>, Error> {
    if ids.is_empty() {
        return Ok(vec![]);
    }

    let rows: Vec<Tag> = sqlx::query_as("SELECT * FROM tags WHERE id = ANY($1) ORDER BY name")
        .bind(ids)
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(rows)
}

pub async fn list_recipe_tags(
    recipe_ids: &[Uuid],
    pool: &Pool<Postgres>,
) -> Result<HashMap<Uuid, Vec<Tag>>, Error> {
    if recipe_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows: Vec<RecipeTagRow> = sqlx::query_as(
        "
        SELECT rt.recipe_id AS recipe_id, t.id AS id, t.name AS name, t.slug AS slug
        FROM recipe_tags rt
        INNER JOIN tags t ON t.id = rt.tag_id
        WHERE rt.recipe_id = ANY($1)
        ORDER BY t.name
    ",
    )
    .bind(recipe_ids)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let mut tags: HashMap<Uuid, Vec<Tag>> = HashMap::new();
    rows.into_iter().for_each(|row| {
        tags.entry(row.recipe_id).or_default().push(row.into());
    });

    Ok(tags)
}

/// Replaces the tag set of a recipe inside the caller's transaction.
pub async fn set_recipe_tags(
    recipe_id: Uuid,
    tags: &[Uuid],
    tr: &mut Transaction<'_, Postgres>,
) -> Result<(), Error> {
    sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut **tr)
        .await
        .map_err(QueryError::from)?;

    if tags.is_empty() {
        return Ok(());
    }

    let mut query_builder: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO recipe_tags (recipe_id, tag_id) ");
    query_builder.push_values(tags, |mut b, tag_id| {
        b.push_bind(recipe_id).push_bind(*tag_id);
    });

    query_builder
        .build()
        .execute(&mut **tr)
        .await
        .map_err(QueryError::from)?;

    Ok(())
}
