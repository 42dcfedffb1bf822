use std::collections::HashMap;

use sqlx::{Pool, Postgres, QueryBuilder};

use crate::{
    constants::BULK_INSERT_CHUNK,
    error::{Error, QueryError},
    schema::{Ingredient, NewIngredient, Uuid},
};

/// Ingredients ordered by name, optionally only those whose name starts with
/// `prefix` (case-insensitive).
pub async fn list_ingredients(
    prefix: Option<&str>,
    pool: &Pool<Postgres>,
) -> Result<Vec<Ingredient>, Error> {
    let rows: Vec<Ingredient> = sqlx::query_as(
        "
        SELECT * FROM ingredients
        WHERE $1::TEXT IS NULL OR starts_with(LOWER(name), LOWER($1))
        ORDER BY name, measurement_unit
    ",
    )
    .bind(prefix)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(rows)
}

pub async fn get_ingredient(id: Uuid, pool: &Pool<Postgres>) -> Result<Option<Ingredient>, Error> {
    let row: Option<Ingredient> = sqlx::query_as("SELECT * FROM ingredients WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

/// Batch form of `get_ingredient`, unknown ids are simply absent from the map.
pub async fn fetch_ingredients_by_ids(
    ids: &[Uuid],
    pool: &Pool<Postgres>,
) -> Result<HashMap<Uuid, Ingredient>, Error> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows: Vec<Ingredient> = sqlx::query_as("SELECT * FROM ingredients WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(rows
        .into_iter()
        .map(|ingredient| (ingredient.id, ingredient))
        .collect())
}

/// Inserts the ingredients, skipping ones whose `(name, measurement_unit)` is
/// already stored. Returns the number of inserted rows.
pub async fn insert_ingredients(
    ingredients: &[NewIngredient],
    pool: &Pool<Postgres>,
) -> Result<u64, Error> {
    let mut inserted = 0;

    for chunk in ingredients.chunks(BULK_INSERT_CHUNK) {
        let mut query_builder: QueryBuilder<Postgres> =
            QueryBuilder::new("INSERT INTO ingredients (name, measurement_unit) ");

        query_builder.push_values(chunk, |mut b, ingredient| {
            b.push_bind(ingredient.name.trim())
                .push_bind(ingredient.measurement_unit.trim());
        });
        query_builder.push(" ON CONFLICT (name, measurement_unit) DO NOTHING");

        let result = query_builder
            .build()
            .execute(pool)
            .await
            .map_err(QueryError::from)?;
        inserted += result.rows_affected();
    }

    Ok(inserted)
}
