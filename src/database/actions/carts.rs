use std::collections::HashSet;

use sqlx::{Pool, Postgres};

use crate::{
    error::{Error, QueryError},
    schema::{CartKind, CartLine, Uuid},
    validation::ValidationError,
};

pub async fn add_to_cart(
    kind: CartKind,
    user_id: Uuid,
    recipe_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    let query = sqlx::query(&format!(
        "INSERT INTO {} (user_id, recipe_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        kind.table()
    ))
    .bind(user_id)
    .bind(recipe_id)
    .execute(pool)
    .await
    .map_err(QueryError::from)?;

    if query.rows_affected() == 0 {
        return Err(ValidationError::AlreadyInCart(kind).into());
    }
    Ok(())
}

pub async fn remove_from_cart(
    kind: CartKind,
    user_id: Uuid,
    recipe_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    let query = sqlx::query(&format!(
        "DELETE FROM {} WHERE user_id = $1 AND recipe_id = $2",
        kind.table()
    ))
    .bind(user_id)
    .bind(recipe_id)
    .execute(pool)
    .await
    .map_err(QueryError::from)?;

    if query.rows_affected() == 0 {
        return Err(ValidationError::NotInCart(kind).into());
    }
    Ok(())
}

/// Which of `recipe_ids` the user keeps in the given cart.
pub async fn list_cart_recipe_ids(
    kind: CartKind,
    user_id: Uuid,
    recipe_ids: &[Uuid],
    pool: &Pool<Postgres>,
) -> Result<HashSet<Uuid>, Error> {
    if recipe_ids.is_empty() {
        return Ok(HashSet::new());
    }

    let rows: Vec<(Uuid,)> = sqlx::query_as(&format!(
        "SELECT recipe_id FROM {} WHERE user_id = $1 AND recipe_id = ANY($2)",
        kind.table()
    ))
    .bind(user_id)
    .bind(recipe_ids)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(rows.into_iter().map(|row| row.0).collect())
}

/// Every ingredient line of every recipe in the user's shopping cart,
/// unaggregated.
pub async fn list_cart_ingredient_lines(
    user_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<Vec<CartLine>, Error> {
    let rows: Vec<CartLine> = sqlx::query_as(
        "
        SELECT i.name AS name, i.measurement_unit AS measurement_unit, ri.amount::BIGINT AS amount
        FROM shopping_carts c
        INNER JOIN recipe_ingredients ri ON ri.recipe_id = c.recipe_id
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE c.user_id = $1
    ",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(rows)
}
