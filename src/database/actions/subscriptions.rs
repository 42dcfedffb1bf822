use std::collections::HashSet;

use sqlx::{Pool, Postgres};

use crate::{
    error::{Error, QueryError},
    pagination::{Page, PageContext},
    schema::{User, UserRow, Uuid},
    validation::ValidationError,
};

pub async fn subscription_exists(
    user_id: Uuid,
    author_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<bool, Error> {
    let row: (bool,) = sqlx::query_as(
        "SELECT EXISTS (SELECT 1 FROM subscriptions WHERE user_id = $1 AND author_id = $2)",
    )
    .bind(user_id)
    .bind(author_id)
    .fetch_one(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(row.0)
}

/// `(user, author)` pairs for the authors among `author_ids` the user follows.
pub async fn list_subscription_pairs(
    user_id: Uuid,
    author_ids: &[Uuid],
    pool: &Pool<Postgres>,
) -> Result<HashSet<(Uuid, Uuid)>, Error> {
    if author_ids.is_empty() {
        return Ok(HashSet::new());
    }

    let rows: Vec<(Uuid, Uuid)> = sqlx::query_as(
        "SELECT user_id, author_id FROM subscriptions WHERE user_id = $1 AND author_id = ANY($2)",
    )
    .bind(user_id)
    .bind(author_ids)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(rows.into_iter().collect())
}

pub async fn create_subscription(
    user_id: Uuid,
    author_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    let query = sqlx::query(
        "INSERT INTO subscriptions (user_id, author_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(user_id)
    .bind(author_id)
    .execute(pool)
    .await
    .map_err(QueryError::from)?;

    if query.rows_affected() == 0 {
        return Err(ValidationError::AlreadySubscribed.into());
    }
    Ok(())
}

pub async fn delete_subscription(
    user_id: Uuid,
    author_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    let query = sqlx::query("DELETE FROM subscriptions WHERE user_id = $1 AND author_id = $2")
        .bind(user_id)
        .bind(author_id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    if query.rows_affected() == 0 {
        return Err(ValidationError::NotSubscribed.into());
    }
    Ok(())
}

/// Authors the user follows, ordered by id.
pub async fn fetch_subscriptions(
    user_id: Uuid,
    page: &Page,
    pool: &Pool<Postgres>,
) -> Result<PageContext<User>, Error> {
    let rows: Vec<UserRow> = sqlx::query_as(
        "
        SELECT u.*, COUNT(*) OVER() AS count
        FROM subscriptions s
        INNER JOIN users u ON u.id = s.author_id
        WHERE s.user_id = $1
        ORDER BY u.id
        LIMIT $2 OFFSET $3
    ",
    )
    .bind(user_id)
    .bind(page.size)
    .bind(page.offset())
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let total_count = rows.first().map(|row| row.count).unwrap_or(0);
    let rows: Vec<User> = rows.into_iter().map(User::from).collect();

    Ok(PageContext::from_rows(rows, total_count, page))
}
