use std::collections::HashMap;

use sqlx::{Pool, Postgres};

use crate::{
    authentication::{
        cryptography::{hash_password, verify_password},
        jwt::generate_jwt_session,
    },
    config::{Config, SuperuserConfig},
    error::{Error, HtmlError, QueryError},
    pagination::{Page, PageContext},
    schema::{NewUser, User, UserRole, UserRow, Uuid},
};

pub async fn get_user_by_email(pool: &Pool<Postgres>, email: &str) -> Result<Option<User>, Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
        .bind(email)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn get_user_by_id(pool: &Pool<Postgres>, user_id: Uuid) -> Result<Option<User>, Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn get_users_by_ids(
    pool: &Pool<Postgres>,
    ids: &[Uuid],
) -> Result<HashMap<Uuid, User>, Error> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows: Vec<User> = sqlx::query_as("SELECT * FROM users WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(rows.into_iter().map(|user| (user.id, user)).collect())
}

/// Inserts a user whose `password` is already hashed. Returns `None` when the
/// email or username is taken.
pub async fn register_user(
    user: &NewUser,
    password_hash: &str,
    role: UserRole,
    pool: &Pool<Postgres>,
) -> Result<Option<User>, Error> {
    let row: Option<User> = sqlx::query_as(
        "
        INSERT INTO users (email, username, first_name, last_name, password, role)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT DO NOTHING RETURNING *;
    ",
    )
    .bind(user.email.trim())
    .bind(user.username.trim())
    .bind(user.first_name.trim())
    .bind(user.last_name.trim())
    .bind(password_hash)
    .bind(role)
    .fetch_optional(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn login_user(
    email: &str,
    password: &str,
    config: &Config,
    pool: &Pool<Postgres>,
) -> Result<String, Error> {
    let user = get_user_by_email(pool, email)
        .await?
        .ok_or(HtmlError::InvalidRequest.new("Unable to log in with provided credentials"))?;

    if !check_password(password, &user.password)? {
        return Err(HtmlError::InvalidRequest.new("Unable to log in with provided credentials"));
    }

    generate_jwt_session(&user, config)
}

pub fn check_password(password: &str, password_hash: &str) -> Result<bool, Error> {
    verify_password(password, password_hash).map_err(|e| {
        log::error!("Stored password hash is unreadable: {e}");
        HtmlError::InternalServerError.default()
    })
}

pub fn make_password_hash(password: &str) -> Result<String, Error> {
    hash_password(password).map_err(|e| {
        log::error!("Could not hash password: {e}");
        HtmlError::InternalServerError.default()
    })
}

pub async fn set_user_password(
    user_id: Uuid,
    password_hash: &str,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    sqlx::query("UPDATE users SET password = $1 WHERE id = $2")
        .bind(password_hash)
        .bind(user_id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(())
}

pub async fn set_user_avatar(
    user_id: Uuid,
    avatar: Option<&str>,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    sqlx::query("UPDATE users SET avatar = $1 WHERE id = $2")
        .bind(avatar)
        .bind(user_id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(())
}

pub async fn fetch_users(page: &Page, pool: &Pool<Postgres>) -> Result<PageContext<User>, Error> {
    let rows: Vec<UserRow> = sqlx::query_as(
        "SELECT u.*, COUNT(*) OVER() AS count FROM users u ORDER BY u.id LIMIT $1 OFFSET $2",
    )
    .bind(page.size)
    .bind(page.offset())
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let total_count = rows.first().map(|row| row.count).unwrap_or(0);
    let rows: Vec<User> = rows.into_iter().map(User::from).collect();

    Ok(PageContext::from_rows(rows, total_count, page))
}

/// Creates the configured admin unless a user with that email already exists.
/// Returns whether a user was created.
pub async fn ensure_superuser(
    superuser: &SuperuserConfig,
    pool: &Pool<Postgres>,
) -> Result<bool, Error> {
    if get_user_by_email(pool, &superuser.email).await?.is_some() {
        log::info!("Superuser {} already exists", superuser.email);
        return Ok(false);
    }

    let username = superuser
        .email
        .split('@')
        .next()
        .unwrap_or(&superuser.email)
        .to_owned();
    let user = NewUser {
        email: superuser.email.to_owned(),
        username,
        first_name: String::new(),
        last_name: String::new(),
        password: superuser.password.to_owned(),
    };
    let password_hash = make_password_hash(&user.password)?;

    let created = register_user(&user, &password_hash, UserRole::Admin, pool)
        .await?
        .is_some();
    if created {
        log::info!("Created superuser {}", superuser.email);
    } else {
        log::warn!("Could not create superuser {}, username is taken", superuser.email);
    }

    Ok(created)
}
