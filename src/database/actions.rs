use sqlx::{Pool, Postgres};

use super::error::QueryError;

mod carts;
mod ingredients;
mod recipes;
mod subscriptions;
mod tags;
mod users;

pub use carts::*;
pub use ingredients::*;
pub use recipes::*;
pub use subscriptions::*;
pub use tags::*;
pub use users::*;

pub async fn run_migrations(pool: &Pool<Postgres>) -> Result<(), QueryError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    log::info!("Database migrations applied");

    Ok(())
}
