use std::{convert::Infallible, sync::Arc};

use sqlx::{Pool, Postgres};
use warp::{reject::Rejection, Filter};

use crate::{
    config::Config,
    jwt::SessionData,
    middleware::{with_possible_session, with_session},
};

/// Shared by every request handler.
#[derive(Clone)]
pub struct AppState {
    pub pool: Pool<Postgres>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(pool: Pool<Postgres>, config: Config) -> Self {
        Self {
            pool,
            config: Arc::new(config),
        }
    }

    /// Absolute URL of an API path such as `/api/recipes/`.
    pub fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.config.public_url, path)
    }
}

pub fn with_state(state: AppState) -> impl Filter<Extract = (AppState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

pub fn session(state: &AppState) -> impl Filter<Extract = (SessionData,), Error = Rejection> + Clone {
    with_session(state.config.clone())
}

pub fn possible_session(
    state: &AppState,
) -> impl Filter<Extract = (Option<SessionData>,), Error = Rejection> + Clone {
    with_possible_session(state.config.clone())
}
