use warp::{reject::Rejection, reply::Reply, Filter};

use super::{
    recipes::recipe_routes, reference::reference_routes, rejection::handle_rejection,
    state::AppState, users::user_routes,
};

/// The whole HTTP surface: the JSON API under `/api/` and stored images under
/// `/media/`.
pub fn routes(
    state: AppState,
) -> impl Filter<Extract = impl Reply, Error = std::convert::Infallible> + Clone {
    let media = warp::path("media").and(warp::fs::dir(state.config.media_root.to_owned()));

    api(state)
        .or(media)
        .recover(handle_rejection)
        .with(warp::log("foodgram::api"))
}

fn api(state: AppState) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    user_routes(state.clone())
        .or(recipe_routes(state.clone()))
        .or(reference_routes(state))
}
