use warp::{http::StatusCode, reject::Rejection, reply::Reply, Filter};

use crate::{
    actions::{get_ingredient, get_tag, list_ingredients, list_tags},
    error::HtmlError,
    form::{Form, FormData},
    schema::Uuid,
};

use super::{
    state::{with_state, AppState},
    views::json_reply,
};

pub fn reference_routes(
    state: AppState,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let ingredients = warp::path!("api" / "ingredients")
        .and(warp::get())
        .and(warp::query::<FormData>())
        .and(with_state(state.clone()))
        .and_then(handle_list_ingredients);

    let ingredient = warp::path!("api" / "ingredients" / Uuid)
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(handle_get_ingredient);

    let tags = warp::path!("api" / "tags")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(handle_list_tags);

    let tag = warp::path!("api" / "tags" / Uuid)
        .and(warp::get())
        .and(with_state(state))
        .and_then(handle_get_tag);

    ingredients.or(ingredient).or(tags).or(tag)
}

async fn handle_list_ingredients(
    query: FormData,
    state: AppState,
) -> Result<warp::reply::Response, Rejection> {
    let form = Form::from_data(query);
    let prefix = form.get_str("name");

    let ingredients = list_ingredients(prefix.as_deref(), &state.pool).await?;

    Ok(json_reply(&ingredients, StatusCode::OK))
}

async fn handle_get_ingredient(
    id: Uuid,
    state: AppState,
) -> Result<warp::reply::Response, Rejection> {
    let ingredient = get_ingredient(id, &state.pool)
        .await?
        .ok_or(HtmlError::NotFound.new("No ingredient exists with specified id"))?;

    Ok(json_reply(&ingredient, StatusCode::OK))
}

async fn handle_list_tags(state: AppState) -> Result<warp::reply::Response, Rejection> {
    let tags = list_tags(&state.pool).await?;

    Ok(json_reply(&tags, StatusCode::OK))
}

async fn handle_get_tag(id: Uuid, state: AppState) -> Result<warp::reply::Response, Rejection> {
    let tag = get_tag(id, &state.pool)
        .await?
        .ok_or(HtmlError::NotFound.new("No tag exists with specified id"))?;

    Ok(json_reply(&tag, StatusCode::OK))
}
