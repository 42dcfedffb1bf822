use serde_json::json;
use warp::{
    http::{header, StatusCode},
    reject::Rejection,
    reply::{self, Reply},
    Filter,
};

use crate::{
    actions::{
        add_to_cart, create_recipe, delete_recipe, fetch_ingredients_by_ids, fetch_recipes,
        get_recipe, get_recipe_mut, list_cart_ingredient_lines, list_tags_by_ids,
        load_normalized_recipe, remove_from_cart, update_recipe,
    },
    constants::{
        MAX_COUNT_PER_PAGE, RECIPE_COUNT_PER_PAGE, RECIPE_IMAGE_FOLDER, SHOPPING_LIST_FILENAME,
    },
    error::{Error, HtmlError},
    form::{Form, FormData},
    jwt::SessionData,
    media::{discard_image_on_error, remove_image, store_image},
    pagination::{Page, PageContext},
    permissions::ActionType,
    schema::{CartKind, Recipe, RecipeFilter, Uuid},
    shopping_list::render_shopping_list,
    validation::ValidationError,
    validator::{validate_recipe_draft, validate_recipe_update, RecipeDraft, RecipePatch},
};

use super::{
    state::{possible_session, session, with_state, AppState},
    views::{json_reply, load_recipe_view, load_recipe_views, no_content, RecipeShortView},
};

const RECIPE_BODY_LIMIT: u64 = 1024 * 1024 * 10;

pub fn recipe_routes(
    state: AppState,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let list = warp::path!("api" / "recipes")
        .and(warp::get())
        .and(possible_session(&state))
        .and(warp::query::<FormData>())
        .and(with_state(state.clone()))
        .and_then(handle_list_recipes);

    let create = warp::path!("api" / "recipes")
        .and(warp::post())
        .and(session(&state))
        .and(warp::body::content_length_limit(RECIPE_BODY_LIMIT))
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and_then(handle_create_recipe);

    let download = warp::path!("api" / "recipes" / "download_shopping_cart")
        .and(warp::get())
        .and(session(&state))
        .and(with_state(state.clone()))
        .and_then(handle_download_shopping_cart);

    let retrieve = warp::path!("api" / "recipes" / Uuid)
        .and(warp::get())
        .and(possible_session(&state))
        .and(with_state(state.clone()))
        .and_then(handle_get_recipe);

    let update = warp::path!("api" / "recipes" / Uuid)
        .and(warp::patch())
        .and(session(&state))
        .and(warp::body::content_length_limit(RECIPE_BODY_LIMIT))
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and_then(handle_update_recipe);

    let delete = warp::path!("api" / "recipes" / Uuid)
        .and(warp::delete())
        .and(session(&state))
        .and(with_state(state.clone()))
        .and_then(handle_delete_recipe);

    let link = warp::path!("api" / "recipes" / Uuid / "get-link")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(handle_get_link);

    list.or(create)
        .unify()
        .or(download)
        .unify()
        .or(retrieve)
        .unify()
        .or(update)
        .unify()
        .or(delete)
        .unify()
        .or(link)
        .unify()
        .or(cart_routes("favorite", CartKind::Favorite, state.clone()))
        .unify()
        .or(cart_routes("shopping_cart", CartKind::ShoppingCart, state))
        .unify()
}

fn cart_routes(
    segment: &'static str,
    kind: CartKind,
    state: AppState,
) -> impl Filter<Extract = (reply::Response,), Error = Rejection> + Clone {
    let cart = warp::path("api")
        .and(warp::path("recipes"))
        .and(warp::path::param::<Uuid>())
        .and(warp::path(segment))
        .and(warp::path::end())
        .map(move |id: Uuid| (id, kind))
        .untuple_one();

    let add = cart
        .clone()
        .and(warp::post())
        .and(session(&state))
        .and(with_state(state.clone()))
        .and_then(handle_add_to_cart);

    let remove = cart
        .and(warp::delete())
        .and(session(&state))
        .and(with_state(state))
        .and_then(handle_remove_from_cart);

    add.or(remove).unify()
}

fn recipe_filter(form: &Form) -> Result<RecipeFilter, Error> {
    Ok(RecipeFilter {
        author: form.get_optional_number::<Uuid>("author")?,
        tags: form.get_all("tags"),
        is_favorited: form.get_flag("is_favorited")?,
        is_in_shopping_cart: form.get_flag("is_in_shopping_cart")?,
    })
}

/// Reports the first requested tag id that does not exist.
async fn check_tags_exist(tags: &[Uuid], state: &AppState) -> Result<(), Error> {
    let stored = list_tags_by_ids(tags, &state.pool).await?;

    match tags
        .iter()
        .find(|id| !stored.iter().any(|tag| tag.id == **id))
    {
        Some(id) => Err(ValidationError::TagNotFound(*id).into()),
        None => Ok(()),
    }
}

async fn recipe_reply(
    recipe: Recipe,
    viewer: Uuid,
    status: StatusCode,
    state: &AppState,
) -> Result<reply::Response, Error> {
    let view = load_recipe_view(recipe, Some(viewer), state)
        .await?
        .ok_or(HtmlError::InternalServerError.default())?;

    Ok(json_reply(&view, status))
}

async fn handle_list_recipes(
    session: Option<SessionData>,
    query: FormData,
    state: AppState,
) -> Result<reply::Response, Rejection> {
    let form = Form::from_data(query);
    let filter = recipe_filter(&form)?;
    let page = Page::from_form(
        &form,
        RECIPE_COUNT_PER_PAGE,
        MAX_COUNT_PER_PAGE,
        &state.api_url("/api/recipes/"),
    )?;
    let viewer = session.map(|s| s.user_id);

    let PageContext {
        count,
        next,
        previous,
        results,
    } = fetch_recipes(&filter, viewer, &page, &state.pool).await?;
    let results = load_recipe_views(results, viewer, &state).await?;

    Ok(json_reply(
        &PageContext {
            count,
            next,
            previous,
            results,
        },
        StatusCode::OK,
    ))
}

async fn handle_get_recipe(
    id: Uuid,
    session: Option<SessionData>,
    state: AppState,
) -> Result<reply::Response, Rejection> {
    let recipe = get_recipe(id, &state.pool)
        .await?
        .ok_or(HtmlError::NotFound.new("No recipe exists with specified id"))?;

    let view = load_recipe_view(recipe, session.map(|s| s.user_id), &state)
        .await?
        .ok_or(HtmlError::NotFound.new("No recipe exists with specified id"))?;

    Ok(json_reply(&view, StatusCode::OK))
}

async fn handle_create_recipe(
    session: SessionData,
    draft: RecipeDraft,
    state: AppState,
) -> Result<reply::Response, Rejection> {
    session.authenticate(ActionType::CreateRecipes)?;

    let lookup = fetch_ingredients_by_ids(&draft.ingredient_ids(), &state.pool).await?;
    let mut recipe = validate_recipe_draft(draft, &lookup).map_err(Error::from)?;
    check_tags_exist(&recipe.tags, &state).await?;
    recipe.image = store_image(
        &recipe.image,
        RECIPE_IMAGE_FOLDER,
        "image",
        None,
        &state.config,
    )
    .await?;

    let created = create_recipe(session.user_id, &recipe, &state.pool).await;
    let id = discard_image_on_error(created, &recipe.image, &state.config).await?;
    let recipe = get_recipe(id, &state.pool)
        .await?
        .ok_or(HtmlError::InternalServerError.default())?;

    Ok(recipe_reply(recipe, session.user_id, StatusCode::CREATED, &state).await?)
}

async fn handle_update_recipe(
    id: Uuid,
    session: SessionData,
    patch: RecipePatch,
    state: AppState,
) -> Result<reply::Response, Rejection> {
    let stored = get_recipe_mut(id, &session, &state.pool).await?;
    let existing = load_normalized_recipe(&stored, &state.pool).await?;

    let lookup = fetch_ingredients_by_ids(&patch.ingredient_ids(), &state.pool).await?;
    let replaced = patch.replaced_sets();
    let mut recipe = validate_recipe_update(&existing, patch, &lookup).map_err(Error::from)?;
    if replaced.tags {
        check_tags_exist(&recipe.tags, &state).await?;
    }

    if recipe.image != existing.image {
        recipe.image = store_image(
            &recipe.image,
            RECIPE_IMAGE_FOLDER,
            "image",
            Some(&existing.image),
            &state.config,
        )
        .await?;
    }

    let updated = update_recipe(id, &recipe, replaced, &state.pool).await;
    if recipe.image != existing.image {
        discard_image_on_error(updated, &recipe.image, &state.config).await?;
        remove_image(&existing.image, &state.config).await;
    } else {
        updated?;
    }

    let recipe = get_recipe(id, &state.pool)
        .await?
        .ok_or(HtmlError::NotFound.new("No recipe exists with specified id"))?;

    Ok(recipe_reply(recipe, session.user_id, StatusCode::OK, &state).await?)
}

async fn handle_delete_recipe(
    id: Uuid,
    session: SessionData,
    state: AppState,
) -> Result<reply::Response, Rejection> {
    let recipe = get_recipe_mut(id, &session, &state.pool).await?;

    delete_recipe(recipe.id, &state.pool).await?;
    remove_image(&recipe.image, &state.config).await;
    log::info!("Recipe {} deleted by user {}", recipe.id, session.user_id);

    Ok(no_content())
}

async fn handle_get_link(id: Uuid, state: AppState) -> Result<reply::Response, Rejection> {
    let recipe = get_recipe(id, &state.pool)
        .await?
        .ok_or(HtmlError::NotFound.new("No recipe exists with specified id"))?;

    let link = state.api_url(&format!("/api/recipes/{}/", recipe.id));

    Ok(json_reply(&json!({ "short-link": link }), StatusCode::OK))
}

async fn handle_add_to_cart(
    id: Uuid,
    kind: CartKind,
    session: SessionData,
    state: AppState,
) -> Result<reply::Response, Rejection> {
    session.authenticate(ActionType::ManageOwnCarts)?;
    let recipe = get_recipe(id, &state.pool)
        .await?
        .ok_or(HtmlError::NotFound.new("No recipe exists with specified id"))?;

    add_to_cart(kind, session.user_id, recipe.id, &state.pool).await?;

    Ok(json_reply(
        &RecipeShortView::new(recipe, &state.config),
        StatusCode::CREATED,
    ))
}

async fn handle_remove_from_cart(
    id: Uuid,
    kind: CartKind,
    session: SessionData,
    state: AppState,
) -> Result<reply::Response, Rejection> {
    session.authenticate(ActionType::ManageOwnCarts)?;
    let recipe = get_recipe(id, &state.pool)
        .await?
        .ok_or(HtmlError::NotFound.new("No recipe exists with specified id"))?;

    remove_from_cart(kind, session.user_id, recipe.id, &state.pool).await?;

    Ok(no_content())
}

async fn handle_download_shopping_cart(
    session: SessionData,
    state: AppState,
) -> Result<reply::Response, Rejection> {
    session.authenticate(ActionType::ManageOwnCarts)?;

    let lines = list_cart_ingredient_lines(session.user_id, &state.pool).await?;
    let body = render_shopping_list(&lines).map_err(Error::from)?;

    let response = reply::with_header(
        reply::with_header(body, header::CONTENT_TYPE, "text/plain; charset=utf-8"),
        header::CONTENT_DISPOSITION,
        format!("attachment; filename=\"{SHOPPING_LIST_FILENAME}\""),
    );

    Ok(response.into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(pairs: &[(&str, &str)]) -> Form {
        Form::from_data(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn filter_reads_every_parameter() {
        let filter = recipe_filter(&form(&[
            ("author", "3"),
            ("tags", "lunch"),
            ("tags", "dinner"),
            ("is_favorited", "1"),
        ]))
        .expect("valid filter");

        assert_eq!(filter.author, Some(3));
        assert_eq!(filter.tags, vec!["lunch", "dinner"]);
        assert!(filter.is_favorited);
        assert!(!filter.is_in_shopping_cart);
    }

    #[test]
    fn filter_rejects_non_numeric_author() {
        assert_eq!(
            recipe_filter(&form(&[("author", "me")])).map_err(|e| e.code).err(),
            Some(400)
        );
    }
}
