use std::collections::HashSet;

use serde::Deserialize;
use serde_json::json;
use warp::{http::StatusCode, reject::Rejection, reply::Reply, Filter};

use crate::{
    actions::{
        check_password, create_subscription, delete_subscription, fetch_subscriptions,
        fetch_users, get_user_by_id, login_user, make_password_hash, register_user,
        set_user_avatar, set_user_password, subscription_exists,
    },
    constants::{AVATAR_FOLDER, MAX_COUNT_PER_PAGE, USER_COUNT_PER_PAGE},
    error::{Error, HtmlError},
    form::{Form, FormData},
    jwt::SessionData,
    media::{discard_image_on_error, remove_image, store_image},
    pagination::{Page, PageContext},
    permissions::ActionType,
    schema::{NewUser, User, UserRole, Uuid},
    subscriptions::{check_not_self, check_subscription, check_unsubscribe},
    validation::ValidationError,
};

use super::{
    state::{possible_session, session, with_state, AppState},
    views::{
        json_reply, load_subscription_views, load_user_views, no_content, RegisteredUserView,
        UserView,
    },
};

const BODY_LIMIT: u64 = 1024 * 16;
const AVATAR_BODY_LIMIT: u64 = 1024 * 1024 * 10;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct SetPasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Deserialize)]
pub struct AvatarRequest {
    pub avatar: Option<String>,
}

pub fn user_routes(state: AppState) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let register = warp::path!("api" / "users")
        .and(warp::post())
        .and(warp::body::content_length_limit(BODY_LIMIT))
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and_then(handle_register);

    let list = warp::path!("api" / "users")
        .and(warp::get())
        .and(possible_session(&state))
        .and(warp::query::<FormData>())
        .and(with_state(state.clone()))
        .and_then(handle_list_users);

    let me = warp::path!("api" / "users" / "me")
        .and(warp::get())
        .and(session(&state))
        .and(with_state(state.clone()))
        .and_then(handle_me);

    let set_avatar = warp::path!("api" / "users" / "me" / "avatar")
        .and(warp::put())
        .and(session(&state))
        .and(warp::body::content_length_limit(AVATAR_BODY_LIMIT))
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and_then(handle_set_avatar);

    let delete_avatar = warp::path!("api" / "users" / "me" / "avatar")
        .and(warp::delete())
        .and(session(&state))
        .and(with_state(state.clone()))
        .and_then(handle_delete_avatar);

    let set_password = warp::path!("api" / "users" / "set_password")
        .and(warp::post())
        .and(session(&state))
        .and(warp::body::content_length_limit(BODY_LIMIT))
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and_then(handle_set_password);

    let subscriptions = warp::path!("api" / "users" / "subscriptions")
        .and(warp::get())
        .and(session(&state))
        .and(warp::query::<FormData>())
        .and(with_state(state.clone()))
        .and_then(handle_list_subscriptions);

    let retrieve = warp::path!("api" / "users" / Uuid)
        .and(warp::get())
        .and(possible_session(&state))
        .and(with_state(state.clone()))
        .and_then(handle_get_user);

    let subscribe = warp::path!("api" / "users" / Uuid / "subscribe")
        .and(warp::post())
        .and(session(&state))
        .and(warp::query::<FormData>())
        .and(with_state(state.clone()))
        .and_then(handle_subscribe);

    let unsubscribe = warp::path!("api" / "users" / Uuid / "subscribe")
        .and(warp::delete())
        .and(session(&state))
        .and(with_state(state.clone()))
        .and_then(handle_unsubscribe);

    let login = warp::path!("api" / "auth" / "token" / "login")
        .and(warp::post())
        .and(warp::body::content_length_limit(BODY_LIMIT))
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and_then(handle_login);

    let logout = warp::path!("api" / "auth" / "token" / "logout")
        .and(warp::post())
        .and(session(&state))
        .and_then(handle_logout);

    register
        .or(list)
        .unify()
        .or(me)
        .unify()
        .or(set_avatar)
        .unify()
        .or(delete_avatar)
        .unify()
        .or(set_password)
        .unify()
        .or(subscriptions)
        .unify()
        .or(retrieve)
        .unify()
        .or(subscribe)
        .unify()
        .or(unsubscribe)
        .unify()
        .or(login)
        .unify()
        .or(logout)
        .unify()
}

fn required(value: &str, field: &'static str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    Ok(())
}

fn validate_new_user(user: &NewUser) -> Result<(), Error> {
    required(&user.email, "email")?;
    required(&user.username, "username")?;
    required(&user.first_name, "first_name")?;
    required(&user.last_name, "last_name")?;
    required(&user.password, "password")?;

    if !user.email.contains('@') {
        return Err(Error {
            field: Some("email"),
            ..HtmlError::InvalidRequest.new("Enter a valid email address")
        });
    }
    Ok(())
}

/// `recipes_limit` of the subscription endpoints, all recipes when absent.
fn recipes_limit(form: &Form) -> Result<Option<i64>, Error> {
    Ok(form
        .get_optional_number::<i64>("recipes_limit")?
        .map(|limit| limit.max(0)))
}

async fn handle_register(
    user: NewUser,
    state: AppState,
) -> Result<warp::reply::Response, Rejection> {
    validate_new_user(&user)?;
    let password_hash = make_password_hash(&user.password)?;

    let user = register_user(&user, &password_hash, UserRole::User, &state.pool)
        .await?
        .ok_or(HtmlError::InvalidRequest.new("A user with that email or username already exists"))?;
    log::info!("Registered user {}", user.id);

    Ok(json_reply(&RegisteredUserView::from(user), StatusCode::CREATED))
}

async fn handle_login(
    request: LoginRequest,
    state: AppState,
) -> Result<warp::reply::Response, Rejection> {
    let token = login_user(&request.email, &request.password, &state.config, &state.pool).await?;

    Ok(json_reply(&json!({ "auth_token": token }), StatusCode::OK))
}

async fn handle_logout(_session: SessionData) -> Result<warp::reply::Response, Rejection> {
    Ok(no_content())
}

async fn handle_list_users(
    session: Option<SessionData>,
    query: FormData,
    state: AppState,
) -> Result<warp::reply::Response, Rejection> {
    let form = Form::from_data(query);
    let page = Page::from_form(
        &form,
        USER_COUNT_PER_PAGE,
        MAX_COUNT_PER_PAGE,
        &state.api_url("/api/users/"),
    )?;

    let users = fetch_users(&page, &state.pool).await?;
    let viewer = session.map(|s| s.user_id);
    let PageContext {
        count,
        next,
        previous,
        results,
    } = users;
    let results = load_user_views(results, viewer, &state).await?;

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

async fn current_user(session: &SessionData, state: &AppState) -> Result<User, Error> {
    get_user_by_id(&state.pool, session.user_id)
        .await?
        .ok_or(HtmlError::InvalidSession.new("User no longer exists"))
}

async fn handle_me(
    session: SessionData,
    state: AppState,
) -> Result<warp::reply::Response, Rejection> {
    let user = current_user(&session, &state).await?;

    Ok(json_reply(
        &UserView::new(user, false, &state.config),
        StatusCode::OK,
    ))
}

async fn handle_get_user(
    id: Uuid,
    session: Option<SessionData>,
    state: AppState,
) -> Result<warp::reply::Response, Rejection> {
    let user = get_user_by_id(&state.pool, id)
        .await?
        .ok_or(HtmlError::NotFound.new("No user exists with specified id"))?;

    let viewer = session.map(|s| s.user_id);
    let view = load_user_views(vec![user], viewer, &state)
        .await?
        .into_iter()
        .next()
        .ok_or(HtmlError::InternalServerError.default())?;

    Ok(json_reply(&view, StatusCode::OK))
}

async fn handle_set_password(
    session: SessionData,
    request: SetPasswordRequest,
    state: AppState,
) -> Result<warp::reply::Response, Rejection> {
    session.authenticate(ActionType::ManageOwnProfile)?;
    required(&request.new_password, "new_password").map_err(Error::from)?;

    let user = current_user(&session, &state).await?;
    if !check_password(&request.current_password, &user.password)? {
        return Err(Error {
            field: Some("current_password"),
            ..HtmlError::InvalidRequest.new("Invalid password")
        }
        .into());
    }

    let password_hash = make_password_hash(&request.new_password)?;
    set_user_password(user.id, &password_hash, &state.pool).await?;

    Ok(no_content())
}

async fn handle_set_avatar(
    session: SessionData,
    request: AvatarRequest,
    state: AppState,
) -> Result<warp::reply::Response, Rejection> {
    session.authenticate(ActionType::ManageOwnProfile)?;
    let avatar = request
        .avatar
        .filter(|avatar| !avatar.trim().is_empty())
        .ok_or(ValidationError::MissingField("avatar"))
        .map_err(Error::from)?;

    let user = current_user(&session, &state).await?;
    let path = store_image(
        &avatar,
        AVATAR_FOLDER,
        "avatar",
        user.avatar.as_deref(),
        &state.config,
    )
    .await?;

    let saved = set_user_avatar(user.id, Some(&path), &state.pool).await;
    if user.avatar.as_deref() == Some(path.as_str()) {
        saved?;
    } else {
        discard_image_on_error(saved, &path, &state.config).await?;
    }

    if let Some(old) = user.avatar.filter(|old| old != &path) {
        remove_image(&old, &state.config).await;
    }

    Ok(json_reply(
        &json!({ "avatar": state.config.media_url(&path) }),
        StatusCode::OK,
    ))
}

async fn handle_delete_avatar(
    session: SessionData,
    state: AppState,
) -> Result<warp::reply::Response, Rejection> {
    session.authenticate(ActionType::ManageOwnProfile)?;

    let user = current_user(&session, &state).await?;
    set_user_avatar(user.id, None, &state.pool).await?;
    if let Some(old) = user.avatar {
        remove_image(&old, &state.config).await;
    }

    Ok(no_content())
}

async fn handle_list_subscriptions(
    session: SessionData,
    query: FormData,
    state: AppState,
) -> Result<warp::reply::Response, Rejection> {
    session.authenticate(ActionType::ManageOwnSubscriptions)?;
    let form = Form::from_data(query);
    let limit = recipes_limit(&form)?;
    let page = Page::from_form(
        &form,
        USER_COUNT_PER_PAGE,
        MAX_COUNT_PER_PAGE,
        &state.api_url("/api/users/subscriptions/"),
    )?;

    let PageContext {
        count,
        next,
        previous,
        results,
    } = fetch_subscriptions(session.user_id, &page, &state.pool).await?;
    let results = load_subscription_views(results, session.user_id, limit, &state).await?;

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

async fn handle_subscribe(
    author_id: Uuid,
    session: SessionData,
    query: FormData,
    state: AppState,
) -> Result<warp::reply::Response, Rejection> {
    session.authenticate(ActionType::ManageOwnSubscriptions)?;
    let limit = recipes_limit(&Form::from_data(query))?;
    check_not_self(session.user_id, author_id).map_err(Error::from)?;

    let author = get_user_by_id(&state.pool, author_id)
        .await?
        .ok_or(HtmlError::NotFound.new("No user exists with specified id"))?;

    let mut existing = HashSet::new();
    if subscription_exists(session.user_id, author_id, &state.pool).await? {
        existing.insert((session.user_id, author_id));
    }
    check_subscription(session.user_id, author_id, &existing).map_err(Error::from)?;
    create_subscription(session.user_id, author_id, &state.pool).await?;
    log::debug!("User {} subscribed to {author_id}", session.user_id);

    let view = load_subscription_views(vec![author], session.user_id, limit, &state)
        .await?
        .into_iter()
        .next()
        .ok_or(HtmlError::InternalServerError.default())?;

    Ok(json_reply(&view, StatusCode::CREATED))
}

async fn handle_unsubscribe(
    author_id: Uuid,
    session: SessionData,
    state: AppState,
) -> Result<warp::reply::Response, Rejection> {
    session.authenticate(ActionType::ManageOwnSubscriptions)?;

    get_user_by_id(&state.pool, author_id)
        .await?
        .ok_or(HtmlError::NotFound.new("No user exists with specified id"))?;

    let mut existing = HashSet::new();
    if subscription_exists(session.user_id, author_id, &state.pool).await? {
        existing.insert((session.user_id, author_id));
    }
    check_unsubscribe(session.user_id, author_id, &existing).map_err(Error::from)?;
    delete_subscription(session.user_id, author_id, &state.pool).await?;

    Ok(no_content())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(email: &str, username: &str) -> NewUser {
        NewUser {
            email: email.to_owned(),
            username: username.to_owned(),
            first_name: "Ann".to_owned(),
            last_name: "Cook".to_owned(),
            password: "secret-pass".to_owned(),
        }
    }

    #[test]
    fn blank_fields_are_missing() {
        let error = validate_new_user(&new_user("cook@example.com", "  ")).expect_err("blank");

        assert_eq!(error.field, Some("username"));
    }

    #[test]
    fn email_needs_an_at_sign() {
        let error = validate_new_user(&new_user("cook", "cook")).expect_err("invalid email");

        assert_eq!(error.field, Some("email"));
        assert!(validate_new_user(&new_user("cook@example.com", "cook")).is_ok());
    }

    #[test]
    fn recipes_limit_is_optional_but_numeric() {
        let absent = Form::from_data(vec![]);
        let negative = Form::from_data(vec![("recipes_limit".to_owned(), "-3".to_owned())]);
        let garbage = Form::from_data(vec![("recipes_limit".to_owned(), "abc".to_owned())]);

        assert_eq!(recipes_limit(&absent).ok(), Some(None));
        assert_eq!(recipes_limit(&negative).ok(), Some(Some(0)));
        assert_eq!(recipes_limit(&garbage).map_err(|e| e.code), Err(400));
    }
}
