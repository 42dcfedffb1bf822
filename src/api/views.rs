use std::collections::HashSet;

use serde::Serialize;
use warp::{
    http::StatusCode,
    reply::{self, Reply},
};

use crate::{
    actions::{
        get_users_by_ids, list_author_recipes, list_cart_recipe_ids, list_recipe_lines,
        list_recipe_tags, list_subscription_pairs,
    },
    config::Config,
    error::Error,
    schema::{AuthorRecipeRow, AuthorRecipes, CartKind, Recipe, RecipeIngredientRow, Tag, User, Uuid},
    subscriptions::SubscriptionLookup,
};

use super::state::AppState;

pub fn json_reply<T: Serialize>(value: &T, status: StatusCode) -> reply::Response {
    reply::with_status(reply::json(value), status).into_response()
}

pub fn no_content() -> reply::Response {
    StatusCode::NO_CONTENT.into_response()
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct UserView {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub avatar: Option<String>,
    pub is_subscribed: bool,
}

impl UserView {
    pub fn new(user: User, is_subscribed: bool, config: &Config) -> Self {
        Self {
            id: user.id,
            avatar: user.avatar.map(|path| config.media_url(&path)),
            email: user.email,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
            is_subscribed,
        }
    }
}

#[derive(Serialize, Debug)]
pub struct RegisteredUserView {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

impl From<User> for RegisteredUserView {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            username: user.username,
            first_name: user.first_name,
            last_name: user.last_name,
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct IngredientAmountView {
    pub id: Uuid,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

impl From<RecipeIngredientRow> for IngredientAmountView {
    fn from(row: RecipeIngredientRow) -> Self {
        Self {
            id: row.ingredient_id,
            name: row.name,
            measurement_unit: row.measurement_unit,
            amount: row.amount,
        }
    }
}

#[derive(Serialize, Debug)]
pub struct RecipeView {
    pub id: Uuid,
    pub tags: Vec<Tag>,
    pub author: UserView,
    pub ingredients: Vec<IngredientAmountView>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RecipeShortView {
    pub id: Uuid,
    pub name: String,
    pub image: String,
    pub cooking_time: i32,
}

impl RecipeShortView {
    pub fn new(recipe: Recipe, config: &Config) -> Self {
        Self {
            id: recipe.id,
            image: config.media_url(&recipe.image),
            name: recipe.name,
            cooking_time: recipe.cooking_time,
        }
    }

    fn from_row(row: AuthorRecipeRow, config: &Config) -> Self {
        Self {
            id: row.id,
            image: config.media_url(&row.image),
            name: row.name,
            cooking_time: row.cooking_time,
        }
    }
}

#[derive(Serialize, Debug)]
pub struct SubscriptionView {
    #[serde(flatten)]
    pub user: UserView,
    pub recipes: Vec<RecipeShortView>,
    pub recipes_count: i64,
}

impl SubscriptionView {
    pub fn new(user: UserView, recipes: AuthorRecipes, config: &Config) -> Self {
        Self {
            user,
            recipes: recipes
                .recipes
                .into_iter()
                .map(|row| RecipeShortView::from_row(row, config))
                .collect(),
            recipes_count: recipes.count,
        }
    }
}

async fn subscription_pairs(
    viewer: Option<Uuid>,
    author_ids: &[Uuid],
    state: &AppState,
) -> Result<HashSet<(Uuid, Uuid)>, Error> {
    match viewer {
        Some(viewer) => list_subscription_pairs(viewer, author_ids, &state.pool).await,
        None => Ok(HashSet::new()),
    }
}

fn is_subscribed(viewer: Option<Uuid>, author: Uuid, pairs: &HashSet<(Uuid, Uuid)>) -> bool {
    viewer.is_some_and(|viewer| pairs.is_subscribed(viewer, author))
}

pub async fn load_user_views(
    users: Vec<User>,
    viewer: Option<Uuid>,
    state: &AppState,
) -> Result<Vec<UserView>, Error> {
    let ids: Vec<Uuid> = users.iter().map(|user| user.id).collect();
    let pairs = subscription_pairs(viewer, &ids, state).await?;

    Ok(users
        .into_iter()
        .map(|user| {
            let subscribed = is_subscribed(viewer, user.id, &pairs);
            UserView::new(user, subscribed, &state.config)
        })
        .collect())
}

pub async fn load_subscription_views(
    authors: Vec<User>,
    viewer: Uuid,
    recipes_limit: Option<i64>,
    state: &AppState,
) -> Result<Vec<SubscriptionView>, Error> {
    let ids: Vec<Uuid> = authors.iter().map(|user| user.id).collect();
    let mut recipes = list_author_recipes(&ids, recipes_limit, &state.pool).await?;
    let users = load_user_views(authors, Some(viewer), state).await?;

    Ok(users
        .into_iter()
        .map(|user| {
            let author_recipes = recipes.remove(&user.id).unwrap_or_default();
            SubscriptionView::new(user, author_recipes, &state.config)
        })
        .collect())
}

/// Builds full recipe views for a page of recipes with one query per relation.
pub async fn load_recipe_views(
    recipes: Vec<Recipe>,
    viewer: Option<Uuid>,
    state: &AppState,
) -> Result<Vec<RecipeView>, Error> {
    let recipe_ids: Vec<Uuid> = recipes.iter().map(|recipe| recipe.id).collect();
    let mut author_ids: Vec<Uuid> = recipes.iter().map(|recipe| recipe.author_id).collect();
    author_ids.sort_unstable();
    author_ids.dedup();

    let authors = get_users_by_ids(&state.pool, &author_ids).await?;
    let mut lines = list_recipe_lines(&recipe_ids, &state.pool).await?;
    let mut tags = list_recipe_tags(&recipe_ids, &state.pool).await?;
    let pairs = subscription_pairs(viewer, &author_ids, state).await?;
    let (favorites, shopping_cart) = match viewer {
        Some(viewer) => (
            list_cart_recipe_ids(CartKind::Favorite, viewer, &recipe_ids, &state.pool).await?,
            list_cart_recipe_ids(CartKind::ShoppingCart, viewer, &recipe_ids, &state.pool).await?,
        ),
        None => (HashSet::new(), HashSet::new()),
    };

    Ok(recipes
        .into_iter()
        .filter_map(|recipe| {
            let author = match authors.get(&recipe.author_id) {
                Some(author) => author.to_owned(),
                None => {
                    log::warn!("Recipe {} has no author {}", recipe.id, recipe.author_id);
                    return None;
                }
            };
            let subscribed = is_subscribed(viewer, author.id, &pairs);

            Some(RecipeView {
                id: recipe.id,
                tags: tags.remove(&recipe.id).unwrap_or_default(),
                author: UserView::new(author, subscribed, &state.config),
                ingredients: lines
                    .remove(&recipe.id)
                    .unwrap_or_default()
                    .into_iter()
                    .map(IngredientAmountView::from)
                    .collect(),
                is_favorited: favorites.contains(&recipe.id),
                is_in_shopping_cart: shopping_cart.contains(&recipe.id),
                image: state.config.media_url(&recipe.image),
                name: recipe.name,
                text: recipe.text,
                cooking_time: recipe.cooking_time,
            })
        })
        .collect())
}

/// Convenience for a single recipe, `None` only if its author vanished.
pub async fn load_recipe_view(
    recipe: Recipe,
    viewer: Option<Uuid>,
    state: &AppState,
) -> Result<Option<RecipeView>, Error> {
    Ok(load_recipe_views(vec![recipe], viewer, state)
        .await?
        .into_iter()
        .next())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config::from_lookup(|key| (key == "SECRET_KEY").then(|| "secret".to_owned()))
            .expect("valid config")
    }

    fn user(avatar: Option<&str>) -> User {
        User {
            id: 4,
            email: "cook@example.com".to_owned(),
            username: "cook".to_owned(),
            first_name: "Ann".to_owned(),
            last_name: "Cook".to_owned(),
            password: "hash".to_owned(),
            avatar: avatar.map(str::to_owned),
            role: crate::schema::UserRole::User,
        }
    }

    #[test]
    fn user_view_hides_the_password_and_links_the_avatar() {
        let view = UserView::new(user(Some("avatars/a.png")), true, &config());

        let json = serde_json::to_value(&view).expect("serializes");

        assert_eq!(json["avatar"], "http://localhost:8000/media/avatars/a.png");
        assert_eq!(json["is_subscribed"], true);
        assert!(json.get("password").is_none());
    }

    #[test]
    fn subscription_view_is_flat() {
        let config = config();
        let recipes = AuthorRecipes {
            recipes: vec![AuthorRecipeRow {
                id: 9,
                author_id: 4,
                name: "Soup".to_owned(),
                image: "recipes/images/soup.png".to_owned(),
                cooking_time: 30,
            }],
            count: 3,
        };

        let view = SubscriptionView::new(UserView::new(user(None), true, &config), recipes, &config);
        let json = serde_json::to_value(&view).expect("serializes");

        assert_eq!(json["username"], "cook");
        assert_eq!(json["recipes_count"], 3);
        assert_eq!(json["recipes"][0]["name"], "Soup");
        assert_eq!(json["avatar"], serde_json::Value::Null);
    }
}
