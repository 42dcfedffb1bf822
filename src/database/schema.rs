use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

pub type Uuid = i32;

#[derive(
    Clone, Debug, PartialEq, PartialOrd, sqlx::Type, Serialize, Eq, Ord, Hash, Deserialize,
)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    User,
    Admin,
}

/// The two per-user recipe collections. Both are plain `(user, recipe)` sets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CartKind {
    Favorite,
    ShoppingCart,
}

impl CartKind {
    pub fn table(&self) -> &'static str {
        match self {
            CartKind::Favorite => "favorites",
            CartKind::ShoppingCart => "shopping_carts",
        }
    }
}

impl Display for CartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CartKind::Favorite => write!(f, "favorites"),
            CartKind::ShoppingCart => write!(f, "the shopping cart"),
        }
    }
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    pub avatar: Option<String>,
    pub role: UserRole,
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
    pub avatar: Option<String>,
    pub role: UserRole,

    pub count: i64,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            username: row.username,
            first_name: row.first_name,
            last_name: row.last_name,
            password: row.password,
            avatar: row.avatar,
            role: row.role,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Ingredient {
    pub id: Uuid,
    pub name: String,
    pub measurement_unit: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewIngredient {
    pub name: String,
    pub measurement_unit: String,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct Recipe {
    pub id: Uuid,
    pub author_id: Uuid,
    pub name: String,
    pub text: String,
    pub image: String,
    pub cooking_time: i32,
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct RecipeRow {
    pub id: Uuid,
    pub author_id: Uuid,
    pub name: String,
    pub text: String,
    pub image: String,
    pub cooking_time: i32,

    pub count: i64,
}

impl From<RecipeRow> for Recipe {
    fn from(row: RecipeRow) -> Self {
        Self {
            id: row.id,
            author_id: row.author_id,
            name: row.name,
            text: row.text,
            image: row.image,
            cooking_time: row.cooking_time,
        }
    }
}

/// Recipe in the short form used by carts and subscriptions.
#[derive(sqlx::FromRow, Debug, Clone)]
pub struct AuthorRecipeRow {
    pub id: Uuid,
    pub author_id: Uuid,
    pub name: String,
    pub image: String,
    pub cooking_time: i32,
}

/// The newest recipes of one author, `count` is the author's total.
#[derive(Debug, Clone, Default)]
pub struct AuthorRecipes {
    pub recipes: Vec<AuthorRecipeRow>,
    pub count: i64,
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct RecipeIngredientRow {
    pub recipe_id: Uuid,
    pub ingredient_id: Uuid,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

#[derive(sqlx::FromRow, Debug, Clone)]
pub struct RecipeTagRow {
    pub recipe_id: Uuid,
    pub id: Uuid,
    pub name: String,
    pub slug: String,
}

impl From<RecipeTagRow> for Tag {
    fn from(row: RecipeTagRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            slug: row.slug,
        }
    }
}

/// One ingredient line of a recipe sitting in someone's shopping cart.
#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Eq)]
pub struct CartLine {
    pub name: String,
    pub measurement_unit: String,
    pub amount: i64,
}

impl CartLine {
    pub fn new(name: &str, measurement_unit: &str, amount: i64) -> Self {
        Self {
            name: name.to_owned(),
            measurement_unit: measurement_unit.to_owned(),
            amount,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecipeFilter {
    pub author: Option<Uuid>,
    pub tags: Vec<String>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
}
