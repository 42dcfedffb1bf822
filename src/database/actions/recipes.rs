use std::collections::HashMap;

use sqlx::{Pool, Postgres, QueryBuilder, Transaction};

use crate::{
    authentication::permissions::ActionType,
    error::{Error, HtmlError, QueryError},
    jwt::SessionData,
    pagination::{Page, PageContext},
    schema::{
        AuthorRecipeRow, AuthorRecipes, Ingredient, Recipe, RecipeFilter, RecipeIngredientRow,
        RecipeRow, Uuid,
    },
    validator::{NormalizedRecipe, RecipeLine, ReplacedSets},
};

use super::tags::set_recipe_tags;

/// Newest recipes first. The cart filters only apply to a known viewer, an
/// anonymous viewer asking for them gets an empty page.
pub async fn fetch_recipes(
    filter: &RecipeFilter,
    viewer: Option<Uuid>,
    page: &Page,
    pool: &Pool<Postgres>,
) -> Result<PageContext<Recipe>, Error> {
    if viewer.is_none() && (filter.is_favorited || filter.is_in_shopping_cart) {
        return Ok(PageContext::no_rows(0, page));
    }

    let mut query_builder: QueryBuilder<Postgres> =
        QueryBuilder::new("SELECT r.*, COUNT(*) OVER() AS count FROM recipes r WHERE TRUE");

    if let Some(author) = filter.author {
        query_builder.push(" AND r.author_id = ").push_bind(author);
    }
    if !filter.tags.is_empty() {
        query_builder
            .push(
                " AND EXISTS (SELECT 1 FROM recipe_tags rt INNER JOIN tags t ON t.id = rt.tag_id \
                 WHERE rt.recipe_id = r.id AND t.slug = ANY(",
            )
            .push_bind(filter.tags.to_owned())
            .push("))");
    }
    if let Some(viewer) = viewer {
        if filter.is_favorited {
            query_builder
                .push(" AND EXISTS (SELECT 1 FROM favorites f WHERE f.recipe_id = r.id AND f.user_id = ")
                .push_bind(viewer)
                .push(")");
        }
        if filter.is_in_shopping_cart {
            query_builder
                .push(
                    " AND EXISTS (SELECT 1 FROM shopping_carts s WHERE s.recipe_id = r.id AND s.user_id = ",
                )
                .push_bind(viewer)
                .push(")");
        }
    }

    query_builder
        .push(" ORDER BY r.id DESC LIMIT ")
        .push_bind(page.size)
        .push(" OFFSET ")
        .push_bind(page.offset());

    let rows: Vec<RecipeRow> = query_builder
        .build_query_as()
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    let total_count = rows.first().map(|row| row.count).unwrap_or(0);
    let rows: Vec<Recipe> = rows.into_iter().map(Recipe::from).collect();

    Ok(PageContext::from_rows(rows, total_count, page))
}

pub async fn get_recipe(id: Uuid, pool: &Pool<Postgres>) -> Result<Option<Recipe>, Error> {
    let row: Option<Recipe> = sqlx::query_as("SELECT * FROM recipes WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

/// Recipe the session may modify: its own, or any recipe for admins.
pub async fn get_recipe_mut(
    id: Uuid,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<Recipe, Error> {
    session.authenticate(ActionType::ManageOwnRecipes)?;
    let recipe = get_recipe(id, pool).await?;

    match recipe {
        Some(recipe) => match session.authenticate(ActionType::ManageAllRecipes) {
            Ok(_) => Ok(recipe),
            Err(_) => {
                if recipe.author_id != session.user_id {
                    Err(HtmlError::Forbidden.default())
                } else {
                    Ok(recipe)
                }
            }
        },
        None => Err(HtmlError::NotFound.new("No recipe exists with specified id")),
    }
}

/// Ingredient lines of each recipe, listed by ingredient name.
pub async fn list_recipe_lines(
    recipe_ids: &[Uuid],
    pool: &Pool<Postgres>,
) -> Result<HashMap<Uuid, Vec<RecipeIngredientRow>>, Error> {
    if recipe_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows: Vec<RecipeIngredientRow> = sqlx::query_as(
        "
        SELECT ri.recipe_id AS recipe_id, i.id AS ingredient_id, i.name AS name,
            i.measurement_unit AS measurement_unit, ri.amount AS amount
        FROM recipe_ingredients ri
        INNER JOIN ingredients i ON i.id = ri.ingredient_id
        WHERE ri.recipe_id = ANY($1)
        ORDER BY i.name
    ",
    )
    .bind(recipe_ids)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let mut lines: HashMap<Uuid, Vec<RecipeIngredientRow>> = HashMap::new();
    rows.into_iter().for_each(|row| {
        lines.entry(row.recipe_id).or_default().push(row);
    });

    Ok(lines)
}

/// Stored recipe in the shape the validator works on.
pub async fn load_normalized_recipe(
    recipe: &Recipe,
    pool: &Pool<Postgres>,
) -> Result<NormalizedRecipe, Error> {
    let mut lines = list_recipe_lines(&[recipe.id], pool).await?;
    let tags: Vec<(Uuid,)> = sqlx::query_as("SELECT tag_id FROM recipe_tags WHERE recipe_id = $1")
        .bind(recipe.id)
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    let ingredients = lines
        .remove(&recipe.id)
        .unwrap_or_default()
        .into_iter()
        .map(|row| RecipeLine {
            ingredient: Ingredient {
                id: row.ingredient_id,
                name: row.name,
                measurement_unit: row.measurement_unit,
            },
            amount: row.amount,
        })
        .collect();

    Ok(NormalizedRecipe {
        name: recipe.name.to_owned(),
        text: recipe.text.to_owned(),
        cooking_time: recipe.cooking_time,
        image: recipe.image.to_owned(),
        ingredients,
        tags: tags.into_iter().map(|tag| tag.0).collect(),
    })
}

/// Stores the recipe, its ingredient lines and its tags in one transaction.
pub async fn create_recipe(
    author_id: Uuid,
    recipe: &NormalizedRecipe,
    pool: &Pool<Postgres>,
) -> Result<Uuid, Error> {
    let mut tr = pool.begin().await.map_err(QueryError::from)?;

    let id: (Uuid,) = sqlx::query_as(
        "
        INSERT INTO recipes (author_id, name, text, image, cooking_time)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
    ",
    )
    .bind(author_id)
    .bind(&recipe.name)
    .bind(&recipe.text)
    .bind(&recipe.image)
    .bind(recipe.cooking_time)
    .fetch_one(&mut *tr)
    .await
    .map_err(QueryError::from)?;

    replace_recipe_ingredients(id.0, &recipe.ingredients, &mut tr).await?;
    set_recipe_tags(id.0, &recipe.tags, &mut tr).await?;

    tr.commit().await.map_err(QueryError::from)?;
    log::info!("Recipe {} created by user {author_id}", id.0);

    Ok(id.0)
}

/// Updates the scalar fields and rewrites only the line sets named in
/// `replaced`, all in one transaction.
pub async fn update_recipe(
    id: Uuid,
    recipe: &NormalizedRecipe,
    replaced: ReplacedSets,
    pool: &Pool<Postgres>,
) -> Result<(), Error> {
    let mut tr = pool.begin().await.map_err(QueryError::from)?;

    sqlx::query(
        "UPDATE recipes SET name = $1, text = $2, image = $3, cooking_time = $4 WHERE id = $5",
    )
    .bind(&recipe.name)
    .bind(&recipe.text)
    .bind(&recipe.image)
    .bind(recipe.cooking_time)
    .bind(id)
    .execute(&mut *tr)
    .await
    .map_err(QueryError::from)?;

    if replaced.ingredients {
        replace_recipe_ingredients(id, &recipe.ingredients, &mut tr).await?;
    }
    if replaced.tags {
        set_recipe_tags(id, &recipe.tags, &mut tr).await?;
    }

    tr.commit().await.map_err(QueryError::from)?;

    Ok(())
}

pub async fn delete_recipe(id: Uuid, pool: &Pool<Postgres>) -> Result<(), Error> {
    sqlx::query("DELETE FROM recipes WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(())
}

/// Replaces the ingredient lines of a recipe inside the caller's transaction.
pub async fn replace_recipe_ingredients(
    recipe_id: Uuid,
    lines: &[RecipeLine],
    tr: &mut Transaction<'_, Postgres>,
) -> Result<(), Error> {
    sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
        .bind(recipe_id)
        .execute(&mut **tr)
        .await
        .map_err(QueryError::from)?;

    if lines.is_empty() {
        return Ok(());
    }

    let mut query_builder: QueryBuilder<Postgres> =
        QueryBuilder::new("INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount) ");
    query_builder.push_values(lines, |mut b, line| {
        b.push_bind(recipe_id)
            .push_bind(line.ingredient.id)
            .push_bind(line.amount);
    });

    query_builder
        .build()
        .execute(&mut **tr)
        .await
        .map_err(QueryError::from)?;

    Ok(())
}

/// The newest `limit` recipes (all when `None`) of each author, with the
/// author's recipe count.
pub async fn list_author_recipes(
    author_ids: &[Uuid],
    limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<HashMap<Uuid, AuthorRecipes>, Error> {
    if author_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let counts: Vec<(Uuid, i64)> = sqlx::query_as(
        "SELECT author_id, COUNT(*) FROM recipes WHERE author_id = ANY($1) GROUP BY author_id",
    )
    .bind(author_ids)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let rows: Vec<AuthorRecipeRow> = sqlx::query_as(
        "
        SELECT id, author_id, name, image, cooking_time FROM (
            SELECT r.id, r.author_id, r.name, r.image, r.cooking_time,
                ROW_NUMBER() OVER (PARTITION BY r.author_id ORDER BY r.id DESC) AS author_position
            FROM recipes r
            WHERE r.author_id = ANY($1)
        ) ranked
        WHERE $2::BIGINT IS NULL OR author_position <= $2
        ORDER BY author_id, id DESC
    ",
    )
    .bind(author_ids)
    .bind(limit)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let mut recipes: HashMap<Uuid, AuthorRecipes> = counts
        .into_iter()
        .map(|(author_id, count)| {
            (
                author_id,
                AuthorRecipes {
                    recipes: vec![],
                    count,
                },
            )
        })
        .collect();
    rows.into_iter().for_each(|row| {
        recipes.entry(row.author_id).or_default().recipes.push(row);
    });

    Ok(recipes)
}
