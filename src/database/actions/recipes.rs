use std::collections::HashMap;

use crate::{
    error::QueryError,
    schema::{
        Id, IngredientQuantity, Label, NewRecipe, Recipe, RecipeChanges, RecipeDetail,
        RecipeFilter,
    },
};

use sqlx::{PgConnection, Pool, Postgres};

#[derive(sqlx::FromRow)]
struct RecipeTagRow {
    recipe_id: Id,
    id: Id,
    name: String,
}

#[derive(sqlx::FromRow)]
struct RecipeQuantityRow {
    recipe_id: Id,
    id: Id,
    name: String,
    quantity: String,
}

pub async fn fetch_recipes(
    owner: Id,
    filter: &RecipeFilter,
    pool: &Pool<Postgres>,
) -> Result<Vec<Recipe>, QueryError> {
    let rows: Vec<Recipe> = sqlx::query_as(
        "
        SELECT r.* FROM recipes r
        WHERE r.user_id = $1
        AND ($2::INTEGER[] IS NULL OR EXISTS (
            SELECT 1 FROM recipe_tags rt WHERE rt.recipe_id = r.id AND rt.tag_id = ANY($2)
        ))
        AND ($3::INTEGER[] IS NULL OR EXISTS (
            SELECT 1 FROM ingredient_quantities iq WHERE iq.recipe_id = r.id AND iq.ingredient_id = ANY($3)
        ))
        ORDER BY r.id DESC
    ",
    )
    .bind(owner)
    .bind(&filter.tags)
    .bind(&filter.ingredients)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

pub async fn get_recipe(
    owner: Id,
    id: Id,
    conn: &mut PgConnection,
) -> Result<Option<Recipe>, QueryError> {
    let row: Option<Recipe> = sqlx::query_as("SELECT * FROM recipes WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(owner)
        .fetch_optional(conn)
        .await?;

    Ok(row)
}

pub async fn create_recipe(
    owner: Id,
    recipe: &NewRecipe,
    conn: &mut PgConnection,
) -> Result<Recipe, QueryError> {
    let row: Recipe = sqlx::query_as(
        "
        INSERT INTO recipes (user_id, title, time_minutes, price, description, link)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
    ",
    )
    .bind(owner)
    .bind(&recipe.title)
    .bind(recipe.time_minutes)
    .bind(recipe.price)
    .bind(&recipe.description)
    .bind(&recipe.link)
    .fetch_one(conn)
    .await?;

    Ok(row)
}

pub async fn update_recipe_info(
    owner: Id,
    id: Id,
    changes: &RecipeChanges,
    conn: &mut PgConnection,
) -> Result<Option<Recipe>, QueryError> {
    let row: Option<Recipe> = sqlx::query_as(
        "
        UPDATE recipes SET
        title = COALESCE($3, title),
        time_minutes = COALESCE($4, time_minutes),
        price = COALESCE($5, price),
        description = COALESCE($6, description),
        link = COALESCE($7, link)
        WHERE id = $1 AND user_id = $2
        RETURNING *
    ",
    )
    .bind(id)
    .bind(owner)
    .bind(&changes.title)
    .bind(changes.time_minutes)
    .bind(changes.price)
    .bind(&changes.description)
    .bind(&changes.link)
    .fetch_optional(conn)
    .await?;

    Ok(row)
}

/// Join rows go with the recipe through `ON DELETE CASCADE`.
pub async fn delete_recipe(
    owner: Id,
    id: Id,
    pool: &Pool<Postgres>,
) -> Result<Option<Recipe>, QueryError> {
    let row: Option<Recipe> =
        sqlx::query_as("DELETE FROM recipes WHERE id = $1 AND user_id = $2 RETURNING *")
            .bind(id)
            .bind(owner)
            .fetch_optional(pool)
            .await?;

    Ok(row)
}

/// Locks the recipe row for the rest of the transaction and returns its
/// current image.
pub async fn lock_recipe_image(
    owner: Id,
    id: Id,
    conn: &mut PgConnection,
) -> Result<Option<Option<String>>, QueryError> {
    let row: Option<(Option<String>,)> =
        sqlx::query_as("SELECT image FROM recipes WHERE id = $1 AND user_id = $2 FOR UPDATE")
            .bind(id)
            .bind(owner)
            .fetch_optional(conn)
            .await?;

    Ok(row.map(|row| row.0))
}

pub async fn set_recipe_image(
    id: Id,
    image: &str,
    conn: &mut PgConnection,
) -> Result<(), QueryError> {
    sqlx::query("UPDATE recipes SET image = $2 WHERE id = $1")
        .bind(id)
        .bind(image)
        .execute(conn)
        .await?;

    Ok(())
}

pub async fn list_recipe_tags(
    recipe_ids: &[Id],
    conn: &mut PgConnection,
) -> Result<HashMap<Id, Vec<Label>>, QueryError> {
    let rows: Vec<RecipeTagRow> = sqlx::query_as(
        "
        SELECT rt.recipe_id AS recipe_id, t.id AS id, t.name AS name
        FROM recipe_tags rt
        INNER JOIN tags t ON t.id = rt.tag_id
        WHERE rt.recipe_id = ANY($1)
        ORDER BY rt.id
    ",
    )
    .bind(recipe_ids)
    .fetch_all(conn)
    .await?;

    let mut hashmap: HashMap<Id, Vec<Label>> = HashMap::new();
    rows.into_iter().for_each(|row| {
        hashmap.entry(row.recipe_id).or_default().push(Label {
            id: row.id,
            name: row.name,
        })
    });

    Ok(hashmap)
}

pub async fn list_recipe_ingredients(
    recipe_ids: &[Id],
    conn: &mut PgConnection,
) -> Result<HashMap<Id, Vec<IngredientQuantity>>, QueryError> {
    let rows: Vec<RecipeQuantityRow> = sqlx::query_as(
        "
        SELECT iq.recipe_id AS recipe_id, iq.id AS id, i.name AS name, iq.quantity AS quantity
        FROM ingredient_quantities iq
        INNER JOIN ingredients i ON i.id = iq.ingredient_id
        WHERE iq.recipe_id = ANY($1)
        ORDER BY iq.id
    ",
    )
    .bind(recipe_ids)
    .fetch_all(conn)
    .await?;

    let mut hashmap: HashMap<Id, Vec<IngredientQuantity>> = HashMap::new();
    rows.into_iter().for_each(|row| {
        hashmap
            .entry(row.recipe_id)
            .or_default()
            .push(IngredientQuantity {
                id: row.id,
                name: row.name,
                quantity: row.quantity,
            })
    });

    Ok(hashmap)
}

/// Attaches tags and ingredient quantities to already loaded recipes,
/// keeping their order.
pub async fn load_details(
    recipes: Vec<Recipe>,
    conn: &mut PgConnection,
) -> Result<Vec<RecipeDetail>, QueryError> {
    let ids: Vec<Id> = recipes.iter().map(|recipe| recipe.id).collect();
    let mut tags = list_recipe_tags(&ids, &mut *conn).await?;
    let mut ingredients = list_recipe_ingredients(&ids, &mut *conn).await?;

    Ok(recipes
        .into_iter()
        .map(|recipe| RecipeDetail {
            tags: tags.remove(&recipe.id).unwrap_or_default(),
            ingredients: ingredients.remove(&recipe.id).unwrap_or_default(),
            recipe,
        })
        .collect())
}
