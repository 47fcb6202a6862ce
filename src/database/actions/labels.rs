use crate::{
    error::QueryError,
    schema::{Id, Label, LabelKind},
};

use sqlx::{PgConnection, Pool, Postgres};

/// Inserts `(owner, name)` unless it exists and returns the row either way.
///
/// A concurrent insert of the same name makes `ON CONFLICT DO NOTHING` return
/// no row; the follow-up select then observes the winner's row.
pub async fn get_or_create_label(
    kind: LabelKind,
    owner: Id,
    name: &str,
    conn: &mut PgConnection,
) -> Result<(Label, bool), QueryError> {
    let table = kind.table();

    let created: Option<Label> = sqlx::query_as(&format!(
        "INSERT INTO {table} (user_id, name) VALUES ($1, $2) ON CONFLICT (user_id, name) DO NOTHING RETURNING id, name"
    ))
    .bind(owner)
    .bind(name)
    .fetch_optional(&mut *conn)
    .await?;

    if let Some(label) = created {
        return Ok((label, true));
    }

    let existing: Label = sqlx::query_as(&format!(
        "SELECT id, name FROM {table} WHERE user_id = $1 AND name = $2"
    ))
    .bind(owner)
    .bind(name)
    .fetch_one(&mut *conn)
    .await?;

    Ok((existing, false))
}

pub async fn get_label(
    kind: LabelKind,
    owner: Id,
    id: Id,
    pool: &Pool<Postgres>,
) -> Result<Option<Label>, QueryError> {
    let table = kind.table();

    let row: Option<Label> = sqlx::query_as(&format!(
        "SELECT id, name FROM {table} WHERE id = $1 AND user_id = $2"
    ))
    .bind(id)
    .bind(owner)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

pub async fn list_labels(
    kind: LabelKind,
    owner: Id,
    assigned_only: bool,
    pool: &Pool<Postgres>,
) -> Result<Vec<Label>, QueryError> {
    let table = kind.table();
    let link_table = kind.link_table();
    let link_column = kind.link_column();

    let rows: Vec<Label> = sqlx::query_as(&format!(
        "
        SELECT l.id, l.name FROM {table} l
        WHERE l.user_id = $1
        AND (NOT $2 OR EXISTS (SELECT 1 FROM {link_table} x WHERE x.{link_column} = l.id))
        ORDER BY l.name DESC
    "
    ))
    .bind(owner)
    .bind(assigned_only)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

pub async fn rename_label(
    kind: LabelKind,
    owner: Id,
    id: Id,
    name: &str,
    pool: &Pool<Postgres>,
) -> Result<Option<Label>, QueryError> {
    let table = kind.table();

    let row: Option<Label> = sqlx::query_as(&format!(
        "UPDATE {table} SET name = $3 WHERE id = $1 AND user_id = $2 RETURNING id, name"
    ))
    .bind(id)
    .bind(owner)
    .bind(name)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Recipe links disappear through `ON DELETE CASCADE`; recipes stay.
pub async fn delete_label(
    kind: LabelKind,
    owner: Id,
    id: Id,
    pool: &Pool<Postgres>,
) -> Result<bool, QueryError> {
    let table = kind.table();

    let result = sqlx::query(&format!("DELETE FROM {table} WHERE id = $1 AND user_id = $2"))
        .bind(id)
        .bind(owner)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn clear_recipe_links(
    kind: LabelKind,
    recipe_id: Id,
    conn: &mut PgConnection,
) -> Result<(), QueryError> {
    let link_table = kind.link_table();

    sqlx::query(&format!("DELETE FROM {link_table} WHERE recipe_id = $1"))
        .bind(recipe_id)
        .execute(conn)
        .await?;

    Ok(())
}

pub async fn add_tag_to_recipe(
    recipe_id: Id,
    tag_id: Id,
    conn: &mut PgConnection,
) -> Result<(), QueryError> {
    sqlx::query(
        "INSERT INTO recipe_tags (recipe_id, tag_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(recipe_id)
    .bind(tag_id)
    .execute(conn)
    .await?;

    Ok(())
}

pub async fn add_ingredient_to_recipe(
    recipe_id: Id,
    ingredient_id: Id,
    quantity: &str,
    conn: &mut PgConnection,
) -> Result<(), QueryError> {
    sqlx::query(
        "
        INSERT INTO ingredient_quantities (recipe_id, ingredient_id, quantity)
        VALUES ($1, $2, $3)
        ON CONFLICT (recipe_id, ingredient_id) DO NOTHING
    ",
    )
    .bind(recipe_id)
    .bind(ingredient_id)
    .bind(quantity)
    .execute(conn)
    .await?;

    Ok(())
}
