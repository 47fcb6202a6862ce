use crate::{
    error::QueryError,
    schema::{Id, NewUser, User, UserChanges},
};

use sqlx::{Pool, Postgres};

pub async fn get_user_by_email(
    pool: &Pool<Postgres>,
    email: &str,
) -> Result<Option<User>, QueryError> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

pub async fn get_user_by_id(pool: &Pool<Postgres>, user_id: Id) -> Result<Option<User>, QueryError> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

/// Inserts a user whose password has already been hashed. Returns `None`
/// when the email is taken.
pub async fn register_user(
    user: &NewUser,
    pool: &Pool<Postgres>,
) -> Result<Option<User>, QueryError> {
    let row: Option<User> = sqlx::query_as(
        "
        INSERT INTO users (email, name, password, is_staff, is_superuser)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (email) DO NOTHING RETURNING *;
    ",
    )
    .bind(&user.email)
    .bind(&user.name)
    .bind(&user.password)
    .bind(user.is_staff)
    .bind(user.is_superuser)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

pub async fn update_user(
    user_id: Id,
    changes: &UserChanges,
    pool: &Pool<Postgres>,
) -> Result<Option<User>, QueryError> {
    let row: Option<User> = sqlx::query_as(
        "
        UPDATE users SET
        name = COALESCE($2, name),
        password = COALESCE($3, password)
        WHERE id = $1
        RETURNING *
    ",
    )
    .bind(user_id)
    .bind(&changes.name)
    .bind(&changes.password)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}
