use crate::{
    error::{ActionError, QueryError},
    permissions::ActionType,
    schema::{RecipeMinified, SubscriptionRow, User, UserProfile, UserRole, Uuid},
    session::SessionData,
};

use sqlx::{Pool, Postgres};

pub async fn get_user(
    pool: &Pool<Postgres>,
    username: &str,
) -> Result<Option<User>, potion::Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE username = $1")
        .bind(username)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn get_user_by_id(
    user_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<Option<User>, potion::Error> {
    let row: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

/// Every column of `users` plus whether the viewer bound to `$1` follows that
/// user. A NULL viewer matches no subscription.
const PROFILE_SELECT: &str = "
    SELECT u.*, EXISTS (
        SELECT 1 FROM subscriptions s
        WHERE s.user_id = $1 AND s.subscription_id = u.id
    ) AS is_subscribed
    FROM users u
";

fn viewer_id(viewer: Option<&SessionData>) -> Option<Uuid> {
    viewer.map(|session| session.user_id)
}

pub async fn get_user_profile(
    user_id: Uuid,
    viewer: Option<&SessionData>,
    pool: &Pool<Postgres>,
) -> Result<UserProfile, potion::Error> {
    let row: Option<UserProfile> = sqlx::query_as(&format!("{PROFILE_SELECT} WHERE u.id = $2"))
        .bind(viewer_id(viewer))
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    match row {
        Some(profile) => Ok(profile),
        None => Err(ActionError::not_found("User doesn't exist").into()),
    }
}

pub async fn list_users(
    viewer: Option<&SessionData>,
    pool: &Pool<Postgres>,
) -> Result<Vec<UserProfile>, potion::Error> {
    let rows: Vec<UserProfile> = sqlx::query_as(&format!("{PROFILE_SELECT} ORDER BY u.id"))
        .bind(viewer_id(viewer))
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(rows)
}

/// Stores a user profile. Credentials live with whatever authenticates requests.
pub async fn create_user(
    username: &str,
    email: &str,
    first_name: &str,
    last_name: &str,
    pool: &Pool<Postgres>,
) -> Result<Uuid, potion::Error> {
    let id: (i32,) = sqlx::query_as(
        "
        INSERT INTO users (username, email, first_name, last_name, role)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
    ",
    )
    .bind(username)
    .bind(email)
    .bind(first_name)
    .bind(last_name)
    .bind(UserRole::User)
    .fetch_one(pool)
    .await
    .map_err(ActionError::from)?;

    Ok(id.0)
}

pub async fn is_subscribed(
    user_id: Uuid,
    subscription_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<bool, potion::Error> {
    let row: Option<(i32,)> = sqlx::query_as(
        "SELECT subscription_id FROM subscriptions WHERE user_id = $1 AND subscription_id = $2",
    )
    .bind(user_id)
    .bind(subscription_id)
    .fetch_optional(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(row.is_some())
}

fn check_recipes_limit(recipes_limit: Option<i64>) -> Result<(), ActionError> {
    match recipes_limit {
        Some(limit) if limit < 0 => Err(ActionError::validation(
            "recipes_limit",
            "Ensure this value is greater than or equal to 0.",
        )),
        _ => Ok(()),
    }
}

/// An author as seen by a subscriber: profile, recipe count and the newest
/// `recipes_limit` recipes (all of them when no limit is given).
async fn subscription_row(
    user: User,
    recipes_limit: Option<i64>,
    pool: &Pool<Postgres>,
) -> Result<SubscriptionRow, potion::Error> {
    let recipes: Vec<RecipeMinified> = sqlx::query_as(
        "
        SELECT id, name, cooking_time, image FROM recipes
        WHERE author_id = $1
        ORDER BY pub_date DESC, id DESC
        LIMIT $2
    ",
    )
    .bind(user.id)
    .bind(recipes_limit)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM recipes WHERE author_id = $1")
        .bind(user.id)
        .fetch_one(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(SubscriptionRow {
        user,
        is_subscribed: true,
        recipes,
        recipes_count: count.0,
    })
}

pub async fn subscribe(
    subscription_id: Uuid,
    recipes_limit: Option<i64>,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<SubscriptionRow, potion::Error> {
    session.authenticate(ActionType::ManageOwnSubscriptions)?;
    check_recipes_limit(recipes_limit)?;

    if subscription_id == session.user_id {
        return Err(ActionError::validation(
            "subscription",
            "You cannot subscribe to yourself.",
        )
        .into());
    }

    let target = match get_user_by_id(subscription_id, pool).await? {
        Some(target) => target,
        None => return Err(ActionError::not_found("User doesn't exist").into()),
    };

    let result = sqlx::query(
        "INSERT INTO subscriptions (user_id, subscription_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
    )
    .bind(session.user_id)
    .bind(subscription_id)
    .execute(pool)
    .await
    .map_err(ActionError::from)?;

    if result.rows_affected() == 0 {
        return Err(ActionError::conflict("You are already subscribed to this user").into());
    }

    log::debug!("User {} subscribed to {subscription_id}", session.user_id);

    subscription_row(target, recipes_limit, pool).await
}

pub async fn unsubscribe(
    subscription_id: Uuid,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<(), potion::Error> {
    session.authenticate(ActionType::ManageOwnSubscriptions)?;

    let result =
        sqlx::query("DELETE FROM subscriptions WHERE user_id = $1 AND subscription_id = $2")
            .bind(session.user_id)
            .bind(subscription_id)
            .execute(pool)
            .await
            .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(ActionError::not_found("You are not subscribed to this user").into());
    }

    Ok(())
}

/// Authors the session user is subscribed to, ordered by user id.
pub async fn list_subscriptions(
    recipes_limit: Option<i64>,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<Vec<SubscriptionRow>, potion::Error> {
    check_recipes_limit(recipes_limit)?;

    let users: Vec<User> = sqlx::query_as(
        "
        SELECT u.* FROM subscriptions s
        INNER JOIN users u ON u.id = s.subscription_id
        WHERE s.user_id = $1
        ORDER BY u.id
    ",
    )
    .bind(session.user_id)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    let mut rows = Vec::with_capacity(users.len());
    for user in users {
        rows.push(subscription_row(user, recipes_limit, pool).await?);
    }

    Ok(rows)
}
