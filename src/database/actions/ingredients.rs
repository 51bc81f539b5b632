use crate::{
    constants::NAME_MAX_LENGTH,
    error::{ActionError, QueryError},
    permissions::ActionType,
    schema::{Ingredient, RecipeIngredient, Uuid},
    session::SessionData,
};

use sqlx::{Pool, Postgres};

/// Escapes LIKE wildcards so user input only ever matches literally.
fn escape_like(search: &str) -> String {
    let mut escaped = String::with_capacity(search.len());
    for c in search.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Case-insensitive name prefix pattern.
pub fn prefix_pattern(search: &str) -> String {
    format!("{}%", escape_like(search.trim()))
}

pub async fn create_ingredient(
    name: &str,
    measurement_unit: &str,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<Uuid, potion::Error> {
    session.authenticate(ActionType::ManageIngredients)?;

    let name = name.trim();
    if name.is_empty() || name.chars().count() > NAME_MAX_LENGTH {
        return Err(ActionError::validation("name", "Invalid ingredient name").into());
    }
    let measurement_unit = measurement_unit.trim();
    if measurement_unit.is_empty() || measurement_unit.chars().count() > NAME_MAX_LENGTH {
        return Err(
            ActionError::validation("measurement_unit", "Invalid measurement unit").into(),
        );
    }

    let id: (i32,) = sqlx::query_as(
        "INSERT INTO ingredients (name, measurement_unit) VALUES ($1, $2) RETURNING id",
    )
    .bind(name)
    .bind(measurement_unit)
    .fetch_one(pool)
    .await
    .map_err(ActionError::from)?;

    Ok(id.0)
}

pub async fn get_ingredient(
    id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<Option<Ingredient>, potion::Error> {
    let row: Option<Ingredient> = sqlx::query_as("SELECT * FROM ingredients WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

pub async fn find_ingredient(
    name: &str,
    pool: &Pool<Postgres>,
) -> Result<Option<Uuid>, potion::Error> {
    let row: Option<(i32,)> =
        sqlx::query_as("SELECT id FROM ingredients WHERE LOWER(name) = LOWER($1)")
            .bind(name)
            .fetch_optional(pool)
            .await
            .map_err(QueryError::from)?;

    Ok(row.map(|r| r.0))
}

/// All ingredients, or those whose name starts with `search`, ordered by name.
pub async fn list_ingredients(
    search: Option<&str>,
    pool: &Pool<Postgres>,
) -> Result<Vec<Ingredient>, potion::Error> {
    let rows: Vec<Ingredient> = match search.filter(|s| !s.trim().is_empty()) {
        Some(search) => sqlx::query_as("SELECT * FROM ingredients WHERE name ILIKE $1 ORDER BY name")
            .bind(prefix_pattern(search))
            .fetch_all(pool)
            .await
            .map_err(QueryError::from)?,
        None => sqlx::query_as("SELECT * FROM ingredients ORDER BY name")
            .fetch_all(pool)
            .await
            .map_err(QueryError::from)?,
    };

    Ok(rows)
}

pub async fn list_recipe_ingredients(
    recipe_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<Vec<RecipeIngredient>, potion::Error> {
    let rows: Vec<RecipeIngredient> = sqlx::query_as(
        "
        SELECT i.id AS id, i.name AS name, i.measurement_unit AS measurement_unit, a.amount AS amount
        FROM recipe_amounts a
        INNER JOIN ingredients i ON i.id = a.ingredient_id
        WHERE a.recipe_id = $1
        ORDER BY a.id
    ",
    )
    .bind(recipe_id)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_pattern_appends_wildcard() {
        assert_eq!(prefix_pattern("car"), "car%");
        assert_eq!(prefix_pattern("  sa "), "sa%");
    }

    #[test]
    fn prefix_pattern_escapes_wildcards() {
        assert_eq!(prefix_pattern("50%_off"), "50\\%\\_off%");
        assert_eq!(prefix_pattern("a\\b"), "a\\\\b%");
    }
}
