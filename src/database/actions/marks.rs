use crate::{
    error::{ActionError, QueryError},
    list::{aggregate, CartIngredient, CartRecipe, ShoppingItem},
    permissions::ActionType,
    schema::{MarkType, RecipeMinified, Uuid},
    session::SessionData,
};

use sqlx::{Pool, Postgres};

use super::recipes::get_recipe;

#[derive(sqlx::FromRow, Debug)]
struct SavedAmountRow {
    recipe_id: Uuid,
    recipe_name: String,
    name: String,
    measurement_unit: String,
    amount: i32,
}

/// Folds rows ordered by recipe into one `CartRecipe` per recipe.
fn group_saved_rows(rows: Vec<SavedAmountRow>) -> Vec<CartRecipe> {
    let mut recipes: Vec<CartRecipe> = vec![];

    for row in rows {
        let ingredient = CartIngredient {
            name: row.name,
            measurement_unit: row.measurement_unit,
            amount: row.amount,
        };

        if let Some(recipe) = recipes.last_mut().filter(|r| r.id == row.recipe_id) {
            recipe.ingredients.push(ingredient);
            continue;
        }

        recipes.push(CartRecipe {
            id: row.recipe_id,
            name: row.recipe_name,
            ingredients: vec![ingredient],
        });
    }

    recipes
}

pub async fn is_marked(
    mark: MarkType,
    recipe_id: Uuid,
    user_id: Uuid,
    pool: &Pool<Postgres>,
) -> Result<bool, potion::Error> {
    let result: Option<(i32,)> = sqlx::query_as(&format!(
        "SELECT recipe_id FROM {} WHERE recipe_id = $1 AND user_id = $2",
        mark.table()
    ))
    .bind(recipe_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(result.is_some())
}

pub async fn add_mark(
    mark: MarkType,
    recipe_id: Uuid,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<RecipeMinified, potion::Error> {
    session.authenticate(ActionType::ManageOwnMarks)?;

    let recipe = match get_recipe(recipe_id, pool).await? {
        Some(recipe) => recipe,
        None => return Err(ActionError::not_found("No recipe exists with specified id").into()),
    };

    let result = sqlx::query(&format!(
        "INSERT INTO {} (user_id, recipe_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        mark.table()
    ))
    .bind(session.user_id)
    .bind(recipe_id)
    .execute(pool)
    .await
    .map_err(ActionError::from)?;

    if result.rows_affected() == 0 {
        return Err(ActionError::conflict(mark.already_marked()).into());
    }

    log::debug!(
        "User {} added recipe {recipe_id} to {}",
        session.user_id,
        mark.table()
    );

    Ok(RecipeMinified {
        id: recipe.id,
        name: recipe.name,
        cooking_time: recipe.cooking_time,
        image: recipe.image,
    })
}

pub async fn remove_mark(
    mark: MarkType,
    recipe_id: Uuid,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<(), potion::Error> {
    session.authenticate(ActionType::ManageOwnMarks)?;

    let result = sqlx::query(&format!(
        "DELETE FROM {} WHERE user_id = $1 AND recipe_id = $2",
        mark.table()
    ))
    .bind(session.user_id)
    .bind(recipe_id)
    .execute(pool)
    .await
    .map_err(QueryError::from)?;

    if result.rows_affected() == 0 {
        return Err(ActionError::not_found(mark.not_marked()).into());
    }

    Ok(())
}

/// Recipes a user has marked, each with its ingredient amounts.
///
/// Ordered by recipe id and then amount id, so repeated calls over the same
/// data return the same sequence.
pub async fn list_saved_recipes(
    user_id: Uuid,
    mark: MarkType,
    pool: &Pool<Postgres>,
) -> Result<Vec<CartRecipe>, potion::Error> {
    let rows: Vec<SavedAmountRow> = sqlx::query_as(&format!(
        "
        SELECT r.id AS recipe_id, r.name AS recipe_name, i.name AS name,
            i.measurement_unit AS measurement_unit, a.amount AS amount
        FROM {} m
        INNER JOIN recipes r ON r.id = m.recipe_id
        INNER JOIN recipe_amounts a ON a.recipe_id = r.id
        INNER JOIN ingredients i ON i.id = a.ingredient_id
        WHERE m.user_id = $1
        ORDER BY r.id, a.id
    ",
        mark.table()
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(group_saved_rows(rows))
}

/// Consolidated shopping list over everything in the user's cart.
pub async fn fetch_shopping_list(
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<Vec<ShoppingItem>, potion::Error> {
    session.authenticate(ActionType::ManageOwnMarks)?;

    let recipes = list_saved_recipes(session.user_id, MarkType::ShoppingCart, pool).await?;
    let items = aggregate(&recipes);

    log::debug!(
        "Shopping list for user {}: {} recipes, {} items",
        session.user_id,
        recipes.len(),
        items.len()
    );

    Ok(items)
}
