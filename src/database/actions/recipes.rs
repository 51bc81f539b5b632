use crate::{
    error::{ActionError, QueryError},
    form::RecipePayload,
    permissions::ActionType,
    reconcile::reconcile,
    schema::{MarkType, Recipe, RecipeDetail, RecipeFilter, Uuid},
    session::SessionData,
};

use sqlx::{Pool, Postgres, QueryBuilder, Transaction};

use super::{
    ingredients::list_recipe_ingredients, marks::is_marked, tags::list_recipe_tags,
    tags::set_recipe_tags, users::get_user_profile,
};

/// Tables whose rows belong to a recipe and go away with it.
const RECIPE_DEPENDENTS: &[&str] = &[
    "recipe_amounts",
    "recipe_tags_map",
    "user_favorites",
    "shopping_carts",
];

pub async fn get_recipe(id: Uuid, pool: &Pool<Postgres>) -> Result<Option<Recipe>, potion::Error> {
    let row: Option<Recipe> = sqlx::query_as("SELECT * FROM recipes WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(row)
}

/// Loads a recipe the session is allowed to change: its own, or any for admins.
pub async fn get_recipe_mut(
    id: Uuid,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<Recipe, potion::Error> {
    session.authenticate(ActionType::ManageOwnRecipes)?;
    let recipe = get_recipe(id, pool).await?;

    match recipe {
        Some(recipe) => {
            if session.can_manage(
                recipe.author_id,
                ActionType::ManageOwnRecipes,
                ActionType::ManageAllRecipes,
            ) {
                Ok(recipe)
            } else {
                Err(potion::HtmlError::Unauthorized.default())
            }
        }
        None => Err(ActionError::not_found("No recipe exists with specified id").into()),
    }
}

/// Takes a row lock so concurrent writes to one recipe run one after another.
async fn lock_recipe(tx: &mut Transaction<'_, Postgres>, id: Uuid) -> Result<(), ActionError> {
    let row: Option<(i32,)> = sqlx::query_as("SELECT id FROM recipes WHERE id = $1 FOR UPDATE")
        .bind(id)
        .fetch_optional(&mut **tx)
        .await?;

    match row {
        Some(_) => Ok(()),
        None => Err(ActionError::not_found("No recipe exists with specified id")),
    }
}

async fn insert_recipe(
    tx: &mut Transaction<'_, Postgres>,
    author_id: Uuid,
    payload: &RecipePayload,
) -> Result<Uuid, ActionError> {
    let id: (i32,) = sqlx::query_as(
        "
        INSERT INTO recipes (author_id, name, text, cooking_time, image)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
    ",
    )
    .bind(author_id)
    .bind(payload.name.trim())
    .bind(&payload.text)
    .bind(payload.cooking_time)
    .bind(&payload.image)
    .fetch_one(&mut **tx)
    .await?;

    set_recipe_tags(tx, id.0, &payload.tags).await?;
    reconcile(tx, id.0, &payload.ingredients).await?;

    Ok(id.0)
}

async fn write_recipe(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
    payload: &RecipePayload,
) -> Result<(), ActionError> {
    lock_recipe(tx, id).await?;

    sqlx::query(
        "
        UPDATE recipes
        SET name = $1, text = $2, cooking_time = $3, image = COALESCE($4, image)
        WHERE id = $5
    ",
    )
    .bind(payload.name.trim())
    .bind(&payload.text)
    .bind(payload.cooking_time)
    .bind(&payload.image)
    .bind(id)
    .execute(&mut **tx)
    .await?;

    set_recipe_tags(tx, id, &payload.tags).await?;
    reconcile(tx, id, &payload.ingredients).await?;

    Ok(())
}

/// Creates a recipe with its tags and ingredient amounts in one transaction.
pub async fn create_recipe(
    payload: RecipePayload,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<Uuid, potion::Error> {
    session.authenticate(ActionType::CreateRecipes)?;
    payload.validate()?;

    let mut tx = pool.begin().await.map_err(QueryError::from)?;
    let id = insert_recipe(&mut tx, session.user_id, &payload).await?;
    tx.commit().await.map_err(QueryError::from)?;

    log::info!("User {} created recipe {id}", session.user_id);

    Ok(id)
}

/// Rewrites a recipe's fields, tags and ingredient amounts in one transaction.
/// The stored image is kept when the payload carries none.
pub async fn update_recipe(
    id: Uuid,
    payload: RecipePayload,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<(), potion::Error> {
    get_recipe_mut(id, session, pool).await?;
    payload.validate()?;

    let mut tx = pool.begin().await.map_err(QueryError::from)?;
    write_recipe(&mut tx, id, &payload).await?;
    tx.commit().await.map_err(QueryError::from)?;

    log::info!("User {} updated recipe {id}", session.user_id);

    Ok(())
}

/// Deletes a recipe and everything that depends on it in the same transaction.
pub async fn delete_recipe(
    id: Uuid,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<(), potion::Error> {
    get_recipe_mut(id, session, pool).await?;

    let mut tx = pool.begin().await.map_err(QueryError::from)?;
    lock_recipe(&mut tx, id).await?;

    for table in RECIPE_DEPENDENTS {
        sqlx::query(&format!("DELETE FROM {table} WHERE recipe_id = $1"))
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(QueryError::from)?;
    }

    sqlx::query("DELETE FROM recipes WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(QueryError::from)?;

    tx.commit().await.map_err(QueryError::from)?;

    log::info!("User {} deleted recipe {id}", session.user_id);

    Ok(())
}

/// Full recipe view. The viewer's favorite, cart and author-subscription flags
/// are false for anonymous viewers.
pub async fn get_recipe_detail(
    id: Uuid,
    viewer: Option<&SessionData>,
    pool: &Pool<Postgres>,
) -> Result<RecipeDetail, potion::Error> {
    let recipe = match get_recipe(id, pool).await? {
        Some(recipe) => recipe,
        None => return Err(ActionError::not_found("No recipe exists with specified id").into()),
    };

    let author = get_user_profile(recipe.author_id, viewer, pool).await?;

    let (is_favorited, is_in_shopping_cart) = match viewer {
        Some(viewer) => (
            is_marked(MarkType::Favorite, id, viewer.user_id, pool).await?,
            is_marked(MarkType::ShoppingCart, id, viewer.user_id, pool).await?,
        ),
        None => (false, false),
    };

    Ok(RecipeDetail {
        tags: list_recipe_tags(pool, id).await?,
        ingredients: list_recipe_ingredients(id, pool).await?,
        author,
        recipe,
        is_favorited,
        is_in_shopping_cart,
    })
}

/// Builds the listing query for `filter`, newest first.
fn build_recipe_query<'a>(
    filter: &'a RecipeFilter,
    viewer: Option<&SessionData>,
) -> QueryBuilder<'a, Postgres> {
    let mut query: QueryBuilder<Postgres> = QueryBuilder::new("SELECT r.* FROM recipes r WHERE TRUE");

    if let Some(author) = filter.author {
        query.push(" AND r.author_id = ").push_bind(author);
    }

    if !filter.tags.is_empty() {
        query
            .push(
                " AND EXISTS (SELECT 1 FROM recipe_tags_map m INNER JOIN recipe_tags t ON t.id = m.tag_id WHERE m.recipe_id = r.id AND t.slug = ANY(",
            )
            .push_bind(&filter.tags)
            .push("))");
    }

    if let Some(viewer) = viewer {
        let marks = [
            (filter.is_favorited, MarkType::Favorite),
            (filter.is_in_shopping_cart, MarkType::ShoppingCart),
        ];

        for (wanted, mark) in marks {
            let Some(wanted) = wanted else {
                continue;
            };

            query
                .push(if wanted { " AND EXISTS" } else { " AND NOT EXISTS" })
                .push(format!(
                    " (SELECT 1 FROM {} s WHERE s.recipe_id = r.id AND s.user_id = ",
                    mark.table()
                ))
                .push_bind(viewer.user_id)
                .push(")");
        }
    }

    query.push(" ORDER BY r.pub_date DESC, r.id DESC");
    query
}

pub async fn fetch_recipes(
    filter: &RecipeFilter,
    viewer: Option<&SessionData>,
    pool: &Pool<Postgres>,
) -> Result<Vec<Recipe>, potion::Error> {
    let rows: Vec<Recipe> = build_recipe_query(filter, viewer)
        .build_query_as::<Recipe>()
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::UserRole;

    fn viewer() -> SessionData {
        SessionData::new(7, String::from("cook"), UserRole::User)
    }

    #[test]
    fn unfiltered_listing_is_newest_first() {
        let filter = RecipeFilter::default();
        let query = build_recipe_query(&filter, None);
        assert_eq!(
            query.sql(),
            "SELECT r.* FROM recipes r WHERE TRUE ORDER BY r.pub_date DESC, r.id DESC"
        );
    }

    #[test]
    fn author_and_tags_become_bound_conditions() {
        let filter = RecipeFilter {
            author: Some(3),
            tags: vec![String::from("breakfast"), String::from("lunch")],
            ..Default::default()
        };
        let query = build_recipe_query(&filter, None);
        let sql = query.sql();
        assert!(sql.contains("r.author_id = $1"));
        assert!(sql.contains("t.slug = ANY($2)"));
    }

    #[test]
    fn mark_filters_need_a_viewer() {
        let filter = RecipeFilter {
            is_favorited: Some(true),
            is_in_shopping_cart: Some(false),
            ..Default::default()
        };

        let anonymous = build_recipe_query(&filter, None);
        assert!(!anonymous.sql().contains("EXISTS"));

        let session = viewer();
        let signed_in = build_recipe_query(&filter, Some(&session));
        let sql = signed_in.sql();
        assert!(sql.contains("AND EXISTS (SELECT 1 FROM user_favorites s"));
        assert!(sql.contains("AND NOT EXISTS (SELECT 1 FROM shopping_carts s"));
    }
}
