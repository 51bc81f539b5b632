use std::collections::HashSet;

use crate::{
    constants::{COLOR_MAX_LENGTH, NAME_MAX_LENGTH},
    error::{ActionError, QueryError},
    permissions::ActionType,
    schema::{LinkedRecipeTag, RecipeTag, Uuid},
    session::SessionData,
};

use sqlx::{Pool, Postgres, Transaction};

pub fn validate_slug(slug: &str) -> Result<(), ActionError> {
    let valid = !slug.is_empty()
        && slug.len() <= NAME_MAX_LENGTH
        && slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    if !valid {
        return Err(ActionError::validation(
            "slug",
            "Enter a valid slug consisting of letters, numbers, underscores or hyphens.",
        ));
    }
    Ok(())
}

/// `#` followed by three or six lowercase hex digits.
pub fn validate_color(color: &str) -> Result<(), ActionError> {
    let valid = color.len() <= COLOR_MAX_LENGTH
        && match color.strip_prefix('#') {
            Some(digits) => {
                matches!(digits.len(), 3 | 6)
                    && digits
                        .chars()
                        .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
            }
            None => false,
        };

    if !valid {
        return Err(ActionError::validation(
            "color",
            "Enter a valid HEX code starting with # and consisting of either 3 or 6 symbols which are letters a-f or numbers.",
        ));
    }
    Ok(())
}

pub async fn create_tag(
    name: &str,
    slug: &str,
    color: &str,
    session: &SessionData,
    pool: &Pool<Postgres>,
) -> Result<Uuid, potion::Error> {
    session.authenticate(ActionType::ManageTags)?;

    let name = name.trim();
    if name.is_empty() || name.chars().count() > NAME_MAX_LENGTH {
        return Err(ActionError::validation("name", "Invalid tag name").into());
    }
    validate_slug(slug)?;
    validate_color(color)?;

    let id: (i32,) =
        sqlx::query_as("INSERT INTO recipe_tags (name, slug, color) VALUES ($1, $2, $3) RETURNING id")
            .bind(name)
            .bind(slug)
            .bind(color)
            .fetch_one(pool)
            .await
            .map_err(ActionError::from)?;

    log::info!("Created tag {} ({slug})", id.0);

    Ok(id.0)
}

pub async fn get_tag(id: Uuid, pool: &Pool<Postgres>) -> Result<Option<RecipeTag>, potion::Error> {
    let tag: Option<RecipeTag> = sqlx::query_as("SELECT * FROM recipe_tags WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(tag)
}

pub async fn list_tags(pool: &Pool<Postgres>) -> Result<Vec<RecipeTag>, potion::Error> {
    let list: Vec<RecipeTag> = sqlx::query_as("SELECT * FROM recipe_tags ORDER BY id")
        .fetch_all(pool)
        .await
        .map_err(QueryError::from)?;

    Ok(list)
}

pub async fn list_recipe_tags(
    pool: &Pool<Postgres>,
    recipe_id: Uuid,
) -> Result<Vec<RecipeTag>, potion::Error> {
    let list: Vec<RecipeTag> = sqlx::query_as(
        "
        SELECT t.* FROM recipe_tags_map m
        INNER JOIN recipe_tags t ON t.id = m.tag_id
        WHERE m.recipe_id = $1
        ORDER BY t.id
    ",
    )
    .bind(recipe_id)
    .fetch_all(pool)
    .await
    .map_err(QueryError::from)?;

    Ok(list)
}

/// Replaces the tag links of a recipe with `tags`, inside the caller's transaction.
pub async fn set_recipe_tags(
    tx: &mut Transaction<'_, Postgres>,
    recipe_id: Uuid,
    tags: &[Uuid],
) -> Result<(), ActionError> {
    if tags.is_empty() {
        return Err(ActionError::validation(
            "tags",
            "A recipe needs at least one tag.",
        ));
    }

    let wanted: HashSet<Uuid> = tags.iter().copied().collect();
    if wanted.len() != tags.len() {
        return Err(ActionError::validation(
            "tags",
            "A tag is listed more than once.",
        ));
    }

    let known: Vec<(i32,)> = sqlx::query_as("SELECT id FROM recipe_tags WHERE id = ANY($1)")
        .bind(tags)
        .fetch_all(&mut **tx)
        .await?;
    if known.len() != wanted.len() {
        let known: HashSet<Uuid> = known.into_iter().map(|row| row.0).collect();
        let missing = tags.iter().find(|id| !known.contains(*id)).copied().unwrap_or_default();
        return Err(ActionError::validation(
            "tags",
            &format!("Invalid pk \"{missing}\" - object does not exist."),
        ));
    }

    let linked: Vec<LinkedRecipeTag> =
        sqlx::query_as("SELECT recipe_id, tag_id FROM recipe_tags_map WHERE recipe_id = $1")
            .bind(recipe_id)
            .fetch_all(&mut **tx)
            .await?;
    let linked: HashSet<Uuid> = linked.into_iter().map(|link| link.tag_id).collect();

    let stale: Vec<Uuid> = linked.difference(&wanted).copied().collect();
    if !stale.is_empty() {
        sqlx::query("DELETE FROM recipe_tags_map WHERE recipe_id = $1 AND tag_id = ANY($2)")
            .bind(recipe_id)
            .bind(&stale)
            .execute(&mut **tx)
            .await?;
    }

    for tag_id in tags.iter().filter(|id| !linked.contains(*id)) {
        sqlx::query(
            "INSERT INTO recipe_tags_map (recipe_id, tag_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(recipe_id)
        .bind(tag_id)
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_slugs() {
        for slug in ["breakfast", "low-carb", "snack_2"] {
            assert!(validate_slug(slug).is_ok(), "{slug}");
        }
    }

    #[test]
    fn rejects_bad_slugs() {
        for slug in ["", "with space", "ужин", "semi;colon"] {
            assert!(validate_slug(slug).is_err(), "{slug}");
        }
    }

    #[test]
    fn accepts_short_and_long_hex() {
        assert!(validate_color("#fff").is_ok());
        assert!(validate_color("#49b64e").is_ok());
    }

    #[test]
    fn rejects_bad_colors() {
        for color in ["fff", "#ffff", "#49B64E", "#12345g", "#", "#1234567"] {
            assert!(validate_color(color).is_err(), "{color}");
        }
    }
}
