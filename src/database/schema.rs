use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::TypeError;

pub type Uuid = i32;

#[derive(
    Clone, Debug, PartialEq, PartialOrd, sqlx::Type, Serialize, Eq, Ord, Hash, Deserialize,
)]
#[sqlx(type_name = "user_type", rename_all = "lowercase")]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    User,
    Admin,
}

impl TryFrom<Value> for UserRole {
    type Error = TypeError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value.as_str() {
            Some(value) => match value {
                "user" => Ok(Self::User),
                "admin" => Ok(Self::Admin),
                _ => Err(TypeError::new("Invalid variant")),
            },
            None => Err(TypeError::new("Failed to parse value as string")),
        }
    }
}

/// Which per-user recipe list a mark belongs to. Both lists share one table layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkType {
    Favorite,
    ShoppingCart,
}

impl MarkType {
    pub fn table(&self) -> &'static str {
        match self {
            MarkType::Favorite => "user_favorites",
            MarkType::ShoppingCart => "shopping_carts",
        }
    }

    pub fn already_marked(&self) -> &'static str {
        match self {
            MarkType::Favorite => "Recipe is already in favorites",
            MarkType::ShoppingCart => "Recipe is already in the shopping cart",
        }
    }

    pub fn not_marked(&self) -> &'static str {
        match self {
            MarkType::Favorite => "Recipe is not in favorites",
            MarkType::ShoppingCart => "Recipe is not in the shopping cart",
        }
    }
}

impl TryFrom<Value> for MarkType {
    type Error = TypeError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value.as_str() {
            Some(value) => match value {
                "favorite" => Ok(Self::Favorite),
                "shopping_cart" => Ok(Self::ShoppingCart),
                _ => Err(TypeError::new("Invalid variant")),
            },
            None => Err(TypeError::new("Failed to parse value as string")),
        }
    }
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: UserRole,
}

/// A user as seen by a viewer: whether the viewer follows them.
#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct UserProfile {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub user: User,
    pub is_subscribed: bool,
}

#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ingredient {
    pub id: Uuid,
    pub name: String,
    pub measurement_unit: String,
}

#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecipeTag {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub color: String,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct Recipe {
    pub id: Uuid,
    pub author_id: Uuid,
    pub name: String,
    pub text: String,
    pub cooking_time: i32,
    pub pub_date: DateTime<Utc>,
    pub image: Option<String>,
}

/// Compact recipe representation used in mark responses and subscription listings.
#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct RecipeMinified {
    pub id: Uuid,
    pub name: String,
    pub cooking_time: i32,
    pub image: Option<String>,
}

/// One stored ingredient quantity of a recipe.
#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Amount {
    pub id: Uuid,
    pub recipe_id: Uuid,
    pub ingredient_id: Uuid,
    pub amount: i32,
}

/// An amount joined with its ingredient, as shown on a recipe page.
#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct RecipeIngredient {
    pub id: Uuid,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct LinkedRecipeTag {
    pub recipe_id: Uuid,
    pub tag_id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecipeDetail {
    #[serde(flatten)]
    pub recipe: Recipe,
    pub author: UserProfile,
    pub tags: Vec<RecipeTag>,
    pub ingredients: Vec<RecipeIngredient>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionRow {
    #[serde(flatten)]
    pub user: User,
    pub is_subscribed: bool,
    pub recipes: Vec<RecipeMinified>,
    pub recipes_count: i64,
}

/// Listing filter for recipes.
///
/// `tags` matches any of the given slugs. The mark filters are ignored for
/// anonymous viewers.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecipeFilter {
    pub author: Option<Uuid>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub is_favorited: Option<bool>,
    pub is_in_shopping_cart: Option<bool>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn mark_type_parses_from_json() {
        assert_eq!(
            MarkType::try_from(json!("shopping_cart")).unwrap(),
            MarkType::ShoppingCart
        );
        assert!(MarkType::try_from(json!("cart")).is_err());
        assert!(MarkType::try_from(json!(1)).is_err());
    }

    #[test]
    fn mark_tables_differ() {
        assert_ne!(MarkType::Favorite.table(), MarkType::ShoppingCart.table());
    }

    #[test]
    fn filter_defaults_to_no_tags() {
        let filter: RecipeFilter = serde_json::from_value(json!({ "author": 3 })).unwrap();
        assert_eq!(filter.author, Some(3));
        assert!(filter.tags.is_empty());
        assert_eq!(filter.is_favorited, None);
    }
}
