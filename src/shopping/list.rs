use std::collections::BTreeMap;

use serde::Serialize;

use crate::{constants::SHOPPING_LIST_HEADER, schema::Uuid};

/// A saved recipe with the ingredient amounts it contributes to a shopping list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartRecipe {
    pub id: Uuid,
    pub name: String,
    pub ingredients: Vec<CartIngredient>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartIngredient {
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

/// One line of the consolidated list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShoppingItem {
    pub name: String,
    pub total: i64,
    pub measurement_unit: String,
    /// `(recipe name, amount)` in the order the recipes were given.
    pub sources: Vec<(String, i32)>,
}

/// Sums ingredient amounts across `recipes`, keyed by ingredient name.
///
/// Items come out sorted by name, so the result does not depend on the order
/// of the input. The unit is taken from the first occurrence of a name;
/// ingredient names are unique in storage, so all occurrences agree.
pub fn aggregate(recipes: &[CartRecipe]) -> Vec<ShoppingItem> {
    let mut items: BTreeMap<&str, ShoppingItem> = BTreeMap::new();

    for recipe in recipes {
        for ingredient in &recipe.ingredients {
            let item = items
                .entry(ingredient.name.as_str())
                .or_insert_with(|| ShoppingItem {
                    name: ingredient.name.to_owned(),
                    total: 0,
                    measurement_unit: ingredient.measurement_unit.to_owned(),
                    sources: vec![],
                });

            item.total += i64::from(ingredient.amount);
            item.sources.push((recipe.name.to_owned(), ingredient.amount));
        }
    }

    items.into_values().collect()
}

/// Plain-text shopping list: a header, then `name (unit) — total` per item with
/// an indented line per contributing recipe.
pub fn render_shopping_list(items: &[ShoppingItem]) -> String {
    let mut lines = vec![SHOPPING_LIST_HEADER.to_string()];

    for item in items {
        lines.push(format!(
            "{} ({}) — {}",
            item.name, item.measurement_unit, item.total
        ));
        for (recipe, amount) in &item.sources {
            lines.push(format!("    {recipe} — {amount}"));
        }
    }

    let mut text = lines.join("\n");
    text.push('\n');
    text
}
