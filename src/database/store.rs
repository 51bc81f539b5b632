use sqlx::{Postgres, Transaction};

use super::{
    error::ActionError,
    schema::{Amount, Ingredient, Uuid},
};

/// Storage operations the reconciler needs for one recipe's ingredient amounts.
///
/// Implementations are expected to run every call inside the same transaction,
/// so a failed reconcile leaves no partial writes once the caller drops it.
#[allow(async_fn_in_trait)]
pub trait AmountStore {
    /// Current amounts of a recipe, ordered by amount id.
    async fn get_amounts(&mut self, recipe_id: Uuid) -> Result<Vec<Amount>, ActionError>;

    async fn create_amount(
        &mut self,
        recipe_id: Uuid,
        ingredient_id: Uuid,
        amount: i32,
    ) -> Result<Uuid, ActionError>;

    async fn update_amount_quantity(
        &mut self,
        amount_id: Uuid,
        amount: i32,
    ) -> Result<(), ActionError>;

    async fn delete_amount(&mut self, amount_id: Uuid) -> Result<(), ActionError>;

    /// The ingredients among `ingredient_ids` that exist, in one lookup.
    async fn resolve_ingredients(
        &mut self,
        ingredient_ids: &[Uuid],
    ) -> Result<Vec<Ingredient>, ActionError>;
}

impl AmountStore for Transaction<'_, Postgres> {
    async fn get_amounts(&mut self, recipe_id: Uuid) -> Result<Vec<Amount>, ActionError> {
        let rows: Vec<Amount> = sqlx::query_as(
            "SELECT id, recipe_id, ingredient_id, amount FROM recipe_amounts WHERE recipe_id = $1 ORDER BY id",
        )
        .bind(recipe_id)
        .fetch_all(&mut **self)
        .await?;

        Ok(rows)
    }

    async fn create_amount(
        &mut self,
        recipe_id: Uuid,
        ingredient_id: Uuid,
        amount: i32,
    ) -> Result<Uuid, ActionError> {
        let id: (i32,) = sqlx::query_as(
            "
            INSERT INTO recipe_amounts (recipe_id, ingredient_id, amount)
            VALUES ($1, $2, $3)
            RETURNING id
        ",
        )
        .bind(recipe_id)
        .bind(ingredient_id)
        .bind(amount)
        .fetch_one(&mut **self)
        .await?;

        Ok(id.0)
    }

    async fn update_amount_quantity(
        &mut self,
        amount_id: Uuid,
        amount: i32,
    ) -> Result<(), ActionError> {
        let result = sqlx::query("UPDATE recipe_amounts SET amount = $1 WHERE id = $2")
            .bind(amount)
            .bind(amount_id)
            .execute(&mut **self)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ActionError::not_found("Amount doesn't exist"));
        }

        Ok(())
    }

    async fn delete_amount(&mut self, amount_id: Uuid) -> Result<(), ActionError> {
        sqlx::query("DELETE FROM recipe_amounts WHERE id = $1")
            .bind(amount_id)
            .execute(&mut **self)
            .await?;

        Ok(())
    }

    async fn resolve_ingredients(
        &mut self,
        ingredient_ids: &[Uuid],
    ) -> Result<Vec<Ingredient>, ActionError> {
        let rows: Vec<Ingredient> = sqlx::query_as("SELECT * FROM ingredients WHERE id = ANY($1)")
            .bind(ingredient_ids)
            .fetch_all(&mut **self)
            .await?;

        Ok(rows)
    }
}
