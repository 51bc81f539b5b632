use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::{
    error::ActionError,
    schema::{Amount, Uuid},
    store::AmountStore,
};
use crate::constants::MIN_AMOUNT;

/// One requested ingredient quantity, as submitted with a recipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DesiredAmount {
    #[serde(rename = "id")]
    pub ingredient_id: Uuid,
    pub amount: i32,
}

/// Writes needed to turn a recipe's stored amounts into the desired ones.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcilePlan {
    pub create: Vec<DesiredAmount>,
    /// `(amount id, new quantity)`
    pub update: Vec<(Uuid, i32)>,
    pub delete: Vec<Uuid>,
}

impl ReconcilePlan {
    pub fn is_empty(&self) -> bool {
        self.create.is_empty() && self.update.is_empty() && self.delete.is_empty()
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
}

/// Checks a desired list on its own: non-empty, positive amounts, each
/// ingredient at most once.
pub fn validate_desired(desired: &[DesiredAmount]) -> Result<(), ActionError> {
    if desired.is_empty() {
        return Err(ActionError::validation(
            "ingredients",
            "A recipe needs at least one ingredient.",
        ));
    }

    let mut seen = HashSet::with_capacity(desired.len());
    for item in desired {
        if item.amount < MIN_AMOUNT {
            return Err(ActionError::validation(
                "ingredients",
                &format!(
                    "Amount of ingredient {} must be at least {MIN_AMOUNT}.",
                    item.ingredient_id
                ),
            ));
        }
        if !seen.insert(item.ingredient_id) {
            return Err(ActionError::validation(
                "ingredients",
                &format!("Ingredient {} is listed more than once.", item.ingredient_id),
            ));
        }
    }

    Ok(())
}

/// Diffs stored amounts against an already validated desired list.
///
/// Amounts whose quantity is unchanged produce no write. If storage somehow
/// holds several rows for one ingredient, the first is kept and the rest are
/// deleted.
pub fn plan_reconcile(current: &[Amount], desired: &[DesiredAmount]) -> ReconcilePlan {
    let mut plan = ReconcilePlan::default();
    let wanted: HashSet<Uuid> = desired.iter().map(|d| d.ingredient_id).collect();

    let mut existing: HashMap<Uuid, &Amount> = HashMap::with_capacity(current.len());
    for amount in current {
        if !wanted.contains(&amount.ingredient_id) || existing.contains_key(&amount.ingredient_id)
        {
            plan.delete.push(amount.id);
            continue;
        }
        existing.insert(amount.ingredient_id, amount);
    }

    for item in desired {
        match existing.get(&item.ingredient_id) {
            Some(stored) if stored.amount == item.amount => {}
            Some(stored) => plan.update.push((stored.id, item.amount)),
            None => plan.create.push(*item),
        }
    }

    plan
}

/// Converges the stored amounts of `recipe_id` to `desired`.
///
/// All input checks, including ingredient lookups, happen before the first
/// write, so a rejected list never touches storage.
pub async fn reconcile<S: AmountStore>(
    store: &mut S,
    recipe_id: Uuid,
    desired: &[DesiredAmount],
) -> Result<ReconcileSummary, ActionError> {
    if let Err(e) = validate_desired(desired) {
        log::warn!("Rejected ingredients for recipe {recipe_id}: {e}");
        return Err(e);
    }

    let ids: Vec<Uuid> = desired.iter().map(|item| item.ingredient_id).collect();
    let known: HashSet<Uuid> = store
        .resolve_ingredients(&ids)
        .await?
        .into_iter()
        .map(|ingredient| ingredient.id)
        .collect();

    if let Some(missing) = ids.iter().find(|id| !known.contains(*id)) {
        log::warn!("Rejected ingredients for recipe {recipe_id}: unknown ingredient {missing}");
        return Err(ActionError::validation(
            "ingredients",
            &format!("Invalid pk \"{missing}\" - object does not exist."),
        ));
    }

    let current = store.get_amounts(recipe_id).await?;
    let plan = plan_reconcile(&current, desired);

    for amount_id in &plan.delete {
        store.delete_amount(*amount_id).await?;
    }
    for (amount_id, amount) in &plan.update {
        store.update_amount_quantity(*amount_id, *amount).await?;
    }
    for item in &plan.create {
        store
            .create_amount(recipe_id, item.ingredient_id, item.amount)
            .await?;
    }

    let summary = ReconcileSummary {
        created: plan.create.len(),
        updated: plan.update.len(),
        deleted: plan.delete.len(),
    };
    log::debug!("Reconciled ingredients for recipe {recipe_id}: {summary:?}");

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Ingredient;

    #[derive(Default)]
    struct MemoryStore {
        ingredients: HashMap<Uuid, Ingredient>,
        amounts: Vec<Amount>,
        next_id: Uuid,
        writes: usize,
        lookups: usize,
    }

    impl MemoryStore {
        fn with_ingredients(ids: &[Uuid]) -> Self {
            let ingredients = ids
                .iter()
                .map(|id| {
                    (
                        *id,
                        Ingredient {
                            id: *id,
                            name: format!("ingredient-{id}"),
                            measurement_unit: String::from("g"),
                        },
                    )
                })
                .collect();

            Self {
                ingredients,
                next_id: 1,
                ..Default::default()
            }
        }

        fn quantities(&self, recipe_id: Uuid) -> Vec<(Uuid, i32)> {
            let mut rows: Vec<(Uuid, i32)> = self
                .amounts
                .iter()
                .filter(|a| a.recipe_id == recipe_id)
                .map(|a| (a.ingredient_id, a.amount))
                .collect();
            rows.sort();
            rows
        }

        fn amount_id(&self, recipe_id: Uuid, ingredient_id: Uuid) -> Option<Uuid> {
            self.amounts
                .iter()
                .find(|a| a.recipe_id == recipe_id && a.ingredient_id == ingredient_id)
                .map(|a| a.id)
        }
    }

    impl AmountStore for MemoryStore {
        async fn get_amounts(&mut self, recipe_id: Uuid) -> Result<Vec<Amount>, ActionError> {
            Ok(self
                .amounts
                .iter()
                .filter(|a| a.recipe_id == recipe_id)
                .cloned()
                .collect())
        }

        async fn create_amount(
            &mut self,
            recipe_id: Uuid,
            ingredient_id: Uuid,
            amount: i32,
        ) -> Result<Uuid, ActionError> {
            if self.amount_id(recipe_id, ingredient_id).is_some() {
                return Err(ActionError::conflict("unique_recipe_ingredient"));
            }
            let id = self.next_id;
            self.next_id += 1;
            self.writes += 1;
            self.amounts.push(Amount {
                id,
                recipe_id,
                ingredient_id,
                amount,
            });
            Ok(id)
        }

        async fn update_amount_quantity(
            &mut self,
            amount_id: Uuid,
            amount: i32,
        ) -> Result<(), ActionError> {
            let row = self
                .amounts
                .iter_mut()
                .find(|a| a.id == amount_id)
                .ok_or_else(|| ActionError::not_found("Amount doesn't exist"))?;
            row.amount = amount;
            self.writes += 1;
            Ok(())
        }

        async fn delete_amount(&mut self, amount_id: Uuid) -> Result<(), ActionError> {
            self.amounts.retain(|a| a.id != amount_id);
            self.writes += 1;
            Ok(())
        }

        async fn resolve_ingredients(
            &mut self,
            ingredient_ids: &[Uuid],
        ) -> Result<Vec<Ingredient>, ActionError> {
            self.lookups += 1;
            Ok(ingredient_ids
                .iter()
                .filter_map(|id| self.ingredients.get(id).cloned())
                .collect())
        }
    }

    fn desired(items: &[(Uuid, i32)]) -> Vec<DesiredAmount> {
        items
            .iter()
            .map(|(ingredient_id, amount)| DesiredAmount {
                ingredient_id: *ingredient_id,
                amount: *amount,
            })
            .collect()
    }

    #[tokio::test]
    async fn creates_amounts_for_a_new_recipe() {
        let mut store = MemoryStore::with_ingredients(&[1, 2, 3]);

        let summary = reconcile(&mut store, 10, &desired(&[(1, 2), (3, 5)]))
            .await
            .unwrap();

        assert_eq!(
            summary,
            ReconcileSummary {
                created: 2,
                updated: 0,
                deleted: 0
            }
        );
        assert_eq!(store.quantities(10), vec![(1, 2), (3, 5)]);
    }

    #[tokio::test]
    async fn converges_to_the_desired_list() {
        let mut store = MemoryStore::with_ingredients(&[1, 2, 3, 4]);
        reconcile(&mut store, 10, &desired(&[(1, 2), (2, 4), (3, 6)]))
            .await
            .unwrap();

        let summary = reconcile(&mut store, 10, &desired(&[(2, 4), (3, 1), (4, 8)]))
            .await
            .unwrap();

        assert_eq!(
            summary,
            ReconcileSummary {
                created: 1,
                updated: 1,
                deleted: 1
            }
        );
        assert_eq!(store.quantities(10), vec![(2, 4), (3, 1), (4, 8)]);
    }

    #[tokio::test]
    async fn quantity_change_keeps_the_row_identity() {
        let mut store = MemoryStore::with_ingredients(&[1]);
        reconcile(&mut store, 10, &desired(&[(1, 2)])).await.unwrap();
        let before = store.amount_id(10, 1);

        reconcile(&mut store, 10, &desired(&[(1, 7)])).await.unwrap();

        assert_eq!(store.amount_id(10, 1), before);
        assert_eq!(store.quantities(10), vec![(1, 7)]);
    }

    #[tokio::test]
    async fn second_identical_call_writes_nothing() {
        let mut store = MemoryStore::with_ingredients(&[1, 2]);
        let list = desired(&[(1, 3), (2, 1)]);
        reconcile(&mut store, 10, &list).await.unwrap();
        let writes = store.writes;

        let summary = reconcile(&mut store, 10, &list).await.unwrap();

        assert_eq!(summary, ReconcileSummary::default());
        assert_eq!(store.writes, writes);
    }

    #[tokio::test]
    async fn leaves_other_recipes_alone() {
        let mut store = MemoryStore::with_ingredients(&[1, 2]);
        reconcile(&mut store, 10, &desired(&[(1, 1)])).await.unwrap();
        reconcile(&mut store, 11, &desired(&[(1, 4), (2, 2)]))
            .await
            .unwrap();

        reconcile(&mut store, 10, &desired(&[(2, 9)])).await.unwrap();

        assert_eq!(store.quantities(10), vec![(2, 9)]);
        assert_eq!(store.quantities(11), vec![(1, 4), (2, 2)]);
    }

    #[tokio::test]
    async fn duplicate_ingredient_is_rejected_without_writes() {
        let mut store = MemoryStore::with_ingredients(&[1, 2]);

        let err = reconcile(&mut store, 10, &desired(&[(1, 2), (2, 1), (1, 5)]))
            .await
            .unwrap_err();

        assert!(matches!(err, ActionError::Validation { ref field, .. } if field == "ingredients"));
        assert!(store.quantities(10).is_empty());
        assert_eq!(store.writes, 0);
    }

    #[tokio::test]
    async fn non_positive_amounts_are_rejected_without_writes() {
        for amount in [0, -3] {
            let mut store = MemoryStore::with_ingredients(&[1, 2]);
            reconcile(&mut store, 10, &desired(&[(1, 2)])).await.unwrap();
            let writes = store.writes;

            let err = reconcile(&mut store, 10, &desired(&[(2, 1), (1, amount)]))
                .await
                .unwrap_err();

            assert!(matches!(err, ActionError::Validation { .. }));
            assert_eq!(store.quantities(10), vec![(1, 2)]);
            assert_eq!(store.writes, writes);
        }
    }

    #[tokio::test]
    async fn unknown_ingredient_is_rejected_without_writes() {
        let mut store = MemoryStore::with_ingredients(&[1]);

        let err = reconcile(&mut store, 10, &desired(&[(1, 2), (99, 1)]))
            .await
            .unwrap_err();

        match err {
            ActionError::Validation { field, info } => {
                assert_eq!(field, "ingredients");
                assert!(info.contains("99"));
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(store.writes, 0);
    }

    #[tokio::test]
    async fn ingredients_resolve_in_a_single_lookup() {
        let mut store = MemoryStore::with_ingredients(&[1, 2, 3, 4]);

        reconcile(&mut store, 10, &desired(&[(1, 2), (2, 1), (3, 4), (4, 1)]))
            .await
            .unwrap();

        assert_eq!(store.lookups, 1);
    }

    #[tokio::test]
    async fn empty_list_is_rejected() {
        let mut store = MemoryStore::with_ingredients(&[1]);
        let err = reconcile(&mut store, 10, &[]).await.unwrap_err();
        assert!(matches!(err, ActionError::Validation { .. }));
    }

    #[test]
    fn plan_drops_stray_duplicate_rows() {
        let current = vec![
            Amount {
                id: 1,
                recipe_id: 10,
                ingredient_id: 5,
                amount: 2,
            },
            Amount {
                id: 2,
                recipe_id: 10,
                ingredient_id: 5,
                amount: 3,
            },
        ];

        let plan = plan_reconcile(&current, &desired(&[(5, 2)]));

        assert_eq!(
            plan,
            ReconcilePlan {
                create: vec![],
                update: vec![],
                delete: vec![2],
            }
        );
    }

    #[test]
    fn plan_is_empty_when_already_converged() {
        let current = vec![Amount {
            id: 4,
            recipe_id: 10,
            ingredient_id: 1,
            amount: 3,
        }];
        assert!(plan_reconcile(&current, &desired(&[(1, 3)])).is_empty());
    }
}
