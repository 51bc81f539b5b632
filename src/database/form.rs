use std::{collections::HashMap, str::FromStr};

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{error::ActionError, error::TypeError, reconcile::DesiredAmount, schema::Uuid};
use crate::constants::{
    COOKING_TIME_MAX, COOKING_TIME_MIN, NAME_MAX_LENGTH, RECIPE_FIELDS,
};

pub type FormData = HashMap<String, Value>;

pub struct Form {
    inner: HashMap<String, Value>,
}

impl Form {
    pub fn from_data(data: FormData) -> Self {
        Self { inner: data }
    }

    /// Keys from `fields` that are absent or null, in the order given.
    pub fn missing_fields<'a>(&self, fields: &[&'a str]) -> Vec<&'a str> {
        fields
            .iter()
            .filter(|key| matches!(self.inner.get(**key), None | Some(Value::Null)))
            .copied()
            .collect()
    }

    pub fn get_value<T>(&self, key: &str) -> Result<T, TypeError>
    where
        T: TryFrom<Value>,
    {
        match self.inner.get(key) {
            Some(value) => value
                .to_owned()
                .try_into()
                .map_err(|_e| TypeError::new("Invalid type conversion")),
            None => Err(TypeError::new("Invalid key")),
        }
    }

    /// Reads a number that may arrive either as a JSON number or as a numeric string.
    pub fn get_number<T>(&self, key: &str) -> Result<T, TypeError>
    where
        T: FromStr,
    {
        match self.inner.get(key) {
            Some(Value::Number(n)) => n
                .to_string()
                .parse()
                .map_err(|_e| TypeError::new("Invalid type conversion")),
            Some(Value::String(v)) => v
                .trim()
                .parse()
                .map_err(|_e| TypeError::new("Invalid type conversion")),
            Some(_) => Err(TypeError::new("Failed to parse value as number")),
            None => Err(TypeError::new("Invalid key")),
        }
    }

    pub fn get_str(&self, key: &str) -> Result<String, TypeError> {
        match self.inner.get(key) {
            Some(value) => match value.as_str() {
                Some(v) => Ok(v.to_string()),
                None => Err(TypeError::new("Invalid key")),
            },
            None => Err(TypeError::new("Invalid key")),
        }
    }

    pub fn get_optional_str(&self, key: &str) -> Result<Option<String>, TypeError> {
        match self.inner.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(_) => self.get_str(key).map(Some),
        }
    }

    pub fn get_list<T>(&self, key: &str) -> Result<Vec<T>, TypeError>
    where
        T: DeserializeOwned,
    {
        match self.inner.get(key) {
            Some(value @ Value::Array(_)) => serde_json::from_value(value.to_owned())
                .map_err(|_e| TypeError::new("Invalid list item")),
            Some(_) => Err(TypeError::new("Failed to parse value as list")),
            None => Err(TypeError::new("Invalid key")),
        }
    }
}

/// A recipe as submitted for create or update.
#[derive(Debug, Clone)]
pub struct RecipePayload {
    pub name: String,
    pub text: String,
    pub cooking_time: i32,
    pub tags: Vec<Uuid>,
    pub ingredients: Vec<DesiredAmount>,
    pub image: Option<String>,
}

fn field_error(field: &str) -> impl Fn(TypeError) -> ActionError + '_ {
    move |e| ActionError::validation(field, &e.to_string())
}

impl TryFrom<Form> for RecipePayload {
    type Error = ActionError;

    fn try_from(form: Form) -> Result<Self, Self::Error> {
        let blank_fields = form.missing_fields(RECIPE_FIELDS);
        if !blank_fields.is_empty() {
            return Err(ActionError::validation(
                "non_field_errors",
                &format!("{} may not be blank.", blank_fields.join(", ")),
            ));
        }

        let payload = Self {
            name: form.get_str("name").map_err(field_error("name"))?,
            text: form.get_str("text").map_err(field_error("text"))?,
            cooking_time: form
                .get_number("cooking_time")
                .map_err(field_error("cooking_time"))?,
            tags: form.get_list("tags").map_err(field_error("tags"))?,
            ingredients: form
                .get_list("ingredients")
                .map_err(field_error("ingredients"))?,
            image: form
                .get_optional_str("image")
                .map_err(field_error("image"))?,
        };

        payload.validate()?;
        Ok(payload)
    }
}

impl RecipePayload {
    /// Field-level checks that need no storage. Tags and ingredients are checked
    /// against storage inside the write transaction.
    pub fn validate(&self) -> Result<(), ActionError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ActionError::validation("name", "This field may not be blank."));
        }
        if name.chars().count() > NAME_MAX_LENGTH {
            return Err(ActionError::validation(
                "name",
                &format!("Ensure this field has no more than {NAME_MAX_LENGTH} characters."),
            ));
        }
        if self.text.trim().is_empty() {
            return Err(ActionError::validation("text", "This field may not be blank."));
        }
        if !(COOKING_TIME_MIN..=COOKING_TIME_MAX).contains(&self.cooking_time) {
            return Err(ActionError::validation(
                "cooking_time",
                &format!(
                    "Cooking time must be between {COOKING_TIME_MIN} and {COOKING_TIME_MAX} minutes."
                ),
            ));
        }
        Ok(())
    }
}
