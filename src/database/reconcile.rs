//! Planning of recipe tag and ingredient associations.
//!
//! A recipe write carries optional `tags` and `ingredients` lists. Each list
//! is turned into an [`Association`] before any storage is touched: an absent
//! list keeps the stored links, a supplied list (even an empty one) replaces
//! them. The stores then apply the plan with get-or-create semantics keyed by
//! `(owner, name)` inside a single unit of work.

use std::collections::HashSet;

use super::{
    error::FieldErrors,
    form::{check_text, Field, IngredientSpec, NameSpec},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Association<T> {
    Keep,
    Replace(Vec<T>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngredientLink {
    pub name: String,
    pub quantity: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssociationPlan {
    pub tags: Association<String>,
    pub ingredients: Association<IngredientLink>,
}

impl AssociationPlan {
    pub fn keep() -> Self {
        Self {
            tags: Association::Keep,
            ingredients: Association::Keep,
        }
    }
}

/// Drops later items whose key was already seen, keeping payload order.
pub fn dedupe_by<T, F>(items: Vec<T>, key: F) -> Vec<T>
where
    F: Fn(&T) -> &str,
{
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(key(item).to_owned()))
        .collect()
}

pub fn dedupe_names(names: Vec<String>) -> Vec<String> {
    dedupe_by(names, |name| name.as_str())
}

pub fn plan_tags(field: Field<Vec<NameSpec>>, errors: &mut FieldErrors) -> Association<String> {
    match field {
        Field::Absent => Association::Keep,
        Field::Present(items) => {
            let names = items
                .into_iter()
                .map(|tag| check_text("tags", tag.name, false, errors))
                .collect();
            Association::Replace(dedupe_names(names))
        }
    }
}

pub fn plan_ingredients(
    field: Field<Vec<IngredientSpec>>,
    errors: &mut FieldErrors,
) -> Association<IngredientLink> {
    match field {
        Field::Absent => Association::Keep,
        Field::Present(items) => {
            let links = items
                .into_iter()
                .map(|item| IngredientLink {
                    name: check_text("ingredients", item.name, false, errors),
                    quantity: check_text(
                        "ingredients",
                        item.quantity.unwrap_or_default(),
                        true,
                        errors,
                    ),
                })
                .collect();
            Association::Replace(dedupe_by(links, |link| link.name.as_str()))
        }
    }
}
