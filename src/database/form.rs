use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::{
    error::{Error, FieldErrors},
    reconcile::{plan_ingredients, plan_tags, AssociationPlan},
    schema::{NewRecipe, RecipeChanges},
};
use crate::constants::{NAME_MAX_LENGTH, PRICE_DECIMAL_PLACES, PRICE_MAX_DIGITS};

const REQUIRED: &str = "This field is required.";

/// A payload member that is either missing from the request or supplied.
///
/// `Option` alone cannot tell `{"tags": []}` apart from `{}` once a default
/// is involved, and partial updates depend on exactly that difference.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Field<T> {
    #[default]
    Absent,
    Present(T),
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Field<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        T::deserialize(deserializer).map(Field::Present)
    }
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct NameSpec {
    pub name: String,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct IngredientSpec {
    pub name: String,
    #[serde(default)]
    pub quantity: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct RecipePayload {
    #[serde(default)]
    pub title: Field<String>,
    #[serde(default)]
    pub time_minutes: Field<i64>,
    #[serde(default)]
    pub price: Field<Decimal>,
    #[serde(default)]
    pub description: Field<String>,
    #[serde(default)]
    pub link: Field<String>,
    #[serde(default)]
    pub tags: Field<Vec<NameSpec>>,
    #[serde(default)]
    pub ingredients: Field<Vec<IngredientSpec>>,
    /// Accepted so that clients echoing a full recipe back do not fail, but
    /// never read: a recipe keeps the owner it was created with.
    #[serde(default)]
    pub user: Field<Value>,
}

impl RecipePayload {
    pub fn into_new_recipe(self) -> Result<(NewRecipe, AssociationPlan), Error> {
        let (changes, plan) = self.into_changes(false)?;

        // into_changes(false) has already rejected missing required fields.
        let recipe = NewRecipe {
            title: changes.title.unwrap_or_default(),
            time_minutes: changes.time_minutes.unwrap_or_default(),
            price: changes.price.unwrap_or_default(),
            description: changes.description.unwrap_or_default(),
            link: changes.link.unwrap_or_default(),
        };

        Ok((recipe, plan))
    }

    /// Validates the payload as an update. With `partial` unset every
    /// required field must be supplied and optional text fields reset to
    /// empty when omitted.
    pub fn into_changes(self, partial: bool) -> Result<(RecipeChanges, AssociationPlan), Error> {
        let mut errors = FieldErrors::default();

        let title = match self.title {
            Field::Present(title) => Some(check_text("title", title, false, &mut errors)),
            Field::Absent => {
                if !partial {
                    errors.add("title", REQUIRED);
                }
                None
            }
        };

        let time_minutes = match self.time_minutes {
            Field::Present(minutes) => match i32::try_from(minutes) {
                Ok(minutes) if minutes >= 0 => Some(minutes),
                Ok(_) => {
                    errors.add(
                        "time_minutes",
                        "Ensure this value is greater than or equal to 0.",
                    );
                    None
                }
                Err(_) => {
                    errors.add("time_minutes", "Ensure this value is a valid integer.");
                    None
                }
            },
            Field::Absent => {
                if !partial {
                    errors.add("time_minutes", REQUIRED);
                }
                None
            }
        };

        let price = match self.price {
            Field::Present(price) => check_price(price, &mut errors),
            Field::Absent => {
                if !partial {
                    errors.add("price", REQUIRED);
                }
                None
            }
        };

        let description = match self.description {
            Field::Present(description) => Some(description),
            Field::Absent => (!partial).then(String::new),
        };

        let link = match self.link {
            Field::Present(link) => Some(check_text("link", link, true, &mut errors)),
            Field::Absent => (!partial).then(String::new),
        };

        let plan = AssociationPlan {
            tags: plan_tags(self.tags, &mut errors),
            ingredients: plan_ingredients(self.ingredients, &mut errors),
        };

        let changes = RecipeChanges {
            title,
            time_minutes,
            price,
            description,
            link,
        };

        errors.into_result((changes, plan))
    }
}

#[derive(Deserialize, Debug, Default)]
pub struct RegisterPayload {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct CredentialsPayload {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// Profile edits. An `email` member is tolerated and ignored.
#[derive(Deserialize, Debug, Default)]
pub struct ProfilePayload {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct LabelPayload {
    #[serde(default)]
    pub name: Option<String>,
}

pub fn required(field: &str, value: Option<String>, errors: &mut FieldErrors) -> String {
    match value {
        Some(value) => value,
        None => {
            errors.add(field, REQUIRED);
            String::new()
        }
    }
}

/// Trims `value` and enforces the shared length limit.
pub fn check_text(field: &str, value: String, allow_blank: bool, errors: &mut FieldErrors) -> String {
    let value = value.trim().to_owned();
    if value.is_empty() && !allow_blank {
        errors.add(field, "This field may not be blank.");
    }
    if value.chars().count() > NAME_MAX_LENGTH {
        errors.add(
            field,
            &format!("Ensure this field has no more than {NAME_MAX_LENGTH} characters."),
        );
    }
    value
}

/// Accepts prices with at most two decimal places and five digits overall,
/// and pins the scale so the price always renders as e.g. `"5.50"`.
pub fn check_price(price: Decimal, errors: &mut FieldErrors) -> Option<Decimal> {
    let normalized = price.normalize();

    if normalized.is_sign_negative() && !normalized.is_zero() {
        errors.add("price", "Ensure this value is greater than or equal to 0.");
        return None;
    }
    if normalized.scale() > PRICE_DECIMAL_PLACES {
        errors.add(
            "price",
            &format!("Ensure that there are no more than {PRICE_DECIMAL_PLACES} decimal places."),
        );
        return None;
    }

    let whole_digits = PRICE_MAX_DIGITS - PRICE_DECIMAL_PLACES;
    if normalized.trunc() >= Decimal::from(10_i64.pow(whole_digits)) {
        errors.add(
            "price",
            &format!(
                "Ensure that there are no more than {whole_digits} digits before the decimal point."
            ),
        );
        return None;
    }

    let mut price = normalized;
    price.rescale(PRICE_DECIMAL_PLACES);
    Some(price)
}
