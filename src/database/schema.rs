use rust_decimal::Decimal;
use serde::Serialize;

use crate::constants::MEDIA_URL;

pub type Id = i32;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LabelKind {
    Tag,
    Ingredient,
}

impl LabelKind {
    pub fn table(&self) -> &'static str {
        match self {
            LabelKind::Tag => "tags",
            LabelKind::Ingredient => "ingredients",
        }
    }

    /// Join table linking recipes to labels of this kind.
    pub fn link_table(&self) -> &'static str {
        match self {
            LabelKind::Tag => "recipe_tags",
            LabelKind::Ingredient => "ingredient_quantities",
        }
    }

    pub fn link_column(&self) -> &'static str {
        match self {
            LabelKind::Tag => "tag_id",
            LabelKind::Ingredient => "ingredient_id",
        }
    }

    pub fn noun(&self) -> &'static str {
        match self {
            LabelKind::Tag => "tag",
            LabelKind::Ingredient => "ingredient",
        }
    }
}

#[derive(sqlx::FromRow, Debug, Clone, PartialEq)]
pub struct User {
    pub id: Id,
    pub email: String,
    pub name: String,
    pub password: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
}

/// Public view of a user. The password hash never leaves the server.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct UserProfile {
    pub email: String,
    pub name: String,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            email: user.email.to_owned(),
            name: user.name.to_owned(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password: String,
    pub is_staff: bool,
    pub is_superuser: bool,
}

#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub name: Option<String>,
    pub password: Option<String>,
}

/// A tag or an ingredient, rendered as `{id, name}`.
#[derive(sqlx::FromRow, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub id: Id,
    pub name: String,
}

#[derive(sqlx::FromRow, Debug, Clone, PartialEq)]
pub struct Recipe {
    pub id: Id,
    pub user_id: Id,
    pub title: String,
    pub time_minutes: i32,
    pub price: Decimal,
    pub description: String,
    pub link: String,
    pub image: Option<String>,
}

/// Join row between a recipe and an ingredient. `id` is the join row id.
#[derive(sqlx::FromRow, Serialize, Debug, Clone, PartialEq)]
pub struct IngredientQuantity {
    pub id: Id,
    pub name: String,
    pub quantity: String,
}

#[derive(Debug, Clone)]
pub struct NewRecipe {
    pub title: String,
    pub time_minutes: i32,
    pub price: Decimal,
    pub description: String,
    pub link: String,
}

/// Scalar fields a client may change. `None` leaves the stored value alone;
/// ownership and the image are deliberately absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipeChanges {
    pub title: Option<String>,
    pub time_minutes: Option<i32>,
    pub price: Option<Decimal>,
    pub description: Option<String>,
    pub link: Option<String>,
}

impl RecipeChanges {
    pub fn apply(&self, recipe: &mut Recipe) {
        if let Some(title) = &self.title {
            recipe.title = title.to_owned();
        }
        if let Some(time_minutes) = self.time_minutes {
            recipe.time_minutes = time_minutes;
        }
        if let Some(price) = self.price {
            recipe.price = price;
        }
        if let Some(description) = &self.description {
            recipe.description = description.to_owned();
        }
        if let Some(link) = &self.link {
            recipe.link = link.to_owned();
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipeFilter {
    pub tags: Option<Vec<Id>>,
    pub ingredients: Option<Vec<Id>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecipeDetail {
    pub recipe: Recipe,
    pub tags: Vec<Label>,
    pub ingredients: Vec<IngredientQuantity>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageReplaced {
    pub previous: Option<String>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RecipeRow {
    pub id: Id,
    pub title: String,
    pub time_minutes: i32,
    pub price: Decimal,
    pub link: String,
    pub tags: Vec<Label>,
    pub image: Option<String>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RecipeView {
    #[serde(flatten)]
    pub row: RecipeRow,
    pub description: String,
    pub ingredients: Vec<IngredientQuantity>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct RecipeImage {
    pub id: Id,
    pub image: Option<String>,
}

pub fn media_url(path: &Option<String>) -> Option<String> {
    path.as_ref().map(|path| format!("{MEDIA_URL}{path}"))
}

impl From<&RecipeDetail> for RecipeRow {
    fn from(detail: &RecipeDetail) -> Self {
        let recipe = &detail.recipe;
        Self {
            id: recipe.id,
            title: recipe.title.to_owned(),
            time_minutes: recipe.time_minutes,
            price: recipe.price,
            link: recipe.link.to_owned(),
            tags: detail.tags.to_owned(),
            image: media_url(&recipe.image),
        }
    }
}

impl From<&RecipeDetail> for RecipeView {
    fn from(detail: &RecipeDetail) -> Self {
        Self {
            row: detail.into(),
            description: detail.recipe.description.to_owned(),
            ingredients: detail.ingredients.to_owned(),
        }
    }
}
