use async_trait::async_trait;

use super::{
    error::Error,
    reconcile::AssociationPlan,
    schema::{
        Id, ImageReplaced, Label, LabelKind, NewRecipe, NewUser, Recipe, RecipeChanges,
        RecipeDetail, RecipeFilter, User, UserChanges,
    },
};

/// Persistence seam for every entity. Recipe and label operations take the
/// requesting user as `owner` and only ever see that user's rows; a row owned
/// by somebody else is reported exactly like a missing one.
///
/// Each method is one unit of work: it either applies all of its changes or
/// none of them.
#[async_trait]
pub trait Store: Send + Sync {
    fn backend_tag(&self) -> &'static str;

    /// Fails with a validation error on a duplicate email.
    async fn insert_user(&self, user: NewUser) -> Result<User, Error>;
    async fn get_user(&self, id: Id) -> Result<Option<User>, Error>;
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, Error>;
    async fn update_user(&self, id: Id, changes: UserChanges) -> Result<Option<User>, Error>;

    /// Newest first.
    async fn list_recipes(&self, owner: Id, filter: &RecipeFilter)
        -> Result<Vec<RecipeDetail>, Error>;
    async fn get_recipe(&self, owner: Id, id: Id) -> Result<Option<RecipeDetail>, Error>;
    async fn create_recipe(
        &self,
        owner: Id,
        recipe: NewRecipe,
        plan: AssociationPlan,
    ) -> Result<RecipeDetail, Error>;
    async fn update_recipe(
        &self,
        owner: Id,
        id: Id,
        changes: RecipeChanges,
        plan: AssociationPlan,
    ) -> Result<Option<RecipeDetail>, Error>;
    /// Removes the recipe and its links. Returns the deleted row so the
    /// caller can discard its image.
    async fn delete_recipe(&self, owner: Id, id: Id) -> Result<Option<Recipe>, Error>;
    async fn set_recipe_image(
        &self,
        owner: Id,
        id: Id,
        image: &str,
    ) -> Result<Option<ImageReplaced>, Error>;

    /// Ordered by name, descending.
    async fn list_labels(
        &self,
        kind: LabelKind,
        owner: Id,
        assigned_only: bool,
    ) -> Result<Vec<Label>, Error>;
    async fn get_label(&self, kind: LabelKind, owner: Id, id: Id) -> Result<Option<Label>, Error>;
    /// Returns the label and whether it was created by this call.
    async fn get_or_create_label(
        &self,
        kind: LabelKind,
        owner: Id,
        name: &str,
    ) -> Result<(Label, bool), Error>;
    /// Fails with a validation error when the owner already has `name`.
    async fn rename_label(
        &self,
        kind: LabelKind,
        owner: Id,
        id: Id,
        name: &str,
    ) -> Result<Option<Label>, Error>;
    async fn delete_label(&self, kind: LabelKind, owner: Id, id: Id) -> Result<bool, Error>;
}

pub(crate) fn duplicate_email() -> Error {
    Error::invalid("email", "user with this email already exists.")
}

pub(crate) fn duplicate_label(kind: LabelKind) -> Error {
    Error::invalid(
        "name",
        &format!("{} with this name already exists.", kind.noun()),
    )
}
